use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{info, warn};

pub const DEFAULT_PORT: u16 = 3200;
pub const DEFAULT_DB_PATH: &str = "./database/db.json";

pub const PORT_VAR: &str = "PORT";
pub const DB_PATH_VAR: &str = "STUDENTS_DB_PATH";

/// Listening port and backing file of the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    pub db_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            db_path: PathBuf::from(DEFAULT_DB_PATH),
        }
    }
}

impl ServerConfig {
    /// Reads `PORT` and `STUDENTS_DB_PATH` from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source. Invalid values fall
    /// back to the defaults with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let port = match lookup(PORT_VAR) {
            Some(port_str) => match u16::from_str(&port_str) {
                Ok(port_num) => {
                    info!("Using port {} from environment variable {}.", port_num, PORT_VAR);
                    port_num
                }
                Err(_) => {
                    warn!(
                        "Invalid {} value '{}' in environment variable. Using default port {}.",
                        PORT_VAR, port_str, DEFAULT_PORT
                    );
                    DEFAULT_PORT
                }
            },
            None => {
                info!(
                    "{} environment variable not set. Using default port {}.",
                    PORT_VAR, DEFAULT_PORT
                );
                DEFAULT_PORT
            }
        };

        let db_path = match lookup(DB_PATH_VAR) {
            Some(path) if !path.trim().is_empty() => PathBuf::from(path),
            _ => PathBuf::from(DEFAULT_DB_PATH),
        };
        info!(db_path = %db_path.display(), "Student store location resolved");

        Self { port, db_path }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        assert_eq!(ServerConfig::from_lookup(lookup(&[])), ServerConfig::default());
    }

    #[test]
    fn reads_port_and_path() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("PORT", "8080"),
            ("STUDENTS_DB_PATH", "/tmp/students.json"),
        ]));
        assert_eq!(config.port, 8080);
        assert_eq!(config.db_path, PathBuf::from("/tmp/students.json"));
        assert_eq!(config.socket_addr().port(), 8080);
    }

    #[test]
    fn invalid_port_falls_back_to_default() {
        let config = ServerConfig::from_lookup(lookup(&[("PORT", "eighty")]));
        assert_eq!(config.port, DEFAULT_PORT);
    }
}
