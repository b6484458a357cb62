use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use application::StudentService;
use infrastructure::JsonFileStudentRepository;
use students_api::{AppState, config::ServerConfig, router};

// Application entry point
#[tokio::main]
async fn main() {
    // --- Logger Initialization ---
    let filter: EnvFilter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
    info!("Logger initialized successfully.");

    let config = ServerConfig::from_env();

    // --- Dependency Injection ---
    let repository = Arc::new(JsonFileStudentRepository::new(config.db_path.clone()));
    let student_service = Arc::new(StudentService::new(repository));
    let app = router(AppState { student_service });
    info!("API routes configured.");

    // --- Server Startup ---
    let addr = config.socket_addr();
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => {
            info!("Server running at http://localhost:{}", config.port);
            listener
        }
        Err(e) => {
            error!("Failed to bind to address {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app.into_make_service()).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}
