use application::{ApplicationError, StudentRepository};
use async_trait::async_trait;
use domain::Document;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, instrument};

/// Student store backed by a single pretty-printed JSON file.
///
/// The file is read in full on every `load` and rewritten in full on every
/// `save`. There is no locking and no atomic rename: a failed write may leave
/// the file truncated.
#[derive(Debug, Clone)]
pub struct JsonFileStudentRepository {
    path: PathBuf,
}

impl JsonFileStudentRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl StudentRepository for JsonFileStudentRepository {
    #[instrument(skip(self))]
    async fn load(&self) -> Document {
        // Read failures of any kind are absorbed: callers see an empty store.
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) => {
                debug!(path = %self.path.display(), "Student store not readable, starting empty: {}", e);
                return Document::default();
            }
        };
        if raw.is_empty() {
            debug!(path = %self.path.display(), "Student store is empty");
            return Document::default();
        }
        match serde_json::from_str::<Document>(&raw) {
            Ok(document) => {
                debug!(path = %self.path.display(), count = document.len(), "Student store loaded");
                document
            }
            Err(e) => {
                debug!(path = %self.path.display(), "Student store not parseable, starting empty: {}", e);
                Document::default()
            }
        }
    }

    #[instrument(skip(self, document))]
    async fn save(&self, document: &Document) -> Result<(), ApplicationError> {
        debug!(path = %self.path.display(), count = document.len(), "Writing student store");
        let body = serde_json::to_string_pretty(document).map_err(|e| {
            ApplicationError::StorageWriteFailure(format!("could not serialize document: {}", e))
        })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(|e| {
                ApplicationError::StorageWriteFailure(format!(
                    "could not create '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        fs::write(&self.path, body).await.map_err(|e| {
            ApplicationError::StorageWriteFailure(format!(
                "could not write '{}': {}",
                self.path.display(),
                e
            ))
        })
    }
}
