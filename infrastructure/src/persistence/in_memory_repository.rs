use application::{ApplicationError, StudentRepository};
use async_trait::async_trait;
use domain::Document;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Student store kept in process memory. Nothing survives a restart.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStudentRepository {
    document: Arc<RwLock<Document>>,
}

impl InMemoryStudentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an existing document, e.g. a test fixture.
    pub fn with_document(document: Document) -> Self {
        Self {
            document: Arc::new(RwLock::new(document)),
        }
    }
}

#[async_trait]
impl StudentRepository for InMemoryStudentRepository {
    #[instrument(skip(self))]
    async fn load(&self) -> Document {
        debug!("Loading student document from in-memory store");
        // Clone so callers mutate a private copy, exactly as with a file.
        self.document.read().await.clone()
    }

    #[instrument(skip(self, document))]
    async fn save(&self, document: &Document) -> Result<(), ApplicationError> {
        debug!(count = document.len(), "Saving student document to in-memory store");
        *self.document.write().await = document.clone();
        Ok(())
    }
}
