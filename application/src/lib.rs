use async_trait::async_trait;
use domain::{Document, DomainError, Position, Student};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

// --- Application Errors ---
#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("No student found at position {0}")]
    NotFound(Position),
    #[error("Failed to write student store: {0}")]
    StorageWriteFailure(String),
    #[error("Domain validation error: {0}")]
    DomainError(#[from] DomainError), // Propagate domain errors cleanly
}

// --- Infrastructure Interfaces (Traits) ---

/// Interface for the backing store of the student document.
///
/// There is no caching or locking behind this trait: every call goes to the
/// store, and concurrent load/modify/save sequences may interleave (last save
/// wins).
#[async_trait]
pub trait StudentRepository: Send + Sync {
    /// Reads the whole document. A missing, empty or unreadable store yields an
    /// empty document; this never fails.
    async fn load(&self) -> Document;
    /// Overwrites the store with `document`.
    async fn save(&self, document: &Document) -> Result<(), ApplicationError>;
}

// --- Request/Response Models (Data Transfer Objects - DTOs) ---

/// Body of a create or full-replace request.
///
/// No field is required and no value is type-checked; a missing or `null`
/// field ends up absent on the stored record.
#[derive(Deserialize, Debug, Default, Clone)]
pub struct StudentRequest {
    #[serde(default)]
    pub name: Option<Value>,
    #[serde(default)]
    pub surname: Option<Value>,
    #[serde(default)]
    pub age: Option<Value>,
    #[serde(default, rename = "isStudent")]
    pub is_student: Option<Value>,
}

/// Body of a partial update: any field, any value.
pub type StudentPatch = Map<String, Value>;

/// Envelope returned by every student endpoint.
#[derive(Serialize, Debug)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            count: None,
        }
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }
}

impl ApiResponse<()> {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            count: None,
        }
    }
}

// --- Application Services (Use Cases) ---

/// Service implementing the student operations on top of a [`StudentRepository`].
///
/// Every call reloads the document; mutating calls save it back in full.
pub struct StudentService {
    repo: Arc<dyn StudentRepository>,
}

impl StudentService {
    pub fn new(repo: Arc<dyn StudentRepository>) -> Self {
        Self { repo }
    }

    /// Shared position contract: a malformed segment is rejected before the
    /// store is read, an out-of-range one after.
    async fn load_and_locate(&self, raw: &str) -> Result<(Document, Position), ApplicationError> {
        let position = Position::parse(raw).inspect_err(|e| {
            warn!(position = %raw, "Rejected position: {}", e);
        })?;
        let document = self.repo.load().await;
        if document.offset_of(position).is_none() {
            warn!(%position, len = document.len(), "Position out of range");
            return Err(ApplicationError::NotFound(position));
        }
        Ok((document, position))
    }

    async fn persist(&self, document: &Document) -> Result<(), ApplicationError> {
        self.repo.save(document).await.inspect_err(|e| {
            error!(count = document.len(), "Failed to persist student document: {}", e);
        })
    }

    #[instrument(skip(self))]
    pub async fn list_students(&self) -> Vec<Student> {
        info!("Listing all students");
        let students = self.repo.load().await.into_students();
        debug!(count = students.len(), "Students loaded");
        students
    }

    #[instrument(skip(self))]
    pub async fn get_student(&self, raw_position: &str) -> Result<Student, ApplicationError> {
        info!("Attempting to retrieve student");
        let (document, position) = self.load_and_locate(raw_position).await?;
        document
            .get(position)
            .cloned()
            .ok_or(ApplicationError::NotFound(position))
    }

    #[instrument(skip(self, request))]
    pub async fn create_student(
        &self,
        request: StudentRequest,
    ) -> Result<Student, ApplicationError> {
        info!("Attempting to create student");
        let student = Student::new(
            request.name,
            request.surname,
            request.age,
            Some(request.is_student.unwrap_or(Value::Bool(true))),
        );

        let mut document = self.repo.load().await;
        let position = document.push(student.clone());
        self.persist(&document).await?;
        info!(%position, "Student created");
        Ok(student)
    }

    #[instrument(skip(self))]
    pub async fn delete_student(&self, raw_position: &str) -> Result<Student, ApplicationError> {
        info!("Attempting to delete student");
        let (mut document, position) = self.load_and_locate(raw_position).await?;
        let removed = document
            .remove(position)
            .ok_or(ApplicationError::NotFound(position))?;
        self.persist(&document).await?;
        info!(%position, remaining = document.len(), "Student deleted");
        Ok(removed)
    }

    /// Full replace: fields missing from `request` are dropped, not merged.
    #[instrument(skip(self, request))]
    pub async fn replace_student(
        &self,
        raw_position: &str,
        request: StudentRequest,
    ) -> Result<Student, ApplicationError> {
        info!("Attempting to replace student");
        let (mut document, position) = self.load_and_locate(raw_position).await?;
        let student = Student::new(
            request.name,
            request.surname,
            request.age,
            request.is_student,
        );
        document
            .replace(position, student.clone())
            .ok_or(ApplicationError::NotFound(position))?;
        self.persist(&document).await?;
        info!(%position, "Student replaced");
        Ok(student)
    }

    /// Partial update: shallow merge of `patch` into the stored record.
    #[instrument(skip(self, patch))]
    pub async fn update_student(
        &self,
        raw_position: &str,
        patch: StudentPatch,
    ) -> Result<Student, ApplicationError> {
        info!(fields = patch.len(), "Attempting to update student");
        let (mut document, position) = self.load_and_locate(raw_position).await?;
        let student = document
            .get_mut(position)
            .ok_or(ApplicationError::NotFound(position))?;
        student.merge(patch);
        let updated = student.clone();
        self.persist(&document).await?;
        info!(%position, "Student updated");
        Ok(updated)
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::Mutex;

    /// Store double that keeps the serialized document, like a file would.
    #[derive(Default)]
    struct RecordingRepository {
        stored: Mutex<Option<String>>,
        saves: Mutex<usize>,
    }

    #[async_trait]
    impl StudentRepository for RecordingRepository {
        async fn load(&self) -> Document {
            match self.stored.lock().await.as_deref() {
                Some(raw) => serde_json::from_str(raw).unwrap_or_default(),
                None => Document::default(),
            }
        }

        async fn save(&self, document: &Document) -> Result<(), ApplicationError> {
            *self.stored.lock().await = Some(serde_json::to_string(document).unwrap());
            *self.saves.lock().await += 1;
            Ok(())
        }
    }

    struct BrokenRepository;

    #[async_trait]
    impl StudentRepository for BrokenRepository {
        async fn load(&self) -> Document {
            Document::default()
        }

        async fn save(&self, _document: &Document) -> Result<(), ApplicationError> {
            Err(ApplicationError::StorageWriteFailure(
                "permission denied".to_string(),
            ))
        }
    }

    fn service() -> (StudentService, Arc<RecordingRepository>) {
        let repo = Arc::new(RecordingRepository::default());
        (StudentService::new(repo.clone()), repo)
    }

    fn request(name: &str) -> StudentRequest {
        StudentRequest {
            name: Some(json!(name)),
            surname: Some(json!("Veli")),
            age: Some(json!(20)),
            is_student: None,
        }
    }

    #[tokio::test]
    async fn create_defaults_is_student_and_appends() {
        let (service, repo) = service();
        let created = service.create_student(request("Ali")).await.unwrap();
        assert_eq!(created.get("isStudent"), Some(&json!(true)));

        service.create_student(request("Ayşe")).await.unwrap();
        let students = service.list_students().await;
        assert_eq!(students.len(), 2);
        assert_eq!(students[0].get("name"), Some(&json!("Ali")));
        assert_eq!(students[1].get("name"), Some(&json!("Ayşe")));
        assert_eq!(*repo.saves.lock().await, 2);
    }

    #[tokio::test]
    async fn create_keeps_explicit_false_and_drops_missing_fields() {
        let (service, _) = service();
        let created = service
            .create_student(StudentRequest {
                name: Some(json!("Ali")),
                is_student: Some(json!(false)),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(
            serde_json::to_value(&created).unwrap(),
            json!({ "name": "Ali", "isStudent": false })
        );
    }

    /// `null` counts as absent, so it does not override the default.
    #[tokio::test]
    async fn create_treats_null_is_student_as_absent() {
        let (service, _) = service();
        let request: StudentRequest =
            serde_json::from_value(json!({ "name": "X", "isStudent": null })).unwrap();
        let created = service.create_student(request).await.unwrap();
        assert_eq!(
            serde_json::to_value(&created).unwrap(),
            json!({ "name": "X", "isStudent": true })
        );
    }

    #[tokio::test]
    async fn position_errors_are_shared_by_all_operations() {
        let (service, repo) = service();
        service.create_student(request("Ali")).await.unwrap();

        for raw in ["0", "abc", "-3"] {
            assert!(matches!(
                service.get_student(raw).await,
                Err(ApplicationError::DomainError(DomainError::InvalidPosition(_)))
            ));
            assert!(matches!(
                service.delete_student(raw).await,
                Err(ApplicationError::DomainError(_))
            ));
            assert!(matches!(
                service.replace_student(raw, request("X")).await,
                Err(ApplicationError::DomainError(_))
            ));
            assert!(matches!(
                service.update_student(raw, Map::new()).await,
                Err(ApplicationError::DomainError(_))
            ));
        }

        for raw in ["2", "100"] {
            assert!(matches!(
                service.get_student(raw).await,
                Err(ApplicationError::NotFound(_))
            ));
            assert!(matches!(
                service.delete_student(raw).await,
                Err(ApplicationError::NotFound(_))
            ));
            assert!(matches!(
                service.replace_student(raw, request("X")).await,
                Err(ApplicationError::NotFound(_))
            ));
            assert!(matches!(
                service.update_student(raw, Map::new()).await,
                Err(ApplicationError::NotFound(_))
            ));
        }

        // Only the initial create touched the store.
        assert_eq!(*repo.saves.lock().await, 1);
    }

    #[tokio::test]
    async fn delete_shifts_later_positions_down() {
        let (service, _) = service();
        for name in ["A", "B", "C"] {
            service.create_student(request(name)).await.unwrap();
        }

        let removed = service.delete_student("1").await.unwrap();
        assert_eq!(removed.get("name"), Some(&json!("A")));

        let first = service.get_student("1").await.unwrap();
        assert_eq!(first.get("name"), Some(&json!("B")));
        assert_eq!(service.list_students().await.len(), 2);
    }

    #[tokio::test]
    async fn replace_discards_fields_not_supplied() {
        let (service, _) = service();
        service.create_student(request("Ali")).await.unwrap();

        let replaced = service
            .replace_student(
                "1",
                StudentRequest {
                    name: Some(json!("Vali")),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(serde_json::to_value(&replaced).unwrap(), json!({ "name": "Vali" }));
        assert_eq!(service.get_student("1").await.unwrap(), replaced);
    }

    #[tokio::test]
    async fn update_merges_and_preserves_untouched_fields() {
        let (service, _) = service();
        service.create_student(request("Ali")).await.unwrap();

        let patch = json!({ "age": 21, "group": "B-12" });
        let updated = service
            .update_student("1", patch.as_object().unwrap().clone())
            .await
            .unwrap();
        assert_eq!(
            serde_json::to_value(&updated).unwrap(),
            json!({ "name": "Ali", "surname": "Veli", "age": 21, "isStudent": true, "group": "B-12" })
        );
    }

    #[tokio::test]
    async fn write_failure_propagates() {
        let service = StudentService::new(Arc::new(BrokenRepository));
        assert!(matches!(
            service.create_student(request("Ali")).await,
            Err(ApplicationError::StorageWriteFailure(_))
        ));
    }
}
