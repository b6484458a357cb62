use axum::{
    Json, Router, async_trait,
    body::{Body, Bytes},
    extract::{FromRequest, Path, Request, State, rejection::JsonRejection},
    http::{StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{error, info, warn};

use application::{ApiResponse, ApplicationError, StudentPatch, StudentRequest, StudentService};
use domain::{DomainError, Position};

pub mod config;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub student_service: Arc<StudentService>,
}

/// Builds the HTTP router for the student service.
///
/// Both resources also answer with a trailing slash (`/students/`,
/// `/students/1/`).
pub fn router(state: AppState) -> Router {
    let collection = get(list_students_handler).post(create_student_handler);
    let member = get(get_student_handler)
        .put(replace_student_handler)
        .patch(update_student_handler)
        .delete(delete_student_handler);

    Router::new()
        .route("/health", get(health_check))
        .route("/students", collection.clone())
        .route("/students/", collection)
        .route("/students/:position", member.clone())
        .route("/students/:position/", member)
        .with_state(state)
}

/// JSON body extractor that reads a request without a body and without a
/// `Content-Type` as `T::default()` (an empty object). Anything else goes
/// through [`Json`] unchanged.
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned + Default,
    S: Send + Sync,
{
    type Rejection = JsonRejection;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if req.headers().contains_key(CONTENT_TYPE) {
            let Json(value) = Json::<T>::from_request(req, state).await?;
            return Ok(Self(value));
        }

        let bytes = Bytes::from_request(req, state).await?;
        if bytes.is_empty() {
            return Ok(Self(T::default()));
        }
        // A body without a content type is still rejected as unsupported.
        let Json(value) = Json::<T>::from_request(Request::new(Body::from(bytes)), state).await?;
        Ok(Self(value))
    }
}

// --- API Handlers ---

async fn health_check() -> impl IntoResponse {
    info!("Health check endpoint called");
    (StatusCode::OK, "OK")
}

/// Handler for listing all students (GET /students).
async fn list_students_handler(State(state): State<AppState>) -> Response {
    info!("Received request to list students");
    let students = state.student_service.list_students().await;
    let count = students.len();
    (
        StatusCode::OK,
        Json(ApiResponse::ok("All students retrieved", students).with_count(count)),
    )
        .into_response()
}

/// Handler for fetching one student (GET /students/:position).
async fn get_student_handler(
    State(state): State<AppState>,
    Path(position): Path<String>,
) -> Response {
    info!(position = %position, "Received request to get student");
    match state.student_service.get_student(&position).await {
        Ok(student) => {
            (StatusCode::OK, Json(ApiResponse::ok("Student found", student))).into_response()
        }
        Err(e) => {
            error!(position = %position, "Failed to get student via handler: {}", e);
            map_application_error_to_response(e)
        }
    }
}

/// Handler for creating a student (POST /students).
async fn create_student_handler(
    State(state): State<AppState>,
    payload: Result<JsonBody<StudentRequest>, JsonRejection>,
) -> Response {
    let JsonBody(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return map_json_rejection(rejection),
    };
    info!("Received request to create student");
    match state.student_service.create_student(request).await {
        Ok(student) => {
            info!("Student created successfully via handler");
            (
                StatusCode::CREATED,
                Json(ApiResponse::ok("Student added", student)),
            )
                .into_response()
        }
        Err(e) => {
            error!("Failed to create student via handler: {}", e);
            map_application_error_to_response(e)
        }
    }
}

/// Handler for deleting a student (DELETE /students/:position).
async fn delete_student_handler(
    State(state): State<AppState>,
    Path(position): Path<String>,
) -> Response {
    info!(position = %position, "Received request to delete student");
    match state.student_service.delete_student(&position).await {
        Ok(student) => {
            info!(position = %position, "Student deleted successfully via handler");
            (StatusCode::OK, Json(ApiResponse::ok("Student deleted", student))).into_response()
        }
        Err(e) => {
            error!(position = %position, "Failed to delete student via handler: {}", e);
            map_application_error_to_response(e)
        }
    }
}

/// Handler for replacing a student (PUT /students/:position).
async fn replace_student_handler(
    State(state): State<AppState>,
    Path(position): Path<String>,
    payload: Result<JsonBody<StudentRequest>, JsonRejection>,
) -> Response {
    info!(position = %position, "Received request to replace student");
    let JsonBody(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return reject_body(&position, rejection),
    };
    match state
        .student_service
        .replace_student(&position, request)
        .await
    {
        Ok(student) => {
            (StatusCode::OK, Json(ApiResponse::ok("Student updated", student))).into_response()
        }
        Err(e) => {
            error!(position = %position, "Failed to replace student via handler: {}", e);
            map_application_error_to_response(e)
        }
    }
}

/// Handler for partially updating a student (PATCH /students/:position).
async fn update_student_handler(
    State(state): State<AppState>,
    Path(position): Path<String>,
    payload: Result<JsonBody<StudentPatch>, JsonRejection>,
) -> Response {
    info!(position = %position, "Received request to update student");
    let JsonBody(patch) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return reject_body(&position, rejection),
    };
    match state.student_service.update_student(&position, patch).await {
        Ok(student) => {
            (StatusCode::OK, Json(ApiResponse::ok("Student updated", student))).into_response()
        }
        Err(e) => {
            error!(position = %position, "Failed to update student via handler: {}", e);
            map_application_error_to_response(e)
        }
    }
}

/// A malformed position is reported ahead of a malformed body.
fn reject_body(raw_position: &str, rejection: JsonRejection) -> Response {
    match Position::parse(raw_position) {
        Err(e) => map_application_error_to_response(e.into()),
        Ok(_) => map_json_rejection(rejection),
    }
}

fn map_json_rejection(rejection: JsonRejection) -> Response {
    warn!("Rejected request body: {}", rejection.body_text());
    (
        rejection.status(),
        Json(ApiResponse::failure(rejection.body_text())),
    )
        .into_response()
}

/// Helper function to map ApplicationError to an HTTP status code and envelope.
fn map_application_error_to_response(err: ApplicationError) -> Response {
    let (status, message) = match err {
        ApplicationError::DomainError(DomainError::InvalidPosition(raw)) => {
            warn!(position = %raw, "Invalid position supplied");
            (StatusCode::BAD_REQUEST, "Invalid index".to_string())
        }
        ApplicationError::NotFound(position) => (
            StatusCode::NOT_FOUND,
            format!("No student found at index: {}", position),
        ),
        ApplicationError::StorageWriteFailure(msg) => {
            error!("Underlying storage error: {}", msg);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An internal server error occurred".to_string(),
            )
        }
    };
    (status, Json(ApiResponse::failure(message))).into_response()
}
