//! API error handling.
//!
//! Every error leaves the service in the same envelope as a success:
//! `{"message": ..., "data": ...}`. Lower layers convert into
//! [`ApiErrorResponse`] through `From`, so handlers can use `?` throughout.

use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::application::WorkflowError;
use crate::infrastructure::RepositoryError;

/// Message for every body validation failure.
pub const VALIDATION_MESSAGE: &str = "Validation Error";

/// Message for storage failures.
pub const SERVER_ERROR_MESSAGE: &str = "Server Error";

// =============================================================================
// Field Error
// =============================================================================

/// Field-level error for validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Name of the field that failed validation.
    pub field: String,
    /// Error message for this field.
    pub message: String,
}

impl FieldError {
    /// Creates a new field error.
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

// =============================================================================
// API Error Response
// =============================================================================

/// API error response containing status code and envelope contents.
#[derive(Debug, Clone)]
pub struct ApiErrorResponse {
    /// HTTP status code.
    pub status: StatusCode,
    /// Envelope `message`.
    pub message: String,
    /// Envelope `data`.
    pub data: Value,
}

impl ApiErrorResponse {
    /// Creates a new API error response.
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>, data: Value) -> Self {
        Self {
            status,
            message: message.into(),
            data,
        }
    }

    /// Creates a 400 Bad Request response.
    #[must_use]
    pub fn bad_request(message: impl Into<String>, data: Value) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message, data)
    }

    /// Creates a 400 Bad Request response for validation errors.
    #[must_use]
    pub fn validation_error(details: Vec<FieldError>) -> Self {
        Self::bad_request(VALIDATION_MESSAGE, json!(details))
    }

    /// Creates a 404 Not Found response.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message, Value::Null)
    }

    /// Creates a 409 Conflict response.
    #[must_use]
    pub fn conflict(message: impl Into<String>, data: Value) -> Self {
        Self::new(StatusCode::CONFLICT, message, data)
    }

    /// Creates a 500 Internal Server Error response.
    ///
    /// Details stay in the log; the client only sees the generic message.
    #[must_use]
    pub fn internal_error() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            SERVER_ERROR_MESSAGE,
            Value::Null,
        )
    }
}

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({ "message": self.message, "data": self.data })),
        )
            .into_response()
    }
}

impl From<RepositoryError> for ApiErrorResponse {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::NotFound(id) => Self::not_found(format!("Not found: {id}")),
            RepositoryError::VersionConflict { expected, found } => Self::conflict(
                "Conflict",
                json!({ "expected": expected, "found": found }),
            ),
            RepositoryError::DuplicateKey(field) if field == "email" => {
                Self::conflict("Email already exists", Value::Null)
            }
            RepositoryError::DuplicateKey(field) => {
                Self::conflict("Conflict", json!({ "field": field }))
            }
            RepositoryError::DatabaseError(_) | RepositoryError::SerializationError(_) => {
                tracing::error!(%error, "storage failure");
                Self::internal_error()
            }
        }
    }
}

impl From<WorkflowError> for ApiErrorResponse {
    fn from(error: WorkflowError) -> Self {
        match error {
            WorkflowError::TaskNotFound(_) => Self::not_found("Task not found"),
            WorkflowError::UserNotFound(_) => Self::not_found("User not found"),
            WorkflowError::InvalidReference { field, message } => {
                Self::validation_error(vec![FieldError::new(field, message)])
            }
            WorkflowError::DuplicateEmail => Self::conflict("Email already exists", Value::Null),
            WorkflowError::Query(error) => {
                tracing::error!(%error, "internal query rejected");
                Self::internal_error()
            }
            WorkflowError::Repository(error) => error.into(),
        }
    }
}

impl From<JsonRejection> for ApiErrorResponse {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(VALIDATION_MESSAGE, json!(rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiErrorResponse {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request("Invalid query string", json!(rejection.body_text()))
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Field errors collected while validating a request body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationError {
    /// Field-level errors.
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    /// Creates a new validation error.
    #[must_use]
    pub const fn new(errors: Vec<FieldError>) -> Self {
        Self { errors }
    }

    /// Creates a validation error with a single field error.
    #[must_use]
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(vec![FieldError::new(field, message)])
    }

    /// Records another field error.
    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    /// Returns true if there are no validation errors.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl From<ValidationError> for ApiErrorResponse {
    fn from(error: ValidationError) -> Self {
        Self::validation_error(error.errors)
    }
}

// =============================================================================
// Tests
// =============================================================================
