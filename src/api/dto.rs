//! Data Transfer Objects for API requests and responses.
//!
//! Request bodies are deserialized loosely (every field as raw JSON) and then
//! validated field by field, so a wrongly typed field yields a
//! `Validation Error` naming the field instead of a generic parse failure.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::ValidationError;
use crate::application::{TaskDraft, UserDraft};
use crate::domain::{TaskId, Timestamp, UserId, normalize_email};

// =============================================================================
// Envelope
// =============================================================================

/// Response body shared by every endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// Human readable outcome.
    pub message: String,
    /// Payload.
    pub data: T,
}

impl<T> Envelope<T> {
    /// Creates an envelope.
    #[must_use]
    pub fn new(message: impl Into<String>, data: T) -> Self {
        Self {
            message: message.into(),
            data,
        }
    }

    /// Creates an envelope with message `"OK"`.
    #[must_use]
    pub fn ok(data: T) -> Self {
        Self::new("OK", data)
    }
}

/// Payload for `count=true` list requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountResponse {
    /// Number of matching documents.
    pub count: u64,
}

// =============================================================================
// Request DTOs
// =============================================================================

/// Request body for `POST /api/tasks` and `PUT /api/tasks/{id}`.
///
/// `_id`, `dateCreated`, `__v` and `assignedUserName` are server managed and
/// ignored when present.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRequest {
    pub name: Option<Value>,
    pub description: Option<Value>,
    pub deadline: Option<Value>,
    pub completed: Option<Value>,
    pub assigned_user: Option<Value>,
}

/// Request body for `POST /api/users` and `PUT /api/users/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRequest {
    pub name: Option<Value>,
    pub email: Option<Value>,
    pub pending_tasks: Option<Value>,
}

/// Deserializes a request DTO from a body that must be a JSON object.
///
/// The derived `Deserialize` also accepts serde's sequence form, so arrays
/// are rejected here before they can fill fields by position.
fn from_object<T: serde::de::DeserializeOwned>(body: Value) -> Result<T, ValidationError> {
    if !body.is_object() {
        return Err(ValidationError::single(
            "body",
            "request body must be a JSON object",
        ));
    }
    serde_json::from_value(body)
        .map_err(|error| ValidationError::single("body", error.to_string()))
}

impl TaskRequest {
    /// Reads a task body.
    ///
    /// # Errors
    ///
    /// Returns a `body` field error unless `body` is a JSON object.
    pub fn from_body(body: Value) -> Result<Self, ValidationError> {
        from_object(body)
    }
}

impl UserRequest {
    /// Reads a user body.
    ///
    /// # Errors
    ///
    /// Returns a `body` field error unless `body` is a JSON object.
    pub fn from_body(body: Value) -> Result<Self, ValidationError> {
        from_object(body)
    }
}

// =============================================================================
// Validation
// =============================================================================

/// Validates a required, non-blank string field.
fn required_text(errors: &mut ValidationError, field: &str, value: Option<&Value>) -> Option<String> {
    match value {
        None => {
            errors.push(field, format!("{field} is required"));
            None
        }
        Some(Value::String(text)) if text.trim().is_empty() => {
            errors.push(field, format!("{field} must not be blank"));
            None
        }
        Some(Value::String(text)) => Some(text.trim().to_string()),
        Some(_) => {
            errors.push(field, format!("{field} must be a string"));
            None
        }
    }
}

fn optional_text(errors: &mut ValidationError, field: &str, value: Option<&Value>) -> Option<String> {
    match value {
        None => None,
        Some(Value::String(text)) => Some(text.clone()),
        Some(_) => {
            errors.push(field, format!("{field} must be a string"));
            None
        }
    }
}

/// Accepts booleans and the strings `"true"` / `"false"`.
fn optional_flag(errors: &mut ValidationError, field: &str, value: Option<&Value>) -> Option<bool> {
    match value {
        None => None,
        Some(Value::Bool(flag)) => Some(*flag),
        Some(Value::String(text)) if text == "true" => Some(true),
        Some(Value::String(text)) if text == "false" => Some(false),
        Some(_) => {
            errors.push(field, format!("{field} must be a boolean"));
            None
        }
    }
}

fn required_deadline(errors: &mut ValidationError, value: Option<&Value>) -> Option<Timestamp> {
    let Some(value) = value else {
        errors.push("deadline", "deadline is required");
        return None;
    };
    Timestamp::parse_input(value)
        .map_err(|message| errors.push("deadline", message))
        .ok()
}

/// `""` unassigns. An id that is not a UUID cannot name an existing user.
fn assigned_user(errors: &mut ValidationError, value: Option<&Value>) -> Option<Option<UserId>> {
    match value {
        None => None,
        Some(Value::String(text)) if text.trim().is_empty() => Some(None),
        Some(Value::String(text)) => match text.parse::<UserId>() {
            Ok(user_id) => Some(Some(user_id)),
            Err(_) => {
                errors.push("assignedUser", format!("user {text} does not exist"));
                None
            }
        },
        Some(_) => {
            errors.push("assignedUser", "assignedUser must be a string");
            None
        }
    }
}

fn pending_tasks(errors: &mut ValidationError, value: Option<&Value>) -> Option<Vec<TaskId>> {
    let items = match value {
        None => return None,
        Some(Value::Array(items)) => items,
        Some(_) => {
            errors.push("pendingTasks", "pendingTasks must be an array of task ids");
            return None;
        }
    };

    let mut task_ids = Vec::with_capacity(items.len());
    for item in items {
        let Some(text) = item.as_str() else {
            errors.push("pendingTasks", "pendingTasks must be an array of task ids");
            continue;
        };
        match text.parse::<TaskId>() {
            Ok(task_id) => task_ids.push(task_id),
            Err(_) => errors.push("pendingTasks", format!("task {text} does not exist")),
        }
    }
    Some(task_ids)
}

impl TaskRequest {
    /// Validates the body into a draft.
    ///
    /// # Errors
    ///
    /// Returns every field error found.
    pub fn validate(&self) -> Result<TaskDraft, ValidationError> {
        let mut errors = ValidationError::default();

        let name = required_text(&mut errors, "name", self.name.as_ref());
        let description = optional_text(&mut errors, "description", self.description.as_ref());
        let deadline = required_deadline(&mut errors, self.deadline.as_ref());
        let completed = optional_flag(&mut errors, "completed", self.completed.as_ref());
        let assigned_user = assigned_user(&mut errors, self.assigned_user.as_ref());

        match (name, deadline) {
            (Some(name), Some(deadline)) if errors.is_empty() => Ok(TaskDraft {
                name,
                description,
                deadline,
                completed,
                assigned_user,
            }),
            _ => Err(errors),
        }
    }
}

impl UserRequest {
    /// Validates the body into a draft.
    ///
    /// # Errors
    ///
    /// Returns every field error found.
    pub fn validate(&self) -> Result<UserDraft, ValidationError> {
        let mut errors = ValidationError::default();

        let name = required_text(&mut errors, "name", self.name.as_ref());
        let email = required_text(&mut errors, "email", self.email.as_ref()).and_then(|email| {
            if email.contains('@') {
                Some(normalize_email(&email))
            } else {
                errors.push("email", "email must be a valid email address");
                None
            }
        });
        let pending_tasks = pending_tasks(&mut errors, self.pending_tasks.as_ref());

        match (name, email) {
            (Some(name), Some(email)) if errors.is_empty() => Ok(UserDraft {
                name,
                email,
                pending_tasks,
            }),
            _ => Err(errors),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
