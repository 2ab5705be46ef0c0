//! Handlers for `/api/users`.

use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
};

use serde_json::Value;

use super::dto::UserRequest;
use super::error::ApiErrorResponse;
use super::handlers::{AppState, EnvelopeResponse, get_document, list_documents, render, respond};
use super::query::{ListParams, SelectParams};
use crate::domain::{Projection, UserId};

const NOT_FOUND: &str = "User not found";

fn parse_user_id(raw: &str) -> Result<UserId, ApiErrorResponse> {
    raw.parse()
        .map_err(|_| ApiErrorResponse::not_found(NOT_FOUND))
}

/// `GET /api/users`
///
/// Same parameters as `GET /api/tasks`; there is no default limit.
///
/// # Errors
///
/// - 400 for malformed query parameters
/// - 500 for storage failures
pub async fn list_users(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<EnvelopeResponse, ApiErrorResponse> {
    let Query(params) = params?;
    list_documents(&*state.user_repository, &params, None).await
}

/// `POST /api/users`
///
/// # Request Body
///
/// ```json
/// {
///   "name": "Ada",
///   "email": "ada@example.com",
///   "pendingTasks": ["<task id>"]
/// }
/// ```
///
/// Listed tasks are reassigned to the new user.
///
/// # Errors
///
/// - 400 `Validation Error` for a bad body, or a missing or completed task
/// - 409 `Email already exists`
pub async fn create_user(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<EnvelopeResponse, ApiErrorResponse> {
    let Json(body) = body?;
    let draft = UserRequest::from_body(body)?.validate()?;

    let user = state.assignments.create_user(draft).await?;
    Ok(respond(
        StatusCode::CREATED,
        "User created successfully",
        render(&user, &Projection::All)?,
    ))
}

/// `GET /api/users/{id}`
///
/// # Errors
///
/// - 404 `User not found` for unknown or malformed ids
/// - 400 for a malformed `select`
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    params: Result<Query<SelectParams>, QueryRejection>,
) -> Result<EnvelopeResponse, ApiErrorResponse> {
    let Query(params) = params?;
    get_document(&*state.user_repository, &id, &params, NOT_FOUND).await
}

/// `PUT /api/users/{id}`
///
/// Without `pendingTasks` the stored list is kept.
///
/// # Errors
///
/// - 404 `User not found`
/// - 400 `Validation Error`
/// - 409 `Email already exists` or `Conflict`
pub async fn replace_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<EnvelopeResponse, ApiErrorResponse> {
    let user_id = parse_user_id(&id)?;
    let Json(body) = body?;
    let draft = UserRequest::from_body(body)?.validate()?;

    let user = state.assignments.replace_user(&user_id, draft).await?;
    Ok(respond(
        StatusCode::OK,
        "User updated successfully",
        render(&user, &Projection::All)?,
    ))
}

/// `DELETE /api/users/{id}`
///
/// Unassigns the user's tasks and responds with the deleted user.
///
/// # Errors
///
/// - 404 `User not found`
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<EnvelopeResponse, ApiErrorResponse> {
    let user_id = parse_user_id(&id)?;
    let user = state.assignments.delete_user(&user_id).await?;
    Ok(respond(
        StatusCode::OK,
        "User deleted successfully",
        render(&user, &Projection::All)?,
    ))
}
