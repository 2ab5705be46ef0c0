//! Handlers for `/api/tasks`.

use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
};

use serde_json::Value;

use super::dto::TaskRequest;
use super::error::ApiErrorResponse;
use super::handlers::{AppState, EnvelopeResponse, get_document, list_documents, render, respond};
use super::query::{ListParams, SelectParams};
use crate::domain::{Projection, TaskId};

const NOT_FOUND: &str = "Task not found";

fn parse_task_id(raw: &str) -> Result<TaskId, ApiErrorResponse> {
    raw.parse()
        .map_err(|_| ApiErrorResponse::not_found(NOT_FOUND))
}

/// `GET /api/tasks`
///
/// Supports `where`, `sort`, `select`, `skip`, `limit` and `count`. Without
/// `limit`, at most `AppConfig::default_task_limit` tasks are returned.
///
/// # Errors
///
/// - 400 for malformed query parameters
/// - 500 for storage failures
pub async fn list_tasks(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<EnvelopeResponse, ApiErrorResponse> {
    let Query(params) = params?;
    list_documents(
        &*state.task_repository,
        &params,
        state.config.default_task_limit,
    )
    .await
}

/// `POST /api/tasks`
///
/// # Request Body
///
/// ```json
/// {
///   "name": "Write report",
///   "description": "optional",
///   "deadline": "2026-12-01T00:00:00.000Z",
///   "completed": false,
///   "assignedUser": "<user id or empty>"
/// }
/// ```
///
/// # Errors
///
/// - 400 `Validation Error` for a bad body or a missing assignee
/// - 500 for storage failures
pub async fn create_task(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<EnvelopeResponse, ApiErrorResponse> {
    let Json(body) = body?;
    let draft = TaskRequest::from_body(body)?.validate()?;

    let task = state.assignments.create_task(draft).await?;
    Ok(respond(
        StatusCode::CREATED,
        "Task created successfully",
        render(&task, &Projection::All)?,
    ))
}

/// `GET /api/tasks/{id}`
///
/// # Errors
///
/// - 404 `Task not found` for unknown or malformed ids
/// - 400 for a malformed `select`
pub async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    params: Result<Query<SelectParams>, QueryRejection>,
) -> Result<EnvelopeResponse, ApiErrorResponse> {
    let Query(params) = params?;
    get_document(&*state.task_repository, &id, &params, NOT_FOUND).await
}

/// `PUT /api/tasks/{id}`
///
/// Same body as `POST`. Absent optional fields keep their stored values.
///
/// # Errors
///
/// - 404 `Task not found`
/// - 400 `Validation Error`
/// - 409 `Conflict` if the task changed concurrently
pub async fn replace_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<EnvelopeResponse, ApiErrorResponse> {
    let task_id = parse_task_id(&id)?;
    let Json(body) = body?;
    let draft = TaskRequest::from_body(body)?.validate()?;

    let task = state.assignments.replace_task(&task_id, draft).await?;
    Ok(respond(
        StatusCode::OK,
        "Task updated successfully",
        render(&task, &Projection::All)?,
    ))
}

/// `DELETE /api/tasks/{id}`
///
/// Responds with the deleted task.
///
/// # Errors
///
/// - 404 `Task not found`
pub async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<EnvelopeResponse, ApiErrorResponse> {
    let task_id = parse_task_id(&id)?;
    let task = state.assignments.delete_task(&task_id).await?;
    Ok(respond(
        StatusCode::OK,
        "Task deleted successfully",
        render(&task, &Projection::All)?,
    ))
}
