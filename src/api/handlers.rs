//! Shared application state and the handlers that are not tied to one
//! collection.

use std::sync::Arc;

use axum::{Json, http::StatusCode};
use serde::Serialize;
use serde_json::{Value, json};

use super::dto::{CountResponse, Envelope};
use super::error::ApiErrorResponse;
use super::query::{ListParams, SelectParams};
use crate::application::AssignmentService;
use crate::domain::Document;
use crate::infrastructure::factory::{ConfigurationError, parse_number, process_env};
use crate::infrastructure::{DocumentRepository, Repositories, TaskRepository, UserRepository};

// =============================================================================
// Application Configuration
// =============================================================================

/// Default `limit` for `GET /api/tasks`.
pub const DEFAULT_TASK_LIMIT: u64 = 100;

/// Application configuration for runtime settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    /// Limit applied to task lists without `limit`; `None` is unlimited.
    pub default_task_limit: Option<u64>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_task_limit: Some(DEFAULT_TASK_LIMIT),
        }
    }
}

impl AppConfig {
    /// Reads `DEFAULT_TASK_LIMIT` (`0` disables the limit).
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::InvalidNumber` if the value is not a number.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(process_env)
    }

    /// Reads the configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// See [`AppConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigurationError> {
        let limit = parse_number(&lookup, "DEFAULT_TASK_LIMIT", DEFAULT_TASK_LIMIT)?;
        Ok(Self {
            default_task_limit: (limit > 0).then_some(limit),
        })
    }
}

// =============================================================================
// Application State
// =============================================================================

/// Shared application dependencies.
///
/// Repositories are trait objects so the backend can be chosen at runtime.
/// Reads go to the repositories directly; every mutation goes through
/// `assignments`.
#[derive(Clone)]
pub struct AppState {
    /// Task documents.
    pub task_repository: Arc<TaskRepository>,
    /// User documents.
    pub user_repository: Arc<UserRepository>,
    /// Relationship-maintaining mutations.
    pub assignments: AssignmentService,
    /// Application configuration.
    pub config: AppConfig,
}

impl AppState {
    /// Creates a new `AppState` from initialized repositories.
    #[must_use]
    pub fn from_repositories(repositories: Repositories) -> Self {
        Self::with_config(repositories, AppConfig::default())
    }

    /// Creates a new `AppState` from repositories and custom configuration.
    #[must_use]
    pub fn with_config(repositories: Repositories, config: AppConfig) -> Self {
        Self {
            assignments: AssignmentService::new(&repositories),
            task_repository: repositories.task_repository,
            user_repository: repositories.user_repository,
            config,
        }
    }
}

// =============================================================================
// Shared Read Helpers
// =============================================================================

/// JSON response with the envelope.
pub type EnvelopeResponse = (StatusCode, Json<Envelope<Value>>);

/// Wraps `data` in an envelope with the given status and message.
pub fn respond(status: StatusCode, message: &str, data: Value) -> EnvelopeResponse {
    (status, Json(Envelope::new(message, data)))
}

/// Serializes a document and applies `select`.
///
/// # Errors
///
/// Returns 500 if the document cannot be serialized.
pub fn render<D: Serialize>(
    document: &D,
    projection: &crate::domain::Projection,
) -> Result<Value, ApiErrorResponse> {
    let value = serde_json::to_value(document).map_err(|error| {
        tracing::error!(%error, "document serialization failed");
        ApiErrorResponse::internal_error()
    })?;
    Ok(projection.apply(value))
}

/// Runs a list request against any collection.
///
/// # Errors
///
/// Returns 400 for malformed parameters and 500 for storage failures.
pub async fn list_documents<D: Document>(
    repository: &dyn DocumentRepository<D>,
    params: &ListParams,
    default_limit: Option<u64>,
) -> Result<EnvelopeResponse, ApiErrorResponse> {
    let request = params.parse(default_limit)?;

    if request.count_only {
        let count = repository.count(&request.query.filter).await?;
        return Ok(respond(StatusCode::OK, "OK", json!(CountResponse { count })));
    }

    let documents = repository.find(&request.query).await?;
    let data = documents
        .iter()
        .map(|document| render(document, &request.projection))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(respond(StatusCode::OK, "OK", Value::Array(data)))
}

/// Loads one document by its raw path id.
///
/// Ids that do not parse are reported like missing documents.
///
/// # Errors
///
/// Returns 404 with `not_found_message`, 400 for a bad `select`, and 500 for
/// storage failures.
pub async fn get_document<D: Document>(
    repository: &dyn DocumentRepository<D>,
    raw_id: &str,
    params: &SelectParams,
    not_found_message: &str,
) -> Result<EnvelopeResponse, ApiErrorResponse>
where
    D::Id: std::str::FromStr,
{
    let projection = params.projection()?;
    let Ok(id) = raw_id.parse::<D::Id>() else {
        return Err(ApiErrorResponse::not_found(not_found_message));
    };
    let document = repository
        .find_by_id(&id)
        .await?
        .ok_or_else(|| ApiErrorResponse::not_found(not_found_message))?;
    Ok(respond(StatusCode::OK, "OK", render(&document, &projection)?))
}

// =============================================================================
// GET /health Handler
// =============================================================================

/// Health check response body.
#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: &'static str,
    /// Service version.
    pub version: &'static str,
}

/// Health check endpoint.
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0"
/// }
/// ```
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// =============================================================================
// GET /api Handler
// =============================================================================

/// Lists the available routes.
pub async fn api_index() -> EnvelopeResponse {
    respond(
        StatusCode::OK,
        "OK",
        json!({
            "tasks": "/api/tasks",
            "users": "/api/users",
            "parameters": ["where", "sort", "select", "skip", "limit", "count"],
        }),
    )
}

/// Fallback for unknown routes.
pub async fn route_not_found() -> ApiErrorResponse {
    ApiErrorResponse::not_found("Route not found")
}

/// Known path, unsupported method.
pub async fn method_not_allowed() -> ApiErrorResponse {
    ApiErrorResponse::new(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed", Value::Null)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(&[], Some(100))]
    #[case(&[("DEFAULT_TASK_LIMIT", "25")], Some(25))]
    #[case(&[("DEFAULT_TASK_LIMIT", "0")], None)]
    #[case(&[("DEFAULT_TASK_LIMIT", " ")], Some(100))]
    fn test_app_config_from_lookup(
        #[case] pairs: &[(&str, &str)],
        #[case] expected: Option<u64>,
    ) {
        let pairs: Vec<(String, String)> = pairs
            .iter()
            .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
            .collect();
        let config = AppConfig::from_lookup(|name| {
            pairs
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.clone())
        })
        .unwrap();
        assert_eq!(config.default_task_limit, expected);
    }

    #[rstest]
    fn test_app_config_rejects_garbage() {
        let result = AppConfig::from_lookup(|_| Some("lots".to_string()));
        assert!(matches!(result, Err(ConfigurationError::InvalidNumber { .. })));
    }

    #[rstest]
    #[tokio::test]
    async fn test_health_check() {
        let Json(response) = health_check().await;
        assert_eq!(response.status, "healthy");
        assert_eq!(response.version, env!("CARGO_PKG_VERSION"));
    }

    #[rstest]
    #[tokio::test]
    async fn test_api_index_lists_collections() {
        let (status, Json(envelope)) = api_index().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(envelope.message, "OK");
        assert_eq!(envelope.data["tasks"], "/api/tasks");
    }
}
