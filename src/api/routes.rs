//! Route configuration.
//!
//! # Routes
//!
//! | Method | Path | Handler | Description |
//! |--------|------|---------|-------------|
//! | GET | /health | `health_check` | Health check endpoint |
//! | GET | /api | `api_index` | Route listing |
//! | GET | /api/tasks | `list_tasks` | Query tasks |
//! | POST | /api/tasks | `create_task` | Create a task |
//! | GET | /api/tasks/{id} | `get_task` | Get one task |
//! | PUT | /api/tasks/{id} | `replace_task` | Replace a task |
//! | DELETE | /api/tasks/{id} | `delete_task` | Delete a task |
//! | GET | /api/users | `list_users` | Query users |
//! | POST | /api/users | `create_user` | Create a user |
//! | GET | /api/users/{id} | `get_user` | Get one user |
//! | PUT | /api/users/{id} | `replace_user` | Replace a user |
//! | DELETE | /api/users/{id} | `delete_user` | Delete a user |

use axum::Router;
use axum::routing::get;

use super::handlers::{AppState, api_index, health_check, method_not_allowed, route_not_found};
use super::tasks::{create_task, delete_task, get_task, list_tasks, replace_task};
use super::users::{create_user, delete_user, get_user, list_users, replace_user};

/// Creates the router with all API routes.
///
/// Tracing and CORS layers are added by the binary so tests can drive the
/// bare router.
///
/// # Example
///
/// ```rust,ignore
/// let state = AppState::from_repositories(Repositories::in_memory());
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:4000").await?;
/// axum::serve(listener, create_router(state)).await?;
/// ```
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api", get(api_index))
        // Task routes
        .route("/api/tasks", get(list_tasks).post(create_task))
        .route(
            "/api/tasks/{id}",
            get(get_task).put(replace_task).delete(delete_task),
        )
        // User routes
        .route("/api/users", get(list_users).post(create_user))
        .route(
            "/api/users/{id}",
            get(get_user).put(replace_user).delete(delete_user),
        )
        .method_not_allowed_fallback(method_not_allowed)
        .fallback(route_not_found)
        .with_state(state)
}
