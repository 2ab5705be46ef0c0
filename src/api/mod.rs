//! API module for HTTP handlers.
//!
//! This module contains route definitions and request/response handlers.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod query;
pub mod routes;
pub mod tasks;
pub mod users;

pub use dto::{CountResponse, Envelope, TaskRequest, UserRequest};
pub use error::{ApiErrorResponse, FieldError, ValidationError};
pub use handlers::{AppConfig, AppState, HealthResponse, api_index, health_check};
pub use query::{ListParams, ListRequest, SelectParams};
pub use routes::create_router;
pub use tasks::{create_task, delete_task, get_task, list_tasks, replace_task};
pub use users::{create_user, delete_user, get_user, list_users, replace_user};
