//! Domain module for task and user documents.
//!
//! This module contains the document models and the query language used to
//! filter, sort, and project them.

pub mod document;
pub mod query;
pub mod task;
pub mod user;

pub use document::Document;
pub use query::{
    Condition, FieldPath, Filter, Projection, QueryError, SortDirection, SortKey, SortSpec,
};
pub use task::{Task, TaskId, Timestamp, UNASSIGNED_NAME};
pub use user::{User, UserId, normalize_email};
