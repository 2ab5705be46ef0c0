//! Application services.
//!
//! Workflows that touch both collections live here so that handlers only
//! translate between HTTP and these calls.

pub mod assignment;

pub use assignment::{AssignmentService, TaskDraft, UserDraft, WorkflowError};
