//! Tasklink API Library
//!
//! Core of the tasklink service: task and user documents, a JSON
//! query language over them, interchangeable storage backends, and the HTTP
//! layer that ties them together.

pub mod api;
pub mod application;
pub mod domain;
pub mod infrastructure;
