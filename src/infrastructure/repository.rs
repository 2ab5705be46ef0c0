//! Repository traits for stored documents.
//!
//! Every method returns a boxed `'static` future: implementations clone what
//! they need (pool handles, `Arc`s, the query) before building the future, so
//! callers can hold the future across other awaits without borrowing the
//! repository.

use futures::future::BoxFuture;
use thiserror::Error;

use crate::domain::{Document, Filter, SortSpec, Task, User};

// =============================================================================
// Repository Error
// =============================================================================

/// Errors that can occur during repository operations.
#[derive(Debug, Error, Clone)]
pub enum RepositoryError {
    /// Entity was not found.
    #[error("Entity not found: {0}")]
    NotFound(String),

    /// Optimistic locking conflict.
    #[error("Version conflict: expected {expected}, found {found}")]
    VersionConflict { expected: u64, found: u64 },

    /// A unique field (or the id) already holds this value.
    #[error("Duplicate value for unique field '{0}'")]
    DuplicateKey(String),

    /// Database connection or query error.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for RepositoryError {
    fn from(error: serde_json::Error) -> Self {
        Self::SerializationError(error.to_string())
    }
}

// =============================================================================
// Find Query
// =============================================================================

/// Filter, order, and window for a `find` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindQuery {
    /// Which documents to return.
    pub filter: Filter,
    /// Result order; empty keeps insertion order.
    pub sort: SortSpec,
    /// Number of matching documents to skip.
    pub skip: u64,
    /// Maximum number of documents to return; `None` is unlimited.
    pub limit: Option<u64>,
}

impl FindQuery {
    /// A query returning every document in insertion order.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// A query returning every document that matches `filter`.
    #[must_use]
    pub fn with_filter(filter: Filter) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    /// Sets the sort specification.
    #[must_use]
    pub fn sorted_by(self, sort: SortSpec) -> Self {
        Self { sort, ..self }
    }

    /// Sets the window.
    #[must_use]
    pub fn window(self, skip: u64, limit: Option<u64>) -> Self {
        Self {
            skip,
            limit,
            ..self
        }
    }
}

/// Applies `skip` and `limit` to an already filtered and sorted list.
#[must_use]
pub fn apply_window<T>(items: Vec<T>, skip: u64, limit: Option<u64>) -> Vec<T> {
    let skip = usize::try_from(skip).unwrap_or(usize::MAX);
    let limit = limit.map_or(usize::MAX, |limit| {
        usize::try_from(limit).unwrap_or(usize::MAX)
    });
    items.into_iter().skip(skip).take(limit).collect()
}

// =============================================================================
// Document Repository
// =============================================================================

/// Future returned by repository operations.
pub type RepositoryFuture<T> = BoxFuture<'static, Result<T, RepositoryError>>;

/// Storage for one collection of documents.
pub trait DocumentRepository<D: Document>: Send + Sync {
    /// Finds a document by its id.
    ///
    /// Returns `Ok(None)` if no document has this id.
    fn find_by_id(&self, id: &D::Id) -> RepositoryFuture<Option<D>>;

    /// Returns the documents matching the query, ordered and windowed.
    fn find(&self, query: &FindQuery) -> RepositoryFuture<Vec<D>>;

    /// Counts the documents matching `filter`.
    fn count(&self, filter: &Filter) -> RepositoryFuture<u64>;

    /// Inserts a new document.
    ///
    /// # Errors
    ///
    /// - `DuplicateKey` if the id or the unique field is already taken.
    /// - `VersionConflict` if the document version is not 0.
    fn insert(&self, document: &D) -> RepositoryFuture<()>;

    /// Replaces a stored document.
    ///
    /// The new version must be exactly one above the stored version.
    ///
    /// # Errors
    ///
    /// - `NotFound` if no document has this id.
    /// - `VersionConflict` if the version check fails.
    /// - `DuplicateKey` if the unique field collides with another document.
    fn replace(&self, document: &D) -> RepositoryFuture<()>;

    /// Deletes a document, returning it if it existed.
    fn delete(&self, id: &D::Id) -> RepositoryFuture<Option<D>>;
}

/// Repository of task documents.
pub type TaskRepository = dyn DocumentRepository<Task>;

/// Repository of user documents.
pub type UserRepository = dyn DocumentRepository<User>;

// =============================================================================
// Tests
// =============================================================================
