//! In-memory repository implementation.
//!
//! Documents live in an insertion-ordered map behind a `tokio` `RwLock`.
//! Queries serialize each document to JSON and evaluate the filter and sort
//! with the domain query engine, so results match the `PostgreSQL` backend
//! for the supported operators.
//!
//! # Features
//!
//! - Thread-safe with `Arc<RwLock<...>>`
//! - Insertion order preserved across replace and delete
//! - Optimistic locking with version checking
//! - Unique-field enforcement for `Document::UNIQUE_FIELD`

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::domain::{Document, Filter};
use crate::infrastructure::repository::{
    DocumentRepository, FindQuery, RepositoryError, RepositoryFuture, apply_window,
};

/// In-memory implementation of `DocumentRepository`.
///
/// # Example
///
/// ```ignore
/// let repository = InMemoryRepository::<Task>::new();
/// repository.insert(&task).await?;
/// let found = repository.find_by_id(&task.task_id).await?;
/// ```
pub struct InMemoryRepository<D: Document> {
    documents: Arc<RwLock<IndexMap<D::Id, D>>>,
}

impl<D: Document> InMemoryRepository<D> {
    /// Creates a new empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self {
            documents: Arc::new(RwLock::new(IndexMap::new())),
        }
    }
}

impl<D: Document> Default for InMemoryRepository<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Document> Clone for InMemoryRepository<D> {
    fn clone(&self) -> Self {
        Self {
            documents: Arc::clone(&self.documents),
        }
    }
}

/// Rejects `candidate` if another document already holds its unique value.
fn check_unique<D: Document>(
    documents: &IndexMap<D::Id, D>,
    candidate: &D,
) -> Result<(), RepositoryError> {
    let Some(field) = D::UNIQUE_FIELD else {
        return Ok(());
    };
    let candidate_value = serde_json::to_value(candidate)?;
    let Some(expected) = candidate_value.get(field) else {
        return Ok(());
    };

    for (id, other) in documents {
        if id == candidate.id() {
            continue;
        }
        if serde_json::to_value(other)?.get(field) == Some(expected) {
            return Err(RepositoryError::DuplicateKey(field.to_string()));
        }
    }
    Ok(())
}

/// Collects the documents matching `filter` together with their JSON form.
fn matching<D: Document>(
    documents: &IndexMap<D::Id, D>,
    filter: &Filter,
) -> Result<Vec<(Value, D)>, RepositoryError> {
    let mut matched = Vec::new();
    for document in documents.values() {
        let value = serde_json::to_value(document)?;
        if filter.matches(&value) {
            matched.push((value, document.clone()));
        }
    }
    Ok(matched)
}

#[allow(clippy::significant_drop_tightening)]
impl<D: Document> DocumentRepository<D> for InMemoryRepository<D> {
    fn find_by_id(&self, id: &D::Id) -> RepositoryFuture<Option<D>> {
        let documents = Arc::clone(&self.documents);
        let id = id.clone();
        Box::pin(async move {
            let guard = documents.read().await;
            Ok(guard.get(&id).cloned())
        })
    }

    fn find(&self, query: &FindQuery) -> RepositoryFuture<Vec<D>> {
        let documents = Arc::clone(&self.documents);
        let query = query.clone();
        Box::pin(async move {
            let mut matched = {
                let guard = documents.read().await;
                matching(&guard, &query.filter)?
            };

            if !query.sort.is_empty() {
                // Stable sort keeps insertion order among equal keys.
                matched.sort_by(|(left, _), (right, _)| query.sort.compare(left, right));
            }

            Ok(apply_window(matched, query.skip, query.limit)
                .into_iter()
                .map(|(_, document)| document)
                .collect())
        })
    }

    fn count(&self, filter: &Filter) -> RepositoryFuture<u64> {
        let documents = Arc::clone(&self.documents);
        let filter = filter.clone();
        Box::pin(async move {
            let guard = documents.read().await;
            let matched = matching(&guard, &filter)?;
            Ok(matched.len() as u64)
        })
    }

    fn insert(&self, document: &D) -> RepositoryFuture<()> {
        let documents = Arc::clone(&self.documents);
        let document = document.clone();
        Box::pin(async move {
            let mut guard = documents.write().await;

            if guard.contains_key(document.id()) {
                return Err(RepositoryError::DuplicateKey("_id".to_string()));
            }
            if document.version() != 0 {
                return Err(RepositoryError::VersionConflict {
                    expected: 0,
                    found: document.version(),
                });
            }
            check_unique(&guard, &document)?;

            guard.insert(document.id().clone(), document);
            Ok(())
        })
    }

    fn replace(&self, document: &D) -> RepositoryFuture<()> {
        let documents = Arc::clone(&self.documents);
        let document = document.clone();
        Box::pin(async move {
            let mut guard = documents.write().await;

            let existing_version = guard
                .get(document.id())
                .map(Document::version)
                .ok_or_else(|| RepositoryError::NotFound(document.id().to_string()))?;

            if document.version() != existing_version + 1 {
                return Err(RepositoryError::VersionConflict {
                    expected: existing_version + 1,
                    found: document.version(),
                });
            }
            check_unique(&guard, &document)?;

            // Replacing an existing key keeps its position in the map.
            guard.insert(document.id().clone(), document);
            Ok(())
        })
    }

    fn delete(&self, id: &D::Id) -> RepositoryFuture<Option<D>> {
        let documents = Arc::clone(&self.documents);
        let id = id.clone();
        Box::pin(async move {
            let mut guard = documents.write().await;
            Ok(guard.shift_remove(&id))
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
