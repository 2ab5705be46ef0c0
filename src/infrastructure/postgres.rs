//! `PostgreSQL` repository implementation.
//!
//! This module provides a `PostgreSQL`-based implementation of
//! `DocumentRepository` using `sqlx`. One table per collection stores each
//! document as `JSONB`; filters and sorts are compiled to SQL by
//! [`crate::infrastructure::sql`].
//!
//! # Features
//!
//! - Connection pooling with `sqlx::PgPool`
//! - JSONB storage queried with bound `text[]` paths
//! - Optimistic locking with version checking
//! - Unique index for `Document::UNIQUE_FIELD`
//!
//! # Table Schema
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS tasks (
//!     id UUID PRIMARY KEY,
//!     data JSONB NOT NULL,
//!     version BIGINT NOT NULL DEFAULT 0,
//!     seq BIGSERIAL NOT NULL,
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//!
//! -- users has the same columns plus
//! CREATE UNIQUE INDEX IF NOT EXISTS users_email_key ON users ((lower(data->>'email')));
//! ```

use std::marker::PhantomData;

use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::domain::{Document, Filter};
use crate::infrastructure::repository::{
    DocumentRepository, FindQuery, RepositoryError, RepositoryFuture,
};
use crate::infrastructure::sql::{push_filter, push_order_by, push_window};

/// Maps a `sqlx` error, recognising unique violations.
fn database_error<D: Document>(error: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(database_error) = &error
        && database_error.is_unique_violation()
    {
        let field = match database_error.constraint() {
            Some(constraint) if constraint.ends_with("_pkey") => "_id",
            _ => D::UNIQUE_FIELD.unwrap_or("_id"),
        };
        return RepositoryError::DuplicateKey(field.to_string());
    }
    RepositoryError::DatabaseError(error.to_string())
}

/// `PostgreSQL` implementation of `DocumentRepository`.
///
/// # Example
///
/// ```ignore
/// let pool = PgPool::connect("postgres://localhost/tasklink").await?;
/// let repository = PostgresRepository::<Task>::new(pool);
/// repository.ensure_schema().await?;
/// repository.insert(&task).await?;
/// ```
pub struct PostgresRepository<D: Document> {
    /// Connection pool for `PostgreSQL`.
    pool: PgPool,
    document: PhantomData<fn() -> D>,
}

impl<D: Document> Clone for PostgresRepository<D> {
    fn clone(&self) -> Self {
        Self::new(self.pool.clone())
    }
}

impl<D: Document> PostgresRepository<D> {
    /// Creates a repository for `D::COLLECTION` on the given pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self {
            pool,
            document: PhantomData,
        }
    }

    /// Returns the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates the collection table and its unique index if missing.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if a DDL statement fails.
    pub async fn ensure_schema(&self) -> Result<(), RepositoryError> {
        let table = D::COLLECTION;
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (\
                 id UUID PRIMARY KEY, \
                 data JSONB NOT NULL, \
                 version BIGINT NOT NULL DEFAULT 0, \
                 seq BIGSERIAL NOT NULL, \
                 created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(), \
                 updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW())"
        ))
        .execute(&self.pool)
        .await
        .map_err(|error| RepositoryError::DatabaseError(error.to_string()))?;

        if let Some(field) = D::UNIQUE_FIELD {
            sqlx::query(&format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS {table}_{field}_key \
                 ON {table} ((lower(data->>'{field}')))"
            ))
            .execute(&self.pool)
            .await
            .map_err(|error| RepositoryError::DatabaseError(error.to_string()))?;
        }

        tracing::debug!(collection = table, "schema ensured");
        Ok(())
    }
}

fn decode<D: Document>(data: serde_json::Value) -> Result<D, RepositoryError> {
    serde_json::from_value(data)
        .map_err(|error| RepositoryError::SerializationError(error.to_string()))
}

impl<D: Document> DocumentRepository<D> for PostgresRepository<D> {
    fn find_by_id(&self, id: &D::Id) -> RepositoryFuture<Option<D>> {
        let pool = self.pool.clone();
        let id = D::uuid(id);

        Box::pin(async move {
            let row: Option<(serde_json::Value,)> = sqlx::query_as(&format!(
                "SELECT data FROM {} WHERE id = $1",
                D::COLLECTION
            ))
            .bind(id)
            .fetch_optional(&pool)
            .await
            .map_err(|error| RepositoryError::DatabaseError(error.to_string()))?;

            row.map(|(data,)| decode(data)).transpose()
        })
    }

    fn find(&self, query: &FindQuery) -> RepositoryFuture<Vec<D>> {
        let pool = self.pool.clone();
        let query = query.clone();

        Box::pin(async move {
            let mut builder =
                QueryBuilder::<Postgres>::new(format!("SELECT data FROM {} WHERE ", D::COLLECTION));
            push_filter(&mut builder, &query.filter);
            push_order_by(&mut builder, &query.sort);
            push_window(&mut builder, query.skip, query.limit);

            let rows: Vec<(serde_json::Value,)> = builder
                .build_query_as()
                .fetch_all(&pool)
                .await
                .map_err(|error| RepositoryError::DatabaseError(error.to_string()))?;

            rows.into_iter().map(|(data,)| decode(data)).collect()
        })
    }

    fn count(&self, filter: &Filter) -> RepositoryFuture<u64> {
        let pool = self.pool.clone();
        let filter = filter.clone();

        Box::pin(async move {
            let mut builder = QueryBuilder::<Postgres>::new(format!(
                "SELECT COUNT(*) FROM {} WHERE ",
                D::COLLECTION
            ));
            push_filter(&mut builder, &filter);

            let (count,): (i64,) = builder
                .build_query_as()
                .fetch_one(&pool)
                .await
                .map_err(|error| RepositoryError::DatabaseError(error.to_string()))?;

            Ok(u64::try_from(count).unwrap_or(0))
        })
    }

    fn insert(&self, document: &D) -> RepositoryFuture<()> {
        let pool = self.pool.clone();
        let document = document.clone();

        Box::pin(async move {
            if document.version() != 0 {
                return Err(RepositoryError::VersionConflict {
                    expected: 0,
                    found: document.version(),
                });
            }
            let data = serde_json::to_value(&document)?;

            sqlx::query(&format!(
                "INSERT INTO {} (id, data, version, created_at, updated_at) \
                 VALUES ($1, $2, 0, NOW(), NOW())",
                D::COLLECTION
            ))
            .bind(D::uuid(document.id()))
            .bind(&data)
            .execute(&pool)
            .await
            .map_err(database_error::<D>)?;

            Ok(())
        })
    }

    fn replace(&self, document: &D) -> RepositoryFuture<()> {
        let pool = self.pool.clone();
        let document = document.clone();

        Box::pin(async move {
            let data = serde_json::to_value(&document)?;
            let id = D::uuid(document.id());

            let mut transaction = pool
                .begin()
                .await
                .map_err(|error| RepositoryError::DatabaseError(error.to_string()))?;

            let existing_row: Option<(i64,)> = sqlx::query_as(&format!(
                "SELECT version FROM {} WHERE id = $1 FOR UPDATE",
                D::COLLECTION
            ))
            .bind(id)
            .fetch_optional(&mut *transaction)
            .await
            .map_err(|error| RepositoryError::DatabaseError(error.to_string()))?;

            let Some((existing_version,)) = existing_row else {
                return Err(RepositoryError::NotFound(document.id().to_string()));
            };

            #[allow(clippy::cast_sign_loss)]
            let expected_version = existing_version as u64 + 1;
            if document.version() != expected_version {
                return Err(RepositoryError::VersionConflict {
                    expected: expected_version,
                    found: document.version(),
                });
            }

            #[allow(clippy::cast_possible_wrap)]
            let new_version = document.version() as i64;
            sqlx::query(&format!(
                "UPDATE {} SET data = $1, version = $2, updated_at = NOW() WHERE id = $3",
                D::COLLECTION
            ))
            .bind(&data)
            .bind(new_version)
            .bind(id)
            .execute(&mut *transaction)
            .await
            .map_err(database_error::<D>)?;

            transaction
                .commit()
                .await
                .map_err(|error| RepositoryError::DatabaseError(error.to_string()))?;

            Ok(())
        })
    }

    fn delete(&self, id: &D::Id) -> RepositoryFuture<Option<D>> {
        let pool = self.pool.clone();
        let id = D::uuid(id);

        Box::pin(async move {
            let row: Option<(serde_json::Value,)> = sqlx::query_as(&format!(
                "DELETE FROM {} WHERE id = $1 RETURNING data",
                D::COLLECTION
            ))
            .bind(id)
            .fetch_optional(&pool)
            .await
            .map_err(|error| RepositoryError::DatabaseError(error.to_string()))?;

            row.map(|(data,)| decode(data)).transpose()
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SortSpec, Task, TaskId, Timestamp, User, UserId};
    use rstest::rstest;
    use serde_json::json;

    fn test_task(name: &str) -> Task {
        Task::new(
            TaskId::generate_v7(),
            name,
            Timestamp::parse_input(&json!("2026-03-01")).unwrap(),
            Timestamp::now(),
        )
    }

    async fn connect() -> PgPool {
        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/test".into());
        PgPool::connect(&database_url).await.unwrap()
    }

    #[rstest]
    fn test_task_serialization_roundtrip() {
        let task = test_task("Roundtrip").assign_to(UserId::generate_v7(), "Ada");
        let data = serde_json::to_value(&task).unwrap();
        let decoded: Task = decode(data).unwrap();
        assert_eq!(decoded, task);
    }

    #[rstest]
    fn test_decode_rejects_malformed_document() {
        let result = decode::<Task>(json!({"name": 3}));
        assert!(matches!(result, Err(RepositoryError::SerializationError(_))));
    }

    // Note: These tests require a running PostgreSQL instance.
    // They are disabled by default but can be enabled for integration testing.

    #[rstest]
    #[tokio::test]
    #[ignore = "Requires PostgreSQL instance"]
    async fn test_postgres_repository_insert_find_delete() {
        let repository = PostgresRepository::<Task>::new(connect().await);
        repository.ensure_schema().await.unwrap();

        let task = test_task("Postgres Task");
        repository.insert(&task).await.unwrap();

        let found = repository.find_by_id(&task.task_id).await.unwrap();
        assert_eq!(found, Some(task.clone()));

        let deleted = repository.delete(&task.task_id).await.unwrap();
        assert_eq!(deleted, Some(task.clone()));
        assert!(repository.find_by_id(&task.task_id).await.unwrap().is_none());
    }

    #[rstest]
    #[tokio::test]
    #[ignore = "Requires PostgreSQL instance"]
    async fn test_postgres_repository_version_conflict() {
        let repository = PostgresRepository::<Task>::new(connect().await);
        repository.ensure_schema().await.unwrap();

        let task = test_task("Versioned");
        repository.insert(&task).await.unwrap();

        let result = repository.replace(&task.clone().with_name("Stale")).await;
        assert!(matches!(result, Err(RepositoryError::VersionConflict { .. })));

        repository
            .replace(&task.clone().with_name("Fresh").next_version())
            .await
            .unwrap();

        let _ = repository.delete(&task.task_id).await;
    }

    #[rstest]
    #[tokio::test]
    #[ignore = "Requires PostgreSQL instance"]
    async fn test_postgres_repository_unique_email() {
        let repository = PostgresRepository::<User>::new(connect().await);
        repository.ensure_schema().await.unwrap();

        let email = format!("{}@example.com", UserId::generate_v7());
        let first = User::new(UserId::generate_v7(), "First", &email, Timestamp::now());
        let second = User::new(UserId::generate_v7(), "Second", &email, Timestamp::now());

        repository.insert(&first).await.unwrap();
        let result = repository.insert(&second).await;
        assert!(matches!(result, Err(RepositoryError::DuplicateKey(field)) if field == "email"));

        let _ = repository.delete(&first.user_id).await;
    }

    #[rstest]
    #[tokio::test]
    #[ignore = "Requires PostgreSQL instance"]
    async fn test_postgres_repository_find_with_query() {
        let repository = PostgresRepository::<Task>::new(connect().await);
        repository.ensure_schema().await.unwrap();

        let marker = TaskId::generate_v7().to_string();
        let tasks: Vec<Task> = ["b", "a", "c"]
            .into_iter()
            .map(|name| test_task(name).with_description(&marker))
            .collect();
        for task in &tasks {
            repository.insert(task).await.unwrap();
        }

        let filter = Filter::from_json(&json!({"description": marker})).unwrap();
        let query = FindQuery::with_filter(filter.clone())
            .sorted_by(SortSpec::from_json(&json!({"name": -1})).unwrap())
            .window(1, Some(1));
        let found = repository.find(&query).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "b");
        assert_eq!(repository.count(&filter).await.unwrap(), 3);

        for task in &tasks {
            let _ = repository.delete(&task.task_id).await;
        }
    }
}
