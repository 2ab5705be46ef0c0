//! Repository factory for runtime backend selection.
//!
//! This module creates repository instances based on environment
//! configuration. It supports switching between the in-memory and
//! `PostgreSQL` backends at runtime.
//!
//! # Environment Variables
//!
//! - `STORAGE_MODE`: `in_memory` (default) | `postgres`
//! - `DATABASE_URL`: `PostgreSQL` connection URL (required when `STORAGE_MODE=postgres`)
//! - `DATABASE_MAX_CONNECTIONS`: pool size (default 10)
//!
//! # Example
//!
//! ```ignore
//! let config = RepositoryConfig::from_env()?;
//! let repositories = RepositoryFactory::new(config).create().await?;
//! let task = repositories.task_repository.find_by_id(&task_id).await?;
//! ```

use std::env;
use std::str::FromStr;
use std::sync::Arc;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use super::{
    InMemoryRepository, PostgresRepository, RepositoryError, TaskRepository, UserRepository,
};
use crate::domain::{Task, User};

/// Default size of the `PostgreSQL` connection pool.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

// =============================================================================
// Configuration Types
// =============================================================================

/// Storage mode for documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageMode {
    /// In-process storage. Data is lost on restart.
    #[default]
    InMemory,
    /// `PostgreSQL` storage for production use.
    Postgres,
}

impl FromStr for StorageMode {
    type Err = ConfigurationError;

    /// Parses a storage mode from a string.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::InvalidStorageMode` if the string is not recognized.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "in_memory" | "inmemory" | "memory" => Ok(Self::InMemory),
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            _ => Err(ConfigurationError::InvalidStorageMode(value.to_string())),
        }
    }
}

/// Reads a non-empty, trimmed variable through `lookup`.
pub fn non_empty(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Parses a numeric variable, falling back to `default` when unset.
///
/// # Errors
///
/// Returns `ConfigurationError::InvalidNumber` if the value does not parse.
pub fn parse_number<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T, ConfigurationError> {
    non_empty(lookup, name).map_or(Ok(default), |value| {
        value.parse().map_err(|_| ConfigurationError::InvalidNumber {
            name: name.to_string(),
            value,
        })
    })
}

/// Reads a variable from the process environment.
pub fn process_env(name: &str) -> Option<String> {
    env::var(name).ok()
}

/// Configuration for the repository factory.
///
/// Use `RepositoryConfigBuilder` for a fluent API to construct this.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryConfig {
    /// Where documents are stored.
    pub storage_mode: StorageMode,
    /// `PostgreSQL` connection URL (required when `storage_mode` is `Postgres`).
    pub database_url: Option<String>,
    /// Maximum number of pooled `PostgreSQL` connections.
    pub max_connections: u32,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            storage_mode: StorageMode::default(),
            database_url: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

impl RepositoryConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> RepositoryConfigBuilder {
        RepositoryConfigBuilder::default()
    }

    /// Creates a configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if:
    /// - `STORAGE_MODE` contains an invalid value
    /// - `DATABASE_MAX_CONNECTIONS` is not a number
    /// - `DATABASE_URL` is missing when `STORAGE_MODE=postgres`
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(process_env)
    }

    /// Creates a configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// See [`RepositoryConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigurationError> {
        let storage_mode = match non_empty(&lookup, "STORAGE_MODE") {
            Some(value) => value.parse()?,
            None => StorageMode::default(),
        };

        let config = Self {
            storage_mode,
            database_url: non_empty(&lookup, "DATABASE_URL"),
            max_connections: parse_number(
                &lookup,
                "DATABASE_MAX_CONNECTIONS",
                DEFAULT_MAX_CONNECTIONS,
            )?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if the database URL is missing for `Postgres`
    /// or the pool size is zero.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.storage_mode == StorageMode::Postgres && self.database_url.is_none() {
            return Err(ConfigurationError::MissingDatabaseUrl);
        }
        if self.max_connections == 0 {
            return Err(ConfigurationError::InvalidNumber {
                name: "DATABASE_MAX_CONNECTIONS".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

/// Builder for `RepositoryConfig`.
///
/// # Example
///
/// ```ignore
/// let config = RepositoryConfig::builder()
///     .storage_mode(StorageMode::Postgres)
///     .database_url("postgres://localhost/tasklink")
///     .build()?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct RepositoryConfigBuilder {
    storage_mode: StorageMode,
    database_url: Option<String>,
    max_connections: Option<u32>,
}

impl RepositoryConfigBuilder {
    /// Sets the storage mode.
    #[must_use]
    pub const fn storage_mode(mut self, mode: StorageMode) -> Self {
        self.storage_mode = mode;
        self
    }

    /// Sets the `PostgreSQL` database URL.
    #[must_use]
    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    /// Sets the pool size.
    #[must_use]
    pub const fn max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = Some(max_connections);
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if the configuration is invalid.
    pub fn build(self) -> Result<RepositoryConfig, ConfigurationError> {
        let config = RepositoryConfig {
            storage_mode: self.storage_mode,
            database_url: self.database_url,
            max_connections: self.max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS),
        };

        config.validate()?;
        Ok(config)
    }
}

// =============================================================================
// Error Types
// =============================================================================

/// Errors in environment configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// Invalid storage mode value.
    #[error("Invalid storage mode: '{0}'. Expected 'in_memory' or 'postgres'")]
    InvalidStorageMode(String),

    /// Missing `DATABASE_URL` when storage mode is Postgres.
    #[error("DATABASE_URL environment variable is required when STORAGE_MODE=postgres")]
    MissingDatabaseUrl,

    /// A numeric variable did not parse.
    #[error("Invalid value for {name}: '{value}'")]
    InvalidNumber { name: String, value: String },
}

/// Errors that can occur during factory initialization.
#[derive(Debug, Error)]
pub enum FactoryError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    DatabaseConnection(String),

    /// Creating tables or indexes failed.
    #[error("Schema initialization error: {0}")]
    Schema(#[from] RepositoryError),
}

// =============================================================================
// Repository Factory
// =============================================================================

/// Collection of initialized repositories.
#[derive(Clone)]
pub struct Repositories {
    /// Task documents.
    pub task_repository: Arc<TaskRepository>,
    /// User documents.
    pub user_repository: Arc<UserRepository>,
}

impl std::fmt::Debug for Repositories {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Repositories")
            .field("task_repository", &"Arc<dyn DocumentRepository<Task>>")
            .field("user_repository", &"Arc<dyn DocumentRepository<User>>")
            .finish()
    }
}

impl Repositories {
    /// Fresh in-memory repositories.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            task_repository: Arc::new(InMemoryRepository::<Task>::new()),
            user_repository: Arc::new(InMemoryRepository::<User>::new()),
        }
    }
}

/// Factory for creating repository instances based on configuration.
#[derive(Debug, Clone)]
pub struct RepositoryFactory {
    config: RepositoryConfig,
}

impl RepositoryFactory {
    /// Creates a new repository factory with the given configuration.
    #[must_use]
    pub const fn new(config: RepositoryConfig) -> Self {
        Self { config }
    }

    /// Creates a new repository factory from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `FactoryError::Configuration` if environment configuration is invalid.
    pub fn from_env() -> Result<Self, FactoryError> {
        let config = RepositoryConfig::from_env()?;
        Ok(Self::new(config))
    }

    /// Returns the configuration used by this factory.
    #[must_use]
    pub const fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    /// Creates all repositories based on the configuration.
    ///
    /// For `Postgres` this connects the pool and creates missing tables.
    ///
    /// # Errors
    ///
    /// Returns `FactoryError` if the connection or schema setup fails.
    pub async fn create(&self) -> Result<Repositories, FactoryError> {
        match self.config.storage_mode {
            StorageMode::InMemory => Ok(Repositories::in_memory()),
            StorageMode::Postgres => {
                let pool = self.create_postgres_pool().await?;
                Self::create_postgres_repositories(pool).await
            }
        }
    }

    /// Creates a `PostgreSQL` connection pool.
    async fn create_postgres_pool(&self) -> Result<PgPool, FactoryError> {
        let database_url = self
            .config
            .database_url
            .as_ref()
            .ok_or(ConfigurationError::MissingDatabaseUrl)?;

        PgPoolOptions::new()
            .max_connections(self.config.max_connections)
            .connect(database_url)
            .await
            .map_err(|error| FactoryError::DatabaseConnection(error.to_string()))
    }

    /// Creates `PostgreSQL`-backed repositories and their tables.
    async fn create_postgres_repositories(pool: PgPool) -> Result<Repositories, FactoryError> {
        let task_repository = PostgresRepository::<Task>::new(pool.clone());
        let user_repository = PostgresRepository::<User>::new(pool);
        task_repository.ensure_schema().await?;
        user_repository.ensure_schema().await?;

        Ok(Repositories {
            task_repository: Arc::new(task_repository),
            user_repository: Arc::new(user_repository),
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
