//! Infrastructure module for document storage.
//!
//! This module contains the repository trait, its in-memory and `PostgreSQL`
//! implementations, and the factory that picks one at startup.

pub mod factory;
pub mod in_memory;
pub mod postgres;
pub mod repository;
pub mod sql;

pub use factory::{
    ConfigurationError, FactoryError, Repositories, RepositoryConfig, RepositoryFactory,
    StorageMode,
};
pub use in_memory::InMemoryRepository;
pub use postgres::PostgresRepository;
pub use repository::{
    DocumentRepository, FindQuery, RepositoryError, RepositoryFuture, TaskRepository,
    UserRepository, apply_window,
};
