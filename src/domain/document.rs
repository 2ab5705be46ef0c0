//! The contract shared by every stored document type.

use std::fmt::Display;
use std::hash::Hash;

use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

/// A JSON document that lives in a named collection.
///
/// Repositories are generic over this trait so the in-memory and
/// `PostgreSQL` backends serve tasks and users with the same code.
pub trait Document: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Identifier type.
    type Id: Clone + Eq + Hash + Display + Send + Sync + 'static;

    /// Collection (and table) name.
    const COLLECTION: &'static str;

    /// Top-level field whose value must be unique across the collection.
    const UNIQUE_FIELD: Option<&'static str> = None;

    /// Returns the document identifier.
    fn id(&self) -> &Self::Id;

    /// Returns the UUID backing an identifier.
    fn uuid(id: &Self::Id) -> Uuid;

    /// Returns the document version.
    fn version(&self) -> u64;
}
