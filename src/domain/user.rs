//! User domain model.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::document::Document;
use super::task::{TaskId, Timestamp};

/// Unique identifier for a user.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    /// Creates a `UserId` from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Generates a new `UserId` with a time-ordered UUID (v7).
    #[must_use]
    pub fn generate_v7() -> Self {
        Self(Uuid::now_v7())
    }
}

impl FromStr for UserId {
    type Err = uuid::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(value.trim()).map(Self)
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Normalizes an email address for storage and uniqueness checks.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// A user document.
///
/// `pending_tasks` behaves as an ordered set: the constructors and mutators
/// never let the same task id appear twice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique identifier.
    #[serde(rename = "_id")]
    pub user_id: UserId,
    /// Display name.
    pub name: String,
    /// Email address, stored normalized (trimmed, lowercase).
    pub email: String,
    /// Ids of tasks assigned to this user that are not completed.
    #[serde(default)]
    pub pending_tasks: Vec<TaskId>,
    /// Creation time.
    pub date_created: Timestamp,
    /// Document version for optimistic locking.
    #[serde(rename = "__v", default)]
    pub version: u64,
}

impl User {
    /// Creates a new user with no pending tasks at version 0.
    #[must_use]
    pub fn new(
        user_id: UserId,
        name: impl Into<String>,
        email: &str,
        date_created: Timestamp,
    ) -> Self {
        Self {
            user_id,
            name: name.into(),
            email: normalize_email(email),
            pending_tasks: Vec::new(),
            date_created,
            version: 0,
        }
    }

    /// Returns a copy with a new name.
    #[must_use]
    pub fn with_name(self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self
        }
    }

    /// Returns a copy with a new (normalized) email.
    #[must_use]
    pub fn with_email(self, email: &str) -> Self {
        Self {
            email: normalize_email(email),
            ..self
        }
    }

    /// Returns a copy whose pending list is `task_ids` without duplicates.
    #[must_use]
    pub fn with_pending_tasks(self, task_ids: impl IntoIterator<Item = TaskId>) -> Self {
        let mut pending_tasks: Vec<TaskId> = Vec::new();
        for task_id in task_ids {
            if !pending_tasks.contains(&task_id) {
                pending_tasks.push(task_id);
            }
        }
        Self {
            pending_tasks,
            ..self
        }
    }

    /// Returns a copy with `task_id` appended to the pending list, if absent.
    #[must_use]
    pub fn add_pending_task(mut self, task_id: TaskId) -> Self {
        if !self.pending_tasks.contains(&task_id) {
            self.pending_tasks.push(task_id);
        }
        self
    }

    /// Returns a copy with `task_id` removed from the pending list.
    #[must_use]
    pub fn remove_pending_task(mut self, task_id: &TaskId) -> Self {
        self.pending_tasks.retain(|pending| pending != task_id);
        self
    }

    /// Returns true if `task_id` is in the pending list.
    #[must_use]
    pub fn has_pending_task(&self, task_id: &TaskId) -> bool {
        self.pending_tasks.contains(task_id)
    }

    /// Returns a copy with the version incremented.
    #[must_use]
    pub fn next_version(self) -> Self {
        Self {
            version: self.version + 1,
            ..self
        }
    }
}

impl Document for User {
    type Id = UserId;

    const COLLECTION: &'static str = "users";
    const UNIQUE_FIELD: Option<&'static str> = Some("email");

    fn id(&self) -> &UserId {
        &self.user_id
    }

    fn uuid(id: &UserId) -> Uuid {
        *id.as_uuid()
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn user() -> User {
        User::new(UserId::generate_v7(), "Ada", "  Ada@Example.COM ", Timestamp::now())
    }

    #[rstest]
    fn test_new_user_normalizes_email() {
        assert_eq!(user().email, "ada@example.com");
    }

    #[rstest]
    fn test_pending_tasks_are_deduplicated_in_order() {
        let first = TaskId::generate_v7();
        let second = TaskId::generate_v7();
        let user = user().with_pending_tasks(vec![
            first.clone(),
            second.clone(),
            first.clone(),
        ]);
        assert_eq!(user.pending_tasks, vec![first, second]);
    }

    #[rstest]
    fn test_add_and_remove_pending_task() {
        let task_id = TaskId::generate_v7();
        let user = user().add_pending_task(task_id.clone()).add_pending_task(task_id.clone());
        assert_eq!(user.pending_tasks.len(), 1);
        assert!(user.has_pending_task(&task_id));

        let user = user.remove_pending_task(&task_id);
        assert!(!user.has_pending_task(&task_id));
    }

    #[rstest]
    fn test_user_serializes_with_wire_field_names() {
        let task_id = TaskId::generate_v7();
        let user = user().add_pending_task(task_id.clone()).next_version();
        let value = serde_json::to_value(&user).unwrap();

        assert_eq!(value["_id"], json!(user.user_id.to_string()));
        assert_eq!(value["pendingTasks"], json!([task_id.to_string()]));
        assert_eq!(value["__v"], json!(1));
        assert!(value["dateCreated"].is_string());
    }
}
