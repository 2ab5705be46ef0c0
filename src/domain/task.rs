//! Task domain model.
//!
//! A task is stored and served as a flat JSON document. Field names on the
//! wire are camelCase, the identifier lives under `_id` and the document
//! version under `__v`.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use super::document::Document;
use super::user::UserId;

/// Name stored in `assignedUserName` when a task has no assignee.
pub const UNASSIGNED_NAME: &str = "unassigned";

// =============================================================================
// Value Objects - Newtypes
// =============================================================================

/// Unique identifier for a task.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Creates a `TaskId` from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Generates a new `TaskId` with a time-ordered UUID (v7).
    #[must_use]
    pub fn generate_v7() -> Self {
        Self(Uuid::now_v7())
    }
}

impl FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(value.trim()).map(Self)
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// A UTC timestamp serialized as RFC 3339 with millisecond precision.
///
/// Every stored timestamp uses the same textual layout, so comparing two
/// serialized values lexically gives the same answer as comparing the
/// instants. Filters such as `{"deadline": {"$lt": "2026-01-01T00:00:00.000Z"}}`
/// rely on this.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Creates a `Timestamp` from a `DateTime<Utc>`, truncated to milliseconds.
    #[must_use]
    pub fn from_datetime(datetime: DateTime<Utc>) -> Self {
        let millis = datetime.timestamp_millis();
        Self(Utc.timestamp_millis_opt(millis).single().unwrap_or(datetime))
    }

    /// Returns the current time.
    #[must_use]
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    /// Returns the inner `DateTime<Utc>`.
    #[must_use]
    pub const fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Parses a client supplied date.
    ///
    /// Accepts RFC 3339 strings, bare `YYYY-MM-DD` dates (midnight UTC) and
    /// integer epoch milliseconds.
    ///
    /// # Errors
    ///
    /// Returns a human readable message when the value is not a date.
    pub fn parse_input(value: &serde_json::Value) -> Result<Self, String> {
        match value {
            serde_json::Value::String(text) => Self::parse_text(text),
            serde_json::Value::Number(number) => number
                .as_i64()
                .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
                .map(Self)
                .ok_or_else(|| format!("{number} is not a valid epoch timestamp")),
            other => Err(format!("expected a date, found {other}")),
        }
    }

    fn parse_text(text: &str) -> Result<Self, String> {
        let trimmed = text.trim();
        if let Ok(datetime) = DateTime::parse_from_rfc3339(trimmed) {
            return Ok(Self::from_datetime(datetime.with_timezone(&Utc)));
        }
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
            && let Some(midnight) = date.and_hms_opt(0, 0, 0)
        {
            return Ok(Self(Utc.from_utc_datetime(&midnight)));
        }
        if let Ok(millis) = trimmed.parse::<i64>()
            && let Some(datetime) = Utc.timestamp_millis_opt(millis).single()
        {
            return Ok(Self(datetime));
        }
        Err(format!("'{trimmed}' is not a valid date"))
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(&self.0.to_rfc3339_opts(SecondsFormat::Millis, true))
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse_text(&text).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter storing an optional assignee as `""` when absent.
mod assignee {
    use std::str::FromStr;

    use serde::{Deserialize, Deserializer, Serializer};

    use crate::domain::user::UserId;

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(value: &Option<UserId>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(user_id) => serializer.collect_str(user_id),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<UserId>, D::Error> {
        let text = String::deserialize(deserializer)?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        UserId::from_str(&text)
            .map(Some)
            .map_err(serde::de::Error::custom)
    }
}

fn unassigned_name() -> String {
    UNASSIGNED_NAME.to_string()
}

// =============================================================================
// Task Entity
// =============================================================================

/// A task document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique identifier.
    #[serde(rename = "_id")]
    pub task_id: TaskId,
    /// Task name (never blank).
    pub name: String,
    /// Free-form description, empty by default.
    #[serde(default)]
    pub description: String,
    /// When the task is due.
    pub deadline: Timestamp,
    /// Whether the task is done.
    #[serde(default)]
    pub completed: bool,
    /// The user the task is assigned to.
    #[serde(default, with = "assignee")]
    pub assigned_user: Option<UserId>,
    /// Cached name of the assigned user.
    #[serde(default = "unassigned_name")]
    pub assigned_user_name: String,
    /// Creation time.
    pub date_created: Timestamp,
    /// Document version for optimistic locking.
    #[serde(rename = "__v", default)]
    pub version: u64,
}

impl Task {
    /// Creates a new, unassigned and incomplete task at version 0.
    #[must_use]
    pub fn new(
        task_id: TaskId,
        name: impl Into<String>,
        deadline: Timestamp,
        date_created: Timestamp,
    ) -> Self {
        Self {
            task_id,
            name: name.into(),
            description: String::new(),
            deadline,
            completed: false,
            assigned_user: None,
            assigned_user_name: unassigned_name(),
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

    /// Returns a copy with a new description.
    #[must_use]
    pub fn with_description(self, description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..self
        }
    }

    /// Returns a copy with a new deadline.
    #[must_use]
    pub fn with_deadline(self, deadline: Timestamp) -> Self {
        Self { deadline, ..self }
    }

    /// Returns a copy with the completion flag set.
    #[must_use]
    pub fn with_completed(self, completed: bool) -> Self {
        Self { completed, ..self }
    }

    /// Returns a copy assigned to the given user.
    #[must_use]
    pub fn assign_to(self, user_id: UserId, user_name: impl Into<String>) -> Self {
        Self {
            assigned_user: Some(user_id),
            assigned_user_name: user_name.into(),
            ..self
        }
    }

    /// Returns a copy with no assignee.
    #[must_use]
    pub fn unassign(self) -> Self {
        Self {
            assigned_user: None,
            assigned_user_name: unassigned_name(),
            ..self
        }
    }

    /// Returns a copy with the version incremented.
    ///
    /// Repositories accept a replacement only when its version is exactly
    /// one above the stored version.
    #[must_use]
    pub fn next_version(self) -> Self {
        Self {
            version: self.version + 1,
            ..self
        }
    }

    /// A task is pending when it is assigned and not completed.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        !self.completed && self.assigned_user.is_some()
    }

    /// Returns true if the task is assigned to `user_id`.
    #[must_use]
    pub fn is_assigned_to(&self, user_id: &UserId) -> bool {
        self.assigned_user.as_ref() == Some(user_id)
    }
}

impl Document for Task {
    type Id = TaskId;

    const COLLECTION: &'static str = "tasks";

    fn id(&self) -> &TaskId {
        &self.task_id
    }

    fn uuid(id: &TaskId) -> Uuid {
        *id.as_uuid()
    }

    fn version(&self) -> u64 {
        self.version
    }
}

// =============================================================================
// Tests
// =============================================================================
