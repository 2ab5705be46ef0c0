//! Task and user mutations that keep assignments consistent.
//!
//! A task's `assignedUser` and a user's `pendingTasks` describe the same
//! relationship from both sides. Every mutation here updates both sides so
//! that, after it returns:
//!
//! - a task id is in `user.pendingTasks` exactly when the task exists, is not
//!   completed, and is assigned to that user;
//! - `task.assignedUserName` is the assignee's current name, or
//!   `"unassigned"`;
//! - a task is pending for at most one user.
//!
//! All mutations run under one write gate, so interleaved requests within a
//! process cannot observe or produce a half-updated relationship.

use std::sync::Arc;

use serde_json::json;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::domain::{Filter, QueryError, Task, TaskId, Timestamp, User, UserId};
use crate::infrastructure::{
    FindQuery, Repositories, RepositoryError, TaskRepository, UserRepository,
};

// =============================================================================
// Drafts
// =============================================================================

/// Validated client input for creating or replacing a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDraft {
    /// Task name.
    pub name: String,
    /// `None` keeps the stored description (or `""` on create).
    pub description: Option<String>,
    /// Deadline.
    pub deadline: Timestamp,
    /// `None` keeps the stored flag (or `false` on create).
    pub completed: Option<bool>,
    /// `None` keeps the stored assignee, `Some(None)` unassigns.
    pub assigned_user: Option<Option<UserId>>,
}

/// Validated client input for creating or replacing a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserDraft {
    /// User name.
    pub name: String,
    /// Normalized email address.
    pub email: String,
    /// `None` keeps the stored list (or `[]` on create).
    pub pending_tasks: Option<Vec<TaskId>>,
}

// =============================================================================
// Workflow Error
// =============================================================================

/// Errors raised by assignment workflows.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The task being updated or deleted does not exist.
    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    /// The user being updated or deleted does not exist.
    #[error("User not found: {0}")]
    UserNotFound(UserId),

    /// A body field references a document that cannot be used.
    #[error("Invalid {field}: {message}")]
    InvalidReference { field: &'static str, message: String },

    /// Another user already has this email.
    #[error("Email already exists")]
    DuplicateEmail,

    /// An internal filter could not be built.
    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    /// Storage failure.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl WorkflowError {
    fn missing_user(user_id: &UserId) -> Self {
        Self::InvalidReference {
            field: "assignedUser",
            message: format!("user {user_id} does not exist"),
        }
    }
}

// =============================================================================
// Assignment Service
// =============================================================================

/// Applies task and user mutations under the write gate.
#[derive(Clone)]
pub struct AssignmentService {
    tasks: Arc<TaskRepository>,
    users: Arc<UserRepository>,
    write_gate: Arc<Mutex<()>>,
}

impl std::fmt::Debug for AssignmentService {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("AssignmentService")
            .finish_non_exhaustive()
    }
}

impl AssignmentService {
    /// Creates a service over the given repositories.
    #[must_use]
    pub fn new(repositories: &Repositories) -> Self {
        Self {
            tasks: Arc::clone(&repositories.task_repository),
            users: Arc::clone(&repositories.user_repository),
            write_gate: Arc::new(Mutex::new(())),
        }
    }

    // -------------------------------------------------------------------------
    // Tasks
    // -------------------------------------------------------------------------

    /// Creates a task and records it as pending for its assignee.
    ///
    /// # Errors
    ///
    /// - `InvalidReference` if `assignedUser` names a missing user.
    /// - `Repository` on storage failure.
    pub async fn create_task(&self, draft: TaskDraft) -> Result<Task, WorkflowError> {
        let _gate = self.write_gate.lock().await;

        let assignee = match draft.assigned_user.flatten() {
            Some(user_id) => Some(
                self.users
                    .find_by_id(&user_id)
                    .await?
                    .ok_or_else(|| WorkflowError::missing_user(&user_id))?,
            ),
            None => None,
        };

        let task = Task::new(
            TaskId::generate_v7(),
            draft.name,
            draft.deadline,
            Timestamp::now(),
        )
        .with_description(draft.description.unwrap_or_default())
        .with_completed(draft.completed.unwrap_or(false));
        let task = match &assignee {
            Some(user) => task.assign_to(user.user_id.clone(), user.name.clone()),
            None => task,
        };

        self.tasks.insert(&task).await?;
        if let Some(user) = assignee {
            self.sync_pending(user, &task).await?;
        }

        tracing::info!(task_id = %task.task_id, "task created");
        Ok(task)
    }

    /// Replaces a task, moving it between pending lists as needed.
    ///
    /// An assignee kept from the stored task that no longer exists is
    /// dropped instead of rejected.
    ///
    /// # Errors
    ///
    /// - `TaskNotFound` if the task does not exist.
    /// - `InvalidReference` if an explicit `assignedUser` names a missing user.
    /// - `Repository` on storage failure.
    pub async fn replace_task(
        &self,
        task_id: &TaskId,
        draft: TaskDraft,
    ) -> Result<Task, WorkflowError> {
        let _gate = self.write_gate.lock().await;

        let existing = self
            .tasks
            .find_by_id(task_id)
            .await?
            .ok_or_else(|| WorkflowError::TaskNotFound(task_id.clone()))?;
        let previous_assignee = existing.assigned_user.clone();

        let explicit = draft.assigned_user.is_some();
        let target = draft
            .assigned_user
            .unwrap_or_else(|| previous_assignee.clone());
        let assignee = match target {
            Some(user_id) => match self.users.find_by_id(&user_id).await? {
                Some(user) => Some(user),
                None if explicit => return Err(WorkflowError::missing_user(&user_id)),
                None => None,
            },
            None => None,
        };

        let mut task = existing.with_name(draft.name).with_deadline(draft.deadline);
        if let Some(description) = draft.description {
            task = task.with_description(description);
        }
        if let Some(completed) = draft.completed {
            task = task.with_completed(completed);
        }
        let task = match &assignee {
            Some(user) => task.assign_to(user.user_id.clone(), user.name.clone()),
            None => task.unassign(),
        }
        .next_version();

        self.tasks.replace(&task).await?;

        if let Some(previous) = previous_assignee
            && task.assigned_user.as_ref() != Some(&previous)
        {
            self.remove_pending(&previous, &task.task_id).await?;
        }
        if let Some(user) = assignee {
            self.sync_pending(user, &task).await?;
        }

        tracing::info!(task_id = %task.task_id, version = task.version, "task replaced");
        Ok(task)
    }

    /// Deletes a task and removes it from its assignee's pending list.
    ///
    /// # Errors
    ///
    /// - `TaskNotFound` if the task does not exist.
    /// - `Repository` on storage failure.
    pub async fn delete_task(&self, task_id: &TaskId) -> Result<Task, WorkflowError> {
        let _gate = self.write_gate.lock().await;

        let deleted = self
            .tasks
            .delete(task_id)
            .await?
            .ok_or_else(|| WorkflowError::TaskNotFound(task_id.clone()))?;
        if let Some(user_id) = &deleted.assigned_user {
            self.remove_pending(user_id, &deleted.task_id).await?;
        }

        tracing::info!(task_id = %deleted.task_id, "task deleted");
        Ok(deleted)
    }

    // -------------------------------------------------------------------------
    // Users
    // -------------------------------------------------------------------------

    /// Creates a user and claims every task in its pending list.
    ///
    /// # Errors
    ///
    /// - `DuplicateEmail` if the email is taken.
    /// - `InvalidReference` if a pending task is missing or completed.
    /// - `Repository` on storage failure.
    pub async fn create_user(&self, draft: UserDraft) -> Result<User, WorkflowError> {
        let _gate = self.write_gate.lock().await;

        self.ensure_email_available(&draft.email, None).await?;
        let pending = draft.pending_tasks.unwrap_or_default();
        let claimed = self.require_pending_tasks(&pending).await?;

        let user = User::new(UserId::generate_v7(), draft.name, &draft.email, Timestamp::now())
            .with_pending_tasks(pending);
        self.users.insert(&user).await?;

        for task in claimed {
            self.claim_task(task, &user).await?;
        }

        tracing::info!(user_id = %user.user_id, "user created");
        Ok(user)
    }

    /// Replaces a user.
    ///
    /// When `pendingTasks` is given, tasks dropped from the list are
    /// unassigned and listed tasks are claimed. A name change is copied to
    /// every task assigned to the user.
    ///
    /// # Errors
    ///
    /// - `UserNotFound` if the user does not exist.
    /// - `DuplicateEmail` if another user has the email.
    /// - `InvalidReference` if a pending task is missing or completed.
    /// - `Repository` on storage failure.
    pub async fn replace_user(
        &self,
        user_id: &UserId,
        draft: UserDraft,
    ) -> Result<User, WorkflowError> {
        let _gate = self.write_gate.lock().await;

        let existing = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| WorkflowError::UserNotFound(user_id.clone()))?;
        self.ensure_email_available(&draft.email, Some(user_id))
            .await?;
        let claimed = match &draft.pending_tasks {
            Some(pending) => Some(self.require_pending_tasks(pending).await?),
            None => None,
        };

        let user = existing
            .clone()
            .with_name(draft.name)
            .with_email(&draft.email);
        let user = match draft.pending_tasks {
            Some(pending) => user.with_pending_tasks(pending),
            None => user,
        }
        .next_version();
        self.users.replace(&user).await?;

        if let Some(claimed) = claimed {
            for dropped in existing
                .pending_tasks
                .iter()
                .filter(|task_id| !user.has_pending_task(task_id))
            {
                self.release_task(dropped, &user.user_id).await?;
            }
            for task in claimed {
                self.claim_task(task, &user).await?;
            }
        }
        if existing.name != user.name {
            self.refresh_assignee_name(&user).await?;
        }

        tracing::info!(user_id = %user.user_id, version = user.version, "user replaced");
        Ok(user)
    }

    /// Deletes a user and unassigns every task assigned to it.
    ///
    /// # Errors
    ///
    /// - `UserNotFound` if the user does not exist.
    /// - `Repository` on storage failure.
    pub async fn delete_user(&self, user_id: &UserId) -> Result<User, WorkflowError> {
        let _gate = self.write_gate.lock().await;

        let deleted = self
            .users
            .delete(user_id)
            .await?
            .ok_or_else(|| WorkflowError::UserNotFound(user_id.clone()))?;

        for task in self.tasks_assigned_to(user_id).await? {
            self.tasks.replace(&task.unassign().next_version()).await?;
        }

        tracing::info!(user_id = %deleted.user_id, "user deleted");
        Ok(deleted)
    }

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------

    async fn ensure_email_available(
        &self,
        email: &str,
        except: Option<&UserId>,
    ) -> Result<(), WorkflowError> {
        let query = FindQuery::with_filter(Filter::field_eq("email", json!(email))?);
        let holders = self.users.find(&query).await?;
        if holders
            .iter()
            .any(|holder| Some(&holder.user_id) != except)
        {
            return Err(WorkflowError::DuplicateEmail);
        }
        Ok(())
    }

    /// Loads the listed tasks, rejecting missing or completed ones.
    async fn require_pending_tasks(&self, task_ids: &[TaskId]) -> Result<Vec<Task>, WorkflowError> {
        let mut tasks: Vec<Task> = Vec::with_capacity(task_ids.len());
        for task_id in task_ids {
            if tasks.iter().any(|task| &task.task_id == task_id) {
                continue;
            }
            let task = self.tasks.find_by_id(task_id).await?.ok_or_else(|| {
                WorkflowError::InvalidReference {
                    field: "pendingTasks",
                    message: format!("task {task_id} does not exist"),
                }
            })?;
            if task.completed {
                return Err(WorkflowError::InvalidReference {
                    field: "pendingTasks",
                    message: format!("task {task_id} is already completed"),
                });
            }
            tasks.push(task);
        }
        Ok(tasks)
    }

    async fn tasks_assigned_to(&self, user_id: &UserId) -> Result<Vec<Task>, WorkflowError> {
        let filter = Filter::field_eq("assignedUser", json!(user_id.to_string()))?;
        Ok(self.tasks.find(&FindQuery::with_filter(filter)).await?)
    }

    /// Assigns `task` to `user`, taking it off any other user's list.
    ///
    /// The caller has already put the task on `user`'s list.
    async fn claim_task(&self, task: Task, user: &User) -> Result<(), WorkflowError> {
        if let Some(previous) = &task.assigned_user
            && previous != &user.user_id
        {
            self.remove_pending(previous, &task.task_id).await?;
        }
        if task.is_assigned_to(&user.user_id) && task.assigned_user_name == user.name {
            return Ok(());
        }

        tracing::debug!(task_id = %task.task_id, user_id = %user.user_id, "task claimed");
        let task = task
            .assign_to(user.user_id.clone(), user.name.clone())
            .next_version();
        self.tasks.replace(&task).await?;
        Ok(())
    }

    /// Unassigns a task dropped from `user_id`'s list, if still assigned there.
    async fn release_task(&self, task_id: &TaskId, user_id: &UserId) -> Result<(), WorkflowError> {
        let Some(task) = self.tasks.find_by_id(task_id).await? else {
            return Ok(());
        };
        if task.is_assigned_to(user_id) {
            tracing::debug!(task_id = %task_id, user_id = %user_id, "task released");
            self.tasks.replace(&task.unassign().next_version()).await?;
        }
        Ok(())
    }

    async fn refresh_assignee_name(&self, user: &User) -> Result<(), WorkflowError> {
        for task in self.tasks_assigned_to(&user.user_id).await? {
            if task.assigned_user_name != user.name {
                let task = task
                    .assign_to(user.user_id.clone(), user.name.clone())
                    .next_version();
                self.tasks.replace(&task).await?;
            }
        }
        Ok(())
    }

    /// Makes `user`'s pending list agree with `task`'s pending state.
    async fn sync_pending(&self, user: User, task: &Task) -> Result<(), WorkflowError> {
        let listed = user.has_pending_task(&task.task_id);
        let user = match (task.is_pending(), listed) {
            (true, false) => user.add_pending_task(task.task_id.clone()),
            (false, true) => user.remove_pending_task(&task.task_id),
            _ => return Ok(()),
        };
        self.users.replace(&user.next_version()).await?;
        Ok(())
    }

    async fn remove_pending(&self, user_id: &UserId, task_id: &TaskId) -> Result<(), WorkflowError> {
        let Some(user) = self.users.find_by_id(user_id).await? else {
            return Ok(());
        };
        if user.has_pending_task(task_id) {
            let user = user.remove_pending_task(task_id).next_version();
            self.users.replace(&user).await?;
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
