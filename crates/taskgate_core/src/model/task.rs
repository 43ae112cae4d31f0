//! Owned task model.
//!
//! # Invariants
//! - `owner_id` is stamped from the caller identity at creation.
//! - Updates replace business fields only; `id` and `owner_id` are kept.
//! - `title` and `status` are non-empty after trimming.

use crate::model::id::{PrincipalId, TaskId};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Business fields supplied by callers on create and update.
///
/// There is no owner field: ownership always comes from the authenticated
/// caller, never from request payloads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDraft {
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Unix epoch milliseconds.
    #[serde(default)]
    pub due_at_ms: Option<i64>,
    pub status: String,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            status: status.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_due_at_ms(mut self, due_at_ms: i64) -> Self {
        self.due_at_ms = Some(due_at_ms);
        self
    }

    /// Checks the required business fields.
    pub fn validate(&self) -> Result<(), TaskValidationError> {
        if self.title.trim().is_empty() {
            return Err(TaskValidationError::EmptyTitle);
        }
        if self.status.trim().is_empty() {
            return Err(TaskValidationError::EmptyStatus);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskValidationError {
    EmptyTitle,
    EmptyStatus,
}

impl TaskValidationError {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EmptyTitle => "title is required",
            Self::EmptyStatus => "status is required",
        }
    }
}

impl Display for TaskValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error for TaskValidationError {}

/// Stored task record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub owner_id: PrincipalId,
    pub title: String,
    pub description: String,
    pub due_at_ms: Option<i64>,
    pub status: String,
}

impl Task {
    /// Builds a new task owned by `owner_id` from caller-supplied fields.
    pub fn from_draft(owner_id: PrincipalId, draft: TaskDraft) -> Self {
        Self {
            id: TaskId::generate(),
            owner_id,
            title: draft.title,
            description: draft.description,
            due_at_ms: draft.due_at_ms,
            status: draft.status,
        }
    }

    /// Replaces business fields, keeping identity and ownership.
    pub fn apply(&mut self, draft: TaskDraft) {
        self.title = draft.title;
        self.description = draft.description;
        self.due_at_ms = draft.due_at_ms;
        self.status = draft.status;
    }

    pub fn is_owned_by(&self, principal: PrincipalId) -> bool {
        self.owner_id == principal
    }

    /// Outward projection with hex ids.
    pub fn view(&self) -> TaskView {
        TaskView {
            id: self.id,
            title: self.title.clone(),
            description: self.description.clone(),
            due_at_ms: self.due_at_ms,
            status: self.status.clone(),
            user_id: self.owner_id,
        }
    }
}

/// Outward view of a task. `user_id` names the owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskView {
    pub id: TaskId,
    pub title: String,
    pub description: String,
    pub due_at_ms: Option<i64>,
    pub status: String,
    pub user_id: PrincipalId,
}
