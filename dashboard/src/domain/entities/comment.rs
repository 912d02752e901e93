//! Discussion threads attached to projects.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::profile::Profile;
use super::require_text;
use crate::domain::record::{EntityKind, LiveRecord};
use crate::domain::{CommentId, Error, ProjectId, UserId};

/// A row of `comments`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    /// Primary key.
    pub id: CommentId,
    /// Project the comment belongs to.
    pub project_id: ProjectId,
    /// Author.
    pub user_id: UserId,
    /// Body text.
    pub text: String,
    /// Hidden from clients when set.
    #[serde(default)]
    pub is_internal: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last edit.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl LiveRecord for Comment {
    const KIND: EntityKind = EntityKind::Comment;

    fn record_id(&self) -> Uuid {
        *self.id.as_uuid()
    }

    fn collection_order(&self, other: &Self) -> Ordering {
        other.created_at.cmp(&self.created_at)
    }
}

/// A comment joined with its author's profile.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentWithUser {
    /// The comment row.
    #[serde(flatten)]
    pub comment: Comment,
    /// Author profile; `None` when the author has no profile row.
    pub user: Option<Profile>,
}

/// Input for posting a comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewComment {
    /// Target project.
    pub project_id: ProjectId,
    /// Body text.
    pub text: String,
    /// Staff-only note.
    pub is_internal: bool,
}

impl NewComment {
    /// Public comment on `project_id`.
    #[must_use]
    pub fn new(project_id: ProjectId, text: impl Into<String>) -> Self {
        Self {
            project_id,
            text: text.into(),
            is_internal: false,
        }
    }

    /// Mark the comment as internal.
    #[must_use]
    pub fn internal(mut self) -> Self {
        self.is_internal = true;
        self
    }

    /// Reject malformed input before any I/O.
    pub fn validate(&self) -> Result<(), Error> {
        require_text("text", &self.text)
    }
}

/// Edit to an existing comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentPatch {
    /// Replacement body text.
    pub text: String,
}

impl CommentPatch {
    /// Reject malformed input before any I/O.
    pub fn validate(&self) -> Result<(), Error> {
        require_text("text", &self.text)
    }
}
