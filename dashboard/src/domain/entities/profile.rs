//! Per-user profile rows keyed by the authenticated user id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::require_text;
use crate::domain::{Error, UserId};

/// A row of `profiles`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Same as the authenticated user id.
    pub id: UserId,
    /// Sign-in email.
    #[serde(default)]
    pub email: Option<String>,
    /// Display name.
    #[serde(default)]
    pub full_name: Option<String>,
    /// Free-text employer, informational only.
    #[serde(default)]
    pub company: Option<String>,
    /// Phone number.
    #[serde(default)]
    pub phone: Option<String>,
    /// Raw role claim. Parsed by the access policy, never trusted here.
    #[serde(default)]
    pub role: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification.
    pub updated_at: DateTime<Utc>,
}

/// Self-service profile edit. Role changes go through
/// [`ProfileService::set_role`](crate::domain::services::ProfileService::set_role).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilePatch {
    /// Display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    /// Free-text employer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    /// Phone number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl ProfilePatch {
    /// Reject malformed input before any I/O.
    pub fn validate(&self) -> Result<(), Error> {
        if let Some(name) = &self.full_name {
            require_text("full_name", name)?;
        }
        Ok(())
    }

    /// Whether the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none() && self.company.is_none() && self.phone.is_none()
    }
}
