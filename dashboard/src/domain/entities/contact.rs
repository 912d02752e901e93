//! People at client companies. An active contact linked to a profile is
//! that client's affiliation.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{check_email, require_text};
use crate::domain::record::{EntityKind, LiveRecord};
use crate::domain::{CompanyId, ContactId, Error, UserId};

/// A row of `client_contacts`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    /// Primary key.
    pub id: ContactId,
    /// Employer.
    pub company_id: CompanyId,
    /// Linked login, when the contact can sign in.
    #[serde(default)]
    pub profile_id: Option<UserId>,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Job title.
    #[serde(default)]
    pub title: Option<String>,
    /// Email address.
    #[serde(default)]
    pub email: Option<String>,
    /// Phone number.
    #[serde(default)]
    pub phone: Option<String>,
    /// At most one per company.
    #[serde(default)]
    pub is_primary: bool,
    /// Archived contacts are inactive.
    #[serde(default = "default_active")]
    pub is_active: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification.
    pub updated_at: DateTime<Utc>,
}

const fn default_active() -> bool {
    true
}

impl Contact {
    /// `"First Last"`.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

impl LiveRecord for Contact {
    const KIND: EntityKind = EntityKind::Contact;

    fn record_id(&self) -> Uuid {
        *self.id.as_uuid()
    }

    /// Primary contact first, then alphabetical by family name.
    fn collection_order(&self, other: &Self) -> Ordering {
        other
            .is_primary
            .cmp(&self.is_primary)
            .then_with(|| self.last_name.cmp(&other.last_name))
            .then_with(|| self.first_name.cmp(&other.first_name))
    }
}

/// Input for adding a contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewContact {
    /// Employer.
    pub company_id: CompanyId,
    /// Linked login.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_id: Option<UserId>,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Job title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Email address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Phone number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Make this the company's primary contact.
    pub is_primary: bool,
}

impl NewContact {
    /// Non-primary contact without optional details.
    #[must_use]
    pub fn new(
        company_id: CompanyId,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            company_id,
            profile_id: None,
            first_name: first_name.into(),
            last_name: last_name.into(),
            title: None,
            email: None,
            phone: None,
            is_primary: false,
        }
    }

    /// Reject malformed input before any I/O.
    pub fn validate(&self) -> Result<(), Error> {
        require_text("first_name", &self.first_name)?;
        require_text("last_name", &self.last_name)?;
        check_email("email", self.email.as_deref())
    }
}

/// Partial update for a contact.
///
/// Primary status and archival have dedicated operations, so they are not
/// part of the patch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactPatch {
    /// Given name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    /// Family name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    /// Job title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Email address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Phone number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl ContactPatch {
    /// Reject malformed input before any I/O.
    pub fn validate(&self) -> Result<(), Error> {
        if let Some(first) = &self.first_name {
            require_text("first_name", first)?;
        }
        if let Some(last) = &self.last_name {
            require_text("last_name", last)?;
        }
        check_email("email", self.email.as_deref())
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.

    use rstest::rstest;

    use super::*;

    fn contact(last: &str, primary: bool) -> Contact {
        let now = Utc::now();
        Contact {
            id: ContactId::random(),
            company_id: CompanyId::random(),
            profile_id: None,
            first_name: "Sam".into(),
            last_name: last.into(),
            title: None,
            email: None,
            phone: None,
            is_primary: primary,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[rstest]
    fn primary_sorts_before_alphabetical() {
        let primary = contact("Zed", true);
        let other = contact("Abel", false);
        assert_eq!(primary.collection_order(&other), Ordering::Less);
        assert_eq!(contact("Abel", false).collection_order(&contact("Baker", false)), Ordering::Less);
    }

    #[rstest]
    fn active_defaults_to_true_when_absent() {
        let decoded: Contact = serde_json::from_value(serde_json::json!({
            "id": Uuid::new_v4().to_string(),
            "company_id": Uuid::new_v4().to_string(),
            "first_name": "Ana",
            "last_name": "Lee",
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z",
        }))
        .expect("contact row");
        assert!(decoded.is_active);
        assert!(!decoded.is_primary);
    }
}
