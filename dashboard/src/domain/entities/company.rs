//! Client companies.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Contact, check_email, require_text};
use crate::domain::record::{EntityKind, LiveRecord};
use crate::domain::{CompanyId, Error};

/// A row of `client_companies`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    /// Primary key.
    pub id: CompanyId,
    /// Trading name.
    pub name: String,
    /// Street address.
    #[serde(default)]
    pub address: Option<String>,
    /// City.
    #[serde(default)]
    pub city: Option<String>,
    /// Province.
    #[serde(default)]
    pub province: Option<String>,
    /// Postal code.
    #[serde(default)]
    pub postal_code: Option<String>,
    /// Main phone line.
    #[serde(default)]
    pub phone: Option<String>,
    /// Main email address.
    #[serde(default)]
    pub email: Option<String>,
    /// Website.
    #[serde(default)]
    pub website: Option<String>,
    /// Staff notes.
    #[serde(default)]
    pub notes: Option<String>,
    /// Archived companies are inactive.
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

impl LiveRecord for Company {
    const KIND: EntityKind = EntityKind::Company;

    fn record_id(&self) -> Uuid {
        *self.id.as_uuid()
    }

    fn collection_order(&self, other: &Self) -> Ordering {
        self.name
            .to_lowercase()
            .cmp(&other.name.to_lowercase())
            .then_with(|| self.name.cmp(&other.name))
    }
}

/// A company with its active contacts, primary first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyWithContacts {
    /// The company.
    pub company: Company,
    /// Its active contacts.
    pub contacts: Vec<Contact>,
}

impl CompanyWithContacts {
    /// The primary contact, if one is set.
    #[must_use]
    pub fn primary_contact(&self) -> Option<&Contact> {
        self.contacts.iter().find(|contact| contact.is_primary)
    }
}

/// Input for registering a company.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCompany {
    /// Display name.
    pub name: String,
    /// Street address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// City.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    /// Province or state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub province: Option<String>,
    /// Postal code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    /// Main phone number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Main email address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Public website.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    /// Staff notes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl NewCompany {
    /// Company with only a name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Reject malformed input before any I/O.
    pub fn validate(&self) -> Result<(), Error> {
        require_text("name", &self.name)?;
        check_email("email", self.email.as_deref())
    }
}

/// Partial update for a company.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyPatch {
    /// Display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Street address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// City.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    /// Province or state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub province: Option<String>,
    /// Postal code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    /// Main phone number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Main email address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Public website.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    /// Staff notes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl CompanyPatch {
    /// Reject malformed input before any I/O.
    pub fn validate(&self) -> Result<(), Error> {
        if let Some(name) = &self.name {
            require_text("name", name)?;
        }
        check_email("email", self.email.as_deref())
    }
}
