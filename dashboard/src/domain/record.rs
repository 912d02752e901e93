//! Glue between typed records and the JSON rows the backend exchanges.

use std::cmp::Ordering;
use std::fmt;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use super::ports::{Row, Table};

/// Entity collections governed by the access policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// Rows of `projects`; owned directly by a company.
    Project,
    /// Rows of `comments`; owned through their project.
    Comment,
    /// Rows of `documents`; owned through their project.
    Document,
    /// Rows of `client_contacts`; owned directly by a company.
    Contact,
    /// Rows of `client_companies`; each company owns itself.
    Company,
}

impl EntityKind {
    /// Backing table.
    #[must_use]
    pub const fn table(self) -> Table {
        match self {
            Self::Project => Table::Projects,
            Self::Comment => Table::Comments,
            Self::Document => Table::Documents,
            Self::Contact => Table::ClientContacts,
            Self::Company => Table::ClientCompanies,
        }
    }

    /// Column holding the owning company id, for directly owned kinds.
    #[must_use]
    pub const fn company_column(self) -> Option<&'static str> {
        match self {
            Self::Project => Some("client_company_id"),
            Self::Contact => Some("company_id"),
            Self::Company => Some("id"),
            Self::Comment | Self::Document => None,
        }
    }

    /// Column holding the owning project id, for project-owned kinds.
    #[must_use]
    pub const fn project_column(self) -> Option<&'static str> {
        match self {
            Self::Comment | Self::Document => Some("project_id"),
            Self::Project | Self::Contact | Self::Company => None,
        }
    }

    /// Whether rows carry the `is_internal` flag hidden from clients.
    #[must_use]
    pub const fn has_internal_flag(self) -> bool {
        matches!(self, Self::Comment | Self::Document)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Project => "project",
            Self::Comment => "comment",
            Self::Document => "document",
            Self::Contact => "contact",
            Self::Company => "company",
        };
        f.write_str(label)
    }
}

/// A record that can live in a reconciled collection.
pub trait LiveRecord: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Collection the record belongs to.
    const KIND: EntityKind;

    /// Primary key.
    fn record_id(&self) -> Uuid;

    /// Position of `self` relative to `other` in the displayed collection.
    fn collection_order(&self, other: &Self) -> Ordering;
}

/// Failure converting between records and rows.
#[derive(Debug, thiserror::Error)]
pub enum RowCodecError {
    /// The value did not serialise to a JSON object.
    #[error("record did not serialise to a row object")]
    NotAnObject,
    /// serde rejected the value.
    #[error("row codec failed: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Serialise a record or input payload into a row.
pub fn to_row<T: Serialize>(value: &T) -> Result<Row, RowCodecError> {
    match serde_json::to_value(value)? {
        Value::Object(row) => Ok(row),
        _ => Err(RowCodecError::NotAnObject),
    }
}

/// Deserialise a row into a typed record.
pub fn from_row<T: DeserializeOwned>(row: Row) -> Result<T, RowCodecError> {
    Ok(serde_json::from_value(Value::Object(row))?)
}

/// Primary key of a row, when present and well formed.
#[must_use]
pub fn row_id(row: &Row) -> Option<Uuid> {
    row.get("id")
        .and_then(Value::as_str)
        .and_then(|raw| Uuid::parse_str(raw).ok())
}

/// Overlay `patch` onto `base`, column by column.
pub fn merge_rows(base: &mut Row, patch: Row) {
    for (column, value) in patch {
        base.insert(column, value);
    }
}
