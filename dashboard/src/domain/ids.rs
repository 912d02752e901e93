//! Strongly typed row identifiers.
//!
//! Every table in the entity store keys its rows by UUID. Wrapping each in
//! its own newtype keeps a comment id from being passed where a project id
//! is expected.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Validation error for identifiers parsed from text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} must be a valid UUID, got `{raw}`")]
pub struct IdParseError {
    kind: &'static str,
    raw: String,
}

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Wrap an existing UUID.
            #[must_use]
            pub const fn from_uuid(value: Uuid) -> Self {
                Self(value)
            }

            /// Generate a new random identifier.
            #[must_use]
            pub fn random() -> Self {
                Self(Uuid::new_v4())
            }

            /// Access the underlying UUID.
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$name> for Uuid {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl From<$name> for serde_json::Value {
            fn from(value: $name) -> Self {
                serde_json::Value::String(value.0.to_string())
            }
        }

        impl FromStr for $name {
            type Err = IdParseError;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(raw.trim()).map(Self).map_err(|_| IdParseError {
                    kind: $label,
                    raw: raw.to_owned(),
                })
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

define_id!(
    /// Authenticated user id; also the primary key of `profiles`.
    UserId,
    "user id"
);
define_id!(
    /// Primary key of `client_companies`.
    CompanyId,
    "company id"
);
define_id!(
    /// Primary key of `client_contacts`.
    ContactId,
    "contact id"
);
define_id!(
    /// Primary key of `projects`.
    ProjectId,
    "project id"
);
define_id!(
    /// Primary key of `comments`.
    CommentId,
    "comment id"
);
define_id!(
    /// Primary key of `documents`.
    DocumentId,
    "document id"
);
