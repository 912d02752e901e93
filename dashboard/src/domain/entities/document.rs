//! Files attached to projects.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use super::profile::Profile;
use super::require_text;
use crate::domain::record::{EntityKind, LiveRecord};
use crate::domain::{DocumentId, Error, ProjectId, UserId};

/// Classification shown next to a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentCategory {
    /// Signed agreements.
    Contract,
    /// Building permits.
    Permit,
    /// Plans and drawings.
    Drawing,
    /// Billing.
    Invoice,
    /// Site photos.
    Photo,
    /// Anything else.
    Other,
}

impl DocumentCategory {
    /// Label stored in the `category` column.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Contract => "Contract",
            Self::Permit => "Permit",
            Self::Drawing => "Drawing",
            Self::Invoice => "Invoice",
            Self::Photo => "Photo",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for DocumentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentCategory {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        [
            Self::Contract,
            Self::Permit,
            Self::Drawing,
            Self::Invoice,
            Self::Photo,
            Self::Other,
        ]
        .into_iter()
        .find(|category| category.as_str().eq_ignore_ascii_case(raw.trim()))
        .ok_or_else(|| {
            Error::invalid_request(format!("unknown document category `{raw}`"))
                .with_details(json!({ "field": "category", "code": "unknown_category" }))
        })
    }
}

/// A row of `documents`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Primary key.
    pub id: DocumentId,
    /// Project the document belongs to.
    pub project_id: ProjectId,
    /// Display name, usually the original file name.
    pub name: String,
    /// Public URL of the stored blob.
    pub file_path: String,
    /// MIME type reported at upload.
    #[serde(default)]
    pub file_type: Option<String>,
    /// Size in bytes.
    #[serde(default)]
    pub file_size: Option<u64>,
    /// Classification.
    #[serde(default)]
    pub category: Option<DocumentCategory>,
    /// Free text.
    #[serde(default)]
    pub description: Option<String>,
    /// Hidden from clients when set.
    #[serde(default)]
    pub is_internal: bool,
    /// Uploader.
    #[serde(default)]
    pub uploaded_by: Option<UserId>,
    /// Upload time.
    pub created_at: DateTime<Utc>,
}

impl Document {
    /// Storage path of the blob behind `file_path`, relative to the bucket.
    ///
    /// Blobs live under the project's folder; the file is the last segment
    /// of the public URL.
    #[must_use]
    pub fn storage_path(&self) -> Option<String> {
        let file = self.file_path.rsplit('/').next().filter(|s| !s.is_empty())?;
        Some(format!("{}/{file}", self.project_id))
    }
}

impl LiveRecord for Document {
    const KIND: EntityKind = EntityKind::Document;

    fn record_id(&self) -> Uuid {
        *self.id.as_uuid()
    }

    fn collection_order(&self, other: &Self) -> Ordering {
        other.created_at.cmp(&self.created_at)
    }
}

/// A document joined with the uploader's profile.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentWithUploader {
    /// The document row.
    #[serde(flatten)]
    pub document: Document,
    /// Uploader profile; `None` when the row has no uploader or the
    /// uploader has no profile row.
    pub uploader: Option<Profile>,
}

/// A file to attach to a project.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentUpload {
    /// Target project.
    pub project_id: ProjectId,
    /// Display name stored on the row.
    pub name: String,
    /// Original file name; its extension is kept on the stored blob.
    pub file_name: String,
    /// MIME type.
    pub content_type: Option<String>,
    /// File contents.
    pub bytes: Vec<u8>,
    /// Classification.
    pub category: Option<DocumentCategory>,
    /// Free text.
    pub description: Option<String>,
    /// Staff-only document.
    pub is_internal: bool,
}

impl DocumentUpload {
    /// Public, uncategorised upload.
    #[must_use]
    pub fn new(project_id: ProjectId, file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let original: String = file_name.into();
        Self {
            project_id,
            name: original.clone(),
            file_name: original,
            content_type: None,
            bytes,
            category: None,
            description: None,
            is_internal: false,
        }
    }

    /// Use a display name other than the file name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Extension of the original file name, if it has one.
    #[must_use]
    pub fn extension(&self) -> Option<&str> {
        self.file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .filter(|ext| !ext.is_empty())
    }

    /// Reject malformed input before any I/O.
    pub fn validate(&self) -> Result<(), Error> {
        require_text("name", &self.name)?;
        require_text("file_name", &self.file_name)?;
        if self.bytes.is_empty() {
            return Err(Error::invalid_request("file must not be empty")
                .with_details(json!({ "field": "bytes", "code": "empty" })));
        }
        Ok(())
    }
}
