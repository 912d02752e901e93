//! Typed records for each table, with their input payloads and validation.
//!
//! Field names match the backend's column names so records convert to and
//! from rows through serde without renaming.

mod comment;
mod company;
mod contact;
mod document;
mod profile;
mod project;

pub use comment::{Comment, CommentPatch, CommentWithUser, NewComment};
pub use company::{Company, CompanyPatch, CompanyWithContacts, NewCompany};
pub use contact::{Contact, ContactPatch, NewContact};
pub use document::{Document, DocumentCategory, DocumentUpload, DocumentWithUploader};
pub use profile::{Profile, ProfilePatch};
pub use project::{NewProject, Project, ProjectPatch, ProjectStatus};

use std::sync::OnceLock;

use regex::Regex;
use serde_json::json;

use super::Error;

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap_or_else(|error| {
            panic!("email regex failed to compile: {error}")
        })
    })
}

pub(crate) fn require_text(field: &str, value: &str) -> Result<(), Error> {
    if value.trim().is_empty() {
        return Err(Error::invalid_request(format!("{field} must not be empty"))
            .with_details(json!({ "field": field, "code": "empty" })));
    }
    Ok(())
}

pub(crate) fn check_email(field: &str, value: Option<&str>) -> Result<(), Error> {
    match value {
        Some(email) if !email.trim().is_empty() && !email_regex().is_match(email.trim()) => {
            Err(Error::invalid_request(format!("{field} must be a valid email address"))
                .with_details(json!({ "field": field, "code": "invalid_email" })))
        }
        _ => Ok(()),
    }
}

pub(crate) fn check_amount(field: &str, value: Option<f64>) -> Result<(), Error> {
    match value {
        Some(amount) if !amount.is_finite() || amount < 0.0 => {
            Err(Error::invalid_request(format!("{field} must be a non-negative amount"))
                .with_details(json!({ "field": field, "code": "invalid_amount" })))
        }
        _ => Ok(()),
    }
}
