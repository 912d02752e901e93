//! Per-entity services the UI layer calls.
//!
//! Each service composes the access policy (to scope reads and guard
//! writes) with a [`LiveQuery`](crate::domain::live::LiveQuery) that keeps
//! its listed collection current. A service instance owns its collection;
//! services never share one.

mod authors;
mod comment_service;
mod company_service;
mod contact_service;
mod document_service;
mod profile_service;
mod project_service;
mod support;

pub use comment_service::CommentService;
pub use company_service::CompanyService;
pub use contact_service::{ContactListOptions, ContactService};
pub use document_service::{DocumentListOptions, DocumentService};
pub use profile_service::ProfileService;
pub use project_service::{ProjectListOptions, ProjectService};
