//! Domain layer: identities, visibility rules, live collections and the
//! per-entity services the UI calls.
//!
//! Everything here talks to the outside world through [`ports`]; adapters
//! live in [`crate::outbound`].

pub mod access_policy;
pub mod actor;
pub mod entities;
pub mod error;
pub mod ids;
pub mod live;
pub mod ports;
pub mod record;
pub mod services;
pub mod session;

pub use self::access_policy::{
    AccessPolicyError, PolicyOptions, Predicate, ProjectScope, build_predicate,
};
pub use self::actor::{Actor, Role, UnknownRoleError};
pub use self::error::{DomainError, Error, ErrorCode, ErrorValidationError};
pub use self::ids::{CommentId, CompanyId, ContactId, DocumentId, IdParseError, ProjectId, UserId};
pub use self::record::{EntityKind, LiveRecord};
pub use self::session::{DashboardSession, SessionHandle, SessionPorts};
