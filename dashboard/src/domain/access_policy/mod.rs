//! Row visibility rules.
//!
//! [`build_predicate`] turns a resolved [`Actor`] into the filter every
//! read, guard and live collection for one entity kind applies. The same
//! [`Predicate`] is sent to the entity store as query filters and evaluated
//! locally against rows arriving from the change feed, whose own filter is
//! too coarse to trust.
//!
//! The policy fails closed: a client without an affiliation, or a client
//! asking for a scope outside it, gets a predicate that matches nothing.

use serde_json::Value;

use super::actor::{Actor, Role};
use super::ports::{Filter, Query, Row};
use super::record::{EntityKind, LiveRecord, to_row};
use super::{CompanyId, ProjectId};

/// A project together with the company that owns it.
///
/// Comments and documents are owned transitively through their project, so
/// the hook resolves the project before asking the policy about them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProjectScope {
    /// The project.
    pub project_id: ProjectId,
    /// Its owning company.
    pub company_id: CompanyId,
}

/// Optional narrowing supplied by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PolicyOptions {
    /// Restrict to one company.
    pub company: Option<CompanyId>,
    /// Restrict to one project.
    pub project: Option<ProjectScope>,
}

impl PolicyOptions {
    /// No narrowing.
    #[must_use]
    pub fn unscoped() -> Self {
        Self::default()
    }

    /// Narrow to one company.
    #[must_use]
    pub fn for_company(company: CompanyId) -> Self {
        Self {
            company: Some(company),
            project: None,
        }
    }

    /// Narrow to one project.
    #[must_use]
    pub fn for_project(scope: ProjectScope) -> Self {
        Self {
            company: None,
            project: Some(scope),
        }
    }
}

/// Conjunction of column filters, or a predicate that matches nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    kind: EntityKind,
    filters: Vec<Filter>,
    deny_all: bool,
}

impl Predicate {
    /// Matches every row of `kind`.
    #[must_use]
    pub fn allow_all(kind: EntityKind) -> Self {
        Self {
            kind,
            filters: Vec::new(),
            deny_all: false,
        }
    }

    /// Matches no row of `kind`.
    #[must_use]
    pub fn deny_all(kind: EntityKind) -> Self {
        Self {
            kind,
            filters: Vec::new(),
            deny_all: true,
        }
    }

    /// Entity kind the predicate governs.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Conjunctive filters. Empty for allow-all and deny-all.
    #[must_use]
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// Whether the predicate matches nothing.
    #[must_use]
    pub const fn is_deny_all(&self) -> bool {
        self.deny_all
    }

    /// Add a further condition. Narrowing a deny-all predicate keeps it
    /// deny-all.
    #[must_use]
    pub fn and(mut self, filter: Filter) -> Self {
        if !self.deny_all {
            self.filters.push(filter);
        }
        self
    }

    /// Evaluate against a row.
    #[must_use]
    pub fn matches(&self, row: &Row) -> bool {
        !self.deny_all && self.filters.iter().all(|filter| filter.matches(row))
    }

    /// Evaluate against a typed record.
    #[must_use]
    pub fn matches_record<R: LiveRecord>(&self, record: &R) -> bool {
        to_row(record).is_ok_and(|row| self.matches(&row))
    }

    /// Store query for the governed table, filtered by this predicate.
    ///
    /// Callers check [`Predicate::is_deny_all`] first; a deny-all predicate
    /// has no filter representation.
    #[must_use]
    pub fn to_query(&self) -> Query {
        Query::from(self.kind.table()).filters(self.filters.iter().cloned())
    }
}

/// Configuration problems with the actor's role claim.
///
/// Callers treat both variants as "deny all".
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessPolicyError {
    /// The actor carries no role claim.
    #[error("actor has no role")]
    MissingRole,
    /// The role claim is not one of the known roles.
    #[error("unrecognised role `{0}`")]
    UnrecognizedRole(String),
}

/// Derive the visibility predicate for `actor` over `kind`.
///
/// # Examples
/// ```
/// use dashboard::domain::access_policy::{build_predicate, PolicyOptions};
/// use dashboard::domain::record::EntityKind;
/// use dashboard::domain::{Actor, CompanyId, UserId};
///
/// let client = Actor::client(UserId::random(), Some(CompanyId::random()));
/// let predicate = build_predicate(&client, EntityKind::Project, &PolicyOptions::unscoped())
///     .expect("known role");
/// assert_eq!(predicate.filters().len(), 1);
///
/// let orphan = Actor::client(UserId::random(), None);
/// let predicate = build_predicate(&orphan, EntityKind::Project, &PolicyOptions::unscoped())
///     .expect("known role");
/// assert!(predicate.is_deny_all());
/// ```
pub fn build_predicate(
    actor: &Actor,
    kind: EntityKind,
    options: &PolicyOptions,
) -> Result<Predicate, AccessPolicyError> {
    let role = resolve_role(actor)?;
    let predicate = match role {
        Role::Coordinator | Role::Admin => narrowed(kind, options),
        Role::Client => client_predicate(actor.affiliated_company_id(), kind, options),
    };
    Ok(predicate)
}

fn resolve_role(actor: &Actor) -> Result<Role, AccessPolicyError> {
    let claim = actor.role_claim().ok_or(AccessPolicyError::MissingRole)?;
    claim
        .parse()
        .map_err(|_| AccessPolicyError::UnrecognizedRole(claim.to_owned()))
}

fn client_predicate(
    affiliation: Option<CompanyId>,
    kind: EntityKind,
    options: &PolicyOptions,
) -> Predicate {
    let Some(company) = affiliation else {
        return Predicate::deny_all(kind);
    };
    let outside = options.company.is_some_and(|requested| requested != company)
        || options.project.is_some_and(|scope| scope.company_id != company);
    if outside {
        return Predicate::deny_all(kind);
    }

    if kind.project_column().is_some() {
        // Child rows only carry a project id, so ownership is proven by the
        // resolved project scope.
        if options.project.is_none() {
            return Predicate::deny_all(kind);
        }
        let predicate = narrowed(kind, options);
        return if kind.has_internal_flag() {
            predicate.and(Filter::eq("is_internal", false))
        } else {
            predicate
        };
    }

    let own_company = PolicyOptions {
        company: Some(company),
        project: options.project,
    };
    narrowed(kind, &own_company)
}

fn narrowed(kind: EntityKind, options: &PolicyOptions) -> Predicate {
    let mut predicate = Predicate::allow_all(kind);
    let company = options
        .company
        .or_else(|| options.project.map(|scope| scope.company_id));
    if let (Some(column), Some(owner)) = (kind.company_column(), company) {
        predicate = predicate.and(Filter::eq(column, Value::from(owner)));
    }
    if let Some(scope) = options.project {
        let column = match kind {
            EntityKind::Project => Some("id"),
            EntityKind::Comment | EntityKind::Document => kind.project_column(),
            EntityKind::Contact | EntityKind::Company => None,
        };
        if let Some(column) = column {
            predicate = predicate.and(Filter::eq(column, Value::from(scope.project_id)));
        }
    }
    predicate
}
