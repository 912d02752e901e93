//! The acting user as seen by the access policy.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ids::{CompanyId, UserId};

/// Role recognised by the access policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Internal staff managing projects.
    Coordinator,
    /// A customer, affiliated with exactly one client company.
    Client,
    /// Privileged staff; sees everything and may change roles.
    Admin,
}

impl Role {
    /// Textual form stored in the `profiles.role` column.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Coordinator => "coordinator",
            Self::Client => "client",
            Self::Admin => "admin",
        }
    }

    /// Whether the role sees every company's records.
    #[must_use]
    pub const fn is_staff(self) -> bool {
        matches!(self, Self::Coordinator | Self::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a role claim is not one of the known roles.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognised role `{0}`")]
pub struct UnknownRoleError(pub String);

impl FromStr for Role {
    type Err = UnknownRoleError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "coordinator" => Ok(Self::Coordinator),
            "client" => Ok(Self::Client),
            "admin" => Ok(Self::Admin),
            _ => Err(UnknownRoleError(raw.to_owned())),
        }
    }
}

/// Resolved caller identity consumed by the access policy.
///
/// The role is kept as the raw claim read from the profile so that a missing
/// or unrecognised value reaches the policy, which denies everything for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    id: UserId,
    role_claim: Option<String>,
    affiliated_company_id: Option<CompanyId>,
}

impl Actor {
    /// Build an actor from an unvalidated role claim.
    #[must_use]
    pub fn from_claim(
        id: UserId,
        role_claim: Option<String>,
        affiliated_company_id: Option<CompanyId>,
    ) -> Self {
        Self {
            id,
            role_claim,
            affiliated_company_id,
        }
    }

    /// Internal coordinator.
    #[must_use]
    pub fn coordinator(id: UserId) -> Self {
        Self::from_claim(id, Some(Role::Coordinator.as_str().to_owned()), None)
    }

    /// Administrator.
    #[must_use]
    pub fn admin(id: UserId) -> Self {
        Self::from_claim(id, Some(Role::Admin.as_str().to_owned()), None)
    }

    /// Client, optionally affiliated with a company.
    #[must_use]
    pub fn client(id: UserId, company: Option<CompanyId>) -> Self {
        Self::from_claim(id, Some(Role::Client.as_str().to_owned()), company)
    }

    /// Actor id.
    #[must_use]
    pub const fn id(&self) -> UserId {
        self.id
    }

    /// Raw role claim.
    #[must_use]
    pub fn role_claim(&self) -> Option<&str> {
        self.role_claim.as_deref()
    }

    /// Parsed role, if the claim is present and recognised.
    #[must_use]
    pub fn role(&self) -> Option<Role> {
        self.role_claim.as_deref().and_then(|raw| raw.parse().ok())
    }

    /// Company the client is affiliated with.
    #[must_use]
    pub const fn affiliated_company_id(&self) -> Option<CompanyId> {
        self.affiliated_company_id
    }

    /// Whether the actor is coordinator or admin.
    #[must_use]
    pub fn is_staff(&self) -> bool {
        self.role().is_some_and(Role::is_staff)
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.

    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("coordinator", Role::Coordinator)]
    #[case(" Client ", Role::Client)]
    #[case("ADMIN", Role::Admin)]
    fn parses_known_roles(#[case] raw: &str, #[case] expected: Role) {
        assert_eq!(raw.parse::<Role>(), Ok(expected));
    }

    #[rstest]
    fn unknown_role_is_not_parsed() {
        let actor = Actor::from_claim(UserId::random(), Some("owner".to_owned()), None);
        assert!(actor.role().is_none());
        assert!(!actor.is_staff());
    }
}
