//! Profiles, role changes and actor resolution.
//!
//! The profile row carries the caller's role claim; client contacts linked
//! to the profile carry the affiliation. Together they make the [`Actor`]
//! every other service is scoped by.

use std::collections::BTreeSet;
use std::sync::Arc;

use mockable::Clock;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use super::support::{column_uuid, decode, encode, stamp};
use crate::domain::actor::Role;
use crate::domain::entities::{Profile, ProfilePatch};
use crate::domain::ports::{AuthUser, EntityStore, Filter, Query, Row, Table};
use crate::domain::{Actor, CompanyId, Error, UserId};

/// Reads and writes `profiles` rows.
#[derive(Clone)]
pub struct ProfileService {
    store: Arc<dyn EntityStore>,
    clock: Arc<dyn Clock>,
    actor: Option<Actor>,
}

impl ProfileService {
    /// Service with no acting user; only [`load`](Self::load) and
    /// [`resolve_actor`](Self::resolve_actor) are usable.
    #[must_use]
    pub fn new(store: Arc<dyn EntityStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            actor: None,
        }
    }

    /// Bind the service to the signed-in actor.
    #[must_use]
    pub fn acting_as(mut self, actor: Actor) -> Self {
        self.actor = Some(actor);
        self
    }

    /// Read the profile for `user`, provisioning a `client` profile on
    /// first sign-in.
    pub async fn load(&self, user: &AuthUser) -> Result<Profile, Error> {
        if let Some(row) = self.find(user.id).await? {
            return decode(row);
        }

        let now = self.clock.utc();
        let mut row = Row::new();
        row.insert("id".into(), Value::from(user.id));
        if let Some(email) = &user.email {
            row.insert("email".into(), json!(email));
        }
        row.insert("role".into(), json!(Role::Client.as_str()));
        stamp(&mut row, "created_at", now);
        stamp(&mut row, "updated_at", now);
        let stored = self.store.insert(Table::Profiles, row).await?;
        info!(user_id = %user.id, "provisioned client profile");
        decode(stored)
    }

    /// Update the acting user's own profile.
    pub async fn update(&self, patch: ProfilePatch) -> Result<Profile, Error> {
        let actor = self.require_actor()?;
        patch.validate()?;
        if patch.is_empty() {
            return self.current(actor.id()).await;
        }
        let mut row = encode(&patch)?;
        stamp(&mut row, "updated_at", self.clock.utc());
        self.write(actor.id(), row).await
    }

    /// Change another user's role. Admin only.
    pub async fn set_role(&self, profile_id: UserId, role: Role) -> Result<Profile, Error> {
        let actor = self.require_actor()?;
        if actor.role() != Some(Role::Admin) {
            return Err(Error::forbidden("only administrators may change roles")
                .with_details(json!({ "code": "admin_only" })));
        }
        let mut row = Row::new();
        row.insert("role".into(), json!(role.as_str()));
        stamp(&mut row, "updated_at", self.clock.utc());
        let profile = self.write(profile_id, row).await?;
        info!(profile_id = %profile_id, role = %role, changed_by = %actor.id(), "role changed");
        Ok(profile)
    }

    /// Derive the actor for `profile`.
    ///
    /// Clients are affiliated through their active contact rows. Rows
    /// pointing at more than one company leave the client unaffiliated, so
    /// the access policy denies everything rather than guessing.
    pub async fn resolve_actor(&self, profile: &Profile) -> Result<Actor, Error> {
        let claim = profile.role.clone();
        let is_client = claim
            .as_deref()
            .and_then(|raw| raw.parse::<Role>().ok())
            .is_some_and(|role| role == Role::Client);
        if !is_client {
            return Ok(Actor::from_claim(profile.id, claim, None));
        }

        let query = Query::from(Table::ClientContacts)
            .filter(Filter::eq("profile_id", Value::from(profile.id)))
            .filter(Filter::eq("is_active", true));
        let companies: BTreeSet<CompanyId> = self
            .store
            .select(&query)
            .await?
            .iter()
            .filter_map(|row| column_uuid(row, "company_id"))
            .map(CompanyId::from_uuid)
            .collect();

        let mut iter = companies.iter();
        let affiliation = match (iter.next(), iter.next()) {
            (Some(company), None) => Some(*company),
            (None, _) => {
                debug!(user_id = %profile.id, "client has no active contact row");
                None
            }
            (Some(_), Some(_)) => {
                warn!(
                    user_id = %profile.id,
                    companies = companies.len(),
                    "client linked to several companies; leaving unaffiliated"
                );
                None
            }
        };
        Ok(Actor::from_claim(profile.id, claim, affiliation))
    }

    fn require_actor(&self) -> Result<&Actor, Error> {
        self.actor
            .as_ref()
            .ok_or_else(|| Error::unauthorized("no signed-in user"))
    }

    async fn find(&self, id: UserId) -> Result<Option<Row>, Error> {
        let query = Query::from(Table::Profiles)
            .filter(Filter::eq("id", Value::from(id)))
            .limit(1);
        Ok(self.store.select(&query).await?.into_iter().next())
    }

    async fn current(&self, id: UserId) -> Result<Profile, Error> {
        self.find(id)
            .await?
            .ok_or_else(|| profile_not_found(id))
            .and_then(decode)
    }

    async fn write(&self, id: UserId, row: Row) -> Result<Profile, Error> {
        let filters = [Filter::eq("id", Value::from(id))];
        let stored = self
            .store
            .update(Table::Profiles, &filters, row)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| profile_not_found(id))?;
        decode(stored)
    }
}

fn profile_not_found(id: UserId) -> Error {
    Error::not_found(format!("profile {id} not found"))
        .with_details(json!({ "kind": "profile", "id": id.to_string() }))
}

#[cfg(test)]
#[path = "profile_service_tests.rs"]
mod tests;
