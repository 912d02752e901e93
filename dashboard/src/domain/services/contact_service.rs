//! Company contacts and the primary-contact rule.

use serde_json::{Value, json};
use tracing::{debug, info};
use uuid::Uuid;

use super::support::{
    column_uuid, decode, encode, ensure_writable, fetch_existing, forbidden, insert_guarded,
    open_live, predicate_for, stamp, update_row,
};
use crate::domain::entities::{Contact, ContactPatch, NewContact};
use crate::domain::live::{LiveQuery, LiveScope, SyncOutcome};
use crate::domain::ports::{Direction, FeedRequest, Filter, Row, Table};
use crate::domain::record::EntityKind;
use crate::domain::{CompanyId, ContactId, Error, PolicyOptions, Predicate, SessionHandle, UserId};

/// Scope for [`ContactService::list`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContactListOptions {
    /// Only this company's contacts.
    pub company_id: Option<CompanyId>,
    /// Include archived contacts.
    pub including_inactive: bool,
}

/// Contacts visible to the session's actor.
pub struct ContactService {
    handle: SessionHandle,
    live: LiveQuery<Contact>,
}

impl ContactService {
    /// Bind a service to a session.
    #[must_use]
    pub fn new(handle: SessionHandle) -> Self {
        let live = handle.live_query();
        Self { handle, live }
    }

    /// The live collection.
    #[must_use]
    pub const fn live(&self) -> &LiveQuery<Contact> {
        &self.live
    }

    /// Apply queued feed messages.
    pub async fn sync(&mut self) -> Result<usize, Error> {
        self.live.drain_pending().await
    }

    /// Wait for the next feed message.
    pub async fn next_change(&mut self) -> Result<SyncOutcome, Error> {
        self.live.next_change().await
    }

    /// Release the live collection.
    pub fn close(&mut self) {
        self.live.close();
    }

    /// Load contacts, primary first then by family name, and keep them live.
    pub async fn list(&mut self, options: ContactListOptions) -> Result<Vec<Contact>, Error> {
        let scope = self.list_scope(options);
        open_live(&mut self.live, scope).await
    }

    fn list_scope(&self, options: ContactListOptions) -> Result<LiveScope, Error> {
        let actor = self.handle.actor();
        let mut predicate = predicate_for(
            actor,
            EntityKind::Contact,
            &PolicyOptions {
                company: options.company_id,
                project: None,
            },
        )?;
        if !options.including_inactive {
            predicate = predicate.and(Filter::eq("is_active", true));
        }
        let mut feed = FeedRequest::table(Table::ClientContacts);
        if let Some(company) = options.company_id.or(actor.affiliated_company_id()) {
            feed = feed.with_filter(Filter::eq("company_id", Value::from(company)));
        }
        Ok(LiveScope::new(predicate, feed)
            .ordered_by("is_primary", Direction::Descending)
            .ordered_by("last_name", Direction::Ascending))
    }

    /// Add a contact. A new primary contact demotes the current one first.
    pub async fn create(&mut self, input: NewContact) -> Result<Contact, Error> {
        input.validate()?;
        let predicate = self.predicate()?;
        let mut row = encode(&input)?;
        row.insert("is_active".into(), json!(true));
        if !predicate.matches(&row) {
            return Err(forbidden(EntityKind::Contact, None));
        }

        if input.is_primary {
            self.demote_primary(input.company_id, None).await?;
        }
        let stored = insert_guarded(self.handle.store().as_ref(), &predicate, row).await?;
        self.live.apply_local(stored.clone());
        let contact: Contact = decode(stored)?;
        info!(contact_id = %contact.id, company_id = %contact.company_id, "contact created");
        Ok(contact)
    }

    /// Apply a partial update.
    pub async fn update(&mut self, id: ContactId, patch: ContactPatch) -> Result<Contact, Error> {
        patch.validate()?;
        let mut row = encode(&patch)?;
        stamp(&mut row, "updated_at", self.handle.clock().utc());
        self.write(id, row).await
    }

    /// Make `id` its company's primary contact.
    ///
    /// Runs as unset-then-set: every other primary contact in the company is
    /// demoted (possibly none), then `id` is promoted.
    pub async fn set_primary(&mut self, id: ContactId) -> Result<Contact, Error> {
        let uuid = *id.as_uuid();
        let existing =
            fetch_existing(self.handle.store().as_ref(), EntityKind::Contact, uuid).await?;
        let predicate = self.predicate()?;
        let mut promote = Row::new();
        promote.insert("is_primary".into(), json!(true));
        stamp(&mut promote, "updated_at", self.handle.clock().utc());
        ensure_writable(&predicate, &existing, &promote, uuid)?;

        let company = column_uuid(&existing, "company_id")
            .map(CompanyId::from_uuid)
            .ok_or_else(|| Error::backend_permanent("contact row has no company_id"))?;
        self.demote_primary(company, Some(uuid)).await?;

        let stored =
            update_row(self.handle.store().as_ref(), EntityKind::Contact, uuid, promote).await?;
        self.live.apply_local(stored.clone());
        info!(contact_id = %id, company_id = %company, "primary contact set");
        decode(stored)
    }

    /// Archive a contact. Archived contacts are never primary.
    pub async fn archive(&mut self, id: ContactId) -> Result<Contact, Error> {
        let mut row = Row::new();
        row.insert("is_active".into(), json!(false));
        row.insert("is_primary".into(), json!(false));
        stamp(&mut row, "updated_at", self.handle.clock().utc());
        let contact = self.write(id, row).await?;
        info!(contact_id = %id, "contact archived");
        Ok(contact)
    }

    /// Link a contact to a login, making it that user's affiliation.
    /// Staff only.
    pub async fn link_to_profile(
        &mut self,
        id: ContactId,
        profile_id: UserId,
    ) -> Result<Contact, Error> {
        if !self.handle.actor().is_staff() {
            return Err(forbidden(EntityKind::Contact, Some(*id.as_uuid()))
                .with_details(json!({ "kind": "contact", "code": "staff_only" })));
        }
        let mut row = Row::new();
        row.insert("profile_id".into(), Value::from(profile_id));
        stamp(&mut row, "updated_at", self.handle.clock().utc());
        self.write(id, row).await
    }

    async fn write(&mut self, id: ContactId, row: Row) -> Result<Contact, Error> {
        let uuid = *id.as_uuid();
        let store = self.handle.store().as_ref();
        let existing = fetch_existing(store, EntityKind::Contact, uuid).await?;
        ensure_writable(&self.predicate()?, &existing, &row, uuid)?;
        let stored = update_row(store, EntityKind::Contact, uuid, row).await?;
        self.live.apply_local(stored.clone());
        decode(stored)
    }

    async fn demote_primary(&mut self, company: CompanyId, keep: Option<Uuid>) -> Result<(), Error> {
        let mut filters = vec![
            Filter::eq("company_id", Value::from(company)),
            Filter::eq("is_primary", true),
        ];
        if let Some(kept) = keep {
            filters.push(Filter::neq("id", Value::String(kept.to_string())));
        }
        let mut patch = Row::new();
        patch.insert("is_primary".into(), json!(false));
        stamp(&mut patch, "updated_at", self.handle.clock().utc());

        let demoted = self
            .handle
            .store()
            .update(Table::ClientContacts, &filters, patch)
            .await?;
        debug!(company_id = %company, demoted = demoted.len(), "previous primary contacts unset");
        for row in demoted {
            self.live.apply_local(row);
        }
        Ok(())
    }

    fn predicate(&self) -> Result<Predicate, Error> {
        predicate_for(self.handle.actor(), EntityKind::Contact, &PolicyOptions::unscoped())
    }
}

#[cfg(test)]
#[path = "contact_service_tests.rs"]
mod tests;
