//! Client companies.

use serde_json::{Value, json};
use tracing::info;

use super::support::{
    decode, encode, ensure_writable, fetch_existing, insert_guarded, not_found, open_live,
    predicate_for, stamp, update_row,
};
use crate::domain::entities::{Company, CompanyPatch, CompanyWithContacts, Contact, NewCompany};
use crate::domain::live::{LiveQuery, LiveScope, SyncOutcome};
use crate::domain::ports::{Direction, FeedRequest, Filter, Row, Table};
use crate::domain::record::{EntityKind, LiveRecord};
use crate::domain::{CompanyId, Error, PolicyOptions, Predicate, SessionHandle};

/// Companies visible to the session's actor.
pub struct CompanyService {
    handle: SessionHandle,
    live: LiveQuery<Company>,
}

impl CompanyService {
    /// Bind a service to a session.
    #[must_use]
    pub fn new(handle: SessionHandle) -> Self {
        let live = handle.live_query();
        Self { handle, live }
    }

    /// The live collection.
    #[must_use]
    pub const fn live(&self) -> &LiveQuery<Company> {
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

    /// Load active companies by name and keep them live.
    pub async fn list(&mut self) -> Result<Vec<Company>, Error> {
        let scope = self.list_scope();
        open_live(&mut self.live, scope).await
    }

    fn list_scope(&self) -> Result<LiveScope, Error> {
        let predicate = self.predicate()?.and(Filter::eq("is_active", true));
        let mut feed = FeedRequest::table(Table::ClientCompanies);
        if let Some(company) = self.handle.actor().affiliated_company_id() {
            feed = feed.with_filter(Filter::eq("id", Value::from(company)));
        }
        Ok(LiveScope::new(predicate, feed).ordered_by("name", Direction::Ascending))
    }

    /// Register a company. Clients cannot create companies: a new row has no
    /// id yet, so it never satisfies a client's predicate.
    pub async fn create(&mut self, input: NewCompany) -> Result<Company, Error> {
        input.validate()?;
        let predicate = self.predicate()?;
        let mut row = encode(&input)?;
        row.insert("is_active".into(), json!(true));
        let stored = insert_guarded(self.handle.store().as_ref(), &predicate, row).await?;
        self.live.apply_local(stored.clone());
        let company: Company = decode(stored)?;
        info!(company_id = %company.id, "company created");
        Ok(company)
    }

    /// Apply a partial update.
    pub async fn update(&mut self, id: CompanyId, patch: CompanyPatch) -> Result<Company, Error> {
        patch.validate()?;
        let mut row = encode(&patch)?;
        stamp(&mut row, "updated_at", self.handle.clock().utc());
        self.write(id, row).await
    }

    /// Mark a company inactive. Its rows stay in place.
    pub async fn archive(&mut self, id: CompanyId) -> Result<Company, Error> {
        let mut row = Row::new();
        row.insert("is_active".into(), json!(false));
        stamp(&mut row, "updated_at", self.handle.clock().utc());
        let company = self.write(id, row).await?;
        info!(company_id = %id, "company archived");
        Ok(company)
    }

    /// Read one company together with its active contacts, primary first.
    pub async fn get_with_contacts(&self, id: CompanyId) -> Result<CompanyWithContacts, Error> {
        let uuid = *id.as_uuid();
        let store = self.handle.store().as_ref();
        let row = fetch_existing(store, EntityKind::Company, uuid).await?;
        if !self.predicate()?.matches(&row) {
            return Err(not_found(EntityKind::Company, uuid));
        }
        let company: Company = decode(row)?;

        let contact_predicate = predicate_for(
            self.handle.actor(),
            EntityKind::Contact,
            &PolicyOptions::for_company(id),
        )?
        .and(Filter::eq("is_active", true));
        let mut contacts = if contact_predicate.is_deny_all() {
            Vec::new()
        } else {
            let query = contact_predicate
                .to_query()
                .order_by("is_primary", Direction::Descending)
                .order_by("last_name", Direction::Ascending);
            store
                .select(&query)
                .await?
                .into_iter()
                .filter(|row| contact_predicate.matches(row))
                .map(decode::<Contact>)
                .collect::<Result<Vec<_>, _>>()?
        };
        contacts.sort_by(|a, b| a.collection_order(b));
        Ok(CompanyWithContacts { company, contacts })
    }

    async fn write(&mut self, id: CompanyId, row: Row) -> Result<Company, Error> {
        let uuid = *id.as_uuid();
        let store = self.handle.store().as_ref();
        let existing = fetch_existing(store, EntityKind::Company, uuid).await?;
        ensure_writable(&self.predicate()?, &existing, &row, uuid)?;
        let stored = update_row(store, EntityKind::Company, uuid, row).await?;
        self.live.apply_local(stored.clone());
        decode(stored)
    }

    fn predicate(&self) -> Result<Predicate, Error> {
        predicate_for(self.handle.actor(), EntityKind::Company, &PolicyOptions::unscoped())
    }
}

#[cfg(test)]
#[path = "company_service_tests.rs"]
mod tests;
