//! Project listing and mutation.

use serde_json::Value;
use tracing::info;

use super::support::{
    decode, delete_row, encode, ensure_writable, fetch_existing, insert_guarded, not_found,
    open_live, predicate_for, stamp, update_row,
};
use crate::domain::entities::{NewProject, Project, ProjectPatch, ProjectStatus};
use crate::domain::live::{LiveQuery, LiveScope, SyncOutcome};
use crate::domain::ports::{Direction, FeedRequest, Filter, Table};
use crate::domain::record::EntityKind;
use crate::domain::{CompanyId, Error, PolicyOptions, ProjectId, SessionHandle};

/// Scope for [`ProjectService::list`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectListOptions {
    /// Only this company's projects.
    pub company_id: Option<CompanyId>,
    /// Leave out completed projects.
    pub only_active: bool,
}

/// Projects visible to the session's actor.
pub struct ProjectService {
    handle: SessionHandle,
    live: LiveQuery<Project>,
}

impl ProjectService {
    /// Bind a service to a session.
    #[must_use]
    pub fn new(handle: SessionHandle) -> Self {
        let live = handle.live_query();
        Self { handle, live }
    }

    /// The live collection.
    #[must_use]
    pub const fn live(&self) -> &LiveQuery<Project> {
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

    /// Load projects, most recently updated first, and keep them live.
    pub async fn list(&mut self, options: ProjectListOptions) -> Result<Vec<Project>, Error> {
        let scope = self.list_scope(options);
        open_live(&mut self.live, scope).await
    }

    fn list_scope(&self, options: ProjectListOptions) -> Result<LiveScope, Error> {
        let actor = self.handle.actor();
        let policy = PolicyOptions {
            company: options.company_id,
            project: None,
        };
        let mut predicate = predicate_for(actor, EntityKind::Project, &policy)?;
        if options.only_active {
            predicate = predicate.and(Filter::neq("status", ProjectStatus::Complete.as_str()));
        }
        let mut feed = FeedRequest::table(Table::Projects);
        if let Some(company) = options.company_id.or(actor.affiliated_company_id()) {
            feed = feed.with_filter(Filter::eq("client_company_id", Value::from(company)));
        }
        Ok(LiveScope::new(predicate, feed)
            .ordered_by("last_update_date", Direction::Descending)
            .ordered_by("updated_at", Direction::Descending))
    }

    /// Read one project.
    pub async fn get(&self, id: ProjectId) -> Result<Project, Error> {
        let predicate = self.predicate()?;
        let row = fetch_existing(self.handle.store().as_ref(), EntityKind::Project, *id.as_uuid())
            .await?;
        if !predicate.matches(&row) {
            return Err(not_found(EntityKind::Project, *id.as_uuid()));
        }
        decode(row)
    }

    /// Create a project, stamping today's update date and the creator.
    pub async fn create(&mut self, input: NewProject) -> Result<Project, Error> {
        input.validate()?;
        let predicate = self.predicate()?;
        let mut row = encode(&input)?;
        stamp(&mut row, "last_update_date", self.today());
        stamp(&mut row, "created_by", self.handle.actor().id());

        let stored = insert_guarded(self.handle.store().as_ref(), &predicate, row).await?;
        self.live.apply_local(stored.clone());
        let project: Project = decode(stored)?;
        info!(project_id = %project.id, "project created");
        Ok(project)
    }

    /// Apply a partial update; re-stamps the update date.
    pub async fn update(&mut self, id: ProjectId, patch: ProjectPatch) -> Result<Project, Error> {
        patch.validate()?;
        let predicate = self.predicate()?;
        let uuid = *id.as_uuid();
        let store = self.handle.store().as_ref();
        let existing = fetch_existing(store, EntityKind::Project, uuid).await?;

        let mut row = encode(&patch)?;
        stamp(&mut row, "last_update_date", self.today());
        stamp(&mut row, "updated_at", self.handle.clock().utc());
        ensure_writable(&predicate, &existing, &row, uuid)?;

        let stored = update_row(store, EntityKind::Project, uuid, row).await?;
        self.live.apply_local(stored.clone());
        decode(stored)
    }

    /// Move a project to `status`, optionally posting an update note.
    pub async fn update_status(
        &mut self,
        id: ProjectId,
        status: ProjectStatus,
        update_text: Option<String>,
    ) -> Result<Project, Error> {
        let patch = ProjectPatch {
            status: Some(status),
            last_update: update_text.filter(|text| !text.trim().is_empty()),
            ..ProjectPatch::default()
        };
        let project = self.update(id, patch).await?;
        info!(project_id = %id, status = %status, "project status updated");
        Ok(project)
    }

    /// Delete a project. Projects outside the actor's scope report
    /// `NotFound`.
    pub async fn delete(&mut self, id: ProjectId) -> Result<(), Error> {
        let predicate = self.predicate()?;
        let uuid = *id.as_uuid();
        let store = self.handle.store().as_ref();
        let existing = fetch_existing(store, EntityKind::Project, uuid).await?;
        if !predicate.matches(&existing) {
            return Err(not_found(EntityKind::Project, uuid));
        }
        delete_row(store, EntityKind::Project, uuid).await?;
        self.live.remove_local(uuid);
        info!(project_id = %id, "project deleted");
        Ok(())
    }

    fn predicate(&self) -> Result<crate::domain::Predicate, Error> {
        predicate_for(self.handle.actor(), EntityKind::Project, &PolicyOptions::unscoped())
    }

    fn today(&self) -> chrono::NaiveDate {
        self.handle.clock().utc().date_naive()
    }
}

#[cfg(test)]
#[path = "project_service_tests.rs"]
mod tests;
