//! Project discussion threads.

use serde_json::{Value, json};
use tracing::info;
use uuid::Uuid;

use super::authors::AuthorDirectory;
use super::support::{
    column_uuid, decode, delete_row, encode, ensure_writable, fetch_existing, forbidden,
    insert_guarded, not_found, open_live, predicate_for, resolve_project_scope, stamp, update_row,
};
use crate::domain::entities::{Comment, CommentPatch, CommentWithUser, NewComment};
use crate::domain::live::{LiveQuery, LiveScope, SyncOutcome};
use crate::domain::ports::{Direction, FeedRequest, Filter, Row, Table};
use crate::domain::record::EntityKind;
use crate::domain::{
    CommentId, Error, PolicyOptions, Predicate, ProjectId, SessionHandle,
};

/// Comments on one project at a time.
///
/// Listing another project switches the live collection: the previous
/// project's subscription is released before the new one opens.
pub struct CommentService {
    handle: SessionHandle,
    live: LiveQuery<Comment>,
    authors: AuthorDirectory,
}

impl CommentService {
    /// Bind a service to a session.
    #[must_use]
    pub fn new(handle: SessionHandle) -> Self {
        let live = handle.live_query();
        Self {
            handle,
            live,
            authors: AuthorDirectory::default(),
        }
    }

    /// The live collection.
    #[must_use]
    pub const fn live(&self) -> &LiveQuery<Comment> {
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

    /// Load a project's comments, newest first, and keep them live.
    pub async fn list(&mut self, project_id: ProjectId) -> Result<Vec<Comment>, Error> {
        let scope = self.list_scope(project_id).await;
        open_live(&mut self.live, scope).await
    }

    /// The live comments joined with their authors' profiles.
    ///
    /// Each author is fetched once per service, so a comment that arrives
    /// through the feed costs a lookup only when its author is new.
    pub async fn with_authors(&mut self) -> Result<Vec<CommentWithUser>, Error> {
        let comments = self.live.records();
        let ids = comments.iter().map(|comment| comment.user_id).collect();
        self.authors
            .resolve(self.handle.store().as_ref(), ids)
            .await?;
        Ok(comments
            .into_iter()
            .map(|comment| {
                let user = self.authors.get(comment.user_id);
                CommentWithUser { comment, user }
            })
            .collect())
    }

    async fn list_scope(&self, project_id: ProjectId) -> Result<LiveScope, Error> {
        let predicate = self.predicate_for_project(project_id).await?;
        let feed = FeedRequest::table(Table::Comments)
            .with_filter(Filter::eq("project_id", Value::from(project_id)));
        Ok(LiveScope::new(predicate, feed).ordered_by("created_at", Direction::Descending))
    }

    /// Post a comment as the session's actor. Clients cannot post internal
    /// comments.
    pub async fn create(&mut self, input: NewComment) -> Result<Comment, Error> {
        input.validate()?;
        let predicate = self.predicate_for_project(input.project_id).await?;
        let mut row = Row::new();
        row.insert("project_id".into(), Value::from(input.project_id));
        row.insert("user_id".into(), Value::from(self.handle.actor().id()));
        row.insert("text".into(), json!(input.text.trim()));
        row.insert("is_internal".into(), json!(input.is_internal));

        let stored = insert_guarded(self.handle.store().as_ref(), &predicate, row).await?;
        self.live.apply_local(stored.clone());
        let comment: Comment = decode(stored)?;
        info!(comment_id = %comment.id, project_id = %comment.project_id, "comment posted");
        Ok(comment)
    }

    /// Edit one of the actor's own comments.
    pub async fn update(&mut self, id: CommentId, patch: CommentPatch) -> Result<Comment, Error> {
        patch.validate()?;
        let uuid = *id.as_uuid();
        let existing = fetch_existing(self.handle.store().as_ref(), EntityKind::Comment, uuid).await?;
        let predicate = self.predicate_for_row(&existing).await?;
        self.ensure_author(&existing, uuid)?;

        let mut row = encode(&CommentPatch {
            text: patch.text.trim().to_owned(),
        })?;
        stamp(&mut row, "updated_at", self.handle.clock().utc());
        ensure_writable(&predicate, &existing, &row, uuid)?;

        let stored = update_row(self.handle.store().as_ref(), EntityKind::Comment, uuid, row).await?;
        self.live.apply_local(stored.clone());
        decode(stored)
    }

    /// Delete one of the actor's own comments.
    pub async fn delete(&mut self, id: CommentId) -> Result<(), Error> {
        let uuid = *id.as_uuid();
        let store = self.handle.store().as_ref();
        let existing = fetch_existing(store, EntityKind::Comment, uuid).await?;
        let predicate = self.predicate_for_row(&existing).await?;
        if !predicate.matches(&existing) {
            return Err(not_found(EntityKind::Comment, uuid));
        }
        self.ensure_author(&existing, uuid)?;

        delete_row(store, EntityKind::Comment, uuid).await?;
        self.live.remove_local(uuid);
        info!(comment_id = %id, "comment deleted");
        Ok(())
    }

    async fn predicate_for_project(&self, project_id: ProjectId) -> Result<Predicate, Error> {
        let scope = resolve_project_scope(self.handle.store().as_ref(), project_id).await?;
        predicate_for(
            self.handle.actor(),
            EntityKind::Comment,
            &PolicyOptions::for_project(scope),
        )
    }

    async fn predicate_for_row(&self, row: &Row) -> Result<Predicate, Error> {
        let project_id = column_uuid(row, "project_id")
            .map(ProjectId::from_uuid)
            .ok_or_else(|| Error::backend_permanent("comment row has no project_id"))?;
        self.predicate_for_project(project_id).await
    }

    fn ensure_author(&self, row: &Row, id: Uuid) -> Result<(), Error> {
        let author = column_uuid(row, "user_id");
        if author != Some(*self.handle.actor().id().as_uuid()) {
            return Err(forbidden(EntityKind::Comment, Some(id))
                .with_details(json!({ "kind": "comment", "code": "not_author" })));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "comment_service_tests.rs"]
mod tests;
