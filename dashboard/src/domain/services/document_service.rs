//! Project documents backed by the blob store.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Value, json};
use tracing::{info, warn};

use super::authors::AuthorDirectory;
use super::support::{
    decode, delete_row, fetch_existing, forbidden, insert_guarded, not_found, open_live,
    predicate_for, resolve_project_scope,
};
use crate::domain::entities::{
    Document, DocumentCategory, DocumentUpload, DocumentWithUploader,
};
use crate::domain::live::{LiveQuery, LiveScope, SyncOutcome};
use crate::domain::ports::{Direction, FeedRequest, Filter, Row, Table};
use crate::domain::record::EntityKind;
use crate::domain::{DocumentId, Error, PolicyOptions, Predicate, ProjectId, SessionHandle};

/// Filters for [`DocumentService::list`].
///
/// Staff see internal documents unless they clear `include_internal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentListOptions {
    /// Only this category.
    pub category: Option<DocumentCategory>,
    /// Include staff-only documents. Ignored for clients.
    pub include_internal: bool,
}

impl Default for DocumentListOptions {
    fn default() -> Self {
        Self {
            category: None,
            include_internal: true,
        }
    }
}

static UNSAFE_NAME_CHARS: OnceLock<Regex> = OnceLock::new();

fn unsafe_name_chars() -> &'static Regex {
    UNSAFE_NAME_CHARS.get_or_init(|| {
        Regex::new("[^a-z0-9]")
            .unwrap_or_else(|error| panic!("file name regex failed to compile: {error}"))
    })
}

/// Blob path for an upload: `{project}/{millis}_{name}.{ext}` with the name
/// lowercased and every other character replaced by `_`.
pub(crate) fn blob_path(upload: &DocumentUpload, epoch_millis: i64) -> String {
    let lowered = upload.name.to_lowercase();
    let name = unsafe_name_chars().replace_all(&lowered, "_");
    upload.extension().map_or_else(
        || format!("{}/{epoch_millis}_{name}", upload.project_id),
        |ext| format!("{}/{epoch_millis}_{name}.{ext}", upload.project_id),
    )
}

/// Documents of one project at a time.
pub struct DocumentService {
    handle: SessionHandle,
    live: LiveQuery<Document>,
    uploaders: AuthorDirectory,
}

impl DocumentService {
    /// Bind a service to a session.
    #[must_use]
    pub fn new(handle: SessionHandle) -> Self {
        let live = handle.live_query();
        Self {
            handle,
            live,
            uploaders: AuthorDirectory::default(),
        }
    }

    /// The live collection.
    #[must_use]
    pub const fn live(&self) -> &LiveQuery<Document> {
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

    /// Load a project's documents, newest first, and keep them live.
    pub async fn list(
        &mut self,
        project_id: ProjectId,
        options: DocumentListOptions,
    ) -> Result<Vec<Document>, Error> {
        let scope = self.list_scope(project_id, options).await;
        open_live(&mut self.live, scope).await
    }

    /// The live documents joined with their uploaders' profiles, fetched
    /// once per uploader.
    pub async fn with_uploaders(&mut self) -> Result<Vec<DocumentWithUploader>, Error> {
        let documents = self.live.records();
        let ids = documents
            .iter()
            .filter_map(|document| document.uploaded_by)
            .collect();
        self.uploaders
            .resolve(self.handle.store().as_ref(), ids)
            .await?;
        Ok(documents
            .into_iter()
            .map(|document| {
                let uploader = document.uploaded_by.and_then(|id| self.uploaders.get(id));
                DocumentWithUploader { document, uploader }
            })
            .collect())
    }

    async fn list_scope(
        &self,
        project_id: ProjectId,
        options: DocumentListOptions,
    ) -> Result<LiveScope, Error> {
        let mut predicate = self.predicate_for_project(project_id).await?;
        if self.handle.actor().is_staff() && !options.include_internal {
            predicate = predicate.and(Filter::eq("is_internal", false));
        }
        if let Some(category) = options.category {
            predicate = predicate.and(Filter::eq("category", category.as_str()));
        }
        let feed = FeedRequest::table(Table::Documents)
            .with_filter(Filter::eq("project_id", Value::from(project_id)));
        Ok(LiveScope::new(predicate, feed).ordered_by("created_at", Direction::Descending))
    }

    /// Store the file, then record it. The blob is removed again when the
    /// row cannot be written.
    pub async fn upload(&mut self, upload: DocumentUpload) -> Result<Document, Error> {
        upload.validate()?;
        let predicate = self.predicate_for_project(upload.project_id).await?;
        let mut row = Row::new();
        row.insert("project_id".into(), Value::from(upload.project_id));
        row.insert("name".into(), json!(upload.name));
        row.insert("file_type".into(), json!(upload.content_type));
        row.insert("file_size".into(), json!(upload.bytes.len()));
        row.insert(
            "category".into(),
            json!(upload.category.map(DocumentCategory::as_str)),
        );
        row.insert("description".into(), json!(upload.description));
        row.insert("is_internal".into(), json!(upload.is_internal));
        row.insert("uploaded_by".into(), Value::from(self.handle.actor().id()));
        if !predicate.matches(&row) {
            return Err(forbidden(EntityKind::Document, None));
        }

        let path = blob_path(&upload, self.handle.clock().utc().timestamp_millis());
        let public_url = self
            .handle
            .blobs()
            .upload(&path, upload.bytes, upload.content_type.clone())
            .await?;
        row.insert("file_path".into(), json!(public_url));

        let stored = match insert_guarded(self.handle.store().as_ref(), &predicate, row).await {
            Ok(stored) => stored,
            Err(err) => {
                let removed = self.handle.blobs().remove(&[path.clone()]).await;
                if let Err(cleanup) = removed {
                    warn!(%path, error = %cleanup, "failed to remove orphaned blob");
                }
                return Err(err);
            }
        };
        self.live.apply_local(stored.clone());
        let document: Document = decode(stored)?;
        info!(document_id = %document.id, %path, "document uploaded");
        Ok(document)
    }

    /// Delete a document and its blob. A storage failure is logged and the
    /// row is deleted regardless.
    pub async fn delete(&mut self, id: DocumentId) -> Result<(), Error> {
        let uuid = *id.as_uuid();
        let store = self.handle.store().as_ref();
        let existing = fetch_existing(store, EntityKind::Document, uuid).await?;
        let document: Document = decode(existing.clone())?;
        let predicate = self.predicate_for_project(document.project_id).await?;
        if !predicate.matches(&existing) {
            return Err(not_found(EntityKind::Document, uuid));
        }

        if let Some(path) = document.storage_path() {
            let removed = self.handle.blobs().remove(&[path.clone()]).await;
            if let Err(err) = removed {
                warn!(%path, error = %err, "failed to remove document blob");
            }
        }
        delete_row(store, EntityKind::Document, uuid).await?;
        self.live.remove_local(uuid);
        info!(document_id = %id, "document deleted");
        Ok(())
    }

    async fn predicate_for_project(&self, project_id: ProjectId) -> Result<Predicate, Error> {
        let scope = resolve_project_scope(self.handle.store().as_ref(), project_id).await?;
        predicate_for(
            self.handle.actor(),
            EntityKind::Document,
            &PolicyOptions::for_project(scope),
        )
    }
}

#[cfg(test)]
#[path = "document_service_tests.rs"]
mod tests;
