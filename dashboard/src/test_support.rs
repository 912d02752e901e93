//! Shared doubles for unit tests.

use std::sync::Arc;

use chrono::{DateTime, Local, TimeZone, Utc};
use mockable::Clock;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::domain::ports::{
    BlobStore, EntityStore, FixtureAuthSession, FixtureBlobStore, FixtureChangeFeed, Row,
};
use crate::domain::record::to_row;
use crate::domain::{Actor, CompanyId, ProjectId, SessionHandle, SessionPorts};

/// Clock pinned to one instant.
pub struct FixtureClock {
    now: DateTime<Utc>,
}

impl Clock for FixtureClock {
    fn local(&self) -> DateTime<Local> {
        self.now.with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        self.now
    }
}

pub fn fixture_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 3, 14, 0, 0)
        .single()
        .expect("valid fixture timestamp")
}

pub fn fixture_clock() -> Arc<dyn Clock> {
    Arc::new(FixtureClock { now: fixture_now() })
}

pub fn ports_with(store: impl EntityStore + 'static) -> SessionPorts {
    SessionPorts::new(
        Arc::new(store),
        Arc::new(FixtureChangeFeed),
        Arc::new(FixtureBlobStore),
        Arc::new(FixtureAuthSession),
        fixture_clock(),
    )
}

pub fn handle_with(store: impl EntityStore + 'static, actor: Actor) -> SessionHandle {
    SessionHandle::new(&ports_with(store), actor)
}

pub fn handle_with_blobs(
    store: impl EntityStore + 'static,
    blobs: impl BlobStore + 'static,
    actor: Actor,
) -> SessionHandle {
    let mut ports = ports_with(store);
    ports.blobs = Arc::new(blobs);
    SessionHandle::new(&ports, actor)
}

pub fn row(value: Value) -> Row {
    to_row(&value).expect("object row")
}

pub fn project_row(id: ProjectId, company: CompanyId, last_update_date: &str) -> Row {
    row(json!({
        "id": id.to_string(),
        "name": "Basement refit",
        "address": "12 Elm St",
        "client_company_id": company.to_string(),
        "status": "Framing",
        "last_update_date": last_update_date,
        "created_at": "2024-01-01T00:00:00Z",
        "updated_at": "2024-01-01T00:00:00Z",
    }))
}

pub fn comment_row(id: Uuid, project: ProjectId, author: Uuid, internal: bool) -> Row {
    row(json!({
        "id": id.to_string(),
        "project_id": project.to_string(),
        "user_id": author.to_string(),
        "text": "Framing inspection booked",
        "is_internal": internal,
        "created_at": "2024-06-01T09:00:00Z",
    }))
}

pub fn author_profile_row(id: Uuid, full_name: &str) -> Row {
    row(json!({
        "id": id.to_string(),
        "full_name": full_name,
        "role": "client",
        "created_at": "2024-01-01T00:00:00Z",
        "updated_at": "2024-01-01T00:00:00Z",
    }))
}

pub fn document_row(id: Uuid, project: ProjectId, file: &str, internal: bool) -> Row {
    row(json!({
        "id": id.to_string(),
        "project_id": project.to_string(),
        "name": file,
        "file_path": format!("https://cdn.example.test/documents/{project}/{file}"),
        "is_internal": internal,
        "created_at": "2024-06-01T09:00:00Z",
    }))
}

pub fn contact_row(id: Uuid, company: CompanyId, last_name: &str, primary: bool) -> Row {
    row(json!({
        "id": id.to_string(),
        "company_id": company.to_string(),
        "first_name": "Robin",
        "last_name": last_name,
        "is_primary": primary,
        "is_active": true,
        "created_at": "2024-01-01T00:00:00Z",
        "updated_at": "2024-01-01T00:00:00Z",
    }))
}

pub fn company_row(id: CompanyId, name: &str) -> Row {
    row(json!({
        "id": id.to_string(),
        "name": name,
        "is_active": true,
        "created_at": "2024-01-01T00:00:00Z",
        "updated_at": "2024-01-01T00:00:00Z",
    }))
}
