//! Shared world for the in-memory integration tests.

use std::sync::Arc;

use async_trait::async_trait;
use dashboard::domain::ports::{
    AuthSession, AuthSessionError, AuthUser, Credentials, Row, Table,
};
use dashboard::domain::record::to_row;
use dashboard::domain::{
    Actor, CompanyId, ContactId, ProjectId, SessionHandle, SessionPorts, UserId,
};
use dashboard::outbound::memory::{InMemoryBlobStore, InMemoryEntityStore};
use mockable::DefaultClock;
use serde_json::{Value, json};
use uuid::Uuid;

/// Two client companies: `co1` owns two projects, `co2` owns one.
pub struct World {
    pub store: InMemoryEntityStore,
    pub blobs: InMemoryBlobStore,
    pub co1: CompanyId,
    pub co2: CompanyId,
    pub co1_projects: [ProjectId; 2],
    pub co2_project: ProjectId,
}

impl World {
    pub fn new() -> Self {
        let store = InMemoryEntityStore::new(Arc::new(DefaultClock));
        let co1 = CompanyId::random();
        let co2 = CompanyId::random();
        let co1_projects = [ProjectId::random(), ProjectId::random()];
        let co2_project = ProjectId::random();

        store.seed(
            Table::ClientCompanies,
            [company(co1, "Northwind Builders"), company(co2, "Harbour Homes")],
        );
        store.seed(
            Table::Projects,
            [
                project(co1_projects[0], co1, "Kitchen remodel", "2024-05-01"),
                project(co1_projects[1], co1, "Deck extension", "2024-05-20"),
                project(co2_project, co2, "Roof replacement", "2024-04-11"),
            ],
        );
        Self {
            store,
            blobs: InMemoryBlobStore::new("https://cdn.example.test/documents"),
            co1,
            co2,
            co1_projects,
            co2_project,
        }
    }

    pub fn ports(&self) -> SessionPorts {
        self.ports_with_auth(Arc::new(StaticAuth::signed_out()))
    }

    pub fn ports_with_auth(&self, auth: Arc<dyn AuthSession>) -> SessionPorts {
        SessionPorts::new(
            Arc::new(self.store.clone()),
            Arc::new(self.store.clone()),
            Arc::new(self.blobs.clone()),
            auth,
            Arc::new(DefaultClock),
        )
    }

    pub fn handle(&self, actor: Actor) -> SessionHandle {
        SessionHandle::new(&self.ports(), actor)
    }

    pub fn client_of(&self, company: CompanyId) -> Actor {
        Actor::client(UserId::random(), Some(company))
    }

    pub fn coordinator(&self) -> Actor {
        Actor::coordinator(UserId::random())
    }

    pub fn add_contact(
        &self,
        company: CompanyId,
        last_name: &str,
        primary: bool,
        profile: Option<UserId>,
    ) -> ContactId {
        let id = ContactId::random();
        self.store.seed(
            Table::ClientContacts,
            [row(json!({
                "id": id.to_string(),
                "company_id": company.to_string(),
                "profile_id": profile.map(|p| p.to_string()),
                "first_name": "Robin",
                "last_name": last_name,
                "is_primary": primary,
                "is_active": true,
                "created_at": "2024-01-01T00:00:00Z",
                "updated_at": "2024-01-01T00:00:00Z",
            }))],
        );
        id
    }
}

pub fn row(value: Value) -> Row {
    to_row(&value).expect("fixture rows are objects")
}

pub fn comment(project: ProjectId, author: UserId, text: &str, internal: bool) -> Row {
    row(json!({
        "id": Uuid::new_v4().to_string(),
        "project_id": project.to_string(),
        "user_id": author.to_string(),
        "text": text,
        "is_internal": internal,
        "created_at": "2024-06-01T09:00:00Z",
    }))
}

fn company(id: CompanyId, name: &str) -> Row {
    row(json!({
        "id": id.to_string(),
        "name": name,
        "is_active": true,
        "created_at": "2024-01-01T00:00:00Z",
        "updated_at": "2024-01-01T00:00:00Z",
    }))
}

pub fn project(id: ProjectId, company: CompanyId, name: &str, updated: &str) -> Row {
    row(json!({
        "id": id.to_string(),
        "name": name,
        "address": "12 Elm St",
        "client_company_id": company.to_string(),
        "status": "Framing",
        "last_update_date": updated,
        "created_at": "2024-01-01T00:00:00Z",
        "updated_at": "2024-01-01T00:00:00Z",
    }))
}

/// Auth double that accepts one password and reports a fixed user.
pub struct StaticAuth {
    user: Option<AuthUser>,
    password: String,
}

impl StaticAuth {
    pub fn signed_out() -> Self {
        Self {
            user: None,
            password: String::new(),
        }
    }

    pub fn accepting(user: AuthUser, password: &str) -> Self {
        Self {
            user: Some(user),
            password: password.to_owned(),
        }
    }
}

#[async_trait]
impl AuthSession for StaticAuth {
    async fn sign_in(&self, credentials: &Credentials) -> Result<AuthUser, AuthSessionError> {
        match &self.user {
            Some(user) if credentials.password == self.password => Ok(user.clone()),
            _ => Err(AuthSessionError::invalid_credentials()),
        }
    }

    async fn current_user(&self) -> Result<Option<AuthUser>, AuthSessionError> {
        Ok(self.user.clone())
    }

    async fn sign_out(&self) -> Result<(), AuthSessionError> {
        Ok(())
    }
}
