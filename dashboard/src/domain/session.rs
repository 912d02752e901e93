//! Signed-in session state shared by the services.
//!
//! A [`DashboardSession`] exists only between sign-in and sign-out. It
//! resolves the caller's [`Actor`] once and hands every service an explicit
//! [`SessionHandle`] instead of a process-wide client.

use std::sync::Arc;

use mockable::Clock;
use serde_json::json;
use tokio::sync::watch;
use tracing::{debug, info};

use super::actor::Actor;
use super::entities::Profile;
use super::live::LiveQuery;
use super::ports::{AuthSession, AuthUser, BlobStore, ChangeFeed, Credentials, EntityStore};
use super::services::{
    CommentService, CompanyService, ContactService, DocumentService, ProfileService,
    ProjectService,
};
use super::Error;
use super::record::LiveRecord;

/// Adapters a session is built from.
#[derive(Clone)]
pub struct SessionPorts {
    /// Row storage.
    pub store: Arc<dyn EntityStore>,
    /// Change feed.
    pub feed: Arc<dyn ChangeFeed>,
    /// File storage.
    pub blobs: Arc<dyn BlobStore>,
    /// Authentication.
    pub auth: Arc<dyn AuthSession>,
    /// Wall clock.
    pub clock: Arc<dyn Clock>,
}

impl SessionPorts {
    /// Bundle the adapters.
    #[must_use]
    pub fn new(
        store: Arc<dyn EntityStore>,
        feed: Arc<dyn ChangeFeed>,
        blobs: Arc<dyn BlobStore>,
        auth: Arc<dyn AuthSession>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            feed,
            blobs,
            auth,
            clock,
        }
    }
}

/// Read-only context every service receives: the ports plus the resolved
/// actor.
#[derive(Clone)]
pub struct SessionHandle {
    store: Arc<dyn EntityStore>,
    feed: Arc<dyn ChangeFeed>,
    blobs: Arc<dyn BlobStore>,
    clock: Arc<dyn Clock>,
    actor: Actor,
    session_end: Option<watch::Receiver<bool>>,
}

impl SessionHandle {
    /// Build a handle for `actor`. Handles built this way are not tied to a
    /// [`DashboardSession`] and never end on their own.
    #[must_use]
    pub fn new(ports: &SessionPorts, actor: Actor) -> Self {
        Self {
            store: Arc::clone(&ports.store),
            feed: Arc::clone(&ports.feed),
            blobs: Arc::clone(&ports.blobs),
            clock: Arc::clone(&ports.clock),
            actor,
            session_end: None,
        }
    }

    fn ending_with(mut self, signal: watch::Receiver<bool>) -> Self {
        self.session_end = Some(signal);
        self
    }

    /// Closed live query over this handle's store and feed. It closes
    /// itself when the owning session signs out.
    #[must_use]
    pub fn live_query<R: LiveRecord>(&self) -> LiveQuery<R> {
        let query = LiveQuery::new(Arc::clone(&self.store), Arc::clone(&self.feed));
        let Some(signal) = &self.session_end else {
            return query;
        };
        query.ending_with(signal.clone())
    }

    /// Row storage.
    #[must_use]
    pub const fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }

    /// Change feed.
    #[must_use]
    pub const fn feed(&self) -> &Arc<dyn ChangeFeed> {
        &self.feed
    }

    /// File storage.
    #[must_use]
    pub const fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    /// Wall clock.
    #[must_use]
    pub const fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Resolved caller.
    #[must_use]
    pub const fn actor(&self) -> &Actor {
        &self.actor
    }
}

/// An authenticated dashboard session.
pub struct DashboardSession {
    ports: SessionPorts,
    user: AuthUser,
    profile: Profile,
    handle: SessionHandle,
    session_end: watch::Sender<bool>,
}

impl DashboardSession {
    /// Sign in with a password and resolve the caller's profile and actor.
    pub async fn sign_in(ports: SessionPorts, credentials: &Credentials) -> Result<Self, Error> {
        if credentials.email.trim().is_empty() || credentials.password.is_empty() {
            return Err(Error::invalid_request("email and password are required")
                .with_details(json!({ "field": "credentials", "code": "empty" })));
        }
        let user = ports.auth.sign_in(credentials).await?;
        info!(user_id = %user.id, "signed in");
        Self::establish(ports, user).await
    }

    /// Resume the auth collaborator's current session, if there is one.
    pub async fn restore(ports: SessionPorts) -> Result<Option<Self>, Error> {
        match ports.auth.current_user().await? {
            Some(user) => {
                debug!(user_id = %user.id, "restoring session");
                Self::establish(ports, user).await.map(Some)
            }
            None => Ok(None),
        }
    }

    async fn establish(ports: SessionPorts, user: AuthUser) -> Result<Self, Error> {
        let profiles = ProfileService::new(Arc::clone(&ports.store), Arc::clone(&ports.clock));
        let profile = profiles.load(&user).await?;
        let actor = profiles.resolve_actor(&profile).await?;
        debug!(
            user_id = %user.id,
            role = actor.role_claim().unwrap_or("<none>"),
            company = ?actor.affiliated_company_id(),
            "resolved actor"
        );
        let (session_end, signal) = watch::channel(false);
        let handle = SessionHandle::new(&ports, actor).ending_with(signal);
        Ok(Self {
            ports,
            user,
            profile,
            handle,
            session_end,
        })
    }

    /// End the session.
    ///
    /// Every live collection opened through a service handed out by this
    /// session closes and releases its subscription; reopening one reports
    /// `Unauthorized`. The signal is sent even when the auth service fails.
    pub async fn sign_out(self) -> Result<(), Error> {
        self.session_end.send_replace(true);
        self.ports.auth.sign_out().await?;
        info!(user_id = %self.user.id, "signed out");
        Ok(())
    }

    /// Authenticated user.
    #[must_use]
    pub const fn user(&self) -> &AuthUser {
        &self.user
    }

    /// Profile loaded at sign-in.
    #[must_use]
    pub const fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Resolved actor.
    #[must_use]
    pub fn actor(&self) -> &Actor {
        self.handle.actor()
    }

    /// Handle shared with services.
    #[must_use]
    pub const fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    /// Project service bound to this session.
    #[must_use]
    pub fn projects(&self) -> ProjectService {
        ProjectService::new(self.handle.clone())
    }

    /// Comment service bound to this session.
    #[must_use]
    pub fn comments(&self) -> CommentService {
        CommentService::new(self.handle.clone())
    }

    /// Document service bound to this session.
    #[must_use]
    pub fn documents(&self) -> DocumentService {
        DocumentService::new(self.handle.clone())
    }

    /// Contact service bound to this session.
    #[must_use]
    pub fn contacts(&self) -> ContactService {
        ContactService::new(self.handle.clone())
    }

    /// Company service bound to this session.
    #[must_use]
    pub fn companies(&self) -> CompanyService {
        CompanyService::new(self.handle.clone())
    }

    /// Profile service acting as this session's actor.
    #[must_use]
    pub fn profiles(&self) -> ProfileService {
        ProfileService::new(Arc::clone(&self.ports.store), Arc::clone(&self.ports.clock))
            .acting_as(self.handle.actor().clone())
    }
}
