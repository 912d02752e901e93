//! Port for the hosted backend's authentication service.

use async_trait::async_trait;

use super::define_port_error;
use crate::domain::UserId;

/// Authenticated user as reported by the auth service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    /// User id; also the `profiles` primary key.
    pub id: UserId,
    /// Login email, when the provider exposes one.
    pub email: Option<String>,
}

/// Password credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Login email.
    pub email: String,
    /// Password.
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

define_port_error! {
    /// Errors raised by auth adapters.
    pub enum AuthSessionError {
        /// The auth service could not be reached.
        Connection { message: String } =>
            backend_transient, "auth service connection failed: {message}",
        /// Credentials were refused.
        InvalidCredentials =>
            unauthorized, "invalid login credentials",
        /// The auth service answered with something unexpected.
        Protocol { message: String } =>
            backend_permanent, "auth service protocol error: {message}",
    }
}

/// Port for session lifecycle.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthSession: Send + Sync {
    /// Sign in and keep the resulting session for later requests.
    async fn sign_in(&self, credentials: &Credentials) -> Result<AuthUser, AuthSessionError>;

    /// User of the current session, if any.
    async fn current_user(&self) -> Result<Option<AuthUser>, AuthSessionError>;

    /// End the current session.
    async fn sign_out(&self) -> Result<(), AuthSessionError>;
}

/// Fixture auth service with no session.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureAuthSession;

#[async_trait]
impl AuthSession for FixtureAuthSession {
    async fn sign_in(&self, _credentials: &Credentials) -> Result<AuthUser, AuthSessionError> {
        Err(AuthSessionError::invalid_credentials())
    }

    async fn current_user(&self) -> Result<Option<AuthUser>, AuthSessionError> {
        Ok(None)
    }

    async fn sign_out(&self) -> Result<(), AuthSessionError> {
        Ok(())
    }
}
