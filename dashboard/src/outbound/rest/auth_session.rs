//! Auth API adapter.

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, warn};

use super::dto::{PasswordGrantDto, TokenResponseDto, UserDto};
use super::{RestClient, status_message};
use crate::domain::ports::{AuthSession, AuthSessionError, AuthUser, Credentials};

const AUTH_PREFIX: &str = "auth/v1";

/// Auth session backed by the hosted auth API. The access token it obtains
/// is shared with every adapter built from the same [`RestClient`].
#[derive(Debug, Clone)]
pub struct RestAuthSession {
    client: RestClient,
}

impl RestAuthSession {
    /// Adapter sharing `client`'s token slot.
    #[must_use]
    pub fn new(client: RestClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AuthSession for RestAuthSession {
    async fn sign_in(&self, credentials: &Credentials) -> Result<AuthUser, AuthSessionError> {
        let mut url = self.client.endpoint(&[AUTH_PREFIX, "token"]);
        url.query_pairs_mut().append_pair("grant_type", "password");
        let grant = PasswordGrantDto {
            email: credentials.email.as_str(),
            password: credentials.password.as_str(),
        };
        let response = self
            .client
            .authorize(self.client.http().post(url))
            .json(&grant)
            .send()
            .await
            .map_err(map_transport_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_sign_in_status(status, body.as_ref()));
        }

        let token: TokenResponseDto = decode(body.as_ref())?;
        let user = AuthUser::try_from(token.user)?;
        self.client.store_token(Some(token.access_token));
        debug!(user_id = %user.id, "access token stored");
        Ok(user)
    }

    async fn current_user(&self) -> Result<Option<AuthUser>, AuthSessionError> {
        if self.client.read_token().is_none() {
            return Ok(None);
        }
        let url = self.client.endpoint(&[AUTH_PREFIX, "user"]);
        let response = self
            .client
            .authorize(self.client.http().get(url))
            .send()
            .await
            .map_err(map_transport_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                debug!("stored access token no longer accepted");
                self.client.store_token(None);
                Ok(None)
            }
            _ if status.is_success() => {
                let user: UserDto = decode(body.as_ref())?;
                AuthUser::try_from(user).map(Some)
            }
            _ => Err(map_status_error(status, body.as_ref())),
        }
    }

    async fn sign_out(&self) -> Result<(), AuthSessionError> {
        if self.client.read_token().is_none() {
            return Ok(());
        }
        let url = self.client.endpoint(&[AUTH_PREFIX, "logout"]);
        let request = self.client.authorize(self.client.http().post(url));
        self.client.store_token(None);

        let response = request.send().await.map_err(map_transport_error)?;
        let status = response.status();
        if !status.is_success() && status != StatusCode::UNAUTHORIZED {
            let body = response.bytes().await.map_err(map_transport_error)?;
            warn!(status = status.as_u16(), "logout was not acknowledged");
            return Err(map_status_error(status, body.as_ref()));
        }
        Ok(())
    }
}

fn decode<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, AuthSessionError> {
    serde_json::from_slice(body)
        .map_err(|err| AuthSessionError::protocol(format!("invalid auth payload: {err}")))
}

fn map_transport_error(error: reqwest::Error) -> AuthSessionError {
    AuthSessionError::connection(error.to_string())
}

fn map_sign_in_status(status: StatusCode, body: &[u8]) -> AuthSessionError {
    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::UNPROCESSABLE_ENTITY => {
            AuthSessionError::invalid_credentials()
        }
        _ => map_status_error(status, body),
    }
}

fn map_status_error(status: StatusCode, body: &[u8]) -> AuthSessionError {
    let message = status_message(status, body);
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        AuthSessionError::connection(message)
    } else {
        AuthSessionError::protocol(message)
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for non-network auth helpers.

    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(StatusCode::BAD_REQUEST)]
    #[case(StatusCode::UNAUTHORIZED)]
    #[case(StatusCode::UNPROCESSABLE_ENTITY)]
    fn refused_grants_are_invalid_credentials(#[case] status: StatusCode) {
        assert_eq!(
            map_sign_in_status(status, b"{\"error\":\"invalid_grant\"}"),
            AuthSessionError::InvalidCredentials
        );
    }

    #[test]
    fn outages_are_connection_errors() {
        let error = map_sign_in_status(StatusCode::SERVICE_UNAVAILABLE, b"");
        assert!(matches!(error, AuthSessionError::Connection { .. }));
    }

    #[test]
    fn token_payload_decodes_into_auth_user() {
        let body = br#"{
            "access_token": "jwt",
            "token_type": "bearer",
            "user": { "id": "8f1c1a5e-0a43-4c11-9a5a-7e0f3f3b6a10", "email": "site@example.test" }
        }"#;
        let token: TokenResponseDto = decode(body).expect("payload decodes");
        assert_eq!(token.access_token, "jwt");
        let user = AuthUser::try_from(token.user).expect("valid user");
        assert_eq!(user.id.to_string(), "8f1c1a5e-0a43-4c11-9a5a-7e0f3f3b6a10");
        assert_eq!(user.email.as_deref(), Some("site@example.test"));
    }

    #[test]
    fn non_uuid_user_ids_are_protocol_errors() {
        let user = UserDto {
            id: "not-a-uuid".to_owned(),
            email: None,
        };
        let error = AuthUser::try_from(user).expect_err("id must be a UUID");
        assert!(matches!(error, AuthSessionError::Protocol { .. }));
    }

    #[test]
    fn garbage_payloads_are_protocol_errors() {
        let error = decode::<TokenResponseDto>(b"<html>").expect_err("not JSON");
        assert!(matches!(error, AuthSessionError::Protocol { .. }));
    }
}
