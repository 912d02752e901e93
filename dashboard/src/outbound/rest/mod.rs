//! Reqwest-backed adapters for the hosted backend's REST surfaces.
//!
//! All three adapters share one [`RestClient`]: the HTTP client, the project
//! URL, the anonymous key and the access token obtained at sign-in. Row,
//! storage and auth requests therefore run as the signed-in user once
//! [`RestAuthSession::sign_in`](crate::domain::ports::AuthSession::sign_in)
//! succeeds.

mod auth_session;
mod blob_store;
mod dto;
mod entity_store;

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use url::Url;

use crate::config::DashboardSettings;

pub use auth_session::RestAuthSession;
pub use blob_store::RestBlobStore;
pub use entity_store::RestEntityStore;

/// Problems building a [`RestClient`] from settings.
#[derive(Debug, thiserror::Error)]
pub enum RestConfigError {
    /// `backend_url` is not set.
    #[error("backend URL is not configured")]
    MissingBackendUrl,
    /// `anon_key` is not set.
    #[error("anonymous API key is not configured")]
    MissingAnonKey,
    /// `backend_url` does not parse or cannot carry a path.
    #[error("backend URL `{url}` is invalid: {reason}")]
    InvalidUrl {
        /// Configured value.
        url: String,
        /// Why it was refused.
        reason: String,
    },
    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Connection to one hosted backend project.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: Client,
    base: Url,
    anon_key: String,
    access_token: Arc<RwLock<Option<String>>>,
}

impl RestClient {
    /// Build a client with an explicit request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error when `base` cannot carry a path or the reqwest
    /// client cannot be constructed.
    pub fn new(
        base: Url,
        anon_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, RestConfigError> {
        if base.cannot_be_a_base() {
            return Err(RestConfigError::InvalidUrl {
                url: base.to_string(),
                reason: "URL cannot carry a path".to_owned(),
            });
        }
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base,
            anon_key: anon_key.into(),
            access_token: Arc::default(),
        })
    }

    /// Build a client from loaded settings.
    ///
    /// # Errors
    ///
    /// Returns an error when the URL or key is missing or malformed.
    pub fn from_settings(settings: &DashboardSettings) -> Result<Self, RestConfigError> {
        let raw = settings
            .backend_url
            .as_deref()
            .ok_or(RestConfigError::MissingBackendUrl)?;
        let anon_key = settings
            .anon_key
            .as_deref()
            .ok_or(RestConfigError::MissingAnonKey)?;
        let base = Url::parse(raw).map_err(|err| RestConfigError::InvalidUrl {
            url: raw.to_owned(),
            reason: err.to_string(),
        })?;
        Self::new(base, anon_key, settings.request_timeout())
    }

    /// Project URL.
    #[must_use]
    pub const fn base(&self) -> &Url {
        &self.base
    }

    /// Whether a signed-in access token is held.
    #[must_use]
    pub fn has_session(&self) -> bool {
        self.read_token().is_some()
    }

    /// `base` with `segments` appended. Segments may contain `/`.
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty();
            for segment in segments {
                path.extend(segment.split('/').filter(|part| !part.is_empty()));
            }
        }
        url
    }

    /// Attach the API key and the bearer token (the session's, else the
    /// anonymous key).
    pub(crate) fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let bearer = self.bearer();
        request
            .header("apikey", self.anon_key.as_str())
            .bearer_auth(bearer)
    }

    pub(crate) const fn http(&self) -> &Client {
        &self.http
    }

    pub(crate) fn bearer(&self) -> String {
        self.read_token().unwrap_or_else(|| self.anon_key.clone())
    }

    pub(crate) fn read_token(&self) -> Option<String> {
        self.access_token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn store_token(&self, token: Option<String>) {
        *self
            .access_token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = token;
    }
}

/// Collapse a response body into a short single-line preview for errors.
fn body_preview(body: &[u8]) -> String {
    const PREVIEW_CHAR_LIMIT: usize = 160;

    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let preview = compact.chars().take(PREVIEW_CHAR_LIMIT).collect::<String>();
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        format!("{preview}...")
    } else {
        preview
    }
}

fn status_message(status: reqwest::StatusCode, body: &[u8]) -> String {
    let preview = body_preview(body);
    if preview.is_empty() {
        format!("status {}", status.as_u16())
    } else {
        format!("status {}: {preview}", status.as_u16())
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for client construction and URL building.

    use super::*;
    use rstest::rstest;

    fn client(base: &str) -> RestClient {
        RestClient::new(
            Url::parse(base).expect("valid URL"),
            "anon-key",
            Duration::from_secs(1),
        )
        .expect("client builds")
    }

    #[rstest]
    #[case("https://abc.backend.test", "https://abc.backend.test/rest/v1/projects")]
    #[case("https://abc.backend.test/", "https://abc.backend.test/rest/v1/projects")]
    #[case("https://proxy.test/tenant/", "https://proxy.test/tenant/rest/v1/projects")]
    fn endpoint_appends_segments(#[case] base: &str, #[case] expected: &str) {
        assert_eq!(client(base).endpoint(&["rest/v1", "projects"]).as_str(), expected);
    }

    #[rstest]
    fn endpoint_encodes_each_path_part() {
        let url = client("https://abc.backend.test").endpoint(&[
            "storage/v1/object",
            "documents",
            "p1/17_site plan.pdf",
        ]);
        assert_eq!(
            url.as_str(),
            "https://abc.backend.test/storage/v1/object/documents/p1/17_site%20plan.pdf"
        );
    }

    #[rstest]
    fn bearer_falls_back_to_anon_key() {
        let client = client("https://abc.backend.test");
        assert_eq!(client.bearer(), "anon-key");
        assert!(!client.has_session());

        client.store_token(Some("user-jwt".to_owned()));
        let shared = client.clone();
        assert_eq!(shared.bearer(), "user-jwt");

        client.store_token(None);
        assert!(!shared.has_session());
    }

    #[rstest]
    fn settings_without_url_are_refused() {
        let settings = DashboardSettings {
            backend_url: None,
            anon_key: Some("anon".to_owned()),
            storage_bucket: None,
            request_timeout_secs: None,
        };
        let err = RestClient::from_settings(&settings).expect_err("missing URL");
        assert!(matches!(err, RestConfigError::MissingBackendUrl));
    }

    #[rstest]
    fn non_hierarchical_urls_are_refused() {
        let settings = DashboardSettings {
            backend_url: Some("mailto:ops@example.test".to_owned()),
            anon_key: Some("anon".to_owned()),
            storage_bucket: None,
            request_timeout_secs: None,
        };
        let err = RestClient::from_settings(&settings).expect_err("cannot be a base");
        assert!(matches!(err, RestConfigError::InvalidUrl { .. }));
    }

    #[rstest]
    fn long_bodies_are_truncated_in_messages() {
        let body = "x".repeat(400);
        let message = status_message(reqwest::StatusCode::BAD_GATEWAY, body.as_bytes());
        assert!(message.starts_with("status 502: "));
        assert!(message.ends_with("..."));
    }
}
