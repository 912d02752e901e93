//! Backend connection settings loaded via OrthoConfig.

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;

const DEFAULT_STORAGE_BUCKET: &str = "documents";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Where the hosted backend lives and how to talk to it.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "DASHBOARD")]
pub struct DashboardSettings {
    /// Project URL of the hosted backend, e.g. `https://abc.example.co`.
    pub backend_url: Option<String>,
    /// Public (anonymous) API key sent with every request.
    pub anon_key: Option<String>,
    /// Storage bucket holding project documents.
    pub storage_bucket: Option<String>,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: Option<u64>,
}

impl DashboardSettings {
    /// Configured bucket, falling back to `documents`.
    #[must_use]
    pub fn storage_bucket(&self) -> &str {
        self.storage_bucket
            .as_deref()
            .unwrap_or(DEFAULT_STORAGE_BUCKET)
    }

    /// Configured request timeout, falling back to ten seconds.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.request_timeout_secs
                .filter(|secs| *secs > 0)
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }
}
