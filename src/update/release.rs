//! Release index query

use crate::config::ReleaseConfig;
use crate::error::{Error, Result};
use crate::types::RemoteRelease;
use std::time::Duration;
use tracing::{debug, info};

/// Build an HTTP client carrying the client tag and an optional overall timeout
pub(crate) fn http_client(user_agent: &str, timeout: Option<Duration>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder().user_agent(user_agent);
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build().map_err(|e| {
        Error::Io(std::io::Error::other(format!(
            "failed to create HTTP client: {}",
            e
        )))
    })
}

/// Client for the "latest release" endpoint of the release index
#[derive(Clone, Debug)]
pub struct ReleaseClient {
    client: reqwest::Client,
    endpoint: String,
}

impl ReleaseClient {
    /// Create a client from the release settings
    pub fn new(config: &ReleaseConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(&config.user_agent, config.request_timeout)?,
            endpoint: config.endpoint.clone(),
        })
    }

    /// The endpoint being queried
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Fetch the latest published release
    ///
    /// Makes exactly one request. Transport failures, non-success statuses and
    /// malformed bodies are all network-class errors (see [`Error::is_network`]);
    /// the caller decides how to fall back.
    pub async fn fetch_latest(&self) -> Result<RemoteRelease> {
        debug!(endpoint = %self.endpoint, "querying release index");

        let response = self
            .client
            .get(&self.endpoint)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::ReleaseIndex(format!(
                "HTTP {} from {}",
                status, self.endpoint
            )));
        }

        let body = response.bytes().await?;
        let release: RemoteRelease = serde_json::from_slice(&body).map_err(|e| {
            Error::ReleaseIndex(format!("malformed release JSON from {}: {}", self.endpoint, e))
        })?;

        info!(
            tag = %release.tag,
            assets = release.assets.len(),
            "release index reports latest release"
        );
        Ok(release)
    }
}
