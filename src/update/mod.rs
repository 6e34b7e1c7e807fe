//! Self-updating management of the native library
//!
//! [`UpdateCoordinator`] ties the pieces together:
//! - [`VersionStore`] - installed version marker paired with the binary
//! - [`ReleaseClient`] - latest release lookup on the release index
//! - [`ArtifactInstaller`] - download, extract, validate, commit
//!
//! A check never leaves the system worse off than it found it: any failure falls
//! back to an existing local binary when there is one.

mod installer;
mod release;
mod store;
pub mod validate;

pub use installer::ArtifactInstaller;
pub use release::ReleaseClient;
pub use store::VersionStore;

use crate::config::Config;
use crate::error::Result;
use crate::transcript::Transcript;
use crate::types::{Availability, UpdateDecision, UpdateReport};
use crate::version;
use tracing::{info, warn};

/// Runs the check / decide / install / fall back flow once
#[derive(Clone, Debug)]
pub struct UpdateCoordinator {
    store: VersionStore,
    release: ReleaseClient,
    installer: ArtifactInstaller,
    asset_prefix: String,
    asset_suffix: String,
    transcript: Transcript,
}

impl UpdateCoordinator {
    /// Create a coordinator for the configured install directory and release index
    pub fn new(config: &Config, transcript: Transcript) -> Result<Self> {
        Ok(Self {
            store: VersionStore::from_config(config),
            release: ReleaseClient::new(&config.release)?,
            installer: ArtifactInstaller::new(config, transcript.clone())?,
            asset_prefix: config.release.asset_prefix.clone(),
            asset_suffix: config.release.asset_suffix.clone(),
            transcript,
        })
    }

    /// The version store this coordinator reads and updates
    pub fn store(&self) -> &VersionStore {
        &self.store
    }

    /// Check the release index and install a newer library if one is published
    ///
    /// Only a failure to read the local marker is returned as an error; everything
    /// else ends in a verdict.
    pub async fn check_and_update(&self) -> Result<UpdateReport> {
        self.transcript.push("Checking for library updates...");
        let local = self.store.read().await?;
        self.transcript.push(format!("Local version: {}", local));
        info!(local_version = %local, "starting update check");

        let release = match self.release.fetch_latest().await {
            Ok(release) => release,
            Err(e) => {
                warn!(error = %e, "release index unreachable");
                self.transcript.push(format!(
                    "Network error: could not fetch the latest release. {}",
                    e
                ));
                return Ok(if self.store.has_binary() {
                    self.transcript.push("Using the library already installed.");
                    self.report(UpdateDecision::OfflineUsingLocal, &local, None)
                } else {
                    self.transcript
                        .push("Network error and no local library; the library is unavailable.");
                    self.report(UpdateDecision::OfflineNoLocal, &local, None)
                });
            }
        };

        let remote = release.tag.clone();
        self.transcript.push(format!("Latest version: {}", remote));

        // A corrupt marker must not suppress the download
        let comparable_local = match local.parse::<version::Version>() {
            Ok(_) => local.as_str(),
            Err(e) => {
                warn!(
                    local_version = %local,
                    error = %e,
                    "unreadable version marker, treating as not installed"
                );
                self.transcript.push(format!(
                    "Installed version marker is unreadable ({}); treating the library as not installed.",
                    e
                ));
                version::NONE_INSTALLED
            }
        };

        let newer = match version::is_newer(&remote, comparable_local) {
            Ok(newer) => newer,
            Err(e) => {
                warn!(error = %e, "cannot compare versions, keeping the installed library");
                self.transcript
                    .push(format!("Cannot compare versions ({}); skipping the update.", e));
                false
            }
        };
        if !newer {
            info!(local_version = %local, remote_version = %remote, "library is up to date");
            self.transcript
                .push("Local version is already the latest; no update needed.");
            return Ok(self.report(UpdateDecision::UpToDate, &local, Some(remote)));
        }

        self.transcript
            .push("A new version is available; starting the update.");
        let Some(asset) = release.select_asset(&self.asset_prefix, &self.asset_suffix) else {
            warn!(
                remote_version = %remote,
                prefix = %self.asset_prefix,
                suffix = %self.asset_suffix,
                "no matching asset in latest release"
            );
            self.transcript
                .push("Error: no matching download was found in the latest release.");
            return Ok(self.report(UpdateDecision::AssetMissing, &local, Some(remote)));
        };

        info!(asset = %asset.name, url = %asset.download_url, "installing new library");
        if self.installer.install(&asset.download_url, &remote).await {
            self.transcript.push("Library updated successfully!");
            Ok(self.report(UpdateDecision::Updated, &local, Some(remote)))
        } else {
            self.transcript.push("Library update failed.");
            Ok(self.report(UpdateDecision::UpdateFailed, &local, Some(remote)))
        }
    }

    // Every branch ends up usable exactly when a binary is on disk
    fn report(&self, decision: UpdateDecision, local: &str, remote: Option<String>) -> UpdateReport {
        UpdateReport {
            verdict: Availability::from_present(self.store.has_binary()),
            decision,
            local_version: local.to_string(),
            remote_version: remote,
        }
    }
}
