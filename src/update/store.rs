//! Persisted "installed version" marker paired with the active binary

use crate::config::Config;
use crate::error::{Error, InstallError, Result};
use crate::types::InstalledVersion;
use crate::version::NONE_INSTALLED;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Prefix of every temporary file the updater creates
pub(crate) const TEMP_PREFIX: &str = ".ncmdump-sync-";

/// Reads and writes the version marker and the active binary as one pair
///
/// A marker without a binary (or a binary without a marker) reads as
/// [`NONE_INSTALLED`], so a stale marker can never suppress a needed download.
#[derive(Clone, Debug)]
pub struct VersionStore {
    binary_path: PathBuf,
    marker_path: PathBuf,
}

impl VersionStore {
    /// Create a store for explicit binary and marker paths
    pub fn new(binary_path: PathBuf, marker_path: PathBuf) -> Self {
        Self {
            binary_path,
            marker_path,
        }
    }

    /// Create a store for the paths named in the configuration
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.binary_path(), config.marker_path())
    }

    /// Path of the active binary
    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    /// Path of the version marker
    pub fn marker_path(&self) -> &Path {
        &self.marker_path
    }

    /// Whether an active binary exists on disk
    pub fn has_binary(&self) -> bool {
        self.binary_path.is_file()
    }

    /// Read the installed version tag
    ///
    /// Returns [`NONE_INSTALLED`] when the marker or the binary is missing, or the
    /// marker is blank. Any other failure reading the marker is an error.
    pub async fn read(&self) -> Result<String> {
        if !tokio::fs::metadata(&self.binary_path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
        {
            debug!(binary = ?self.binary_path, "no active binary, reporting nothing installed");
            return Ok(NONE_INSTALLED.to_string());
        }

        match tokio::fs::read_to_string(&self.marker_path).await {
            Ok(content) => {
                let version = content.trim();
                if version.is_empty() {
                    Ok(NONE_INSTALLED.to_string())
                } else {
                    Ok(version.to_string())
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(marker = ?self.marker_path, "no version marker, reporting nothing installed");
                Ok(NONE_INSTALLED.to_string())
            }
            Err(e) => Err(Error::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "failed to read version marker '{}': {}",
                    self.marker_path.display(),
                    e
                ),
            ))),
        }
    }

    /// Read the installed version together with the binary path
    pub async fn installed(&self) -> Result<InstalledVersion> {
        Ok(InstalledVersion {
            version: self.read().await?,
            binary_path: self.binary_path.clone(),
        })
    }

    /// Persist a new binary and its version tag
    ///
    /// The binary is replaced first and the marker second, each through a temporary
    /// file renamed into place.
    pub fn write(&self, version: &str, binary: &[u8]) -> Result<()> {
        let mut staged = self.stage_beside(&self.binary_path)?;
        staged.write_all(binary)?;
        staged.as_file().sync_all()?;
        self.commit(staged, version)?;
        Ok(())
    }

    /// Move an already validated staged binary into place, then update the marker
    pub(crate) fn commit(
        &self,
        staged: NamedTempFile,
        version: &str,
    ) -> std::result::Result<(), InstallError> {
        staged
            .persist(&self.binary_path)
            .map_err(|e| InstallError::Commit {
                path: self.binary_path.clone(),
                reason: e.error.to_string(),
            })?;

        self.write_marker(version)
    }

    fn write_marker(&self, version: &str) -> std::result::Result<(), InstallError> {
        let commit_err = |e: std::io::Error| InstallError::Commit {
            path: self.marker_path.clone(),
            reason: e.to_string(),
        };

        let mut staged = self.stage_beside(&self.marker_path).map_err(commit_err)?;
        staged
            .write_all(version.trim().as_bytes())
            .map_err(commit_err)?;
        staged.as_file().sync_all().map_err(commit_err)?;
        staged
            .persist(&self.marker_path)
            .map_err(|e| commit_err(e.error))?;
        Ok(())
    }

    /// Temporary file in the same directory as `target`, so persisting is a rename
    pub(crate) fn stage_beside(&self, target: &Path) -> std::io::Result<NamedTempFile> {
        let dir = match target.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;
        tempfile::Builder::new().prefix(TEMP_PREFIX).tempfile_in(dir)
    }
}
