//! Download, extract, validate and commit a new library build
//!
//! The active binary is only touched after the new one has been extracted and passed
//! validation. The binary is renamed into place before the marker is written, so an
//! interruption can at worst leave a newer binary with an older marker, which the
//! next update check repairs.

use super::release::http_client;
use super::store::{TEMP_PREFIX, VersionStore};
use super::validate;
use crate::config::{BinaryFormat, Config};
use crate::error::{Error, InstallError, Result};
use crate::transcript::Transcript;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tokio::task::spawn_blocking;
use tracing::{debug, info, warn};

/// Installs a release asset over the active binary
#[derive(Clone, Debug)]
pub struct ArtifactInstaller {
    client: reqwest::Client,
    store: VersionStore,
    staging_dir: PathBuf,
    binary_name: String,
    min_binary_size: u64,
    binary_format: BinaryFormat,
    transcript: Transcript,
}

impl ArtifactInstaller {
    /// Create an installer for the configured layout
    pub fn new(config: &Config, transcript: Transcript) -> Result<Self> {
        Ok(Self {
            client: http_client(&config.release.user_agent, config.release.download_timeout)?,
            store: VersionStore::from_config(config),
            staging_dir: config.staging_dir().to_path_buf(),
            binary_name: config.install.binary_name.clone(),
            min_binary_size: config.install.min_binary_size,
            binary_format: config.install.binary_format,
            transcript,
        })
    }

    /// Install the archive at `url` as version `version`
    ///
    /// Returns false on any failure; the previously active binary, if any, is left as it was.
    pub async fn install(&self, url: &str, version: &str) -> bool {
        match self.try_install(url, version).await {
            Ok(path) => {
                info!(version, binary = ?path, "library installed");
                true
            }
            Err(e) => {
                warn!(version, url, error = %e, "library install failed");
                self.transcript
                    .push(format!("Error while installing the update: {}", e));
                false
            }
        }
    }

    /// Like [`install`](Self::install) but returns the failure
    pub async fn try_install(&self, url: &str, version: &str) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.staging_dir).await?;
        let archive = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(".zip")
            .tempfile_in(&self.staging_dir)?;
        let staged = match self.store.stage_beside(self.store.binary_path()) {
            Ok(staged) => staged,
            Err(e) => {
                discard(archive);
                return Err(e.into());
            }
        };

        let prepared = self.prepare(url, &archive, &staged).await;
        let result = match prepared {
            Ok(()) => {
                self.transcript.push("Replacing the old library with the new file...");
                self.store
                    .commit(staged, version)
                    .map(|()| self.store.binary_path().to_path_buf())
                    .map_err(Error::from)
            }
            Err(e) => {
                discard(staged);
                Err(e)
            }
        };

        self.transcript.push("Cleaning up temporary files...");
        discard(archive);

        if result.is_ok() {
            self.transcript
                .push(format!("Version marker updated to {}", version.trim()));
        }
        result
    }

    // Steps 1-3: everything that happens before the active binary is touched
    async fn prepare(&self, url: &str, archive: &NamedTempFile, staged: &NamedTempFile) -> Result<()> {
        self.transcript.push(format!(
            "Downloading to temporary file: {}",
            archive.path().display()
        ));
        self.download(url, archive).await?;

        self.transcript.push(format!(
            "Extracting to temporary file: {}",
            staged.path().display()
        ));
        let reader = archive.reopen()?;
        let writer = staged.as_file().try_clone()?;
        let archive_path = archive.path().to_path_buf();
        let entry_name = self.binary_name.clone();
        spawn_blocking(move || extract_entry(reader, &archive_path, &entry_name, writer))
            .await
            .map_err(|e| InstallError::Extraction {
                archive: archive.path().to_path_buf(),
                reason: format!("extraction task panicked: {}", e),
            })??;

        let staged_path = staged.path().to_path_buf();
        let (min_size, format) = (self.min_binary_size, self.binary_format);
        spawn_blocking(move || validate::check_binary(&staged_path, min_size, format))
            .await
            .map_err(|e| InstallError::Validation {
                reason: format!("validation task panicked: {}", e),
            })??;
        debug!(staged = ?staged.path(), "extracted binary passed validation");
        Ok(())
    }

    async fn download(&self, url: &str, archive: &NamedTempFile) -> Result<()> {
        let download_err = |reason: String| InstallError::Download {
            url: url.to_string(),
            reason,
        };

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| download_err(e.to_string()))?;
        if !response.status().is_success() {
            return Err(download_err(format!("HTTP {}", response.status())).into());
        }

        let mut file = tokio::fs::File::from_std(archive.as_file().try_clone()?);
        let mut written: u64 = 0;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| download_err(e.to_string()))?
        {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        file.sync_all().await?;

        debug!(url, bytes = written, "archive downloaded");
        Ok(())
    }
}

/// Copy the entry named `entry_name` out of a zip archive
///
/// An entry at the archive root wins; otherwise the first entry at any depth with
/// that file name is used.
fn extract_entry<R: Read + Seek, W: std::io::Write>(
    reader: R,
    archive_path: &Path,
    entry_name: &str,
    mut writer: W,
) -> std::result::Result<(), InstallError> {
    let extraction_err = |reason: String| InstallError::Extraction {
        archive: archive_path.to_path_buf(),
        reason,
    };

    let mut zip = zip::ZipArchive::new(reader)
        .map_err(|e| extraction_err(format!("failed to read ZIP archive: {}", e)))?;

    let mut nested = None;
    let mut root = None;
    for i in 0..zip.len() {
        let entry = zip
            .by_index(i)
            .map_err(|e| extraction_err(format!("failed to read ZIP entry: {}", e)))?;
        if entry.is_dir() {
            continue;
        }
        let Some(path) = entry.enclosed_name() else {
            warn!(name = entry.name(), "skipping entry with unsafe path");
            continue;
        };
        if path.as_os_str() == entry_name {
            root = Some(i);
            break;
        }
        if nested.is_none() && path.file_name().is_some_and(|n| n == entry_name) {
            nested = Some(i);
        }
    }

    let index = root.or(nested).ok_or_else(|| InstallError::EntryMissing {
        entry: entry_name.to_string(),
    })?;
    let mut entry = zip
        .by_index(index)
        .map_err(|e| extraction_err(format!("failed to read ZIP entry: {}", e)))?;
    std::io::copy(&mut entry, &mut writer)
        .map_err(|e| extraction_err(format!("failed to extract {}: {}", entry_name, e)))?;
    writer
        .flush()
        .map_err(|e| extraction_err(format!("failed to flush extracted file: {}", e)))?;
    Ok(())
}

/// Best-effort removal of a temporary file
fn discard(file: NamedTempFile) {
    let path = file.path().to_path_buf();
    if let Err(e) = file.close() {
        debug!(?path, error = %e, "failed to remove temporary file");
    }
}
