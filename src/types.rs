//! Core types for ncmdump-sync

use crate::error::ConvertError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Unique identifier for a queue item
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u64);

impl ItemId {
    /// Get the inner value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Queue item status
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    /// Waiting for a run
    #[default]
    Pending,
    /// Being converted right now
    Running,
    /// Converted successfully
    Succeeded,
    /// Conversion failed; stays in the queue for inspection or retry
    Failed,
}

impl ItemStatus {
    /// Whether a run picks this item up (pending items and retries of failed ones)
    pub fn is_runnable(&self) -> bool {
        matches!(self, ItemStatus::Pending | ItemStatus::Failed)
    }
}

/// One input file in the batch queue
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    /// Item identifier, stable for the life of the item
    pub id: ItemId,
    /// Input file path
    pub path: PathBuf,
    /// Current status
    pub status: ItemStatus,
}

/// Where converted files are written
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "dir", rename_all = "snake_case")]
pub enum SaveDestination {
    /// Next to each input file
    #[default]
    AlongsideSource,
    /// A single directory for the whole run; `None` means the user has not picked one yet
    CustomDirectory(Option<PathBuf>),
}

/// The installed library version paired with its binary path
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstalledVersion {
    /// Version tag, or [`NONE_INSTALLED`](crate::version::NONE_INSTALLED)
    pub version: String,
    /// Path of the active binary
    pub binary_path: PathBuf,
}

/// A downloadable file attached to a release
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseAsset {
    /// Asset file name
    pub name: String,
    /// Direct download URL
    #[serde(rename = "browser_download_url")]
    pub download_url: String,
}

/// Latest release as reported by the release index
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRelease {
    /// Release tag, e.g. "v1.5.0"
    #[serde(rename = "tag_name")]
    pub tag: String,
    /// Attached assets, in index order
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

impl RemoteRelease {
    /// First asset whose name starts with `prefix` and ends with `suffix`
    pub fn select_asset(&self, prefix: &str, suffix: &str) -> Option<&ReleaseAsset> {
        self.assets
            .iter()
            .find(|asset| asset.name.starts_with(prefix) && asset.name.ends_with(suffix))
    }
}

/// Whether the native library can be used after an update check
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    /// A binary is installed and usable
    Available,
    /// No usable binary exists
    Unavailable,
}

impl Availability {
    /// Map "does a binary exist" to a verdict
    pub fn from_present(present: bool) -> Self {
        if present {
            Availability::Available
        } else {
            Availability::Unavailable
        }
    }

    /// Whether the verdict is `Available`
    pub fn is_available(&self) -> bool {
        matches!(self, Availability::Available)
    }
}

/// Which branch an update check ended in
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateDecision {
    /// Local version is current
    UpToDate,
    /// A newer version was installed
    Updated,
    /// Install of a newer version failed
    UpdateFailed,
    /// Release index unreachable, local binary used
    OfflineUsingLocal,
    /// Release index unreachable and nothing installed
    OfflineNoLocal,
    /// Newer version published without a matching asset
    AssetMissing,
}

/// Result of one update check
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateReport {
    /// Final availability verdict
    pub verdict: Availability,
    /// Branch the check terminated in
    pub decision: UpdateDecision,
    /// Version installed before the check
    pub local_version: String,
    /// Version published by the release index, if it was reached
    pub remote_version: Option<String>,
}

/// Result of converting one input file
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversionOutcome {
    /// Input file
    pub input: PathBuf,
    /// Output directory that was used, if the worker got that far
    pub output_dir: Option<PathBuf>,
    /// Success or the typed failure
    pub result: Result<(), ConvertError>,
    /// Human-readable line for the transcript
    pub log_line: String,
}

impl ConversionOutcome {
    /// Whether the conversion succeeded
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// The failure, if any
    pub fn error(&self) -> Option<&ConvertError> {
        self.result.as_ref().err()
    }
}

/// Aggregate counts for a finished run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Items selected for the run
    pub total: usize,
    /// Items converted
    pub succeeded: usize,
    /// Items that failed
    pub failed: usize,
    /// Items removed from the queue while the run was in flight
    pub skipped: usize,
    /// Whether the run stopped early because of a cancel request
    pub cancelled: bool,
}

/// What a call to `run` did
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunReport {
    /// Queue had no runnable items
    NothingToDo,
    /// Items were processed
    Completed {
        /// Final counts
        summary: BatchSummary,
        /// Per-item outcomes, in processing order
        outcomes: Vec<(ItemId, ConversionOutcome)>,
    },
}

impl RunReport {
    /// Counts of the run, if anything ran
    pub fn summary(&self) -> Option<&BatchSummary> {
        match self {
            RunReport::NothingToDo => None,
            RunReport::Completed { summary, .. } => Some(summary),
        }
    }
}

/// Pull-based view of batch progress
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Whether a run is active
    pub processing: bool,
    /// Items finished in the current (or last) run
    pub completed: usize,
    /// Items selected for the current (or last) run
    pub total: usize,
    /// Item being converted right now
    pub current: Option<PathBuf>,
}

impl ProgressSnapshot {
    /// Completed / total in `0.0..=1.0`; zero when nothing was selected
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

/// Event emitted during update checks and batch runs
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A line was appended to the transcript
    Log {
        /// The line
        line: String,
    },

    /// An update check finished
    UpdateFinished {
        /// The check's report
        report: UpdateReport,
    },

    /// Item added to the queue
    ItemAdded {
        /// Item ID
        id: ItemId,
        /// Input path
        path: PathBuf,
    },

    /// Item removed from the queue
    ItemRemoved {
        /// Item ID
        id: ItemId,
    },

    /// Queue cleared
    QueueCleared,

    /// Batch run started
    RunStarted {
        /// Items selected for the run
        total: usize,
    },

    /// Item status changed
    ItemStatusChanged {
        /// Item ID
        id: ItemId,
        /// New status
        status: ItemStatus,
        /// Failure description when the new status is `Failed`
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// Aggregate progress changed
    Progress {
        /// Items finished so far
        completed: usize,
        /// Items selected for the run
        total: usize,
    },

    /// Batch run finished
    RunFinished {
        /// Final counts
        summary: BatchSummary,
    },
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_json_parses_and_selects_first_matching_asset() {
        let json = r#"{
            "tag_name": "v1.5.0",
            "name": "ignored",
            "assets": [
                {"name": "ncmdump-1.5.0-windows.zip", "browser_download_url": "https://x/a.zip"},
                {"name": "libncmdump-1.5.0-windows.tar.gz", "browser_download_url": "https://x/b"},
                {"name": "libncmdump-1.5.0-windows.zip", "browser_download_url": "https://x/c.zip"},
                {"name": "libncmdump-1.5.0-linux.zip", "browser_download_url": "https://x/d.zip"}
            ]
        }"#;
        let release: RemoteRelease = serde_json::from_str(json).unwrap();
        assert_eq!(release.tag, "v1.5.0");

        let asset = release.select_asset("libncmdump-", ".zip").unwrap();
        assert_eq!(asset.download_url, "https://x/c.zip");
        assert!(release.select_asset("libncmdump-", ".7z").is_none());
    }

    #[test]
    fn runnable_statuses() {
        assert!(ItemStatus::Pending.is_runnable());
        assert!(ItemStatus::Failed.is_runnable());
        assert!(!ItemStatus::Running.is_runnable());
        assert!(!ItemStatus::Succeeded.is_runnable());
    }

    #[test]
    fn progress_fraction_handles_empty_run() {
        let mut snapshot = ProgressSnapshot::default();
        assert_eq!(snapshot.fraction(), 0.0);
        snapshot.total = 4;
        snapshot.completed = 1;
        assert_eq!(snapshot.fraction(), 0.25);
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let event = Event::ItemStatusChanged {
            id: ItemId(3),
            status: ItemStatus::Succeeded,
            error: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "item_status_changed");
        assert_eq!(json["status"], "succeeded");
        assert!(json.get("error").is_none());
    }
}
