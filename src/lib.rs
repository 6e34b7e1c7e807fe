//! # ncmdump-sync
//!
//! Keeps a local copy of the `libncmdump` native library up to date from its GitHub
//! release index, and uses it to batch-convert NetEase Cloud Music `.ncm` files.
//!
//! ## Design Philosophy
//!
//! ncmdump-sync is designed to be:
//! - **Never worse off** - A failed update leaves the installed library untouched
//! - **Sensible defaults** - Works out of the box with zero configuration
//! - **Library-first** - No GUI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers follow a transcript and an event channel
//!
//! ## Quick Start
//!
//! ```no_run
//! use ncmdump_sync::{Config, NcmConverter, SaveDestination};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let converter = NcmConverter::new(Config::default())?;
//!
//!     // Subscribe to events
//!     let mut events = converter.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let report = converter.check_for_updates().await?;
//!     println!("library: {:?}", report.verdict);
//!
//!     converter.batch().add_directory("./music").await?;
//!     converter.run(&SaveDestination::AlongsideSource).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Batch conversion queue and runner
pub mod batch;
/// Native conversion capability
pub mod capability;
/// Configuration types
pub mod config;
/// Top-level converter facade
pub mod converter;
/// Error types
pub mod error;
/// Shared log transcript
pub mod transcript;
/// Core types
pub mod types;
/// Self-updating library management
pub mod update;
/// Version tag parsing and comparison
pub mod version;
/// Single-file conversion
pub mod worker;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use batch::BatchOrchestrator;
pub use capability::{Capability, CapabilityHandle, NativeLibrary};
pub use config::{BinaryFormat, Config, ConversionConfig, InstallConfig, ReleaseConfig};
pub use converter::NcmConverter;
pub use error::{ConvertError, Error, InstallError, Result};
pub use transcript::Transcript;
pub use types::{
    Availability, BatchSummary, ConversionOutcome, Event, InstalledVersion, ItemId, ItemStatus,
    ProgressSnapshot, QueueItem, RunReport, SaveDestination, UpdateDecision, UpdateReport,
};
pub use update::{UpdateCoordinator, VersionStore};
pub use worker::ConversionWorker;
