//! `NcmConverter` facade wiring configuration into the updater and the batch runner

use crate::batch::BatchOrchestrator;
use crate::capability::{Capability, NativeLibrary};
use crate::config::Config;
use crate::error::Result;
use crate::transcript::Transcript;
use crate::types::{Event, InstalledVersion, RunReport, SaveDestination, UpdateReport};
use crate::update::UpdateCoordinator;
use crate::worker::ConversionWorker;
use std::sync::Arc;

/// Main entry point: keeps `libncmdump` current and converts queued files with it
///
/// Update checks take the batch runner's operation gate, so the library file is
/// never replaced while a conversion is using it, whichever way the run was
/// started. Cloning is cheap.
#[derive(Clone)]
pub struct NcmConverter {
    config: Arc<Config>,
    transcript: Transcript,
    updater: Arc<UpdateCoordinator>,
    batch: BatchOrchestrator,
    capability: Arc<dyn Capability>,
}

impl std::fmt::Debug for NcmConverter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NcmConverter")
            .field("config", &self.config)
            .field("capability", &self.capability.name())
            .finish_non_exhaustive()
    }
}

impl NcmConverter {
    /// Create a converter backed by the native library at the configured path
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid or the HTTP client cannot be built.
    pub fn new(config: Config) -> Result<Self> {
        let library = NativeLibrary::new(config.binary_path());
        Self::with_capability(config, Arc::new(library))
    }

    /// Create a converter with a custom capability in place of the native library
    pub fn with_capability(config: Config, capability: Arc<dyn Capability>) -> Result<Self> {
        config.validate()?;

        let transcript = Transcript::new(config.event_buffer);
        let updater = UpdateCoordinator::new(&config, transcript.clone())?;
        let worker = ConversionWorker::new(
            Arc::clone(&capability),
            config.conversion.fix_metadata,
        );
        let batch = BatchOrchestrator::new(&config, worker, transcript.clone());

        tracing::debug!(
            install_dir = ?config.install.install_dir,
            capability = capability.name(),
            "converter created"
        );

        Ok(Self {
            config: Arc::new(config),
            transcript,
            updater: Arc::new(updater),
            batch,
            capability,
        })
    }

    /// Run the update check once and report whether the library is usable
    ///
    /// Waits for an in-flight batch run to finish first.
    pub async fn check_for_updates(&self) -> Result<UpdateReport> {
        let _operation = self.batch.operation_gate().lock().await;

        let report = self.updater.check_and_update().await?;
        if report.verdict.is_available() {
            self.transcript.push("libncmdump core library is available.");
        } else {
            self.transcript.push(
                "libncmdump core library is unavailable; check the network or download it manually.",
            );
        }
        self.transcript.emit(Event::UpdateFinished {
            report: report.clone(),
        });
        Ok(report)
    }

    /// Run the update check on the runtime without waiting for it
    ///
    /// Progress is reported through the transcript and [`Event::UpdateFinished`].
    pub fn spawn_update_check(&self) -> tokio::task::JoinHandle<Result<UpdateReport>> {
        let converter = self.clone();
        tokio::spawn(async move {
            let result = converter.check_for_updates().await;
            if let Err(e) = &result {
                tracing::error!(error = %e, "update check failed");
            }
            result
        })
    }

    /// Queue operations and progress
    pub fn batch(&self) -> &BatchOrchestrator {
        &self.batch
    }

    /// Convert every runnable queued item
    ///
    /// Waits for an in-flight update check to finish first.
    pub async fn run(&self, destination: &SaveDestination) -> Result<RunReport> {
        self.batch.run(destination).await
    }

    /// Subscribe to update and batch events
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.transcript.subscribe()
    }

    /// Shared log transcript
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Installed library version, or the sentinel when nothing usable is installed
    pub async fn installed_version(&self) -> Result<InstalledVersion> {
        self.updater.store().installed().await
    }

    /// Whether the conversion capability can be used right now
    pub fn is_available(&self) -> bool {
        self.capability.is_present()
    }
}
