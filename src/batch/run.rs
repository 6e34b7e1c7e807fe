//! The sequential conversion loop

use crate::error::{Error, Result};
use crate::types::{
    BatchSummary, ConversionOutcome, Event, ItemId, ItemStatus, ProgressSnapshot, RunReport,
    SaveDestination,
};
use std::path::{Path, PathBuf};

use super::{BatchOrchestrator, RunGuard};

impl BatchOrchestrator {
    /// Convert every runnable item in queue order
    ///
    /// Pending and previously failed items are selected; succeeded items are left
    /// alone. A failing item never stops the loop. Checks happen in this order and
    /// leave the queue untouched when they fail:
    ///
    /// 1. another run in flight: [`Error::AlreadyRunning`]
    /// 2. nothing runnable: `Ok(RunReport::NothingToDo)`
    /// 3. custom destination without a directory: [`Error::Config`]
    /// 4. capability missing: [`Error::CapabilityUnavailable`]
    ///
    /// The run holds the shared operation gate for its whole duration, so it waits
    /// for an in-flight update check and blocks new ones until it finishes.
    pub async fn run(&self, destination: &SaveDestination) -> Result<RunReport> {
        let Some((_guard, token)) = RunGuard::acquire(self) else {
            return Err(Error::AlreadyRunning);
        };
        let _operation = self.operation.lock().await;

        let selected: Vec<(ItemId, PathBuf)> = self
            .state
            .lock()
            .await
            .items
            .iter()
            .filter(|item| item.status.is_runnable())
            .map(|item| (item.id, item.path.clone()))
            .collect();

        if selected.is_empty() {
            tracing::info!("batch run requested with nothing to convert");
            self.transcript.push("Please add files to convert first.");
            return Ok(RunReport::NothingToDo);
        }

        let custom_dir = match resolve_destination(destination) {
            Ok(dir) => dir,
            Err(e) => {
                tracing::warn!(error = %e, "batch run refused, no save directory");
                self.transcript.push(format!("Error: {}", e));
                return Err(e);
            }
        };

        if !self.worker.capability().is_present() {
            tracing::warn!(
                capability = self.worker.capability().name(),
                "batch run refused, capability unavailable"
            );
            self.transcript.push(Error::CapabilityUnavailable.to_string());
            return Err(Error::CapabilityUnavailable);
        }

        let total = selected.len();
        tracing::info!(total, ?destination, "batch run started");
        self.state.lock().await.progress = ProgressSnapshot {
            processing: true,
            completed: 0,
            total,
            current: None,
        };
        self.transcript.emit(Event::RunStarted { total });

        let mut summary = BatchSummary {
            total,
            ..BatchSummary::default()
        };
        let mut outcomes = Vec::with_capacity(total);

        for (id, path) in selected {
            if token.is_cancelled() {
                tracing::info!(
                    remaining = total - summary.succeeded - summary.failed - summary.skipped,
                    "batch run cancelled"
                );
                summary.cancelled = true;
                break;
            }

            if !self.set_status(id, ItemStatus::Running, Some(&path)).await {
                tracing::debug!(item_id = %id, "item removed before its turn, skipping");
                summary.skipped += 1;
                self.advance_progress(total).await;
                continue;
            }
            self.transcript.emit(Event::ItemStatusChanged {
                id,
                status: ItemStatus::Running,
                error: None,
            });

            let output_dir = match &custom_dir {
                Some(dir) => dir.clone(),
                None => source_dir(&path),
            };
            let outcome = self.worker.convert(&path, &output_dir).await;

            let status = if outcome.is_success() {
                summary.succeeded += 1;
                ItemStatus::Succeeded
            } else {
                summary.failed += 1;
                ItemStatus::Failed
            };
            self.record(id, status, &outcome).await;
            self.advance_progress(total).await;
            outcomes.push((id, outcome));
        }

        self.state.lock().await.progress.current = None;

        if summary.cancelled {
            self.transcript.push(format!(
                "Processing cancelled: {} succeeded, {} failed.",
                summary.succeeded, summary.failed
            ));
        } else {
            self.transcript.push(format!(
                "All processing complete: {} succeeded, {} failed.",
                summary.succeeded, summary.failed
            ));
        }
        tracing::info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            cancelled = summary.cancelled,
            "batch run finished"
        );
        self.transcript.emit(Event::RunFinished { summary });

        Ok(RunReport::Completed { summary, outcomes })
    }

    // Returns false if the item is no longer queued
    async fn set_status(&self, id: ItemId, status: ItemStatus, current: Option<&Path>) -> bool {
        let mut state = self.state.lock().await;
        let Some(item) = state.items.iter_mut().find(|item| item.id == id) else {
            return false;
        };
        item.status = status;
        if let Some(current) = current {
            state.progress.current = Some(current.to_path_buf());
        }
        true
    }

    async fn record(&self, id: ItemId, status: ItemStatus, outcome: &ConversionOutcome) {
        if !self.set_status(id, status, None).await {
            tracing::debug!(item_id = %id, "item removed while converting");
        }
        self.transcript.push(outcome.log_line.clone());
        self.transcript.emit(Event::ItemStatusChanged {
            id,
            status,
            error: outcome.error().map(|e| e.to_string()),
        });
    }

    async fn advance_progress(&self, total: usize) {
        let completed = {
            let mut state = self.state.lock().await;
            state.progress.completed += 1;
            state.progress.completed
        };
        self.transcript.emit(Event::Progress { completed, total });
    }
}

// None means alongside each source file
fn resolve_destination(destination: &SaveDestination) -> Result<Option<PathBuf>> {
    match destination {
        SaveDestination::AlongsideSource => Ok(None),
        SaveDestination::CustomDirectory(Some(dir)) if !dir.as_os_str().is_empty() => {
            Ok(Some(dir.clone()))
        }
        SaveDestination::CustomDirectory(_) => Err(Error::config(
            "save_destination",
            "custom save destination selected but no directory was chosen",
        )),
    }
}

// A bare file name resolves to the working directory
fn source_dir(input: &Path) -> PathBuf {
    match input.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
