//! Batch conversion orchestrator
//!
//! [`BatchOrchestrator`] owns the conversion queue and drives each item through the
//! [`ConversionWorker`] one at a time. Its methods are split by concern:
//!
//! - `queue`: adding, removing and listing items
//! - `run`: the sequential conversion loop, progress and cancellation
//!
//! Every observable change is appended to the shared [`Transcript`] and broadcast as
//! an [`Event`](crate::types::Event).

mod queue;
mod run;


use crate::config::Config;
use crate::transcript::Transcript;
use crate::types::{ProgressSnapshot, QueueItem};
use crate::worker::ConversionWorker;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Queue and progress, guarded together so snapshots are consistent
#[derive(Debug, Default)]
pub(crate) struct QueueState {
    /// Items in insertion order
    pub(crate) items: Vec<QueueItem>,
    /// Progress of the current (or last) run
    pub(crate) progress: ProgressSnapshot,
}

/// Owns the conversion queue and runs it sequentially
///
/// Cloning is cheap; clones share the same queue, transcript and run state.
#[derive(Clone, Debug)]
pub struct BatchOrchestrator {
    state: Arc<Mutex<QueueState>>,
    worker: ConversionWorker,
    transcript: Transcript,
    /// Set while a run is in flight
    processing: Arc<AtomicBool>,
    /// Cancellation token of the in-flight run
    active_run: Arc<std::sync::Mutex<Option<CancellationToken>>>,
    next_id: Arc<AtomicU64>,
    input_extension: Arc<str>,
    /// Held for a whole run; shared with the updater so installs never overlap a run
    operation: Arc<Mutex<()>>,
}

impl BatchOrchestrator {
    /// Create an orchestrator that converts through `worker`
    pub fn new(config: &Config, worker: ConversionWorker, transcript: Transcript) -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState::default())),
            worker,
            transcript,
            processing: Arc::new(AtomicBool::new(false)),
            active_run: Arc::new(std::sync::Mutex::new(None)),
            next_id: Arc::new(AtomicU64::new(1)),
            input_extension: Arc::from(config.input_extension()),
            operation: Arc::new(Mutex::new(())),
        }
    }

    /// Gate held for the duration of every run
    pub(crate) fn operation_gate(&self) -> &Arc<Mutex<()>> {
        &self.operation
    }

    /// Whether a run is in flight
    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::SeqCst)
    }

    /// Snapshot of the current (or last) run's progress
    pub async fn progress(&self) -> ProgressSnapshot {
        let mut snapshot = self.state.lock().await.progress.clone();
        snapshot.processing = self.is_processing();
        snapshot
    }

    /// Shared transcript the orchestrator appends to
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Subscribe to queue and run events
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<crate::types::Event> {
        self.transcript.subscribe()
    }

    /// Ask the in-flight run to stop after its current item
    ///
    /// Returns false when no run is active. Items not yet started keep their status.
    pub fn cancel(&self) -> bool {
        let guard = self
            .active_run
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match guard.as_ref() {
            Some(token) => {
                tracing::info!("cancellation requested for batch run");
                token.cancel();
                true
            }
            None => false,
        }
    }
}

/// Marks a run active for its lifetime; resets on every exit path
pub(crate) struct RunGuard {
    processing: Arc<AtomicBool>,
    active_run: Arc<std::sync::Mutex<Option<CancellationToken>>>,
}

impl RunGuard {
    /// Claim the run slot, or None if another run holds it
    pub(crate) fn acquire(orchestrator: &BatchOrchestrator) -> Option<(Self, CancellationToken)> {
        if orchestrator
            .processing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return None;
        }

        let token = CancellationToken::new();
        *orchestrator
            .active_run
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(token.clone());

        Some((
            Self {
                processing: Arc::clone(&orchestrator.processing),
                active_run: Arc::clone(&orchestrator.active_run),
            },
            token,
        ))
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        *self
            .active_run
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
        self.processing.store(false, Ordering::SeqCst);
    }
}
