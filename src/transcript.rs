//! Shared log transcript and event broadcast
//!
//! Both the update check and batch runs append human-readable lines here. Every line
//! is also broadcast as [`Event::Log`], so consumers can either pull the whole
//! transcript or follow it live.

use crate::types::Event;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;

/// Append-only transcript plus the event channel it reports through (cheap to clone)
#[derive(Clone, Debug)]
pub struct Transcript {
    lines: Arc<Mutex<Vec<String>>>,
    event_tx: broadcast::Sender<Event>,
}

impl Transcript {
    /// Create a transcript with an event channel of the given capacity
    pub fn new(capacity: usize) -> Self {
        let (event_tx, _rx) = broadcast::channel(capacity.max(1));
        Self {
            lines: Arc::new(Mutex::new(Vec::new())),
            event_tx,
        }
    }

    /// Append a line and broadcast it
    pub fn push(&self, line: impl Into<String>) {
        let line = line.into();
        self.guard().push(line.clone());
        self.emit(Event::Log { line });
    }

    /// Broadcast an event; having no subscribers is fine
    pub fn emit(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Snapshot of all lines so far
    pub fn lines(&self) -> Vec<String> {
        self.guard().clone()
    }

    /// All lines joined with newlines
    pub fn text(&self) -> String {
        self.guard().join("\n")
    }

    /// Number of lines so far
    pub fn len(&self) -> usize {
        self.guard().len()
    }

    /// Whether nothing has been logged yet
    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }

    // A panic while holding the lock cannot leave a Vec<String> half-updated
    fn guard(&self) -> MutexGuard<'_, Vec<String>> {
        self.lines.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
