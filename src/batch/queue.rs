//! Queue management: adding, removing and listing items

use crate::error::{Error, Result};
use crate::types::{Event, ItemId, ItemStatus, QueueItem};
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use walkdir::WalkDir;

use super::BatchOrchestrator;

impl BatchOrchestrator {
    /// Add a single file to the end of the queue
    ///
    /// Returns `None` when the path is already queued. The file is not checked for
    /// existence here; a missing input fails its own item at run time.
    pub async fn add_file(&self, path: impl Into<PathBuf>) -> Option<ItemId> {
        let path = path.into();
        let mut state = self.state.lock().await;

        if state.items.iter().any(|item| item.path == path) {
            tracing::debug!(?path, "file already queued");
            return None;
        }

        let id = ItemId(self.next_id.fetch_add(1, Ordering::SeqCst));
        state.items.push(QueueItem {
            id,
            path: path.clone(),
            status: ItemStatus::Pending,
        });
        drop(state);

        tracing::debug!(item_id = %id, ?path, "file queued");
        self.transcript.emit(Event::ItemAdded { id, path });
        Some(id)
    }

    /// Recursively queue every file under `dir` with the input extension
    ///
    /// Matching is case-insensitive and results are queued in path order. Entries
    /// that cannot be read are skipped. Returns the IDs of newly queued items.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `dir` is not a directory.
    pub async fn add_directory(&self, dir: impl AsRef<Path>) -> Result<Vec<ItemId>> {
        let dir = dir.as_ref().to_path_buf();
        if !tokio::fs::metadata(&dir)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
        {
            return Err(Error::NotFound(format!(
                "directory {} does not exist",
                dir.display()
            )));
        }

        let extension = self.input_extension.clone();
        let root = dir.clone();
        let files = tokio::task::spawn_blocking(move || scan_directory(&root, &extension))
            .await
            .map_err(|e| Error::Other(format!("directory scan task failed: {}", e)))?;

        let mut added = Vec::with_capacity(files.len());
        for file in files {
            if let Some(id) = self.add_file(file).await {
                added.push(id);
            }
        }

        tracing::info!(?dir, added = added.len(), "directory scanned");
        Ok(added)
    }

    /// Remove an item; returns false if it was not queued
    ///
    /// Removing the item a run is currently converting does not interrupt it; the
    /// result is simply not recorded.
    pub async fn remove(&self, id: ItemId) -> bool {
        let mut state = self.state.lock().await;
        let before = state.items.len();
        state.items.retain(|item| item.id != id);
        let removed = state.items.len() < before;
        drop(state);

        if removed {
            self.transcript.emit(Event::ItemRemoved { id });
        }
        removed
    }

    /// Remove every item
    pub async fn clear(&self) {
        self.state.lock().await.items.clear();
        self.transcript.emit(Event::QueueCleared);
    }

    /// Snapshot of the queue in order
    pub async fn items(&self) -> Vec<QueueItem> {
        self.state.lock().await.items.clone()
    }

    /// Look up one item
    pub async fn get(&self, id: ItemId) -> Option<QueueItem> {
        self.state
            .lock()
            .await
            .items
            .iter()
            .find(|item| item.id == id)
            .cloned()
    }

    /// Number of queued items
    pub async fn len(&self) -> usize {
        self.state.lock().await.items.len()
    }

    /// Whether the queue is empty
    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.items.is_empty()
    }
}

fn scan_directory(root: &Path, extension: &str) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| has_extension(path, extension))
        .collect();
    files.sort();
    files
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
}
