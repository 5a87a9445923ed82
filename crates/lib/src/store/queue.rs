use super::{load_or_default, lock, write_json, DurableSet};
use crate::errors::StorageError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// One unit of pending work.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    pub identifier: String,
    pub source_content_path: PathBuf,
    pub enqueued_at: DateTime<Utc>,
    /// Number of failed attempts so far.
    #[serde(default)]
    pub attempt: u32,
}

impl QueueEntry {
    pub fn new(identifier: impl Into<String>, source_content_path: impl Into<PathBuf>) -> Self {
        Self {
            identifier: identifier.into(),
            source_content_path: source_content_path.into(),
            enqueued_at: Utc::now(),
            attempt: 0,
        }
    }
}

/// What `enqueue` did with an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Enqueued,
    AlreadyQueued,
    AlreadyProcessed,
}

#[derive(Debug, Default)]
struct QueueState {
    entries: Vec<QueueEntry>,
    /// Identifiers handed to the worker. Memory only: after a crash they are
    /// still in the file and get picked up again.
    in_flight: HashSet<String>,
}

/// FIFO of pending work, persisted as a JSON array after every mutation.
#[derive(Debug)]
pub struct DurableQueue {
    path: PathBuf,
    processed: Arc<DurableSet>,
    state: Mutex<QueueState>,
    /// Entry count readable without the lock, for diagnostics.
    len_hint: AtomicUsize,
}

impl DurableQueue {
    /// Loads the queue from `path`. A missing or malformed file yields an
    /// empty queue. `processed` is consulted on every enqueue.
    pub fn open(path: impl Into<PathBuf>, processed: Arc<DurableSet>) -> Self {
        let path = path.into();
        let entries: Vec<QueueEntry> = load_or_default(&path);
        let mut seen = HashSet::new();
        let loaded = entries.len();
        let entries: Vec<QueueEntry> = entries
            .into_iter()
            .filter(|entry| seen.insert(entry.identifier.clone()))
            .collect();
        if entries.len() != loaded {
            info!(
                "Dropped {} duplicate entries while loading '{}'",
                loaded - entries.len(),
                path.display()
            );
        }
        debug!("Loaded {} queue entries from '{}'", entries.len(), path.display());
        Self {
            path,
            processed,
            len_hint: AtomicUsize::new(entries.len()),
            state: Mutex::new(QueueState {
                entries,
                in_flight: HashSet::new(),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends `entry` to the tail unless its identifier is already queued
    /// (in flight included) or already processed.
    pub fn enqueue(&self, entry: QueueEntry) -> Result<EnqueueOutcome, StorageError> {
        let mut state = lock(&self.state);
        if state
            .entries
            .iter()
            .any(|e| e.identifier == entry.identifier)
        {
            return Ok(EnqueueOutcome::AlreadyQueued);
        }
        if self.processed.contains(&entry.identifier) {
            return Ok(EnqueueOutcome::AlreadyProcessed);
        }

        let mut entries = state.entries.clone();
        entries.push(entry);
        write_json(&self.path, &entries)?;
        self.len_hint.store(entries.len(), Ordering::Relaxed);
        state.entries = entries;
        Ok(EnqueueOutcome::Enqueued)
    }

    /// A copy of every entry, in queue order.
    pub fn peek_all(&self) -> Vec<QueueEntry> {
        lock(&self.state).entries.clone()
    }

    /// Hands out the oldest entry that is not already in flight.
    pub fn claim_next(&self) -> Option<QueueEntry> {
        let mut state = lock(&self.state);
        let entry = state
            .entries
            .iter()
            .find(|e| !state.in_flight.contains(&e.identifier))
            .cloned()?;
        state.in_flight.insert(entry.identifier.clone());
        Some(entry)
    }

    /// Clears the in-flight mark without touching the persisted queue.
    pub fn release(&self, id: &str) {
        lock(&self.state).in_flight.remove(id);
    }

    /// Deletes the entry for `id`. Returns whether one existed.
    pub fn remove(&self, id: &str) -> Result<bool, StorageError> {
        let mut state = lock(&self.state);
        state.in_flight.remove(id);
        if !state.entries.iter().any(|e| e.identifier == id) {
            return Ok(false);
        }
        let entries: Vec<QueueEntry> = state
            .entries
            .iter()
            .filter(|e| e.identifier != id)
            .cloned()
            .collect();
        write_json(&self.path, &entries)?;
        self.len_hint.store(entries.len(), Ordering::Relaxed);
        state.entries = entries;
        Ok(true)
    }

    /// Moves the entry for `id` to the tail and bumps its attempt count.
    /// Returns the new attempt count, or `None` if `id` is not queued.
    pub fn requeue(&self, id: &str) -> Result<Option<u32>, StorageError> {
        let mut state = lock(&self.state);
        state.in_flight.remove(id);
        let Some(position) = state.entries.iter().position(|e| e.identifier == id) else {
            return Ok(None);
        };
        let mut entries = state.entries.clone();
        let mut entry = entries.remove(position);
        entry.attempt += 1;
        let attempt = entry.attempt;
        entries.push(entry);
        write_json(&self.path, &entries)?;
        self.len_hint.store(entries.len(), Ordering::Relaxed);
        state.entries = entries;
        Ok(Some(attempt))
    }

    pub fn contains(&self, id: &str) -> bool {
        lock(&self.state).entries.iter().any(|e| e.identifier == id)
    }

    /// Total entries, in flight included.
    pub fn len(&self) -> usize {
        lock(&self.state).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entry count read without taking the lock; may lag a concurrent
    /// mutation.
    pub fn approx_len(&self) -> usize {
        self.len_hint.load(Ordering::Relaxed)
    }

    /// Entries waiting to be claimed.
    pub fn pending_len(&self) -> usize {
        let state = lock(&self.state);
        state.entries.len().saturating_sub(state.in_flight.len())
    }
}
