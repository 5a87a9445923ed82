//! # Persisted Stores
//!
//! Durable state for the pipeline: the processed-identifier cache, the work
//! queue, the bounded error log, and the raw/summary artifact directories.
//!
//! Every store is one JSON file rewritten in full after each mutation. Files
//! are written to a temporary sibling and renamed into place, so a reader
//! never observes a half-written store. A missing or unreadable file loads as
//! empty state.

pub mod content;
pub mod error_log;
pub mod queue;
pub mod set;

pub use content::ContentStore;
pub use error_log::{ErrorLog, ErrorRecord, Stage};
pub use queue::{DurableQueue, EnqueueOutcome, QueueEntry};
pub use set::DurableSet;

use crate::errors::StorageError;
use serde::{de::DeserializeOwned, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};

/// File and directory names under a data directory.
#[derive(Debug, Clone, PartialEq)]
pub struct DataLayout {
    pub root: PathBuf,
    pub processed_file: PathBuf,
    pub queue_file: PathBuf,
    pub error_file: PathBuf,
    pub raw_dir: PathBuf,
    pub summary_dir: PathBuf,
}

impl DataLayout {
    /// The default layout rooted at `root`.
    pub fn under(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            processed_file: root.join("processed.json"),
            queue_file: root.join("queue.json"),
            error_file: root.join("errors.json"),
            raw_dir: root.join("raw"),
            summary_dir: root.join("summaries"),
            root,
        }
    }
}

/// Shared handles to every store. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct PipelineStores {
    pub processed: Arc<DurableSet>,
    pub queue: Arc<DurableQueue>,
    pub errors: Arc<ErrorLog>,
    pub content: ContentStore,
}

impl PipelineStores {
    /// Creates the directories and loads every store. Unreadable stores
    /// start empty; an uncreatable directory is an error.
    pub fn open(layout: &DataLayout, error_log_capacity: usize) -> Result<Self, StorageError> {
        std::fs::create_dir_all(&layout.root).map_err(|source| StorageError::Write {
            path: layout.root.clone(),
            source,
        })?;
        let content = ContentStore::new(&layout.raw_dir, &layout.summary_dir);
        content.ensure_dirs()?;

        let processed = Arc::new(DurableSet::open(&layout.processed_file));
        let queue = Arc::new(DurableQueue::open(&layout.queue_file, processed.clone()));
        let errors = Arc::new(ErrorLog::open(&layout.error_file, error_log_capacity));
        info!(
            "Opened stores under '{}': {} processed, {} queued, {} error records",
            layout.root.display(),
            processed.len(),
            queue.len(),
            errors.records().len()
        );
        Ok(Self {
            processed,
            queue,
            errors,
            content,
        })
    }
}

/// Loads a JSON store, falling back to `T::default()` when the file is
/// missing or corrupt. A corrupt file is moved aside to `<file>.corrupt`.
pub(crate) fn load_or_default<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    match read_json(path) {
        Ok(Some(value)) => value,
        Ok(None) => T::default(),
        Err(e) => {
            warn!("Starting with an empty store: {e}");
            if let StorageError::Corrupt { .. } = e {
                let aside = corrupt_path(path);
                if let Err(rename_err) = std::fs::rename(path, &aside) {
                    warn!(
                        "Could not move corrupt store '{}' aside: {rename_err}",
                        path.display()
                    );
                }
            }
            T::default()
        }
    }
}

/// Reads and parses a JSON file. Returns `Ok(None)` if it does not exist.
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StorageError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StorageError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|source| StorageError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
}

/// Serializes `value` as pretty JSON and atomically replaces `path`.
pub(crate) fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StorageError> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|source| StorageError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;
    write_atomic(path, &bytes)
}

/// Writes `bytes` to a temp file next to `path` and renames it into place.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let write_err = |source: std::io::Error| StorageError::Write {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(write_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

fn corrupt_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".corrupt");
    PathBuf::from(name)
}

/// Locks a store mutex. A panic while holding the lock cannot leave the
/// persisted file half-written, so the poisoned state is still usable.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
