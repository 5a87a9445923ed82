use super::{load_or_default, lock, write_json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, TryLockError};
use tracing::warn;

/// Records kept when no capacity is configured.
pub const DEFAULT_ERROR_LOG_CAPACITY: usize = 100;

/// Where in the pipeline a failure happened.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Discover,
    Store,
    Load,
    Summarize,
    Persist,
    /// The final failure of an entry that hit the retry ceiling.
    Abandoned,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Discover => "discover",
            Stage::Store => "store",
            Stage::Load => "load",
            Stage::Summarize => "summarize",
            Stage::Persist => "persist",
            Stage::Abandoned => "abandoned",
        };
        f.write_str(name)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ErrorRecord {
    pub timestamp: DateTime<Utc>,
    pub identifier: String,
    pub stage: Stage,
    pub message: String,
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({}): {}",
            self.timestamp.format("%H:%M:%S"),
            self.identifier,
            self.stage,
            self.message
        )
    }
}

/// A bounded, persisted ring of failure records. Oldest records are evicted
/// first. Recording never fails the caller.
#[derive(Debug)]
pub struct ErrorLog {
    path: PathBuf,
    capacity: usize,
    records: Mutex<VecDeque<ErrorRecord>>,
    total: AtomicU64,
}

impl ErrorLog {
    pub fn open(path: impl Into<PathBuf>, capacity: usize) -> Self {
        let path = path.into();
        let mut records: VecDeque<ErrorRecord> = load_or_default(&path);
        while records.len() > capacity {
            records.pop_front();
        }
        Self {
            path,
            capacity,
            records: Mutex::new(records),
            total: AtomicU64::new(0),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends a record, evicts beyond capacity, and persists. A persist
    /// failure is only reported.
    pub fn record(&self, identifier: &str, stage: Stage, message: impl Into<String>) {
        let record = ErrorRecord {
            timestamp: Utc::now(),
            identifier: identifier.to_string(),
            stage,
            message: message.into(),
        };
        self.total.fetch_add(1, Ordering::Relaxed);

        let mut records = lock(&self.records);
        records.push_back(record);
        while records.len() > self.capacity {
            records.pop_front();
        }
        if let Err(e) = write_json(&self.path, &*records) {
            warn!("Failed to persist error log: {e}");
        }
    }

    /// All retained records, oldest first.
    pub fn records(&self) -> Vec<ErrorRecord> {
        lock(&self.records).iter().cloned().collect()
    }

    /// The newest `n` records, oldest first.
    pub fn recent(&self, n: usize) -> Vec<ErrorRecord> {
        let records = lock(&self.records);
        let skip = records.len().saturating_sub(n);
        records.iter().skip(skip).cloned().collect()
    }

    /// Like [`ErrorLog::recent`], but returns `None` instead of waiting when
    /// a writer holds the lock.
    pub fn try_recent(&self, n: usize) -> Option<Vec<ErrorRecord>> {
        let records = match self.records.try_lock() {
            Ok(records) => records,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return None,
        };
        let skip = records.len().saturating_sub(n);
        Some(records.iter().skip(skip).cloned().collect())
    }

    /// Records made by this process, including evicted ones.
    pub fn total_recorded(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}
