use super::{load_or_default, lock, write_json};
use crate::errors::StorageError;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// The dedup cache: every identifier whose summary has been written.
///
/// Membership is monotonic. The file is a JSON array of strings, kept sorted
/// so rewrites are stable.
#[derive(Debug)]
pub struct DurableSet {
    path: PathBuf,
    members: Mutex<BTreeSet<String>>,
}

impl DurableSet {
    /// Loads the set from `path`. A missing or corrupt file yields an empty set.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let members: BTreeSet<String> = load_or_default(&path);
        debug!(
            "Loaded {} processed identifiers from '{}'",
            members.len(),
            path.display()
        );
        Self {
            path,
            members: Mutex::new(members),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, id: &str) -> bool {
        lock(&self.members).contains(id)
    }

    /// Adds `id` and persists. A no-op when it is already present.
    pub fn add(&self, id: &str) -> Result<(), StorageError> {
        let mut members = lock(&self.members);
        if !members.insert(id.to_string()) {
            return Ok(());
        }
        if let Err(e) = write_json(&self.path, &*members) {
            // Keep memory in step with the file; the caller aborts on this error.
            members.remove(id);
            return Err(e);
        }
        Ok(())
    }

    /// Rewrites the backing file from memory.
    pub fn persist(&self) -> Result<(), StorageError> {
        let members = lock(&self.members);
        write_json(&self.path, &*members)
    }

    pub fn len(&self) -> usize {
        lock(&self.members).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
