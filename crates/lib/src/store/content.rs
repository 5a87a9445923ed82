use super::write_atomic;
use crate::errors::StorageError;
use std::path::{Path, PathBuf};

const MAX_PLAIN_KEY_LEN: usize = 100;

/// Raw content and summary artifacts, one text file per identifier.
#[derive(Debug, Clone)]
pub struct ContentStore {
    raw_dir: PathBuf,
    summary_dir: PathBuf,
}

impl ContentStore {
    pub fn new(raw_dir: impl Into<PathBuf>, summary_dir: impl Into<PathBuf>) -> Self {
        Self {
            raw_dir: raw_dir.into(),
            summary_dir: summary_dir.into(),
        }
    }

    /// Creates both artifact directories.
    pub fn ensure_dirs(&self) -> Result<(), StorageError> {
        for dir in [&self.raw_dir, &self.summary_dir] {
            std::fs::create_dir_all(dir).map_err(|source| StorageError::Write {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// The file stem for an identifier.
    ///
    /// Short identifiers made of `[A-Za-z0-9._-]` (video ids) are used as is;
    /// anything else (URLs) is keyed by its MD5 digest.
    pub fn key_for(identifier: &str) -> String {
        let plain = !identifier.is_empty()
            && identifier.len() <= MAX_PLAIN_KEY_LEN
            && !identifier.starts_with('.')
            && identifier
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
        if plain {
            identifier.to_string()
        } else {
            format!("{:x}", md5::compute(identifier.as_bytes()))
        }
    }

    pub fn raw_path(&self, identifier: &str) -> PathBuf {
        self.raw_dir.join(format!("{}.txt", Self::key_for(identifier)))
    }

    pub fn summary_path(&self, identifier: &str) -> PathBuf {
        self.summary_dir
            .join(format!("{}.txt", Self::key_for(identifier)))
    }

    pub fn raw_dir(&self) -> &Path {
        &self.raw_dir
    }

    pub fn summary_dir(&self) -> &Path {
        &self.summary_dir
    }

    /// Durably writes raw content and returns its path.
    pub fn write_raw(&self, identifier: &str, content: &str) -> Result<PathBuf, StorageError> {
        let path = self.raw_path(identifier);
        write_atomic(&path, content.as_bytes())?;
        Ok(path)
    }

    pub fn read_raw(&self, path: &Path) -> Result<String, StorageError> {
        std::fs::read_to_string(path).map_err(|source| StorageError::Read {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Writes the summary for `identifier`, replacing any previous one. The
    /// file appears complete or not at all.
    pub fn write_summary(&self, identifier: &str, summary: &str) -> Result<PathBuf, StorageError> {
        let path = self.summary_path(identifier);
        write_atomic(&path, summary.as_bytes())?;
        Ok(path)
    }
}
