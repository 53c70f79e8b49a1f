//! Key-value storage media.
//!
//! A [`StorageMedium`] is the durable string-to-string map that the
//! persistence store reads and writes. Two media are provided:
//!
//! - [`MemoryStorage`]: an in-process map, useful for embedding and tests.
//! - [`FileStorage`]: one file per key inside a directory.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use directories::ProjectDirs;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

/// Errors raised by a storage medium.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Reading or writing the underlying medium failed.
    #[error("storage I/O error: {0}")]
    Io(#[from] io::Error),

    /// The key cannot be represented on this medium.
    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    /// No platform data directory could be determined.
    #[error("failed to determine data directory")]
    NoDataDirectory,
}

/// A durable map from string keys to string values.
pub trait StorageMedium: Send + Sync {
    /// Returns the value stored under `key`, or `None` if there is none.
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// In-memory storage medium.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StorageMedium for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// File-backed storage medium.
///
/// Each key is stored as one file inside the directory. Keys are arbitrary
/// strings: every byte outside `[A-Za-z0-9_-]` is percent-encoded in the file
/// name, so distinct keys never share a file and no key can name a path
/// outside the directory.
///
/// Writes go to a uniquely named temporary sibling first and are renamed into
/// place, so a value is either the old one or the new one, never a partial
/// write.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Opens (creating if needed) a storage directory.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        debug!(dir = %dir.display(), "Opened file storage");
        Ok(Self { dir })
    }

    /// Opens the platform's per-user data directory for this crate.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NoDataDirectory` if the home directory cannot be
    /// determined, or `StorageError::Io` if the directory cannot be created.
    pub fn open_default() -> Result<Self, StorageError> {
        let dirs =
            ProjectDirs::from("", "", "shadow-capture").ok_or(StorageError::NoDataDirectory)?;
        Self::open(dirs.data_dir().join("events"))
    }

    /// Directory holding the stored values.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidKey` if `key` is empty.
    pub fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        if key.is_empty() {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(encode_file_name(key)))
    }
}

/// Percent-encodes every byte of `key` that is not ASCII alphanumeric, `-`
/// or `_`.
fn encode_file_name(key: &str) -> String {
    let mut encoded = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_') {
            encoded.push(char::from(byte));
        } else {
            encoded.push_str(&format!("%{byte:02X}"));
        }
    }
    encoded
}

impl StorageMedium for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;

        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(value.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| e.error)?;
        Ok(())
    }
}
