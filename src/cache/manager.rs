//! Cache manager for persisting small JSON slots to disk
//!
//! Provides a `CacheManager` that stores one serialized value per key as a JSON
//! file. Writes go through a temporary file and a rename so readers never see a
//! half-written slot.

use directories::ProjectDirs;
use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when reading or writing a cache slot
#[derive(Debug, Error)]
pub enum CacheError {
    /// Filesystem access failed
    #[error("Cache I/O failed: {0}")]
    Io(#[from] io::Error),

    /// The slot exists but does not hold a valid entry
    #[error("Cache entry is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Manages reading and writing cached slots on disk
///
/// Slots live as `<key>.json` files in an XDG-compliant cache directory
/// (`~/.cache/andago-geo/` on Linux).
#[derive(Debug, Clone)]
pub struct CacheManager {
    /// Directory where cache files are stored
    cache_dir: PathBuf,
}

impl CacheManager {
    /// Creates a new CacheManager using XDG-compliant cache directory
    ///
    /// Returns `None` if the cache directory cannot be determined (e.g., no home directory).
    pub fn new() -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "andago-geo")?;
        let cache_dir = project_dirs.cache_dir().to_path_buf();
        Some(Self { cache_dir })
    }

    /// Creates a new CacheManager with a custom cache directory
    pub fn with_dir(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    /// Returns the path to a cache file for the given key
    fn cache_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", key))
    }

    /// Ensures the cache directory exists
    fn ensure_dir(&self) -> io::Result<()> {
        fs::create_dir_all(&self.cache_dir)
    }

    /// Writes a value into the slot for `key`, replacing any previous value
    ///
    /// # Returns
    /// * `Ok(())` on success
    /// * `Err(CacheError)` if directory creation, serialization or the rename fails
    pub fn write<T: Serialize>(&self, key: &str, data: &T) -> Result<(), CacheError> {
        self.ensure_dir()?;

        let json = serde_json::to_string(data)?;
        let path = self.cache_path(key);
        let tmp_path = self.cache_dir.join(format!(".{}.json.tmp", key));

        fs::write(&tmp_path, json)?;
        fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    /// Reads the value stored under `key`
    ///
    /// # Returns
    /// * `Ok(Some(T))` if the slot exists and parses
    /// * `Ok(None)` if the slot has never been written
    /// * `Err(CacheError::Malformed)` if the slot exists but cannot be parsed
    pub fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        let content = match fs::read_to_string(self.cache_path(key)) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        Ok(Some(serde_json::from_str(&content)?))
    }
}
