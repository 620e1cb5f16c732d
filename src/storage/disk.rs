//! On-disk storage using an embedded `sled` database
//!
//! Mainly used as the CLI's cache for the discovery document and signing
//! keys, so repeated invocations avoid a network round trip.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use sled::Db;

use crate::error::{LogtoError, Result};
use crate::storage::Storage;

/// [`Storage`] backed by a sled tree.
#[derive(Debug, Clone)]
pub struct SledStorage {
    db: Db,
}

impl SledStorage {
    /// Open (or create) a database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`LogtoError::Storage`] if the database cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = sled::open(path)
            .map_err(|e| LogtoError::Storage(format!("Failed to open database: {}", e)))?;
        Ok(Self { db })
    }

    /// Open the database in the platform cache directory.
    ///
    /// `LOGTO_CACHE_DIR` overrides the location.
    pub fn open_default() -> Result<Self> {
        Self::open(Self::default_path()?)
    }

    /// Resolve the default database location.
    pub fn default_path() -> Result<PathBuf> {
        if let Ok(dir) = std::env::var("LOGTO_CACHE_DIR") {
            return Ok(PathBuf::from(dir).join("cache.sled"));
        }

        let proj_dirs = ProjectDirs::from("io", "logto", "logto")
            .ok_or_else(|| LogtoError::Storage("Could not determine cache directory".into()))?;

        Ok(proj_dirs.cache_dir().join("cache.sled"))
    }
}

impl Storage for SledStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match self
            .db
            .get(key.as_bytes())
            .map_err(|e| LogtoError::Storage(format!("Get failed: {}", e)))?
        {
            Some(bytes) => {
                let value = String::from_utf8(bytes.to_vec())
                    .map_err(|e| LogtoError::Storage(format!("Value is not UTF-8: {}", e)))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.db
            .insert(key.as_bytes(), value.as_bytes())
            .map_err(|e| LogtoError::Storage(format!("Insert failed: {}", e)))?;

        self.db
            .flush()
            .map_err(|e| LogtoError::Storage(format!("Flush failed: {}", e)))?;

        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.db
            .remove(key.as_bytes())
            .map_err(|e| LogtoError::Storage(format!("Remove failed: {}", e)))?;
        Ok(())
    }
}
