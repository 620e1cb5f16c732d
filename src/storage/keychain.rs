//! Storage in the operating system's credential store
//!
//! Each key is saved as its own keyring entry (Keychain on macOS, Secret
//! Service on Linux, Windows Credential Manager on Windows). The service
//! name is derived from the application id so several apps can share one
//! user account without clashing.

use crate::error::Result;
use crate::storage::Storage;

/// [`Storage`] backed by the `keyring` crate.
///
/// # Examples
///
/// ```no_run
/// use logto::storage::{KeyringStorage, Storage};
///
/// let storage = KeyringStorage::new("my-app");
/// storage.set("refresh_token", "r").unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct KeyringStorage {
    service: String,
}

impl KeyringStorage {
    /// Creates a store whose entries live under service `logto-<app_id>`.
    pub fn new(app_id: &str) -> Self {
        Self {
            service: Self::service_name(app_id),
        }
    }

    fn service_name(app_id: &str) -> String {
        format!("logto-{}", app_id)
    }

    fn entry(&self, key: &str) -> Result<keyring::Entry> {
        Ok(keyring::Entry::new(&self.service, key)?)
    }
}

impl Storage for KeyringStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entry(key)?.set_password(value)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        match self.entry(key)?.delete_password() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
