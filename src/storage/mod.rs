//! Session and cache storage
//!
//! The client persists its sign-in session and tokens through the
//! [`Storage`] trait, and caches the discovery document and signing keys
//! through the same trait. Hosts scope a storage instance to one user
//! session; the client never shares state between instances.
//!
//! Provided adapters:
//!
//! - [`MemoryStorage`]: process-local map, the default and the test double
//! - [`ScopedStorage`]: prefixes every key, e.g. `logto_<app_id>_<key>`
//! - [`keychain::KeyringStorage`]: OS credential store
//! - [`disk::SledStorage`]: embedded on-disk key-value store

pub mod disk;
pub mod keychain;

pub use disk::SledStorage;
pub use keychain::KeyringStorage;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::{LogtoError, Result};

/// Fixed storage keys used by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    /// Pending sign-in session (JSON).
    SignInSession,
    /// Opaque refresh token.
    RefreshToken,
    /// Raw ID token.
    IdToken,
    /// Access token map (JSON object).
    AccessTokenMap,
}

impl StorageKey {
    /// Storage key string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SignInSession => "sign_in_session",
            Self::RefreshToken => "refresh_token",
            Self::IdToken => "id_token",
            Self::AccessTokenMap => "access_token_map",
        }
    }

    /// Keys holding token material, cleared on sign-out and sign-in.
    pub const TOKENS: [StorageKey; 3] = [Self::RefreshToken, Self::IdToken, Self::AccessTokenMap];
}

impl std::fmt::Display for StorageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed cache keys used by the client.
pub mod cache_keys {
    /// Raw discovery document.
    pub const OIDC_CONFIG: &str = "oidc_config";
    /// Raw JWKS document.
    pub const JWKS: &str = "jwks";
    /// Unix timestamp (seconds) of the last JWKS fetch.
    pub const JWKS_LAST_UPDATE: &str = "jwks_last_update";
}

/// String key-value store used for sessions, tokens and caches.
///
/// # Errors
///
/// Implementations report backend failures as
/// [`LogtoError::Storage`]. A missing key is `Ok(None)` from `get` and a
/// no-op for `remove`.
#[cfg_attr(test, mockall::automock)]
pub trait Storage: Send + Sync + std::fmt::Debug {
    /// Read a value.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any existing one.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete a value.
    fn remove(&self, key: &str) -> Result<()>;
}

impl<S: Storage + ?Sized> Storage for Arc<S> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }
}

// ---------------------------------------------------------------------------
// MemoryStorage
// ---------------------------------------------------------------------------

/// In-memory storage backed by a mutex-guarded map.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.values
            .lock()
            .map_err(|_| LogtoError::Storage("memory storage lock poisoned".to_string()))
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ScopedStorage
// ---------------------------------------------------------------------------

/// Wraps another store and prefixes every key.
///
/// # Examples
///
/// ```
/// use logto::storage::{MemoryStorage, ScopedStorage, Storage};
///
/// let storage = ScopedStorage::for_session(MemoryStorage::new(), Some("app"));
/// storage.set("id_token", "token").unwrap();
/// assert_eq!(storage.inner().get("logto_app_id_token").unwrap().as_deref(), Some("token"));
/// ```
#[derive(Debug)]
pub struct ScopedStorage<S> {
    inner: S,
    prefix: String,
}

impl<S: Storage> ScopedStorage<S> {
    /// Prefix keys with an arbitrary string.
    pub fn new(inner: S, prefix: impl Into<String>) -> Self {
        Self {
            inner,
            prefix: prefix.into(),
        }
    }

    /// Session scoping: `logto_<app_id>_`, or `logto_default_` without an app id.
    pub fn for_session(inner: S, app_id: Option<&str>) -> Self {
        Self::new(inner, format!("logto_{}_", app_id.unwrap_or("default")))
    }

    /// Cache scoping: `logto_cache_<app_id>_`.
    pub fn for_cache(inner: S, app_id: &str) -> Self {
        Self::new(inner, format!("logto_cache_{}_", app_id))
    }

    /// The wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

impl<S: Storage> Storage for ScopedStorage<S> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(&self.key(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.inner.set(&self.key(key), value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.inner.remove(&self.key(key))
    }
}
