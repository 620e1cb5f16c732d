//! Token persistence
//!
//! Refresh and ID tokens are stored as raw strings. Access tokens are kept
//! in a JSON map keyed by [`build_access_token_key`], so tokens for
//! different resources and organizations never overwrite each other.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::core::TokenResponse;
use crate::error::Result;
use crate::storage::{Storage, StorageKey};

/// A cached access token is only served if it outlives now by this margin.
pub const ACCESS_TOKEN_LEEWAY_SECONDS: i64 = 10;

/// Resource used in the key when none is requested.
const DEFAULT_RESOURCE: &str = "openid";

/// Builds the access-token map key for a resource and organization.
///
/// # Examples
///
/// ```
/// use logto::client::tokens::build_access_token_key;
///
/// assert_eq!(build_access_token_key(None, None), ":openid");
/// assert_eq!(build_access_token_key(Some("api"), Some("org")), "#org:api");
/// ```
pub fn build_access_token_key(resource: Option<&str>, organization_id: Option<&str>) -> String {
    format!(
        "{}:{}",
        organization_id
            .map(|org| format!("#{org}"))
            .unwrap_or_default(),
        resource.unwrap_or(DEFAULT_RESOURCE)
    )
}

/// An access token with its scope and absolute expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    /// The access token string.
    pub token: String,
    /// Granted scopes, space separated.
    pub scope: String,
    /// Expiry, stored as epoch seconds.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// Builds an entry from a token response received now.
    ///
    /// An `expires_in` beyond what a timestamp can hold saturates at the
    /// latest (or earliest) representable instant.
    pub fn from_response(response: &TokenResponse) -> Self {
        Self {
            token: response.access_token.clone(),
            scope: response.scope.clone(),
            expires_at: expiry_after(Utc::now(), response.expires_in),
        }
    }

    /// True when the token expires more than the leeway after `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now + Duration::seconds(ACCESS_TOKEN_LEEWAY_SECONDS)
    }

    /// [`Self::is_valid_at`] the current time.
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }
}

fn expiry_after(now: DateTime<Utc>, expires_in: i64) -> DateTime<Utc> {
    Duration::try_seconds(expires_in)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .unwrap_or(if expires_in < 0 {
            DateTime::<Utc>::MIN_UTC
        } else {
            DateTime::<Utc>::MAX_UTC
        })
}

/// Typed view over the token keys of a [`Storage`].
#[derive(Debug)]
pub struct TokenStore<'a> {
    storage: &'a dyn Storage,
}

impl<'a> TokenStore<'a> {
    /// Wraps a storage.
    pub fn new(storage: &'a dyn Storage) -> Self {
        Self { storage }
    }

    pub fn refresh_token(&self) -> Result<Option<String>> {
        self.storage.get(StorageKey::RefreshToken.as_str())
    }

    pub fn id_token(&self) -> Result<Option<String>> {
        self.storage.get(StorageKey::IdToken.as_str())
    }

    /// Load the access-token map; an unreadable map is treated as empty.
    pub fn access_token_map(&self) -> Result<HashMap<String, AccessToken>> {
        let Some(json) = self.storage.get(StorageKey::AccessTokenMap.as_str())? else {
            return Ok(HashMap::new());
        };

        match serde_json::from_str(&json) {
            Ok(map) => Ok(map),
            Err(e) => {
                tracing::warn!("Discarding unreadable access token map: {}", e);
                Ok(HashMap::new())
            }
        }
    }

    fn save_access_token_map(&self, map: &HashMap<String, AccessToken>) -> Result<()> {
        self.storage.set(
            StorageKey::AccessTokenMap.as_str(),
            &serde_json::to_string(map)?,
        )
    }

    pub fn access_token(&self, key: &str) -> Result<Option<AccessToken>> {
        Ok(self.access_token_map()?.remove(key))
    }

    pub fn save_access_token(&self, key: &str, token: AccessToken) -> Result<()> {
        let mut map = self.access_token_map()?;
        map.insert(key.to_string(), token);
        self.save_access_token_map(&map)
    }

    /// Evict one entry and persist the eviction.
    pub fn remove_access_token(&self, key: &str) -> Result<()> {
        let mut map = self.access_token_map()?;
        if map.remove(key).is_some() {
            self.save_access_token_map(&map)?;
        }
        Ok(())
    }

    /// Persist a token response
    ///
    /// The refresh and ID tokens are replaced only when the response carries
    /// them; the access token is stored under `key`.
    pub fn save_token_response(&self, key: &str, response: &TokenResponse) -> Result<()> {
        if let Some(refresh_token) = &response.refresh_token {
            self.storage
                .set(StorageKey::RefreshToken.as_str(), refresh_token)?;
        }
        if let Some(id_token) = &response.id_token {
            self.storage.set(StorageKey::IdToken.as_str(), id_token)?;
        }
        self.save_access_token(key, AccessToken::from_response(response))
    }

    /// Remove refresh token, ID token and every access token.
    pub fn clear(&self) -> Result<()> {
        for key in StorageKey::TOKENS {
            self.storage.remove(key.as_str())?;
        }
        Ok(())
    }
}
