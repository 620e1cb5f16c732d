//! OpenID Connect discovery
//!
//! Logto serves its provider metadata at
//! `<endpoint>/oidc/.well-known/openid-configuration`. The client fetches it
//! once at construction, optionally through a cache, and treats it as
//! immutable afterwards.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{LogtoError, Result};
use crate::storage::{cache_keys, Storage};
use crate::transport::Transport;

/// Path of the discovery document relative to the tenant endpoint.
pub const DISCOVERY_PATH: &str = "/oidc/.well-known/openid-configuration";

// ---------------------------------------------------------------------------
// ProviderMetadata
// ---------------------------------------------------------------------------

/// Provider metadata returned by the discovery endpoint
///
/// Only the endpoints the client needs are typed; every other member of the
/// document is kept in [`Self::extra`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderMetadata {
    /// Issuer identifier, compared against the `iss` claim of ID tokens.
    pub issuer: String,

    /// Authorization endpoint for sign-in redirects.
    pub authorization_endpoint: String,

    /// Token endpoint for code and refresh grants.
    pub token_endpoint: String,

    /// Userinfo endpoint.
    pub userinfo_endpoint: String,

    /// End-session endpoint for sign-out redirects.
    pub end_session_endpoint: String,

    /// Token revocation endpoint.
    pub revocation_endpoint: String,

    /// JWKS document location.
    pub jwks_uri: String,

    /// Unrecognized members of the discovery document.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl ProviderMetadata {
    /// Parse a discovery document body.
    ///
    /// # Errors
    ///
    /// Returns [`LogtoError::Discovery`] if a required endpoint is missing or
    /// the body is not JSON.
    pub fn from_json(body: &str) -> Result<Self> {
        serde_json::from_str(body)
            .map_err(|e| LogtoError::Discovery(format!("invalid discovery document: {e}")))
    }
}

/// Fetch the provider metadata, consulting `cache` first
///
/// A cached body under [`cache_keys::OIDC_CONFIG`] is used as is. Otherwise
/// the document is fetched from `discovery_url`, parsed, and only then
/// written to the cache, so error bodies are never cached.
///
/// # Errors
///
/// Returns [`LogtoError::Discovery`] for non-2xx responses or unparsable
/// bodies, and [`LogtoError::Transport`] when the request fails.
pub async fn fetch_provider_metadata(
    transport: &dyn Transport,
    discovery_url: &str,
    cache: Option<&dyn Storage>,
) -> Result<ProviderMetadata> {
    if let Some(cache) = cache {
        if let Some(body) = cache.get(cache_keys::OIDC_CONFIG)? {
            match ProviderMetadata::from_json(&body) {
                Ok(metadata) => {
                    tracing::debug!("Using cached discovery document");
                    return Ok(metadata);
                }
                Err(e) => {
                    tracing::warn!("Ignoring unreadable cached discovery document: {}", e);
                    cache.remove(cache_keys::OIDC_CONFIG)?;
                }
            }
        }
    }

    tracing::debug!("Fetching discovery document from {}", discovery_url);
    let resp = transport.get(discovery_url, None).await?;

    if !resp.is_success() {
        return Err(LogtoError::Discovery(format!(
            "discovery endpoint returned {}: {}",
            resp.status, resp.body
        )));
    }

    let metadata = ProviderMetadata::from_json(&resp.body)?;

    if let Some(cache) = cache {
        cache.set(cache_keys::OIDC_CONFIG, &resp.body)?;
    }

    Ok(metadata)
}
