//! Signing key cache and ID token verification
//!
//! The provider's JWKS document is cached (raw JSON plus a fetch timestamp)
//! in the client's cache storage. It is only refetched when a token names a
//! key id the cached set does not contain and the cached set is older than
//! [`JWKS_TTL_SECONDS`]; this bounds how often a forged `kid` can make the
//! client hit the provider.

use std::sync::Arc;

use base64::Engine as _;
use chrono::Utc;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use tokio::sync::Mutex;

use crate::core::IdTokenClaims;
use crate::error::{JwtError, LogtoError, Result};
use crate::storage::{cache_keys, Storage};
use crate::transport::Transport;

/// Minimum age of the cached key set before an unknown `kid` may evict it.
pub const JWKS_TTL_SECONDS: i64 = 300;

/// Algorithms accepted in ID token headers.
pub const ALLOWED_ALGORITHMS: [&str; 7] = [
    "RS256", "RS384", "RS512", "ES256", "ES384", "ES512", "ES256K",
];

fn supported_algorithm(name: &str) -> Option<Algorithm> {
    match name {
        "RS256" => Some(Algorithm::RS256),
        "RS384" => Some(Algorithm::RS384),
        "RS512" => Some(Algorithm::RS512),
        "ES256" => Some(Algorithm::ES256),
        "ES384" => Some(Algorithm::ES384),
        _ => None,
    }
}

/// Reads `alg` from the token header without trusting anything else in it.
fn header_algorithm(token: &str) -> Result<Algorithm> {
    let header = token
        .split('.')
        .next()
        .ok_or_else(|| JwtError::Malformed("empty token".into()))?;
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(header.trim_end_matches('='))
        .map_err(|e| JwtError::Malformed(format!("header is not base64url: {e}")))?;
    let value: serde_json::Value = serde_json::from_slice(&bytes)
        .map_err(|e| JwtError::Malformed(format!("header is not JSON: {e}")))?;
    let name = value
        .get("alg")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| JwtError::Malformed("header has no alg".into()))?;

    if !ALLOWED_ALGORITHMS.contains(&name) {
        return Err(JwtError::UnsupportedAlgorithm(format!("{name} is not accepted")).into());
    }

    supported_algorithm(name).ok_or_else(|| {
        JwtError::UnsupportedAlgorithm(format!("{name} cannot be verified")).into()
    })
}

/// Keeps `use=sig` keys the JWK parser understands; others are skipped.
fn parse_signing_keys(raw: &str) -> Result<JwkSet> {
    let document: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| JwtError::KeySetUnavailable(format!("JWKS is not JSON: {e}")))?;
    let keys = document
        .get("keys")
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| JwtError::KeySetUnavailable("JWKS has no keys array".into()))?;

    let keys = keys
        .iter()
        .filter(|key| key.get("use").and_then(serde_json::Value::as_str) == Some("sig"))
        .filter_map(|key| match serde_json::from_value::<Jwk>(key.clone()) {
            Ok(jwk) => Some(jwk),
            Err(e) => {
                tracing::debug!("Skipping unsupported signing key: {}", e);
                None
            }
        })
        .collect();

    Ok(JwkSet { keys })
}

// ---------------------------------------------------------------------------
// JwtVerifier
// ---------------------------------------------------------------------------

/// Verifies ID tokens against the provider's cached signing keys.
#[derive(Debug)]
pub struct JwtVerifier {
    transport: Arc<dyn Transport>,
    cache: Arc<dyn Storage>,
    jwks_uri: String,
    issuer: String,
    audience: String,
    fetch_lock: Mutex<()>,
}

impl JwtVerifier {
    /// Creates a verifier for tokens issued by `issuer` to `audience`.
    pub fn new(
        transport: Arc<dyn Transport>,
        cache: Arc<dyn Storage>,
        jwks_uri: impl Into<String>,
        issuer: impl Into<String>,
        audience: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            cache,
            jwks_uri: jwks_uri.into(),
            issuer: issuer.into(),
            audience: audience.into(),
            fetch_lock: Mutex::new(()),
        }
    }

    fn cache_is_stale(&self) -> Result<bool> {
        let last_update = self
            .cache
            .get(cache_keys::JWKS_LAST_UPDATE)?
            .and_then(|value| value.parse::<i64>().ok());

        Ok(match last_update {
            Some(timestamp) => timestamp < Utc::now().timestamp() - JWKS_TTL_SECONDS,
            None => true,
        })
    }

    /// Return the signing keys, fetching them if they are not cached
    ///
    /// With `kid_not_found` set, a cached set older than
    /// [`JWKS_TTL_SECONDS`] (or without a timestamp) is evicted first.
    /// Concurrent callers are serialized so only one of them fetches.
    ///
    /// # Errors
    ///
    /// Returns [`JwtError::KeySetUnavailable`] if the JWKS endpoint answers
    /// with a non-2xx status or an unreadable document.
    pub async fn fetch_jwks(&self, kid_not_found: bool) -> Result<JwkSet> {
        let _guard = self.fetch_lock.lock().await;

        if kid_not_found && self.cache_is_stale()? {
            tracing::debug!("Evicting cached signing keys");
            self.cache.remove(cache_keys::JWKS)?;
        }

        if let Some(raw) = self.cache.get(cache_keys::JWKS)? {
            return parse_signing_keys(&raw);
        }

        tracing::debug!("Fetching signing keys from {}", self.jwks_uri);
        let resp = self.transport.get(&self.jwks_uri, None).await?;
        if !resp.is_success() {
            return Err(JwtError::KeySetUnavailable(format!(
                "JWKS endpoint returned {}: {}",
                resp.status, resp.body
            ))
            .into());
        }

        let keys = parse_signing_keys(&resp.body)?;
        self.cache.set(cache_keys::JWKS, &resp.body)?;
        self.cache.set(
            cache_keys::JWKS_LAST_UPDATE,
            &Utc::now().timestamp().to_string(),
        )?;

        Ok(keys)
    }

    /// Verify signature, issuer, audience and expiry of an ID token
    ///
    /// An unknown key id triggers exactly one [`Self::fetch_jwks`] with
    /// `kid_not_found` and one retry.
    ///
    /// # Errors
    ///
    /// Returns [`LogtoError::JwtVerification`] describing the first check
    /// that failed.
    pub async fn verify_jwt(&self, token: &str) -> Result<IdTokenClaims> {
        let keys = self.fetch_jwks(false).await?;

        match self.verify_with(&keys, token) {
            Err(LogtoError::JwtVerification(JwtError::KeyNotFound(kid))) => {
                tracing::info!("Signing key {} not found, refreshing key set", kid);
                let keys = self.fetch_jwks(true).await?;
                self.verify_with(&keys, token)
            }
            other => other,
        }
    }

    fn verify_with(&self, keys: &JwkSet, token: &str) -> Result<IdTokenClaims> {
        let algorithm = header_algorithm(token)?;
        let header = jsonwebtoken::decode_header(token).map_err(JwtError::from)?;

        let kid = header
            .kid
            .ok_or_else(|| JwtError::Malformed("header has no kid".into()))?;
        let jwk = keys
            .find(&kid)
            .ok_or_else(|| JwtError::KeyNotFound(kid.clone()))?;
        let key = DecodingKey::from_jwk(jwk).map_err(JwtError::from)?;

        let mut validation = Validation::new(algorithm);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_audience(&[self.audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.validate_exp = true;

        let data = jsonwebtoken::decode::<IdTokenClaims>(token, &key, &validation)
            .map_err(JwtError::from)?;

        Ok(data.claims)
    }
}
