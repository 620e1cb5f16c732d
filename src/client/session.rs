//! Pending sign-in session
//!
//! A session is created by `sign_in` and lives in storage until the
//! callback has been handled. It binds the callback to the request that
//! started it: the callback must come back to the stored redirect URI with
//! the stored state, and the code is redeemed with the stored verifier.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{LogtoError, Result, SessionMismatchKind};
use crate::storage::{Storage, StorageKey};

/// State persisted between the sign-in redirect and the callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignInSession {
    /// Redirect URI sent in the authorization request.
    pub redirect_uri: String,
    /// PKCE verifier matching the challenge that was sent.
    pub code_verifier: String,
    /// Anti-CSRF state that was sent.
    pub state: String,
    /// Where to send the user after a successful callback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_redirect_uri: Option<String>,
}

impl SignInSession {
    /// Load the pending session, if any.
    ///
    /// An unreadable entry is deleted and reported as no session.
    pub fn load(storage: &dyn Storage) -> Result<Option<Self>> {
        let Some(json) = storage.get(StorageKey::SignInSession.as_str())? else {
            return Ok(None);
        };

        match serde_json::from_str(&json) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                tracing::warn!("Discarding unreadable sign-in session: {}", e);
                Self::clear(storage)?;
                Ok(None)
            }
        }
    }

    /// Persist as the pending session, replacing any previous one.
    pub fn save(&self, storage: &dyn Storage) -> Result<()> {
        storage.set(
            StorageKey::SignInSession.as_str(),
            &serde_json::to_string(self)?,
        )
    }

    /// Delete the pending session.
    pub fn clear(storage: &dyn Storage) -> Result<()> {
        storage.remove(StorageKey::SignInSession.as_str())
    }

    /// Check a callback URL against this session and extract the code.
    ///
    /// The checks run in a fixed order and the first failure wins: a
    /// server-reported `error`, then the redirect URI prefix, then the
    /// presence and value of `state`, then the presence of `code`.
    ///
    /// # Errors
    ///
    /// - [`LogtoError::InvalidUrl`] if `callback_url` cannot be parsed
    /// - [`LogtoError::ServerCallback`] if the callback carries `error`
    /// - [`LogtoError::SessionMismatch`] for any binding check failure
    pub fn validate_callback(&self, callback_url: &str) -> Result<String> {
        let url = Url::parse(callback_url)?;
        let mut query: HashMap<String, String> = url.query_pairs().into_owned().collect();

        if let Some(error) = query.remove("error") {
            return Err(LogtoError::ServerCallback {
                error,
                description: query.remove("error_description"),
            });
        }

        if !callback_url.starts_with(&self.redirect_uri) {
            return Err(LogtoError::SessionMismatch(SessionMismatchKind::RedirectUri));
        }

        match query.get("state") {
            None => return Err(LogtoError::SessionMismatch(SessionMismatchKind::MissingState)),
            Some(state) if state != &self.state => {
                return Err(LogtoError::SessionMismatch(
                    SessionMismatchKind::StateMismatch,
                ))
            }
            Some(_) => {}
        }

        query
            .remove("code")
            .ok_or(LogtoError::SessionMismatch(SessionMismatchKind::MissingCode))
    }
}
