//! Logto client
//!
//! [`LogtoClient`] composes configuration, the protocol core, a storage, a
//! cache and a navigation callback into the operations a web application
//! needs: start a sign-in, handle its callback, sign out, and read tokens
//! and claims.
//!
//! One client instance serves one user session. Hosts that serve many users
//! create a client per request with a storage scoped to that user.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use logto::client::{LogtoClient, SignInOptions};
//! use logto::config::ClientSettings;
//!
//! # async fn run() -> logto::Result<()> {
//! let config = ClientSettings::new("https://tenant.logto.app", "app-id", "secret").into_config()?;
//! let client = LogtoClient::builder(config)
//!     .navigate(Arc::new(|uri: &str| println!("redirect to {uri}")))
//!     .build()
//!     .await?;
//!
//! client.sign_in(SignInOptions::new("https://app.example.com/callback")).await?;
//! // ...the browser comes back to the redirect URI...
//! client
//!     .handle_sign_in_callback("https://app.example.com/callback?code=...&state=...")
//!     .await?;
//! let token = client.access_token(Some("https://api.example.com"), None).await?;
//! # Ok(())
//! # }
//! ```

pub mod jwks;
pub mod session;
pub mod tokens;

pub use jwks::JwtVerifier;
pub use session::SignInSession;
pub use tokens::{build_access_token_key, AccessToken, TokenStore};

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::LogtoConfig;
use crate::core::{
    decode_claims_unverified, pkce, AccessTokenClaims, AuthorizationCodeGrant, DirectSignIn,
    IdTokenClaims, LogtoCore, RefreshTokenGrant, SignInUriParams, UserInfoResponse,
};
use crate::error::{JwtError, LogtoError, Result};
use crate::storage::{MemoryStorage, Storage};
use crate::transport::{ReqwestTransport, Transport};

/// Redirect side effect, called with the URI the user agent should visit.
pub type Navigate = Arc<dyn Fn(&str) + Send + Sync>;

// ---------------------------------------------------------------------------
// Options and outcomes
// ---------------------------------------------------------------------------

/// Options of [`LogtoClient::sign_in`].
#[derive(Debug, Clone, Default)]
pub struct SignInOptions {
    /// Where the provider sends the user back with the code.
    pub redirect_uri: String,
    /// First screen of the sign-in experience, e.g. `signIn` or `register`.
    pub first_screen: Option<String>,
    /// Legacy alternative to `first_screen`; ignored when that is set.
    pub interaction_mode: Option<String>,
    /// Prefilled identifier, e.g. an email address.
    pub login_hint: Option<String>,
    /// Skip the sign-in page and go straight to a method.
    pub direct_sign_in: Option<DirectSignIn>,
    /// Identifier types shown on the identifier screen.
    pub identifiers: Vec<String>,
    /// Where to navigate once the callback has been handled.
    pub post_redirect_uri: Option<String>,
    /// Additional authorization parameters; may override built-in ones.
    pub extra_params: Vec<(String, String)>,
}

impl SignInOptions {
    /// Options with only a redirect URI.
    pub fn new(redirect_uri: impl Into<String>) -> Self {
        Self {
            redirect_uri: redirect_uri.into(),
            ..Self::default()
        }
    }
}

/// Outcome of [`LogtoClient::sign_out`].
#[derive(Debug)]
pub struct SignOutResult {
    /// End-session URI the user was navigated to.
    pub sign_out_uri: String,
    /// Set when revoking the refresh token failed; local tokens are cleared
    /// regardless.
    pub revocation_error: Option<LogtoError>,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for [`LogtoClient`].
pub struct LogtoClientBuilder {
    config: LogtoConfig,
    storage: Option<Arc<dyn Storage>>,
    cache: Option<Arc<dyn Storage>>,
    transport: Option<Arc<dyn Transport>>,
    navigate: Option<Navigate>,
}

impl LogtoClientBuilder {
    /// Session storage; defaults to a fresh [`MemoryStorage`].
    pub fn storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Cache for the discovery document and signing keys.
    ///
    /// Without one, discovery runs on every build and signing keys are
    /// cached in memory for the client's lifetime.
    pub fn cache(mut self, cache: Arc<dyn Storage>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// HTTP transport; defaults to [`ReqwestTransport`] with the configured timeout.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Navigation callback; defaults to logging the URI.
    pub fn navigate(mut self, navigate: Navigate) -> Self {
        self.navigate = Some(navigate);
        self
    }

    /// Resolve provider metadata and build the client.
    ///
    /// # Errors
    ///
    /// Returns [`LogtoError::Discovery`] or [`LogtoError::Transport`] if the
    /// discovery document cannot be obtained.
    pub async fn build(self) -> Result<LogtoClient> {
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(self.config.timeout())?),
        };

        let discovery_url = self.config.discovery_url()?;
        let core = LogtoCore::discover(
            Arc::clone(&transport),
            discovery_url.as_str(),
            self.cache.as_deref(),
        )
        .await?;

        let key_cache: Arc<dyn Storage> = self
            .cache
            .unwrap_or_else(|| Arc::new(MemoryStorage::new()));
        let verifier = JwtVerifier::new(
            transport,
            key_cache,
            core.metadata().jwks_uri.clone(),
            core.metadata().issuer.clone(),
            self.config.app_id(),
        );

        Ok(LogtoClient {
            config: self.config,
            core,
            storage: self
                .storage
                .unwrap_or_else(|| Arc::new(MemoryStorage::new())),
            verifier,
            navigate: self.navigate.unwrap_or_else(|| {
                Arc::new(|uri: &str| tracing::info!("Navigate to {}", uri))
            }),
            refresh_locks: std::sync::Mutex::new(HashMap::new()),
        })
    }
}

// ---------------------------------------------------------------------------
// LogtoClient
// ---------------------------------------------------------------------------

/// OIDC client for one Logto application and one user session.
pub struct LogtoClient {
    config: LogtoConfig,
    core: LogtoCore,
    storage: Arc<dyn Storage>,
    verifier: JwtVerifier,
    navigate: Navigate,
    refresh_locks: std::sync::Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl std::fmt::Debug for LogtoClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogtoClient")
            .field("app_id", &self.config.app_id())
            .field("core", &self.core)
            .field("storage", &self.storage)
            .finish_non_exhaustive()
    }
}

impl LogtoClient {
    /// Starts building a client.
    pub fn builder(config: LogtoConfig) -> LogtoClientBuilder {
        LogtoClientBuilder {
            config,
            storage: None,
            cache: None,
            transport: None,
            navigate: None,
        }
    }

    pub fn config(&self) -> &LogtoConfig {
        &self.config
    }

    pub fn core(&self) -> &LogtoCore {
        &self.core
    }

    fn tokens(&self) -> TokenStore<'_> {
        TokenStore::new(self.storage.as_ref())
    }

    /// Start a sign-in
    ///
    /// Generates a fresh verifier and state, stores the pending session,
    /// clears every cached token, navigates to the authorization URI and
    /// returns it.
    ///
    /// # Errors
    ///
    /// Returns [`LogtoError::Config`] if `extra_params` contains an empty
    /// key, or a storage error.
    pub async fn sign_in(&self, options: SignInOptions) -> Result<String> {
        let code_verifier = pkce::generate_code_verifier();
        let code_challenge = pkce::generate_code_challenge(&code_verifier);
        let state = pkce::generate_state();

        let uri = self.core.generate_sign_in_uri(&SignInUriParams {
            client_id: self.config.app_id(),
            redirect_uri: &options.redirect_uri,
            code_challenge: &code_challenge,
            state: &state,
            scopes: Some(self.config.scopes()),
            resources: self.config.resources(),
            prompt: self.config.prompt(),
            first_screen: options.first_screen.as_deref(),
            interaction_mode: options.interaction_mode.as_deref(),
            login_hint: options.login_hint.as_deref(),
            direct_sign_in: options.direct_sign_in.as_ref(),
            identifiers: &options.identifiers,
            extra_params: &options.extra_params,
            include_reserved_scopes: self.config.include_reserved_scopes(),
        })?;

        SignInSession {
            redirect_uri: options.redirect_uri,
            code_verifier,
            state,
            post_redirect_uri: options.post_redirect_uri,
        }
        .save(self.storage.as_ref())?;
        self.tokens().clear()?;

        tracing::info!("Sign-in started");
        (self.navigate)(&uri);
        Ok(uri)
    }

    /// Complete a sign-in from the callback URL
    ///
    /// The pending session is deleted whatever the outcome, so a callback
    /// can never be replayed. On success the tokens are stored, the user is
    /// navigated to the session's post-redirect URI (if any) and that URI is
    /// returned.
    ///
    /// # Errors
    ///
    /// - [`LogtoError::SessionNotFound`] when no sign-in is pending
    /// - [`LogtoError::ServerCallback`] when the provider reported an error
    /// - [`LogtoError::SessionMismatch`] when the callback does not match
    /// - [`LogtoError::Token`] when the code exchange fails
    /// - [`LogtoError::JwtVerification`] when the ID token is missing or invalid
    pub async fn handle_sign_in_callback(&self, callback_url: &str) -> Result<Option<String>> {
        let storage = self.storage.as_ref();
        let session = SignInSession::load(storage)?.ok_or(LogtoError::SessionNotFound)?;

        let outcome = self.complete_sign_in(&session, callback_url).await;
        let cleared = SignInSession::clear(storage);

        if let Err(e) = outcome {
            tracing::warn!("Sign-in callback rejected: {}", e);
            return Err(e);
        }
        cleared?;

        tracing::info!("Sign-in completed");
        if let Some(uri) = &session.post_redirect_uri {
            (self.navigate)(uri);
        }
        Ok(session.post_redirect_uri)
    }

    async fn complete_sign_in(&self, session: &SignInSession, callback_url: &str) -> Result<()> {
        let code = session.validate_callback(callback_url)?;

        let response = self
            .core
            .fetch_token_by_authorization_code(&AuthorizationCodeGrant {
                client_id: self.config.app_id(),
                client_secret: self.config.app_secret(),
                redirect_uri: &session.redirect_uri,
                code_verifier: &session.code_verifier,
                code: &code,
                resource: None,
            })
            .await?;

        let id_token = response
            .id_token
            .as_deref()
            .ok_or(JwtError::MissingIdToken)?;
        self.verifier.verify_jwt(id_token).await?;

        self.tokens()
            .save_token_response(&build_access_token_key(None, None), &response)
    }

    /// Sign out
    ///
    /// Revokes the refresh token if there is one, clears every stored token,
    /// and navigates to the end-session URI. A failed revocation is logged
    /// and reported in the result but never keeps tokens around.
    pub async fn sign_out(&self, post_logout_redirect_uri: Option<&str>) -> Result<SignOutResult> {
        let tokens = self.tokens();

        let revocation_error = match tokens.refresh_token()? {
            Some(refresh_token) => match self
                .core
                .revoke_token(
                    self.config.app_id(),
                    self.config.app_secret(),
                    &refresh_token,
                )
                .await
            {
                Ok(()) => None,
                Err(e) => {
                    tracing::warn!("Failed to revoke refresh token: {}", e);
                    Some(e)
                }
            },
            None => None,
        };

        tokens.clear()?;

        let sign_out_uri = self
            .core
            .generate_sign_out_uri(self.config.app_id(), post_logout_redirect_uri)?;

        tracing::info!("Signed out");
        (self.navigate)(&sign_out_uri);

        Ok(SignOutResult {
            sign_out_uri,
            revocation_error,
        })
    }

    /// Verify an ID token against the provider's signing keys.
    pub async fn verify_jwt(&self, token: &str) -> Result<IdTokenClaims> {
        self.verifier.verify_jwt(token).await
    }

    /// Raw stored ID token.
    pub fn id_token(&self) -> Result<Option<String>> {
        self.tokens().id_token()
    }

    /// Claims of the stored ID token, which was verified when received.
    pub fn id_token_claims(&self) -> Result<Option<IdTokenClaims>> {
        self.id_token()?
            .map(|token| decode_claims_unverified(&token))
            .transpose()
    }

    /// Raw stored refresh token.
    pub fn refresh_token(&self) -> Result<Option<String>> {
        self.tokens().refresh_token()
    }

    /// True when an ID token is stored.
    pub fn is_authenticated(&self) -> Result<bool> {
        Ok(self.id_token()?.is_some())
    }

    /// Remove the refresh token, the ID token and all access tokens.
    pub fn clear_all_tokens(&self) -> Result<()> {
        self.tokens().clear()
    }

    fn refresh_lock(&self, key: &str) -> Result<Arc<tokio::sync::Mutex<()>>> {
        let mut locks = self
            .refresh_locks
            .lock()
            .map_err(|_| LogtoError::Storage("refresh lock map poisoned".to_string()))?;
        Ok(Arc::clone(locks.entry(key.to_string()).or_default()))
    }

    /// Drops the key's lock from the map once no other caller holds it.
    fn release_refresh_lock(&self, key: &str, lock: Arc<tokio::sync::Mutex<()>>) {
        let Ok(mut locks) = self.refresh_locks.lock() else {
            return;
        };
        // One reference in the map, one here.
        if Arc::strong_count(&lock) <= 2 {
            locks.remove(key);
        }
    }

    #[cfg(test)]
    fn refresh_lock_count(&self) -> usize {
        self.refresh_locks.lock().map(|locks| locks.len()).unwrap_or(0)
    }

    /// Access token for a resource and/or organization
    ///
    /// A cached token that outlives now by more than the leeway is returned
    /// as is. Otherwise the entry is evicted and, when a refresh token is
    /// stored, a refresh grant scoped to `resource` and `organization_id`
    /// fetches a new one. Returns `Ok(None)` when there is nothing to
    /// refresh with.
    ///
    /// Concurrent calls for the same key share one refresh.
    ///
    /// # Errors
    ///
    /// Returns [`LogtoError::NotAuthenticated`] when no ID token is stored,
    /// or [`LogtoError::Token`] when the refresh grant fails.
    pub async fn access_token(
        &self,
        resource: Option<&str>,
        organization_id: Option<&str>,
    ) -> Result<Option<String>> {
        if !self.is_authenticated()? {
            return Err(LogtoError::NotAuthenticated);
        }

        let key = build_access_token_key(resource, organization_id);
        if let Some(token) = self.tokens().access_token(&key)? {
            if token.is_valid() {
                return Ok(Some(token.token));
            }
        }

        let lock = self.refresh_lock(&key)?;
        let outcome = {
            let _guard = lock.lock().await;
            self.refresh_access_token(&key, resource, organization_id)
                .await
        };
        self.release_refresh_lock(&key, lock);

        outcome
    }

    /// Evicts and refreshes one entry; callers hold the key's refresh lock.
    async fn refresh_access_token(
        &self,
        key: &str,
        resource: Option<&str>,
        organization_id: Option<&str>,
    ) -> Result<Option<String>> {
        let tokens = self.tokens();
        if let Some(token) = tokens.access_token(key)? {
            if token.is_valid() {
                return Ok(Some(token.token));
            }
        }
        tokens.remove_access_token(key)?;

        let Some(refresh_token) = tokens.refresh_token()? else {
            return Ok(None);
        };

        tracing::debug!("Refreshing access token for {}", key);
        let response = self
            .core
            .fetch_token_by_refresh_token(&RefreshTokenGrant {
                client_id: self.config.app_id(),
                client_secret: self.config.app_secret(),
                refresh_token: &refresh_token,
                resource,
                organization_id,
                scopes: &[],
            })
            .await?;

        if let Some(id_token) = &response.id_token {
            self.verifier.verify_jwt(id_token).await?;
        }
        tokens.save_token_response(key, &response)?;

        Ok(Some(response.access_token))
    }

    /// Unverified claims of the access token for a resource and/or organization.
    ///
    /// # Errors
    ///
    /// Returns [`LogtoError::InvalidArgument`] when both arguments are
    /// `None`; the opaque default token has no claims.
    pub async fn access_token_claims(
        &self,
        resource: Option<&str>,
        organization_id: Option<&str>,
    ) -> Result<Option<AccessTokenClaims>> {
        if resource.is_none() && organization_id.is_none() {
            return Err(LogtoError::InvalidArgument(
                "resource and organization_id cannot both be empty".to_string(),
            ));
        }

        self.access_token(resource, organization_id)
            .await?
            .map(|token| decode_claims_unverified(&token))
            .transpose()
    }

    /// Fetch the userinfo document with the default access token.
    ///
    /// # Errors
    ///
    /// Returns [`LogtoError::NotAuthenticated`] when no access token can be
    /// obtained, or [`LogtoError::UserInfo`] for non-2xx responses.
    pub async fn fetch_user_info(&self) -> Result<UserInfoResponse> {
        let token = self
            .access_token(None, None)
            .await?
            .ok_or(LogtoError::NotAuthenticated)?;
        self.core.fetch_user_info(&token).await
    }
}
