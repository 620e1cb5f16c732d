//! OIDC protocol core
//!
//! [`LogtoCore`] holds the provider metadata and a transport, and knows how
//! to build the authorization and end-session URIs and how to talk to the
//! token, revocation and userinfo endpoints. It is stateless beyond that:
//! sessions and tokens are the client's business.
//!
//! # Authorization URI layout
//!
//! Query parameters are emitted in a fixed order so the URI is
//! deterministic for a given input:
//!
//! 1. `client_id`, `redirect_uri`, `code_challenge`,
//!    `code_challenge_method=S256`, `state`, `response_type=code`
//! 2. `prompt` (space-joined, `consent` when empty)
//! 3. `scope` (space-joined, reserved scopes merged when enabled)
//! 4. `login_hint`, `direct_sign_in`
//! 5. one `resource` per resource
//! 6. `first_screen`, or `interaction_mode` when no first screen is given
//! 7. `identifier`
//! 8. extra parameters: an existing key is replaced in place, a new key is
//!    appended

pub mod discovery;
pub mod pkce;
pub mod types;

pub use discovery::ProviderMetadata;
pub use types::{
    decode_claims_unverified, AccessTokenClaims, Audience, IdTokenClaims, TokenResponse,
    UserInfoResponse,
};

use std::sync::Arc;

use url::Url;

use crate::config::{with_reserved_scopes, Prompt};
use crate::error::{LogtoError, Result};
use crate::storage::Storage;
use crate::transport::Transport;

// ---------------------------------------------------------------------------
// Request parameters
// ---------------------------------------------------------------------------

/// Skip the sign-in page and go straight to a connector or method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectSignIn {
    /// Sign-in method, e.g. `social` or `sso`.
    pub method: String,
    /// Target of the method, e.g. a connector id.
    pub target: String,
}

impl DirectSignIn {
    /// Creates a direct sign-in target.
    pub fn new(method: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            target: target.into(),
        }
    }

    fn to_param(&self) -> String {
        format!("{}:{}", self.method, self.target)
    }
}

/// Inputs of [`LogtoCore::generate_sign_in_uri`].
#[derive(Debug, Clone, Default)]
pub struct SignInUriParams<'a> {
    pub client_id: &'a str,
    pub redirect_uri: &'a str,
    pub code_challenge: &'a str,
    pub state: &'a str,
    /// `None` omits the `scope` parameter unless reserved scopes are merged.
    pub scopes: Option<&'a [String]>,
    pub resources: &'a [String],
    pub prompt: &'a [Prompt],
    pub first_screen: Option<&'a str>,
    pub interaction_mode: Option<&'a str>,
    pub login_hint: Option<&'a str>,
    pub direct_sign_in: Option<&'a DirectSignIn>,
    pub identifiers: &'a [String],
    pub extra_params: &'a [(String, String)],
    pub include_reserved_scopes: bool,
}

/// Inputs of [`LogtoCore::fetch_token_by_authorization_code`].
#[derive(Debug, Clone)]
pub struct AuthorizationCodeGrant<'a> {
    pub client_id: &'a str,
    pub client_secret: &'a str,
    pub redirect_uri: &'a str,
    pub code_verifier: &'a str,
    pub code: &'a str,
    pub resource: Option<&'a str>,
}

/// Inputs of [`LogtoCore::fetch_token_by_refresh_token`].
#[derive(Debug, Clone)]
pub struct RefreshTokenGrant<'a> {
    pub client_id: &'a str,
    pub client_secret: &'a str,
    pub refresh_token: &'a str,
    pub resource: Option<&'a str>,
    pub organization_id: Option<&'a str>,
    pub scopes: &'a [String],
}

fn pair(key: &str, value: impl Into<String>) -> (String, String) {
    (key.to_string(), value.into())
}

// ---------------------------------------------------------------------------
// LogtoCore
// ---------------------------------------------------------------------------

/// Stateless protocol operations against one Logto tenant.
#[derive(Debug, Clone)]
pub struct LogtoCore {
    transport: Arc<dyn Transport>,
    metadata: ProviderMetadata,
}

impl LogtoCore {
    /// Creates a core from already-resolved metadata.
    pub fn new(transport: Arc<dyn Transport>, metadata: ProviderMetadata) -> Self {
        Self {
            transport,
            metadata,
        }
    }

    /// Resolves the metadata through discovery, then creates the core.
    ///
    /// # Errors
    ///
    /// See [`discovery::fetch_provider_metadata`].
    pub async fn discover(
        transport: Arc<dyn Transport>,
        discovery_url: &str,
        cache: Option<&dyn Storage>,
    ) -> Result<Self> {
        let metadata =
            discovery::fetch_provider_metadata(transport.as_ref(), discovery_url, cache).await?;
        Ok(Self::new(transport, metadata))
    }

    /// Provider metadata in use.
    pub fn metadata(&self) -> &ProviderMetadata {
        &self.metadata
    }

    /// Transport in use.
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Builds the authorization request URI
    ///
    /// # Errors
    ///
    /// Returns [`LogtoError::Config`] if any parameter key is empty, and
    /// [`LogtoError::InvalidUrl`] if the authorization endpoint is not a URL.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::collections::HashMap;
    /// use std::sync::Arc;
    /// use std::time::Duration;
    /// use logto::core::{LogtoCore, ProviderMetadata, SignInUriParams};
    /// use logto::transport::ReqwestTransport;
    ///
    /// let metadata = ProviderMetadata {
    ///     issuer: "https://example.com/oidc".into(),
    ///     authorization_endpoint: "https://example.com/oidc/auth".into(),
    ///     token_endpoint: "https://example.com/oidc/token".into(),
    ///     userinfo_endpoint: "https://example.com/oidc/me".into(),
    ///     end_session_endpoint: "https://example.com/oidc/session/end".into(),
    ///     revocation_endpoint: "https://example.com/oidc/token/revocation".into(),
    ///     jwks_uri: "https://example.com/oidc/jwks".into(),
    ///     extra: HashMap::new(),
    /// };
    /// let transport = Arc::new(ReqwestTransport::new(Duration::from_secs(5)).unwrap());
    /// let core = LogtoCore::new(transport, metadata);
    ///
    /// let uri = core
    ///     .generate_sign_in_uri(&SignInUriParams {
    ///         client_id: "client_id",
    ///         redirect_uri: "https://example.com/callback",
    ///         code_challenge: "code_challenge",
    ///         state: "state",
    ///         include_reserved_scopes: true,
    ///         ..Default::default()
    ///     })
    ///     .unwrap();
    /// assert!(uri.ends_with("&prompt=consent&scope=openid+offline_access+profile"));
    /// ```
    pub fn generate_sign_in_uri(&self, params: &SignInUriParams<'_>) -> Result<String> {
        let mut query: Vec<(String, String)> = vec![
            pair("client_id", params.client_id),
            pair("redirect_uri", params.redirect_uri),
            pair("code_challenge", params.code_challenge),
            pair("code_challenge_method", pkce::CODE_CHALLENGE_METHOD),
            pair("state", params.state),
            pair("response_type", "code"),
        ];

        let prompt = if params.prompt.is_empty() {
            Prompt::Consent.as_str().to_string()
        } else {
            params
                .prompt
                .iter()
                .map(Prompt::as_str)
                .collect::<Vec<_>>()
                .join(" ")
        };
        query.push(pair("prompt", prompt));

        let scopes = if params.include_reserved_scopes {
            Some(with_reserved_scopes(params.scopes.unwrap_or(&[])))
        } else {
            params.scopes.map(<[String]>::to_vec)
        };
        if let Some(scopes) = scopes {
            query.push(pair("scope", scopes.join(" ")));
        }

        if let Some(login_hint) = params.login_hint {
            query.push(pair("login_hint", login_hint));
        }

        if let Some(direct_sign_in) = params.direct_sign_in {
            query.push(pair("direct_sign_in", direct_sign_in.to_param()));
        }

        for resource in params.resources {
            query.push(pair("resource", resource.as_str()));
        }

        if let Some(first_screen) = params.first_screen {
            query.push(pair("first_screen", first_screen));
        } else if let Some(interaction_mode) = params.interaction_mode {
            query.push(pair("interaction_mode", interaction_mode));
        }

        if !params.identifiers.is_empty() {
            query.push(pair("identifier", params.identifiers.join(" ")));
        }

        // An override replaces every occurrence of its key, in place of the first.
        for (key, value) in params.extra_params {
            match query.iter().position(|(k, _)| k == key) {
                Some(first) => {
                    query[first].1 = value.clone();
                    let mut index = 0;
                    query.retain(|(k, _)| {
                        let keep = index <= first || k != key;
                        index += 1;
                        keep
                    });
                }
                None => query.push((key.clone(), value.clone())),
            }
        }

        if query.iter().any(|(key, _)| key.is_empty()) {
            return Err(LogtoError::Config(
                "sign-in parameters contain an empty key".to_string(),
            ));
        }

        with_query(&self.metadata.authorization_endpoint, &query)
    }

    /// Builds the end-session URI.
    pub fn generate_sign_out_uri(
        &self,
        client_id: &str,
        post_logout_redirect_uri: Option<&str>,
    ) -> Result<String> {
        let mut query = vec![pair("client_id", client_id)];
        if let Some(uri) = post_logout_redirect_uri {
            query.push(pair("post_logout_redirect_uri", uri));
        }

        with_query(&self.metadata.end_session_endpoint, &query)
    }

    /// Exchanges an authorization code for tokens.
    ///
    /// # Errors
    ///
    /// Returns [`LogtoError::Token`] with the raw status and body when the
    /// endpoint answers with a non-2xx status.
    pub async fn fetch_token_by_authorization_code(
        &self,
        grant: &AuthorizationCodeGrant<'_>,
    ) -> Result<TokenResponse> {
        let mut form = vec![
            pair("client_id", grant.client_id),
            pair("client_secret", grant.client_secret),
            pair("code", grant.code),
            pair("code_verifier", grant.code_verifier),
            pair("redirect_uri", grant.redirect_uri),
            pair("grant_type", "authorization_code"),
        ];
        if let Some(resource) = grant.resource {
            form.push(pair("resource", resource));
        }

        self.post_token(&form).await
    }

    /// Uses a refresh token to obtain a new access token
    ///
    /// `resource` and `organization_id` narrow the audience of the issued
    /// access token; `scopes`, when non-empty, narrows its scope.
    ///
    /// # Errors
    ///
    /// Returns [`LogtoError::Token`] for non-2xx responses.
    pub async fn fetch_token_by_refresh_token(
        &self,
        grant: &RefreshTokenGrant<'_>,
    ) -> Result<TokenResponse> {
        let mut form = vec![
            pair("client_id", grant.client_id),
            pair("client_secret", grant.client_secret),
            pair("refresh_token", grant.refresh_token),
            pair("grant_type", "refresh_token"),
        ];
        if let Some(resource) = grant.resource {
            form.push(pair("resource", resource));
        }
        if let Some(organization_id) = grant.organization_id {
            form.push(pair("organization_id", organization_id));
        }
        if !grant.scopes.is_empty() {
            form.push(pair("scope", grant.scopes.join(" ")));
        }

        self.post_token(&form).await
    }

    async fn post_token(&self, form: &[(String, String)]) -> Result<TokenResponse> {
        let resp = self
            .transport
            .post_form(&self.metadata.token_endpoint, form)
            .await?;

        if !resp.is_success() {
            return Err(LogtoError::Token {
                status: resp.status,
                body: resp.body,
            });
        }

        Ok(serde_json::from_str(&resp.body)?)
    }

    /// Revokes a token (normally the refresh token).
    ///
    /// # Errors
    ///
    /// Returns [`LogtoError::Revocation`] for non-2xx responses.
    pub async fn revoke_token(
        &self,
        client_id: &str,
        client_secret: &str,
        token: &str,
    ) -> Result<()> {
        let form = vec![
            pair("token", token),
            pair("client_id", client_id),
            pair("client_secret", client_secret),
        ];

        let resp = self
            .transport
            .post_form(&self.metadata.revocation_endpoint, &form)
            .await?;

        if !resp.is_success() {
            return Err(LogtoError::Revocation {
                status: resp.status,
                body: resp.body,
            });
        }

        Ok(())
    }

    /// Fetches the userinfo document with a bearer access token.
    ///
    /// # Errors
    ///
    /// Returns [`LogtoError::UserInfo`] for non-2xx responses.
    pub async fn fetch_user_info(&self, access_token: &str) -> Result<UserInfoResponse> {
        let resp = self
            .transport
            .get(&self.metadata.userinfo_endpoint, Some(access_token))
            .await?;

        if !resp.is_success() {
            return Err(LogtoError::UserInfo {
                status: resp.status,
                body: resp.body,
            });
        }

        Ok(serde_json::from_str(&resp.body)?)
    }
}

fn with_query(endpoint: &str, query: &[(String, String)]) -> Result<String> {
    let mut url = Url::parse(endpoint)?;
    url.set_query(None);
    url.query_pairs_mut().extend_pairs(query);
    Ok(url.to_string())
}
