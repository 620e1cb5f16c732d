//! Error types for the Logto client
//!
//! This module defines every error the client can surface, using `thiserror`
//! for ergonomic error handling. Each protocol failure has its own variant so
//! that callers can react to, for example, a callback state mismatch without
//! string matching.

use thiserror::Error;

/// Reason a sign-in callback did not match the pending sign-in session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMismatchKind {
    /// The callback URL does not start with the stored redirect URI.
    RedirectUri,
    /// The callback URL carries no `state` parameter.
    MissingState,
    /// The callback `state` differs from the stored one.
    StateMismatch,
    /// The callback URL carries no `code` parameter.
    MissingCode,
}

impl std::fmt::Display for SessionMismatchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::RedirectUri => "redirect URI mismatch",
            Self::MissingState => "no state in the callback URI",
            Self::StateMismatch => "state mismatch",
            Self::MissingCode => "no code in the callback URI",
        };
        f.write_str(text)
    }
}

/// Main error type for Logto client operations
///
/// This enum encompasses all possible errors that can occur during
/// configuration, discovery, the sign-in round trip, token grants,
/// ID token verification and storage access.
#[derive(Error, Debug)]
pub enum LogtoError {
    /// Configuration-related errors, including malformed sign-in parameters
    #[error("Configuration error: {0}")]
    Config(String),

    /// A caller supplied an argument combination the operation rejects
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The discovery document could not be fetched or parsed
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// No pending sign-in session exists for the callback
    #[error("Sign-in session not found")]
    SessionNotFound,

    /// The callback does not belong to the pending sign-in session
    #[error("Sign-in session mismatch: {0}")]
    SessionMismatch(SessionMismatchKind),

    /// The identity provider redirected back with an `error` parameter
    #[error("Server returned an error in the callback: {error}{}", describe(.description))]
    ServerCallback {
        /// The `error` query parameter
        error: String,
        /// The `error_description` query parameter, if present
        description: Option<String>,
    },

    /// The token endpoint answered with a non-success status
    #[error("Token error: status={status}, {body}")]
    Token {
        /// HTTP status code
        status: u16,
        /// Raw response body
        body: String,
    },

    /// The revocation endpoint answered with a non-success status
    #[error("Revocation error: status={status}, {body}")]
    Revocation {
        /// HTTP status code
        status: u16,
        /// Raw response body
        body: String,
    },

    /// The userinfo endpoint answered with a non-success status
    #[error("User info error: status={status}, {body}")]
    UserInfo {
        /// HTTP status code
        status: u16,
        /// Raw response body
        body: String,
    },

    /// The operation requires a signed-in user
    #[error("Not authenticated")]
    NotAuthenticated,

    /// ID token verification failed
    #[error("JWT verification error: {0}")]
    JwtVerification(#[from] JwtError),

    /// The HTTP transport failed before a response was received
    #[error("Transport error: {0}")]
    Transport(String),

    /// A storage or cache adapter failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing errors
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

fn describe(description: &Option<String>) -> String {
    description
        .as_deref()
        .map(|d| format!(" ({d})"))
        .unwrap_or_default()
}

/// Failure modes of ID token verification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtError {
    /// The token header or payload is not well formed
    #[error("malformed token: {0}")]
    Malformed(String),

    /// The header names an algorithm outside the accepted set
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// No signing key matches the token's key id
    #[error("signing key not found: {0}")]
    KeyNotFound(String),

    /// The signature does not verify against the selected key
    #[error("invalid signature")]
    InvalidSignature,

    /// `iss` differs from the provider issuer
    #[error("invalid issuer")]
    InvalidIssuer,

    /// `aud` does not contain the application id
    #[error("invalid audience")]
    InvalidAudience,

    /// `exp` is in the past
    #[error("token expired")]
    Expired,

    /// The JWKS document could not be fetched or parsed
    #[error("failed to load signing keys: {0}")]
    KeySetUnavailable(String),

    /// The token endpoint did not return an ID token
    #[error("missing ID token in token response")]
    MissingIdToken,
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(error: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match error.kind() {
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            ErrorKind::InvalidIssuer => Self::InvalidIssuer,
            ErrorKind::InvalidAudience => Self::InvalidAudience,
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                Self::UnsupportedAlgorithm(error.to_string())
            }
            _ => Self::Malformed(error.to_string()),
        }
    }
}

impl From<keyring::Error> for LogtoError {
    fn from(error: keyring::Error) -> Self {
        Self::Storage(format!("keyring: {error}"))
    }
}

/// Result type alias for Logto client operations
pub type Result<T> = std::result::Result<T, LogtoError>;
