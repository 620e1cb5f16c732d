//! HTTP transport abstraction
//!
//! The protocol core never talks to the network directly. Every request goes
//! through a [`Transport`], which makes the client testable and lets hosts
//! plug in their own HTTP stack.
//!
//! The default implementation, [`http::ReqwestTransport`], is backed by
//! `reqwest`.

pub mod http;

pub use http::ReqwestTransport;

use crate::error::Result;

/// Status and body of an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body as text.
    pub body: String,
}

impl HttpResponse {
    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Minimal HTTP surface needed by the OIDC protocol.
///
/// Implementations must be cheap to share behind an `Arc` and must enforce
/// their own timeouts.
///
/// # Errors
///
/// Methods return [`crate::error::LogtoError::Transport`] only when no
/// response was obtained. Non-2xx responses are returned as values and
/// interpreted by the caller.
#[async_trait::async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Issue a GET request, optionally with `Authorization: Bearer <token>`.
    async fn get(&self, url: &str, bearer_token: Option<&str>) -> Result<HttpResponse>;

    /// Issue a POST with an `application/x-www-form-urlencoded` body.
    async fn post_form(&self, url: &str, form: &[(String, String)]) -> Result<HttpResponse>;
}
