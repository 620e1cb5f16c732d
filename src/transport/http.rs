//! `reqwest`-backed [`Transport`]

use std::time::Duration;

use crate::error::{LogtoError, Result};
use crate::transport::{HttpResponse, Transport};

/// Default transport built on a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    /// Creates a transport whose requests time out after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`LogtoError::Transport`] if the TLS backend cannot be
    /// initialized.
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("logto-rust/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LogtoError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http })
    }

    /// Wraps an existing client, keeping its configuration.
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    async fn read(resp: reqwest::Response) -> Result<HttpResponse> {
        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| LogtoError::Transport(format!("failed to read response body: {e}")))?;
        Ok(HttpResponse { status, body })
    }
}

#[async_trait::async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &str, bearer_token: Option<&str>) -> Result<HttpResponse> {
        let mut request = self.http.get(url);
        if let Some(token) = bearer_token {
            request = request.bearer_auth(token);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| LogtoError::Transport(format!("GET {url} failed: {e}")))?;

        Self::read(resp).await
    }

    async fn post_form(&self, url: &str, form: &[(String, String)]) -> Result<HttpResponse> {
        let resp = self
            .http
            .post(url)
            .form(form)
            .send()
            .await
            .map_err(|e| LogtoError::Transport(format!("POST {url} failed: {e}")))?;

        Self::read(resp).await
    }
}
