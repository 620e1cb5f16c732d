//! Configuration management for the Logto client
//!
//! [`ClientSettings`] is the loadable, serde-friendly form: it can be read
//! from a YAML file and overridden by `LOGTO_*` environment variables.
//! [`ClientSettings::into_config`] validates it and produces the immutable
//! [`LogtoConfig`] the client runs with.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{LogtoError, Result};

// ---------------------------------------------------------------------------
// Reserved values
// ---------------------------------------------------------------------------

/// Scopes that are always requested unless explicitly disabled.
pub const RESERVED_SCOPES: [&str; 3] = ["openid", "offline_access", "profile"];

/// Scopes understood by the ID token and the userinfo endpoint.
pub struct UserScope;

impl UserScope {
    /// Basic user info.
    pub const PROFILE: &'static str = "profile";
    /// Email address.
    pub const EMAIL: &'static str = "email";
    /// Phone number.
    pub const PHONE: &'static str = "phone";
    /// Custom data attached to the user.
    pub const CUSTOM_DATA: &'static str = "custom_data";
    /// Social identity details.
    pub const IDENTITIES: &'static str = "identities";
    /// API resource roles.
    pub const ROLES: &'static str = "roles";
    /// Organization ids; also enables organization token grants.
    pub const ORGANIZATIONS: &'static str = "urn:logto:scope:organizations";
    /// Organization roles, formatted as `<organization id>:<role>`.
    pub const ORGANIZATION_ROLES: &'static str = "urn:logto:scope:organization_roles";
}

/// Resource indicator of the organization template.
pub const ORGANIZATION_RESOURCE: &str = "urn:logto:resource:organizations";

/// Values accepted by the `prompt` authorization parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Prompt {
    /// Force the sign-in page.
    Login,
    /// Never show any interaction.
    None,
    /// Show the consent page.
    Consent,
    /// Let the user pick an account.
    SelectAccount,
}

impl Prompt {
    /// Wire value of the prompt.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::None => "none",
            Self::Consent => "consent",
            Self::SelectAccount => "select_account",
        }
    }
}

impl std::fmt::Display for Prompt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Appends the reserved scopes to `scopes`, dropping duplicates while
/// keeping first-seen order.
///
/// # Examples
///
/// ```
/// use logto::config::with_reserved_scopes;
///
/// let scopes = with_reserved_scopes(&["email".to_string(), "openid".to_string()]);
/// assert_eq!(scopes, vec!["email", "openid", "offline_access", "profile"]);
/// ```
pub fn with_reserved_scopes(scopes: &[String]) -> Vec<String> {
    let merged = scopes
        .iter()
        .cloned()
        .chain(RESERVED_SCOPES.iter().map(|s| s.to_string()));
    dedup(merged)
}

fn dedup(values: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::new();
    for value in values {
        if !unique.contains(&value) {
            unique.push(value);
        }
    }
    unique
}

// ---------------------------------------------------------------------------
// ClientSettings
// ---------------------------------------------------------------------------

/// Prompt as written in a settings file: a single value or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PromptSetting {
    /// `prompt: login`
    One(Prompt),
    /// `prompt: [login, consent]`
    Many(Vec<Prompt>),
}

impl PromptSetting {
    fn into_list(self) -> Vec<Prompt> {
        match self {
            Self::One(prompt) => vec![prompt],
            Self::Many(prompts) => prompts,
        }
    }
}

/// Unvalidated client settings
///
/// Field names match the YAML layout:
///
/// ```yaml
/// endpoint: https://tenant.logto.app
/// app_id: my-app
/// app_secret: secret
/// scopes: [email]
/// resources: [https://api.example.com]
/// prompt: consent
/// include_reserved_scopes: true
/// timeout_seconds: 30
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSettings {
    /// Logto tenant endpoint, e.g. `https://tenant.logto.app`
    #[serde(default)]
    pub endpoint: String,

    /// Application (client) id
    #[serde(default)]
    pub app_id: String,

    /// Application secret
    #[serde(default)]
    pub app_secret: String,

    /// Extra scopes to request
    #[serde(default)]
    pub scopes: Vec<String>,

    /// API resources to request access to
    #[serde(default)]
    pub resources: Vec<String>,

    /// Authorization prompt; defaults to `consent`
    #[serde(default)]
    pub prompt: Option<PromptSetting>,

    /// Whether to merge `openid`, `offline_access` and `profile` into the scopes
    #[serde(default = "default_include_reserved_scopes")]
    pub include_reserved_scopes: bool,

    /// Timeout applied by the default HTTP transport
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_include_reserved_scopes() -> bool {
    true
}

fn default_timeout_seconds() -> u64 {
    30
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            app_id: String::new(),
            app_secret: String::new(),
            scopes: Vec::new(),
            resources: Vec::new(),
            prompt: None,
            include_reserved_scopes: default_include_reserved_scopes(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl ClientSettings {
    /// Creates settings with the three required values and defaults for
    /// everything else.
    pub fn new(
        endpoint: impl Into<String>,
        app_id: impl Into<String>,
        app_secret: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            app_id: app_id.into(),
            app_secret: app_secret.into(),
            ..Self::default()
        }
    }

    /// Load settings from a YAML file, then apply environment overrides
    ///
    /// A missing file is not an error: defaults are used and the
    /// environment is expected to provide the required values.
    ///
    /// # Errors
    ///
    /// Returns [`LogtoError::Config`] if the file exists but cannot be read
    /// or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut settings = if path.exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!(
                "Settings file not found at {}, using defaults",
                path.display()
            );
            Self::default()
        };

        settings.apply_env_vars();

        Ok(settings)
    }

    /// Parse settings from a YAML string.
    pub fn from_yaml(contents: &str) -> Result<Self> {
        serde_yaml::from_str(contents)
            .map_err(|e| LogtoError::Config(format!("Failed to parse settings: {}", e)))
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| LogtoError::Config(format!("Failed to read settings file: {}", e)))?;
        Self::from_yaml(&contents)
    }

    fn apply_env_vars(&mut self) {
        if let Ok(endpoint) = std::env::var("LOGTO_ENDPOINT") {
            self.endpoint = endpoint;
        }

        if let Ok(app_id) = std::env::var("LOGTO_APP_ID") {
            self.app_id = app_id;
        }

        if let Ok(app_secret) = std::env::var("LOGTO_APP_SECRET") {
            self.app_secret = app_secret;
        }

        if let Ok(scopes) = std::env::var("LOGTO_SCOPES") {
            self.scopes = split_list(&scopes);
        }

        if let Ok(resources) = std::env::var("LOGTO_RESOURCES") {
            self.resources = split_list(&resources);
        }

        if let Ok(timeout) = std::env::var("LOGTO_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse() {
                self.timeout_seconds = value;
            } else {
                tracing::warn!("Invalid LOGTO_TIMEOUT_SECONDS: {}", timeout);
            }
        }
    }

    /// Validate the settings and build the immutable [`LogtoConfig`]
    ///
    /// Reserved scopes are merged unless `include_reserved_scopes` is
    /// false, and the organization resource is prepended when the
    /// organizations scope is requested.
    ///
    /// # Errors
    ///
    /// Returns [`LogtoError::Config`] when the endpoint is empty or not an
    /// absolute URL, the app id is empty, or the timeout is zero.
    pub fn into_config(self) -> Result<LogtoConfig> {
        if self.endpoint.trim().is_empty() {
            return Err(LogtoError::Config("endpoint cannot be empty".to_string()));
        }

        let endpoint = Url::parse(&self.endpoint)
            .map_err(|e| LogtoError::Config(format!("Invalid endpoint {}: {}", self.endpoint, e)))?;

        if self.app_id.trim().is_empty() {
            return Err(LogtoError::Config("app_id cannot be empty".to_string()));
        }

        if self.timeout_seconds == 0 {
            return Err(LogtoError::Config(
                "timeout_seconds must be greater than 0".to_string(),
            ));
        }

        let scopes = if self.include_reserved_scopes {
            with_reserved_scopes(&self.scopes)
        } else {
            dedup(self.scopes)
        };

        let resources = if scopes.iter().any(|s| s == UserScope::ORGANIZATIONS) {
            dedup(std::iter::once(ORGANIZATION_RESOURCE.to_string()).chain(self.resources))
        } else {
            dedup(self.resources)
        };

        let prompt = match self.prompt.map(PromptSetting::into_list) {
            Some(list) if !list.is_empty() => list,
            _ => vec![Prompt::Consent],
        };

        Ok(LogtoConfig {
            endpoint,
            app_id: self.app_id,
            app_secret: self.app_secret,
            scopes,
            resources,
            prompt,
            include_reserved_scopes: self.include_reserved_scopes,
            timeout: Duration::from_secs(self.timeout_seconds),
        })
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

// ---------------------------------------------------------------------------
// LogtoConfig
// ---------------------------------------------------------------------------

/// Validated, immutable client configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogtoConfig {
    endpoint: Url,
    app_id: String,
    app_secret: String,
    scopes: Vec<String>,
    resources: Vec<String>,
    prompt: Vec<Prompt>,
    include_reserved_scopes: bool,
    timeout: Duration,
}

impl LogtoConfig {
    /// Tenant endpoint.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Application id, also the expected ID token audience.
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Application secret.
    pub fn app_secret(&self) -> &str {
        &self.app_secret
    }

    /// Effective scopes, reserved scopes included when enabled.
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// Effective resources.
    pub fn resources(&self) -> &[String] {
        &self.resources
    }

    /// Prompt values, never empty.
    pub fn prompt(&self) -> &[Prompt] {
        &self.prompt
    }

    /// Whether reserved scopes are merged into authorization requests.
    pub fn include_reserved_scopes(&self) -> bool {
        self.include_reserved_scopes
    }

    /// HTTP timeout for the default transport.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Discovery document URL, resolved against the endpoint's origin.
    pub fn discovery_url(&self) -> Result<Url> {
        Ok(self.endpoint.join(crate::core::discovery::DISCOVERY_PATH)?)
    }
}
