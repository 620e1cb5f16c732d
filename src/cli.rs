//! Command-line interface definition for the Logto client
//!
//! The CLI drives one sign-in session at a time: `sign-in` prints the
//! authorization URI, the user completes the flow in a browser, and
//! `callback` is given the URL the browser was redirected to.

use clap::{Parser, Subcommand, ValueEnum};

/// Logto OpenID Connect client
///
/// Sign in to a Logto tenant, inspect tokens and sign out.
#[derive(Parser, Debug, Clone)]
#[command(name = "logto")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "logto.yaml", env = "LOGTO_CONFIG")]
    pub config: String,

    /// Where tokens and the pending sign-in session are kept
    #[arg(long, value_enum, default_value_t = StorageBackend::Keyring)]
    pub storage: StorageBackend,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Session storage backends
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// System keyring
    Keyring,
    /// Local sled database in the cache directory
    Disk,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start a sign-in and print the authorization URI
    SignIn {
        /// Redirect URI registered for the application
        #[arg(short, long)]
        redirect_uri: String,

        /// Where to go after the callback has been handled
        #[arg(long)]
        post_redirect_uri: Option<String>,

        /// First screen of the sign-in experience (signIn, register, ...)
        #[arg(long)]
        first_screen: Option<String>,

        /// Prefill the identifier field
        #[arg(long)]
        login_hint: Option<String>,
    },

    /// Complete a sign-in with the URL the browser was redirected to
    Callback {
        /// Full callback URL including the query string
        url: String,
    },

    /// Show whether a user is signed in and the ID token claims
    Status,

    /// Print an access token, refreshing it if needed
    AccessToken {
        /// API resource indicator
        #[arg(short, long)]
        resource: Option<String>,

        /// Organization ID for an organization token
        #[arg(short, long)]
        organization_id: Option<String>,
    },

    /// Fetch and print the userinfo document
    UserInfo,

    /// Revoke the refresh token, clear local tokens and print the end-session URI
    SignOut {
        /// Where the provider redirects after signing out
        #[arg(long)]
        post_logout_redirect_uri: Option<String>,
    },
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
