//! Logto - OpenID Connect client library
//!
//! This library implements the client side of Logto's OIDC flows for
//! traditional web applications: authorization code with PKCE, token
//! refresh per resource and organization, ID token verification, userinfo
//! and sign-out.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `client`: [`LogtoClient`], sessions, token persistence and JWT verification
//! - `core`: stateless protocol operations against the provider endpoints
//! - `storage`: key-value storage trait with memory, keyring and sled backends
//! - `transport`: HTTP abstraction used by `core` and `client`
//! - `config`: settings loading and validation
//! - `error`: Error types and result aliases
//! - `cli` and `commands`: the `logto` binary
//!
//! # Example
//!
//! ```no_run
//! use logto::{ClientSettings, LogtoClient, SignInOptions};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ClientSettings::load("logto.yaml")?.into_config()?;
//!     let client = LogtoClient::builder(config).build().await?;
//!
//!     let uri = client
//!         .sign_in(SignInOptions::new("http://localhost:3000/callback"))
//!         .await?;
//!     println!("{uri}");
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod client;
pub mod commands;
pub mod config;
pub mod core;
pub mod error;
pub mod storage;
pub mod transport;

// Re-export commonly used types
pub use client::{LogtoClient, SignInOptions, SignOutResult};
pub use config::{ClientSettings, LogtoConfig, Prompt, UserScope};
pub use error::{JwtError, LogtoError, Result};
pub use storage::{MemoryStorage, Storage};
