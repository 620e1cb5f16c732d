//! Command handlers for the `logto` binary
//!
//! Each handler takes a built [`LogtoClient`] and prints its outcome to
//! stdout. Tokens and the pending sign-in session persist between
//! invocations through the selected storage backend.

use std::sync::Arc;

use colored::Colorize;

use crate::cli::StorageBackend;
use crate::client::{LogtoClient, SignInOptions};
use crate::config::{ClientSettings, LogtoConfig};
use crate::error::Result;
use crate::storage::{KeyringStorage, ScopedStorage, SledStorage, Storage};

/// Build a client for the CLI
///
/// The discovery document and signing keys are cached in the sled
/// database; session data goes to `backend`. The navigation callback
/// prints the URI, since a terminal cannot redirect a browser.
pub async fn build_client(config: LogtoConfig, backend: StorageBackend) -> Result<LogtoClient> {
    let db = SledStorage::open_default()?;
    let cache = ScopedStorage::for_cache(db.clone(), config.app_id());

    let storage: Arc<dyn Storage> = match backend {
        StorageBackend::Keyring => Arc::new(KeyringStorage::new(config.app_id())),
        StorageBackend::Disk => Arc::new(ScopedStorage::for_session(db, Some(config.app_id()))),
    };

    LogtoClient::builder(config)
        .storage(storage)
        .cache(Arc::new(cache))
        .navigate(Arc::new(|uri: &str| {
            println!("{} {}", "Open:".bold(), uri);
        }))
        .build()
        .await
}

/// Load settings from `path` and the environment and validate them.
pub fn load_config(path: &str) -> Result<LogtoConfig> {
    ClientSettings::load(path)?.into_config()
}

/// Start a sign-in; the client prints the authorization URI.
pub async fn sign_in(client: &LogtoClient, options: SignInOptions) -> Result<()> {
    client.sign_in(options).await?;
    println!(
        "{}",
        "Complete the sign-in in a browser, then run `logto callback <url>`.".yellow()
    );
    Ok(())
}

/// Handle the callback URL from the browser.
pub async fn callback(client: &LogtoClient, url: &str) -> Result<()> {
    client.handle_sign_in_callback(url).await?;
    println!("{}", "Signed in.".green());
    Ok(())
}

/// Print the authentication status and ID token claims.
pub fn status(client: &LogtoClient) -> Result<()> {
    match client.id_token_claims()? {
        Some(claims) => {
            println!("{} {}", "Signed in as".green(), claims.sub.bold());
            if let Some(name) = claims.name.as_deref().or(claims.username.as_deref()) {
                println!("  {:<10} {}", "name", name);
            }
            if let Some(email) = &claims.email {
                println!("  {:<10} {}", "email", email);
            }
            if let Some(organizations) = &claims.organizations {
                println!("  {:<10} {}", "orgs", organizations.join(", "));
            }
            let refresh = if client.refresh_token()?.is_some() {
                "yes".green()
            } else {
                "no".red()
            };
            println!("  {:<10} {}", "refresh", refresh);
        }
        None => println!("{}", "Not signed in.".yellow()),
    }
    Ok(())
}

/// Print an access token for a resource and/or organization.
pub async fn access_token(
    client: &LogtoClient,
    resource: Option<&str>,
    organization_id: Option<&str>,
) -> Result<()> {
    match client.access_token(resource, organization_id).await? {
        Some(token) => println!("{}", token),
        None => println!("{}", "No access token available; sign in again.".yellow()),
    }
    Ok(())
}

/// Print the userinfo document as pretty JSON.
pub async fn user_info(client: &LogtoClient) -> Result<()> {
    let info = client.fetch_user_info().await?;
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

/// Sign out; a failed revocation is reported but does not fail the command.
pub async fn sign_out(client: &LogtoClient, post_logout_redirect_uri: Option<&str>) -> Result<()> {
    let result = client.sign_out(post_logout_redirect_uri).await?;
    if let Some(e) = result.revocation_error {
        println!("{} {}", "Refresh token was not revoked:".red(), e);
    }
    println!("{}", "Local tokens cleared.".green());
    Ok(())
}
