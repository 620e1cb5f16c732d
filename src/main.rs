//! Logto - OpenID Connect client CLI
//!
#![doc = "Logto - OpenID Connect client CLI"]
#![doc = "Main entry point for the logto binary."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use logto::cli::{Cli, Commands};
use logto::client::SignInOptions;
use logto::commands;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    init_tracing(cli.verbose);

    let config = commands::load_config(&cli.config)?;
    let client = commands::build_client(config, cli.storage).await?;

    match cli.command {
        Commands::SignIn {
            redirect_uri,
            post_redirect_uri,
            first_screen,
            login_hint,
        } => {
            tracing::debug!("Starting sign-in with redirect URI {}", redirect_uri);
            let options = SignInOptions {
                post_redirect_uri,
                first_screen,
                login_hint,
                ..SignInOptions::new(redirect_uri)
            };
            commands::sign_in(&client, options).await?;
        }
        Commands::Callback { url } => {
            commands::callback(&client, &url).await?;
        }
        Commands::Status => {
            commands::status(&client)?;
        }
        Commands::AccessToken {
            resource,
            organization_id,
        } => {
            commands::access_token(&client, resource.as_deref(), organization_id.as_deref())
                .await?;
        }
        Commands::UserInfo => {
            commands::user_info(&client).await?;
        }
        Commands::SignOut {
            post_logout_redirect_uri,
        } => {
            commands::sign_out(&client, post_logout_redirect_uri.as_deref()).await?;
        }
    }

    Ok(())
}

/// Initialize the tracing subscriber
///
/// `RUST_LOG` wins over the `--verbose` flag. Logs go to stderr so command
/// output on stdout stays pipeable.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "logto=debug" } else { "logto=info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
