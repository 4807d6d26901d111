use anyhow::{Context, Result};
use dialoguer::Password;
use std::sync::Arc;

use gigantier_sdk::auth::types::mask_token;
use gigantier_sdk::config::{self, Command, Config};
use gigantier_sdk::storage::SqliteStore;
use gigantier_sdk::transport::JsonBody;
use gigantier_sdk::{ApiResponse, SessionClient};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (for log level)
    let (config, args) = Config::load()?;

    // Initialize logging with a configured level
    let log_level = args.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let store_path = args
        .store
        .as_deref()
        .map(config::expand_tilde)
        .unwrap_or_else(config::default_store_path);
    tracing::debug!("Session store: {}", store_path.display());

    let store = SqliteStore::open(&store_path)?;
    let client = SessionClient::new(config, Arc::new(store))?;

    match args.command {
        Command::Authenticate {
            identifier,
            password,
        } => {
            let password = match password {
                Some(password) => password,
                None => Password::new()
                    .with_prompt(format!("Password for {}", identifier))
                    .interact()
                    .context("Failed to read password")?,
            };

            let token = client
                .authenticate_user(&identifier, &password)
                .await
                .context("Authentication failed")?;
            println!("Authenticated as {} (token: {})", identifier, mask_token(&token));
        }

        Command::Call { uri, body } => {
            let response = client.call(&uri, parse_body(body.as_deref())?).await?;
            print_response(&response)?;
        }

        Command::UserCall { uri, body } => {
            let response = client
                .authenticated_call(&uri, parse_body(body.as_deref())?)
                .await?;
            print_response(&response)?;
        }

        Command::SignOut => {
            client.sign_out()?;
            println!("Signed out");
        }
    }

    Ok(())
}

/// Parse the `--body` argument as a JSON object
fn parse_body(raw: Option<&str>) -> Result<Option<JsonBody>> {
    raw.map(|s| serde_json::from_str::<JsonBody>(s).context("--body must be a JSON object"))
        .transpose()
}

/// Print the response body; unsuccessful responses become an error exit
fn print_response(response: &ApiResponse) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&response.body)?);

    if !response.is_success() {
        anyhow::bail!(
            "Request failed with status {}: {}",
            response.status,
            response.error.as_deref().unwrap_or("no error reported")
        );
    }

    Ok(())
}
