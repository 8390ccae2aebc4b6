//! Pasale CLI Demo
//!
//! Logs in with email, password and one-time code, keeps the session in
//! a file, and issues authenticated requests. Expired access tokens are
//! refreshed behind the scenes.
//!
//! Run with:
//!   cargo run -p pasale-cli -- login owner@example.com
//!   cargo run -p pasale-cli -- products
//!   cargo run -p pasale-cli -- get /parties/?category_type=Customer
//!
//! `PASALE_API_BASE_URL` selects the backend; `RUST_LOG=pasale_client=debug`
//! shows the refresh pipeline at work.

mod output;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use pasale_client::auth::FileStore;
use pasale_client::{ApiClient, ClientConfig, FnSessionExpiredHandler};

/// Pasale API command-line client
#[derive(Parser, Debug)]
#[command(name = "pasale-cli")]
#[command(about = "Log in to Pasale and make authenticated API requests")]
struct Args {
    /// Session file (defaults to the platform config directory)
    #[arg(long, global = true)]
    session: Option<PathBuf>,

    /// API base URL (overrides PASALE_API_BASE_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Request a one-time code, then verify it and store the session
    Login {
        /// Account email
        email: String,
    },
    /// Verify a one-time code received earlier
    Verify {
        /// Account email
        email: String,
        /// One-time code
        otp: String,
    },
    /// Show the stored session
    Status,
    /// Forget the stored session
    Logout,
    /// GET a path and print the JSON response
    Get {
        /// Path relative to the API base URL, or an absolute URL
        path: String,
    },
    /// List inventory products
    Products,
}

fn build_client(args: &Args) -> anyhow::Result<(ApiClient, PathBuf)> {
    let mut config = ClientConfig::from_env()?;
    if let Some(url) = &args.base_url {
        config.base_url = url.trim_end_matches('/').to_string();
    }
    if let Some(path) = &args.session {
        config.credentials_path = Some(path.clone());
    }
    let store = Arc::new(FileStore::new(config.resolved_credentials_path()));
    let session_file = store.path().to_path_buf();

    let client = ApiClient::builder()
        .config(config)
        .store(store)
        .on_session_expired(FnSessionExpiredHandler::new(|event| {
            Box::pin(async move {
                tracing::warn!(reason = ?event.reason, "Session ended; log in again");
            })
        }))
        .build()?;
    Ok((client, session_file))
}

async fn login(client: &ApiClient, email: &str) -> anyhow::Result<()> {
    let password: String = cliclack::password("Password").mask('▪').interact()?;

    let spinner = cliclack::spinner();
    spinner.start("Sending one-time code...");
    match client.login(email, &password).await {
        Ok(_) => spinner.stop("One-time code sent"),
        Err(e) => {
            spinner.error("Login failed");
            return Err(e.into());
        }
    }

    let otp: String = cliclack::input("One-time code").interact()?;
    verify(client, email, otp.trim()).await
}

async fn verify(client: &ApiClient, email: &str, otp: &str) -> anyhow::Result<()> {
    client.verify_login_otp(email, otp).await?;
    println!("  {}", console::style("logged in").green());
    Ok(())
}

async fn run(args: &Args) -> anyhow::Result<()> {
    let (client, session_file) = build_client(args)?;
    output::display_greeting(&client.config().base_url);

    let result = match &args.command {
        Command::Login { email } => return login(&client, email).await,
        Command::Verify { email, otp } => return verify(&client, email, otp).await,
        Command::Status => {
            output::display_status(
                client.is_authenticated(),
                client.access_token_expires_at(),
                client.access_token_valid_for(),
                &session_file,
            );
            return Ok(());
        }
        Command::Logout => {
            client.logout()?;
            println!("  {}", console::style("logged out").dim());
            return Ok(());
        }
        Command::Get { path } => client
            .get::<serde_json::Value>(path)
            .await
            .map(|value| output::display_json(&value)),
        Command::Products => client
            .products()
            .list()
            .await
            .map(|products| output::display_products(&products)),
    };

    if let Err(err) = result {
        output::display_error(&err);
        std::process::exit(1);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("pasale_client=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    run(&args).await
}
