//! Token and call demo
//!
//! Authenticates with the key from the environment, prints the token state,
//! and optionally performs one GET request.
//!
//! # Usage
//!
//! ```bash
//! export RUSTORE_KEY_ID=...
//! export RUSTORE_PRIVATE_KEY_B64=...
//!
//! # Just authenticate
//! cargo run --example token_demo
//!
//! # Authenticate and fetch an application
//! cargo run --example token_demo -- --path /public/v1/application/com.example.app
//! ```

use anyhow::Result;
use clap::Parser;

use rustore_client::ApiClient;
use rustore_common::{CallParams, Settings};

#[derive(Parser, Debug)]
#[command(author, version, about = "RuStore token demo")]
struct Args {
    /// Path to GET after authenticating
    #[arg(long)]
    path: Option<String>,

    /// Force a fresh token even if one is cached
    #[arg(long)]
    force: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let settings = Settings::from_env()?;
    let client = ApiClient::from_settings(&settings)?;

    client.token_manager().get_token(args.force).await?;
    println!(
        "Token state: {:?}, expires at {:?}",
        client.token_manager().state().await,
        client.token_manager().expires_at().await
    );

    if let Some(path) = args.path {
        let (result, url) = client.call("GET", &path, &CallParams::default()).await?;
        println!("GET {url} -> {}", result.status_code);
        println!("{}", result.pretty_body());
    }

    Ok(())
}
