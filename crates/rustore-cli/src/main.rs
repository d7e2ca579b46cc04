//! RuStore CLI - call the RuStore public API from the terminal
//!
//! Methods come from a YAML catalog; credentials come from a TOML config file
//! or the `RUSTORE_*` environment variables.
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod display;

use commands::{CallArgs, Context};

#[derive(Parser, Debug)]
#[command(name = "rustore")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Settings file (defaults to the user config dir, then the environment)
    #[arg(long, global = true, env = "RUSTORE_CONFIG")]
    config: Option<PathBuf>,

    /// Method catalog
    #[arg(long, global = true, env = "RUSTORE_CATALOG", default_value = "methods.yaml")]
    catalog: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List catalog methods
    Methods {
        /// Only show this group
        #[arg(long)]
        group: Option<String>,
    },

    /// Print a JSON body template for a method
    Template {
        /// Method id, as `group.method`
        method: String,
    },

    /// Call a catalog method
    Call(CallArgs),

    /// Authenticate and show the token state
    Token {
        /// Ignore any cached token
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let ctx = Context {
        config_path: cli.config,
        catalog_path: cli.catalog,
    };

    match cli.command {
        Command::Methods { group } => commands::list_methods(&ctx, group.as_deref()),
        Command::Template { method } => commands::show_template(&ctx, &method),
        Command::Call(args) => commands::call_method(&ctx, args).await,
        Command::Token { force } => commands::show_token(&ctx, force).await,
    }
}
