//! Lyceum CLI - database migrations and Stripe catalog tools.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! lyceum-cli migrate
//!
//! # Create Stripe products for catalog rows that have none
//! lyceum-cli stripe sync
//! lyceum-cli stripe sync --dry-run
//!
//! # List the active Stripe catalog
//! lyceum-cli stripe list
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `stripe sync` - Create Stripe products and prices from the `products` table
//! - `stripe list` - Print the active Stripe products

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "lyceum-cli")]
#[command(author, version, about = "Lyceum CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage the Stripe product catalog
    Stripe {
        #[command(subcommand)]
        action: StripeAction,
    },
}

#[derive(Subcommand)]
enum StripeAction {
    /// Create Stripe products and prices for catalog rows without one
    Sync {
        /// Print what would be created without calling Stripe
        #[arg(long)]
        dry_run: bool,
    },
    /// List active Stripe products
    List,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::storefront().await?,
        Commands::Stripe { action } => match action {
            StripeAction::Sync { dry_run } => commands::stripe::sync(dry_run).await?,
            StripeAction::List => commands::stripe::list().await?,
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_stripe_sync_dry_run() {
        let cli = Cli::try_parse_from(["lyceum-cli", "stripe", "sync", "--dry-run"]).expect("parse");
        assert!(matches!(
            cli.command,
            Commands::Stripe {
                action: StripeAction::Sync { dry_run: true }
            }
        ));
    }
}
