//! Harvest Market CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Apply pending migrations
//! hm-cli migrate
//!
//! # Create or promote an admin (password from HM_ADMIN_PASSWORD)
//! HM_ADMIN_PASSWORD=... hm-cli admin create -e admin@example.com -n "Admin Name"
//!
//! # Import reference data from CSV
//! hm-cli import states data/states.csv
//! hm-cli import cities data/cities.csv
//! ```
//!
//! # Environment Variables
//!
//! - `MARKET_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "hm-cli")]
#[command(author, version, about = "Harvest Market CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage admin users
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Import reference data from a CSV file
    Import {
        /// Table to fill (`categories`, `units`, `states`, `cities`)
        kind: String,

        /// CSV file with a header row
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Create an admin user, or promote an existing account
    Create {
        /// Admin email address
        #[arg(short, long)]
        email: String,

        /// Admin display name
        #[arg(short, long)]
        name: String,
    },
}

#[tokio::main]
async fn main() {
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
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Admin { action } => match action {
            AdminAction::Create { email, name } => {
                commands::admin::create_user(&email, &name).await?;
            }
        },
        Commands::Import { kind, file } => commands::import::run(&kind, &file).await?,
    }
    Ok(())
}
