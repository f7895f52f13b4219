//! Tourpass CLI - Database migrations and route authoring tools.
//!
//! # Usage
//!
//! ```bash
//! # Run passport database migrations
//! tp-cli migrate
//!
//! # Check a route's checkpoints before publishing it
//! tp-cli route audit 7
//!
//! # Generate partner codes for a venue
//! tp-cli partner-code --prefix BONITO --count 5
//!
//! # Distance in meters between two coordinates
//! tp-cli distance -20.4697 -54.6201 -20.4486 -54.6295
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

use tourpass_core::RouteId;
use tourpass_server::services::codes::DEFAULT_PASSPORT_PREFIX;

mod commands;

#[derive(Parser)]
#[command(name = "tp-cli")]
#[command(author, version, about = "Tourpass CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run passport database migrations
    Migrate,
    /// Inspect routes
    Route {
        #[command(subcommand)]
        action: RouteAction,
    },
    /// Generate partner codes
    PartnerCode {
        /// Code prefix, usually the venue or city
        #[arg(short, long, default_value = DEFAULT_PASSPORT_PREFIX)]
        prefix: String,

        /// Number of codes to generate
        #[arg(short, long, default_value_t = 1)]
        count: usize,
    },
    /// Great-circle distance in meters between two coordinates
    Distance {
        #[arg(allow_negative_numbers = true)]
        lat1: f64,
        #[arg(allow_negative_numbers = true)]
        lon1: f64,
        #[arg(allow_negative_numbers = true)]
        lat2: f64,
        #[arg(allow_negative_numbers = true)]
        lon2: f64,
    },
}

#[derive(Subcommand)]
enum RouteAction {
    /// Validate a route's checkpoints, sequences and stamp fragments
    Audit {
        /// Route ID
        route_id: i32,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tp_cli=info,tourpass_server=info".into()),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Route { action } => match action {
            RouteAction::Audit { route_id } => {
                commands::route::audit(RouteId::new(route_id)).await?;
            }
        },
        Commands::PartnerCode { prefix, count } => {
            commands::codes::print_partner_codes(&prefix, count);
        }
        Commands::Distance {
            lat1,
            lon1,
            lat2,
            lon2,
        } => commands::distance::print_distance(lat1, lon1, lat2, lon2)?,
    }

    Ok(())
}
