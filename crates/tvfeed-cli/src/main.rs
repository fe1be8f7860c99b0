mod filter;
mod matches;
mod ratings;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::matches::MatchesCommands;
use crate::ratings::RatingsCommands;

#[derive(Debug, Parser)]
#[command(name = "tvfeed")]
#[command(about = "Filter EPG programmes down to well-rated films and series premieres")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Download the IMDb datasets and rebuild the ratings index
    UpdateRatings,
    /// Read JSON-lines programmes and write JSON-lines matches to stdout
    Filter {
        /// Programme file to read instead of stdin
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Query the published ratings index
    Ratings {
        #[command(subcommand)]
        command: RatingsCommands,
    },
    /// Inspect the store of already-emitted matches
    Matches {
        #[command(subcommand)]
        command: MatchesCommands,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = tvfeed_core::load_app_config()?;

    // stdout carries matches; logs go to stderr.
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::UpdateRatings => ratings::run_update_ratings(&config).await,
        Commands::Filter { input } => filter::run_filter(&config, input.as_deref()).await,
        Commands::Ratings { command } => match command {
            RatingsCommands::Lookup { title, kind, year } => {
                ratings::run_ratings_lookup(&config, &title, kind, year).await
            }
            RatingsCommands::Stats => ratings::run_ratings_stats(&config).await,
        },
        Commands::Matches { command } => match command {
            MatchesCommands::List => matches::run_matches_list(&config).await,
        },
    }
}
