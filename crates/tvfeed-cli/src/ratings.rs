//! Ratings index command handlers: rebuild, lookup, and stats.

use anyhow::Context;
use clap::Subcommand;
use tvfeed_core::{AppConfig, RatingLookup, TitleType};
use tvfeed_imdb::{update_ratings_index, BuildSummary, DatasetClient, IndexStats, RatingsIndex};

/// Sub-commands available under `ratings`.
#[derive(Debug, Subcommand)]
pub enum RatingsCommands {
    /// Look up the rating the filter would use for a title
    Lookup {
        #[arg(long)]
        title: String,
        /// `film` or `series`
        #[arg(long, default_value = "film")]
        kind: TitleType,
        #[arg(long)]
        year: Option<i32>,
    },
    /// Count rated and ambiguous entries in the index
    Stats,
}

/// Downloads the datasets and atomically replaces the ratings index.
///
/// # Errors
///
/// Returns an error if the download or build fails; the previous index is
/// left in place.
pub(crate) async fn run_update_ratings(config: &AppConfig) -> anyhow::Result<()> {
    let client = DatasetClient::with_base_url(
        config.connect_timeout_secs,
        &config.user_agent,
        &config.datasets_base_url,
    )?;
    let summary = update_ratings_index(
        &client,
        &config.ratings_index_path,
        &config.datasets_store_path,
    )
    .await
    .context("ratings index update failed")?;

    println!("{}", format_build_summary(&summary));
    Ok(())
}

pub(crate) async fn run_ratings_lookup(
    config: &AppConfig,
    title: &str,
    kind: TitleType,
    year: Option<i32>,
) -> anyhow::Result<()> {
    let index = open_index(config).await?;
    let lookup = index.resolve(title, kind, year).await?;
    println!("{}", format_lookup(&lookup));
    Ok(())
}

pub(crate) async fn run_ratings_stats(config: &AppConfig) -> anyhow::Result<()> {
    let index = open_index(config).await?;
    let stats = index.stats().await?;
    println!("{}", format_stats(&stats));
    Ok(())
}

async fn open_index(config: &AppConfig) -> anyhow::Result<RatingsIndex> {
    RatingsIndex::open(&config.ratings_index_path)
        .await
        .with_context(|| {
            format!(
                "failed to open ratings index at {} (run `tvfeed update-ratings` first)",
                config.ratings_index_path.display()
            )
        })
}

pub(crate) fn format_build_summary(summary: &BuildSummary) -> String {
    format!(
        "ratings index rebuilt: {} joined titles, {} skipped by type, {} keys written, {} tombstoned",
        summary.joined, summary.skipped_types, summary.keys_written, summary.tombstones
    )
}

pub(crate) fn format_lookup(lookup: &RatingLookup) -> String {
    match lookup {
        RatingLookup::Known(entry) => {
            let year = entry
                .year
                .map_or_else(|| "year unknown".to_string(), |y| y.to_string());
            format!(
                "{:.1} ({} {}, {year})",
                entry.rating, entry.source_id, entry.title_type
            )
        }
        RatingLookup::Ambiguous => "ambiguous: several titles share this key".to_string(),
        RatingLookup::Unknown => "unknown".to_string(),
    }
}

pub(crate) fn format_stats(stats: &IndexStats) -> String {
    format!(
        "{} rated keys, {} tombstoned keys",
        stats.rated, stats.tombstones
    )
}
