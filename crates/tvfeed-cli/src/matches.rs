use anyhow::Context;
use clap::Subcommand;
use tvfeed_core::AppConfig;
use tvfeed_filter::{DedupStore, RecordedMatch};

/// Sub-commands available under `matches`.
#[derive(Debug, Subcommand)]
pub enum MatchesCommands {
    /// Print every recorded fingerprint with the time it was first matched
    List,
}

pub(crate) async fn run_matches_list(config: &AppConfig) -> anyhow::Result<()> {
    let dedup = DedupStore::open(&config.matches_store_path)
        .await
        .with_context(|| {
            format!(
                "failed to open match store at {}",
                config.matches_store_path.display()
            )
        })?;
    let recorded = dedup.recorded().await;
    dedup.close().await;

    for entry in recorded? {
        println!("{}", format_recorded(&entry));
    }
    Ok(())
}

pub(crate) fn format_recorded(entry: &RecordedMatch) -> String {
    format!("{}\t{}", entry.first_seen.to_rfc3339(), entry.fingerprint)
}
