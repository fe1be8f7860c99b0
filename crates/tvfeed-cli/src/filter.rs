//! The `filter` command: programmes in on stdin or a file, matches out on
//! stdout.

use std::path::Path;

use anyhow::Context;
use tokio::io::{AsyncBufRead, AsyncWriteExt, BufReader, BufWriter};
use tvfeed_core::AppConfig;
use tvfeed_filter::{json_lines, DedupStore, FilterCriteria, FilterPipeline};
use tvfeed_imdb::RatingsIndex;

/// Runs one filter pass over `input` (stdin when `None`).
///
/// The dedup store is held exclusively for the whole run and closed even
/// when the run fails.
///
/// # Errors
///
/// Returns an error if either store cannot be opened, the input cannot be
/// read, or stdout cannot be written.
pub(crate) async fn run_filter(config: &AppConfig, input: Option<&Path>) -> anyhow::Result<()> {
    let criteria = FilterCriteria::from(config);
    let index = RatingsIndex::open(&config.ratings_index_path)
        .await
        .with_context(|| {
            format!(
                "failed to open ratings index at {}",
                config.ratings_index_path.display()
            )
        })?;
    let mut dedup = DedupStore::open(&config.matches_store_path)
        .await
        .with_context(|| {
            format!(
                "failed to open match store at {}",
                config.matches_store_path.display()
            )
        })?;

    let result = match input {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("failed to open input {}", path.display()));
            match file {
                Ok(file) => emit_matches(BufReader::new(file), &criteria, &index, &mut dedup).await,
                Err(e) => Err(e),
            }
        }
        None => {
            emit_matches(
                BufReader::new(tokio::io::stdin()),
                &criteria,
                &index,
                &mut dedup,
            )
            .await
        }
    };

    dedup.close().await;
    result
}

async fn emit_matches<R>(
    reader: R,
    criteria: &FilterCriteria,
    index: &RatingsIndex,
    dedup: &mut DedupStore,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut pipeline = FilterPipeline::new(json_lines(reader), criteria, index, dedup);
    let mut out = BufWriter::new(tokio::io::stdout());

    while let Some(matched) = pipeline.next_match().await? {
        let mut line = serde_json::to_vec(&matched)?;
        line.push(b'\n');
        out.write_all(&line).await?;
        out.flush().await?;
    }

    let stats = pipeline.stats();
    tracing::info!(
        read = stats.read,
        matched = stats.matched,
        ineligible = stats.ineligible,
        below_rating = stats.below_rating,
        duplicate_id = stats.duplicate_id,
        duplicate_fingerprint = stats.duplicate_fingerprint,
        "filter run complete"
    );
    Ok(())
}
