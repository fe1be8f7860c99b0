//! Ratings index construction.
//!
//! [`update_ratings_index`] is the full batch job: download both datasets,
//! join them into a staging store, and publish the staging store over the
//! live index. [`build_index`] is the join-and-load step on its own, over any
//! row sources and any [`KeyValueStore`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::pin::pin;

use futures::stream::{self, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tvfeed_core::{IndexValue, RatingEntry, TitleType};
use tvfeed_store::{get_json, put_json_batch, KeyValueStore, StagedStore, StoreError};

use crate::client::DatasetClient;
use crate::dataset::{open_dataset, Dataset, RatingRow, TitleRow};
use crate::error::ImdbError;
use crate::key::IndexKey;
use crate::merge::merge_join;

const PROGRESS_INTERVAL: u64 = 500_000;
/// Pending key writes held in memory before one batched commit.
const WRITE_BATCH: usize = 50_000;
const JOINED_ROW_BUFFER: usize = 4_096;

type JoinedRow = Result<(TitleRow, RatingRow), ImdbError>;

/// Counters reported after a successful build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildSummary {
    /// Title rows that had a matching ratings row.
    pub joined: u64,
    /// Joined rows dropped because their title type is not indexed.
    pub skipped_types: u64,
    pub keys_written: u64,
    /// Keys turned into tombstones by conflicting ratings.
    pub tombstones: u64,
}

/// What to do with one key given its current value and a new entry.
#[derive(Debug, PartialEq)]
enum Resolution {
    Write(IndexValue),
    Keep,
}

/// Conflict policy for one key within one build.
///
/// An empty key takes the entry. A key holding an equal rating keeps its
/// first entry. A key holding a different rating becomes a tombstone, and a
/// tombstone is never replaced.
fn resolve(existing: Option<IndexValue>, incoming: &RatingEntry) -> Resolution {
    match existing {
        None => Resolution::Write(IndexValue::Rated(incoming.clone())),
        Some(IndexValue::Tombstone) => Resolution::Keep,
        Some(IndexValue::Rated(current)) if same_rating(current.rating, incoming.rating) => {
            Resolution::Keep
        }
        Some(IndexValue::Rated(_)) => Resolution::Write(IndexValue::Tombstone),
    }
}

// Ratings are parsed from the same one-decimal text, so equal text yields
// bit-identical floats.
#[allow(clippy::float_cmp)]
fn same_rating(a: f64, b: f64) -> bool {
    a == b
}

/// Merge-joins title and rating rows and loads the result into `store`.
///
/// Each joined row of an indexed type is written under its year-less key
/// and, when the year is known, its exact-year key. `store` should be empty:
/// existing values take part in conflict resolution.
///
/// # Errors
///
/// Returns the first decode error from either row source, or any store
/// error. The store is left partially loaded.
pub async fn build_index<T, R, S>(
    titles: T,
    ratings: R,
    store: &S,
) -> Result<BuildSummary, ImdbError>
where
    T: IntoIterator<Item = Result<TitleRow, ImdbError>>,
    R: IntoIterator<Item = Result<RatingRow, ImdbError>>,
    S: KeyValueStore + ?Sized,
{
    load_joined(stream::iter(merge_join(titles, ratings)), store, WRITE_BATCH).await
}

/// Loads joined rows into `store`, committing pending writes every
/// `batch_size` keys and once more at the end.
async fn load_joined<P, S>(
    rows: P,
    store: &S,
    batch_size: usize,
) -> Result<BuildSummary, ImdbError>
where
    P: Stream<Item = JoinedRow>,
    S: KeyValueStore + ?Sized,
{
    let mut rows = pin!(rows);
    let mut summary = BuildSummary::default();
    // Writes not yet committed. Reads consult this before the store.
    let mut pending: BTreeMap<String, IndexValue> = BTreeMap::new();

    while let Some(row) = rows.next().await {
        let (title, rating) = row?;
        summary.joined += 1;
        if summary.joined % PROGRESS_INTERVAL == 0 {
            tracing::info!(
                joined = summary.joined,
                keys_written = summary.keys_written,
                "ratings index build in progress"
            );
        }

        let Some(title_type) = TitleType::from_dataset_type(&title.title_type) else {
            summary.skipped_types += 1;
            continue;
        };

        let entry = RatingEntry {
            source_id: title.id,
            title_type,
            year: title.start_year,
            rating: rating.average_rating,
        };

        for key in IndexKey::candidates(&title.primary_title, title_type, entry.year) {
            let existing = match pending.get(key.as_str()) {
                Some(value) => Some(value.clone()),
                None => get_json(store, key.as_str()).await?,
            };
            match resolve(existing, &entry) {
                Resolution::Keep => {}
                Resolution::Write(value) => {
                    if value == IndexValue::Tombstone {
                        summary.tombstones += 1;
                        tracing::debug!(%key, source_id = %entry.source_id, "conflicting ratings, key tombstoned");
                    }
                    pending.insert(key.to_string(), value);
                    summary.keys_written += 1;
                }
            }
        }

        if pending.len() >= batch_size {
            flush(store, &mut pending).await?;
        }
    }

    flush(store, &mut pending).await?;
    Ok(summary)
}

async fn flush<S>(store: &S, pending: &mut BTreeMap<String, IndexValue>) -> Result<(), StoreError>
where
    S: KeyValueStore + ?Sized,
{
    if pending.is_empty() {
        return Ok(());
    }
    let batch: Vec<(String, IndexValue)> = std::mem::take(pending).into_iter().collect();
    put_json_batch(store, &batch).await
}

/// Downloads both datasets into `work_dir`, builds a fresh index, and
/// atomically replaces the index at `index_path`.
///
/// Downloaded files are removed afterwards whether or not the build
/// succeeded.
///
/// # Errors
///
/// Any download, decode, or store error aborts the build. The staging store
/// is discarded and the previously published index is left in place.
pub async fn update_ratings_index(
    client: &DatasetClient,
    index_path: &Path,
    work_dir: &Path,
) -> Result<BuildSummary, ImdbError> {
    tokio::fs::create_dir_all(work_dir)
        .await
        .map_err(|e| ImdbError::Io {
            path: work_dir.to_path_buf(),
            source: e,
        })?;

    let result = download_and_build(client, index_path, work_dir).await;

    for dataset in [Dataset::TitleBasics, Dataset::TitleRatings] {
        remove_download(&work_dir.join(dataset.file_name())).await;
    }

    result
}

async fn download_and_build(
    client: &DatasetClient,
    index_path: &Path,
    work_dir: &Path,
) -> Result<BuildSummary, ImdbError> {
    let titles_path = client.download(Dataset::TitleBasics, work_dir).await?;
    let ratings_path = client.download(Dataset::TitleRatings, work_dir).await?;
    build_from_files(&titles_path, &ratings_path, index_path).await
}

/// Builds a staging index from already-downloaded dataset files and
/// publishes it over `index_path`.
///
/// Decompression and decoding run on a blocking thread; joined rows reach
/// the loader through a bounded channel.
///
/// # Errors
///
/// Returns any I/O, decode, or store error; the staging store is discarded
/// and `index_path` is untouched.
pub async fn build_from_files(
    titles_path: &Path,
    ratings_path: &Path,
    index_path: &Path,
) -> Result<BuildSummary, ImdbError> {
    let staged = StagedStore::create(index_path).await?;

    let (rows, reader) = spawn_join_reader(titles_path.to_path_buf(), ratings_path.to_path_buf());
    let loaded = load_joined(rows, staged.store(), WRITE_BATCH).await;
    // The receiver is gone by now, so the reader stops at its next send.
    let read = reader.await.map_err(ImdbError::from);

    match loaded.and_then(|summary| read.map(|()| summary)) {
        Ok(summary) => {
            staged.publish().await?;
            tracing::info!(
                joined = summary.joined,
                skipped_types = summary.skipped_types,
                keys_written = summary.keys_written,
                tombstones = summary.tombstones,
                path = %index_path.display(),
                "ratings index built"
            );
            Ok(summary)
        }
        Err(e) => {
            tracing::error!(error = %e, "ratings index build failed; keeping previous index");
            staged.discard().await;
            Err(e)
        }
    }
}

/// Opens both dataset files and merge-joins them on a blocking thread.
///
/// An open failure is sent as the only row. The task ends early when the
/// returned stream is dropped.
fn spawn_join_reader(
    titles_path: PathBuf,
    ratings_path: PathBuf,
) -> (impl Stream<Item = JoinedRow>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel::<JoinedRow>(JOINED_ROW_BUFFER);

    let handle = tokio::task::spawn_blocking(move || {
        let titles = match open_dataset::<TitleRow>(&titles_path) {
            Ok(rows) => rows,
            Err(e) => {
                let _ = tx.blocking_send(Err(e));
                return;
            }
        };
        let ratings = match open_dataset::<RatingRow>(&ratings_path) {
            Ok(rows) => rows,
            Err(e) => {
                let _ = tx.blocking_send(Err(e));
                return;
            }
        };
        for row in merge_join(titles, ratings) {
            if tx.blocking_send(row).is_err() {
                tracing::debug!("dataset reader stopped, loader went away");
                return;
            }
        }
    });

    let rows = stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|row| (row, rx))
    });
    (rows, handle)
}

async fn remove_download(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to remove dataset file"),
    }
}

#[cfg(test)]
#[path = "builder_test.rs"]
mod tests;
