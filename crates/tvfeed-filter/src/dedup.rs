//! Persistent "already emitted" set keyed by programme fingerprint.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use tvfeed_core::EpisodeInfo;
use tvfeed_store::{decode_json, insert_json_if_absent, KeyValueStore, SqliteStore};

use crate::error::FilterError;

/// Identity of a logical programme occurrence, independent of broadcast ids:
/// `title|series|episode|year` with absent parts empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    #[must_use]
    pub fn new(title: &str, episode: EpisodeInfo, year: Option<i32>) -> Self {
        let title = title.replace('|', "");
        let series = optional(episode.series);
        let number = optional(episode.episode);
        let year = optional(year);
        Fingerprint(format!("{title}|{series}|{number}|{year}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn optional<T: ToString>(part: Option<T>) -> String {
    part.map(|p| p.to_string()).unwrap_or_default()
}

/// Value stored under each recorded fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DedupMarker {
    pub first_seen: DateTime<Utc>,
}

/// One entry of the persistent set, as listed by [`DedupStore::recorded`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedMatch {
    pub fingerprint: String,
    pub first_seen: DateTime<Utc>,
}

/// Set of fingerprints already emitted, in this run or any earlier one.
///
/// Entries are never removed.
pub struct DedupStore<S = SqliteStore> {
    store: S,
    seen: HashSet<Fingerprint>,
}

impl DedupStore<SqliteStore> {
    /// Opens (creating if needed) the dedup store at `path`, holding an
    /// exclusive lock until [`DedupStore::close`].
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::Store`] if the file cannot be created or is
    /// locked by another process.
    pub async fn open(path: &Path) -> Result<Self, FilterError> {
        let store = SqliteStore::open_exclusive(path).await?;
        tracing::debug!(path = %path.display(), "opened dedup store");
        Ok(Self::new(store))
    }

    /// Flushes and releases the store's lock.
    pub async fn close(self) {
        self.store.close().await;
    }
}

impl<S: KeyValueStore> DedupStore<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            seen: HashSet::new(),
        }
    }

    /// Records `fingerprint`, returning `true` if it had not been seen
    /// before.
    ///
    /// The run-local set is checked first; only unseen fingerprints reach
    /// the persistent store.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::Store`] if the persistent insert fails. The
    /// fingerprint is then not recorded.
    pub async fn test_and_insert(&mut self, fingerprint: &Fingerprint) -> Result<bool, FilterError> {
        if self.seen.contains(fingerprint) {
            return Ok(false);
        }
        let marker = DedupMarker {
            first_seen: Utc::now(),
        };
        let inserted = insert_json_if_absent(&self.store, fingerprint.as_str(), &marker).await?;
        self.seen.insert(fingerprint.clone());
        Ok(inserted)
    }

    /// Every recorded fingerprint, in key order.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::Store`] on read or decode failure.
    pub async fn recorded(&self) -> Result<Vec<RecordedMatch>, FilterError> {
        let mut recorded = Vec::new();
        let mut entries = self.store.scan();
        while let Some((key, bytes)) = entries.try_next().await? {
            let marker: DedupMarker = decode_json(&key, &bytes)?;
            recorded.push(RecordedMatch {
                fingerprint: key,
                first_seen: marker.first_seen,
            });
        }
        Ok(recorded)
    }

    /// Ends the run, returning the underlying store.
    pub fn into_inner(self) -> S {
        self.store
    }
}

#[cfg(test)]
mod tests {
    use tvfeed_store::MemoryStore;

    use super::*;

    fn fp(title: &str, series: Option<u32>, episode: Option<u32>, year: Option<i32>) -> Fingerprint {
        Fingerprint::new(title, EpisodeInfo { series, episode }, year)
    }

    #[test]
    fn fingerprint_layout() {
        assert_eq!(fp("X", Some(1), Some(1), Some(2020)).as_str(), "X|1|1|2020");
        assert_eq!(fp("Alien", None, None, Some(1979)).as_str(), "Alien|||1979");
        assert_eq!(fp("News", None, None, None).as_str(), "News|||");
    }

    #[test]
    fn fingerprint_strips_separator_from_title() {
        assert_eq!(fp("A|B", None, Some(2), None).as_str(), "AB||2|");
    }

    #[tokio::test]
    async fn first_insert_is_new_second_is_seen() {
        let mut dedup = DedupStore::new(MemoryStore::new());
        let x = fp("X", Some(1), Some(1), Some(2020));
        assert!(dedup.test_and_insert(&x).await.unwrap());
        assert!(!dedup.test_and_insert(&x).await.unwrap());
    }

    #[tokio::test]
    async fn persistent_entries_survive_a_new_run() {
        let x = fp("X", Some(1), Some(1), Some(2020));
        let mut first = DedupStore::new(MemoryStore::new());
        assert!(first.test_and_insert(&x).await.unwrap());

        let mut second = DedupStore::new(first.into_inner());
        assert!(!second.test_and_insert(&x).await.unwrap());
        assert!(second
            .test_and_insert(&fp("X", Some(1), Some(2), Some(2020)))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn recorded_lists_fingerprints_in_order() {
        let mut dedup = DedupStore::new(MemoryStore::new());
        dedup.test_and_insert(&fp("B", None, None, None)).await.unwrap();
        dedup.test_and_insert(&fp("A", None, None, None)).await.unwrap();

        let keys: Vec<String> = dedup
            .recorded()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.fingerprint)
            .collect();
        assert_eq!(keys, ["A|||", "B|||"]);
    }

    #[tokio::test]
    async fn on_disk_store_remembers_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("matches.db");
        let x = fp("X", Some(1), Some(1), Some(2020));

        let mut first = DedupStore::open(&path).await.unwrap();
        assert!(first.test_and_insert(&x).await.unwrap());
        first.close().await;

        let mut second = DedupStore::open(&path).await.unwrap();
        assert!(!second.test_and_insert(&x).await.unwrap());
        second.close().await;
    }

    #[tokio::test]
    async fn second_open_while_locked_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("matches.db");

        let held = DedupStore::open(&path).await.unwrap();
        let result = DedupStore::open(&path).await;
        assert!(matches!(result, Err(FilterError::Store(_))));
        held.close().await;
    }
}
