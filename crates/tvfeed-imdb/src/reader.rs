//! Read-only access to a published ratings index.

use std::path::Path;

use futures::TryStreamExt;
use tvfeed_core::{IndexValue, RatingEntry, RatingLookup, TitleType};
use tvfeed_store::{decode_json, get_json, KeyValueStore, SqliteStore};

use crate::error::ImdbError;
use crate::key::IndexKey;

/// Entry counts of a published index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub rated: u64,
    pub tombstones: u64,
}

/// Lookup side of the ratings index.
///
/// Holds no state beyond the store handle; any number of lookups may run
/// concurrently against one instance.
pub struct RatingsIndex<S = SqliteStore> {
    store: S,
}

impl RatingsIndex<SqliteStore> {
    /// Opens the published index at `path` read-only.
    ///
    /// # Errors
    ///
    /// Returns [`ImdbError::Store`] if the file is missing or is not an index.
    pub async fn open(path: &Path) -> Result<Self, ImdbError> {
        let store = SqliteStore::open_read_only(path).await?;
        tracing::debug!(path = %path.display(), "opened ratings index");
        Ok(Self { store })
    }
}

impl<S: KeyValueStore> RatingsIndex<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Three-valued lookup: exact-year key first, then the year-less key.
    ///
    /// The first key holding a rating wins. A tombstone on the exact key
    /// does not stop the fallback; [`RatingLookup::Ambiguous`] is returned
    /// only when no candidate holds a rating and at least one is tombstoned.
    ///
    /// # Errors
    ///
    /// Returns [`ImdbError::Store`] on read or decode failure.
    pub async fn resolve(
        &self,
        title: &str,
        title_type: TitleType,
        year: Option<i32>,
    ) -> Result<RatingLookup, ImdbError> {
        let mut ambiguous = false;
        for key in IndexKey::candidates(title, title_type, year) {
            match get_json::<_, IndexValue>(&self.store, key.as_str()).await? {
                Some(IndexValue::Rated(entry)) => return Ok(RatingLookup::Known(entry)),
                Some(IndexValue::Tombstone) => ambiguous = true,
                None => {}
            }
        }
        Ok(if ambiguous {
            RatingLookup::Ambiguous
        } else {
            RatingLookup::Unknown
        })
    }

    /// Rating for a title, or `None` when unknown or ambiguous.
    ///
    /// # Errors
    ///
    /// Returns [`ImdbError::Store`] on read or decode failure.
    pub async fn lookup(
        &self,
        title: &str,
        title_type: TitleType,
        year: Option<i32>,
    ) -> Result<Option<RatingEntry>, ImdbError> {
        Ok(self.resolve(title, title_type, year).await?.into_rating())
    }

    /// Counts rated and tombstoned keys with a full scan.
    ///
    /// # Errors
    ///
    /// Returns [`ImdbError::Store`] on read or decode failure.
    pub async fn stats(&self) -> Result<IndexStats, ImdbError> {
        let mut stats = IndexStats::default();
        let mut entries = self.store.scan();
        while let Some((key, bytes)) = entries.try_next().await? {
            match decode_json::<IndexValue>(&key, &bytes)? {
                IndexValue::Rated(_) => stats.rated += 1,
                IndexValue::Tombstone => stats.tombstones += 1,
            }
        }
        Ok(stats)
    }
}
