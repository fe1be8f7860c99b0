//! The match pipeline: eligibility, rating threshold, and deduplication
//! applied lazily to a stream of programmes.

use std::collections::{BTreeSet, HashSet};

use futures::{Stream, TryStreamExt};
use tvfeed_core::{
    AppConfig, EpisodeInfo, Genre, MatchedProgramme, ProgrammeRecord, RatingEntry, TitleType,
};
use tvfeed_imdb::RatingsIndex;
use tvfeed_store::{KeyValueStore, SqliteStore};

use crate::analyze::{extract_created_year, extract_episode_info};
use crate::dedup::{DedupStore, Fingerprint};
use crate::error::FilterError;

/// Thresholds deciding which programmes are worth emitting.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCriteria {
    pub min_film_year: i32,
    pub min_rating: f64,
    pub allowed_series_genres: BTreeSet<Genre>,
}

impl From<&AppConfig> for FilterCriteria {
    fn from(config: &AppConfig) -> Self {
        Self {
            min_film_year: config.min_film_year,
            min_rating: config.min_rating,
            allowed_series_genres: config.allowed_series_genres.clone(),
        }
    }
}

impl FilterCriteria {
    /// A recent enough film, or the first episode of a series in an
    /// allowed genre.
    #[must_use]
    pub fn is_eligible(&self, genre: Genre, year: Option<i32>, episode: EpisodeInfo) -> bool {
        let recent_film =
            genre == Genre::Film && year.is_some_and(|year| year >= self.min_film_year);
        let series_premiere =
            self.allowed_series_genres.contains(&genre) && episode.episode == Some(1);
        recent_film || series_premiere
    }

    /// An unknown rating is always accepted.
    #[must_use]
    pub fn accepts_rating(&self, rating: Option<&RatingEntry>) -> bool {
        rating.is_none_or(|entry| entry.rating >= self.min_rating)
    }
}

/// Per-run counters, one bucket per reason a programme was dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub read: u64,
    pub ineligible: u64,
    pub below_rating: u64,
    pub duplicate_id: u64,
    pub duplicate_fingerprint: u64,
    pub matched: u64,
}

/// Single-pass filter over a programme source.
///
/// Nothing is read until a match is requested. Each emitted match has
/// already been recorded in the dedup store, so draining the pipeline is
/// not repeatable.
pub struct FilterPipeline<'a, Src, I = SqliteStore, D = SqliteStore> {
    source: Src,
    criteria: &'a FilterCriteria,
    index: &'a RatingsIndex<I>,
    dedup: &'a mut DedupStore<D>,
    emitted_ids: HashSet<String>,
    stats: RunStats,
}

impl<'a, Src, I, D> FilterPipeline<'a, Src, I, D>
where
    Src: Stream<Item = Result<ProgrammeRecord, FilterError>> + Unpin,
    I: KeyValueStore,
    D: KeyValueStore,
{
    pub fn new(
        source: Src,
        criteria: &'a FilterCriteria,
        index: &'a RatingsIndex<I>,
        dedup: &'a mut DedupStore<D>,
    ) -> Self {
        Self {
            source,
            criteria,
            index,
            dedup,
            emitted_ids: HashSet::new(),
            stats: RunStats::default(),
        }
    }

    /// Pulls programmes from the source until one matches.
    ///
    /// Returns `Ok(None)` once the source is exhausted.
    ///
    /// # Errors
    ///
    /// Returns the first source, ratings lookup, or dedup store error.
    /// Programmes consumed before the error stay consumed.
    pub async fn next_match(&mut self) -> Result<Option<MatchedProgramme>, FilterError> {
        while let Some(programme) = self.source.try_next().await? {
            self.stats.read += 1;
            if let Some(matched) = self.process(programme).await? {
                self.stats.matched += 1;
                return Ok(Some(matched));
            }
        }
        Ok(None)
    }

    async fn process(
        &mut self,
        programme: ProgrammeRecord,
    ) -> Result<Option<MatchedProgramme>, FilterError> {
        let description = programme.description();
        let episode = extract_episode_info(&description);
        let year = extract_created_year(&description);

        if !self.criteria.is_eligible(programme.genre, year, episode) {
            self.stats.ineligible += 1;
            tracing::trace!(id = %programme.id, title = %programme.title, "not eligible");
            return Ok(None);
        }

        let title_type = TitleType::for_genre(programme.genre);
        let rating = self.index.lookup(&programme.title, title_type, year).await?;
        if !self.criteria.accepts_rating(rating.as_ref()) {
            self.stats.below_rating += 1;
            tracing::debug!(
                id = %programme.id,
                title = %programme.title,
                rating = ?rating.as_ref().map(|r| r.rating),
                "rating below minimum"
            );
            return Ok(None);
        }

        if self.emitted_ids.contains(&programme.id) {
            self.stats.duplicate_id += 1;
            tracing::debug!(id = %programme.id, "broadcast already emitted this run");
            return Ok(None);
        }

        let fingerprint = Fingerprint::new(&programme.title, episode, year);
        if !self.dedup.test_and_insert(&fingerprint).await? {
            self.stats.duplicate_fingerprint += 1;
            tracing::debug!(id = %programme.id, %fingerprint, "already matched");
            return Ok(None);
        }

        tracing::debug!(id = %programme.id, %fingerprint, "matched");
        self.emitted_ids.insert(programme.id.clone());
        Ok(Some(MatchedProgramme { programme, rating }))
    }

    #[must_use]
    pub fn stats(&self) -> RunStats {
        self.stats
    }

    /// Converts the pipeline into a stream of matches.
    pub fn into_stream(self) -> impl Stream<Item = Result<MatchedProgramme, FilterError>> + 'a
    where
        Src: 'a,
    {
        futures::stream::try_unfold(self, |mut pipeline| async move {
            let next = pipeline.next_match().await;
            next.map(|matched| matched.map(|m| (m, pipeline)))
        })
    }
}

#[cfg(test)]
#[path = "pipeline_test.rs"]
mod tests;
