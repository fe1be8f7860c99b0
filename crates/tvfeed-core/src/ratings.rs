//! Rating-side domain types shared by the index builder, the index reader,
//! and the filter pipeline.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::programme::Genre;
use crate::CoreError;

/// Kind of title a rating belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TitleType {
    Film,
    Series,
}

impl TitleType {
    /// Maps a raw `titleType` value from the ratings provider.
    ///
    /// `movie` and `tvMovie` both map to [`TitleType::Film`]; anything other
    /// than those and `tvSeries` returns `None`.
    #[must_use]
    pub fn from_dataset_type(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "movie" | "tvmovie" => Some(TitleType::Film),
            "tvseries" => Some(TitleType::Series),
            _ => None,
        }
    }

    /// Title type a programme of `genre` is looked up as.
    #[must_use]
    pub fn for_genre(genre: Genre) -> Self {
        if genre == Genre::Film {
            TitleType::Film
        } else {
            TitleType::Series
        }
    }

    /// Tag used inside ratings index keys.
    #[must_use]
    pub fn key_tag(self) -> &'static str {
        match self {
            TitleType::Film => "movie",
            TitleType::Series => "tvseries",
        }
    }
}

impl fmt::Display for TitleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TitleType::Film => f.write_str("film"),
            TitleType::Series => f.write_str("series"),
        }
    }
}

impl FromStr for TitleType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "film" | "movie" => Ok(TitleType::Film),
            "series" | "tvseries" => Ok(TitleType::Series),
            other => Err(CoreError::UnknownTitleType(other.to_string())),
        }
    }
}

/// A rating taken from the provider's datasets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingEntry {
    /// Provider identifier of the rated title (e.g. `tt0078748`).
    pub source_id: String,
    pub title_type: TitleType,
    pub year: Option<i32>,
    pub rating: f64,
}

/// Value stored under one ratings index key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum IndexValue {
    Rated(RatingEntry),
    /// Several source titles claimed this key with different ratings.
    Tombstone,
}

/// Outcome of resolving a title against the ratings index.
#[derive(Debug, Clone, PartialEq)]
pub enum RatingLookup {
    Known(RatingEntry),
    /// The title is in the index but its rating is ambiguous.
    Ambiguous,
    Unknown,
}

impl RatingLookup {
    #[must_use]
    pub fn into_rating(self) -> Option<RatingEntry> {
        match self {
            RatingLookup::Known(entry) => Some(entry),
            RatingLookup::Ambiguous | RatingLookup::Unknown => None,
        }
    }
}
