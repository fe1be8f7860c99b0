//! Broadcast-side domain types: EPG programme records and what is derived
//! from them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ratings::RatingEntry;
use crate::CoreError;

/// Content genre tag attached to a programme by the EPG parser.
///
/// Tags the parser does not recognize deserialize as [`Genre::Unknown`].
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Genre {
    Film,
    News,
    Entertainment,
    Sport,
    Children,
    Education,
    Lifestyle,
    Drama,
    #[default]
    #[serde(other)]
    Unknown,
}

impl Genre {
    pub const ALL: [Genre; 9] = [
        Genre::Film,
        Genre::News,
        Genre::Entertainment,
        Genre::Sport,
        Genre::Children,
        Genre::Education,
        Genre::Lifestyle,
        Genre::Drama,
        Genre::Unknown,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Genre::Film => "FILM",
            Genre::News => "NEWS",
            Genre::Entertainment => "ENTERTAINMENT",
            Genre::Sport => "SPORT",
            Genre::Children => "CHILDREN",
            Genre::Education => "EDUCATION",
            Genre::Lifestyle => "LIFESTYLE",
            Genre::Drama => "DRAMA",
            Genre::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Genre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Genre {
    type Err = CoreError;

    /// Parses a genre name case-insensitively (`"film"`, `"FILM"`, `" Film "`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Genre::ALL
            .into_iter()
            .find(|g| g.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| CoreError::UnknownGenre(trimmed.to_string()))
    }
}

/// One broadcast slot as produced by the external EPG parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgrammeRecord {
    /// Stable per broadcast; the same slot can reappear across schedule dumps.
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub genre: Genre,
    pub start: DateTime<Utc>,
    pub stop: DateTime<Utc>,
}

impl ProgrammeRecord {
    /// Subtitle and summary joined by a single space, absent parts empty.
    #[must_use]
    pub fn description(&self) -> String {
        format!(
            "{} {}",
            self.subtitle.as_deref().unwrap_or_default(),
            self.summary.as_deref().unwrap_or_default()
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EpisodeInfo {
    pub series: Option<u32>,
    pub episode: Option<u32>,
}

/// A programme that passed every filter, with its rating when one is known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedProgramme {
    pub programme: ProgrammeRecord,
    pub rating: Option<RatingEntry>,
}
