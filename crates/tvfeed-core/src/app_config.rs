use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::Deserialize;

use crate::programme::Genre;

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub min_film_year: i32,
    pub min_rating: f64,
    pub allowed_series_genres: BTreeSet<Genre>,
    pub matches_store_path: PathBuf,
    pub datasets_store_path: PathBuf,
    pub ratings_index_path: PathBuf,
    pub datasets_base_url: String,
    pub connect_timeout_secs: u64,
    pub user_agent: String,
    pub log_level: String,
}

/// Optional on-disk overrides, read from `config.json`.
///
/// Every field is optional; unknown keys are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    pub min_film_year: Option<i32>,
    #[serde(alias = "min_film_imdb_rating")]
    pub min_imdb_rating: Option<f64>,
    pub allowed_series_genres: Option<Vec<String>>,
    pub matches_store_path: Option<PathBuf>,
    pub datasets_store_path: Option<PathBuf>,
    pub ratings_index_path: Option<PathBuf>,
}
