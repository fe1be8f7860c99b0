use std::collections::BTreeSet;
use std::env::VarError;
use std::path::{Path, PathBuf};

use crate::app_config::{AppConfig, ConfigFile};
use crate::programme::Genre;
use crate::ConfigError;

pub const PROGRAM_ID: &str = "tvfeed";
pub const DEFAULT_DATASETS_BASE_URL: &str = "https://datasets.imdbws.com/";
const DEFAULT_MIN_FILM_YEAR: i32 = 1990;
const DEFAULT_MIN_RATING: f64 = 5.0;
const DEFAULT_ALLOWED_SERIES_GENRES: [Genre; 2] = [Genre::Unknown, Genre::Film];

/// Load application configuration from the config file and environment.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if the config file is unreadable or malformed, or if
/// any env var holds an invalid value.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from the config file and the environment
/// variables already in the process, without loading `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if the config file is unreadable or malformed, or if
/// any env var holds an invalid value.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    let lookup = |key: &str| std::env::var(key);
    let path = config_file_path(&lookup)?;
    let file = read_config_file(&path)?;
    build_app_config(lookup, file.unwrap_or_default())
}

/// Location of `config.json`: `TVFEED_CONFIG_PATH`, else the XDG config dir.
fn config_file_path<F>(lookup: &F) -> Result<PathBuf, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    if let Ok(path) = lookup("TVFEED_CONFIG_PATH") {
        return Ok(PathBuf::from(path));
    }
    Ok(xdg_dir(lookup, "XDG_CONFIG_HOME", &[".config"])?
        .join(PROGRAM_ID)
        .join("config.json"))
}

/// Read and parse a config file. A missing file yields `Ok(None)`.
///
/// # Errors
///
/// Returns [`ConfigError::ConfigFileIo`] for read failures other than
/// not-found, and [`ConfigError::InvalidConfigFile`] for malformed JSON.
pub fn read_config_file(path: &Path) -> Result<Option<ConfigFile>, ConfigError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(ConfigError::ConfigFileIo {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| ConfigError::InvalidConfigFile {
            path: path.to_path_buf(),
            source: e,
        })
}

/// Build application configuration from defaults, then `file`, then env vars.
///
/// Decoupled from the real environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F, file: ConfigFile) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    let parse_i32 = |var: &str, fallback: i32| -> Result<i32, ConfigError> {
        lookup(var).ok().map_or(Ok(fallback), |raw| {
            raw.trim().parse::<i32>().map_err(|e| invalid(var, &e))
        })
    };

    let parse_f64 = |var: &str, fallback: f64| -> Result<f64, ConfigError> {
        lookup(var).ok().map_or(Ok(fallback), |raw| {
            raw.trim().parse::<f64>().map_err(|e| invalid(var, &e))
        })
    };

    let parse_u64 = |var: &str, default: u64| -> Result<u64, ConfigError> {
        lookup(var).ok().map_or(Ok(default), |raw| {
            raw.trim().parse::<u64>().map_err(|e| invalid(var, &e))
        })
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let min_film_year = parse_i32(
        "TVFEED_MIN_FILM_YEAR",
        file.min_film_year.unwrap_or(DEFAULT_MIN_FILM_YEAR),
    )?;
    let min_rating = parse_f64(
        "TVFEED_MIN_RATING",
        file.min_imdb_rating.unwrap_or(DEFAULT_MIN_RATING),
    )?;

    let allowed_series_genres = match lookup("TVFEED_ALLOWED_SERIES_GENRES") {
        Ok(raw) => parse_genres(raw.split(',').filter(|s| !s.trim().is_empty()))?,
        Err(_) => match &file.allowed_series_genres {
            Some(names) => parse_genres(names.iter().map(String::as_str))?,
            None => DEFAULT_ALLOWED_SERIES_GENRES.into_iter().collect(),
        },
    };

    let matches_store_path = match lookup("TVFEED_MATCHES_STORE_PATH") {
        Ok(path) => PathBuf::from(path),
        Err(_) => match file.matches_store_path {
            Some(path) => path,
            None => xdg_dir(&lookup, "XDG_DATA_HOME", &[".local", "share"])?
                .join(PROGRAM_ID)
                .join("matches.db"),
        },
    };

    let datasets_store_path = match lookup("TVFEED_DATASETS_PATH") {
        Ok(path) => PathBuf::from(path),
        Err(_) => match file.datasets_store_path {
            Some(path) => path,
            None => xdg_dir(&lookup, "XDG_CACHE_HOME", &[".cache"])?
                .join(PROGRAM_ID)
                .join("datasets"),
        },
    };

    let ratings_index_path = match lookup("TVFEED_RATINGS_INDEX_PATH") {
        Ok(path) => PathBuf::from(path),
        Err(_) => file
            .ratings_index_path
            .unwrap_or_else(|| datasets_store_path.join("imdb.db")),
    };

    let datasets_base_url = or_default("TVFEED_DATASETS_BASE_URL", DEFAULT_DATASETS_BASE_URL);
    let connect_timeout_secs = parse_u64("TVFEED_CONNECT_TIMEOUT_SECS", 30)?;
    let user_agent = or_default("TVFEED_USER_AGENT", "tvfeed/0.1 (ratings-index)");
    let log_level = or_default("TVFEED_LOG_LEVEL", "info");

    Ok(AppConfig {
        min_film_year,
        min_rating,
        allowed_series_genres,
        matches_store_path,
        datasets_store_path,
        ratings_index_path,
        datasets_base_url,
        connect_timeout_secs,
        user_agent,
        log_level,
    })
}

fn invalid(var: &str, err: &dyn std::fmt::Display) -> ConfigError {
    ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason: err.to_string(),
    }
}

fn parse_genres<'a>(names: impl Iterator<Item = &'a str>) -> Result<BTreeSet<Genre>, ConfigError> {
    names
        .map(|name| name.parse::<Genre>().map_err(ConfigError::from))
        .collect()
}

/// Resolve an XDG base directory: `$var` if set and non-empty, else
/// `$HOME` joined with `fallback`.
fn xdg_dir<F>(lookup: &F, var: &str, fallback: &[&str]) -> Result<PathBuf, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    if let Ok(dir) = lookup(var) {
        if !dir.is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    let home = lookup("HOME").map_err(|_| ConfigError::MissingEnvVar("HOME".to_string()))?;
    Ok(fallback
        .iter()
        .fold(PathBuf::from(home), |path, part| path.join(part)))
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
