pub mod app_config;
pub mod config;
pub mod programme;
pub mod ratings;

pub use app_config::{AppConfig, ConfigFile};
pub use config::{load_app_config, load_app_config_from_env};
pub use programme::{EpisodeInfo, Genre, MatchedProgramme, ProgrammeRecord};
pub use ratings::{IndexValue, RatingEntry, RatingLookup, TitleType};

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unknown genre: {0}")]
    UnknownGenre(String),
    #[error("unknown title type: {0}")]
    UnknownTitleType(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read config file {path}: {source}")]
    ConfigFileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    InvalidConfigFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Core(#[from] CoreError),
}
