use std::path::PathBuf;

use thiserror::Error;
use tvfeed_store::StoreError;

/// Errors raised while fetching datasets or building and reading the
/// ratings index.
#[derive(Debug, Error)]
pub enum ImdbError {
    /// Network or TLS failure, or a non-2xx status from the dataset host.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid dataset base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A dataset line could not be decompressed or decoded.
    #[error("malformed {dataset} at line {line}: {reason}")]
    Decode {
        dataset: &'static str,
        line: u64,
        reason: String,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The blocking task decoding the datasets panicked or was cancelled.
    #[error("dataset reader task failed: {0}")]
    ReaderTask(#[from] tokio::task::JoinError),
}
