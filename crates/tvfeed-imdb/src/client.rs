//! HTTP client for the IMDb non-commercial dataset host.
//!
//! Datasets are large gzip files, so they are streamed to disk chunk by
//! chunk rather than buffered in memory. There is no retry: a
//! failed download fails the build that asked for it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::StreamExt;
use reqwest::{Client, Url};
use tokio::io::AsyncWriteExt;

use tvfeed_core::config::DEFAULT_DATASETS_BASE_URL;

use crate::dataset::Dataset;
use crate::error::ImdbError;

pub struct DatasetClient {
    client: Client,
    base_url: Url,
}

impl DatasetClient {
    /// Creates a client pointed at the public dataset host.
    ///
    /// # Errors
    ///
    /// Returns [`ImdbError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(connect_timeout_secs: u64, user_agent: &str) -> Result<Self, ImdbError> {
        Self::with_base_url(connect_timeout_secs, user_agent, DEFAULT_DATASETS_BASE_URL)
    }

    /// Creates a client with a custom base URL (mirrors, or wiremock in tests).
    ///
    /// # Errors
    ///
    /// Returns [`ImdbError::Http`] if the `reqwest::Client` cannot be built,
    /// or [`ImdbError::InvalidBaseUrl`] if `base_url` does not parse.
    pub fn with_base_url(
        connect_timeout_secs: u64,
        user_agent: &str,
        base_url: &str,
    ) -> Result<Self, ImdbError> {
        // Only the connect phase is bounded; a full dataset download can
        // legitimately take minutes.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .user_agent(user_agent)
            .build()?;

        // Exactly one trailing slash, so `Url::join` appends the file name
        // instead of replacing the last path segment.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let parsed = Url::parse(&normalised).map_err(|e| ImdbError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            client,
            base_url: parsed,
        })
    }

    /// URL of `dataset` under the configured base.
    ///
    /// # Errors
    ///
    /// Returns [`ImdbError::InvalidBaseUrl`] if the join fails.
    pub fn dataset_url(&self, dataset: Dataset) -> Result<Url, ImdbError> {
        self.base_url
            .join(dataset.file_name())
            .map_err(|e| ImdbError::InvalidBaseUrl {
                url: self.base_url.to_string(),
                reason: e.to_string(),
            })
    }

    /// Streams `dataset` into `dest_dir`, returning the written file path.
    ///
    /// An existing file of the same name is overwritten.
    ///
    /// # Errors
    ///
    /// - [`ImdbError::Http`] on network failure or a non-2xx status.
    /// - [`ImdbError::Io`] if the destination file cannot be written.
    pub async fn download(&self, dataset: Dataset, dest_dir: &Path) -> Result<PathBuf, ImdbError> {
        let url = self.dataset_url(dataset)?;
        tracing::info!(dataset = dataset.name(), %url, "downloading dataset");

        let response = self.client.get(url).send().await?.error_for_status()?;

        let path = dest_dir.join(dataset.file_name());
        let io_err = |source| ImdbError::Io {
            path: path.clone(),
            source,
        };
        let mut file = tokio::fs::File::create(&path).await.map_err(io_err)?;

        let mut bytes_written: u64 = 0;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await.map_err(io_err)?;
            bytes_written += chunk.len() as u64;
        }
        file.flush().await.map_err(io_err)?;

        tracing::info!(
            dataset = dataset.name(),
            bytes = bytes_written,
            "dataset downloaded"
        );
        Ok(path)
    }
}
