//! Small persistent key-value layer shared by the ratings index and the
//! dedup store.
//!
//! Both stores are plain string-keyed maps of opaque byte values. The trait
//! covers point reads and writes, an atomic insert-if-absent, and a full
//! scan; whole-store replacement goes through [`StagedStore`].

pub mod memory;
pub mod sqlite;
pub mod staged;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use staged::StagedStore;

use std::path::PathBuf;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not encode or decode value for key {key:?}: {source}")]
    Codec {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// One `(key, value)` pair yielded by [`KeyValueStore::scan`].
pub type Entry = (String, Vec<u8>);

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Writes `value` under `key`, replacing any previous value.
    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// Writes every entry, replacing previous values, as one unit of work.
    ///
    /// The default writes entries one at a time; stores with transactions
    /// commit the whole batch at once.
    async fn put_batch(&self, entries: &[Entry]) -> Result<(), StoreError> {
        for (key, value) in entries {
            self.put(key, value).await?;
        }
        Ok(())
    }

    /// Writes `value` only if `key` is absent. Returns `true` when written.
    async fn insert_if_absent(&self, key: &str, value: &[u8]) -> Result<bool, StoreError>;

    /// Streams every entry in ascending key order.
    fn scan(&self) -> BoxStream<'_, Result<Entry, StoreError>>;
}

/// Reads `key` and decodes it as JSON.
///
/// # Errors
///
/// Returns [`StoreError::Codec`] if the stored bytes are not valid JSON for
/// `T`, or whatever the underlying store returns.
pub async fn get_json<S, T>(store: &S, key: &str) -> Result<Option<T>, StoreError>
where
    S: KeyValueStore + ?Sized,
    T: DeserializeOwned,
{
    store
        .get(key)
        .await?
        .map(|bytes| decode_json(key, &bytes))
        .transpose()
}

/// Encodes `value` as JSON and writes it under `key`.
///
/// # Errors
///
/// Returns [`StoreError::Codec`] if `value` cannot be serialized, or whatever
/// the underlying store returns.
pub async fn put_json<S, T>(store: &S, key: &str, value: &T) -> Result<(), StoreError>
where
    S: KeyValueStore + ?Sized,
    T: Serialize + Sync,
{
    let bytes = encode_json(key, value)?;
    store.put(key, &bytes).await
}

/// Encodes every value as JSON and writes the batch with
/// [`KeyValueStore::put_batch`].
///
/// # Errors
///
/// Returns [`StoreError::Codec`] if any value cannot be serialized, in which
/// case nothing is written, or whatever the underlying store returns.
pub async fn put_json_batch<S, T>(store: &S, entries: &[(String, T)]) -> Result<(), StoreError>
where
    S: KeyValueStore + ?Sized,
    T: Serialize + Sync,
{
    let encoded = entries
        .iter()
        .map(|(key, value)| Ok((key.clone(), encode_json(key, value)?)))
        .collect::<Result<Vec<Entry>, StoreError>>()?;
    store.put_batch(&encoded).await
}

/// Encodes `value` as JSON and writes it only if `key` is absent.
/// Returns `true` when written.
///
/// # Errors
///
/// Returns [`StoreError::Codec`] if `value` cannot be serialized, or whatever
/// the underlying store returns.
pub async fn insert_json_if_absent<S, T>(store: &S, key: &str, value: &T) -> Result<bool, StoreError>
where
    S: KeyValueStore + ?Sized,
    T: Serialize + Sync,
{
    let bytes = encode_json(key, value)?;
    store.insert_if_absent(key, &bytes).await
}

fn encode_json<T: Serialize>(key: &str, value: &T) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec(value).map_err(|e| StoreError::Codec {
        key: key.to_string(),
        source: e,
    })
}

/// Decodes a scanned value as JSON.
///
/// # Errors
///
/// Returns [`StoreError::Codec`] if `bytes` are not valid JSON for `T`.
pub fn decode_json<T: DeserializeOwned>(key: &str, bytes: &[u8]) -> Result<T, StoreError> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::Codec {
        key: key.to_string(),
        source: e,
    })
}
