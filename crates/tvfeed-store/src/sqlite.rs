//! SQLite-backed [`KeyValueStore`].
//!
//! Each store is one SQLite file with a single `kv` table. Three open modes
//! exist: exclusive read-write (the dedup store), read-only (the published
//! ratings index), and unjournalled bulk load (a staging index, see
//! [`crate::StagedStore`]).

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqliteLockingMode, SqlitePool, SqlitePoolOptions,
    SqliteSynchronous,
};

use crate::{Entry, KeyValueStore, StoreError};

const READ_POOL_CONNECTIONS: u32 = 4;

const UPSERT: &str = "INSERT INTO kv (key, value) VALUES (?1, ?2) \
     ON CONFLICT (key) DO UPDATE SET value = excluded.value";

const CREATE_TABLE: &str =
    "CREATE TABLE IF NOT EXISTS kv (key TEXT PRIMARY KEY NOT NULL, value BLOB NOT NULL) WITHOUT ROWID";

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (creating if needed) a store for exclusive read-write use.
    ///
    /// The file lock is taken immediately and held until the store is
    /// closed. A second writer, in this or another process, fails at open
    /// instead of waiting.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the parent directory cannot be created,
    /// or [`StoreError::Sqlx`] if the file cannot be opened or is locked.
    pub async fn open_exclusive(path: &Path) -> Result<Self, StoreError> {
        ensure_parent_dir(path).await?;
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Delete)
            .locking_mode(SqliteLockingMode::Exclusive)
            .busy_timeout(Duration::ZERO);
        let pool = single_connection_pool(options).await?;

        sqlx::query(CREATE_TABLE).execute(&pool).await?;
        // Any write promotes the exclusive-mode lock; it is then kept for the
        // lifetime of the connection.
        sqlx::query("PRAGMA user_version = 1").execute(&pool).await?;

        tracing::debug!(path = %path.display(), "opened store for exclusive use");
        Ok(Self { pool })
    }

    /// Opens an existing store read-only.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlx`] if the file does not exist or is not a
    /// valid store.
    pub async fn open_read_only(path: &Path) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .read_only(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(READ_POOL_CONNECTIONS)
            .connect_with(options)
            .await?;

        // Fail at open, not at first lookup, when the file is not a store.
        sqlx::query("SELECT 1 FROM kv LIMIT 1")
            .fetch_optional(&pool)
            .await?;

        Ok(Self { pool })
    }

    /// Creates a brand new store for a one-shot bulk load.
    ///
    /// No journal and no fsync. The file is only consistent once the load
    /// has finished and the pool is closed.
    pub(crate) async fn create_unjournalled(path: &Path) -> Result<Self, StoreError> {
        ensure_parent_dir(path).await?;
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Off)
            .synchronous(SqliteSynchronous::Off)
            .locking_mode(SqliteLockingMode::Exclusive);
        let pool = single_connection_pool(options).await?;
        sqlx::query(CREATE_TABLE).execute(&pool).await?;

        Ok(Self { pool })
    }

    /// Closes every pooled connection, releasing the file lock.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

async fn single_connection_pool(options: SqliteConnectOptions) -> Result<SqlitePool, sqlx::Error> {
    SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
}

async fn ensure_parent_dir(path: &Path) -> Result<(), StoreError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| StoreError::Io {
                path: parent.to_path_buf(),
                source: e,
            }),
        _ => Ok(()),
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let value = sqlx::query_scalar::<_, Vec<u8>>("SELECT value FROM kv WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        sqlx::query(UPSERT)
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn put_batch(&self, entries: &[Entry]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        for (key, value) in entries {
            sqlx::query(UPSERT)
                .bind(key)
                .bind(value)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn insert_if_absent(&self, key: &str, value: &[u8]) -> Result<bool, StoreError> {
        let result = sqlx::query("INSERT OR IGNORE INTO kv (key, value) VALUES (?1, ?2)")
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    fn scan(&self) -> BoxStream<'_, Result<Entry, StoreError>> {
        sqlx::query_as::<_, (String, Vec<u8>)>("SELECT key, value FROM kv ORDER BY key")
            .fetch(&self.pool)
            .map(|row| row.map_err(StoreError::from))
            .boxed()
    }
}
