//! Whole-store replacement by build-then-rename.
//!
//! A [`StagedStore`] is a fresh, empty store in a temporary file beside the
//! published one. Publishing renames it over the published path in a single
//! filesystem operation, so readers see either the old store or the
//! complete new one. Readers that already have the old file open keep
//! reading the old data.

use std::path::{Path, PathBuf};

use crate::sqlite::SqliteStore;
use crate::StoreError;

pub struct StagedStore {
    store: SqliteStore,
    staging_path: PathBuf,
    target: PathBuf,
    finished: bool,
}

impl StagedStore {
    /// Creates an empty staging store that will replace `target` on publish.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the staging file cannot be created.
    pub async fn create(target: &Path) -> Result<Self, StoreError> {
        let staging_path = staging_path_for(target);
        let store = SqliteStore::create_unjournalled(&staging_path).await?;
        tracing::debug!(
            staging = %staging_path.display(),
            target = %target.display(),
            "created staging store"
        );
        Ok(Self {
            store,
            staging_path,
            target: target.to_path_buf(),
            finished: false,
        })
    }

    /// The store to load. Writes are invisible to readers until publish.
    #[must_use]
    pub fn store(&self) -> &SqliteStore {
        &self.store
    }

    #[must_use]
    pub fn staging_path(&self) -> &Path {
        &self.staging_path
    }

    /// Atomically replaces the target with the staged contents.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the rename fails; the staging file is
    /// then removed and the target is untouched.
    pub async fn publish(mut self) -> Result<(), StoreError> {
        self.store.close().await;
        tokio::fs::rename(&self.staging_path, &self.target)
            .await
            .map_err(|e| StoreError::Io {
                path: self.target.clone(),
                source: e,
            })?;
        self.finished = true;
        tracing::info!(path = %self.target.display(), "published store");
        Ok(())
    }

    /// Drops the staged contents, leaving the target untouched.
    pub async fn discard(mut self) {
        self.store.close().await;
        if let Err(e) = tokio::fs::remove_file(&self.staging_path).await {
            tracing::warn!(
                path = %self.staging_path.display(),
                error = %e,
                "failed to remove staging store"
            );
        }
        self.finished = true;
    }
}

impl Drop for StagedStore {
    fn drop(&mut self) {
        if !self.finished {
            let _ = std::fs::remove_file(&self.staging_path);
        }
    }
}

/// `<dir>/<name>.<uuid>.staging` next to `target`, so the final rename never
/// crosses filesystems.
fn staging_path_for(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map_or_else(|| "store".into(), |n| n.to_string_lossy().into_owned());
    target.with_file_name(format!("{name}.{}.staging", uuid::Uuid::new_v4()))
}
