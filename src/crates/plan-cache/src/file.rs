//! File-system plan storage
//!
//! This module provides **[`FilePlanStore`]** - a [`PlanStore`] that keeps one
//! file per cached plan under a root directory, so plans survive across
//! build invocations.
//!
//! # Overview
//!
//! - **Persistent** - entries outlive the process that wrote them
//! - **Atomic replace** - each write goes to a temp file that is renamed
//!   over the destination; readers never see a half-written entry
//! - **Any key length** - file names are the SHA-256 digest of the key, so
//!   long keys never hit file name limits
//! - **Inspectable** - every entry has a JSON sidecar with its key, size and
//!   write time
//!
//! # Layout
//!
//! ```text
//! <root>/
//!   <sha256(key)>.plan     entry bytes (header + work graph section)
//!   <sha256(key)>.json     EntryInfo { key, size, stored_at }
//!   <sha256(key)>.<pid>.<n>.tmp   in-flight write, renamed on completion
//! ```
//!
//! The digest cannot be reversed, so [`keys`](PlanStore::keys) recovers the
//! original keys from the sidecars. An entry is listed once both files are in
//! place: the `.plan` file is renamed first, then the sidecar.
//!
//! # When to Use
//!
//! - Local build caches shared by consecutive runs on one machine
//! - Tests that need to check behaviour across a store reopen
//!
//! Several processes may write the same key concurrently; the last rename
//! wins. There is no locking beyond that.
//!
//! # Example
//!
//! ```rust
//! use plan_cache::{FilePlanStore, PlanKey, PlanStore};
//!
//! # #[tokio::main]
//! # async fn main() -> plan_cache::Result<()> {
//! let dir = std::env::temp_dir().join("plan-cache-doc");
//! let store = FilePlanStore::open(&dir).await?;
//! let key = PlanKey::new("inputs-digest");
//!
//! store.put(&key, vec![1, 2, 3]).await?;
//! assert_eq!(store.get(&key).await?, Some(vec![1, 2, 3]));
//! assert_eq!(store.info(&key).await?.map(|info| info.size), Some(3));
//!
//! store.delete(&key).await?;
//! # Ok(())
//! # }
//! ```

use crate::entry::PlanKey;
use crate::error::{CacheError, Result};
use crate::traits::{PlanKeyStream, PlanStore};
use async_trait::async_trait;
use futures::stream;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs;

const ENTRY_EXTENSION: &str = "plan";
const INFO_EXTENSION: &str = "json";
const TEMP_EXTENSION: &str = "tmp";

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Metadata kept beside each entry file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryInfo {
    pub key: PlanKey,
    pub size: u64,
    /// Seconds since the Unix epoch
    pub stored_at: u64,
}

/// Plan store backed by one file per key
#[derive(Debug, Clone)]
pub struct FilePlanStore {
    root: PathBuf,
}

impl FilePlanStore {
    /// Open a store rooted at `root`, creating the directory if needed
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        tracing::debug!(root = %root.display(), "Opened file plan store");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Metadata recorded for `key`, if the entry exists
    pub async fn info(&self, key: &PlanKey) -> Result<Option<EntryInfo>> {
        match read_optional(&self.path_for(key, INFO_EXTENSION)?).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn path_for(&self, key: &PlanKey, extension: &str) -> Result<PathBuf> {
        if key.as_str().is_empty() {
            return Err(CacheError::InvalidKey("key must not be empty".to_string()));
        }
        Ok(self
            .root
            .join(format!("{}.{}", key.file_stem(), extension)))
    }

    async fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| CacheError::Storage(format!("bad entry path {}", path.display())))?;
        let temp = self.root.join(format!(
            "{}.{}.{}.{}",
            stem,
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed),
            TEMP_EXTENSION
        ));

        fs::write(&temp, bytes).await?;
        if let Err(e) = fs::rename(&temp, path).await {
            let _ = fs::remove_file(&temp).await;
            return Err(CacheError::Storage(format!(
                "Failed to rename {} to {}: {}",
                temp.display(),
                path.display(),
                e
            )));
        }
        Ok(())
    }

    /// Key recorded in the sidecar at `path`, if it belongs to a live entry
    async fn listed_key(&self, path: &Path) -> Option<PlanKey> {
        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Skipping unreadable sidecar");
                return None;
            }
        };
        let info: EntryInfo = match serde_json::from_slice(&bytes) {
            Ok(info) => info,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Skipping foreign file");
                return None;
            }
        };

        let entry_path = self.path_for(&info.key, ENTRY_EXTENSION).ok()?;
        if entry_path.with_extension(INFO_EXTENSION) != path {
            tracing::debug!(path = %path.display(), "Skipping misplaced sidecar");
            return None;
        }
        match fs::try_exists(&entry_path).await {
            Ok(true) => Some(info.key),
            _ => None,
        }
    }
}

async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn remove_optional(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl PlanStore for FilePlanStore {
    async fn get(&self, key: &PlanKey) -> Result<Option<Vec<u8>>> {
        read_optional(&self.path_for(key, ENTRY_EXTENSION)?).await
    }

    async fn put(&self, key: &PlanKey, bytes: Vec<u8>) -> Result<()> {
        let entry_path = self.path_for(key, ENTRY_EXTENSION)?;
        let info_path = self.path_for(key, INFO_EXTENSION)?;

        let info = EntryInfo {
            key: key.clone(),
            size: bytes.len() as u64,
            stored_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        };

        self.write_atomic(&entry_path, &bytes).await?;
        self.write_atomic(&info_path, &serde_json::to_vec_pretty(&info)?)
            .await?;

        tracing::trace!(key = %key, bytes = bytes.len(), "Wrote plan entry");
        Ok(())
    }

    async fn delete(&self, key: &PlanKey) -> Result<()> {
        remove_optional(&self.path_for(key, ENTRY_EXTENSION)?).await?;
        remove_optional(&self.path_for(key, INFO_EXTENSION)?).await
    }

    async fn keys(&self) -> Result<PlanKeyStream> {
        let mut keys = Vec::new();
        let mut dir = fs::read_dir(&self.root).await?;

        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(INFO_EXTENSION) {
                continue;
            }
            if let Some(key) = self.listed_key(&path).await {
                keys.push(Ok(key));
            }
        }

        Ok(Box::pin(stream::iter(keys)))
    }

    async fn contains(&self, key: &PlanKey) -> Result<bool> {
        Ok(fs::try_exists(self.path_for(key, ENTRY_EXTENSION)?).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use tempfile::TempDir;

    async fn open_store(dir: &TempDir) -> FilePlanStore {
        FilePlanStore::open(dir.path().join("plans")).await.unwrap()
    }

    async fn file_names(store: &FilePlanStore) -> Vec<String> {
        let mut names = Vec::new();
        let mut entries = fs::read_dir(store.root()).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;
        let key = PlanKey::new("configuration-cache/7f3a");

        assert!(store.get(&key).await.unwrap().is_none());
        assert!(!store.contains(&key).await.unwrap());

        store.put(&key, vec![9, 8, 7]).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap(), Some(vec![9, 8, 7]));
        assert!(store.contains(&key).await.unwrap());

        let info = store.info(&key).await.unwrap().unwrap();
        assert_eq!(info.key, key);
        assert_eq!(info.size, 3);
    }

    #[tokio::test]
    async fn test_overwrite_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;
        let key = PlanKey::new("k");

        store.put(&key, vec![1]).await.unwrap();
        store.put(&key, vec![2, 2]).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap(), Some(vec![2, 2]));

        let stem = key.file_stem();
        assert_eq!(
            file_names(&store).await,
            vec![format!("{}.json", stem), format!("{}.plan", stem)]
        );
    }

    #[tokio::test]
    async fn test_long_keys() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;
        let key = PlanKey::new("x".repeat(200));

        store.put(&key, vec![1]).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap(), Some(vec![1]));

        let keys: Vec<PlanKey> = store.keys().await.unwrap().try_collect().await.unwrap();
        assert_eq!(keys, vec![key]);
    }

    #[tokio::test]
    async fn test_delete() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;
        let key = PlanKey::new("k");

        store.put(&key, vec![1]).await.unwrap();
        store.delete(&key).await.unwrap();
        assert!(store.get(&key).await.unwrap().is_none());
        assert!(store.info(&key).await.unwrap().is_none());
        assert!(file_names(&store).await.is_empty());

        store.delete(&key).await.unwrap();
    }

    #[tokio::test]
    async fn test_keys_skip_foreign_files() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        store.put(&PlanKey::new("alpha"), vec![1]).await.unwrap();
        store.put(&PlanKey::new("beta"), vec![2]).await.unwrap();
        fs::write(store.root().join("README.plan"), b"x").await.unwrap();
        fs::write(store.root().join("notes.json"), b"{}").await.unwrap();
        fs::write(store.root().join("notes.txt"), b"x").await.unwrap();

        let mut keys: Vec<PlanKey> = store.keys().await.unwrap().try_collect().await.unwrap();
        keys.sort();
        assert_eq!(keys, vec![PlanKey::from("alpha"), PlanKey::from("beta")]);
    }

    #[tokio::test]
    async fn test_keys_skip_sidecar_without_entry() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;
        let key = PlanKey::new("orphan");

        store.put(&key, vec![1]).await.unwrap();
        fs::remove_file(store.root().join(format!("{}.plan", key.file_stem())))
            .await
            .unwrap();

        let keys: Vec<PlanKey> = store.keys().await.unwrap().try_collect().await.unwrap();
        assert!(keys.is_empty());
    }

    #[tokio::test]
    async fn test_reopen_sees_entries() {
        let dir = TempDir::new().unwrap();
        let key = PlanKey::new("persisted");

        open_store(&dir).await.put(&key, vec![5]).await.unwrap();

        let reopened = open_store(&dir).await;
        assert_eq!(reopened.get(&key).await.unwrap(), Some(vec![5]));
    }

    #[tokio::test]
    async fn test_empty_key_rejected() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        let err = store.put(&PlanKey::new(""), vec![1]).await.unwrap_err();
        assert!(matches!(err, CacheError::InvalidKey(_)));
    }
}
