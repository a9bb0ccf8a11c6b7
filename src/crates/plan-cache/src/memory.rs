//! In-memory plan storage for development and testing
//!
//! This module provides **[`InMemoryPlanStore`]** - a [`PlanStore`] that keeps
//! every entry in a thread-safe map inside the process.
//!
//! # Overview
//!
//! - **No setup** - nothing on disk, works out of the box
//! - **Thread-safe** - `Arc<RwLock<HashMap>>`, many concurrent readers
//! - **Shared handles** - clones see the same map, so a test can hand one
//!   handle to a [`PlanCache`](crate::PlanCache) and inspect or tamper with
//!   the stored bytes through another
//! - **Ephemeral** - entries are lost when the process exits
//!
//! # When to Use
//!
//! **Use the in-memory store for:**
//! - Unit and integration tests of plan caching
//! - Long-running build daemons that keep plans for their own lifetime
//!
//! **Use [`FilePlanStore`](crate::FilePlanStore) instead for:**
//! - Reusing plans across separate build invocations
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │  InMemoryPlanStore (Clone)                     │
//! │                                                │
//! │  Arc<RwLock<HashMap<PlanKey, Vec<u8>>>>        │
//! │    "digest-a" ─▶ [header | graph section]      │
//! │    "digest-b" ─▶ [header | graph section]      │
//! │                                                │
//! │  get / contains / keys   ─ read lock           │
//! │  put / delete / clear    ─ write lock          │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use plan_cache::{InMemoryPlanStore, PlanKey, PlanStore};
//!
//! # #[tokio::main]
//! # async fn main() -> plan_cache::Result<()> {
//! let store = InMemoryPlanStore::new();
//! let observer = store.clone();
//!
//! store.put(&PlanKey::new("digest-a"), vec![1, 2, 3]).await?;
//! assert_eq!(observer.len().await, 1);
//!
//! observer.clear().await;
//! assert!(store.is_empty().await);
//! # Ok(())
//! # }
//! ```

use crate::entry::PlanKey;
use crate::error::Result;
use crate::traits::{PlanKeyStream, PlanStore};
use async_trait::async_trait;
use futures::stream;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

type PlanStorage = Arc<RwLock<HashMap<PlanKey, Vec<u8>>>>;

/// Thread-safe in-memory plan store
#[derive(Debug, Clone, Default)]
pub struct InMemoryPlanStore {
    storage: PlanStorage,
}

impl InMemoryPlanStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries
    pub async fn len(&self) -> usize {
        self.storage.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.storage.read().await.is_empty()
    }

    /// Remove all entries
    pub async fn clear(&self) {
        self.storage.write().await.clear();
    }
}

#[async_trait]
impl PlanStore for InMemoryPlanStore {
    async fn get(&self, key: &PlanKey) -> Result<Option<Vec<u8>>> {
        Ok(self.storage.read().await.get(key).cloned())
    }

    async fn put(&self, key: &PlanKey, bytes: Vec<u8>) -> Result<()> {
        self.storage.write().await.insert(key.clone(), bytes);
        Ok(())
    }

    async fn delete(&self, key: &PlanKey) -> Result<()> {
        self.storage.write().await.remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<PlanKeyStream> {
        let keys: Vec<_> = self
            .storage
            .read()
            .await
            .keys()
            .cloned()
            .map(Ok)
            .collect();
        Ok(Box::pin(stream::iter(keys)))
    }

    async fn contains(&self, key: &PlanKey) -> Result<bool> {
        Ok(self.storage.read().await.contains_key(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    #[tokio::test]
    async fn test_put_and_get() {
        let store = InMemoryPlanStore::new();
        let key = PlanKey::new("plan-1");

        assert!(store.get(&key).await.unwrap().is_none());
        store.put(&key, vec![1, 2, 3]).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap(), Some(vec![1, 2, 3]));
        assert!(store.contains(&key).await.unwrap());

        store.put(&key, vec![4]).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap(), Some(vec![4]));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = InMemoryPlanStore::new();
        let key = PlanKey::new("plan-1");

        store.put(&key, vec![1]).await.unwrap();
        store.delete(&key).await.unwrap();
        assert!(!store.contains(&key).await.unwrap());

        // deleting again is fine
        store.delete(&key).await.unwrap();
    }

    #[tokio::test]
    async fn test_keys() {
        let store = InMemoryPlanStore::new();
        for name in ["a", "b", "c"] {
            store.put(&PlanKey::new(name), vec![0]).await.unwrap();
        }

        let mut keys: Vec<PlanKey> = store.keys().await.unwrap().try_collect().await.unwrap();
        keys.sort();
        assert_eq!(
            keys,
            vec![PlanKey::from("a"), PlanKey::from("b"), PlanKey::from("c")]
        );
    }

    #[tokio::test]
    async fn test_clear_shared_between_clones() {
        let store = InMemoryPlanStore::new();
        let handle = store.clone();

        store.put(&PlanKey::new("a"), vec![0]).await.unwrap();
        assert_eq!(handle.len().await, 1);

        handle.clear().await;
        assert!(store.is_empty().await);
    }
}
