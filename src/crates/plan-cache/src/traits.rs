//! Extensible storage trait for cached plans
//!
//! This module defines **[`PlanStore`]** - the abstraction a
//! [`PlanCache`](crate::PlanCache) writes its entries through. Implement it to
//! keep plans in a remote cache, a database or any other byte store.
//!
//! # Overview
//!
//! A plan store is a plain key/value store of opaque byte entries. It knows
//! nothing about headers or work graphs; the cache frames, validates and
//! discards entries on its own. A store only has to:
//!
//! - return exactly the bytes last written for a key
//! - replace entries atomically (old or new, never a mix)
//! - treat deleting a missing key as success
//!
//! # Core Types
//!
//! - [`PlanStore`] - async trait, `Send + Sync`
//! - [`PlanKeyStream`] - boxed stream returned by [`PlanStore::keys`]
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────┐
//! │  PlanCache               │
//! │  header + WorkNodeCodec  │
//! └────────────┬─────────────┘
//!              │ put(key, bytes) / get(key) / delete(key)
//!              ▼
//! ┌──────────────────────────┐
//! │  S: PlanStore            │
//! ├──────────────────────────┤
//! │  InMemoryPlanStore       │  tests, single process
//! │  FilePlanStore           │  one file per key
//! │  <your backend>          │
//! └──────────────────────────┘
//! ```
//!
//! # Implementing a backend
//!
//! ```rust
//! use async_trait::async_trait;
//! use plan_cache::{PlanKey, PlanKeyStream, PlanStore, Result};
//!
//! struct NullStore;
//!
//! #[async_trait]
//! impl PlanStore for NullStore {
//!     async fn get(&self, _key: &PlanKey) -> Result<Option<Vec<u8>>> {
//!         Ok(None)
//!     }
//!
//!     async fn put(&self, _key: &PlanKey, _bytes: Vec<u8>) -> Result<()> {
//!         Ok(())
//!     }
//!
//!     async fn delete(&self, _key: &PlanKey) -> Result<()> {
//!         Ok(())
//!     }
//!
//!     async fn keys(&self) -> Result<PlanKeyStream> {
//!         Ok(Box::pin(futures::stream::empty::<Result<PlanKey>>()))
//!     }
//! }
//! ```

use crate::entry::PlanKey;
use crate::error::Result;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

/// Stream of keys currently held by a store
pub type PlanKeyStream = Pin<Box<dyn Stream<Item = Result<PlanKey>> + Send + 'static>>;

/// Byte storage for cached plan entries
#[async_trait]
pub trait PlanStore: Send + Sync {
    /// Fetch the entry stored under `key`, or `None` on a miss
    async fn get(&self, key: &PlanKey) -> Result<Option<Vec<u8>>>;

    /// Store `bytes` under `key`, replacing any previous entry.
    ///
    /// Readers must observe either the old or the new entry, never a
    /// partially written one.
    async fn put(&self, key: &PlanKey, bytes: Vec<u8>) -> Result<()>;

    /// Remove the entry under `key`. Removing a missing key is not an error.
    async fn delete(&self, key: &PlanKey) -> Result<()>;

    /// List the keys of all stored entries
    async fn keys(&self) -> Result<PlanKeyStream>;

    /// Check whether an entry exists under `key`
    async fn contains(&self, key: &PlanKey) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }
}
