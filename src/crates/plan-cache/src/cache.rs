//! Load-or-build orchestration over a plan store
//!
//! ```text
//! load(key)
//!   │
//!   ├─ store.get ── None ──────────────────────────▶ miss (None)
//!   │
//!   ├─ header check ── stale ── delete ────────────▶ miss (None)
//!   │
//!   ├─ graph decode ── error ── warn!, delete ─────▶ miss (None)
//!   │
//!   └─ Ok(graph) ──────────────────────────────────▶ hit
//! ```
//!
//! Storage failures are the only errors `load` reports. Anything wrong with
//! the entry bytes degrades to a miss so the caller can rebuild the plan.

use crate::config::CacheConfig;
use crate::entry::{CacheEntryHeader, PlanKey};
use crate::error::{CacheError, Result};
use crate::traits::PlanStore;
use plan_codec::{NodeIndex, PayloadCodec, SequenceIds, WorkGraph, WorkNodeCodec};
use std::future::Future;

/// Caches encoded work graphs in a [`PlanStore`]
pub struct PlanCache<C, S> {
    codec: WorkNodeCodec<C>,
    store: S,
    config: CacheConfig,
}

impl<C, S> PlanCache<C, S>
where
    C: PayloadCodec,
    S: PlanStore,
{
    pub fn new(payload_codec: C, store: S) -> Self {
        let config = CacheConfig::default();
        Self {
            codec: WorkNodeCodec::new(payload_codec).with_config(config.codec.clone()),
            store,
            config,
        }
    }

    pub fn with_config(mut self, config: CacheConfig) -> Self {
        self.codec = self.codec.with_config(config.codec.clone());
        self.config = config;
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// The underlying storage backend
    pub fn backend(&self) -> &S {
        &self.store
    }

    /// Encode `batch` with scheduler-supplied ids and store it under `key`
    #[tracing::instrument(skip(self, graph, batch, ids))]
    pub async fn store(
        &self,
        key: &PlanKey,
        graph: &WorkGraph<C::Payload>,
        batch: &[NodeIndex],
        ids: &SequenceIds,
    ) -> Result<()> {
        let bytes = self.encode_entry(graph, batch, ids)?;
        tracing::debug!(nodes = batch.len(), bytes = bytes.len(), "Storing plan");
        self.store.put(key, bytes).await
    }

    /// Store `batch` with ids assigned by batch position
    pub async fn store_batch(
        &self,
        key: &PlanKey,
        graph: &WorkGraph<C::Payload>,
        batch: &[NodeIndex],
    ) -> Result<()> {
        let ids = SequenceIds::from_batch(batch)?;
        self.store(key, graph, batch, &ids).await
    }

    /// Load the plan stored under `key`.
    ///
    /// Returns `Ok(None)` on a miss, and also when the entry is stale or
    /// unreadable; such entries are removed from the store.
    #[tracing::instrument(skip(self))]
    pub async fn load(&self, key: &PlanKey) -> Result<Option<WorkGraph<C::Payload>>> {
        let bytes = match self.store.get(key).await? {
            Some(bytes) => bytes,
            None => {
                tracing::debug!("Plan cache miss");
                return Ok(None);
            }
        };

        match self.decode_entry(&bytes) {
            Ok(graph) => {
                tracing::debug!(nodes = graph.len(), "Plan cache hit");
                Ok(Some(graph))
            }
            Err(CacheError::StaleEntry(reason)) => {
                tracing::debug!(%reason, "Discarding stale plan");
                self.store.delete(key).await?;
                Ok(None)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable plan");
                self.store.delete(key).await?;
                Ok(None)
            }
        }
    }

    /// Load the plan under `key`, or build, store and return it on a miss.
    ///
    /// A freshly built plan is returned as decoded from the stored bytes, so
    /// callers see the same stream-ordered graph a later hit would give them.
    #[tracing::instrument(skip(self, build))]
    pub async fn load_or_build<F, Fut>(&self, key: &PlanKey, build: F) -> Result<WorkGraph<C::Payload>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(WorkGraph<C::Payload>, Vec<NodeIndex>)>>,
    {
        if let Some(graph) = self.load(key).await? {
            return Ok(graph);
        }

        let (graph, batch) = build().await?;
        let ids = SequenceIds::from_batch(&batch)?;
        let bytes = self.encode_entry(&graph, &batch, &ids)?;
        let restored = self.decode_entry(&bytes)?;

        tracing::debug!(nodes = batch.len(), bytes = bytes.len(), "Storing built plan");
        self.store.put(key, bytes).await?;
        Ok(restored)
    }

    /// Remove the plan stored under `key`
    #[tracing::instrument(skip(self))]
    pub async fn invalidate(&self, key: &PlanKey) -> Result<()> {
        self.store.delete(key).await
    }

    fn encode_entry(
        &self,
        graph: &WorkGraph<C::Payload>,
        batch: &[NodeIndex],
        ids: &SequenceIds,
    ) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        CacheEntryHeader::new(self.config.payload_codec_version).write_to(&mut out)?;
        self.codec.write_work(&mut out, graph, batch, ids)?;
        Ok(out)
    }

    fn decode_entry(&self, bytes: &[u8]) -> Result<WorkGraph<C::Payload>> {
        let mut input = bytes;
        let header = CacheEntryHeader::read_from(&mut input)?;
        header.check(self.config.payload_codec_version)?;
        Ok(self.codec.read_work(&mut input)?)
    }
}
