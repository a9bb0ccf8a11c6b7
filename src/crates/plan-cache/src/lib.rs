//! # plan-cache - Persistent Build Plan Cache
//!
//! Stores encoded work graphs between build invocations so a later run with
//! the same inputs can skip plan calculation entirely.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │  PlanCache<C: PayloadCodec, S: PlanStore>                    │
//! │    load / store / load_or_build / invalidate                 │
//! │                                                              │
//! │    ┌──────────────────────┐    ┌──────────────────────────┐ │
//! │    │ CacheEntryHeader     │    │ WorkNodeCodec<C>         │ │
//! │    │ magic, format,       │ +  │ count | nodes | sentinel │ │
//! │    │ payload codec version│    │                          │ │
//! │    └──────────────────────┘    └──────────────────────────┘ │
//! └──────────────────────────────┬─────────────────────────────┘
//!                                │ bytes
//!                 ┌──────────────┴──────────────┐
//!                 ▼                             ▼
//!        InMemoryPlanStore               FilePlanStore
//!        (tests, single process)         (one file per key)
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use plan_cache::{InMemoryPlanStore, PlanCache, PlanKey};
//! use plan_codec::{BincodePayloadCodec, NodeKindTag, WorkGraph, WorkPayload};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! struct Task(String);
//!
//! impl WorkPayload for Task {
//!     fn kind(&self) -> NodeKindTag {
//!         NodeKindTag::Task
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> plan_cache::Result<()> {
//!     let cache = PlanCache::new(BincodePayloadCodec::<Task>::new(), InMemoryPlanStore::new());
//!     let key = PlanKey::new("inputs-digest");
//!
//!     let plan = cache
//!         .load_or_build(&key, || async {
//!             let mut graph = WorkGraph::new();
//!             let compile = graph.add_node(Task(":compileJava".into()));
//!             let jar = graph.add_node(Task(":jar".into()));
//!             graph.add_dependency(jar, compile)?;
//!             Ok::<_, plan_cache::CacheError>((graph, vec![jar, compile]))
//!         })
//!         .await?;
//!
//!     assert_eq!(plan.len(), 2);
//!     assert!(cache.load(&key).await?.is_some());
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod entry;
pub mod error;
pub mod file;
pub mod memory;
pub mod traits;

pub use cache::PlanCache;
pub use config::CacheConfig;
pub use entry::{CacheEntryHeader, PlanKey};
pub use error::{CacheError, Result};
pub use file::{EntryInfo, FilePlanStore};
pub use memory::InMemoryPlanStore;
pub use traits::{PlanKeyStream, PlanStore};
