//! # plan-codec - Binary Codec for Scheduled Work Graphs
//!
//! Persists a computed build-execution plan so a later run can rebuild the
//! identical plan without resolving dependencies and wiring tasks again.
//!
//! ## Overview
//!
//! A plan is a directed graph of work nodes:
//!
//! - **Plain nodes** - actions and coordination points, blocking edges only
//! - **Task nodes** - executable tasks, which may also carry soft-ordering
//!   (*must run after*) and finalizing (*finalized by*) edges
//!
//! The graph is not a tree. A node can be the target of many edges and the
//! codec must still write it once, and the reader must be able to resolve
//! every edge on the first pass. [`WorkNodeCodec`] achieves this by writing
//! each node's batch successors before the node itself.
//!
//! ## Quick Start
//!
//! ```rust
//! use plan_codec::{BincodePayloadCodec, NodeKindTag, WorkGraph, WorkNodeCodec, WorkPayload};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
//! enum Work {
//!     Resolve(String),
//!     Task(String),
//! }
//!
//! impl WorkPayload for Work {
//!     fn kind(&self) -> NodeKindTag {
//!         match self {
//!             Work::Resolve(_) => NodeKindTag::Plain,
//!             Work::Task(_) => NodeKindTag::Task,
//!         }
//!     }
//! }
//!
//! # fn main() -> plan_codec::Result<()> {
//! let mut graph = WorkGraph::new();
//! let resolve = graph.add_node(Work::Resolve("compileClasspath".into()));
//! let compile = graph.add_node(Work::Task(":compileJava".into()));
//! let jar = graph.add_node(Work::Task(":jar".into()));
//! graph.add_dependency(compile, resolve)?;
//! graph.add_dependency(jar, compile)?;
//!
//! let codec = WorkNodeCodec::new(BincodePayloadCodec::<Work>::new());
//! let bytes = codec.encode(&graph, &[jar, compile, resolve])?;
//! let restored = codec.decode(&bytes)?;
//!
//! assert_eq!(restored.len(), 3);
//! assert!(restored.iter().all(|(_, node)| node.is_wiring_complete()));
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`node`] - [`WorkNode`], [`NodeKind`], [`EdgeCategory`], [`WorkPayload`]
//! - [`graph`] - [`WorkGraph`] arena and [`SequenceIds`]
//! - [`codec`] - [`WorkNodeCodec`] writer/reader and the [`SENTINEL`]
//! - [`payload`] - [`PayloadCodec`] trait and [`BincodePayloadCodec`]
//! - [`scope`] - sharing isolates for embedded object references
//! - [`wire`] - varint and fixed-width primitives
//! - [`config`] - [`CodecConfig`]
//! - [`error`] - [`CodecError`]

pub mod codec;
pub mod config;
pub mod error;
pub mod graph;
pub mod node;
pub mod payload;
pub mod scope;
pub mod wire;

pub use codec::{WorkNodeCodec, SENTINEL};
pub use config::CodecConfig;
pub use error::{CodecError, Result};
pub use graph::{Edge, SequenceIds, WorkGraph};
pub use node::{
    EdgeCategory, NodeIndex, NodeKind, NodeKindTag, SequenceId, TaskEdges, WiringState, WorkNode,
    WorkPayload,
};
pub use payload::{BincodePayloadCodec, PayloadCodec};
pub use scope::{IsolateOwner, ReadIsolate, WriteIsolate};
