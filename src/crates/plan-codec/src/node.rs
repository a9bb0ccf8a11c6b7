//! Work nodes, node kinds and ordering-edge categories
//!
//! A [`WorkNode`] is one schedulable unit of a build plan. Every node carries
//! an opaque payload and a list of *dependencies* (blocking edges). Task nodes
//! additionally carry *must-run-after* (soft-ordering) and *finalized-by*
//! (finalizing) edges. Those two categories live inside [`TaskEdges`], which
//! only exists on the [`NodeKind::Task`] variant, so a plain node cannot hold
//! them.
//!
//! ```text
//!          ┌──────────────┐  blocking      ┌──────────────┐
//!          │  compile (T) │ ─────────────▶ │ resolve (P)  │
//!          └──────────────┘                └──────────────┘
//!            │         │
//!  soft      │         │ finalizing
//!  ordering  ▼         ▼
//!   ┌──────────────┐  ┌──────────────┐
//!   │  clean (T)   │  │  report (T)  │
//!   └──────────────┘  └──────────────┘
//! ```
//!
//! Edges point from a node to its *successor* in the sense of the scheduler's
//! bookkeeping: the target of a blocking edge must complete before the
//! source runs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Batch-local dense identity assigned for one serialization round
pub type SequenceId = u32;

/// Handle of a node inside a [`WorkGraph`](crate::graph::WorkGraph) arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(pub(crate) usize);

impl NodeIndex {
    /// Position of the node in its arena
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Ordering-relation category of an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeCategory {
    /// Target must have completed before the source may run
    Blocking,
    /// Target, if scheduled, must run before the source (task nodes only)
    SoftOrdering,
    /// Target must run after the source if scheduled (task nodes only)
    Finalizing,
}

impl EdgeCategory {
    /// Categories in wire order
    pub const ALL: [EdgeCategory; 3] = [
        EdgeCategory::Blocking,
        EdgeCategory::SoftOrdering,
        EdgeCategory::Finalizing,
    ];

    /// Whether the category is only valid between task nodes
    pub fn is_task_only(self) -> bool {
        !matches!(self, EdgeCategory::Blocking)
    }
}

impl fmt::Display for EdgeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EdgeCategory::Blocking => "blocking",
            EdgeCategory::SoftOrdering => "soft-ordering",
            EdgeCategory::Finalizing => "finalizing",
        };
        f.write_str(name)
    }
}

/// Node kind without its edge storage, as reported by a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKindTag {
    /// Coordination or action node
    Plain,
    /// Executable task
    Task,
}

impl NodeKindTag {
    /// One-byte tag used by payload type headers
    pub fn tag(self) -> u8 {
        match self {
            NodeKindTag::Plain => 0,
            NodeKindTag::Task => 1,
        }
    }

    /// Inverse of [`tag`](Self::tag)
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(NodeKindTag::Plain),
            1 => Some(NodeKindTag::Task),
            _ => None,
        }
    }
}

/// Implemented by node payloads so the node kind can be recovered from the
/// payload's own type information.
pub trait WorkPayload {
    /// Kind of node this payload belongs to
    fn kind(&self) -> NodeKindTag;
}

/// Edge sets only task nodes have
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskEdges {
    must_run_after: Vec<NodeIndex>,
    finalized_by: Vec<NodeIndex>,
}

impl TaskEdges {
    /// Soft-ordering targets
    pub fn must_run_after(&self) -> &[NodeIndex] {
        &self.must_run_after
    }

    /// Finalizing targets
    pub fn finalized_by(&self) -> &[NodeIndex] {
        &self.finalized_by
    }
}

/// Kind of a work node, holding the edge sets specific to that kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Plain node: blocking edges only
    Plain,
    /// Task node with its soft-ordering and finalizing edges
    Task(TaskEdges),
}

impl NodeKind {
    fn for_tag(tag: NodeKindTag) -> Self {
        match tag {
            NodeKindTag::Plain => NodeKind::Plain,
            NodeKindTag::Task => NodeKind::Task(TaskEdges::default()),
        }
    }

    /// Tag of this kind
    pub fn tag(&self) -> NodeKindTag {
        match self {
            NodeKind::Plain => NodeKindTag::Plain,
            NodeKind::Task(_) => NodeKindTag::Task,
        }
    }
}

/// Lifecycle of a node's incoming structural wiring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WiringState {
    /// Edges may still be attached
    Incomplete,
    /// All edges attached and the completion signal delivered
    Complete,
}

/// One schedulable unit of work
#[derive(Debug, Clone)]
pub struct WorkNode<P> {
    payload: P,
    dependencies: Vec<NodeIndex>,
    kind: NodeKind,
    state: WiringState,
}

impl<P: WorkPayload> WorkNode<P> {
    /// Create an unwired node whose kind is taken from the payload
    pub fn new(payload: P) -> Self {
        let kind = NodeKind::for_tag(payload.kind());
        Self {
            payload,
            dependencies: Vec::new(),
            kind,
            state: WiringState::Incomplete,
        }
    }
}

impl<P> WorkNode<P> {
    /// The node's payload
    pub fn payload(&self) -> &P {
        &self.payload
    }

    /// Consume the node, returning its payload
    pub fn into_payload(self) -> P {
        self.payload
    }

    /// The node's kind and kind-specific edges
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Whether this is a task node
    pub fn is_task(&self) -> bool {
        matches!(self.kind, NodeKind::Task(_))
    }

    /// Task-only edge sets, `None` for plain nodes
    pub fn task_edges(&self) -> Option<&TaskEdges> {
        match &self.kind {
            NodeKind::Task(edges) => Some(edges),
            NodeKind::Plain => None,
        }
    }

    /// Blocking targets
    pub fn dependencies(&self) -> &[NodeIndex] {
        &self.dependencies
    }

    /// Targets of the given category; empty for task-only categories on plain nodes
    pub fn successors(&self, category: EdgeCategory) -> &[NodeIndex] {
        match (category, &self.kind) {
            (EdgeCategory::Blocking, _) => &self.dependencies,
            (EdgeCategory::SoftOrdering, NodeKind::Task(edges)) => &edges.must_run_after,
            (EdgeCategory::Finalizing, NodeKind::Task(edges)) => &edges.finalized_by,
            (_, NodeKind::Plain) => &[],
        }
    }

    /// All targets, blocking first, then soft-ordering, then finalizing
    pub fn all_successors(&self) -> impl Iterator<Item = (EdgeCategory, NodeIndex)> + '_ {
        EdgeCategory::ALL.into_iter().flat_map(move |category| {
            self.successors(category)
                .iter()
                .map(move |&target| (category, target))
        })
    }

    /// Current wiring state
    pub fn state(&self) -> WiringState {
        self.state
    }

    /// Whether the completion signal has been delivered
    pub fn is_wiring_complete(&self) -> bool {
        self.state == WiringState::Complete
    }

    /// Attach a target. Returns `false` if the edge already existed or the
    /// category is not available on this node's kind.
    pub(crate) fn attach(&mut self, category: EdgeCategory, target: NodeIndex) -> bool {
        let list = match (category, &mut self.kind) {
            (EdgeCategory::Blocking, _) => &mut self.dependencies,
            (EdgeCategory::SoftOrdering, NodeKind::Task(edges)) => &mut edges.must_run_after,
            (EdgeCategory::Finalizing, NodeKind::Task(edges)) => &mut edges.finalized_by,
            (_, NodeKind::Plain) => return false,
        };
        if list.contains(&target) {
            return false;
        }
        list.push(target);
        true
    }

    /// Transition to [`WiringState::Complete`]
    pub(crate) fn dependencies_processed(&mut self) {
        debug_assert_eq!(
            self.state,
            WiringState::Incomplete,
            "completion signal delivered twice"
        );
        self.state = WiringState::Complete;
    }
}
