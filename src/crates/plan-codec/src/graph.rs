//! Work graph arena and batch-local sequence ids
//!
//! [`WorkGraph`] owns every node of a plan. Nodes are addressed by
//! [`NodeIndex`] handles; edges are stored on the source node as lists of
//! target handles. The graph may contain nodes that are not part of the
//! batch being serialized (for example finalizers that were never
//! scheduled). Edges into such nodes are dropped by the writer.
//!
//! [`SequenceIds`] is the writer's node → id mapping. It must cover exactly
//! the scheduled batch with the dense ids `0..N`.

use crate::error::{CodecError, Result};
use crate::node::{EdgeCategory, NodeIndex, SequenceId, WorkNode, WorkPayload};
use std::collections::HashMap;

/// A directed edge between two nodes of the same graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Edge {
    /// Source node
    pub from: NodeIndex,
    /// Target node
    pub to: NodeIndex,
    /// Ordering relation
    pub category: EdgeCategory,
}

/// Arena of work nodes
#[derive(Debug, Clone)]
pub struct WorkGraph<P> {
    nodes: Vec<WorkNode<P>>,
}

impl<P> WorkGraph<P> {
    /// Create an empty graph
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Create an empty graph with room for `capacity` nodes
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
        }
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Look up a node
    pub fn node(&self, index: NodeIndex) -> Option<&WorkNode<P>> {
        self.nodes.get(index.0)
    }

    /// Look up a node, failing on an unknown handle
    pub fn get(&self, index: NodeIndex) -> Result<&WorkNode<P>> {
        self.node(index).ok_or(CodecError::UnknownNode(index))
    }

    /// Handles of all nodes in arena order
    pub fn indices(&self) -> impl ExactSizeIterator<Item = NodeIndex> {
        (0..self.nodes.len()).map(NodeIndex)
    }

    /// All nodes with their handles, in arena order
    pub fn iter(&self) -> impl Iterator<Item = (NodeIndex, &WorkNode<P>)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (NodeIndex(i), node))
    }

    /// Every edge of the graph
    pub fn edges(&self) -> impl Iterator<Item = Edge> + '_ {
        self.iter().flat_map(|(from, node)| {
            node.all_successors()
                .map(move |(category, to)| Edge { from, to, category })
        })
    }

    /// Handles of all nodes; the whole graph as one batch
    pub fn batch(&self) -> Vec<NodeIndex> {
        self.indices().collect()
    }

    /// Consume the graph, returning its nodes in arena order
    pub fn into_nodes(self) -> Vec<WorkNode<P>> {
        self.nodes
    }

    /// Add an edge of the given category.
    ///
    /// Soft-ordering and finalizing edges require both endpoints to be task
    /// nodes. Adding an edge that already exists is a no-op.
    pub fn add_edge(&mut self, from: NodeIndex, to: NodeIndex, category: EdgeCategory) -> Result<()> {
        let target_is_task = self.get(to)?.is_task();
        let source_is_task = self.get(from)?.is_task();

        if category.is_task_only() {
            if !source_is_task {
                return Err(CodecError::kind_mismatch(
                    category,
                    format!("source {} is a plain node", from),
                ));
            }
            if !target_is_task {
                return Err(CodecError::kind_mismatch(
                    category,
                    format!("target {} is a plain node", to),
                ));
            }
        }

        self.nodes[from.0].attach(category, to);
        Ok(())
    }

    /// `from` cannot run until `to` has completed
    pub fn add_dependency(&mut self, from: NodeIndex, to: NodeIndex) -> Result<()> {
        self.add_edge(from, to, EdgeCategory::Blocking)
    }

    /// `from` runs after `to` when both are scheduled
    pub fn add_must_run_after(&mut self, from: NodeIndex, to: NodeIndex) -> Result<()> {
        self.add_edge(from, to, EdgeCategory::SoftOrdering)
    }

    /// `to` runs after `from` whenever it is scheduled
    pub fn add_finalized_by(&mut self, from: NodeIndex, to: NodeIndex) -> Result<()> {
        self.add_edge(from, to, EdgeCategory::Finalizing)
    }

    /// Deliver the completion signal to a node once its wiring is final
    pub fn finish_wiring(&mut self, index: NodeIndex) -> Result<()> {
        let node = self
            .nodes
            .get_mut(index.0)
            .ok_or(CodecError::UnknownNode(index))?;
        if !node.is_wiring_complete() {
            node.dependencies_processed();
        }
        Ok(())
    }

    pub(crate) fn push(&mut self, node: WorkNode<P>) -> NodeIndex {
        let index = NodeIndex(self.nodes.len());
        self.nodes.push(node);
        index
    }
}

impl<P: WorkPayload> WorkGraph<P> {
    /// Add an unwired node; its kind comes from the payload
    pub fn add_node(&mut self, payload: P) -> NodeIndex {
        self.push(WorkNode::new(payload))
    }
}

impl<P> Default for WorkGraph<P> {
    fn default() -> Self {
        Self::new()
    }
}

/// Node → sequence id mapping for one serialization round
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceIds {
    ids: HashMap<NodeIndex, SequenceId>,
}

impl SequenceIds {
    /// Assign ids by position in the batch
    pub fn from_batch(batch: &[NodeIndex]) -> Result<Self> {
        let mut ids = HashMap::with_capacity(batch.len());
        for (position, &node) in batch.iter().enumerate() {
            let id = to_sequence_id(position)?;
            if ids.insert(node, id).is_some() {
                return Err(CodecError::InvalidIdMapping(format!(
                    "node {} appears twice in the batch",
                    node
                )));
            }
        }
        Ok(Self { ids })
    }

    /// Use a mapping supplied by the scheduler.
    ///
    /// The mapping must cover exactly the nodes of `batch` with unique ids in
    /// `0..batch.len()`.
    pub fn from_map(batch: &[NodeIndex], ids: HashMap<NodeIndex, SequenceId>) -> Result<Self> {
        if ids.len() != batch.len() {
            return Err(CodecError::InvalidIdMapping(format!(
                "mapping has {} entries for a batch of {} nodes",
                ids.len(),
                batch.len()
            )));
        }

        let mut seen = vec![false; batch.len()];
        for node in batch {
            let id = *ids.get(node).ok_or_else(|| {
                CodecError::InvalidIdMapping(format!("node {} has no sequence id", node))
            })?;
            let slot = seen.get_mut(id as usize).ok_or_else(|| {
                CodecError::InvalidIdMapping(format!(
                    "id {} of node {} is outside 0..{}",
                    id,
                    node,
                    batch.len()
                ))
            })?;
            if std::mem::replace(slot, true) {
                return Err(CodecError::InvalidIdMapping(format!(
                    "id {} is assigned more than once",
                    id
                )));
            }
        }

        Ok(Self { ids })
    }

    /// Id of a node, `None` when the node is outside the batch
    pub fn get(&self, node: NodeIndex) -> Option<SequenceId> {
        self.ids.get(&node).copied()
    }

    /// Whether the node belongs to the batch
    pub fn contains(&self, node: NodeIndex) -> bool {
        self.ids.contains_key(&node)
    }

    /// Batch size
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the batch is empty
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

pub(crate) fn to_sequence_id(position: usize) -> Result<SequenceId> {
    SequenceId::try_from(position).map_err(|_| {
        CodecError::InvalidIdMapping(format!("batch position {} exceeds the id range", position))
    })
}
