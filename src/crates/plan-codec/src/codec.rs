//! Work graph writer and reader
//!
//! [`WorkNodeCodec`] flattens a scheduled batch of work nodes into a byte
//! stream and rebuilds it in a single forward pass.
//!
//! # Wire Format
//!
//! ```text
//! count:              varint
//! repeat count times:
//!   node_id:          varint
//!   payload:          <type header + body from the PayloadCodec>
//!   blocking_refs:    varint count, then that many varint ids
//!   [task nodes only]
//!   soft_refs:        varint count, then that many varint ids
//!   finalizing_refs:  varint count, then that many varint ids
//! sentinel:           u64 0xdeadbeef, fixed width, little endian
//! ```
//!
//! # Ordering
//!
//! Before a node's record is written, every batch member it points at (in
//! any edge category) is written first. The reader can therefore resolve
//! each edge reference against nodes it has already rebuilt:
//!
//! ```text
//! batch [A, B, C], A ──▶ C, B ──▶ C
//!
//!   visit A ─▶ visit C ─▶ emit C
//!          └─▶ emit A (refs: C)
//!   visit B ─▶ C already visited
//!          └─▶ emit B (refs: C)
//!
//! stream: 3 | C | A [C] | B [C] | sentinel
//! ```
//!
//! A node reachable from several others is emitted exactly once. Edges to
//! nodes outside the batch are dropped; the target was not scheduled, so
//! the relation does not belong in this plan snapshot.

use crate::config::CodecConfig;
use crate::error::{CodecError, Result};
use crate::graph::{SequenceIds, WorkGraph};
use crate::node::{EdgeCategory, NodeIndex, NodeKindTag, SequenceId, WorkNode, WorkPayload};
use crate::payload::PayloadCodec;
use crate::scope::{IsolateOwner, ReadIsolate, WriteIsolate};
use crate::wire;
use std::collections::HashSet;
use std::io::{Read, Write};

/// End-of-section marker
pub const SENTINEL: u64 = 0xdead_beef;

const PLAIN_CATEGORIES: &[EdgeCategory] = &[EdgeCategory::Blocking];
const TASK_CATEGORIES: &[EdgeCategory] = &EdgeCategory::ALL;

fn categories_for(kind: NodeKindTag) -> &'static [EdgeCategory] {
    match kind {
        NodeKindTag::Plain => PLAIN_CATEGORIES,
        NodeKindTag::Task => TASK_CATEGORIES,
    }
}

/// Serializes and deserializes scheduled work graphs
#[derive(Debug, Clone)]
pub struct WorkNodeCodec<C> {
    payload_codec: C,
    config: CodecConfig,
}

impl<C: PayloadCodec> WorkNodeCodec<C> {
    /// Create a codec with the default configuration
    pub fn new(payload_codec: C) -> Self {
        Self {
            payload_codec,
            config: CodecConfig::default(),
        }
    }

    /// Replace the configuration
    pub fn with_config(mut self, config: CodecConfig) -> Self {
        self.config = config;
        self
    }

    /// Current configuration
    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// The delegate used for node payloads
    pub fn payload_codec(&self) -> &C {
        &self.payload_codec
    }

    /// Encode a batch, assigning sequence ids by batch position
    pub fn encode(&self, graph: &WorkGraph<C::Payload>, batch: &[NodeIndex]) -> Result<Vec<u8>> {
        let ids = SequenceIds::from_batch(batch)?;
        self.encode_with_ids(graph, batch, &ids)
    }

    /// Encode a batch using ids supplied by the scheduler
    pub fn encode_with_ids(
        &self,
        graph: &WorkGraph<C::Payload>,
        batch: &[NodeIndex],
        ids: &SequenceIds,
    ) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write_work(&mut out, graph, batch, ids)?;
        tracing::debug!(nodes = batch.len(), bytes = out.len(), "Encoded work graph");
        Ok(out)
    }

    /// Decode a graph from a byte slice.
    ///
    /// The returned graph holds the nodes in stream order; every node has
    /// completed its wiring.
    pub fn decode(&self, bytes: &[u8]) -> Result<WorkGraph<C::Payload>> {
        let mut input = bytes;
        let graph = self.read_work(&mut input)?;
        tracing::debug!(
            nodes = graph.len(),
            bytes = bytes.len() - input.len(),
            "Decoded work graph"
        );
        Ok(graph)
    }

    /// Write the work graph section for `batch` to `out`.
    ///
    /// `batch` must not repeat a node and `ids` must cover exactly its nodes.
    /// All payloads are written
    /// inside one isolate owned by the configured owner context; task payloads
    /// get an isolate of their own.
    pub fn write_work(
        &self,
        out: &mut dyn Write,
        graph: &WorkGraph<C::Payload>,
        batch: &[NodeIndex],
        ids: &SequenceIds,
    ) -> Result<()> {
        if ids.len() != batch.len() {
            return Err(CodecError::InvalidIdMapping(format!(
                "mapping has {} entries for a batch of {} nodes",
                ids.len(),
                batch.len()
            )));
        }
        let mut seen = HashSet::with_capacity(batch.len());
        for &node in batch {
            graph.get(node)?;
            if !seen.insert(node) {
                return Err(CodecError::InvalidIdMapping(format!(
                    "node {} appears more than once in the batch",
                    node
                )));
            }
            if !ids.contains(node) {
                return Err(CodecError::InvalidIdMapping(format!(
                    "node {} has no sequence id",
                    node
                )));
            }
        }

        let mut writer = GraphWriter {
            codec: &self.payload_codec,
            graph,
            ids,
            visited: vec![false; graph.len()],
            written: vec![false; graph.len()],
            isolate: WriteIsolate::new(self.config.batch_owner()),
            out,
        };
        writer.write_nodes(batch)
    }

    /// Read a work graph section written by [`write_work`](Self::write_work)
    pub fn read_work(&self, input: &mut dyn Read) -> Result<WorkGraph<C::Payload>> {
        let value_limit = self.config.max_value_bytes;
        let mut isolate = ReadIsolate::new(self.config.batch_owner()).with_value_limit(value_limit);

        let count = wire::read_len(input)?;
        if count > self.config.max_node_count {
            return Err(CodecError::NodeCountExceeded {
                count: count as u64,
                limit: self.config.max_node_count,
            });
        }

        let mut reader = GraphReader {
            codec: &self.payload_codec,
            graph: WorkGraph::with_capacity(count),
            nodes_by_id: vec![None; count],
            value_limit,
            input,
        };
        for _ in 0..count {
            reader.read_node(&mut isolate)?;
        }

        let found = wire::read_long(reader.input)?;
        if found != SENTINEL {
            return Err(CodecError::SentinelMismatch {
                expected: SENTINEL,
                found,
            });
        }

        Ok(reader.graph)
    }
}

struct Frame {
    node: NodeIndex,
    successors: std::vec::IntoIter<NodeIndex>,
}

struct GraphWriter<'a, 'w, C: PayloadCodec> {
    codec: &'a C,
    graph: &'a WorkGraph<C::Payload>,
    ids: &'a SequenceIds,
    visited: Vec<bool>,
    written: Vec<bool>,
    isolate: WriteIsolate,
    out: &'a mut (dyn Write + 'w),
}

impl<C: PayloadCodec> GraphWriter<'_, '_, C> {
    fn write_nodes(&mut self, batch: &[NodeIndex]) -> Result<()> {
        wire::write_len(self.out, batch.len())?;
        for &node in batch {
            self.write_node(node)?;
        }
        wire::write_long(self.out, SENTINEL)
    }

    /// Depth-first, post-order: successors in the batch are emitted before
    /// the node itself. Nodes are marked visited on entry.
    fn write_node(&mut self, root: NodeIndex) -> Result<()> {
        if !self.visit(root) {
            return Ok(());
        }

        let mut stack = vec![self.enter(root)?];
        while let Some(frame) = stack.last_mut() {
            match frame.successors.next() {
                Some(successor) => {
                    if self.visit(successor) {
                        stack.push(self.enter(successor)?);
                    }
                }
                None => {
                    let node = frame.node;
                    stack.pop();
                    self.emit(node)?;
                }
            }
        }
        Ok(())
    }

    fn visit(&mut self, node: NodeIndex) -> bool {
        !std::mem::replace(&mut self.visited[node.index()], true)
    }

    fn enter(&self, node: NodeIndex) -> Result<Frame> {
        let successors: Vec<NodeIndex> = self
            .graph
            .get(node)?
            .all_successors()
            .map(|(_, target)| target)
            .filter(|&target| self.ids.contains(target))
            .collect();
        Ok(Frame {
            node,
            successors: successors.into_iter(),
        })
    }

    fn emit(&mut self, index: NodeIndex) -> Result<()> {
        let graph = self.graph;
        let node = graph.get(index)?;
        let id = self.sequence_id(index)?;
        let kind = node.kind().tag();

        wire::write_small_int(self.out, id)?;
        self.codec.encode_kind(node.payload(), self.out)?;
        match kind {
            NodeKindTag::Task => {
                let mut isolate = WriteIsolate::new(IsolateOwner::Node(id));
                self.codec.encode(node.payload(), &mut isolate, self.out)?;
            }
            NodeKindTag::Plain => {
                self.codec.encode(node.payload(), &mut self.isolate, self.out)?;
            }
        }

        for &category in categories_for(kind) {
            self.write_references(id, node, category)?;
        }

        self.written[index.index()] = true;
        tracing::trace!(id, ?kind, "Wrote work node");
        Ok(())
    }

    fn write_references(
        &mut self,
        id: SequenceId,
        node: &WorkNode<C::Payload>,
        category: EdgeCategory,
    ) -> Result<()> {
        let mut references = Vec::with_capacity(node.successors(category).len());
        for &target in node.successors(category) {
            let Some(target_id) = self.ids.get(target) else {
                continue;
            };
            if !self.written[target.index()] {
                return Err(CodecError::UnwrittenReference {
                    node: id,
                    id: target_id,
                    category,
                });
            }
            references.push(target_id);
        }
        wire::write_collection(self.out, &references)
    }

    fn sequence_id(&self, node: NodeIndex) -> Result<SequenceId> {
        self.ids.get(node).ok_or_else(|| {
            CodecError::InvalidIdMapping(format!("node {} has no sequence id", node))
        })
    }
}

struct GraphReader<'a, 'r, C: PayloadCodec> {
    codec: &'a C,
    graph: WorkGraph<C::Payload>,
    nodes_by_id: Vec<Option<NodeIndex>>,
    value_limit: u64,
    input: &'a mut (dyn Read + 'r),
}

impl<C: PayloadCodec> GraphReader<'_, '_, C> {
    fn read_node(&mut self, isolate: &mut ReadIsolate) -> Result<()> {
        let id = wire::read_small_int(self.input)?;
        match self.nodes_by_id.get(id as usize) {
            None => {
                return Err(CodecError::InvalidSequenceId {
                    id: id.into(),
                    count: self.nodes_by_id.len(),
                    reason: "outside the batch",
                })
            }
            Some(Some(_)) => {
                return Err(CodecError::InvalidSequenceId {
                    id: id.into(),
                    count: self.nodes_by_id.len(),
                    reason: "already read",
                })
            }
            Some(None) => {}
        }

        let kind = self.codec.decode_kind(self.input)?;
        let payload = match kind {
            NodeKindTag::Task => {
                let mut node_isolate =
                    ReadIsolate::new(IsolateOwner::Node(id)).with_value_limit(self.value_limit);
                self.codec.decode(kind, &mut node_isolate, self.input)?
            }
            NodeKindTag::Plain => self.codec.decode(kind, isolate, self.input)?,
        };
        if payload.kind() != kind {
            return Err(CodecError::payload(format!(
                "node {} decoded as {:?} under a {:?} header",
                id,
                payload.kind(),
                kind
            )));
        }

        let mut node = WorkNode::new(payload);
        for &category in categories_for(kind) {
            self.read_references(id, &mut node, category)?;
        }

        node.dependencies_processed();
        let index = self.graph.push(node);
        self.nodes_by_id[id as usize] = Some(index);
        tracing::trace!(id, ?kind, "Read work node");
        Ok(())
    }

    fn read_references(
        &mut self,
        id: SequenceId,
        node: &mut WorkNode<C::Payload>,
        category: EdgeCategory,
    ) -> Result<()> {
        let graph = &self.graph;
        let nodes_by_id = &self.nodes_by_id;
        wire::read_collection(self.input, |target_id| {
            let target = nodes_by_id
                .get(target_id as usize)
                .copied()
                .flatten()
                .ok_or(CodecError::UnresolvedReference {
                    node: id,
                    id: target_id,
                    category,
                })?;
            if category.is_task_only() && !graph.get(target)?.is_task() {
                return Err(CodecError::kind_mismatch(
                    category,
                    format!("node {} references plain node {}", id, target_id),
                ));
            }
            node.attach(category, target);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::BincodePayloadCodec;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    enum Work {
        Action(String),
        Task(String),
    }

    impl WorkPayload for Work {
        fn kind(&self) -> NodeKindTag {
            match self {
                Work::Action(_) => NodeKindTag::Plain,
                Work::Task(_) => NodeKindTag::Task,
            }
        }
    }

    fn codec() -> WorkNodeCodec<BincodePayloadCodec<Work>> {
        WorkNodeCodec::new(BincodePayloadCodec::new())
    }

    #[test]
    fn test_empty_batch_bytes() {
        let graph: WorkGraph<Work> = WorkGraph::new();
        let bytes = codec().encode(&graph, &[]).unwrap();

        assert_eq!(bytes, vec![0x00, 0xef, 0xbe, 0xad, 0xde, 0, 0, 0, 0]);
        assert!(codec().decode(&bytes).unwrap().is_empty());
    }

    #[test]
    fn test_single_plain_node_layout() {
        let mut graph = WorkGraph::new();
        let a = graph.add_node(Work::Action("a".into()));

        let bytes = codec().encode(&graph, &[a]).unwrap();

        // count, id, kind tag, enum variant, string len, 'a', blocking count, sentinel
        assert_eq!(
            bytes,
            vec![1, 0, 0, 0, 1, b'a', 0, 0xef, 0xbe, 0xad, 0xde, 0, 0, 0, 0]
        );
    }

    #[test]
    fn test_successor_written_before_dependent() {
        let mut graph = WorkGraph::new();
        let a = graph.add_node(Work::Task("a".into()));
        let b = graph.add_node(Work::Task("b".into()));
        graph.add_dependency(a, b).unwrap();

        let decoded = codec().decode(&codec().encode(&graph, &[a, b]).unwrap()).unwrap();

        let names: Vec<_> = decoded.iter().map(|(_, n)| n.payload().clone()).collect();
        assert_eq!(names, vec![Work::Task("b".into()), Work::Task("a".into())]);
        assert_eq!(decoded.get(NodeIndex(1)).unwrap().dependencies(), &[NodeIndex(0)]);
    }

    #[test]
    fn test_cycle_is_reported_by_writer() {
        let mut graph = WorkGraph::new();
        let a = graph.add_node(Work::Task("a".into()));
        let b = graph.add_node(Work::Task("b".into()));
        graph.add_dependency(a, b).unwrap();
        graph.add_finalized_by(b, a).unwrap();

        let err = codec().encode(&graph, &[a, b]).unwrap_err();
        assert!(matches!(
            err,
            CodecError::UnwrittenReference {
                category: EdgeCategory::Finalizing,
                ..
            }
        ));
    }

    #[test]
    fn test_mapping_must_match_batch() {
        let mut graph = WorkGraph::new();
        let a = graph.add_node(Work::Action("a".into()));
        let b = graph.add_node(Work::Action("b".into()));
        let ids = SequenceIds::from_batch(&[a]).unwrap();

        let err = codec().encode_with_ids(&graph, &[a, b], &ids).unwrap_err();
        assert!(matches!(err, CodecError::InvalidIdMapping(_)));
    }

    #[test]
    fn test_node_count_limit() {
        let mut graph = WorkGraph::new();
        let a = graph.add_node(Work::Action("a".into()));
        let b = graph.add_node(Work::Action("b".into()));
        let bytes = codec().encode(&graph, &[a, b]).unwrap();

        let limited = codec().with_config(CodecConfig::new().with_max_node_count(1));
        let err = limited.decode(&bytes).unwrap_err();
        assert!(matches!(err, CodecError::NodeCountExceeded { count: 2, limit: 1 }));
    }

    #[test]
    fn test_repeated_sequence_id_rejected() {
        // count 2, node 0 (plain "a"), node 0 again
        let mut bytes = vec![2];
        for _ in 0..2 {
            bytes.extend_from_slice(&[0, 0, 0, 1, b'a', 0]);
        }
        bytes.extend_from_slice(&[0xef, 0xbe, 0xad, 0xde, 0, 0, 0, 0]);

        let err = codec().decode(&bytes).unwrap_err();
        assert!(matches!(
            err,
            CodecError::InvalidSequenceId {
                id: 0,
                reason: "already read",
                ..
            }
        ));
    }

    #[test]
    fn test_soft_reference_to_plain_node_rejected() {
        // node 0: plain "a"; node 1: task "t" with soft ref to node 0
        let bytes = vec![
            2, //
            0, 0, 0, 1, b'a', 0, //
            1, 1, 1, 1, b't', 0, 1, 0, 0, //
            0xef, 0xbe, 0xad, 0xde, 0, 0, 0, 0,
        ];

        let err = codec().decode(&bytes).unwrap_err();
        assert!(matches!(
            err,
            CodecError::KindMismatch {
                category: EdgeCategory::SoftOrdering,
                ..
            }
        ));
    }

    #[test]
    fn test_finalizing_reference_to_plain_node_rejected() {
        // node 0: plain "a"; node 1: task "t" finalized by node 0
        let bytes = vec![
            2, //
            0, 0, 0, 1, b'a', 0, //
            1, 1, 1, 1, b't', 0, 0, 1, 0, //
            0xef, 0xbe, 0xad, 0xde, 0, 0, 0, 0,
        ];

        let err = codec().decode(&bytes).unwrap_err();
        assert!(matches!(
            err,
            CodecError::KindMismatch {
                category: EdgeCategory::Finalizing,
                ..
            }
        ));
    }

    #[test]
    fn test_payload_kind_must_match_header() {
        // task header followed by a plain Action body
        let bytes = vec![
            1, //
            0, 1, 0, 1, b'a', 0, 0, 0, //
            0xef, 0xbe, 0xad, 0xde, 0, 0, 0, 0,
        ];

        let err = codec().decode(&bytes).unwrap_err();
        assert!(matches!(err, CodecError::Payload(ref m) if m.contains("under a Task header")));
    }

    #[test]
    fn test_huge_payload_length_is_an_error() {
        // node 0: plain Action whose string claims 2^40 bytes
        let mut bytes = vec![1, 0, 0, 0, 0xfd];
        bytes.extend_from_slice(&(1u64 << 40).to_le_bytes());
        bytes.push(b'a');
        bytes.extend_from_slice(&[0xef, 0xbe, 0xad, 0xde, 0, 0, 0, 0]);

        let err = codec().decode(&bytes).unwrap_err();
        assert!(matches!(err, CodecError::Wire(ref e) if matches!(**e, bincode::ErrorKind::SizeLimit)));
    }

    #[test]
    fn test_value_limit_from_config() {
        let mut graph = WorkGraph::new();
        let t = graph.add_node(Work::Task(":compileJava".into()));
        let bytes = codec().encode(&graph, &[t]).unwrap();

        let strict = codec().with_config(CodecConfig::new().with_max_value_bytes(4));
        assert!(matches!(strict.decode(&bytes), Err(CodecError::Wire(_))));
        assert_eq!(codec().decode(&bytes).unwrap().len(), 1);
    }

    #[test]
    fn test_repeated_batch_node_rejected() {
        let mut graph = WorkGraph::new();
        let a = graph.add_node(Work::Action("a".into()));
        let b = graph.add_node(Work::Action("b".into()));
        let ids = SequenceIds::from_batch(&[a, b]).unwrap();

        let err = codec().encode_with_ids(&graph, &[a, a], &ids).unwrap_err();
        assert!(matches!(err, CodecError::InvalidIdMapping(ref m) if m.contains("more than once")));
    }
}
