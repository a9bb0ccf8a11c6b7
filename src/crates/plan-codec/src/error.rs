//! Error types for work graph encoding and decoding
//!
//! Every error in this module is a whole-batch failure. The codec never
//! recovers from a partially decoded stream; callers discard the result and
//! rebuild the plan from scratch.
//!
//! # Error Hierarchy
//!
//! ```text
//! CodecError
//! ├── SentinelMismatch      - End-of-section marker wrong (truncation/misalignment)
//! ├── UnresolvedReference   - Edge target id not yet reconstructed
//! ├── UnwrittenReference    - Writer would emit a reference to a node not yet written
//! ├── KindMismatch          - Task-only edge on a plain node
//! ├── InvalidSequenceId     - Id outside [0, N) or repeated
//! ├── InvalidIdMapping      - Writer mapping does not cover the batch densely
//! ├── NodeCountExceeded     - Stream declares more nodes than allowed
//! ├── SharedTypeMismatch    - Shared reference re-linked to the wrong type
//! ├── UnknownSharedSlot     - Shared reference to a slot never written
//! ├── UnknownKindTag        - Payload type header not recognised
//! ├── Payload               - Failure inside a payload codec
//! ├── Wire                  - bincode primitive failure (includes EOF)
//! ├── Io                    - Raw I/O failure
//! └── Configuration         - Invalid codec configuration
//! ```

use crate::node::{EdgeCategory, NodeIndex, SequenceId};
use thiserror::Error;

/// Result type for codec operations
pub type Result<T> = std::result::Result<T, CodecError>;

/// Errors that can occur while encoding or decoding a work graph
#[derive(Error, Debug)]
pub enum CodecError {
    /// The end-of-section marker did not match.
    ///
    /// Indicates a truncated or misaligned stream. The whole cached plan is
    /// unusable.
    #[error("Work graph sentinel mismatch: expected {expected:#x}, found {found:#x}")]
    SentinelMismatch {
        /// The fixed sentinel constant
        expected: u64,
        /// The value actually read
        found: u64,
    },

    /// An edge referenced a sequence id that has not been reconstructed yet
    #[error("Unresolved {category} reference to node {id} while reading node {node}")]
    UnresolvedReference {
        /// Node whose edge list was being read
        node: SequenceId,
        /// The missing target id
        id: SequenceId,
        /// Category of the edge
        category: EdgeCategory,
    },

    /// The writer would reference a batch node that is not yet in the stream
    #[error("Node {node} references node {id} ({category}) before it was written; the graph contains a cycle")]
    UnwrittenReference {
        /// Node whose edge list was being written
        node: SequenceId,
        /// Target not yet written
        id: SequenceId,
        /// Category of the edge
        category: EdgeCategory,
    },

    /// A task-only edge category was used with a plain node
    #[error("{category} edges require task nodes: {detail}")]
    KindMismatch {
        /// Category of the offending edge
        category: EdgeCategory,
        /// Which endpoint was not a task
        detail: String,
    },

    /// A decoded sequence id was outside the batch or repeated
    #[error("Invalid sequence id {id} in batch of {count} nodes: {reason}")]
    InvalidSequenceId {
        /// Offending id
        id: u64,
        /// Declared batch size
        count: usize,
        /// Why it was rejected
        reason: &'static str,
    },

    /// The writer's node to sequence id mapping is not a dense bijection over the batch
    #[error("Invalid sequence id mapping: {0}")]
    InvalidIdMapping(String),

    /// A node index does not belong to the graph
    #[error("Unknown node index {0}")]
    UnknownNode(NodeIndex),

    /// The stream declares a batch larger than the configured maximum
    #[error("Work graph declares {count} nodes, limit is {limit}")]
    NodeCountExceeded {
        /// Declared count
        count: u64,
        /// Configured limit
        limit: usize,
    },

    /// A shared reference resolved to an object of another type
    #[error("Shared object in slot {slot} of {owner} is not a {expected}")]
    SharedTypeMismatch {
        /// Slot index within the isolate
        slot: usize,
        /// Isolate owner description
        owner: String,
        /// Requested type name
        expected: &'static str,
    },

    /// A shared reference pointed to a slot that was never written
    #[error("Shared object slot {slot} of {owner} was never written")]
    UnknownSharedSlot {
        /// Slot index within the isolate
        slot: usize,
        /// Isolate owner description
        owner: String,
    },

    /// The payload type header carried an unknown kind tag
    #[error("Unknown node kind tag {0}")]
    UnknownKindTag(u8),

    /// Failure reported by a payload codec
    #[error("Payload codec error: {0}")]
    Payload(String),

    /// Binary primitive encoding failed (includes unexpected end of stream)
    #[error("Wire encoding error: {0}")]
    Wire(#[from] bincode::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl CodecError {
    /// Create a payload codec error
    pub fn payload(message: impl Into<String>) -> Self {
        Self::Payload(message.into())
    }

    /// Create a kind mismatch error for a task-only edge category
    pub fn kind_mismatch(category: EdgeCategory, detail: impl Into<String>) -> Self {
        Self::KindMismatch {
            category,
            detail: detail.into(),
        }
    }

    /// Whether the error indicates a truncated stream rather than bad content
    pub fn is_truncation(&self) -> bool {
        match self {
            CodecError::Io(e) => e.kind() == std::io::ErrorKind::UnexpectedEof,
            CodecError::Wire(e) => matches!(
                e.as_ref(),
                bincode::ErrorKind::Io(io) if io.kind() == std::io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }
}
