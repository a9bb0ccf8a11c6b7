//! Sharing scopes for object references embedded in node payloads
//!
//! Payloads often hold references to objects that several nodes point at
//! (a shared configuration, a toolchain description). Inside one isolate a
//! shared object is written once; later occurrences are written as a slot
//! reference and re-linked to the same `Arc` on read.
//!
//! The graph codec opens one isolate owned by the batch for all plain
//! nodes. Every task node gets its own isolate owned by that node, so two
//! task nodes never end up aliasing the same embedded object after a read.
//!
//! # Wire Layout
//!
//! ```text
//! shared reference:  varint 0, then the value      (first occurrence)
//!                    varint slot + 1                (back reference)
//! ```
//!
//! A [`WriteIsolate`] holds a clone of every `Arc` it has written. Identity
//! is the allocation address, and the address must not be freed and handed
//! to a different object while the isolate is open.

use crate::error::{CodecError, Result};
use crate::node::SequenceId;
use crate::wire;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;

/// Owner of a sharing isolate
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IsolateOwner {
    /// The whole batch, bound to a caller-supplied owner context
    Batch(String),
    /// A single task node
    Node(SequenceId),
}

impl fmt::Display for IsolateOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IsolateOwner::Batch(owner) => write!(f, "batch isolate '{}'", owner),
            IsolateOwner::Node(id) => write!(f, "isolate of node {}", id),
        }
    }
}

/// Write side of a sharing isolate
pub struct WriteIsolate {
    owner: IsolateOwner,
    slots: HashMap<usize, usize>,
    pinned: Vec<Arc<dyn Any + Send + Sync>>,
}

impl WriteIsolate {
    /// Open an empty isolate
    pub fn new(owner: IsolateOwner) -> Self {
        Self {
            owner,
            slots: HashMap::new(),
            pinned: Vec::new(),
        }
    }

    /// Owner of this isolate
    pub fn owner(&self) -> &IsolateOwner {
        &self.owner
    }

    /// Number of distinct objects written so far
    pub fn shared_count(&self) -> usize {
        self.slots.len()
    }

    /// Write a shared object, or a back reference if it was already written
    /// in this isolate. Identity is the `Arc` allocation.
    pub fn write_shared<T, W>(&mut self, value: &Arc<T>, out: &mut W) -> Result<()>
    where
        T: Serialize + Send + Sync + 'static,
        W: Write + ?Sized,
    {
        let address = Arc::as_ptr(value) as *const () as usize;
        if let Some(&slot) = self.slots.get(&address) {
            return wire::write_len(out, slot + 1);
        }

        let slot = self.slots.len();
        self.slots.insert(address, slot);
        self.pinned.push(value.clone());
        wire::write_len(out, 0)?;
        wire::write_value(out, value.as_ref())
    }
}

impl fmt::Debug for WriteIsolate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteIsolate")
            .field("owner", &self.owner)
            .field("shared_count", &self.slots.len())
            .finish()
    }
}

/// Read side of a sharing isolate
pub struct ReadIsolate {
    owner: IsolateOwner,
    objects: Vec<Arc<dyn Any + Send + Sync>>,
    value_limit: u64,
}

impl ReadIsolate {
    /// Open an empty isolate with the default value limit
    pub fn new(owner: IsolateOwner) -> Self {
        Self {
            owner,
            objects: Vec::new(),
            value_limit: wire::DEFAULT_VALUE_LIMIT,
        }
    }

    /// Limit the size of any single value read in this isolate
    pub fn with_value_limit(mut self, value_limit: u64) -> Self {
        self.value_limit = value_limit;
        self
    }

    /// Owner of this isolate
    pub fn owner(&self) -> &IsolateOwner {
        &self.owner
    }

    /// Largest number of bytes a single value may occupy.
    ///
    /// Payload codecs pass this to [`wire::read_value_limited`].
    pub fn value_limit(&self) -> u64 {
        self.value_limit
    }

    /// Number of distinct objects read so far
    pub fn shared_count(&self) -> usize {
        self.objects.len()
    }

    /// Read a shared object written by [`WriteIsolate::write_shared`]
    pub fn read_shared<T, R>(&mut self, input: &mut R) -> Result<Arc<T>>
    where
        T: DeserializeOwned + Send + Sync + 'static,
        R: Read + ?Sized,
    {
        let marker = wire::read_len(input)?;
        if marker == 0 {
            let value: Arc<T> = Arc::new(wire::read_value_limited(input, self.value_limit)?);
            self.objects.push(value.clone());
            return Ok(value);
        }

        let slot = marker - 1;
        let object = self
            .objects
            .get(slot)
            .cloned()
            .ok_or_else(|| CodecError::UnknownSharedSlot {
                slot,
                owner: self.owner.to_string(),
            })?;
        object
            .downcast::<T>()
            .map_err(|_| CodecError::SharedTypeMismatch {
                slot,
                owner: self.owner.to_string(),
                expected: std::any::type_name::<T>(),
            })
    }
}

impl fmt::Debug for ReadIsolate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadIsolate")
            .field("owner", &self.owner)
            .field("shared_count", &self.objects.len())
            .field("value_limit", &self.value_limit)
            .finish()
    }
}
