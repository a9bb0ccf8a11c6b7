//! Node payload codecs
//!
//! The graph codec treats a node's payload as opaque and delegates it to a
//! [`PayloadCodec`]. A payload codec writes a small type header from which
//! the node kind can be recovered, followed by the payload body. The body is
//! written against a sharing isolate chosen by the graph codec:
//!
//! - plain nodes: the batch-wide isolate
//! - task nodes: a fresh isolate owned by the node
//!
//! [`BincodePayloadCodec`] covers payloads that are plain serde types.
//! Payloads that embed shared objects implement [`PayloadCodec`] by hand and
//! route those objects through [`WriteIsolate::write_shared`] /
//! [`ReadIsolate::read_shared`].

use crate::error::{CodecError, Result};
use crate::node::{NodeKindTag, WorkPayload};
use crate::scope::{ReadIsolate, WriteIsolate};
use crate::wire;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{Read, Write};
use std::marker::PhantomData;

/// Encodes and decodes the type-specific data of one work node
pub trait PayloadCodec {
    /// Payload type handled by this codec
    type Payload: WorkPayload;

    /// Write the payload's type header.
    ///
    /// The default writes the kind tag as one byte.
    fn encode_kind(&self, payload: &Self::Payload, out: &mut dyn Write) -> Result<()> {
        wire::write_byte(out, payload.kind().tag())
    }

    /// Read a header written by [`encode_kind`](Self::encode_kind)
    fn decode_kind(&self, input: &mut dyn Read) -> Result<NodeKindTag> {
        let tag = wire::read_byte(input)?;
        NodeKindTag::from_tag(tag).ok_or(CodecError::UnknownKindTag(tag))
    }

    /// Write the payload body within `isolate`
    fn encode(
        &self,
        payload: &Self::Payload,
        isolate: &mut WriteIsolate,
        out: &mut dyn Write,
    ) -> Result<()>;

    /// Read a payload body of the given kind within `isolate`
    fn decode(
        &self,
        kind: NodeKindTag,
        isolate: &mut ReadIsolate,
        input: &mut dyn Read,
    ) -> Result<Self::Payload>;
}

/// Payload codec for serde payload types without shared references
pub struct BincodePayloadCodec<P> {
    _payload: PhantomData<fn() -> P>,
}

impl<P> BincodePayloadCodec<P> {
    pub fn new() -> Self {
        Self {
            _payload: PhantomData,
        }
    }
}

impl<P> Default for BincodePayloadCodec<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> Clone for BincodePayloadCodec<P> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<P> std::fmt::Debug for BincodePayloadCodec<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BincodePayloadCodec").finish()
    }
}

impl<P> PayloadCodec for BincodePayloadCodec<P>
where
    P: WorkPayload + Serialize + DeserializeOwned,
{
    type Payload = P;

    fn encode(&self, payload: &P, _isolate: &mut WriteIsolate, out: &mut dyn Write) -> Result<()> {
        wire::write_value(out, payload)
    }

    fn decode(&self, _kind: NodeKindTag, isolate: &mut ReadIsolate, input: &mut dyn Read) -> Result<P> {
        wire::read_value_limited(input, isolate.value_limit())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::IsolateOwner;
    use serde::Deserialize;
    use std::io::Cursor;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Step {
        name: String,
        task: bool,
    }

    impl WorkPayload for Step {
        fn kind(&self) -> NodeKindTag {
            if self.task {
                NodeKindTag::Task
            } else {
                NodeKindTag::Plain
            }
        }
    }

    #[test]
    fn test_bincode_payload_codec() {
        let codec = BincodePayloadCodec::<Step>::new();
        let step = Step {
            name: "compileJava".into(),
            task: true,
        };

        let mut buf = Vec::new();
        let mut isolate = WriteIsolate::new(IsolateOwner::Node(0));
        codec.encode_kind(&step, &mut buf).unwrap();
        codec.encode(&step, &mut isolate, &mut buf).unwrap();

        let mut input = Cursor::new(buf);
        let mut isolate = ReadIsolate::new(IsolateOwner::Node(0));
        let kind = codec.decode_kind(&mut input).unwrap();
        let decoded = codec.decode(kind, &mut isolate, &mut input).unwrap();

        assert_eq!(kind, NodeKindTag::Task);
        assert_eq!(decoded, step);
    }

    #[test]
    fn test_unknown_kind_tag() {
        let codec = BincodePayloadCodec::<Step>::new();
        let err = codec.decode_kind(&mut Cursor::new(vec![9u8])).unwrap_err();
        assert!(matches!(err, CodecError::UnknownKindTag(9)));
    }
}
