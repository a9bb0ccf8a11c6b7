//! Binary primitives shared by the graph codec, sharing scopes and payload codecs
//!
//! Integers use bincode's variable-length integer encoding (values below
//! 251 take one byte). The end-of-section sentinel is the one fixed-width
//! value: eight bytes, little endian like every other bincode integer in the
//! stream. The format is only ever read back by this crate, so the byte order
//! is not negotiated.
//!
//! Values are read with a byte limit. bincode allocates a string or byte
//! buffer for its declared length before reading it, so without a limit one
//! corrupt length prefix would request an arbitrarily large allocation. The
//! limit turns that into a [`SizeLimit`](bincode::ErrorKind::SizeLimit) error.

use crate::error::Result;
use bincode::Options;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{Read, Write};

fn varint() -> impl Options {
    bincode::DefaultOptions::new()
}

/// Byte limit applied by [`read_value`] to a single value
pub const DEFAULT_VALUE_LIMIT: u64 = 64 * 1024 * 1024;

fn fixint() -> impl Options {
    bincode::DefaultOptions::new().with_fixint_encoding()
}

/// Write a small non-negative integer (sequence ids, counts)
pub fn write_small_int<W: Write + ?Sized>(out: &mut W, value: u32) -> Result<()> {
    Ok(varint().serialize_into(&mut *out, &value)?)
}

/// Read a value written by [`write_small_int`]
pub fn read_small_int<R: Read + ?Sized>(input: &mut R) -> Result<u32> {
    Ok(varint().deserialize_from(&mut *input)?)
}

/// Write a collection length or slot number
pub fn write_len<W: Write + ?Sized>(out: &mut W, len: usize) -> Result<()> {
    Ok(varint().serialize_into(&mut *out, &(len as u64))?)
}

/// Read a value written by [`write_len`]
pub fn read_len<R: Read + ?Sized>(input: &mut R) -> Result<usize> {
    let len: u64 = varint().deserialize_from(&mut *input)?;
    usize::try_from(len).map_err(|_| {
        bincode::Error::from(bincode::ErrorKind::Custom(format!(
            "length {} does not fit in memory",
            len
        )))
        .into()
    })
}

/// Write a fixed-width 64-bit value
pub fn write_long<W: Write + ?Sized>(out: &mut W, value: u64) -> Result<()> {
    Ok(fixint().serialize_into(&mut *out, &value)?)
}

/// Read a value written by [`write_long`]
pub fn read_long<R: Read + ?Sized>(input: &mut R) -> Result<u64> {
    Ok(fixint().deserialize_from(&mut *input)?)
}

/// Write a single byte
pub fn write_byte<W: Write + ?Sized>(out: &mut W, value: u8) -> Result<()> {
    out.write_all(&[value])?;
    Ok(())
}

/// Read a single byte
pub fn read_byte<R: Read + ?Sized>(input: &mut R) -> Result<u8> {
    let mut buf = [0u8; 1];
    input.read_exact(&mut buf)?;
    Ok(buf[0])
}

/// Write any serde value with the varint options
pub fn write_value<W, T>(out: &mut W, value: &T) -> Result<()>
where
    W: Write + ?Sized,
    T: Serialize + ?Sized,
{
    Ok(varint().serialize_into(&mut *out, value)?)
}

/// Read a value written by [`write_value`], at most [`DEFAULT_VALUE_LIMIT`] bytes
pub fn read_value<R, T>(input: &mut R) -> Result<T>
where
    R: Read + ?Sized,
    T: DeserializeOwned,
{
    read_value_limited(input, DEFAULT_VALUE_LIMIT)
}

/// Read a value written by [`write_value`] that occupies at most `limit` bytes
pub fn read_value_limited<R, T>(input: &mut R, limit: u64) -> Result<T>
where
    R: Read + ?Sized,
    T: DeserializeOwned,
{
    Ok(varint().with_limit(limit).deserialize_from(&mut *input)?)
}

/// Write a count-prefixed list of sequence ids
pub fn write_collection<W: Write + ?Sized>(out: &mut W, ids: &[u32]) -> Result<()> {
    write_len(out, ids.len())?;
    for &id in ids {
        write_small_int(out, id)?;
    }
    Ok(())
}

/// Read a list written by [`write_collection`], handing each id to `on_item`
pub fn read_collection<R, F>(input: &mut R, mut on_item: F) -> Result<()>
where
    R: Read + ?Sized,
    F: FnMut(u32) -> Result<()>,
{
    let len = read_len(input)?;
    for _ in 0..len {
        on_item(read_small_int(input)?)?;
    }
    Ok(())
}
