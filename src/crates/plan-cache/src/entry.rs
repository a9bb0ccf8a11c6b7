//! Cache keys and entry framing
//!
//! A stored entry is a fixed-size header followed by one work graph section:
//!
//! ```text
//! ┌───────────────┬────────────────┬───────────────────────┬───────────────────┐
//! │ magic: u32    │ format: u32    │ payload codec: u32    │ work graph section │
//! │ "PLAN"        │ FORMAT_VERSION │ caller-chosen version │ ... | sentinel     │
//! └───────────────┴────────────────┴───────────────────────┴───────────────────┘
//! ```
//!
//! The graph section itself carries no version, so a cache must never hand
//! bytes to the codec unless the header matches the running configuration.

use crate::error::{CacheError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::{Read, Write};

/// Identifies a cached plan, typically a digest of the build inputs
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlanKey(String);

impl PlanKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Hex SHA-256 digest of the key: 64 characters whatever the key length,
    /// safe to use as a file name
    pub fn file_stem(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.0.as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl fmt::Display for PlanKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlanKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for PlanKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// Header written ahead of every cached work graph section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntryHeader {
    pub magic: u32,
    pub format_version: u32,
    pub payload_codec_version: u32,
}

impl CacheEntryHeader {
    /// `"PLAN"` in ASCII
    pub const MAGIC: u32 = 0x504C_414E;

    /// Version of the entry layout and work graph section format
    pub const FORMAT_VERSION: u32 = 1;

    /// Encoded size in bytes
    pub const SIZE: usize = 12;

    pub fn new(payload_codec_version: u32) -> Self {
        Self {
            magic: Self::MAGIC,
            format_version: Self::FORMAT_VERSION,
            payload_codec_version,
        }
    }

    pub fn write_to<W: Write>(&self, out: W) -> Result<()> {
        bincode::serialize_into(out, self)?;
        Ok(())
    }

    pub fn read_from<R: Read>(input: R) -> Result<Self> {
        Ok(bincode::deserialize_from(input)?)
    }

    /// Accept the header only if it was written by this format and the given
    /// payload codec version.
    pub fn check(&self, payload_codec_version: u32) -> Result<()> {
        if self.magic != Self::MAGIC {
            return Err(CacheError::StaleEntry(format!(
                "bad magic {:#010x}",
                self.magic
            )));
        }
        if self.format_version != Self::FORMAT_VERSION {
            return Err(CacheError::StaleEntry(format!(
                "format version {} (current {})",
                self.format_version,
                Self::FORMAT_VERSION
            )));
        }
        if self.payload_codec_version != payload_codec_version {
            return Err(CacheError::StaleEntry(format!(
                "payload codec version {} (current {})",
                self.payload_codec_version, payload_codec_version
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let mut out = Vec::new();
        CacheEntryHeader::new(7).write_to(&mut out).unwrap();

        assert_eq!(out.len(), CacheEntryHeader::SIZE);
        assert_eq!(&out[..4], &[0x4E, 0x41, 0x4C, 0x50]);
        assert_eq!(&out[4..8], &[1, 0, 0, 0]);
        assert_eq!(&out[8..], &[7, 0, 0, 0]);

        let header = CacheEntryHeader::read_from(out.as_slice()).unwrap();
        assert_eq!(header, CacheEntryHeader::new(7));
    }

    #[test]
    fn test_header_check() {
        assert!(CacheEntryHeader::new(2).check(2).is_ok());
        assert!(CacheEntryHeader::new(2).check(3).unwrap_err().is_stale());

        let mut header = CacheEntryHeader::new(2);
        header.magic = 0;
        assert!(header.check(2).unwrap_err().is_stale());

        let mut header = CacheEntryHeader::new(2);
        header.format_version = 99;
        assert!(header.check(2).unwrap_err().is_stale());
    }

    #[test]
    fn test_short_header_is_wire_error() {
        let err = CacheEntryHeader::read_from(&[0x4E, 0x41][..]).unwrap_err();
        assert!(matches!(err, CacheError::Wire(_)));
    }

    #[test]
    fn test_key_file_stem() {
        let key = PlanKey::new("build:main/1");
        let stem = key.file_stem();
        assert_eq!(stem.len(), 64);
        assert!(stem.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(stem, PlanKey::new("build:main/1").file_stem());
        assert_ne!(stem, PlanKey::new("build:main/2").file_stem());

        let long = PlanKey::new("x".repeat(4096));
        assert_eq!(long.file_stem().len(), 64);
    }
}
