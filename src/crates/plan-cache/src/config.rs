//! Plan cache configuration

use plan_codec::CodecConfig;
use serde::{Deserialize, Serialize};

/// Settings for a [`PlanCache`](crate::PlanCache)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Version of the payload codec in use. Entries written under another
    /// version are discarded on load.
    pub payload_codec_version: u32,

    /// Settings passed to the work graph codec
    pub codec: CodecConfig,
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_payload_codec_version(mut self, version: u32) -> Self {
        self.payload_codec_version = version;
        self
    }

    pub fn with_codec_config(mut self, codec: CodecConfig) -> Self {
        self.codec = codec;
        self
    }

    /// Defaults with the codec settings taken from the environment
    pub fn from_env() -> crate::Result<Self> {
        Ok(Self::default().with_codec_config(CodecConfig::from_env()?))
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            payload_codec_version: 1,
            codec: CodecConfig::default(),
        }
    }
}
