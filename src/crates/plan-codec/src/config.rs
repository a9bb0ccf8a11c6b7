//! Codec configuration
//!
//! ```rust
//! use plan_codec::CodecConfig;
//!
//! let config = CodecConfig::new()
//!     .with_owner("root-build")
//!     .with_max_node_count(50_000);
//! assert_eq!(config.owner, "root-build");
//! ```
//!
//! Values can also be taken from the environment with
//! [`CodecConfig::from_env`]:
//!
//! | Variable              | Field            |
//! |-----------------------|------------------|
//! | `PLAN_CODEC_OWNER`    | `owner`          |
//! | `PLAN_CODEC_MAX_NODES`| `max_node_count` |
//! | `PLAN_CODEC_MAX_VALUE_BYTES` | `max_value_bytes` |

use crate::error::{CodecError, Result};
use crate::scope::IsolateOwner;
use crate::wire;
use serde::{Deserialize, Serialize};

/// Environment variable for [`CodecConfig::owner`]
pub const OWNER_ENV: &str = "PLAN_CODEC_OWNER";

/// Environment variable for [`CodecConfig::max_node_count`]
pub const MAX_NODES_ENV: &str = "PLAN_CODEC_MAX_NODES";

/// Environment variable for [`CodecConfig::max_value_bytes`]
pub const MAX_VALUE_BYTES_ENV: &str = "PLAN_CODEC_MAX_VALUE_BYTES";

/// Settings for encoding and decoding work graphs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Owner context of the batch-wide sharing isolate
    pub owner: String,

    /// Largest node count the reader accepts before allocating
    pub max_node_count: usize,

    /// Largest size in bytes of a single value decoded from a payload
    pub max_value_bytes: u64,
}

impl CodecConfig {
    /// Default owner context
    pub const DEFAULT_OWNER: &'static str = "build";

    /// Default node count limit
    pub const DEFAULT_MAX_NODE_COUNT: usize = 1_000_000;

    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the owner context
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = owner.into();
        self
    }

    /// Set the node count limit
    pub fn with_max_node_count(mut self, max_node_count: usize) -> Self {
        self.max_node_count = max_node_count;
        self
    }

    /// Set the per-value byte limit
    pub fn with_max_value_bytes(mut self, max_value_bytes: u64) -> Self {
        self.max_value_bytes = max_value_bytes;
        self
    }

    /// Defaults overridden by the `PLAN_CODEC_*` environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(owner) = std::env::var(OWNER_ENV) {
            if owner.trim().is_empty() {
                return Err(CodecError::Configuration(format!(
                    "{} must not be empty",
                    OWNER_ENV
                )));
            }
            config.owner = owner;
        }

        if let Ok(value) = std::env::var(MAX_NODES_ENV) {
            config.max_node_count = parse_env(MAX_NODES_ENV, &value)?;
        }

        if let Ok(value) = std::env::var(MAX_VALUE_BYTES_ENV) {
            config.max_value_bytes = parse_env(MAX_VALUE_BYTES_ENV, &value)?;
        }

        Ok(config)
    }

    /// Owner of the batch-wide isolate
    pub fn batch_owner(&self) -> IsolateOwner {
        IsolateOwner::Batch(self.owner.clone())
    }
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            owner: Self::DEFAULT_OWNER.to_string(),
            max_node_count: Self::DEFAULT_MAX_NODE_COUNT,
            max_value_bytes: wire::DEFAULT_VALUE_LIMIT,
        }
    }
}

fn parse_env<T>(name: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e| {
        CodecError::Configuration(format!(
            "Failed to parse environment variable '{}': {}",
            name, e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CodecConfig::new();
        assert_eq!(config.owner, "build");
        assert_eq!(config.max_node_count, 1_000_000);
        assert_eq!(config.batch_owner(), IsolateOwner::Batch("build".into()));
    }

    #[test]
    fn test_builder() {
        let config = CodecConfig::new().with_owner("app").with_max_node_count(10);
        assert_eq!(config.owner, "app");
        assert_eq!(config.max_node_count, 10);
    }

    #[test]
    fn test_from_env() {
        // single test so the variables are not raced by parallel tests
        std::env::set_var(OWNER_ENV, "ci-build");
        std::env::set_var(MAX_NODES_ENV, " 2500 ");
        std::env::set_var(MAX_VALUE_BYTES_ENV, "4096");
        let config = CodecConfig::from_env().unwrap();
        assert_eq!(config.owner, "ci-build");
        assert_eq!(config.max_node_count, 2500);
        assert_eq!(config.max_value_bytes, 4096);

        std::env::set_var(MAX_NODES_ENV, "lots");
        let err = CodecConfig::from_env().unwrap_err();
        assert!(matches!(err, CodecError::Configuration(ref m) if m.contains(MAX_NODES_ENV)));
        std::env::remove_var(MAX_NODES_ENV);

        std::env::set_var(MAX_VALUE_BYTES_ENV, "-1");
        assert!(matches!(
            CodecConfig::from_env(),
            Err(CodecError::Configuration(_))
        ));
        std::env::remove_var(MAX_VALUE_BYTES_ENV);

        std::env::set_var(OWNER_ENV, "  ");
        assert!(matches!(
            CodecConfig::from_env(),
            Err(CodecError::Configuration(_))
        ));
        std::env::remove_var(OWNER_ENV);

        assert_eq!(CodecConfig::from_env().unwrap(), CodecConfig::default());
    }
}
