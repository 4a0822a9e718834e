//! Data-stream configuration: frame size limit and header pool sizing.

use serde::{Deserialize, Serialize};

/// Default upper bound on a frame's declared length (16 MiB).
pub const DEFAULT_MAX_FRAME_LENGTH: usize = 16 * 1024 * 1024;
/// Default number of idle header buffers the pool keeps.
pub const DEFAULT_HEADER_POOL_IDLE: usize = 8;

/// Dispatcher settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataStreamConfig {
    /// Frames declaring a larger total length are rejected as malformed.
    #[serde(default = "default_max_frame_length")]
    pub max_frame_length: usize,
    /// Idle header buffers retained for reuse.
    #[serde(default = "default_header_pool_idle")]
    pub header_pool_idle: usize,
}

impl Default for DataStreamConfig {
    fn default() -> Self {
        Self {
            max_frame_length: default_max_frame_length(),
            header_pool_idle: default_header_pool_idle(),
        }
    }
}

fn default_max_frame_length() -> usize {
    DEFAULT_MAX_FRAME_LENGTH
}

fn default_header_pool_idle() -> usize {
    DEFAULT_HEADER_POOL_IDLE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_toml() {
        let config: DataStreamConfig = toml::from_str("").unwrap();
        assert_eq!(config, DataStreamConfig::default());
        assert_eq!(config.max_frame_length, 16 * 1024 * 1024);
    }

    #[test]
    fn test_partial_toml() {
        let config: DataStreamConfig = toml::from_str("max_frame_length = 4096").unwrap();
        assert_eq!(config.max_frame_length, 4096);
        assert_eq!(config.header_pool_idle, DEFAULT_HEADER_POOL_IDLE);
    }
}
