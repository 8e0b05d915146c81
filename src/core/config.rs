//! Engine configuration
//!
//! Decode-time guard limits and store behavior toggles. All fields have
//! conservative defaults; embedders deserialize overrides from their own
//! configuration layer.

use serde::Deserialize;

/// Guard limits applied while decoding binary buffers and store toggles.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Maximum value nesting depth accepted by readers and the diff engine.
    /// Exceeding it yields a corruption error rather than a stack overflow.
    pub max_depth: usize,

    /// Stamp `timestamp` metadata on resources at prepare time and after
    /// mutations (never overwriting an existing value).
    pub stamp_timestamps: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_depth: 128,
            stamp_timestamps: true,
        }
    }
}
