//! Core system types and foundations
//!
//! This module contains the fundamental building blocks of the sediment
//! engine: error handling, configuration, and cooperative cancellation.

/// Error types and result handling
pub mod error;
/// Configuration and decode guard limits
pub mod config;
/// Cooperative cancellation flag
pub mod cancel;

// Re-export commonly used items
pub use cancel::CancelFlag;
pub use config::StoreConfig;
pub use error::{CodecError, Error, PatchError, Result, StoreError};
