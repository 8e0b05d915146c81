//! Sediment - A Binary-Encoded JSON Storage Engine
//!
//! Sediment stores hierarchical JSON collections in an immutable,
//! offset-addressed binary buffer with string/number interning and
//! object type-descriptor sharing. Mutations never rewrite the base
//! snapshot: structural diffs and JSON Patch operations append delta
//! layers whose redirection table readers apply transparently.
#![warn(missing_docs)]

// Core foundational modules
pub mod core;

// Main functional modules
pub mod codec;
pub mod delta;
pub mod snapshot;
pub mod store;
pub mod value;

// Re-export commonly used items for convenience
pub use crate::core::{CancelFlag, Error, Result, StoreConfig};
pub use crate::delta::{DeltaBuilder, PatchOp};
pub use crate::snapshot::Snapshot;
pub use crate::store::{Collections, Kind, Resource, SharedStore, WritableCollections};
pub use crate::value::Value;

/// Crate version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Initialize tracing for embedders that want the engine's debug events.
///
/// The storage core itself never logs from error paths; only the store
/// and builder boundaries emit debug events.
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    tracing::info!("Initializing {} v{}", NAME, VERSION);

    Ok(())
}
