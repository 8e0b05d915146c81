//! Immutable snapshots
//!
//! A snapshot is one read-only byte buffer encoding a root value at
//! offset 0. Once produced it never changes; readers share it freely.

pub mod reader;
pub mod write;

pub use reader::Snapshot;
pub use write::{serialize_value, serialize_value_with_depth, write_value};
