//! Append-only deltas over immutable snapshots
//!
//! A delta is appended bytes plus a redirection table from old offsets to
//! new ones. Readers overlay the table transparently; writers append
//! patch regions and re-target table entries, never mutating bytes in
//! place.

pub mod diff;
pub mod patch;
pub mod pointer;
pub mod reader;

pub use diff::{diff, diff_with_depth, DiffOutcome};
pub use patch::{DeltaBuilder, PatchOp};
pub use pointer::parse_pointer;
pub use reader::{decode_delta, encode_delta, materialize, DeltaReader, PatchIndex};
