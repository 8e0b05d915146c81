//! Error types and handling for the sediment storage engine
//!
//! This module defines all error types used throughout the system,
//! optimized for zero-cost error propagation and clear diagnostics.
//! The engine never logs from error paths; it returns typed errors and
//! leaves user-visible behavior to the caller.

use thiserror::Error;

/// Main result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the sediment storage engine
#[derive(Error, Debug)]
pub enum Error {
    /// Binary buffer violates a format invariant; fatal to the reading op
    #[error("corrupted buffer: {0}")]
    Codec(#[from] CodecError),

    /// JSON Pointer / JSON Patch failures; the delta is left untouched
    #[error("patch error: {0}")]
    Patch(#[from] PatchError),

    /// Collections namespace errors
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Attempt to serialize an unrepresentable value
    #[error("unsupported value: {0}")]
    EncodeUnsupported(String),

    /// Operation cancelled by the caller's cancellation flag
    #[error("operation cancelled")]
    Cancelled,

    /// I/O errors from the pluggable byte source, surfaced as-is
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Corruption detected while decoding a binary buffer.
///
/// Every variant carries the logical offset at which decoding failed so the
/// caller can report where a buffer went bad. The engine never attempts
/// recovery from these.
#[derive(Error, Debug)]
pub enum CodecError {
    /// A type tag outside the closed set
    #[error("unknown type tag {tag} at offset {offset}")]
    UnknownTag {
        /// The tag byte (or embedded tag value) encountered
        tag: i64,
        /// Logical offset of the tag
        offset: i32,
    },

    /// A region extends past the end of the buffer
    #[error("truncated value at offset {offset}: need {needed} more bytes")]
    Truncated {
        /// Logical offset of the value
        offset: i32,
        /// Number of bytes missing
        needed: usize,
    },

    /// A varint-encoded length decoded to a negative value
    #[error("negative length at offset {offset}")]
    NegativeLength {
        /// Logical offset of the length varint
        offset: i32,
    },

    /// A varint ran past its maximum width
    #[error("varint overflow at offset {offset}")]
    VarintOverflow {
        /// Logical offset of the varint
        offset: i32,
    },

    /// A string payload is not valid UTF-8
    #[error("invalid UTF-8 at offset {offset}")]
    Utf8 {
        /// Logical offset of the string payload
        offset: i32,
    },

    /// An offset points outside the logical buffer
    #[error("offset {offset} out of bounds (buffer length {len})")]
    OutOfBounds {
        /// The out-of-range offset
        offset: i32,
        /// Logical buffer length
        len: i32,
    },

    /// A negative offset encodes a tag outside {nil, true, false}
    #[error("invalid embedded tag {tag}")]
    BadEmbedded {
        /// The embedded tag value
        tag: i32,
    },

    /// Value nesting exceeded the configured guard depth
    #[error("value nesting deeper than {max} levels")]
    DepthExceeded {
        /// Configured maximum depth
        max: usize,
    },
}

/// JSON Pointer and JSON Patch errors.
///
/// These are returned typed and non-fatal: a failed op leaves the delta
/// buffer and patch table exactly as they were.
#[derive(Error, Debug)]
pub enum PatchError {
    /// A `test` op found a different value at the path
    #[error("test failed at {path}")]
    TestFailed {
        /// Pointer of the failed test
        path: String,
    },

    /// A pointer segment does not resolve
    #[error("path not found: {path}")]
    PathNotFound {
        /// The unresolved pointer
        path: String,
    },

    /// `remove` or `replace` on a key that is absent
    #[error("missing key at {path}")]
    MissingKey {
        /// Pointer of the absent member
        path: String,
    },

    /// Array index outside `0..=len` (or `0..len` for non-append ops)
    #[error("array index {index} out of range (length {len})")]
    IndexOutOfRange {
        /// The requested index
        index: usize,
        /// Current array length
        len: usize,
    },

    /// Array segment that is not a canonical non-negative integer
    #[error("invalid array index {segment:?}")]
    InvalidIndex {
        /// The offending segment text
        segment: String,
    },

    /// Pointer text that is not RFC 6901 (missing leading `/`, bad escape)
    #[error("malformed pointer {pointer:?}")]
    BadPointer {
        /// The offending pointer text
        pointer: String,
    },

    /// Patch op name outside the supported set
    #[error("unsupported patch op {op:?}")]
    UnknownOp {
        /// The op string from the patch document
        op: String,
    },

    /// Descending through a scalar, or array op on an object, etc.
    #[error("cannot traverse non-container at {path}")]
    NotAContainer {
        /// Pointer of the non-container value
        path: String,
    },

    /// A patch document entry is structurally invalid (missing field)
    #[error("invalid patch op: {reason}")]
    InvalidOp {
        /// What was missing or malformed
        reason: String,
    },
}

/// Collections namespace errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// No resource at the given path
    #[error("resource not found: {path}")]
    NotFound {
        /// Resource path
        path: String,
    },

    /// `remove` on a directory that still has children
    #[error("directory not empty: {path}")]
    DirectoryNotEmpty {
        /// Directory path
        path: String,
    },

    /// Operation requires a directory but found a leaf resource
    #[error("not a directory: {path}")]
    NotADirectory {
        /// Resource path
        path: String,
    },

    /// A path contains an empty or otherwise unusable segment
    #[error("invalid resource path: {path}")]
    InvalidPath {
        /// Resource path
        path: String,
    },
}

impl Error {
    /// Create an encode-unsupported error
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::EncodeUnsupported(msg.into())
    }

    /// Check if this error reports buffer corruption
    pub fn is_corruption(&self) -> bool {
        matches!(self, Error::Codec(_))
    }

    /// Check if this error is a recoverable patch conflict
    pub fn is_patch_conflict(&self) -> bool {
        matches!(
            self,
            Error::Patch(
                PatchError::TestFailed { .. }
                    | PatchError::MissingKey { .. }
                    | PatchError::IndexOutOfRange { .. }
                    | PatchError::InvalidIndex { .. }
            )
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let err = Error::from(CodecError::UnknownTag { tag: 99, offset: 7 });
        assert!(err.is_corruption());
        assert!(!err.is_patch_conflict());

        let err = Error::from(PatchError::TestFailed { path: "/a".into() });
        assert!(err.is_patch_conflict());
    }

    #[test]
    fn test_error_display_carries_offset() {
        let err = CodecError::Truncated { offset: 12, needed: 4 };
        assert!(err.to_string().contains("12"));
    }
}
