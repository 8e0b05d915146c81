//! Snapshot buffer and its content reader
//!
//! The snapshot itself is the reader: it carries no redirection, so
//! `redirect` stays the identity and the root is always offset 0.

use bytes::Bytes;

use crate::codec::ContentReader;
use crate::core::{CodecError, Result};

/// An immutable byte buffer encoding one root value.
#[derive(Debug, Clone)]
pub struct Snapshot {
    bytes: Bytes,
}

impl Snapshot {
    /// Wrap frozen bytes.
    pub fn from_bytes(bytes: Bytes) -> Self {
        Self { bytes }
    }

    /// Take ownership of a freshly written buffer.
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self { bytes: Bytes::from(bytes) }
    }

    /// The underlying buffer.
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// Whether the snapshot holds no bytes at all.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl ContentReader for Snapshot {
    fn len(&self) -> i32 {
        self.bytes.len() as i32
    }

    fn slice(&self, off: i32, n: usize) -> Result<&[u8]> {
        if off < 0 {
            return Err(CodecError::OutOfBounds { offset: off, len: self.len() }.into());
        }
        let start = off as usize;
        let end = start + n;
        if end > self.bytes.len() {
            return Err(CodecError::Truncated {
                offset: off,
                needed: end - self.bytes.len(),
            }
            .into());
        }
        Ok(&self.bytes[start..end])
    }
}
