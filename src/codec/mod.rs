//! Binary codec for the snapshot and delta wire format
//!
//! Byte-level encode/decode of scalars, arrays, object forms, and blobs.
//! Every encoded value is prefixed by a single-byte type tag; values are
//! identified by signed 32-bit byte offsets into the logical buffer
//! (snapshot bytes concatenated with delta bytes). Offsets below zero
//! encode embedded primitives: slot value `-t` stands for the primitive
//! with tag `t` and occupies no bytes.

pub mod reader;
pub mod varint;
pub mod writer;

pub use reader::{read_array, read_object, read_object_raw, ArrayView, ContentReader, ObjectView};
pub use writer::{EncodeCache, Encoder};

use crate::core::{CodecError, Result};

/// Single-byte type tags. Numeric values are part of the wire format and
/// must never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Tag {
    /// JSON null
    Nil = 1,
    /// JSON false
    False = 2,
    /// JSON true
    True = 3,
    /// UTF-8 string: `tag | varint_len | bytes`
    String = 4,
    /// Integer-valued number packed as a varint
    StringInt = 5,
    /// Number as decimal text: `tag | varint_len | ascii`
    Number = 6,
    /// Array: `tag | varint_len | off[len] | payload`
    Array = 7,
    /// Object carrying its own sorted name array
    ObjectFull = 8,
    /// Object borrowing a full form's name array by reference
    ObjectThin = 9,
    /// Delta-only object recording changes against an earlier form
    ObjectPatch = 10,
    /// Opaque byte blob: `tag | varint_len | bytes`
    Binary = 11,
}

/// Sentinel stored in an `object_patch` changed-value slot to mark the key
/// as deleted. Equal to `-(object_patch tag)`.
pub const DELETED: i32 = -(Tag::ObjectPatch as i32);

impl Tag {
    /// Decode a tag byte read from the buffer.
    pub fn from_byte(b: u8, offset: i32) -> Result<Tag> {
        Ok(match b {
            1 => Tag::Nil,
            2 => Tag::False,
            3 => Tag::True,
            4 => Tag::String,
            5 => Tag::StringInt,
            6 => Tag::Number,
            7 => Tag::Array,
            8 => Tag::ObjectFull,
            9 => Tag::ObjectThin,
            10 => Tag::ObjectPatch,
            11 => Tag::Binary,
            _ => {
                return Err(CodecError::UnknownTag {
                    tag: b as i64,
                    offset,
                }
                .into())
            }
        })
    }

    /// Decode an embedded primitive from a negative offset.
    ///
    /// Only `nil`, `false`, and `true` may be embedded; any other negative
    /// tag is corruption.
    pub fn from_embedded(off: i32) -> Result<Tag> {
        debug_assert!(off < 0);
        match off {
            -1 => Ok(Tag::Nil),
            -2 => Ok(Tag::False),
            -3 => Ok(Tag::True),
            _ => Err(CodecError::BadEmbedded { tag: -off }.into()),
        }
    }

    /// The negative-offset encoding of this tag, if it may be embedded.
    pub fn embedded(self) -> Option<i32> {
        match self {
            Tag::Nil | Tag::False | Tag::True => Some(-(self as i32)),
            _ => None,
        }
    }

    /// Whether this tag is one of the three object forms.
    pub fn is_object(self) -> bool {
        matches!(self, Tag::ObjectFull | Tag::ObjectThin | Tag::ObjectPatch)
    }

    /// Whether this tag is a scalar (no child offsets).
    pub fn is_scalar(self) -> bool {
        matches!(
            self,
            Tag::Nil | Tag::False | Tag::True | Tag::String | Tag::StringInt | Tag::Number
        )
    }

    /// The wire byte for this tag.
    pub fn byte(self) -> u8 {
        self as u8
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_roundtrip() {
        for b in 1u8..=11 {
            let tag = Tag::from_byte(b, 0).unwrap();
            assert_eq!(tag.byte(), b);
        }
        assert!(Tag::from_byte(0, 0).is_err());
        assert!(Tag::from_byte(12, 0).is_err());
    }

    #[test]
    fn test_embedded_tags() {
        assert_eq!(Tag::from_embedded(-1).unwrap(), Tag::Nil);
        assert_eq!(Tag::from_embedded(-2).unwrap(), Tag::False);
        assert_eq!(Tag::from_embedded(-3).unwrap(), Tag::True);
        assert!(Tag::from_embedded(-4).is_err());
        assert!(Tag::from_embedded(DELETED).is_err());
    }

    #[test]
    fn test_deleted_sentinel_value() {
        assert_eq!(DELETED, -10);
    }
}
