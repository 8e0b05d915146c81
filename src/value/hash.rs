//! Canonical value hashing
//!
//! xxHash64 over a canonical tag + scalar-bytes sequence. Object hashes
//! are order-independent (a wrapping sum of per-entry hashes), array
//! hashes order-sensitive (an accumulation of element hashes). Every
//! encoding of the same logical value hashes identically, so full, thin,
//! and patch object forms agree.

use xxhash_rust::xxh64::{xxh64, Xxh64};

use crate::codec::reader::{
    read_array, read_bytes, read_int, read_number_text, read_object, read_string, read_tag,
    ContentReader, DEFAULT_MAX_DEPTH,
};
use crate::codec::Tag;
use crate::core::{CodecError, Result};
use crate::value::Value;

/// Hash of a null value.
pub fn hash_null() -> u64 {
    xxh64(&[Tag::Nil.byte()], 0)
}

/// Hash of a boolean. The tag set has no unified bool tag; the `false`
/// tag byte plus a 0/1 payload byte is the canonical form.
pub fn hash_bool(b: bool) -> u64 {
    xxh64(&[Tag::False.byte(), b as u8], 0)
}

/// Hash of a string's UTF-8 bytes.
pub fn hash_string(s: &[u8]) -> u64 {
    let mut h = Xxh64::new(0);
    h.update(&[Tag::String.byte()]);
    h.update(s);
    h.digest()
}

/// Hash of a number's decimal text (`string_int` normalizes to text).
pub fn hash_number(text: &str) -> u64 {
    let mut h = Xxh64::new(0);
    h.update(&[Tag::Number.byte()]);
    h.update(text.as_bytes());
    h.digest()
}

/// Hash of a binary blob.
pub fn hash_blob(bytes: &[u8]) -> u64 {
    let mut h = Xxh64::new(0);
    h.update(&[Tag::Binary.byte()]);
    h.update(bytes);
    h.digest()
}

/// Combine a key hash and value hash into one entry hash.
pub fn hash_entry(key: u64, value: u64) -> u64 {
    let mut buf = [0u8; 16];
    buf[..8].copy_from_slice(&key.to_be_bytes());
    buf[8..].copy_from_slice(&value.to_be_bytes());
    xxh64(&buf, 0)
}

/// Fold one element hash into a set-style order-independent sum.
pub fn hash_set_element(value: u64) -> u64 {
    xxh64(&value.to_be_bytes(), 0)
}

struct ArrayHasher(Xxh64);

impl ArrayHasher {
    fn new() -> Self {
        Self(Xxh64::new(0))
    }

    fn element(&mut self, h: u64) {
        self.0.update(&h.to_be_bytes());
    }

    fn finish(mut self) -> u64 {
        self.0.update(&[Tag::Array.byte()]);
        self.0.digest()
    }
}

/// Canonical hash of an in-memory value.
pub fn hash_value(v: &Value) -> u64 {
    match v {
        Value::Null => hash_null(),
        Value::Bool(b) => hash_bool(*b),
        Value::String(s) => hash_string(s.as_bytes()),
        Value::Number(n) => hash_number(n.text()),
        Value::Blob(b) => hash_blob(b),
        Value::Array(items) => {
            let mut h = ArrayHasher::new();
            // String-specialized arrays hash without value dispatch.
            if let Some(strings) = items.as_strings() {
                for s in strings {
                    h.element(hash_string(s.as_bytes()));
                }
            } else {
                for item in items.iter() {
                    h.element(hash_value(&item));
                }
            }
            h.finish()
        }
        Value::Object(o) => {
            let mut sum = 0u64;
            for (k, val) in o.iter() {
                sum = sum.wrapping_add(hash_entry(
                    hash_string(k.as_bytes()),
                    hash_value(val),
                ));
            }
            sum
        }
    }
}

/// Canonical hash of an encoded value.
pub fn hash_encoded<R: ContentReader + ?Sized>(r: &R, off: i32) -> Result<u64> {
    hash_encoded_at(r, off, DEFAULT_MAX_DEPTH)
}

fn hash_encoded_at<R: ContentReader + ?Sized>(r: &R, off: i32, depth: usize) -> Result<u64> {
    if depth == 0 {
        return Err(CodecError::DepthExceeded { max: DEFAULT_MAX_DEPTH }.into());
    }
    Ok(match read_tag(r, off)? {
        Tag::Nil => hash_null(),
        Tag::False => hash_bool(false),
        Tag::True => hash_bool(true),
        Tag::String => hash_string(read_string(r, off)?),
        Tag::StringInt => hash_number(&read_int(r, off)?.to_string()),
        Tag::Number => hash_number(&read_number_text(r, off)?),
        Tag::Binary => hash_blob(read_bytes(r, off)?),
        Tag::Array => {
            let view = read_array(r, off)?;
            let mut h = ArrayHasher::new();
            for i in 0..view.len() {
                h.element(hash_encoded_at(r, view.value_offset(i)?, depth - 1)?);
            }
            h.finish()
        }
        Tag::ObjectFull | Tag::ObjectThin | Tag::ObjectPatch => {
            let view = read_object(r, off)?;
            let mut sum = 0u64;
            for i in 0..view.len() {
                let key = hash_string(view.name(i)?);
                let val = hash_encoded_at(r, view.value_offset_at(i)?, depth - 1)?;
                sum = sum.wrapping_add(hash_entry(key, val));
            }
            sum
        }
    })
}
