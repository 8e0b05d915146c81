//! JSON Pointer (RFC 6901)
//!
//! Pointer parsing and array index validation for the patch builder.
//! `~0` unescapes to `~` and `~1` to `/`; array segments must be
//! canonical non-negative integers, with `-` meaning append where the
//! operation allows it.

use crate::core::{PatchError, Result};

/// Parse a JSON Pointer into its unescaped segments.
///
/// The empty pointer addresses the whole document and parses to no
/// segments.
pub fn parse_pointer(pointer: &str) -> Result<Vec<String>> {
    if pointer.is_empty() {
        return Ok(Vec::new());
    }
    if !pointer.starts_with('/') {
        return Err(PatchError::BadPointer { pointer: pointer.to_string() }.into());
    }
    pointer
        .split('/')
        .skip(1)
        .map(|seg| unescape(seg, pointer))
        .collect()
}

fn unescape(segment: &str, pointer: &str) -> Result<String> {
    if !segment.contains('~') {
        return Ok(segment.to_string());
    }
    let mut out = String::with_capacity(segment.len());
    let mut chars = segment.chars();
    while let Some(c) = chars.next() {
        if c != '~' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('0') => out.push('~'),
            Some('1') => out.push('/'),
            _ => {
                return Err(PatchError::BadPointer { pointer: pointer.to_string() }.into())
            }
        }
    }
    Ok(out)
}

/// Re-escape a segment for display in error paths.
pub fn escape(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

/// A resolved array position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayIndex {
    /// `-`: one past the end (append), valid for `add`/`create` only
    Append,
    /// A concrete position
    At(usize),
}

/// Validate an array segment. Canonical form only: no sign, no leading
/// zeros (except `0` itself).
pub fn parse_array_index(segment: &str, allow_append: bool) -> Result<ArrayIndex> {
    if segment == "-" {
        if allow_append {
            return Ok(ArrayIndex::Append);
        }
        return Err(PatchError::InvalidIndex { segment: segment.to_string() }.into());
    }
    let canonical = !segment.is_empty()
        && segment.bytes().all(|b| b.is_ascii_digit())
        && (segment == "0" || !segment.starts_with('0'));
    if !canonical {
        return Err(PatchError::InvalidIndex { segment: segment.to_string() }.into());
    }
    segment
        .parse::<usize>()
        .map(ArrayIndex::At)
        .map_err(|_| PatchError::InvalidIndex { segment: segment.to_string() }.into())
}
