//! Delta overlay reader and the patch table
//!
//! The patch table is a pair of parallel arrays sorted by original
//! offset. `redirect` binary-searches it on every value read; a hit
//! follows the re-targeted offset into the appended region. Re-patching
//! an offset replaces its entry in place, so redirection never chains.

use crate::codec::reader::DEFAULT_MAX_DEPTH;
use crate::codec::varint::{read_varint, write_varint, VarintRead};
use crate::codec::writer::reserialize;
use crate::codec::{ContentReader, Encoder};
use crate::core::{CodecError, Result};
use crate::snapshot::Snapshot;

/// Redirection table from original offsets to their replacements.
#[derive(Debug, Clone, Default)]
pub struct PatchIndex {
    originals: Vec<i32>,
    targets: Vec<i32>,
}

impl PatchIndex {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.originals.len()
    }

    /// Whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.originals.is_empty()
    }

    /// The re-target for `off`, if patched.
    pub fn lookup(&self, off: i32) -> Option<i32> {
        self.originals
            .binary_search(&off)
            .ok()
            .map(|i| self.targets[i])
    }

    /// Whether `off` has an entry.
    pub fn contains(&self, off: i32) -> bool {
        self.originals.binary_search(&off).is_ok()
    }

    /// Insert or replace the entry for `orig`.
    pub fn upsert(&mut self, orig: i32, target: i32) {
        match self.originals.binary_search(&orig) {
            Ok(i) => self.targets[i] = target,
            Err(i) => {
                self.originals.insert(i, orig);
                self.targets.insert(i, target);
            }
        }
    }

    /// Remove the entry for `orig`, reporting whether one existed.
    pub fn remove(&mut self, orig: i32) -> bool {
        match self.originals.binary_search(&orig) {
            Ok(i) => {
                self.originals.remove(i);
                self.targets.remove(i);
                true
            }
            Err(_) => false,
        }
    }

    /// Iterate `(original, target)` pairs in ascending original order.
    pub fn iter(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.originals.iter().copied().zip(self.targets.iter().copied())
    }
}

/// Append the patch table to a delta region buffer and backfill the
/// 4-byte header with the table's position.
///
/// `regions` must begin with the 4-byte header placeholder.
pub fn encode_delta(mut regions: Vec<u8>, index: &PatchIndex) -> Vec<u8> {
    debug_assert!(regions.len() >= 4);
    let table_at = regions.len() as i32;
    write_varint(&mut regions, index.len() as i64);
    for (orig, _) in index.iter() {
        regions.extend_from_slice(&orig.to_be_bytes());
    }
    for (_, target) in index.iter() {
        regions.extend_from_slice(&target.to_be_bytes());
    }
    regions[..4].copy_from_slice(&table_at.to_be_bytes());
    regions
}

/// Parse the patch table out of a serialized delta buffer.
///
/// An empty buffer is a valid empty delta.
pub fn decode_delta(delta: &[u8]) -> Result<PatchIndex> {
    if delta.is_empty() {
        return Ok(PatchIndex::new());
    }
    if delta.len() < 4 {
        return Err(CodecError::Truncated { offset: 0, needed: 4 - delta.len() }.into());
    }
    let table_at = i32::from_be_bytes([delta[0], delta[1], delta[2], delta[3]]);
    if table_at < 4 || table_at as usize > delta.len() {
        return Err(CodecError::OutOfBounds { offset: table_at, len: delta.len() as i32 }.into());
    }
    let mut pos = table_at as usize;
    let count = match read_varint(&delta[pos..]) {
        VarintRead::Ok(v, used) => {
            pos += used;
            v
        }
        VarintRead::Truncated => {
            return Err(CodecError::Truncated { offset: table_at, needed: 1 }.into())
        }
        VarintRead::Overflow => {
            return Err(CodecError::VarintOverflow { offset: table_at }.into())
        }
    };
    if count < 0 {
        return Err(CodecError::NegativeLength { offset: table_at }.into());
    }
    let count = count as usize;
    let need = count * 8;
    if delta.len() - pos < need {
        return Err(CodecError::Truncated {
            offset: pos as i32,
            needed: need - (delta.len() - pos),
        }
        .into());
    }
    let mut index = PatchIndex::new();
    let read_i32 = |at: usize| {
        i32::from_be_bytes([delta[at], delta[at + 1], delta[at + 2], delta[at + 3]])
    };
    for i in 0..count {
        let orig = read_i32(pos + i * 4);
        let target = read_i32(pos + count * 4 + i * 4);
        // Originals are stored ascending; upsert tolerates disorder from
        // lenient producers.
        index.upsert(orig, target);
    }
    Ok(index)
}

/// Content reader over a snapshot overlaid by one delta.
#[derive(Clone, Copy)]
pub struct DeltaReader<'a> {
    snapshot: &'a [u8],
    delta: &'a [u8],
    index: &'a PatchIndex,
}

impl<'a> DeltaReader<'a> {
    /// Assemble a reader from its parts.
    pub fn new(snapshot: &'a [u8], delta: &'a [u8], index: &'a PatchIndex) -> Self {
        Self { snapshot, delta, index }
    }

    /// Length of the snapshot region.
    pub fn snapshot_len(&self) -> i32 {
        self.snapshot.len() as i32
    }

    /// The redirection table.
    pub fn index(&self) -> &PatchIndex {
        self.index
    }
}

impl ContentReader for DeltaReader<'_> {
    fn len(&self) -> i32 {
        (self.snapshot.len() + self.delta.len()) as i32
    }

    fn slice(&self, off: i32, n: usize) -> Result<&[u8]> {
        if off < 0 {
            return Err(CodecError::OutOfBounds { offset: off, len: self.len() }.into());
        }
        let slen = self.snapshot.len();
        let start = off as usize;
        // A value's bytes never straddle the snapshot/delta boundary.
        let (region, at) = if start < slen {
            (self.snapshot, start)
        } else {
            (self.delta, start - slen)
        };
        let end = at + n;
        if end > region.len() {
            return Err(CodecError::Truncated { offset: off, needed: end - region.len() }.into());
        }
        Ok(&region[at..end])
    }

    fn redirect(&self, off: i32) -> i32 {
        self.index.lookup(off).unwrap_or(off)
    }
}

/// Rewrite the current logical state behind `r` into a standalone
/// snapshot (structural sharing re-established by a fresh encode pass).
pub fn materialize<R: ContentReader + ?Sized>(r: &R) -> Result<Snapshot> {
    let mut enc = Encoder::new(0);
    reserialize(&mut enc, r, r.root(), false, DEFAULT_MAX_DEPTH)?;
    Ok(Snapshot::from_vec(enc.into_bytes()))
}
