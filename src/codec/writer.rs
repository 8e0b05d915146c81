//! Write side of the binary codec
//!
//! An [`Encoder`] appends values to a growable buffer at a fixed base
//! offset (0 for snapshots, `snapshot_len + delta_len` for delta appends)
//! and interns strings, canonical number texts, and object type descriptors
//! through its [`EncodeCache`]. The cache is scoped to one serialization
//! pass. Container headers reserve their offset slots up front and backfill
//! them as children land, so payload bytes always follow their header.

use ahash::AHashMap;

use crate::codec::reader::{read_array, read_bytes, read_int, read_number_text, read_object, read_string, read_tag, ContentReader};
use crate::codec::varint::write_varint;
use crate::codec::Tag;
use crate::core::{CodecError, Result};

/// Per-pass interning cache.
///
/// Maps full strings and canonical number texts to the offset of their
/// first occurrence, and sorted-name type descriptors to the offset of
/// their `object_full` header (a hit produces an `object_thin`).
#[derive(Default)]
pub struct EncodeCache {
    strings: AHashMap<Box<[u8]>, i32>,
    numbers: AHashMap<Box<str>, i32>,
    shapes: AHashMap<Vec<Vec<u8>>, i32>,
}

/// Reserved offset slots of an array header under construction.
pub struct ArraySlots {
    header: i32,
    slots: usize,
    len: usize,
}

impl ArraySlots {
    /// Offset of the array header.
    pub fn offset(&self) -> i32 {
        self.header
    }
}

/// Reserved value slots of an object header under construction.
pub struct ObjectSlots {
    header: i32,
    values: usize,
    len: usize,
    thin: bool,
}

impl ObjectSlots {
    /// Offset of the object header.
    pub fn offset(&self) -> i32 {
        self.header
    }

    /// Whether the cache produced a thin header.
    pub fn is_thin(&self) -> bool {
        self.thin
    }
}

/// Appending encoder over a growable buffer.
pub struct Encoder {
    buf: Vec<u8>,
    base: i32,
    cache: EncodeCache,
}

impl Encoder {
    /// Create an encoder whose first byte lands at logical offset `base`.
    pub fn new(base: i32) -> Self {
        Self { buf: Vec::new(), base, cache: EncodeCache::default() }
    }

    /// Logical offset of the next byte to be written.
    pub fn pos(&self) -> i32 {
        self.base + self.buf.len() as i32
    }

    /// Bytes written so far.
    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consume the encoder, yielding its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    fn patch_slot(&mut self, pos: usize, off: i32) {
        self.buf[pos..pos + 4].copy_from_slice(&off.to_be_bytes());
    }

    /// Reserve `n` zero bytes (header placeholders backfilled later).
    pub fn skip(&mut self, n: usize) {
        self.buf.resize(self.buf.len() + n, 0);
    }

    /// Write a standalone primitive (`nil`/`false`/`true`) tag byte.
    pub fn write_primitive(&mut self, tag: Tag) -> i32 {
        let off = self.pos();
        self.buf.push(tag.byte());
        off
    }

    /// Encode a primitive, embedding it as a negative offset when allowed.
    pub fn write_embeddable(&mut self, tag: Tag, embed: bool) -> i32 {
        match tag.embedded() {
            Some(neg) if embed => neg,
            _ => self.write_primitive(tag),
        }
    }

    /// Write (or intern) a UTF-8 string, returning its offset.
    pub fn write_string(&mut self, s: &[u8]) -> i32 {
        if let Some(&off) = self.cache.strings.get(s) {
            return off;
        }
        let off = self.pos();
        self.buf.push(Tag::String.byte());
        write_varint(&mut self.buf, s.len() as i64);
        self.buf.extend_from_slice(s);
        self.cache.strings.insert(s.into(), off);
        off
    }

    /// Write (or intern) a number from its decimal text.
    ///
    /// Canonical integer texts in `i64` range pack as `string_int`; all
    /// other texts store verbatim so precision survives.
    pub fn write_number(&mut self, text: &str) -> i32 {
        if let Some(&off) = self.cache.numbers.get(text) {
            return off;
        }
        let off = self.pos();
        match canonical_int(text) {
            Some(i) => {
                self.buf.push(Tag::StringInt.byte());
                write_varint(&mut self.buf, i);
            }
            None => {
                self.buf.push(Tag::Number.byte());
                write_varint(&mut self.buf, text.len() as i64);
                self.buf.extend_from_slice(text.as_bytes());
            }
        }
        self.cache.numbers.insert(text.into(), off);
        off
    }

    /// Write an opaque byte blob.
    pub fn write_binary(&mut self, bytes: &[u8]) -> i32 {
        let off = self.pos();
        self.buf.push(Tag::Binary.byte());
        write_varint(&mut self.buf, bytes.len() as i64);
        self.buf.extend_from_slice(bytes);
        off
    }

    /// Start an array of `n` elements, reserving its offset slots.
    pub fn begin_array(&mut self, n: usize) -> ArraySlots {
        let header = self.pos();
        self.buf.push(Tag::Array.byte());
        write_varint(&mut self.buf, n as i64);
        let slots = self.buf.len();
        self.buf.resize(slots + n * 4, 0);
        ArraySlots { header, slots, len: n }
    }

    /// Backfill element `i` of a reserved array.
    pub fn set_array_slot(&mut self, slots: &ArraySlots, i: usize, off: i32) {
        debug_assert!(i < slots.len);
        self.patch_slot(slots.slots + i * 4, off);
    }

    /// Start an object with the given ascending member names.
    ///
    /// A descriptor-cache hit emits `object_thin` borrowing the earlier
    /// full header's name array; a miss emits `object_full` and registers
    /// it. Value slots are reserved either way.
    pub fn begin_object(&mut self, names: &[&[u8]]) -> ObjectSlots {
        debug_assert!(names.windows(2).all(|w| w[0] < w[1]), "names must be strictly ascending");
        let n = names.len();
        let shape: Vec<Vec<u8>> = names.iter().map(|name| name.to_vec()).collect();
        if let Some(&full) = self.cache.shapes.get(&shape) {
            let header = self.pos();
            self.buf.push(Tag::ObjectThin.byte());
            self.buf.extend_from_slice(&full.to_be_bytes());
            let values = self.buf.len();
            self.buf.resize(values + n * 4, 0);
            return ObjectSlots { header, values, len: n, thin: true };
        }
        let header = self.pos();
        self.buf.push(Tag::ObjectFull.byte());
        write_varint(&mut self.buf, n as i64);
        let name_slots = self.buf.len();
        self.buf.resize(name_slots + n * 8, 0);
        let values = name_slots + n * 4;
        for (i, name) in names.iter().enumerate() {
            let name_off = self.write_string(name);
            self.patch_slot(name_slots + i * 4, name_off);
        }
        self.cache.shapes.insert(shape, header);
        ObjectSlots { header, values, len: n, thin: false }
    }

    /// Backfill the value slot of member `i` of a reserved object.
    pub fn set_object_value(&mut self, slots: &ObjectSlots, i: usize, off: i32) {
        debug_assert!(i < slots.len);
        self.patch_slot(slots.values + i * 4, off);
    }

    /// Write an `object_patch` header. `changed` pairs must be ascending by
    /// name; the caller supplies the deletion sentinel where keys go away.
    pub fn write_object_patch(
        &mut self,
        base_ref: i32,
        n_total: usize,
        changed: &[(i32, i32)],
    ) -> i32 {
        let off = self.pos();
        self.buf.push(Tag::ObjectPatch.byte());
        self.buf.extend_from_slice(&base_ref.to_be_bytes());
        write_varint(&mut self.buf, n_total as i64);
        write_varint(&mut self.buf, changed.len() as i64);
        for (name_off, _) in changed {
            self.buf.extend_from_slice(&name_off.to_be_bytes());
        }
        for (_, value_off) in changed {
            self.buf.extend_from_slice(&value_off.to_be_bytes());
        }
        off
    }
}

/// Accept `text` as a canonical `i64` rendering: the digit string the
/// integer itself would print. Anything else (leading zeros, `-0`,
/// out-of-range, fractions, exponents) stores as a plain number.
fn canonical_int(text: &str) -> Option<i64> {
    let i: i64 = text.parse().ok()?;
    // Re-rendering catches "007", "-0", and "+1" style texts.
    if i.to_string() == text {
        Some(i)
    } else {
        None
    }
}

/// Deep-copy the value at `off` in `r` into the encoder, re-interning
/// scalars and descriptors against the destination cache.
///
/// With `embed` set, `nil`/`true`/`false` return their negative embedded
/// offset instead of writing bytes; the document root must pass `false`.
pub fn reserialize<R: ContentReader + ?Sized>(
    enc: &mut Encoder,
    r: &R,
    off: i32,
    embed: bool,
    depth: usize,
) -> Result<i32> {
    if depth == 0 {
        return Err(CodecError::DepthExceeded {
            max: crate::codec::reader::DEFAULT_MAX_DEPTH,
        }
        .into());
    }
    let tag = read_tag(r, off)?;
    match tag {
        Tag::Nil | Tag::False | Tag::True => Ok(enc.write_embeddable(tag, embed)),
        Tag::String => {
            let s = read_string(r, off)?.to_vec();
            Ok(enc.write_string(&s))
        }
        Tag::StringInt => {
            let i = read_int(r, off)?;
            Ok(enc.write_number(&i.to_string()))
        }
        Tag::Number => {
            let text = read_number_text(r, off)?.into_owned();
            Ok(enc.write_number(&text))
        }
        Tag::Binary => {
            let b = read_bytes(r, off)?.to_vec();
            Ok(enc.write_binary(&b))
        }
        Tag::Array => {
            let view = read_array(r, off)?;
            let offs = view.value_offsets()?;
            let slots = enc.begin_array(offs.len());
            for (i, child) in offs.into_iter().enumerate() {
                let new = reserialize(enc, r, child, true, depth - 1)?;
                enc.set_array_slot(&slots, i, new);
            }
            Ok(slots.offset())
        }
        Tag::ObjectFull | Tag::ObjectThin | Tag::ObjectPatch => {
            let view = read_object(r, off)?;
            let (names, value_offs) = view.names_and_values()?;
            let owned: Vec<Vec<u8>> = names.into_iter().map(|n| n.to_vec()).collect();
            let name_refs: Vec<&[u8]> = owned.iter().map(|n| n.as_slice()).collect();
            let slots = enc.begin_object(&name_refs);
            for (i, child) in value_offs.into_iter().enumerate() {
                let new = reserialize(enc, r, child, true, depth - 1)?;
                enc.set_object_value(&slots, i, new);
            }
            Ok(slots.offset())
        }
    }
}
