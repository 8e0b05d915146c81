//! Hash-indexed structural diff
//!
//! `diff(a, b)` produces delta bytes and a patch table that, overlaid on
//! `a`, read back as `b`. The recursion hands `(offset, changed)` pairs
//! upward: scalar changes are absorbed by the enclosing container (scalar
//! offsets may be interned and shared, so they are never re-targeted
//! directly), while arrays and objects record their own table entries and
//! report themselves unchanged. Object pairs always produce a patch-form
//! header rather than a rewrite, whatever mix of full/thin/patch forms
//! the two sides use.

use ahash::AHashMap;

use crate::codec::reader::{read_array, read_object, read_tag, DEFAULT_MAX_DEPTH};
use crate::codec::writer::reserialize;
use crate::codec::{ContentReader, Encoder, Tag, DELETED};
use crate::core::{CancelFlag, CodecError, Result};
use crate::delta::reader::{encode_delta, PatchIndex};
use crate::value::cmp::{cmp_encoded, eq_encoded};
use crate::value::hash::hash_encoded;

/// Result of a diff pass.
pub struct DiffOutcome {
    /// Serialized delta buffer: header, appended regions, patch table.
    pub delta: Vec<u8>,
    /// The patch table in its in-memory form.
    pub index: PatchIndex,
    /// Whether the two inputs were semantically equal.
    pub empty: bool,
}

/// Diff reader `b` against base reader `a`.
///
/// `a` must be a plain (redirect-free) reader whose root sits at offset
/// 0; callers diffing an already-patched state materialize it first.
pub fn diff<A, B>(a: &A, b: &B, cancel: Option<&CancelFlag>) -> Result<DiffOutcome>
where
    A: ContentReader + ?Sized,
    B: ContentReader + ?Sized,
{
    diff_with_depth(a, b, cancel, DEFAULT_MAX_DEPTH)
}

/// [`diff`] under a caller-supplied nesting guard.
pub fn diff_with_depth<A, B>(
    a: &A,
    b: &B,
    cancel: Option<&CancelFlag>,
    max_depth: usize,
) -> Result<DiffOutcome>
where
    A: ContentReader + ?Sized,
    B: ContentReader + ?Sized,
{
    debug_assert_eq!(a.root(), 0, "diff base must be redirect-free");
    let mut ctx = Diff {
        a,
        b,
        enc: Encoder::new(a.len()),
        index: PatchIndex::new(),
        cancel,
    };
    // Reserve the delta header; the table position lands here at the end.
    ctx.enc.skip(4);
    let (repr, changed) = ctx.diff_at(0, b.root(), false, max_depth)?;
    if changed {
        ctx.index.upsert(0, repr);
    }
    let empty = ctx.index.is_empty();
    let index = ctx.index;
    let delta = encode_delta(ctx.enc.into_bytes(), &index);
    Ok(DiffOutcome { delta, index, empty })
}

fn type_class(tag: Tag) -> u8 {
    match tag {
        Tag::Nil => 0,
        Tag::False | Tag::True => 1,
        Tag::String => 2,
        Tag::StringInt | Tag::Number => 3,
        Tag::Array => 4,
        Tag::ObjectFull | Tag::ObjectThin | Tag::ObjectPatch => 5,
        Tag::Binary => 6,
    }
}

struct Diff<'x, A: ?Sized, B: ?Sized> {
    a: &'x A,
    b: &'x B,
    enc: Encoder,
    index: PatchIndex,
    cancel: Option<&'x CancelFlag>,
}

impl<'x, A, B> Diff<'x, A, B>
where
    A: ContentReader + ?Sized,
    B: ContentReader + ?Sized,
{
    /// Diff one offset pair. Returns the offset representing `b`'s value
    /// in the merged space and whether the parent must adopt it.
    fn diff_at(
        &mut self,
        a_off: i32,
        b_off: i32,
        embed: bool,
        depth: usize,
    ) -> Result<(i32, bool)> {
        if depth == 0 {
            return Err(CodecError::DepthExceeded { max: DEFAULT_MAX_DEPTH }.into());
        }
        if let Some(cancel) = self.cancel {
            cancel.check()?;
        }
        let ta = read_tag(self.a, a_off)?;
        let tb = read_tag(self.b, b_off)?;
        if ta.is_object() && tb.is_object() {
            return self.diff_object(a_off, b_off, depth);
        }
        if type_class(ta) != type_class(tb) {
            // Type changed. A container base re-targets in place; a
            // scalar base may be shared, so the parent adopts the new
            // value instead.
            if ta == Tag::Array || ta.is_object() {
                let new = reserialize(&mut self.enc, self.b, b_off, false, depth)?;
                self.index.upsert(a_off, new);
                return Ok((a_off, false));
            }
            let new = reserialize(&mut self.enc, self.b, b_off, embed, depth)?;
            return Ok((new, true));
        }
        match ta {
            Tag::Array => self.diff_array(a_off, b_off, depth),
            _ => {
                // Scalars and blobs: equal means untouched, unequal means
                // the parent adopts the re-encoded value.
                if cmp_encoded(self.a, a_off, self.b, b_off)? == std::cmp::Ordering::Equal {
                    return Ok((a_off, false));
                }
                let new = reserialize(&mut self.enc, self.b, b_off, embed, depth)?;
                Ok((new, true))
            }
        }
    }

    /// Hash-indexed array diff: reuse base elements wherever content
    /// hashes (verified by structural equality) match, re-encode the
    /// rest, and re-target the array header when anything moved. The new
    /// header stands alone; the parent is not marked changed.
    fn diff_array(&mut self, a_off: i32, b_off: i32, depth: usize) -> Result<(i32, bool)> {
        let a = self.a;
        let b = self.b;
        let va = read_array(a, a_off)?;
        let vb = read_array(b, b_off)?;
        let a_offs = va.value_offsets()?;

        let mut pool: AHashMap<u64, Vec<i32>> = AHashMap::new();
        for &el in &a_offs {
            pool.entry(hash_encoded(a, el)?).or_default().push(el);
        }

        let mut plan = Vec::with_capacity(vb.len());
        let mut same = a_offs.len() == vb.len();
        for i in 0..vb.len() {
            if let Some(cancel) = self.cancel {
                cancel.check()?;
            }
            let b_el = vb.value_offset(i)?;
            let hash = hash_encoded(b, b_el)?;
            let mut reuse = None;
            if let Some(cands) = pool.get(&hash) {
                for &cand in cands {
                    if eq_encoded(a, cand, b, b_el)? {
                        reuse = Some(cand);
                        break;
                    }
                }
            }
            let off = match reuse {
                Some(off) => off,
                None => reserialize(&mut self.enc, b, b_el, true, depth - 1)?,
            };
            if same && off != a_offs[i] {
                same = false;
            }
            plan.push(off);
        }
        if same {
            return Ok((a_off, false));
        }
        let slots = self.enc.begin_array(plan.len());
        for (i, off) in plan.iter().enumerate() {
            self.enc.set_array_slot(&slots, i, *off);
        }
        self.index.upsert(a_off, slots.offset());
        Ok((a_off, false))
    }

    /// Name-wise object diff emitting a patch-form header when any member
    /// changed, was added, or was removed.
    fn diff_object(&mut self, a_off: i32, b_off: i32, depth: usize) -> Result<(i32, bool)> {
        let a = self.a;
        let b = self.b;
        let va = read_object(a, a_off)?;
        let vb = read_object(b, b_off)?;
        let (a_names, a_name_offs, a_val_offs) = va.full_entries()?;
        let (b_names, b_val_offs) = vb.names_and_values()?;
        let b_total = b_names.len();

        let mut changed: Vec<(i32, i32)> = Vec::new();
        let (mut i, mut j) = (0usize, 0usize);
        while i < a_names.len() || j < b_names.len() {
            if j >= b_names.len() || (i < a_names.len() && a_names[i] < b_names[j]) {
                changed.push((a_name_offs[i], DELETED));
                i += 1;
            } else if i >= a_names.len() || a_names[i] > b_names[j] {
                let name = b_names[j].to_vec();
                let value = reserialize(&mut self.enc, b, b_val_offs[j], true, depth - 1)?;
                let name_off = self.enc.write_string(&name);
                changed.push((name_off, value));
                j += 1;
            } else {
                let (repr, adopt) =
                    self.diff_at(a_val_offs[i], b_val_offs[j], true, depth - 1)?;
                if adopt {
                    changed.push((a_name_offs[i], repr));
                }
                i += 1;
                j += 1;
            }
        }
        if changed.is_empty() {
            return Ok((a_off, false));
        }
        let patch_off = self.enc.write_object_patch(a_off, b_total, &changed);
        self.index.upsert(a_off, patch_off);
        Ok((a_off, false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::reader::{read_object, read_str};
    use crate::delta::reader::DeltaReader;
    use crate::snapshot::{serialize_value, Snapshot};
    use crate::value::{KeyInterner, Value};
    use proptest::prelude::*;

    fn snap(text: &str) -> Snapshot {
        let json: serde_json::Value = serde_json::from_str(text).unwrap();
        let value = Value::from_json(&json, &mut KeyInterner::new());
        serialize_value(&value).unwrap()
    }

    fn assert_applies(a: &Snapshot, b: &Snapshot) -> DiffOutcome {
        let outcome = diff(a, b, None).unwrap();
        let merged = DeltaReader::new(a.bytes(), &outcome.delta, &outcome.index);
        assert!(
            eq_encoded(&merged, merged.root(), b, b.root()).unwrap(),
            "apply(diff) must reproduce b"
        );
        outcome
    }

    #[test]
    fn test_equal_snapshots_empty_diff() {
        let a = snap(r#"{"x": [1, 2, {"y": true}]}"#);
        let b = snap(r#"{"x": [1, 2, {"y": true}]}"#);
        let outcome = assert_applies(&a, &b);
        assert!(outcome.empty);
        assert!(outcome.index.is_empty());
    }

    #[test]
    fn test_single_member_change_emits_object_patch() {
        // Both members of the base intern the same "bar" bytes, so the
        // change rides on the parent as a patch-form header.
        let a = snap(r#"{"abc": "bar", "def": "bar"}"#);
        let b = snap(r#"{"abc": "bar", "def": "foo"}"#);
        let outcome = assert_applies(&a, &b);
        assert!(!outcome.empty);
        assert_eq!(outcome.index.len(), 1);
        let target = outcome.index.lookup(0).unwrap();
        let merged = DeltaReader::new(a.bytes(), &outcome.delta, &outcome.index);
        assert_eq!(read_tag(&merged, target).unwrap(), Tag::ObjectPatch);

        let view = read_object(&merged, 0).unwrap();
        let abc = view.value_offset(b"abc").unwrap().unwrap();
        assert_eq!(read_str(&merged, abc).unwrap(), "bar");
        // The unchanged member still resolves into the base region.
        assert!(abc < a.len());
        let def = view.value_offset(b"def").unwrap().unwrap();
        assert_eq!(read_str(&merged, def).unwrap(), "foo");
        assert!(def >= a.len());

        // The patched view hashes like the plain encoding of b.
        assert_eq!(
            hash_encoded(&merged, merged.root()).unwrap(),
            hash_encoded(&b, b.root()).unwrap()
        );
    }

    #[test]
    fn test_added_and_removed_members() {
        let a = snap(r#"{"keep": 1, "drop": 2}"#);
        let b = snap(r#"{"keep": 1, "new": 3}"#);
        let outcome = assert_applies(&a, &b);
        let merged = DeltaReader::new(a.bytes(), &outcome.delta, &outcome.index);
        let view = read_object(&merged, 0).unwrap();
        assert_eq!(view.len(), 2);
        assert!(view.value_offset(b"drop").unwrap().is_none());
        assert!(view.value_offset(b"new").unwrap().is_some());
    }

    #[test]
    fn test_array_reuse_and_rewrite() {
        let a = snap(r#"["alpha", "beta", "gamma"]"#);
        let b = snap(r#"["gamma", "beta", "delta"]"#);
        let outcome = assert_applies(&a, &b);
        // One entry: the rewritten array header at the root.
        assert_eq!(outcome.index.len(), 1);
        let merged = DeltaReader::new(a.bytes(), &outcome.delta, &outcome.index);
        let view = read_array(&merged, 0).unwrap();
        // "gamma" and "beta" are reused from the base region.
        assert!(view.value_offset(0).unwrap() < a.len());
        assert!(view.value_offset(1).unwrap() < a.len());
        assert!(view.value_offset(2).unwrap() >= a.len());
    }

    #[test]
    fn test_type_change_at_root_scalar() {
        let a = snap(r#""text""#);
        let b = snap(r#"{"now": "object"}"#);
        let outcome = assert_applies(&a, &b);
        assert_eq!(outcome.index.len(), 1);
        assert!(outcome.index.lookup(0).is_some());
    }

    #[test]
    fn test_nested_change_keeps_ancestors_untouched() {
        let a = snap(r#"{"outer": {"inner": {"leaf": 1}}, "other": true}"#);
        let b = snap(r#"{"outer": {"inner": {"leaf": 2}}, "other": true}"#);
        let outcome = assert_applies(&a, &b);
        // Only the innermost object re-targets; parents read through.
        assert_eq!(outcome.index.len(), 1);
        assert!(outcome.index.lookup(0).is_none());
    }

    #[test]
    fn test_embedded_primitive_changes() {
        let a = snap(r#"[true, null, false]"#);
        let b = snap(r#"[false, null, false]"#);
        assert_applies(&a, &b);
    }

    #[test]
    fn test_cancellation() {
        let a = snap(r#"{"a": 1}"#);
        let b = snap(r#"{"a": 2}"#);
        let flag = CancelFlag::new();
        flag.cancel();
        assert!(matches!(
            diff(&a, &b, Some(&flag)),
            Err(crate::core::Error::Cancelled)
        ));
    }

    fn arb_json() -> impl Strategy<Value = serde_json::Value> {
        let leaf = prop_oneof![
            Just(serde_json::Value::Null),
            any::<bool>().prop_map(serde_json::Value::Bool),
            (-1000i64..1000).prop_map(|i| serde_json::json!(i)),
            "[a-c]{0,3}".prop_map(serde_json::Value::String),
        ];
        leaf.prop_recursive(3, 32, 6, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..6)
                    .prop_map(serde_json::Value::Array),
                prop::collection::btree_map("[a-d]{1,2}", inner, 0..6).prop_map(|m| {
                    serde_json::Value::Object(m.into_iter().collect())
                }),
            ]
        })
    }

    proptest! {
        #[test]
        fn prop_diff_apply_identity(ja in arb_json(), jb in arb_json()) {
            let mut interner = KeyInterner::new();
            let a = serialize_value(&Value::from_json(&ja, &mut interner)).unwrap();
            let b = serialize_value(&Value::from_json(&jb, &mut interner)).unwrap();
            let outcome = diff(&a, &b, None).unwrap();
            let merged = DeltaReader::new(a.bytes(), &outcome.delta, &outcome.index);
            prop_assert!(eq_encoded(&merged, merged.root(), &b, b.root()).unwrap());
            if ja == jb {
                prop_assert!(outcome.empty);
            }
        }
    }
}
