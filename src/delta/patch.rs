//! JSON Patch application as appended delta layers
//!
//! Each operation rewrites the enclosing container of its final pointer
//! segment: the node is cloned into the in-memory tree through the
//! current overlay, mutated, serialized into fresh delta bytes, and the
//! container's referenced offset re-targeted in the patch table. Table
//! entries reachable from the rewritten subtree are subsumed and removed
//! in the same commit, so redirection never chains. A failed op truncates
//! its speculative append and leaves the table untouched.

use tracing::debug;

use crate::codec::reader::{read_array, read_object, read_tag, DEFAULT_MAX_DEPTH};
use crate::codec::writer::reserialize;
use crate::codec::{ContentReader, Encoder, Tag};
use crate::core::{CodecError, PatchError, Result};
use crate::delta::diff::{diff_with_depth, DiffOutcome};
use crate::delta::pointer::{parse_array_index, parse_pointer, ArrayIndex};
use crate::delta::reader::{decode_delta, encode_delta, DeltaReader, PatchIndex};
use crate::snapshot::{write_value, Snapshot};
use crate::value::{KeyInterner, Value};

/// One JSON Patch operation (RFC 6902 plus `create`).
///
/// Values are engine values, so the store layer can patch blob payloads
/// through the same path.
#[derive(Debug, Clone)]
pub enum PatchOp {
    /// Insert or replace the value at `path`
    Add {
        /// Target pointer
        path: String,
        /// Value to place
        value: Value,
    },
    /// Replace the existing value at `path`
    Replace {
        /// Target pointer
        path: String,
        /// Replacement value
        value: Value,
    },
    /// Remove the value at `path`
    Remove {
        /// Target pointer
        path: String,
    },
    /// Fail unless the value at `path` equals `value`
    Test {
        /// Target pointer
        path: String,
        /// Expected value
        value: Value,
    },
    /// Copy the value at `from` to `path`
    Copy {
        /// Source pointer
        from: String,
        /// Target pointer
        path: String,
    },
    /// Move the value at `from` to `path`
    Move {
        /// Source pointer
        from: String,
        /// Target pointer
        path: String,
    },
    /// Like `add`, but materializes missing intermediate objects
    Create {
        /// Target pointer
        path: String,
        /// Value to place
        value: Value,
    },
}

impl PatchOp {
    /// Parse an RFC 6902 patch document (a JSON array of op objects).
    pub fn parse_ops(
        doc: &serde_json::Value,
        interner: &mut KeyInterner,
    ) -> Result<Vec<PatchOp>> {
        let entries = doc.as_array().ok_or_else(|| PatchError::InvalidOp {
            reason: "patch document must be an array".into(),
        })?;
        entries
            .iter()
            .map(|entry| Self::parse_one(entry, interner))
            .collect()
    }

    fn parse_one(entry: &serde_json::Value, interner: &mut KeyInterner) -> Result<PatchOp> {
        let obj = entry.as_object().ok_or_else(|| PatchError::InvalidOp {
            reason: "patch op must be an object".into(),
        })?;
        let field = |name: &str| -> Result<String> {
            obj.get(name)
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .ok_or_else(|| {
                    PatchError::InvalidOp { reason: format!("missing {name:?} field") }
                        .into()
                })
        };
        let value = |interner: &mut KeyInterner| -> Result<Value> {
            let raw = obj.get("value").ok_or(PatchError::InvalidOp {
                reason: "missing \"value\" field".into(),
            })?;
            Ok(Value::from_json(raw, interner))
        };
        let op = field("op")?;
        let path = field("path")?;
        Ok(match op.as_str() {
            "add" => PatchOp::Add { path, value: value(interner)? },
            "replace" => PatchOp::Replace { path, value: value(interner)? },
            "remove" => PatchOp::Remove { path },
            "test" => PatchOp::Test { path, value: value(interner)? },
            "copy" => PatchOp::Copy { from: field("from")?, path },
            "move" => PatchOp::Move { from: field("from")?, path },
            "create" => PatchOp::Create { path, value: value(interner)? },
            other => return Err(PatchError::UnknownOp { op: other.to_string() }.into()),
        })
    }

    /// The op's target pointer.
    pub fn path(&self) -> &str {
        match self {
            PatchOp::Add { path, .. }
            | PatchOp::Replace { path, .. }
            | PatchOp::Remove { path }
            | PatchOp::Test { path, .. }
            | PatchOp::Copy { path, .. }
            | PatchOp::Move { path, .. }
            | PatchOp::Create { path, .. } => path,
        }
    }
}

/// The final-segment mutation a pointer op performs.
enum Mutation {
    Add(Value),
    Replace(Value),
    Create(Value),
    Remove,
}

impl Mutation {
    fn creates_intermediates(&self) -> bool {
        matches!(self, Mutation::Create(_))
    }
}

/// Append-only delta writer over one immutable snapshot.
pub struct DeltaBuilder {
    snapshot: Snapshot,
    /// Delta bytes; starts with the 4-byte header placeholder.
    delta: Vec<u8>,
    index: PatchIndex,
    max_depth: usize,
}

impl DeltaBuilder {
    /// Fresh, empty delta over `snapshot`.
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            snapshot,
            delta: vec![0u8; 4],
            index: PatchIndex::new(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Reload a builder from a serialized delta buffer.
    pub fn from_parts(snapshot: Snapshot, delta: &[u8]) -> Result<Self> {
        let index = decode_delta(delta)?;
        let delta = if delta.is_empty() { vec![0u8; 4] } else { delta.to_vec() };
        Ok(Self { snapshot, delta, index, max_depth: DEFAULT_MAX_DEPTH })
    }

    /// Replace the nesting guard applied to this builder's decode,
    /// serialize, and diff passes.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// The base snapshot.
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Whether no patches have been applied.
    pub fn is_clean(&self) -> bool {
        self.index.is_empty()
    }

    /// Reader over the current overlaid state.
    pub fn reader(&self) -> DeltaReader<'_> {
        DeltaReader::new(self.snapshot.bytes(), &self.delta, &self.index)
    }

    /// Apply a patch document. All-or-nothing: any failing op rolls the
    /// whole document back.
    pub fn apply(&mut self, ops: &[PatchOp], interner: &mut KeyInterner) -> Result<()> {
        let delta_mark = self.delta.len();
        let index_mark = self.index.clone();
        debug!(ops = ops.len(), "applying patch document");
        for op in ops {
            if let Err(err) = self.apply_one(op, interner) {
                self.delta.truncate(delta_mark);
                self.index = index_mark;
                return Err(err);
            }
        }
        Ok(())
    }

    fn apply_one(&mut self, op: &PatchOp, interner: &mut KeyInterner) -> Result<()> {
        match op {
            PatchOp::Test { path, value } => {
                let current = self.value_at(path, interner)?;
                if current != *value {
                    return Err(PatchError::TestFailed { path: path.clone() }.into());
                }
                Ok(())
            }
            PatchOp::Add { path, value } => {
                self.mutate(path, Mutation::Add(value.clone()), interner)
            }
            PatchOp::Replace { path, value } => {
                self.mutate(path, Mutation::Replace(value.clone()), interner)
            }
            PatchOp::Create { path, value } => {
                self.mutate(path, Mutation::Create(value.clone()), interner)
            }
            PatchOp::Remove { path } => self.mutate(path, Mutation::Remove, interner),
            PatchOp::Copy { from, path } => {
                let value = self.value_at(from, interner)?;
                self.mutate(path, Mutation::Add(value), interner)
            }
            PatchOp::Move { from, path } => {
                if path == from {
                    return Ok(());
                }
                if path.starts_with(&format!("{from}/")) {
                    return Err(PatchError::InvalidOp {
                        reason: format!("cannot move {from:?} into its own child {path:?}"),
                    }
                    .into());
                }
                let value = self.value_at(from, interner)?;
                let delta_mark = self.delta.len();
                let index_mark = self.index.clone();
                self.mutate(from, Mutation::Remove, interner)?;
                if let Err(err) = self.mutate(path, Mutation::Add(value), interner) {
                    self.delta.truncate(delta_mark);
                    self.index = index_mark;
                    return Err(err);
                }
                Ok(())
            }
        }
    }

    /// Decode the current value at a pointer.
    pub fn value_at(&self, path: &str, interner: &mut KeyInterner) -> Result<Value> {
        let segs = parse_pointer(path)?;
        let reader = self.reader();
        let off = resolve(&reader, &segs, path)?;
        Value::decode_with_depth(&reader, off, interner, self.max_depth)
    }

    /// Rewrite the enclosing container of `path`'s final segment.
    fn mutate(&mut self, path: &str, mutation: Mutation, interner: &mut KeyInterner) -> Result<()> {
        let segs = parse_pointer(path)?;

        // Whole-document ops replace the root outright.
        if segs.is_empty() {
            let value = match mutation {
                Mutation::Add(v) | Mutation::Replace(v) | Mutation::Create(v) => v,
                Mutation::Remove => {
                    return Err(PatchError::InvalidOp {
                        reason: "cannot remove the document root".into(),
                    }
                    .into())
                }
            };
            return self.commit(0, &value);
        }

        // Walk to the deepest existing node on the parent path. `create`
        // stops early at a missing object member and materializes the
        // rest in memory.
        let reader = self.reader();
        let parent_segs = &segs[..segs.len() - 1];
        let mut base = 0i32;
        let mut walked = 0usize;
        for seg in parent_segs {
            match child_of(&reader, base, seg, path)? {
                Some(child) => {
                    base = child;
                    walked += 1;
                }
                None if mutation.creates_intermediates() => break,
                None => return Err(PatchError::PathNotFound { path: path.to_string() }.into()),
            }
        }

        let mut node = Value::decode_with_depth(&reader, base, interner, self.max_depth)?;
        apply_path(&mut node, &segs[walked..], &mutation, interner, path)?;
        self.commit(base, &node)
    }

    /// Serialize `value`, collect subsumed entries under `base`, and land
    /// the append + table update as one commit.
    fn commit(&mut self, base: i32, value: &Value) -> Result<()> {
        let mut enc = Encoder::new(self.snapshot.len() + self.delta.len() as i32);
        let new_off = write_value(&mut enc, value, false, self.max_depth)?;
        let mut doomed = Vec::new();
        collect_subsumed(&self.reader(), base, &self.index, &mut doomed, self.max_depth)?;

        // Subsumed entries go before the new bytes and entry land.
        for off in doomed {
            self.index.remove(off);
        }
        self.delta.extend_from_slice(enc.bytes());
        self.index.upsert(base, new_off);
        Ok(())
    }

    /// Export a self-contained delta: the merged state is re-diffed
    /// against the base snapshot, collapsing chained patches into one
    /// body.
    pub fn serialize(&self) -> Result<DiffOutcome> {
        if self.index.is_empty() {
            let index = PatchIndex::new();
            return Ok(DiffOutcome {
                delta: encode_delta(vec![0u8; 4], &index),
                index,
                empty: true,
            });
        }
        let reader = self.reader();
        let outcome = diff_with_depth(&self.snapshot, &reader, None, self.max_depth)?;
        debug!(entries = outcome.index.len(), bytes = outcome.delta.len(), "serialized delta");
        Ok(outcome)
    }

    /// Rewrite the overlaid state into a standalone snapshot.
    pub fn materialize(&self) -> Result<Snapshot> {
        if self.index.is_empty() {
            return Ok(self.snapshot.clone());
        }
        let reader = self.reader();
        let mut enc = Encoder::new(0);
        reserialize(&mut enc, &reader, reader.root(), false, self.max_depth)?;
        Ok(Snapshot::from_vec(enc.into_bytes()))
    }
}

/// Resolve a full segment path to the stored offset of its value.
fn resolve(reader: &DeltaReader<'_>, segs: &[String], path: &str) -> Result<i32> {
    let mut off = 0i32;
    for seg in segs {
        off = child_of(reader, off, seg, path)?
            .ok_or_else(|| PatchError::PathNotFound { path: path.to_string() })?;
    }
    Ok(off)
}

/// The stored offset of `seg` under the container at `off`, or `None`
/// for an object member that does not exist.
fn child_of(
    reader: &DeltaReader<'_>,
    off: i32,
    seg: &str,
    path: &str,
) -> Result<Option<i32>> {
    match read_tag(reader, off)? {
        Tag::ObjectFull | Tag::ObjectThin | Tag::ObjectPatch => {
            Ok(read_object(reader, off)?.value_offset(seg.as_bytes())?)
        }
        Tag::Array => {
            let view = read_array(reader, off)?;
            match parse_array_index(seg, false)? {
                ArrayIndex::At(i) if i < view.len() => Ok(Some(view.value_offset(i)?)),
                ArrayIndex::At(i) => {
                    Err(PatchError::IndexOutOfRange { index: i, len: view.len() }.into())
                }
                ArrayIndex::Append => unreachable!("append rejected by parse"),
            }
        }
        _ => Err(PatchError::NotAContainer { path: path.to_string() }.into()),
    }
}

/// Apply the remaining pointer segments inside the decoded node: all but
/// the last navigate (creating empty objects under `create`), the last
/// performs the mutation.
fn apply_path(
    node: &mut Value,
    segs: &[String],
    mutation: &Mutation,
    interner: &mut KeyInterner,
    path: &str,
) -> Result<()> {
    debug_assert!(!segs.is_empty());
    if segs.len() > 1 {
        let seg = &segs[0];
        match node {
            Value::Object(obj) => {
                if !obj.contains_key(seg) {
                    if mutation.creates_intermediates() {
                        obj.insert(seg.as_str().into(), Value::empty_object(), interner);
                    } else {
                        return Err(
                            PatchError::PathNotFound { path: path.to_string() }.into()
                        );
                    }
                }
                let child = obj.get_mut(seg).expect("present or just created");
                return apply_path(child, &segs[1..], mutation, interner, path);
            }
            Value::Array(arr) => {
                let len = arr.len();
                match parse_array_index(seg, false)? {
                    ArrayIndex::At(i) if i < len => {
                        let child = arr.get_mut(i).ok_or_else(|| {
                            PatchError::NotAContainer { path: path.to_string() }
                        })?;
                        return apply_path(child, &segs[1..], mutation, interner, path);
                    }
                    ArrayIndex::At(i) => {
                        return Err(PatchError::IndexOutOfRange { index: i, len }.into())
                    }
                    ArrayIndex::Append => unreachable!("append rejected by parse"),
                }
            }
            _ => return Err(PatchError::NotAContainer { path: path.to_string() }.into()),
        }
    }

    let seg = &segs[0];
    match node {
        Value::Object(obj) => match mutation {
            Mutation::Add(v) | Mutation::Create(v) => {
                obj.insert(seg.as_str().into(), v.clone(), interner);
                Ok(())
            }
            Mutation::Replace(v) => {
                if !obj.contains_key(seg) {
                    return Err(PatchError::MissingKey { path: path.to_string() }.into());
                }
                obj.insert(seg.as_str().into(), v.clone(), interner);
                Ok(())
            }
            Mutation::Remove => {
                if obj.remove(seg, interner).is_none() {
                    return Err(PatchError::MissingKey { path: path.to_string() }.into());
                }
                Ok(())
            }
        },
        Value::Array(arr) => {
            let len = arr.len();
            match mutation {
                Mutation::Add(v) | Mutation::Create(v) => {
                    match parse_array_index(seg, true)? {
                        ArrayIndex::Append => {
                            arr.push(v.clone());
                            Ok(())
                        }
                        ArrayIndex::At(i) if i <= len => {
                            arr.insert(i, v.clone());
                            Ok(())
                        }
                        ArrayIndex::At(i) => {
                            Err(PatchError::IndexOutOfRange { index: i, len }.into())
                        }
                    }
                }
                Mutation::Replace(v) => match parse_array_index(seg, false)? {
                    ArrayIndex::At(i) if i < len => {
                        arr.set(i, v.clone());
                        Ok(())
                    }
                    ArrayIndex::At(i) => {
                        Err(PatchError::IndexOutOfRange { index: i, len }.into())
                    }
                    ArrayIndex::Append => unreachable!("append rejected by parse"),
                },
                Mutation::Remove => match parse_array_index(seg, false)? {
                    ArrayIndex::At(i) if i < len => {
                        arr.remove(i);
                        Ok(())
                    }
                    ArrayIndex::At(i) => {
                        Err(PatchError::IndexOutOfRange { index: i, len }.into())
                    }
                    ArrayIndex::Append => unreachable!("append rejected by parse"),
                },
            }
        }
        _ => Err(PatchError::NotAContainer { path: path.to_string() }.into()),
    }
}

/// Collect every patch-table key reachable from the current subtree at
/// `off` (the rewrite base included).
fn collect_subsumed(
    reader: &DeltaReader<'_>,
    off: i32,
    index: &PatchIndex,
    out: &mut Vec<i32>,
    depth: usize,
) -> Result<()> {
    if depth == 0 {
        return Err(CodecError::DepthExceeded { max: DEFAULT_MAX_DEPTH }.into());
    }
    if off < 0 {
        return Ok(());
    }
    if index.contains(off) {
        out.push(off);
    }
    match read_tag(reader, off)? {
        Tag::Array => {
            let view = read_array(reader, off)?;
            for i in 0..view.len() {
                collect_subsumed(reader, view.value_offset(i)?, index, out, depth - 1)?;
            }
        }
        Tag::ObjectFull | Tag::ObjectThin | Tag::ObjectPatch => {
            let view = read_object(reader, off)?;
            for i in 0..view.len() {
                collect_subsumed(reader, view.value_offset_at(i)?, index, out, depth - 1)?;
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::serialize_value;
    use crate::value::cmp::eq_encoded;

    fn builder(text: &str) -> (DeltaBuilder, KeyInterner) {
        let mut interner = KeyInterner::new();
        let json: serde_json::Value = serde_json::from_str(text).unwrap();
        let value = Value::from_json(&json, &mut interner);
        (DeltaBuilder::new(serialize_value(&value).unwrap()), interner)
    }

    fn ops(text: &str, interner: &mut KeyInterner) -> Vec<PatchOp> {
        let doc: serde_json::Value = serde_json::from_str(text).unwrap();
        PatchOp::parse_ops(&doc, interner).unwrap()
    }

    fn current(builder: &DeltaBuilder, interner: &mut KeyInterner) -> serde_json::Value {
        let reader = builder.reader();
        Value::decode(&reader, reader.root(), interner)
            .unwrap()
            .to_json()
            .unwrap()
    }

    fn assert_no_chains(index: &PatchIndex) {
        for (_, target) in index.iter() {
            assert!(
                !index.contains(target),
                "entry target {target} is itself redirected"
            );
        }
    }

    #[test]
    fn test_add_replace_remove() {
        let (mut b, mut i) = builder(r#"{"a": {"b": 1}, "keep": true}"#);
        b.apply(&ops(r#"[{"op": "add", "path": "/a/c", "value": 2}]"#, &mut i), &mut i)
            .unwrap();
        b.apply(&ops(r#"[{"op": "replace", "path": "/a/b", "value": 9}]"#, &mut i), &mut i)
            .unwrap();
        b.apply(&ops(r#"[{"op": "remove", "path": "/a/c"}]"#, &mut i), &mut i)
            .unwrap();
        assert_eq!(
            current(&b, &mut i),
            serde_json::json!({"a": {"b": 9}, "keep": true})
        );
        assert_no_chains(b.reader().index());
    }

    #[test]
    fn test_test_failure_leaves_table_untouched() {
        let (mut b, mut i) = builder(r#"{"a": "b"}"#);
        let before = b.reader().index().len();
        let err = b
            .apply(&ops(r#"[{"op": "test", "path": "/a", "value": "c"}]"#, &mut i), &mut i)
            .unwrap_err();
        assert!(matches!(
            err,
            crate::core::Error::Patch(PatchError::TestFailed { ref path }) if path == "/a"
        ));
        assert_eq!(b.reader().index().len(), before);
        assert_eq!(current(&b, &mut i), serde_json::json!({"a": "b"}));
    }

    #[test]
    fn test_document_is_atomic() {
        let (mut b, mut i) = builder(r#"{"a": 1}"#);
        let err = b.apply(
            &ops(
                r#"[
                    {"op": "add", "path": "/x", "value": 2},
                    {"op": "test", "path": "/a", "value": 999}
                ]"#,
                &mut i,
            ),
            &mut i,
        );
        assert!(err.is_err());
        // The earlier add in the failed document rolled back too.
        assert_eq!(current(&b, &mut i), serde_json::json!({"a": 1}));
        assert!(b.is_clean());
    }

    #[test]
    fn test_overlapping_patch_subsumption() {
        let (mut b, mut i) = builder(r#"{"foo": {"nested": "abc"}, "bar": "def"}"#);
        b.apply(&ops(r#"[{"op": "add", "path": "/new", "value": "value"}]"#, &mut i), &mut i)
            .unwrap();
        b.apply(
            &ops(r#"[{"op": "add", "path": "/foo/nested", "value": "patched"}]"#, &mut i),
            &mut i,
        )
        .unwrap();
        b.apply(
            &ops(
                r#"[{"op": "replace", "path": "", "value": {"foo": {"nested": "abc"}, "bar": "patched"}}]"#,
                &mut i,
            ),
            &mut i,
        )
        .unwrap();
        assert_eq!(
            current(&b, &mut i),
            serde_json::json!({"foo": {"nested": "abc"}, "bar": "patched"})
        );
        // The root replace subsumed the nested patches: one entry left.
        assert_eq!(b.reader().index().len(), 1);
        assert_no_chains(b.reader().index());
    }

    #[test]
    fn test_array_ops() {
        let (mut b, mut i) = builder(r#"{"arr": []}"#);
        b.apply(&ops(r#"[{"op": "add", "path": "/arr/0", "value": "first"}]"#, &mut i), &mut i)
            .unwrap();
        b.apply(&ops(r#"[{"op": "add", "path": "/arr/-", "value": "last"}]"#, &mut i), &mut i)
            .unwrap();
        b.apply(&ops(r#"[{"op": "add", "path": "/arr/1", "value": "mid"}]"#, &mut i), &mut i)
            .unwrap();
        assert_eq!(
            current(&b, &mut i),
            serde_json::json!({"arr": ["first", "mid", "last"]})
        );

        assert!(b
            .apply(&ops(r#"[{"op": "add", "path": "/arr/9", "value": 0}]"#, &mut i), &mut i)
            .is_err());
        assert!(b
            .apply(&ops(r#"[{"op": "add", "path": "/arr/01", "value": 0}]"#, &mut i), &mut i)
            .is_err());
        assert!(b
            .apply(&ops(r#"[{"op": "remove", "path": "/arr/3"}]"#, &mut i), &mut i)
            .is_err());
    }

    #[test]
    fn test_remove_missing_key_fails() {
        let (mut b, mut i) = builder(r#"{"a": 1}"#);
        let err = b
            .apply(&ops(r#"[{"op": "remove", "path": "/missing"}]"#, &mut i), &mut i)
            .unwrap_err();
        assert!(err.is_patch_conflict());
    }

    #[test]
    fn test_copy_and_move() {
        let (mut b, mut i) = builder(r#"{"src": {"deep": [1, 2]}, "other": 0}"#);
        b.apply(&ops(r#"[{"op": "copy", "from": "/src", "path": "/dup"}]"#, &mut i), &mut i)
            .unwrap();
        b.apply(&ops(r#"[{"op": "move", "from": "/other", "path": "/moved"}]"#, &mut i), &mut i)
            .unwrap();
        assert_eq!(
            current(&b, &mut i),
            serde_json::json!({
                "src": {"deep": [1, 2]},
                "dup": {"deep": [1, 2]},
                "moved": 0
            })
        );
        assert!(b
            .apply(&ops(r#"[{"op": "move", "from": "/src", "path": "/src/deep"}]"#, &mut i), &mut i)
            .is_err());
    }

    #[test]
    fn test_create_materializes_intermediates() {
        let (mut b, mut i) = builder(r#"{}"#);
        b.apply(&ops(r#"[{"op": "create", "path": "/a/b/c", "value": 7}]"#, &mut i), &mut i)
            .unwrap();
        assert_eq!(current(&b, &mut i), serde_json::json!({"a": {"b": {"c": 7}}}));

        // Plain add does not materialize.
        assert!(b
            .apply(&ops(r#"[{"op": "add", "path": "/x/y", "value": 1}]"#, &mut i), &mut i)
            .is_err());
    }

    #[test]
    fn test_deep_patch_leaves_ancestors_alone() {
        let (mut b, mut i) = builder(r#"{"a": {"b": {"c": {"d": 1}}}, "e": 2}"#);
        b.apply(&ops(r#"[{"op": "replace", "path": "/a/b/c/d", "value": 5}]"#, &mut i), &mut i)
            .unwrap();
        // Only the immediate parent re-targets; the root reads through.
        assert!(b.reader().index().lookup(0).is_none());
        assert_eq!(
            current(&b, &mut i),
            serde_json::json!({"a": {"b": {"c": {"d": 5}}}, "e": 2})
        );
    }

    #[test]
    fn test_serialize_merges_stacked_patches() {
        let (mut b, mut i) = builder(r#"{"x": {"y": 1}, "z": "zz"}"#);
        b.apply(&ops(r#"[{"op": "add", "path": "/x/w", "value": 2}]"#, &mut i), &mut i)
            .unwrap();
        b.apply(&ops(r#"[{"op": "remove", "path": "/x/w"}]"#, &mut i), &mut i)
            .unwrap();
        b.apply(&ops(r#"[{"op": "replace", "path": "/z", "value": "out"}]"#, &mut i), &mut i)
            .unwrap();

        let exported = b.serialize().unwrap();
        assert!(!exported.empty);
        // Reload from serialized parts and compare whole states.
        let reloaded = DeltaBuilder::from_parts(b.snapshot().clone(), &exported.delta).unwrap();
        let live = b.reader();
        let back = reloaded.reader();
        assert!(eq_encoded(&live, live.root(), &back, back.root()).unwrap());
        // The add+remove pair collapsed away: /x is untouched in the export.
        assert_eq!(
            current(&reloaded, &mut i),
            serde_json::json!({"x": {"y": 1}, "z": "out"})
        );
        assert_no_chains(&exported.index);
    }

    #[test]
    fn test_materialize_roundtrip() {
        let (mut b, mut i) = builder(r#"{"a": [1, 2, 3]}"#);
        b.apply(&ops(r#"[{"op": "add", "path": "/a/-", "value": 4}]"#, &mut i), &mut i)
            .unwrap();
        let snap = b.materialize().unwrap();
        let value = Value::decode(&snap, snap.root(), &mut i).unwrap();
        assert_eq!(value.to_json().unwrap(), serde_json::json!({"a": [1, 2, 3, 4]}));
    }

    #[test]
    fn test_root_scalar_replace() {
        let (mut b, mut i) = builder(r#""before""#);
        b.apply(&ops(r#"[{"op": "replace", "path": "", "value": "after"}]"#, &mut i), &mut i)
            .unwrap();
        assert_eq!(current(&b, &mut i), serde_json::json!("after"));
        assert!(b
            .apply(&ops(r#"[{"op": "remove", "path": ""}]"#, &mut i), &mut i)
            .is_err());
    }
}
