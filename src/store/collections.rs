//! Prepared collections over a snapshot and its delta
//!
//! A [`Collections`] wraps one immutable snapshot plus an append-only
//! delta builder. Reads resolve through the overlay; writes build JSON
//! Patch documents against the resource tree and land them as delta
//! layers, so the base snapshot is never rewritten.

use std::io::Read;

use bytes::Bytes;
use tracing::debug;

use crate::codec::reader::read_object;
use crate::core::{CancelFlag, Result, StoreConfig, StoreError};
use crate::delta::diff::{diff_with_depth, DiffOutcome};
use crate::delta::pointer::escape;
use crate::delta::reader::DeltaReader;
use crate::delta::{DeltaBuilder, PatchOp};
use crate::snapshot::{serialize_value, Snapshot};
use crate::store::resource::{Kind, Resource};
use crate::store::writable::WritableCollections;
use crate::store::{
    split_path, CHILD_PREFIX, DATA_KEY, KIND_KEY, META_PREFIX, TIMESTAMP_META,
};
use crate::value::{KeyInterner, Value};

/// Pointer to the resource node named by `segs`.
fn pointer_for(segs: &[&str]) -> String {
    let mut out = String::new();
    for seg in segs {
        out.push('/');
        out.push_str(&escape(&format!("{CHILD_PREFIX}{seg}")));
    }
    out
}

/// Stored offset of the resource named by `segs`, if present.
fn resource_offset(reader: &DeltaReader<'_>, segs: &[&str]) -> Result<Option<i32>> {
    let mut off = 0i32;
    for seg in segs {
        let view = read_object(reader, off)?;
        let key = format!("{CHILD_PREFIX}{seg}");
        match view.value_offset(key.as_bytes())? {
            Some(child) => off = child,
            None => return Ok(None),
        }
    }
    Ok(Some(off))
}

/// A namespaced tree of resources over snapshot + delta.
pub struct Collections {
    builder: DeltaBuilder,
    interner: KeyInterner,
    config: StoreConfig,
    timestamp: Option<String>,
}

impl Collections {
    /// An empty collections (root directory only).
    pub fn new() -> Result<Self> {
        let snapshot = serialize_value(&Value::empty_object())?;
        Ok(Self::with_snapshot(snapshot, StoreConfig::default(), None))
    }

    /// Wrap an existing snapshot with an empty delta.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self::with_snapshot(snapshot, StoreConfig::default(), None)
    }

    pub(crate) fn with_snapshot(
        snapshot: Snapshot,
        config: StoreConfig,
        timestamp: Option<String>,
    ) -> Self {
        Self {
            builder: DeltaBuilder::new(snapshot).with_max_depth(config.max_depth),
            interner: KeyInterner::new(),
            config,
            timestamp,
        }
    }

    /// Reload from pluggable byte sources: snapshot bytes plus an
    /// optional serialized delta. I/O errors surface as-is.
    ///
    /// Configuration does not travel in the serialized form; the embedder
    /// re-supplies it here, as it did when the store was first built.
    pub fn from_readers<S: Read, D: Read>(
        mut snapshot: S,
        snapshot_len: usize,
        delta: Option<D>,
        delta_len: usize,
        config: StoreConfig,
    ) -> Result<Self> {
        let mut snap_buf = vec![0u8; snapshot_len];
        snapshot.read_exact(&mut snap_buf)?;
        let snap = Snapshot::from_vec(snap_buf);
        let builder = match delta {
            Some(mut d) if delta_len > 0 => {
                let mut delta_buf = vec![0u8; delta_len];
                d.read_exact(&mut delta_buf)?;
                DeltaBuilder::from_parts(snap, &delta_buf)?
            }
            _ => DeltaBuilder::new(snap),
        }
        .with_max_depth(config.max_depth);
        Ok(Self {
            builder,
            interner: KeyInterner::new(),
            config,
            timestamp: None,
        })
    }

    /// Reader over the current overlaid state.
    pub fn reader(&self) -> DeltaReader<'_> {
        self.builder.reader()
    }

    /// The base snapshot.
    pub fn snapshot(&self) -> &Snapshot {
        self.builder.snapshot()
    }

    /// Resolve a resource by its `/`-separated name.
    pub fn resource(&self, path: &str) -> Result<Option<Resource<'_>>> {
        let segs = split_path(path)?;
        let reader = self.builder.reader();
        Ok(resource_offset(&reader, &segs)?
            .map(|off| Resource::new(reader, path.to_string(), off, self.config.max_depth)))
    }

    /// Names of the root-level resources.
    pub fn collections(&self) -> Result<Vec<String>> {
        match self.resource("")? {
            Some(root) => root.children(),
            None => Ok(Vec::new()),
        }
    }

    /// Visit every resource depth-first, children in name order, root
    /// first.
    pub fn walk<F>(&self, mut cb: F) -> Result<()>
    where
        F: FnMut(&Resource<'_>) -> Result<()>,
    {
        self.walk_with(None, &mut cb)
    }

    /// [`walk`](Self::walk) with a cancellation flag.
    pub fn walk_with<F>(&self, cancel: Option<&CancelFlag>, cb: &mut F) -> Result<()>
    where
        F: FnMut(&Resource<'_>) -> Result<()>,
    {
        let reader = self.builder.reader();
        walk_node(reader, String::new(), 0, self.config.max_depth, cancel, cb)
    }

    /// Write a JSON payload at `path`, materializing intermediate
    /// directories and displacing any children the target held.
    pub fn write_json(&mut self, path: &str, json: &serde_json::Value) -> Result<()> {
        let value = Value::from_json(json, &mut self.interner);
        self.write_leaf(path, Kind::Json, value)
    }

    /// Write an engine value as a JSON resource.
    pub fn write_value(&mut self, path: &str, value: Value) -> Result<()> {
        self.write_leaf(path, Kind::Json, value)
    }

    /// Write an unstructured byte payload at `path`.
    pub fn write_blob(&mut self, path: &str, bytes: &[u8]) -> Result<()> {
        self.write_leaf(path, Kind::Unstructured, Value::from(bytes.to_vec()))
    }

    /// Ensure a directory exists at `path`, coercing any leaf in the way.
    pub fn write_directory(&mut self, path: &str) -> Result<()> {
        let segs = split_path(path)?;
        if segs.is_empty() {
            return Ok(());
        }
        let mut ops = Vec::new();
        {
            let reader = self.builder.reader();
            let mut off = Some(0i32);
            let mut pointer = String::new();
            for seg in &segs {
                if let Some(o) = off {
                    self.coerce_directory(&reader, o, &pointer, &mut ops)?;
                    let view = read_object(&reader, o)?;
                    let key = format!("{CHILD_PREFIX}{seg}");
                    off = view.value_offset(key.as_bytes())?;
                }
                pointer.push('/');
                pointer.push_str(&escape(&format!("{CHILD_PREFIX}{seg}")));
            }
            match off {
                Some(o) => self.coerce_directory(&reader, o, &pointer, &mut ops)?,
                None => ops.push(PatchOp::Create {
                    path: pointer.clone(),
                    value: Value::empty_object(),
                }),
            }
        }
        if ops.is_empty() {
            return Ok(());
        }
        debug!(path, "write directory");
        self.builder.apply(&ops, &mut self.interner)
    }

    /// Apply a JSON Patch document against a resource's payload.
    pub fn patch_json(&mut self, path: &str, patch_doc: &serde_json::Value) -> Result<()> {
        let segs = split_path(path)?;
        {
            let reader = self.builder.reader();
            if resource_offset(&reader, &segs)?.is_none() {
                return Err(StoreError::NotFound { path: path.to_string() }.into());
            }
        }
        let ops = PatchOp::parse_ops(patch_doc, &mut self.interner)?;
        let prefix = format!("{}/{DATA_KEY}", pointer_for(&segs));
        let rebased: Vec<PatchOp> = ops.into_iter().map(|op| rebase(op, &prefix)).collect();
        debug!(path, ops = rebased.len(), "patch");
        self.builder.apply(&rebased, &mut self.interner)?;
        self.stamp_after_mutation(&segs)
    }

    /// Remove the resource at `path`.
    ///
    /// Directories must be empty; a missing path succeeds only when
    /// `missing_ok` is set.
    pub fn remove(&mut self, path: &str, missing_ok: bool) -> Result<()> {
        let segs = split_path(path)?;
        if segs.is_empty() {
            return Err(StoreError::InvalidPath { path: path.to_string() }.into());
        }
        {
            let reader = self.builder.reader();
            match resource_offset(&reader, &segs)? {
                None => {
                    return if missing_ok {
                        Ok(())
                    } else {
                        Err(StoreError::NotFound { path: path.to_string() }.into())
                    }
                }
                Some(off) => {
                    let view = read_object(&reader, off)?;
                    let occupied = view
                        .names()?
                        .iter()
                        .any(|n| n.starts_with(CHILD_PREFIX.as_bytes()));
                    if occupied {
                        return Err(
                            StoreError::DirectoryNotEmpty { path: path.to_string() }.into()
                        );
                    }
                }
            }
        }
        let parent = pointer_for(&segs[..segs.len() - 1]);
        let last = segs[segs.len() - 1];
        let op = PatchOp::Remove {
            path: format!("{parent}/{}", escape(&format!("{CHILD_PREFIX}{last}"))),
        };
        debug!(path, "remove resource");
        self.builder.apply(&[op], &mut self.interner)
    }

    /// Set a metadata key on the resource at `path`.
    ///
    /// Returns whether a resource existed to receive it.
    pub fn write_meta(&mut self, path: &str, key: &str, value: &str) -> Result<bool> {
        let segs = split_path(path)?;
        {
            let reader = self.builder.reader();
            if resource_offset(&reader, &segs)?.is_none() {
                return Ok(false);
            }
        }
        let op = PatchOp::Add {
            path: format!(
                "{}/{}",
                pointer_for(&segs),
                escape(&format!("{META_PREFIX}{key}"))
            ),
            value: Value::from(value),
        };
        self.builder.apply(&[op], &mut self.interner)?;
        Ok(true)
    }

    /// Diff this collections against another, producing a standalone
    /// delta over this one's state.
    pub fn diff(&self, other: &Collections, cancel: Option<&CancelFlag>) -> Result<DiffOutcome> {
        let other_reader = other.builder.reader();
        if self.builder.is_clean() {
            diff_with_depth(self.builder.snapshot(), &other_reader, cancel, self.config.max_depth)
        } else {
            // A patched base is materialized first so the output applies
            // to plain bytes without this builder's table.
            let snapshot = self.builder.materialize()?;
            diff_with_depth(&snapshot, &other_reader, cancel, self.config.max_depth)
        }
    }

    /// Clone the current state into a mutable in-memory builder.
    pub fn writable(&self) -> Result<WritableCollections> {
        WritableCollections::from_reader(&self.builder.reader(), self.config.clone())
    }

    /// Export `(snapshot_bytes, delta_bytes, empty)` for persistence;
    /// reload with [`from_readers`](Self::from_readers).
    pub fn serialize(&self) -> Result<(Bytes, Vec<u8>, bool)> {
        let outcome = self.builder.serialize()?;
        Ok((
            self.builder.snapshot().bytes().clone(),
            outcome.delta,
            outcome.empty,
        ))
    }

    /// Rewrite the overlaid state into a standalone snapshot.
    pub fn materialize(&self) -> Result<Snapshot> {
        self.builder.materialize()
    }

    fn coerce_directory(
        &self,
        reader: &DeltaReader<'_>,
        off: i32,
        pointer: &str,
        ops: &mut Vec<PatchOp>,
    ) -> Result<()> {
        let view = read_object(reader, off)?;
        if view.value_offset(KIND_KEY.as_bytes())?.is_some() {
            ops.push(PatchOp::Remove { path: format!("{pointer}/{KIND_KEY}") });
        }
        if view.value_offset(DATA_KEY.as_bytes())?.is_some() {
            ops.push(PatchOp::Remove { path: format!("{pointer}/{DATA_KEY}") });
        }
        Ok(())
    }

    fn write_leaf(&mut self, path: &str, kind: Kind, value: Value) -> Result<()> {
        let segs = split_path(path)?;
        if segs.is_empty() {
            return Err(StoreError::InvalidPath { path: path.to_string() }.into());
        }
        let mut ops = Vec::new();
        let mut missing_from = None;
        let target_has_timestamp;
        let pointer = pointer_for(&segs);
        {
            let reader = self.builder.reader();
            let mut off = Some(0i32);
            let mut walked = String::new();
            for (i, seg) in segs.iter().enumerate() {
                if let Some(o) = off {
                    self.coerce_directory(&reader, o, &walked, &mut ops)?;
                    let view = read_object(&reader, o)?;
                    let key = format!("{CHILD_PREFIX}{seg}");
                    off = view.value_offset(key.as_bytes())?;
                    if off.is_none() {
                        missing_from = Some(i);
                    }
                }
                walked.push('/');
                walked.push_str(&escape(&format!("{CHILD_PREFIX}{seg}")));
            }
            // The target becomes a leaf: displace any children it holds.
            if let Some(o) = off {
                let view = read_object(&reader, o)?;
                for name in view.names()? {
                    if name.starts_with(CHILD_PREFIX.as_bytes()) {
                        let key = std::str::from_utf8(name).unwrap_or_default();
                        ops.push(PatchOp::Remove {
                            path: format!("{pointer}/{}", escape(key)),
                        });
                    }
                }
                target_has_timestamp = view
                    .value_offset(format!("{META_PREFIX}{TIMESTAMP_META}").as_bytes())?
                    .is_some();
            } else {
                target_has_timestamp = false;
            }
        }
        ops.push(PatchOp::Create {
            path: format!("{pointer}/{KIND_KEY}"),
            value: Value::from(kind.code()),
        });
        ops.push(PatchOp::Add { path: format!("{pointer}/{DATA_KEY}"), value });

        if self.config.stamp_timestamps {
            if let Some(ts) = self.timestamp.clone() {
                if !target_has_timestamp {
                    ops.push(PatchOp::Add {
                        path: format!("{pointer}/{META_PREFIX}{TIMESTAMP_META}"),
                        value: Value::from(ts.as_str()),
                    });
                }
                if let Some(from) = missing_from {
                    for end in from..segs.len() - 1 {
                        ops.push(PatchOp::Add {
                            path: format!(
                                "{}/{META_PREFIX}{TIMESTAMP_META}",
                                pointer_for(&segs[..=end])
                            ),
                            value: Value::from(ts.as_str()),
                        });
                    }
                }
            }
        }
        debug!(path, kind = kind.code(), "write resource");
        self.builder.apply(&ops, &mut self.interner)
    }

    /// Stamp the mutated resource's timestamp when configured and absent.
    fn stamp_after_mutation(&mut self, segs: &[&str]) -> Result<()> {
        if !self.config.stamp_timestamps {
            return Ok(());
        }
        let Some(ts) = self.timestamp.clone() else { return Ok(()) };
        let needs_stamp = {
            let reader = self.builder.reader();
            match resource_offset(&reader, segs)? {
                Some(off) => read_object(&reader, off)?
                    .value_offset(format!("{META_PREFIX}{TIMESTAMP_META}").as_bytes())?
                    .is_none(),
                None => false,
            }
        };
        if needs_stamp {
            let op = PatchOp::Add {
                path: format!(
                    "{}/{META_PREFIX}{TIMESTAMP_META}",
                    pointer_for(segs)
                ),
                value: Value::from(ts.as_str()),
            };
            self.builder.apply(&[op], &mut self.interner)?;
        }
        Ok(())
    }
}

fn walk_node<F>(
    reader: DeltaReader<'_>,
    name: String,
    off: i32,
    max_depth: usize,
    cancel: Option<&CancelFlag>,
    cb: &mut F,
) -> Result<()>
where
    F: FnMut(&Resource<'_>) -> Result<()>,
{
    if let Some(cancel) = cancel {
        cancel.check()?;
    }
    let resource = Resource::new(reader, name.clone(), off, max_depth);
    cb(&resource)?;
    let view = read_object(&reader, off)?;
    for i in 0..view.len() {
        let (child_name_off, child_off) = view.entry(i)?;
        let raw = crate::codec::reader::read_name_bytes(&reader, child_name_off)?;
        if let Some(child) = raw.strip_prefix(CHILD_PREFIX.as_bytes()) {
            let child = String::from_utf8_lossy(child).into_owned();
            let full = if name.is_empty() { child } else { format!("{name}/{child}") };
            walk_node(reader, full, child_off, max_depth, cancel, cb)?;
        }
    }
    Ok(())
}

fn rebase(op: PatchOp, prefix: &str) -> PatchOp {
    let join = |path: &str| format!("{prefix}{path}");
    match op {
        PatchOp::Add { path, value } => PatchOp::Add { path: join(&path), value },
        PatchOp::Replace { path, value } => PatchOp::Replace { path: join(&path), value },
        PatchOp::Remove { path } => PatchOp::Remove { path: join(&path) },
        PatchOp::Test { path, value } => PatchOp::Test { path: join(&path), value },
        PatchOp::Copy { from, path } => {
            PatchOp::Copy { from: join(&from), path: join(&path) }
        }
        PatchOp::Move { from, path } => {
            PatchOp::Move { from: join(&from), path: join(&path) }
        }
        PatchOp::Create { path, value } => PatchOp::Create { path: join(&path), value },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Collections {
        Collections::new().unwrap()
    }

    #[test]
    fn test_write_and_read_json() {
        let mut c = store();
        c.write_json("a/b", &serde_json::json!({"x": [1, 2]})).unwrap();
        let res = c.resource("a/b").unwrap().unwrap();
        assert_eq!(res.kind().unwrap(), Kind::Json);
        assert_eq!(res.json().unwrap().unwrap(), serde_json::json!({"x": [1, 2]}));
        // Intermediates are directories.
        let dir = c.resource("a").unwrap().unwrap();
        assert_eq!(dir.kind().unwrap(), Kind::Directory);
        assert_eq!(dir.children().unwrap(), vec!["b".to_string()]);
        assert!(c.resource("a/missing").unwrap().is_none());
    }

    #[test]
    fn test_write_blob_and_kind() {
        let mut c = store();
        c.write_blob("bin", b"\x00\x01\x02").unwrap();
        let res = c.resource("bin").unwrap().unwrap();
        assert_eq!(res.kind().unwrap(), Kind::Unstructured);
        assert_eq!(res.blob().unwrap().unwrap().as_ref(), b"\x00\x01\x02");
        assert!(res.json().is_err());
    }

    #[test]
    fn test_leaf_coercion_to_directory() {
        let mut c = store();
        c.write_json("node", &serde_json::json!(1)).unwrap();
        // Writing under a leaf coerces it into a directory.
        c.write_json("node/child", &serde_json::json!(2)).unwrap();
        let node = c.resource("node").unwrap().unwrap();
        assert_eq!(node.kind().unwrap(), Kind::Directory);
        assert!(node.json().unwrap().is_none());
        let child = c.resource("node/child").unwrap().unwrap();
        assert_eq!(child.json().unwrap().unwrap(), serde_json::json!(2));
    }

    #[test]
    fn test_leaf_write_displaces_children() {
        let mut c = store();
        c.write_json("dir/child", &serde_json::json!(1)).unwrap();
        c.write_json("dir", &serde_json::json!("now a leaf")).unwrap();
        assert!(c.resource("dir/child").unwrap().is_none());
        let res = c.resource("dir").unwrap().unwrap();
        assert_eq!(res.json().unwrap().unwrap(), serde_json::json!("now a leaf"));
    }

    #[test]
    fn test_patch_json() {
        let mut c = store();
        c.write_json("doc", &serde_json::json!({"a": {"b": 1}})).unwrap();
        c.patch_json(
            "doc",
            &serde_json::json!([
                {"op": "replace", "path": "/a/b", "value": 2},
                {"op": "add", "path": "/c", "value": true}
            ]),
        )
        .unwrap();
        let res = c.resource("doc").unwrap().unwrap();
        assert_eq!(
            res.json().unwrap().unwrap(),
            serde_json::json!({"a": {"b": 2}, "c": true})
        );
        assert!(c
            .patch_json("missing", &serde_json::json!([]))
            .is_err());
    }

    #[test]
    fn test_remove_semantics() {
        let mut c = store();
        c.write_json("dir/leaf", &serde_json::json!(1)).unwrap();
        assert!(matches!(
            c.remove("dir", false).unwrap_err(),
            crate::core::Error::Store(StoreError::DirectoryNotEmpty { .. })
        ));
        c.remove("dir/leaf", false).unwrap();
        assert!(c.resource("dir/leaf").unwrap().is_none());
        c.remove("dir", false).unwrap();

        assert!(c.remove("gone", false).is_err());
        c.remove("gone", true).unwrap();
    }

    #[test]
    fn test_write_meta() {
        let mut c = store();
        c.write_json("res", &serde_json::json!(null)).unwrap();
        assert!(c.write_meta("res", "owner", "tests").unwrap());
        assert!(!c.write_meta("missing", "owner", "tests").unwrap());
        let res = c.resource("res").unwrap().unwrap();
        assert_eq!(res.meta("owner").unwrap(), Some("tests".to_string()));
        assert_eq!(res.meta("absent").unwrap(), None);
    }

    #[test]
    fn test_walk_order() {
        let mut c = store();
        c.write_blob("a/b/c", b"one").unwrap();
        c.write_blob("a/b/d", b"two").unwrap();
        let mut seen = Vec::new();
        c.walk(|res| {
            seen.push(res.name().to_string());
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, vec!["", "a", "a/b", "a/b/c", "a/b/d"]);
        assert_eq!(
            c.resource("a/b").unwrap().unwrap().kind().unwrap(),
            Kind::Directory
        );
    }

    #[test]
    fn test_walk_cancel() {
        let mut c = store();
        c.write_json("x", &serde_json::json!(1)).unwrap();
        let flag = CancelFlag::new();
        flag.cancel();
        let mut count = 0;
        let err = c.walk_with(Some(&flag), &mut |_res| {
            count += 1;
            Ok(())
        });
        assert!(matches!(err, Err(crate::core::Error::Cancelled)));
        assert_eq!(count, 0);
    }

    #[test]
    fn test_serialize_and_reload() {
        let mut c = store();
        c.write_json("coll/doc", &serde_json::json!({"k": "v"})).unwrap();
        c.write_blob("coll/raw", b"bytes").unwrap();
        let (snap, delta, empty) = c.serialize().unwrap();
        assert!(!empty);
        let reloaded = Collections::from_readers(
            snap.as_ref(),
            snap.len(),
            Some(delta.as_slice()),
            delta.len(),
            StoreConfig::default(),
        )
        .unwrap();
        assert_eq!(
            reloaded
                .resource("coll/doc")
                .unwrap()
                .unwrap()
                .json()
                .unwrap()
                .unwrap(),
            serde_json::json!({"k": "v"})
        );
        assert_eq!(
            reloaded.resource("coll/raw").unwrap().unwrap().blob().unwrap().unwrap(),
            Bytes::from_static(b"bytes")
        );
        assert_eq!(reloaded.collections().unwrap(), vec!["coll".to_string()]);
    }

    #[test]
    fn test_config_survives_reload() {
        let mut c = store();
        c.write_json("doc", &serde_json::json!({"n": 1})).unwrap();
        let (snap, delta, _) = c.serialize().unwrap();

        let deep: serde_json::Value = serde_json::from_str(
            &format!("{}1{}", "[".repeat(10), "]".repeat(10)),
        )
        .unwrap();

        // A tight depth guard re-supplied on reload rejects deep writes.
        let tight = StoreConfig { max_depth: 4, ..StoreConfig::default() };
        let mut reloaded = Collections::from_readers(
            snap.as_ref(),
            snap.len(),
            Some(delta.as_slice()),
            delta.len(),
            tight,
        )
        .unwrap();
        let err = reloaded.write_json("deep", &deep).unwrap_err();
        assert!(err.is_corruption());
        assert!(reloaded.resource("deep").unwrap().is_none());

        // The same bytes under the default guard accept them.
        let mut relaxed = Collections::from_readers(
            snap.as_ref(),
            snap.len(),
            Some(delta.as_slice()),
            delta.len(),
            StoreConfig::default(),
        )
        .unwrap();
        relaxed.write_json("deep", &deep).unwrap();
        assert!(relaxed.resource("deep").unwrap().is_some());
    }

    #[test]
    fn test_diff_between_collections() {
        let mut a = store();
        a.write_json("doc", &serde_json::json!({"n": 1})).unwrap();
        let mut b = store();
        b.write_json("doc", &serde_json::json!({"n": 1})).unwrap();

        // Same logical content (modulo delta layering) after materialize.
        let a_snap = Collections::from_snapshot(a.materialize().unwrap());
        let b_snap = Collections::from_snapshot(b.materialize().unwrap());
        let outcome = a_snap.diff(&b_snap, None).unwrap();
        assert!(outcome.empty);

        let mut b2 = Collections::from_snapshot(b_snap.materialize().unwrap());
        b2.write_json("doc", &serde_json::json!({"n": 2})).unwrap();
        let outcome = a_snap.diff(&b2, None).unwrap();
        assert!(!outcome.empty);
    }
}
