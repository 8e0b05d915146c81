//! Mutable in-memory collections builder
//!
//! A writable collections is a plain value tree with no shared buffer
//! references: cloning one out of a prepared collections and preparing a
//! new snapshot from it are both full-fidelity. `prepare` freezes the
//! current tree; later writes to the writable never reach the prepared
//! snapshot.

use tracing::debug;

use crate::codec::ContentReader;
use crate::core::{Result, StoreConfig, StoreError};
use crate::snapshot::serialize_value_with_depth;
use crate::store::collections::Collections;
use crate::store::resource::Kind;
use crate::store::{
    split_path, CHILD_PREFIX, DATA_KEY, KIND_KEY, META_PREFIX, TIMESTAMP_META,
};
use crate::value::{KeyInterner, ObjectValue, Value};

/// Mutable builder for a collections tree.
pub struct WritableCollections {
    root: ObjectValue,
    interner: KeyInterner,
    config: StoreConfig,
}

impl WritableCollections {
    /// Empty tree.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Empty tree under the given configuration.
    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            root: ObjectValue::new(),
            interner: KeyInterner::new(),
            config,
        }
    }

    /// Clone the state behind a reader into a fresh mutable mirror.
    pub fn from_reader<R: ContentReader + ?Sized>(
        reader: &R,
        config: StoreConfig,
    ) -> Result<Self> {
        let mut interner = KeyInterner::new();
        let root =
            match Value::decode_with_depth(reader, reader.root(), &mut interner, config.max_depth)?
            {
                Value::Object(obj) => obj,
                // A root degraded to a scalar starts over as an empty tree.
                _ => ObjectValue::new(),
            };
        Ok(Self { root, interner, config })
    }

    /// Write a JSON payload, materializing intermediate directories.
    pub fn write_json(&mut self, path: &str, json: &serde_json::Value) -> Result<()> {
        let value = Value::from_json(json, &mut self.interner);
        self.write_leaf(path, Kind::Json, value)
    }

    /// Write an engine value as a JSON resource.
    pub fn write_value(&mut self, path: &str, value: Value) -> Result<()> {
        self.write_leaf(path, Kind::Json, value)
    }

    /// Write an unstructured byte payload.
    pub fn write_blob(&mut self, path: &str, bytes: &[u8]) -> Result<()> {
        self.write_leaf(path, Kind::Unstructured, Value::from(bytes.to_vec()))
    }

    /// Ensure a directory exists, coercing any leaf in the way.
    pub fn write_directory(&mut self, path: &str) -> Result<()> {
        let segs = split_path(path)?;
        let Self { root, interner, .. } = self;
        let node = descend_create(root, &segs, interner);
        node.remove(KIND_KEY, interner);
        node.remove(DATA_KEY, interner);
        Ok(())
    }

    /// Set a metadata key; returns whether the resource existed.
    pub fn write_meta(&mut self, path: &str, key: &str, value: &str) -> Result<bool> {
        let segs = split_path(path)?;
        let Self { root, interner, .. } = self;
        match descend_existing(root, &segs) {
            None => Ok(false),
            Some(node) => {
                node.insert(
                    format!("{META_PREFIX}{key}").into(),
                    Value::from(value),
                    interner,
                );
                Ok(true)
            }
        }
    }

    /// Remove a resource. Directories must be empty; missing paths
    /// succeed only when `missing_ok` is set.
    pub fn remove(&mut self, path: &str, missing_ok: bool) -> Result<()> {
        let segs = split_path(path)?;
        if segs.is_empty() {
            return Err(StoreError::InvalidPath { path: path.to_string() }.into());
        }
        let Self { root, interner, .. } = self;
        let missing = || -> Result<()> {
            if missing_ok {
                Ok(())
            } else {
                Err(StoreError::NotFound { path: path.to_string() }.into())
            }
        };
        let Some(parent) = descend_existing(root, &segs[..segs.len() - 1]) else {
            return missing();
        };
        let key = format!("{}{}", CHILD_PREFIX, segs[segs.len() - 1]);
        let occupied = match parent.get(&key) {
            None => return missing(),
            Some(Value::Object(child)) => {
                child.keys().iter().any(|k| k.starts_with(CHILD_PREFIX))
            }
            Some(_) => false,
        };
        if occupied {
            return Err(StoreError::DirectoryNotEmpty { path: path.to_string() }.into());
        }
        parent.remove(&key, interner);
        Ok(())
    }

    /// The node object of a resource, if present.
    pub fn resource_value(&self, path: &str) -> Result<Option<&ObjectValue>> {
        let segs = split_path(path)?;
        let mut cur = &self.root;
        for seg in &segs {
            let key = format!("{CHILD_PREFIX}{seg}");
            match cur.get(&key) {
                Some(Value::Object(child)) => cur = child,
                _ => return Ok(None),
            }
        }
        Ok(Some(cur))
    }

    /// Freeze the current tree into an immutable collections.
    ///
    /// Timestamp metadata propagates depth-first, never overwriting an
    /// existing value. The writable remains usable; later writes do not
    /// affect the prepared snapshot.
    pub fn prepare(&mut self, timestamp: &str) -> Result<Collections> {
        let mut root = self.root.clone();
        if self.config.stamp_timestamps {
            stamp_tree(&mut root, timestamp, &mut self.interner);
        }
        let snapshot =
            serialize_value_with_depth(&Value::Object(root), self.config.max_depth)?;
        debug!(bytes = snapshot.bytes().len(), "prepared snapshot");
        Ok(Collections::with_snapshot(
            snapshot,
            self.config.clone(),
            Some(timestamp.to_string()),
        ))
    }

    /// [`prepare`](Self::prepare) stamped with the current UTC time.
    pub fn prepare_now(&mut self) -> Result<Collections> {
        let now = chrono::Utc::now().to_rfc3339();
        self.prepare(&now)
    }

    fn write_leaf(&mut self, path: &str, kind: Kind, value: Value) -> Result<()> {
        let segs = split_path(path)?;
        if segs.is_empty() {
            return Err(StoreError::InvalidPath { path: path.to_string() }.into());
        }
        let Self { root, interner, .. } = self;
        let node = descend_create(root, &segs, interner);
        // A leaf holds no children: displace any the target carried.
        let stale: Vec<_> = node
            .keys()
            .into_iter()
            .filter(|k| k.starts_with(CHILD_PREFIX))
            .collect();
        for key in stale {
            node.remove(&key, interner);
        }
        node.insert(KIND_KEY.into(), Value::from(kind.code()), interner);
        node.insert(DATA_KEY.into(), value, interner);
        Ok(())
    }
}

impl Default for WritableCollections {
    fn default() -> Self {
        Self::new()
    }
}

/// Walk to the node for `segs`, materializing missing directories and
/// coercing leaf ancestors on the way down.
fn descend_create<'a>(
    root: &'a mut ObjectValue,
    segs: &[&str],
    interner: &mut KeyInterner,
) -> &'a mut ObjectValue {
    let mut cur = root;
    for seg in segs {
        let key = format!("{CHILD_PREFIX}{seg}");
        // An ancestor on a write path is a directory by definition.
        cur.remove(KIND_KEY, interner);
        cur.remove(DATA_KEY, interner);
        if !cur.contains_key(&key) {
            cur.insert(key.as_str().into(), Value::empty_object(), interner);
        }
        let child = cur.get_mut(&key).expect("present or just created");
        if !matches!(child, Value::Object(_)) {
            *child = Value::empty_object();
        }
        cur = match child {
            Value::Object(obj) => obj,
            _ => unreachable!("coerced to object above"),
        };
    }
    cur
}

/// Walk to the node for `segs` without creating anything.
fn descend_existing<'a>(
    root: &'a mut ObjectValue,
    segs: &[&str],
) -> Option<&'a mut ObjectValue> {
    let mut cur = root;
    for seg in segs {
        let key = format!("{CHILD_PREFIX}{seg}");
        let child = cur.get_mut(&key)?;
        cur = match child {
            Value::Object(obj) => obj,
            _ => return None,
        };
    }
    Some(cur)
}

/// Stamp `timestamp` metadata depth-first, keeping existing values.
fn stamp_tree(node: &mut ObjectValue, timestamp: &str, interner: &mut KeyInterner) {
    let key = format!("{META_PREFIX}{TIMESTAMP_META}");
    if !node.contains_key(&key) {
        node.insert(key.as_str().into(), Value::from(timestamp), interner);
    }
    let children: Vec<_> = node
        .keys()
        .into_iter()
        .filter(|k| k.starts_with(CHILD_PREFIX))
        .collect();
    for child_key in children {
        if let Some(Value::Object(child)) = node.get_mut(&child_key) {
            stamp_tree(child, timestamp, interner);
        }
    }
}
