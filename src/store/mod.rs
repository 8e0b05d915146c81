//! Collections namespace
//!
//! A hierarchical tree of named resources mapped onto the value engine.
//! Every resource is an object whose keys are `kind` (resource type),
//! `data` (leaf payload), `data:<name>` (directory children), and
//! `meta:<key>` (free-form string metadata).

pub mod collections;
pub mod resource;
pub mod writable;

pub use collections::Collections;
pub use resource::{Kind, Resource};
pub use writable::WritableCollections;

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::core::{Result, StoreError};

/// Key of a leaf resource's payload.
pub(crate) const DATA_KEY: &str = "data";
/// Key of a resource's type marker.
pub(crate) const KIND_KEY: &str = "kind";
/// Prefix of directory child keys.
pub(crate) const CHILD_PREFIX: &str = "data:";
/// Prefix of metadata keys.
pub(crate) const META_PREFIX: &str = "meta:";
/// Metadata key stamped by timestamp propagation.
pub(crate) const TIMESTAMP_META: &str = "timestamp";

/// Split a `/`-separated resource path into segments.
///
/// The empty path names the root; empty segments are rejected.
pub(crate) fn split_path(path: &str) -> Result<Vec<&str>> {
    if path.is_empty() {
        return Ok(Vec::new());
    }
    let segs: Vec<&str> = path.split('/').collect();
    if segs.iter().any(|s| s.is_empty()) {
        return Err(StoreError::InvalidPath { path: path.to_string() }.into());
    }
    Ok(segs)
}

/// Atomically published store handle.
///
/// A writer prepares a fresh [`Collections`] and swaps it in; readers
/// load the current one without locking. This is the only cross-thread
/// hand-off the engine performs.
pub struct SharedStore {
    current: ArcSwap<Collections>,
}

impl SharedStore {
    /// Publish an initial collections.
    pub fn new(collections: Collections) -> Self {
        Self { current: ArcSwap::from_pointee(collections) }
    }

    /// The currently published collections.
    pub fn load(&self) -> Arc<Collections> {
        self.current.load_full()
    }

    /// Publish a replacement, returning the previous one.
    pub fn swap(&self, collections: Collections) -> Arc<Collections> {
        self.current.swap(Arc::new(collections))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_path() {
        assert!(split_path("").unwrap().is_empty());
        assert_eq!(split_path("a").unwrap(), vec!["a"]);
        assert_eq!(split_path("a/b/c").unwrap(), vec!["a", "b", "c"]);
        assert!(split_path("/a").is_err());
        assert!(split_path("a//b").is_err());
        assert!(split_path("a/").is_err());
    }

    #[test]
    fn test_shared_store_swap() {
        let store = SharedStore::new(Collections::new().unwrap());
        let first = store.load();
        assert!(first.collections().unwrap().is_empty());

        let mut writable = WritableCollections::new();
        writable.write_directory("fresh").unwrap();
        let old = store.swap(writable.prepare("t0").unwrap());
        assert!(old.collections().unwrap().is_empty());
        assert_eq!(store.load().collections().unwrap(), vec!["fresh".to_string()]);
    }
}
