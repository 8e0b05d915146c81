//! In-memory objects with interned key shapes
//!
//! Objects keep their members sorted by key. Up to 32 members they use a
//! compact representation whose key set (the "shape") is shared through an
//! interning table, so the many repeated shapes a document carries
//! allocate their key arrays once. Past 32 members an object spills to a
//! general sorted vector.

use std::sync::Arc;

use ahash::AHashMap;

use crate::value::compact::{Classes, COMPACT_MAX};
use crate::value::Value;

/// An interned, sorted key set shared between same-shaped objects.
pub type KeyShape = Arc<[Arc<str>]>;

/// Interning table for object key shapes.
///
/// Owned by a writer (one per collections instance); never shared across
/// threads.
#[derive(Default)]
pub struct KeyInterner {
    shapes: AHashMap<Vec<Arc<str>>, KeyShape>,
}

impl KeyInterner {
    /// Fresh, empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a sorted key list, reusing an existing shape when one
    /// matches.
    pub fn intern(&mut self, keys: Vec<Arc<str>>) -> KeyShape {
        debug_assert!(keys.windows(2).all(|w| w[0] < w[1]));
        if let Some(shape) = self.shapes.get(&keys) {
            return shape.clone();
        }
        let shape: KeyShape = keys.clone().into();
        self.shapes.insert(keys, shape.clone());
        shape
    }

    /// Number of distinct shapes seen.
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    /// Whether no shapes have been interned.
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }
}

/// In-memory object representation.
#[derive(Clone, Debug)]
pub enum ObjectValue {
    /// Up to 32 members: interned shape + value class of equal length
    Compact {
        /// Interned sorted key set
        shape: KeyShape,
        /// Member values, positionally matching the shape
        values: Classes<Value>,
    },
    /// General form: sorted `(key, value)` pairs
    Heap(Vec<(Arc<str>, Value)>),
}

impl ObjectValue {
    /// Empty object.
    pub fn new() -> Self {
        ObjectValue::Heap(Vec::new())
    }

    /// Build from sorted, deduplicated pairs.
    pub fn from_sorted_pairs(
        pairs: Vec<(Arc<str>, Value)>,
        interner: &mut KeyInterner,
    ) -> Self {
        debug_assert!(pairs.windows(2).all(|w| w[0].0 < w[1].0));
        if pairs.is_empty() || pairs.len() > COMPACT_MAX {
            return ObjectValue::Heap(pairs);
        }
        let mut keys = Vec::with_capacity(pairs.len());
        let mut values = Vec::with_capacity(pairs.len());
        for (k, v) in pairs {
            keys.push(k);
            values.push(v);
        }
        ObjectValue::Compact {
            shape: interner.intern(keys),
            values: Classes::from_vec(values).expect("len checked"),
        }
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        match self {
            ObjectValue::Compact { shape, .. } => shape.len(),
            ObjectValue::Heap(pairs) => pairs.len(),
        }
    }

    /// Whether the object has no members.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn position(&self, key: &str) -> Result<usize, usize> {
        match self {
            ObjectValue::Compact { shape, .. } => {
                shape.binary_search_by(|k| k.as_ref().cmp(key))
            }
            ObjectValue::Heap(pairs) => {
                pairs.binary_search_by(|(k, _)| k.as_ref().cmp(key))
            }
        }
    }

    /// Member value by key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        let i = self.position(key).ok()?;
        match self {
            ObjectValue::Compact { values, .. } => values.as_slice().get(i),
            ObjectValue::Heap(pairs) => pairs.get(i).map(|(_, v)| v),
        }
    }

    /// Mutable member value by key.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        let i = self.position(key).ok()?;
        match self {
            ObjectValue::Compact { values, .. } => values.as_mut_slice().get_mut(i),
            ObjectValue::Heap(pairs) => pairs.get_mut(i).map(|(_, v)| v),
        }
    }

    /// Whether a member with `key` exists.
    pub fn contains_key(&self, key: &str) -> bool {
        self.position(key).is_ok()
    }

    /// The sorted keys.
    pub fn keys(&self) -> Vec<Arc<str>> {
        match self {
            ObjectValue::Compact { shape, .. } => shape.to_vec(),
            ObjectValue::Heap(pairs) => pairs.iter().map(|(k, _)| k.clone()).collect(),
        }
    }

    /// Key and value of member `i`, in sorted order.
    pub fn entry(&self, i: usize) -> Option<(&Arc<str>, &Value)> {
        match self {
            ObjectValue::Compact { shape, values } => {
                Some((shape.get(i)?, values.as_slice().get(i)?))
            }
            ObjectValue::Heap(pairs) => pairs.get(i).map(|(k, v)| (k, v)),
        }
    }

    /// Iterate members in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&Arc<str>, &Value)> {
        (0..self.len()).map(move |i| self.entry(i).expect("index in range"))
    }

    /// Insert or replace a member, returning any previous value.
    ///
    /// A new key re-interns the widened shape; at 33 members the object
    /// spills to the heap form.
    pub fn insert(
        &mut self,
        key: Arc<str>,
        value: Value,
        interner: &mut KeyInterner,
    ) -> Option<Value> {
        match self.position(&key) {
            Ok(i) => match self {
                ObjectValue::Compact { values, .. } => {
                    Some(std::mem::replace(&mut values.as_mut_slice()[i], value))
                }
                ObjectValue::Heap(pairs) => {
                    Some(std::mem::replace(&mut pairs[i].1, value))
                }
            },
            Err(i) => {
                let taken = std::mem::replace(self, ObjectValue::Heap(Vec::new()));
                *self = match taken {
                    ObjectValue::Compact { shape, values } => {
                        let mut keys = shape.to_vec();
                        let mut vals = values.into_vec();
                        keys.insert(i, key);
                        vals.insert(i, value);
                        if keys.len() <= COMPACT_MAX {
                            ObjectValue::Compact {
                                shape: interner.intern(keys),
                                values: Classes::from_vec(vals).expect("len checked"),
                            }
                        } else {
                            ObjectValue::Heap(
                                keys.into_iter().zip(vals).collect(),
                            )
                        }
                    }
                    ObjectValue::Heap(mut pairs) => {
                        pairs.insert(i, (key, value));
                        pairs_to_compact(pairs, interner)
                    }
                };
                None
            }
        }
    }

    /// Remove a member, returning its value.
    pub fn remove(&mut self, key: &str, interner: &mut KeyInterner) -> Option<Value> {
        let i = self.position(key).ok()?;
        let taken = std::mem::replace(self, ObjectValue::Heap(Vec::new()));
        let (out, next) = match taken {
            ObjectValue::Compact { shape, mut values } => {
                let mut keys = shape.to_vec();
                keys.remove(i);
                let val = values.remove(i);
                let vals = values.into_vec();
                let next = if keys.is_empty() {
                    ObjectValue::Heap(Vec::new())
                } else {
                    ObjectValue::Compact {
                        shape: interner.intern(keys),
                        values: Classes::from_vec(vals).expect("shrunk"),
                    }
                };
                (val, next)
            }
            ObjectValue::Heap(mut pairs) => {
                let (_, val) = pairs.remove(i);
                (val, pairs_to_compact(pairs, interner))
            }
        };
        *self = next;
        Some(out)
    }
}

impl Default for ObjectValue {
    fn default() -> Self {
        Self::new()
    }
}

fn pairs_to_compact(pairs: Vec<(Arc<str>, Value)>, interner: &mut KeyInterner) -> ObjectValue {
    if pairs.is_empty() || pairs.len() > COMPACT_MAX {
        return ObjectValue::Heap(pairs);
    }
    ObjectValue::from_sorted_pairs(pairs, interner)
}
