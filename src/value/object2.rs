//! Hash-indexed objects and sets
//!
//! Insertion-order maps and sets keyed by arbitrary values, for the
//! layers above the storage core that want O(1) lookup by content hash
//! instead of sorted-array search. The index starts as a size-classed
//! scan table (2/4/8/16 slots of `(hash, slot)` pairs) and promotes to an
//! open-chained bucket map past 16 entries.

use crate::value::compact::InlineVec;
use crate::value::hash::{hash_entry, hash_set_element, hash_value};
use crate::value::Value;

enum HashIndex {
    Scan2(Box<InlineVec<(u64, u32), 2>>),
    Scan4(Box<InlineVec<(u64, u32), 4>>),
    Scan8(Box<InlineVec<(u64, u32), 8>>),
    Scan16(Box<InlineVec<(u64, u32), 16>>),
    Chained { buckets: Vec<Vec<u32>>, mask: u64 },
}

impl HashIndex {
    fn new() -> Self {
        HashIndex::Scan2(Box::new(InlineVec::new()))
    }

    fn pairs(&self) -> Option<&[(u64, u32)]> {
        match self {
            HashIndex::Scan2(v) => Some(v.as_slice()),
            HashIndex::Scan4(v) => Some(v.as_slice()),
            HashIndex::Scan8(v) => Some(v.as_slice()),
            HashIndex::Scan16(v) => Some(v.as_slice()),
            HashIndex::Chained { .. } => None,
        }
    }

    /// Candidate slots for `hash`, fed to an equality check by the caller.
    fn find(&self, hash: u64, mut eq: impl FnMut(u32) -> bool) -> Option<u32> {
        match self.pairs() {
            Some(pairs) => pairs
                .iter()
                .find(|(h, slot)| *h == hash && eq(*slot))
                .map(|(_, slot)| *slot),
            None => match self {
                HashIndex::Chained { buckets, mask } => buckets
                    [(hash & mask) as usize]
                    .iter()
                    .copied()
                    .find(|slot| eq(*slot)),
                _ => unreachable!("pairs() covered the scan classes"),
            },
        }
    }

    fn insert(&mut self, hash: u64, slot: u32) {
        loop {
            match self {
                HashIndex::Scan2(v) => {
                    if v.push((hash, slot)).is_ok() {
                        return;
                    }
                    let pairs: Vec<(u64, u32)> = v.as_slice().to_vec();
                    *self = grow(HashIndex::Scan4(Box::new(InlineVec::new())), &pairs);
                }
                HashIndex::Scan4(v) => {
                    if v.push((hash, slot)).is_ok() {
                        return;
                    }
                    let pairs: Vec<(u64, u32)> = v.as_slice().to_vec();
                    *self = grow(HashIndex::Scan8(Box::new(InlineVec::new())), &pairs);
                }
                HashIndex::Scan8(v) => {
                    if v.push((hash, slot)).is_ok() {
                        return;
                    }
                    let pairs: Vec<(u64, u32)> = v.as_slice().to_vec();
                    *self = grow(HashIndex::Scan16(Box::new(InlineVec::new())), &pairs);
                }
                HashIndex::Scan16(v) => {
                    if v.push((hash, slot)).is_ok() {
                        return;
                    }
                    let pairs: Vec<(u64, u32)> = v.as_slice().to_vec();
                    *self = chained_from(&pairs, pairs.len() + 1);
                }
                HashIndex::Chained { buckets, mask } => {
                    buckets[(hash & *mask) as usize].push(slot);
                    return;
                }
            }
        }
    }

    fn rebuild(hashes: &[u64]) -> Self {
        let pairs: Vec<(u64, u32)> =
            hashes.iter().enumerate().map(|(i, h)| (*h, i as u32)).collect();
        if pairs.len() <= 16 {
            let mut index = HashIndex::new();
            for (h, slot) in pairs {
                index.insert(h, slot);
            }
            index
        } else {
            chained_from(&pairs, pairs.len())
        }
    }
}

fn grow(mut next: HashIndex, pairs: &[(u64, u32)]) -> HashIndex {
    for (h, slot) in pairs {
        next.insert(*h, *slot);
    }
    next
}

fn chained_from(pairs: &[(u64, u32)], capacity: usize) -> HashIndex {
    let buckets_len = (capacity * 2).next_power_of_two().max(32);
    let mask = (buckets_len - 1) as u64;
    let mut buckets = vec![Vec::new(); buckets_len];
    for (h, slot) in pairs {
        buckets[(h & mask) as usize].push(*slot);
    }
    HashIndex::Chained { buckets, mask }
}

/// Insertion-order map from values to values with hash lookup.
pub struct IndexObject {
    entries: Vec<(Value, Value)>,
    hashes: Vec<u64>,
    index: HashIndex,
}

impl IndexObject {
    /// Empty map.
    pub fn new() -> Self {
        Self { entries: Vec::new(), hashes: Vec::new(), index: HashIndex::new() }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn slot_of(&self, key: &Value, hash: u64) -> Option<usize> {
        self.index
            .find(hash, |slot| self.entries[slot as usize].0 == *key)
            .map(|s| s as usize)
    }

    /// Value stored under `key`.
    pub fn get(&self, key: &Value) -> Option<&Value> {
        let slot = self.slot_of(key, hash_value(key))?;
        Some(&self.entries[slot].1)
    }

    /// Whether `key` is present.
    pub fn contains_key(&self, key: &Value) -> bool {
        self.slot_of(key, hash_value(key)).is_some()
    }

    /// Insert or replace, returning any previous value. Replacement keeps
    /// the key's original insertion position.
    pub fn insert(&mut self, key: Value, value: Value) -> Option<Value> {
        let hash = hash_value(&key);
        if let Some(slot) = self.slot_of(&key, hash) {
            return Some(std::mem::replace(&mut self.entries[slot].1, value));
        }
        let slot = self.entries.len() as u32;
        self.entries.push((key, value));
        self.hashes.push(hash);
        self.index.insert(hash, slot);
        None
    }

    /// Remove an entry, returning its value. Later entries keep their
    /// relative order.
    pub fn remove(&mut self, key: &Value) -> Option<Value> {
        let slot = self.slot_of(key, hash_value(key))?;
        let (_, value) = self.entries.remove(slot);
        self.hashes.remove(slot);
        self.index = HashIndex::rebuild(&self.hashes);
        Some(value)
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    /// Order-independent canonical hash of the map's contents.
    pub fn hash(&self) -> u64 {
        let mut sum = 0u64;
        for ((k, v), _) in self.entries.iter().zip(&self.hashes) {
            sum = sum.wrapping_add(hash_entry(hash_value(k), hash_value(v)));
        }
        sum
    }
}

impl Default for IndexObject {
    fn default() -> Self {
        Self::new()
    }
}

/// Insertion-order set of unique values with hash lookup.
pub struct ValueSet {
    items: Vec<Value>,
    hashes: Vec<u64>,
    index: HashIndex,
}

impl ValueSet {
    /// Empty set.
    pub fn new() -> Self {
        Self { items: Vec::new(), hashes: Vec::new(), index: HashIndex::new() }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn slot_of(&self, value: &Value, hash: u64) -> Option<usize> {
        self.index
            .find(hash, |slot| self.items[slot as usize] == *value)
            .map(|s| s as usize)
    }

    /// Whether `value` is present.
    pub fn contains(&self, value: &Value) -> bool {
        self.slot_of(value, hash_value(value)).is_some()
    }

    /// Add a value; returns whether it was newly inserted.
    pub fn insert(&mut self, value: Value) -> bool {
        let hash = hash_value(&value);
        if self.slot_of(&value, hash).is_some() {
            return false;
        }
        let slot = self.items.len() as u32;
        self.items.push(value);
        self.hashes.push(hash);
        self.index.insert(hash, slot);
        true
    }

    /// Remove a value; returns whether it was present.
    pub fn remove(&mut self, value: &Value) -> bool {
        match self.slot_of(value, hash_value(value)) {
            Some(slot) => {
                self.items.remove(slot);
                self.hashes.remove(slot);
                self.index = HashIndex::rebuild(&self.hashes);
                true
            }
            None => false,
        }
    }

    /// Iterate elements in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.items.iter()
    }

    /// Order-independent canonical hash of the set's contents.
    pub fn hash(&self) -> u64 {
        self.hashes
            .iter()
            .fold(0u64, |sum, h| sum.wrapping_add(hash_set_element(*h)))
    }
}

impl Default for ValueSet {
    fn default() -> Self {
        Self::new()
    }
}
