//! Size-specialized inline containers
//!
//! The engine sees many small, homogeneous arrays and objects. Containers
//! up to 32 elements live in fixed-capacity inline buffers, one class per
//! capacity, so an allocation is exactly as large as its class. Arrays of
//! only strings use a string-specialized class that skips per-element type
//! dispatch on the hot paths (hashing, comparison, serialization). At 33
//! elements a container promotes to the general heap form.

use std::mem::MaybeUninit;
use std::sync::Arc;

use crate::value::Value;

/// Largest inline capacity; one past this promotes to the heap form.
pub const COMPACT_MAX: usize = 32;

/// Fixed-capacity inline vector. Storage is a single allocation of exactly
/// `N` slots when boxed by its size class.
pub struct InlineVec<T, const N: usize> {
    len: usize,
    slots: [MaybeUninit<T>; N],
}

impl<T, const N: usize> InlineVec<T, N> {
    /// Capacity of this class.
    pub const CAPACITY: usize = N;

    /// Empty vector.
    pub fn new() -> Self {
        Self {
            len: 0,
            // An array of MaybeUninit needs no initialization.
            slots: unsafe { MaybeUninit::uninit().assume_init() },
        }
    }

    /// Number of initialized elements.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the vector is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Borrow the initialized prefix.
    pub fn as_slice(&self) -> &[T] {
        unsafe { std::slice::from_raw_parts(self.slots.as_ptr() as *const T, self.len) }
    }

    /// Mutably borrow the initialized prefix.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        unsafe { std::slice::from_raw_parts_mut(self.slots.as_mut_ptr() as *mut T, self.len) }
    }

    /// Append, handing the value back when the class is full.
    pub fn push(&mut self, val: T) -> Result<(), T> {
        if self.len == N {
            return Err(val);
        }
        self.slots[self.len].write(val);
        self.len += 1;
        Ok(())
    }

    /// Insert at `i`, handing the value back when the class is full.
    pub fn insert(&mut self, i: usize, val: T) -> Result<(), T> {
        assert!(i <= self.len);
        if self.len == N {
            return Err(val);
        }
        unsafe {
            let base = self.slots.as_mut_ptr();
            std::ptr::copy(base.add(i), base.add(i + 1), self.len - i);
        }
        self.slots[i].write(val);
        self.len += 1;
        Ok(())
    }

    /// Remove and return the element at `i`.
    pub fn remove(&mut self, i: usize) -> T {
        assert!(i < self.len);
        unsafe {
            let base = self.slots.as_mut_ptr();
            let val = base.add(i).read().assume_init();
            std::ptr::copy(base.add(i + 1), base.add(i), self.len - i - 1);
            self.len -= 1;
            val
        }
    }

    /// Move all elements out into a `Vec`.
    pub fn into_vec(mut self) -> Vec<T> {
        let len = self.len;
        self.len = 0; // moved-out slots must not drop again
        let mut out = Vec::with_capacity(len);
        for i in 0..len {
            out.push(unsafe { self.slots[i].assume_init_read() });
        }
        out
    }
}

impl<T, const N: usize> Default for InlineVec<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> Drop for InlineVec<T, N> {
    fn drop(&mut self) {
        unsafe { std::ptr::drop_in_place(self.as_mut_slice()) }
    }
}

impl<T: Clone, const N: usize> Clone for InlineVec<T, N> {
    fn clone(&self) -> Self {
        let mut out = Self::new();
        for item in self.as_slice() {
            let _ = out.push(item.clone());
        }
        out
    }
}

impl<T: std::fmt::Debug, const N: usize> std::fmt::Debug for InlineVec<T, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.as_slice().fmt(f)
    }
}

macro_rules! inline_classes {
    ($( $variant:ident => $cap:literal ),+ $(,)?) => {
        /// Tagged union over the inline capacity classes. Each variant
        /// boxes its class so the allocation matches the class size.
        #[derive(Clone, Debug)]
        pub enum Classes<T> {
            $(
                #[doc = "Inline class"]
                $variant(Box<InlineVec<T, $cap>>),
            )+
        }

        impl<T> Classes<T> {
            /// Smallest class that holds `cap` elements, `None` past 32.
            pub fn for_capacity(cap: usize) -> Option<Self> {
                $(
                    if cap <= $cap {
                        return Some(Self::$variant(Box::new(InlineVec::new())));
                    }
                )+
                None
            }

            /// Capacity of the active class.
            pub fn capacity(&self) -> usize {
                match self { $( Self::$variant(_) => $cap, )+ }
            }

            /// Number of elements.
            pub fn len(&self) -> usize {
                match self { $( Self::$variant(v) => v.len(), )+ }
            }

            /// Whether there are no elements.
            pub fn is_empty(&self) -> bool {
                self.len() == 0
            }

            /// Borrow the elements.
            pub fn as_slice(&self) -> &[T] {
                match self { $( Self::$variant(v) => v.as_slice(), )+ }
            }

            /// Mutably borrow the elements.
            pub fn as_mut_slice(&mut self) -> &mut [T] {
                match self { $( Self::$variant(v) => v.as_mut_slice(), )+ }
            }

            /// Append within the class, handing the value back when full.
            pub fn push(&mut self, val: T) -> Result<(), T> {
                match self { $( Self::$variant(v) => v.push(val), )+ }
            }

            /// Insert within the class, handing the value back when full.
            pub fn insert(&mut self, i: usize, val: T) -> Result<(), T> {
                match self { $( Self::$variant(v) => v.insert(i, val), )+ }
            }

            /// Remove and return the element at `i`.
            pub fn remove(&mut self, i: usize) -> T {
                match self { $( Self::$variant(v) => v.remove(i), )+ }
            }

            /// Move the elements out into a `Vec`.
            pub fn into_vec(self) -> Vec<T> {
                match self { $( Self::$variant(v) => v.into_vec(), )+ }
            }

            /// Build the smallest fitting class, or give the vec back when
            /// it exceeds the largest inline capacity.
            pub fn from_vec(vec: Vec<T>) -> Result<Self, Vec<T>> {
                let mut class = match Self::for_capacity(vec.len()) {
                    Some(c) => c,
                    None => return Err(vec),
                };
                for item in vec {
                    let _ = class.push(item);
                }
                Ok(class)
            }
        }
    };
}

inline_classes!(
    C1 => 1, C2 => 2, C3 => 3, C4 => 4, C5 => 5, C6 => 6, C7 => 7, C8 => 8,
    C9 => 9, C10 => 10, C11 => 11, C12 => 12, C13 => 13, C14 => 14,
    C15 => 15, C16 => 16, C17 => 17, C18 => 18, C19 => 19, C20 => 20,
    C21 => 21, C22 => 22, C23 => 23, C24 => 24, C25 => 25, C26 => 26,
    C27 => 27, C28 => 28, C29 => 29, C30 => 30, C31 => 31, C32 => 32,
);

/// In-memory array representation.
///
/// `Strings` is the string-specialized inline form, `Values` the general
/// inline form, `Heap` the spill past 32 elements.
#[derive(Clone, Debug)]
pub enum ArrayValue {
    /// Inline array of strings only
    Strings(Classes<Arc<str>>),
    /// Inline array of mixed values
    Values(Classes<Value>),
    /// General heap array
    Heap(Vec<Value>),
}

impl ArrayValue {
    /// Empty array (smallest inline class).
    pub fn new() -> Self {
        ArrayValue::Values(Classes::for_capacity(0).expect("class 1 exists"))
    }

    /// Build from a vector, picking the best representation.
    pub fn from_vec(vec: Vec<Value>) -> Self {
        if vec.len() <= COMPACT_MAX && !vec.is_empty() {
            if vec.iter().all(|v| matches!(v, Value::String(_))) {
                let strings: Vec<Arc<str>> = vec
                    .into_iter()
                    .map(|v| match v {
                        Value::String(s) => s,
                        _ => unreachable!("checked all-string"),
                    })
                    .collect();
                return ArrayValue::Strings(
                    Classes::from_vec(strings).expect("len checked"),
                );
            }
            return ArrayValue::Values(Classes::from_vec(vec).expect("len checked"));
        }
        if vec.len() <= COMPACT_MAX {
            return ArrayValue::Values(Classes::from_vec(vec).expect("len checked"));
        }
        ArrayValue::Heap(vec)
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        match self {
            ArrayValue::Strings(c) => c.len(),
            ArrayValue::Values(c) => c.len(),
            ArrayValue::Heap(v) => v.len(),
        }
    }

    /// Whether the array is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element `i`, cloned out of whichever representation holds it.
    pub fn get(&self, i: usize) -> Option<Value> {
        match self {
            ArrayValue::Strings(c) => c.as_slice().get(i).map(|s| Value::String(s.clone())),
            ArrayValue::Values(c) => c.as_slice().get(i).cloned(),
            ArrayValue::Heap(v) => v.get(i).cloned(),
        }
    }

    /// Mutable element access. The string-specialized class has no
    /// in-place `Value` slots; callers mutate it through `set`.
    pub fn get_mut(&mut self, i: usize) -> Option<&mut Value> {
        match self {
            ArrayValue::Strings(_) => None,
            ArrayValue::Values(c) => c.as_mut_slice().get_mut(i),
            ArrayValue::Heap(v) => v.get_mut(i),
        }
    }

    /// The string-only fast path, when active.
    pub fn as_strings(&self) -> Option<&[Arc<str>]> {
        match self {
            ArrayValue::Strings(c) => Some(c.as_slice()),
            _ => None,
        }
    }

    /// The general element slice, when not string-specialized.
    pub fn as_values(&self) -> Option<&[Value]> {
        match self {
            ArrayValue::Values(c) => Some(c.as_slice()),
            ArrayValue::Heap(v) => Some(v.as_slice()),
            ArrayValue::Strings(_) => None,
        }
    }

    /// Iterate elements by value.
    pub fn iter(&self) -> ArrayIter<'_> {
        match self {
            ArrayValue::Strings(c) => ArrayIter::Strings(c.as_slice().iter()),
            ArrayValue::Values(c) => ArrayIter::Values(c.as_slice().iter()),
            ArrayValue::Heap(v) => ArrayIter::Values(v.iter()),
        }
    }

    /// Append an element, promoting representation as needed.
    pub fn push(&mut self, val: Value) {
        let len = self.len();
        self.splice(len, val);
    }

    /// Insert an element at `i`, promoting representation as needed.
    pub fn insert(&mut self, i: usize, val: Value) {
        self.splice(i, val);
    }

    /// Replace the element at `i`, returning the old value.
    pub fn set(&mut self, i: usize, val: Value) -> Option<Value> {
        if i >= self.len() {
            return None;
        }
        let old = self.remove(i);
        self.splice(i, val);
        old
    }

    /// Remove and return the element at `i`.
    pub fn remove(&mut self, i: usize) -> Option<Value> {
        if i >= self.len() {
            return None;
        }
        match self {
            ArrayValue::Strings(c) => Some(Value::String(c.remove(i))),
            ArrayValue::Values(c) => Some(c.remove(i)),
            ArrayValue::Heap(v) => Some(v.remove(i)),
        }
    }

    /// Move the elements out into a general vector.
    pub fn into_vec(self) -> Vec<Value> {
        match self {
            ArrayValue::Strings(c) => {
                c.into_vec().into_iter().map(Value::String).collect()
            }
            ArrayValue::Values(c) => c.into_vec(),
            ArrayValue::Heap(v) => v,
        }
    }

    fn splice(&mut self, i: usize, val: Value) {
        // String class keeps strings; anything else generalizes first.
        let taken = std::mem::replace(self, ArrayValue::Heap(Vec::new()));
        *self = match (taken, val) {
            (ArrayValue::Strings(mut c), Value::String(s)) => match c.insert(i, s) {
                Ok(()) => ArrayValue::Strings(c),
                Err(s) => {
                    let mut vec: Vec<Value> =
                        c.into_vec().into_iter().map(Value::String).collect();
                    vec.insert(i, Value::String(s));
                    ArrayValue::from_vec(vec)
                }
            },
            (ArrayValue::Strings(c), val) => {
                let mut vec: Vec<Value> =
                    c.into_vec().into_iter().map(Value::String).collect();
                vec.insert(i, val);
                ArrayValue::from_vec(vec)
            }
            (ArrayValue::Values(mut c), val) => match c.insert(i, val) {
                Ok(()) => ArrayValue::Values(c),
                Err(val) => {
                    let mut vec = c.into_vec();
                    vec.insert(i, val);
                    ArrayValue::from_vec(vec)
                }
            },
            (ArrayValue::Heap(mut v), val) => {
                v.insert(i, val);
                ArrayValue::Heap(v)
            }
        };
    }
}

impl Default for ArrayValue {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloning iterator over array elements.
pub enum ArrayIter<'a> {
    /// Over the string-specialized class
    Strings(std::slice::Iter<'a, Arc<str>>),
    /// Over general values
    Values(std::slice::Iter<'a, Value>),
}

impl<'a> Iterator for ArrayIter<'a> {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        match self {
            ArrayIter::Strings(it) => it.next().map(|s| Value::String(s.clone())),
            ArrayIter::Values(it) => it.next().cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_vec_push_and_drop() {
        let mut v: InlineVec<String, 4> = InlineVec::new();
        assert!(v.push("a".into()).is_ok());
        assert!(v.push("b".into()).is_ok());
        assert_eq!(v.as_slice(), &["a".to_string(), "b".to_string()]);
        assert_eq!(v.remove(0), "a");
        assert_eq!(v.len(), 1);
    }

    #[test]
    fn test_inline_vec_full() {
        let mut v: InlineVec<u32, 2> = InlineVec::new();
        assert!(v.push(1).is_ok());
        assert!(v.push(2).is_ok());
        assert_eq!(v.push(3), Err(3));
        assert_eq!(v.into_vec(), vec![1, 2]);
    }

    #[test]
    fn test_classes_pick_smallest() {
        let c: Classes<u32> = Classes::for_capacity(5).unwrap();
        assert_eq!(c.capacity(), 5);
        let c: Classes<u32> = Classes::for_capacity(32).unwrap();
        assert_eq!(c.capacity(), 32);
        assert!(Classes::<u32>::for_capacity(33).is_none());
    }

    #[test]
    fn test_string_specialization() {
        let arr = ArrayValue::from_vec(vec![
            Value::String("a".into()),
            Value::String("b".into()),
        ]);
        assert!(arr.as_strings().is_some());
        assert_eq!(arr.get(1), Some(Value::String("b".into())));
    }

    #[test]
    fn test_string_class_generalizes_on_mixed_push() {
        let mut arr = ArrayValue::from_vec(vec![Value::String("a".into())]);
        assert!(arr.as_strings().is_some());
        arr.push(Value::Null);
        assert!(arr.as_strings().is_none());
        assert_eq!(arr.len(), 2);
        assert_eq!(arr.get(1), Some(Value::Null));
    }

    #[test]
    fn test_promotion_at_thirty_three() {
        let mut arr = ArrayValue::from_vec(
            (0..32).map(|i| Value::from(i as i64)).collect(),
        );
        assert!(matches!(arr, ArrayValue::Values(_)));
        arr.push(Value::from(32i64));
        assert!(matches!(arr, ArrayValue::Heap(_)));
        assert_eq!(arr.len(), 33);
        for i in 0..33 {
            assert_eq!(arr.get(i), Some(Value::from(i as i64)));
        }
    }

    #[test]
    fn test_insert_and_set() {
        let mut arr = ArrayValue::from_vec(vec![Value::from(1i64), Value::from(3i64)]);
        arr.insert(1, Value::from(2i64));
        assert_eq!(
            arr.iter().collect::<Vec<_>>(),
            vec![Value::from(1i64), Value::from(2i64), Value::from(3i64)]
        );
        let old = arr.set(0, Value::from(0i64)).unwrap();
        assert_eq!(old, Value::from(1i64));
        assert_eq!(arr.get(0), Some(Value::from(0i64)));
    }
}
