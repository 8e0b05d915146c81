//! In-memory value tree
//!
//! The mutable mirror of the binary format: freshly built trees and
//! clones of binary-backed values use these types. Objects keep sorted
//! members with interned key shapes, arrays are size-specialized up to 32
//! elements, numbers carry their decimal text.

pub mod cmp;
pub mod compact;
pub mod hash;
pub mod number;
pub mod object;
pub mod object2;

pub use compact::{ArrayValue, Classes, InlineVec, COMPACT_MAX};
pub use number::NumberValue;
pub use object::{KeyInterner, KeyShape, ObjectValue};
pub use object2::{IndexObject, ValueSet};

use std::sync::Arc;

use bytes::Bytes;

use crate::core::{Error, Result};

/// A JSON value (plus opaque blobs) in mutable, in-memory form.
#[derive(Clone, Debug)]
pub enum Value {
    /// JSON null
    Null,
    /// JSON boolean
    Bool(bool),
    /// JSON number, text-preserving
    Number(NumberValue),
    /// JSON string
    String(Arc<str>),
    /// JSON array
    Array(ArrayValue),
    /// JSON object
    Object(ObjectValue),
    /// Opaque binary payload (not representable in JSON)
    Blob(Bytes),
}

impl Value {
    /// Whether this is `null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Boolean payload, if any.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// String payload, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Number payload, if any.
    pub fn as_number(&self) -> Option<&NumberValue> {
        match self {
            Value::Number(n) => Some(n),
            _ => None,
        }
    }

    /// Integer payload, if the value is an in-range integer number.
    pub fn as_i64(&self) -> Option<i64> {
        self.as_number().and_then(NumberValue::as_i64)
    }

    /// Array payload, if any.
    pub fn as_array(&self) -> Option<&ArrayValue> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Mutable array payload, if any.
    pub fn as_array_mut(&mut self) -> Option<&mut ArrayValue> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Object payload, if any.
    pub fn as_object(&self) -> Option<&ObjectValue> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Mutable object payload, if any.
    pub fn as_object_mut(&mut self) -> Option<&mut ObjectValue> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Blob payload, if any.
    pub fn as_blob(&self) -> Option<&Bytes> {
        match self {
            Value::Blob(b) => Some(b),
            _ => None,
        }
    }

    /// Short type name for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Blob(_) => "blob",
        }
    }

    /// Empty object value.
    pub fn empty_object() -> Value {
        Value::Object(ObjectValue::new())
    }

    /// Convert a `serde_json` value, interning object shapes.
    pub fn from_json(json: &serde_json::Value, interner: &mut KeyInterner) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => {
                Value::Number(NumberValue::from_text(n.to_string()))
            }
            serde_json::Value::String(s) => Value::String(Arc::from(s.as_str())),
            serde_json::Value::Array(items) => Value::Array(ArrayValue::from_vec(
                items.iter().map(|v| Value::from_json(v, interner)).collect(),
            )),
            serde_json::Value::Object(map) => {
                // serde_json's map iterates in ascending key order.
                let pairs = map
                    .iter()
                    .map(|(k, v)| (Arc::from(k.as_str()), Value::from_json(v, interner)))
                    .collect();
                Value::Object(ObjectValue::from_sorted_pairs(pairs, interner))
            }
        }
    }

    /// Convert back to a `serde_json` value. Blobs are not representable.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => {
                let parsed: serde_json::Number =
                    serde_json::from_str(n.text()).map_err(|_| {
                        Error::unsupported(format!("number text {:?}", n.text()))
                    })?;
                serde_json::Value::Number(parsed)
            }
            Value::String(s) => serde_json::Value::String(s.to_string()),
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for v in items.iter() {
                    out.push(v.to_json()?);
                }
                serde_json::Value::Array(out)
            }
            Value::Object(o) => {
                let mut map = serde_json::Map::new();
                for (k, v) in o.iter() {
                    map.insert(k.to_string(), v.to_json()?);
                }
                serde_json::Value::Object(map)
            }
            Value::Blob(_) => {
                return Err(Error::unsupported("binary blob has no JSON form"))
            }
        })
    }

    /// Clone the encoded value at `off` into its in-memory form.
    pub fn decode<R>(r: &R, off: i32, interner: &mut KeyInterner) -> Result<Value>
    where
        R: crate::codec::ContentReader + ?Sized,
    {
        Self::decode_with_depth(r, off, interner, crate::codec::reader::DEFAULT_MAX_DEPTH)
    }

    /// [`decode`](Self::decode) under a caller-supplied nesting guard.
    pub fn decode_with_depth<R>(
        r: &R,
        off: i32,
        interner: &mut KeyInterner,
        max_depth: usize,
    ) -> Result<Value>
    where
        R: crate::codec::ContentReader + ?Sized,
    {
        Self::decode_at(r, off, interner, max_depth)
    }

    fn decode_at<R>(
        r: &R,
        off: i32,
        interner: &mut KeyInterner,
        depth: usize,
    ) -> Result<Value>
    where
        R: crate::codec::ContentReader + ?Sized,
    {
        use crate::codec::reader as cr;
        use crate::codec::Tag;
        use crate::core::CodecError;

        if depth == 0 {
            return Err(CodecError::DepthExceeded {
                max: cr::DEFAULT_MAX_DEPTH,
            }
            .into());
        }
        Ok(match cr::read_tag(r, off)? {
            Tag::Nil => Value::Null,
            Tag::False => Value::Bool(false),
            Tag::True => Value::Bool(true),
            Tag::String => Value::String(Arc::from(cr::read_str(r, off)?)),
            Tag::StringInt | Tag::Number => {
                Value::Number(NumberValue::from_text(cr::read_number_text(r, off)?.into_owned()))
            }
            Tag::Binary => Value::Blob(Bytes::copy_from_slice(cr::read_bytes(r, off)?)),
            Tag::Array => {
                let view = cr::read_array(r, off)?;
                let mut items = Vec::with_capacity(view.len());
                for i in 0..view.len() {
                    items.push(Self::decode_at(r, view.value_offset(i)?, interner, depth - 1)?);
                }
                Value::Array(ArrayValue::from_vec(items))
            }
            Tag::ObjectFull | Tag::ObjectThin | Tag::ObjectPatch => {
                let view = cr::read_object(r, off)?;
                let mut pairs = Vec::with_capacity(view.len());
                for i in 0..view.len() {
                    let (name_off, value_off) = view.entry(i)?;
                    let name = cr::read_name_bytes(r, name_off)?;
                    let key: Arc<str> = std::str::from_utf8(name)
                        .map_err(|_| CodecError::Utf8 { offset: name_off })?
                        .into();
                    pairs.push((key, Self::decode_at(r, value_off, interner, depth - 1)?));
                }
                Value::Object(ObjectValue::from_sorted_pairs(pairs, interner))
            }
        })
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        cmp::cmp_values(self, other) == std::cmp::Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        cmp::cmp_values(self, other)
    }
}

// Convenient constructors
impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Number(NumberValue::from_i64(i))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Arc::from(s.as_str()))
    }
}

impl From<Arc<str>> for Value {
    fn from(s: Arc<str>) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(ArrayValue::from_vec(items))
    }
}

impl From<Bytes> for Value {
    fn from(b: Bytes) -> Self {
        Value::Blob(b)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Blob(Bytes::from(b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_roundtrip() {
        let json: serde_json::Value = serde_json::from_str(
            r#"{"b": [1, 2.5, "x", null, true], "a": {"nested": "y"}, "n": 1e100}"#,
        )
        .unwrap();
        let mut interner = KeyInterner::new();
        let value = Value::from_json(&json, &mut interner);
        assert_eq!(value.to_json().unwrap(), json);
    }

    #[test]
    fn test_number_text_survives() {
        let json: serde_json::Value = serde_json::from_str(r#"[1.50, 0.1e1]"#).unwrap();
        let mut interner = KeyInterner::new();
        let value = Value::from_json(&json, &mut interner);
        let arr = value.as_array().unwrap();
        assert_eq!(arr.get(0).unwrap().as_number().unwrap().text(), "1.50");
        assert_eq!(arr.get(1).unwrap().as_number().unwrap().text(), "0.1e1");
    }

    #[test]
    fn test_blob_has_no_json_form() {
        let v = Value::from(vec![1u8, 2, 3]);
        assert!(v.to_json().is_err());
    }

    #[test]
    fn test_object_keys_sorted() {
        let json: serde_json::Value =
            serde_json::from_str(r#"{"z": 1, "a": 2, "m": 3}"#).unwrap();
        let mut interner = KeyInterner::new();
        let value = Value::from_json(&json, &mut interner);
        let keys = value.as_object().unwrap().keys();
        let names: Vec<&str> = keys.iter().map(|k| k.as_ref()).collect();
        assert_eq!(names, vec!["a", "m", "z"]);
    }
}
