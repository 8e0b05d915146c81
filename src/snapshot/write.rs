//! Serializing in-memory values into snapshots
//!
//! One encoding pass with a fresh cache: strings and numbers intern to
//! their first occurrence, repeated object shapes come out thin. The
//! document root is never embedded.

use crate::codec::reader::DEFAULT_MAX_DEPTH;
use crate::codec::{Encoder, Tag};
use crate::core::{CodecError, Result};
use crate::snapshot::Snapshot;
use crate::value::Value;

/// Serialize a root value into a fresh snapshot.
pub fn serialize_value(value: &Value) -> Result<Snapshot> {
    serialize_value_with_depth(value, DEFAULT_MAX_DEPTH)
}

/// [`serialize_value`] under a caller-supplied nesting guard.
pub fn serialize_value_with_depth(value: &Value, max_depth: usize) -> Result<Snapshot> {
    let mut enc = Encoder::new(0);
    write_value(&mut enc, value, false, max_depth)?;
    Ok(Snapshot::from_vec(enc.into_bytes()))
}

/// Write a value through an encoder, returning its offset.
///
/// `embed` allows `null`/`true`/`false` to come back as negative embedded
/// offsets; pass `false` at a document root.
pub fn write_value(enc: &mut Encoder, value: &Value, embed: bool, depth: usize) -> Result<i32> {
    if depth == 0 {
        return Err(CodecError::DepthExceeded { max: DEFAULT_MAX_DEPTH }.into());
    }
    Ok(match value {
        Value::Null => enc.write_embeddable(Tag::Nil, embed),
        Value::Bool(false) => enc.write_embeddable(Tag::False, embed),
        Value::Bool(true) => enc.write_embeddable(Tag::True, embed),
        Value::Number(n) => enc.write_number(n.text()),
        Value::String(s) => enc.write_string(s.as_bytes()),
        Value::Blob(b) => enc.write_binary(b),
        Value::Array(items) => {
            // String-specialized arrays write without per-element dispatch.
            if let Some(strings) = items.as_strings() {
                let slots = enc.begin_array(strings.len());
                for (i, s) in strings.iter().enumerate() {
                    let off = enc.write_string(s.as_bytes());
                    enc.set_array_slot(&slots, i, off);
                }
                return Ok(slots.offset());
            }
            let slots = enc.begin_array(items.len());
            for (i, item) in items.iter().enumerate() {
                let off = write_value(enc, &item, true, depth - 1)?;
                enc.set_array_slot(&slots, i, off);
            }
            slots.offset()
        }
        Value::Object(o) => {
            let keys = o.keys();
            let names: Vec<&[u8]> = keys.iter().map(|k| k.as_bytes()).collect();
            let slots = enc.begin_object(&names);
            for i in 0..o.len() {
                let (_, member) = o.entry(i).expect("index in range");
                let off = write_value(enc, member, true, depth - 1)?;
                enc.set_object_value(&slots, i, off);
            }
            slots.offset()
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::reader::{offset_slot, read_array, read_object, read_tag, ObjectForm};
    use crate::codec::ContentReader as _;
    use crate::value::hash::{hash_encoded, hash_value};
    use crate::value::KeyInterner;
    use proptest::prelude::*;

    fn from_json(text: &str) -> Value {
        let json: serde_json::Value = serde_json::from_str(text).unwrap();
        Value::from_json(&json, &mut KeyInterner::new())
    }

    fn roundtrip(value: &Value) -> Value {
        let snap = serialize_value(value).unwrap();
        Value::decode(&snap, snap.root(), &mut KeyInterner::new()).unwrap()
    }

    #[test]
    fn test_scalar_roundtrips() {
        for text in ["null", "true", "false", "0", "-1", "1.5", "1e100", r#""s""#] {
            let v = from_json(text);
            assert_eq!(roundtrip(&v), v, "roundtrip of {text}");
        }
    }

    #[test]
    fn test_root_is_never_embedded() {
        for v in [Value::Null, Value::Bool(true), Value::Bool(false)] {
            let snap = serialize_value(&v).unwrap();
            // A root primitive writes its tag byte at offset 0.
            assert!(!snap.is_empty());
            assert_eq!(read_tag(&snap, 0).unwrap(), {
                match &v {
                    Value::Null => Tag::Nil,
                    Value::Bool(true) => Tag::True,
                    _ => Tag::False,
                }
            });
        }
    }

    #[test]
    fn test_children_embed_primitives() {
        let v = from_json("[null, true, false]");
        let snap = serialize_value(&v).unwrap();
        let view = read_array(&snap, 0).unwrap();
        assert_eq!(view.value_offset(0).unwrap(), -1);
        assert_eq!(view.value_offset(1).unwrap(), -3);
        assert_eq!(view.value_offset(2).unwrap(), -2);
        assert_eq!(roundtrip(&v), v);
    }

    #[test]
    fn test_thin_object_sharing() {
        // Two same-shaped objects: the second header is thin and its
        // reference points at the first full header.
        let v = from_json(r#"[{"a": "xa", "b": "xb"}, {"a": "ya", "b": "yb"}]"#);
        let snap = serialize_value(&v).unwrap();
        let arr = read_array(&snap, 0).unwrap();
        let first = arr.value_offset(0).unwrap();
        let second = arr.value_offset(1).unwrap();
        assert_eq!(read_tag(&snap, first).unwrap(), Tag::ObjectFull);
        assert_eq!(read_tag(&snap, second).unwrap(), Tag::ObjectThin);
        assert_eq!(offset_slot(&snap, second + 1).unwrap(), first);

        let view = read_object(&snap, second).unwrap();
        assert_eq!(view.form(), ObjectForm::Thin);
        let (names, _) = view.names_and_values().unwrap();
        assert_eq!(names, vec![b"a".as_ref(), b"b".as_ref()]);
        assert_eq!(roundtrip(&v), v);
    }

    #[test]
    fn test_string_interning_across_document() {
        let v = from_json(r#"{"x": "dup", "y": "dup", "z": "dup"}"#);
        let snap = serialize_value(&v).unwrap();
        let view = read_object(&snap, 0).unwrap();
        let offs: Vec<i32> = (0..3).map(|i| view.value_offset_at(i).unwrap()).collect();
        assert_eq!(offs[0], offs[1]);
        assert_eq!(offs[1], offs[2]);
    }

    #[test]
    fn test_hash_agrees_between_forms() {
        // Full and thin encodings of the same logical object hash alike,
        // and match the in-memory hash.
        let v = from_json(r#"[{"k": 1, "m": 2}, {"k": 1, "m": 2}]"#);
        let snap = serialize_value(&v).unwrap();
        let arr = read_array(&snap, 0).unwrap();
        let full = arr.value_offset(0).unwrap();
        let thin = arr.value_offset(1).unwrap();
        let expected = hash_value(&from_json(r#"{"k": 1, "m": 2}"#));
        assert_eq!(hash_encoded(&snap, full).unwrap(), expected);
        assert_eq!(hash_encoded(&snap, thin).unwrap(), expected);
    }

    #[test]
    fn test_special_key_roundtrip() {
        let v = from_json(
            r#"{"foo":["bar","baz"],"":0,"a/b":1,"c%d":2,"e^f":3,"g|h":4,"i\\j":5,"k\"l":6," ":7,"m~n":8,"n":null}"#,
        );
        assert_eq!(roundtrip(&v), v);
    }

    fn arb_json() -> impl Strategy<Value = serde_json::Value> {
        let leaf = prop_oneof![
            Just(serde_json::Value::Null),
            any::<bool>().prop_map(serde_json::Value::Bool),
            any::<i64>().prop_map(|i| serde_json::json!(i)),
            (-1.0e9f64..1.0e9).prop_map(|f| serde_json::json!(f)),
            "[a-z0-9~/]{0,8}".prop_map(serde_json::Value::String),
        ];
        leaf.prop_recursive(4, 64, 8, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..8)
                    .prop_map(serde_json::Value::Array),
                prop::collection::btree_map("[a-z]{0,6}", inner, 0..8).prop_map(|m| {
                    serde_json::Value::Object(m.into_iter().collect())
                }),
            ]
        })
    }

    proptest! {
        #[test]
        fn prop_roundtrip(json in arb_json()) {
            let mut interner = KeyInterner::new();
            let value = Value::from_json(&json, &mut interner);
            let snap = serialize_value(&value).unwrap();
            let decoded = Value::decode(&snap, snap.root(), &mut interner).unwrap();
            prop_assert_eq!(&decoded, &value);
            // Hash canonicalization: binary and memory forms agree.
            prop_assert_eq!(hash_encoded(&snap, snap.root()).unwrap(), hash_value(&value));
        }
    }
}
