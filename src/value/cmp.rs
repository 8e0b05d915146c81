//! Total order over values
//!
//! Different types compare by a fixed type ordering (null < bool < string
//! < number < array < object < blob); same-type comparisons are
//! element-wise for containers, length first. The order is defined for
//! both in-memory values and encoded values, and the two agree.

use std::cmp::Ordering;

use crate::codec::reader::{
    read_array, read_bytes, read_int, read_number_text, read_object, read_string, read_tag,
    ContentReader, DEFAULT_MAX_DEPTH,
};
use crate::codec::Tag;
use crate::core::{CodecError, Result};
use crate::value::number::cmp_decimal;
use crate::value::Value;

fn rank_value(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::String(_) => 2,
        Value::Number(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
        Value::Blob(_) => 6,
    }
}

fn rank_tag(tag: Tag) -> u8 {
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

/// Total order over in-memory values.
pub fn cmp_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::String(x), Value::String(y)) => x.as_bytes().cmp(y.as_bytes()),
        (Value::Number(x), Value::Number(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            // String-specialized arrays compare without value dispatch.
            if let (Some(xs), Some(ys)) = (x.as_strings(), y.as_strings()) {
                return xs
                    .len()
                    .cmp(&ys.len())
                    .then_with(|| xs.iter().map(|s| s.as_bytes()).cmp(ys.iter().map(|s| s.as_bytes())));
            }
            match x.len().cmp(&y.len()) {
                Ordering::Equal => {}
                other => return other,
            }
            for (xe, ye) in x.iter().zip(y.iter()) {
                match cmp_values(&xe, &ye) {
                    Ordering::Equal => {}
                    other => return other,
                }
            }
            Ordering::Equal
        }
        (Value::Object(x), Value::Object(y)) => {
            match x.len().cmp(&y.len()) {
                Ordering::Equal => {}
                other => return other,
            }
            for ((xk, xv), (yk, yv)) in x.iter().zip(y.iter()) {
                match xk.as_bytes().cmp(yk.as_bytes()) {
                    Ordering::Equal => {}
                    other => return other,
                }
                match cmp_values(xv, yv) {
                    Ordering::Equal => {}
                    other => return other,
                }
            }
            Ordering::Equal
        }
        (Value::Blob(x), Value::Blob(y)) => x.as_ref().cmp(y.as_ref()),
        _ => rank_value(a).cmp(&rank_value(b)),
    }
}

/// Total order over two encoded values, possibly in different buffers.
pub fn cmp_encoded<A, B>(ra: &A, a_off: i32, rb: &B, b_off: i32) -> Result<Ordering>
where
    A: ContentReader + ?Sized,
    B: ContentReader + ?Sized,
{
    cmp_encoded_at(ra, a_off, rb, b_off, DEFAULT_MAX_DEPTH)
}

fn cmp_encoded_at<A, B>(
    ra: &A,
    a_off: i32,
    rb: &B,
    b_off: i32,
    depth: usize,
) -> Result<Ordering>
where
    A: ContentReader + ?Sized,
    B: ContentReader + ?Sized,
{
    if depth == 0 {
        return Err(CodecError::DepthExceeded { max: DEFAULT_MAX_DEPTH }.into());
    }
    let ta = read_tag(ra, a_off)?;
    let tb = read_tag(rb, b_off)?;
    let (rka, rkb) = (rank_tag(ta), rank_tag(tb));
    if rka != rkb {
        return Ok(rka.cmp(&rkb));
    }
    Ok(match ta {
        Tag::Nil => Ordering::Equal,
        Tag::False | Tag::True => (ta == Tag::True).cmp(&(tb == Tag::True)),
        Tag::String => read_string(ra, a_off)?.cmp(read_string(rb, b_off)?),
        Tag::StringInt | Tag::Number => {
            if ta == Tag::StringInt && tb == Tag::StringInt {
                read_int(ra, a_off)?.cmp(&read_int(rb, b_off)?)
            } else {
                let xa = read_number_text(ra, a_off)?;
                let xb = read_number_text(rb, b_off)?;
                cmp_decimal(&xa, &xb)
            }
        }
        Tag::Binary => read_bytes(ra, a_off)?.cmp(read_bytes(rb, b_off)?),
        Tag::Array => {
            let va = read_array(ra, a_off)?;
            let vb = read_array(rb, b_off)?;
            match va.len().cmp(&vb.len()) {
                Ordering::Equal => {}
                other => return Ok(other),
            }
            for i in 0..va.len() {
                let ea = va.value_offset(i)?;
                let eb = vb.value_offset(i)?;
                match cmp_encoded_at(ra, ea, rb, eb, depth - 1)? {
                    Ordering::Equal => {}
                    other => return Ok(other),
                }
            }
            Ordering::Equal
        }
        Tag::ObjectFull | Tag::ObjectThin | Tag::ObjectPatch => {
            let va = read_object(ra, a_off)?;
            let vb = read_object(rb, b_off)?;
            match va.len().cmp(&vb.len()) {
                Ordering::Equal => {}
                other => return Ok(other),
            }
            for i in 0..va.len() {
                match va.name(i)?.cmp(vb.name(i)?) {
                    Ordering::Equal => {}
                    other => return Ok(other),
                }
                let ea = va.value_offset_at(i)?;
                let eb = vb.value_offset_at(i)?;
                match cmp_encoded_at(ra, ea, rb, eb, depth - 1)? {
                    Ordering::Equal => {}
                    other => return Ok(other),
                }
            }
            Ordering::Equal
        }
    })
}

/// Semantic equality of two encoded values.
pub fn eq_encoded<A, B>(ra: &A, a_off: i32, rb: &B, b_off: i32) -> Result<bool>
where
    A: ContentReader + ?Sized,
    B: ContentReader + ?Sized,
{
    Ok(cmp_encoded(ra, a_off, rb, b_off)? == Ordering::Equal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{ArrayValue, KeyInterner, ObjectValue};
    use std::sync::Arc;

    fn v(json: &str) -> Value {
        let parsed: serde_json::Value = serde_json::from_str(json).unwrap();
        Value::from_json(&parsed, &mut KeyInterner::new())
    }

    #[test]
    fn test_type_ordering() {
        let order = [
            v("null"),
            v("false"),
            v(r#""a""#),
            v("0"),
            v("[]"),
            v("{}"),
            Value::from(vec![0u8]),
        ];
        for w in order.windows(2) {
            assert_eq!(cmp_values(&w[0], &w[1]), Ordering::Less, "{:?} < {:?}", w[0], w[1]);
        }
    }

    #[test]
    fn test_bool_order() {
        assert_eq!(cmp_values(&v("false"), &v("true")), Ordering::Less);
    }

    #[test]
    fn test_numbers_compare_exactly() {
        assert_eq!(cmp_values(&v("1.0"), &v("1")), Ordering::Equal);
        assert_eq!(cmp_values(&v("1e2"), &v("100")), Ordering::Equal);
        assert_eq!(cmp_values(&v("2"), &v("10")), Ordering::Less);
    }

    #[test]
    fn test_containers_length_first() {
        assert_eq!(cmp_values(&v("[9]"), &v("[1, 2]")), Ordering::Less);
        assert_eq!(cmp_values(&v(r#"{"z": 1}"#), &v(r#"{"a": 1, "b": 2}"#)), Ordering::Less);
    }

    #[test]
    fn test_string_specialized_equality() {
        let a = Value::Array(ArrayValue::from_vec(vec![
            Value::from("x"),
            Value::from("y"),
        ]));
        let b = v(r#"["x", "y"]"#);
        assert_eq!(cmp_values(&a, &b), Ordering::Equal);
    }

    #[test]
    fn test_object_member_order_drives_compare() {
        let mut interner = KeyInterner::new();
        let a = Value::Object(ObjectValue::from_sorted_pairs(
            vec![(Arc::from("a"), Value::from(1i64))],
            &mut interner,
        ));
        let b = Value::Object(ObjectValue::from_sorted_pairs(
            vec![(Arc::from("a"), Value::from(2i64))],
            &mut interner,
        ));
        assert_eq!(cmp_values(&a, &b), Ordering::Less);
    }
}
