//! Structural equality over JSON trees.
//!
//! Object key order never matters. Arrays are compared as multisets: two
//! arrays are equal when their elements' canonical texts, sorted, match.

use serde_json::{Number, Value};

/// Largest integer an `f64` represents exactly.
const MAX_EXACT_FLOAT_INT: f64 = 9_007_199_254_740_992.0;

/// Semantic equality of two JSON values, ignoring key and element order.
///
/// `null` is only equal to `null`; a missing key never equals a key holding
/// `null`.
pub fn structurally_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => numbers_equal(x, y),
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Array(x), Value::Array(y)) => arrays_equal_unordered(x, y),
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .all(|(key, v)| y.get(key).is_some_and(|w| structurally_equal(v, w)))
        }
        _ => false,
    }
}

/// Numeric equality across integer and float representations (`1 == 1.0`).
pub fn numbers_equal(x: &Number, y: &Number) -> bool {
    if let (Some(a), Some(b)) = (x.as_i64(), y.as_i64()) {
        return a == b;
    }
    if let (Some(a), Some(b)) = (x.as_u64(), y.as_u64()) {
        return a == b;
    }
    match (x.as_f64(), y.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Same length and the same sorted sequence of canonical element texts.
pub fn arrays_equal_unordered(a: &[Value], b: &[Value]) -> bool {
    a.len() == b.len() && sorted_canonical(a) == sorted_canonical(b)
}

/// Canonical texts of `items`, lexically sorted.
pub fn sorted_canonical(items: &[Value]) -> Vec<String> {
    let mut texts: Vec<String> = items.iter().map(canonical_text).collect();
    texts.sort_unstable();
    texts
}

/// Compact JSON with object keys sorted, nested arrays in sorted-element
/// order, and integral floats written as integers.
pub fn canonical_text(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Number(n) => out.push_str(&canonical_number(n)),
        Value::Array(items) => {
            out.push('[');
            out.push_str(&sorted_canonical(items).join(","));
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, member)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(member, out);
            }
            out.push('}');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

fn canonical_number(n: &Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < MAX_EXACT_FLOAT_INT => {
            format!("{}", f as i64)
        }
        _ => n.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn primitives() {
        assert!(structurally_equal(&json!("a"), &json!("a")));
        assert!(structurally_equal(&json!(null), &json!(null)));
        assert!(!structurally_equal(&json!("1"), &json!(1)));
        assert!(!structurally_equal(&json!(null), &json!(false)));
        assert!(!structurally_equal(&json!(0), &json!(false)));
    }

    #[test]
    fn integers_and_integral_floats_are_equal() {
        assert!(structurally_equal(&json!(1), &json!(1.0)));
        assert!(structurally_equal(&json!(-3), &json!(-3.0)));
        assert!(!structurally_equal(&json!(1), &json!(1.5)));
        assert_eq!(canonical_text(&json!([1.0, 2.5])), "[1,2.5]");
    }

    #[test]
    fn object_key_order_is_ignored() {
        let a: Value = serde_json::from_str(r#"{"a":1,"b":{"c":2,"d":3}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"b":{"d":3,"c":2},"a":1}"#).unwrap();
        let keys = |v: &Value| v.as_object().unwrap().keys().cloned().collect::<Vec<_>>();
        assert_eq!(keys(&b), ["b", "a"]);
        assert_ne!(a.to_string(), b.to_string());
        assert!(structurally_equal(&a, &b));
        assert!(structurally_equal(&json!([a.clone(), 2]), &json!([2, b.clone()])));
        assert_eq!(canonical_text(&a), canonical_text(&b));
    }

    #[test]
    fn missing_key_is_not_null() {
        assert!(!structurally_equal(&json!({"a": null}), &json!({})));
        assert!(!structurally_equal(&json!({"a": null}), &json!({"b": null})));
    }

    #[test]
    fn arrays_are_multisets() {
        assert!(structurally_equal(
            &json!([{"price": "1"}, {"price": "2"}]),
            &json!([{"price": "2"}, {"price": "1"}])
        ));
        assert!(!structurally_equal(&json!([1, 1, 2]), &json!([1, 2, 2])));
        assert!(!structurally_equal(&json!([1]), &json!([1, 1])));
    }

    #[test]
    fn nested_arrays_ignore_order_at_every_depth() {
        assert!(structurally_equal(
            &json!({"lines": [{"tags": ["x", "y"]}]}),
            &json!({"lines": [{"tags": ["y", "x"]}]})
        ));
    }

    #[test]
    fn canonical_text_sorts_keys_and_escapes() {
        let v = json!({"b": "q\"uote", "a": [true, null]});
        assert_eq!(canonical_text(&v), r#"{"a":[null,true],"b":"q\"uote"}"#);
    }

    #[test]
    fn type_mismatch_is_unequal() {
        assert!(!structurally_equal(&json!([]), &json!({})));
        assert!(!structurally_equal(&json!({"a": 1}), &json!("{\"a\":1}")));
    }
}
