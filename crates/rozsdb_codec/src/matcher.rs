//! Type-aware equality for equality-predicate queries.

use serde_json::Value;

/// Tolerance used when comparing numbers.
pub const FLOAT_EPSILON: f64 = 1e-6;

/// Returns true if a stored field value equals the query value.
///
/// Strings, booleans and nulls compare exactly. Numbers compare as `f64`
/// within [`FLOAT_EPSILON`]. A string query is coerced to the type of the
/// stored scalar, so `"42"` matches `42` and `"true"` matches `true`; this
/// is what lets text-only clients query typed fields. Arrays and objects
/// never match.
#[must_use]
pub fn values_match(stored: &Value, query: &Value) -> bool {
    match (stored, query) {
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => numbers_match(a, b),
            _ => false,
        },
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Null, Value::Null) => true,
        (Value::Number(a), Value::String(text)) => match (a.as_f64(), text.trim().parse::<f64>()) {
            (Some(a), Ok(b)) => numbers_match(a, b),
            _ => false,
        },
        (Value::Bool(a), Value::String(text)) => match text.as_str() {
            "true" => *a,
            "false" => !*a,
            _ => false,
        },
        (Value::Null, Value::String(text)) => text == "null",
        _ => false,
    }
}

fn numbers_match(a: f64, b: f64) -> bool {
    (a - b).abs() < FLOAT_EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strings() {
        assert!(values_match(&json!("a"), &json!("a")));
        assert!(!values_match(&json!("a"), &json!("b")));
    }

    #[test]
    fn numbers_within_epsilon() {
        assert!(values_match(&json!(0.3), &json!(0.1 + 0.2)));
        assert!(values_match(&json!(42), &json!(42.0)));
        assert!(!values_match(&json!(1.0), &json!(1.001)));
    }

    #[test]
    fn booleans_and_null() {
        assert!(values_match(&json!(true), &json!(true)));
        assert!(!values_match(&json!(true), &json!(false)));
        assert!(values_match(&json!(null), &json!(null)));
        assert!(!values_match(&json!(null), &json!(false)));
    }

    #[test]
    fn string_query_coerces_to_stored_type() {
        assert!(values_match(&json!(42), &json!("42")));
        assert!(values_match(&json!(2.5), &json!("2.5")));
        assert!(!values_match(&json!(42), &json!("forty-two")));
        assert!(values_match(&json!(false), &json!("false")));
        assert!(values_match(&json!(null), &json!("null")));
    }

    #[test]
    fn typed_query_does_not_match_text() {
        assert!(!values_match(&json!("42"), &json!(42)));
    }

    #[test]
    fn containers_never_match() {
        assert!(!values_match(&json!([1]), &json!([1])));
        assert!(!values_match(&json!({"a": 1}), &json!({"a": 1})));
    }
}
