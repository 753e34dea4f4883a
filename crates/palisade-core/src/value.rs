//! Comparison semantics over loosely typed field values.
//!
//! Records carry `serde_json::Value` fields, so equality and containment have
//! to be defined once and shared by every backend that evaluates masks in
//! process. Numeric comparisons coerce between integer and float
//! representations; containment mirrors substring search on strings and
//! membership on arrays.

use serde_json::Value;

/// Equality with numeric coercion.
///
/// `1` and `1.0` compare equal; all other value shapes fall back to strict
/// structural equality.
#[must_use]
pub fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => {
            if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
                return a == b;
            }
            match (a.as_f64(), b.as_f64()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            }
        }
        _ => left == right,
    }
}

/// Whether `haystack` contains `needle`.
///
/// Strings contain substrings, arrays contain elements. Every other haystack
/// shape contains nothing.
#[must_use]
pub fn value_contains(haystack: &Value, needle: &Value) -> bool {
    match haystack {
        Value::String(text) => match needle {
            Value::String(part) => text.contains(part.as_str()),
            _ => false,
        },
        Value::Array(items) => items.iter().any(|item| values_equal(item, needle)),
        _ => false,
    }
}

/// Whether `needle` is contained in `collection`.
///
/// The mirror of [`value_contains`] with the operands swapped, matching the
/// `is_contained`/`in` operator family.
#[must_use]
pub fn value_is_contained(needle: &Value, collection: &Value) -> bool {
    value_contains(collection, needle)
}
