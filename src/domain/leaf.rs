//! Canonical form of a record and its leaf digest.
//!
//! Strings hash as their raw text. Every other record hashes as compact JSON
//! with object keys in sorted order, so `1` and `"1"` share a digest and key
//! order in the input never changes the result. Integral floats are written
//! as integers, so `1.0`, `1e0` and `1` are the same record.

use serde_json::{Number, Value};

use super::hash::Algorithm;
use crate::error::Result;

/// Stable textual form of `record`.
pub fn canonicalize(record: &Value) -> Result<String> {
    match record {
        Value::String(s) => Ok(s.clone()),
        other => Ok(serde_json::to_string(&normalize(other))?),
    }
}

/// 2^53 - 1, the largest integer an f64 holds exactly along with its neighbours.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Copy of `record` with every integral float number turned into an integer.
pub fn normalize(record: &Value) -> Value {
    match record {
        Value::Number(n) => Value::Number(normalize_number(n)),
        Value::Array(items) => Value::Array(items.iter().map(normalize).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), normalize(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn normalize_number(n: &Number) -> Number {
    if n.is_i64() || n.is_u64() {
        return n.clone();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() <= MAX_SAFE_INTEGER => {
            if f >= 0.0 {
                Number::from(f as u64)
            } else {
                Number::from(f as i64)
            }
        }
        _ => n.clone(),
    }
}

/// Whether two records canonicalize identically, ignoring how numbers are spelled.
pub fn same_record(a: &Value, b: &Value) -> bool {
    normalize(a) == normalize(b)
}

/// Leaf digest of `record` under a built-in algorithm.
pub fn hash_record(record: &Value, algorithm: Algorithm) -> Result<String> {
    let canonical = canonicalize(record)?;
    Ok(algorithm.digest_hex(canonical.as_bytes()))
}
