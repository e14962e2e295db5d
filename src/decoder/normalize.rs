//! Normalization applied to every decoded payload: binary buffers become
//! lowercase hex and 64-bit integers become JSON-safe values.

use serde_json::{Map, Value};

/// Anything above this has a non-zero high half.
const LOW_MAX: u64 = u32::MAX as u64;

pub fn hex(bytes: &[u8]) -> Value {
    Value::String(hex::encode(bytes))
}

pub fn hex_list(items: &[Vec<u8>]) -> Value {
    Value::Array(items.iter().map(|b| hex(b)).collect())
}

/// Unsigned 64-bit value: numbers while the high half is zero, decimal
/// strings otherwise.
pub fn wide(value: u64) -> Value {
    if value <= LOW_MAX {
        Value::from(value)
    } else {
        Value::String(value.to_string())
    }
}

/// Signed 64-bit value with the same high-half rule.
pub fn wide_signed(value: i64) -> Value {
    let high = (value >> 32) as i32;
    if high == 0 {
        Value::from(value)
    } else {
        Value::String(value.to_string())
    }
}

/// Combines split 32-bit halves the way long-encoded JSON carries them.
pub fn join_halves(high: i64, low: i64, unsigned: bool) -> Value {
    let low_bits = (low as u32) as u64;
    if high == 0 {
        return Value::from(low_bits);
    }
    let high_bits = (high as u32) as u64;
    let combined = (high_bits << 32) | low_bits;
    if unsigned {
        Value::String(combined.to_string())
    } else {
        Value::String((combined as i64).to_string())
    }
}

/// Recursively rewrites `{"high": h, "low": l}` objects into single values.
pub fn normalize_json(value: Value) -> Value {
    match value {
        Value::Object(map) => match split_long(&map) {
            Some(joined) => joined,
            None => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, normalize_json(v)))
                    .collect::<Map<String, Value>>(),
            ),
        },
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_json).collect()),
        other => other,
    }
}

fn split_long(map: &Map<String, Value>) -> Option<Value> {
    let high = map.get("high")?.as_i64()?;
    let low = map.get("low")?.as_i64()?;
    let extra_keys_ok = map
        .keys()
        .all(|k| matches!(k.as_str(), "high" | "low" | "unsigned"));
    if !extra_keys_ok {
        return None;
    }
    let unsigned = map.get("unsigned").and_then(Value::as_bool).unwrap_or(false);
    Some(join_halves(high, low, unsigned))
}
