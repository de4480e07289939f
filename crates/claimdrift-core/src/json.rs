//! Canonical JSON: sorted object keys, compact separators.
//!
//! Label payloads are deduplicated by their exact serialised form and ledger
//! columns are compared textually, so every JSON string the engine persists
//! goes through [`to_canonical_string`].

use serde::Serialize;
use serde_json::{Map, Value};

use crate::Result;

/// Recursively rebuild `value` with object keys in sorted order.
pub fn canonicalize(value: Value) -> Value {
  match value {
    Value::Object(map) => {
      let mut entries: Vec<(String, Value)> = map.into_iter().collect();
      entries.sort_by(|a, b| a.0.cmp(&b.0));
      let mut sorted = Map::new();
      for (k, v) in entries {
        sorted.insert(k, canonicalize(v));
      }
      Value::Object(sorted)
    }
    Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
    other => other,
  }
}

/// Serialise any value to canonical JSON.
pub fn to_canonical_string<T: Serialize + ?Sized>(value: &T) -> Result<String> {
  let value = canonicalize(serde_json::to_value(value)?);
  Ok(serde_json::to_string(&value)?)
}

/// Canonical form of an already-parsed JSON value.
pub fn canonical_value_string(value: &Value) -> String {
  canonicalize(value.clone()).to_string()
}
