//! Nested JSON tree helpers.

use serde_json::Value;

/// Deep-merge two JSON trees, with `overlay` overriding `base`.
///
/// Objects merge key by key, recursing where both sides hold an object;
/// any other overlay value replaces the base value wholesale.
pub fn tree_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut merged), Value::Object(overlay)) => {
            for (key, value) in overlay {
                let entry = match merged.remove(&key) {
                    Some(existing) => tree_merge(existing, value),
                    None => value,
                };
                merged.insert(key, entry);
            }
            Value::Object(merged)
        }
        (_, overlay) => overlay,
    }
}
