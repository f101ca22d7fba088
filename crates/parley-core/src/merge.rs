//! Deep merge of JSON configuration values.
//!
//! Merge rules:
//! - objects are merged key by key, recursively
//! - arrays are replaced as a whole
//! - scalars, `null` included, are overwritten

use serde_json::Value;

/// Merges `overlay` into `target` in place.
pub fn deep_merge(target: &mut Value, overlay: Value) {
    match (target, overlay) {
        (Value::Object(target), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match target.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, overlay) => *target = overlay,
    }
}

/// Returns `base` with `overlay` merged over it.
pub fn merged(mut base: Value, overlay: Value) -> Value {
    deep_merge(&mut base, overlay);
    base
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_nested_objects_are_merged() {
        let mut config = json!({ "a": { "x": 1 } });
        deep_merge(&mut config, json!({ "a": { "y": 2 } }));
        assert_eq!(config, json!({ "a": { "x": 1, "y": 2 } }));
    }

    #[test]
    fn test_arrays_are_replaced() {
        let config = merged(
            json!({ "intents": ["A", "B"], "depth": { "list": [1, 2, 3] } }),
            json!({ "intents": ["C"], "depth": { "list": [] } }),
        );
        assert_eq!(config, json!({ "intents": ["C"], "depth": { "list": [] } }));
    }

    #[test]
    fn test_scalars_overwrite() {
        let config = merged(
            json!({ "level": "info", "pretty": true, "keep": 1 }),
            json!({ "level": "debug", "pretty": false }),
        );
        assert_eq!(config, json!({ "level": "debug", "pretty": false, "keep": 1 }));
    }

    #[test]
    fn test_null_overwrites_like_any_scalar() {
        let config = merged(
            json!({ "token": "secret", "nested": { "a": 1 }, "keep": 1 }),
            json!({ "token": null, "nested": null, "new": null }),
        );
        assert_eq!(
            config,
            json!({ "token": null, "nested": null, "keep": 1, "new": null })
        );
    }

    #[test]
    fn test_object_replaces_scalar() {
        let config = merged(json!({ "logging": true }), json!({ "logging": { "pretty": false } }));
        assert_eq!(config, json!({ "logging": { "pretty": false } }));
    }
}
