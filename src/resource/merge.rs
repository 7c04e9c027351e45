//! Document merging for PATCH and create-with-body

use serde_json::Value;

/// Deep-merge `patch` into `target`.
///
/// Objects merge key by key, recursively. Arrays, scalars and `null` in the
/// patch replace whatever was there.
pub fn deep_merge(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                let nested = value.is_object() && target.get(key).is_some_and(Value::is_object);
                match target.get_mut(key) {
                    Some(existing) if nested => deep_merge(existing, value),
                    _ => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}

/// Overwrite the top-level keys of `target` with those of `overlay`
pub fn shallow_merge(target: &mut Value, overlay: &Value) {
    if let (Some(target), Some(overlay)) = (target.as_object_mut(), overlay.as_object()) {
        for (key, value) in overlay {
            target.insert(key.clone(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deep_merge_nested_objects() {
        let mut doc = json!({
            "Name": "Volume",
            "Status": {"State": "Enabled", "Health": "OK"},
            "Identifiers": [{"DurableName": "a"}]
        });
        deep_merge(
            &mut doc,
            &json!({
                "Status": {"Health": "Warning"},
                "Identifiers": [{"DurableName": "b"}],
                "Encrypted": true
            }),
        );

        assert_eq!(
            doc,
            json!({
                "Name": "Volume",
                "Status": {"State": "Enabled", "Health": "Warning"},
                "Identifiers": [{"DurableName": "b"}],
                "Encrypted": true
            })
        );
    }

    #[test]
    fn test_deep_merge_null_and_type_change() {
        let mut doc = json!({"A": {"B": 1}, "C": 2});
        deep_merge(&mut doc, &json!({"A": null, "C": {"D": 3}}));
        assert_eq!(doc, json!({"A": null, "C": {"D": 3}}));
    }

    #[test]
    fn test_shallow_merge_replaces_nested_objects() {
        let mut doc = json!({"Status": {"State": "Enabled", "Health": "OK"}, "Name": "x"});
        shallow_merge(&mut doc, &json!({"Status": {"Health": "Critical"}}));
        assert_eq!(doc, json!({"Status": {"Health": "Critical"}, "Name": "x"}));
    }
}
