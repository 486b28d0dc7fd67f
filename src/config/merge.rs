//! Field-by-field merging of configuration tiers.
//!
//! Objects merge recursively; arrays and scalars are replaced whole, so a
//! tier that lists a `cache.manifest` replaces the default manifest rather
//! than extending it.

use serde_json::Value;

/// Merge `overlay` onto `base`, with `overlay` winning.
///
/// A `null` in the overlay means "not specified" and keeps the base value.
///
/// ```
/// use serde_json::json;
/// use taskdeck::config::deep_merge;
///
/// let base = json!({ "server": { "port": 8421, "host": "127.0.0.1" } });
/// let overlay = json!({ "server": { "port": 9000 } });
/// assert_eq!(
///     deep_merge(base, overlay),
///     json!({ "server": { "port": 9000, "host": "127.0.0.1" } })
/// );
/// ```
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (base, Value::Null) => base,
        (_, overlay) => overlay,
    }
}

/// Fold [`deep_merge`] over tiers, lowest priority first.
pub fn deep_merge_all(values: impl IntoIterator<Item = Value>) -> Value {
    values.into_iter().fold(Value::Null, deep_merge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_sections_merge() {
        let base = json!({
            "undo": {"window_ms": 7000},
            "scheduler": {"horizon_days": 7, "highlight_ms": 4000}
        });
        let overlay = json!({"scheduler": {"highlight_ms": 1500}});
        assert_eq!(
            deep_merge(base, overlay),
            json!({
                "undo": {"window_ms": 7000},
                "scheduler": {"horizon_days": 7, "highlight_ms": 1500}
            })
        );
    }

    #[test]
    fn test_manifest_is_replaced() {
        let base = json!({"cache": {"manifest": ["/", "/index.html", "/app.js"]}});
        let overlay = json!({"cache": {"manifest": ["/"]}});
        assert_eq!(deep_merge(base, overlay), json!({"cache": {"manifest": ["/"]}}));
    }

    #[test]
    fn test_null_keeps_base() {
        let base = json!({"cache": {"upstream": "http://origin"}});
        let overlay = json!({"cache": {"upstream": null}});
        assert_eq!(
            deep_merge(base, overlay),
            json!({"cache": {"upstream": "http://origin"}})
        );
    }

    #[test]
    fn test_merge_all_later_wins() {
        let tiers = vec![
            json!({"server": {"port": 1}}),
            json!({"server": {"host": "h"}}),
            json!({"server": {"port": 3}}),
        ];
        assert_eq!(
            deep_merge_all(tiers),
            json!({"server": {"port": 3, "host": "h"}})
        );
    }
}
