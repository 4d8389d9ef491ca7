//! Semantic equality: deep comparison over the JSON form of a value where
//! `null`, absent, empty arrays and empty objects are all the same thing, and
//! resource quantities compare by value (`1Gi` equals `1024Mi`).

use serde::Serialize;
use serde_json::Value as Json;
use tracing::warn;

use crate::quantity::canonical_quantity;

/// True when `a` and `b` are equal once absent/empty members are ignored.
pub fn semantic_eq<T: Serialize + ?Sized>(a: &T, b: &T) -> bool {
    match (serde_json::to_value(a), serde_json::to_value(b)) {
        (Ok(a), Ok(b)) => normalize(a) == normalize(b),
        (Err(e), _) | (_, Err(e)) => {
            // Unserializable values never compare equal; the caller then treats them as changed.
            warn!(error = %e, "semantic comparison failed to serialize operand");
            false
        }
    }
}

/// Fields whose values are all resource quantities.
const QUANTITY_MAPS: [&str; 4] = ["limits", "requests", "overhead", "capacity"];
/// Fields holding a single quantity.
const QUANTITY_FIELDS: [&str; 1] = ["sizeLimit"];

/// Normalized JSON form used by [`semantic_eq`]. Empty containers become `null`
/// and resource quantities are replaced by their canonical value.
pub fn normalize(v: Json) -> Json {
    normalize_at(v, false)
}

fn normalize_at(v: Json, quantity: bool) -> Json {
    match v {
        Json::Object(map) => {
            let pruned: serde_json::Map<String, Json> = map
                .into_iter()
                .map(|(k, v)| {
                    let v = if QUANTITY_MAPS.contains(&k.as_str()) {
                        normalize_quantity_map(v)
                    } else {
                        normalize_at(v, QUANTITY_FIELDS.contains(&k.as_str()))
                    };
                    (k, v)
                })
                .filter(|(_, v)| !v.is_null())
                .collect();
            if pruned.is_empty() { Json::Null } else { Json::Object(pruned) }
        }
        Json::Array(items) => {
            if items.is_empty() {
                Json::Null
            } else {
                Json::Array(items.into_iter().map(|v| normalize_at(v, false)).collect())
            }
        }
        Json::String(s) if quantity => Json::String(canonical_quantity(&s).unwrap_or(s)),
        other => other,
    }
}

fn normalize_quantity_map(v: Json) -> Json {
    match v {
        Json::Object(map) => {
            let canonical: serde_json::Map<String, Json> =
                map.into_iter().map(|(k, v)| (k, normalize_at(v, true))).filter(|(_, v)| !v.is_null()).collect();
            if canonical.is_empty() { Json::Null } else { Json::Object(canonical) }
        }
        other => normalize_at(other, false),
    }
}
