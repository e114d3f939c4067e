//! Payload summarization for run and step inputs/outputs.
//!
//! Converts arbitrary user data into bounded, JSON-safe summaries suitable
//! for storage and later browsing, without retaining the original. Candidate
//! lists are special-cased so every id survives summarization.

use serde::Serialize;
use serde_json::{json, Map, Value};

/// Truncate long strings (not ids) beyond this many characters.
pub const MAX_STRING_LENGTH: usize = 1024;
/// Max keys to report from maps.
pub const MAX_DICT_KEYS: usize = 50;
/// Max recursion depth for nested structures.
pub const MAX_PAYLOAD_DEPTH: usize = 5;

/// Common id field names, checked in order.
const ID_FIELDS: [&str; 6] = ["id", "_id", "candidate_id", "item_id", "product_id", "doc_id"];
/// Score field names, checked in order.
const SCORE_FIELDS: [&str; 5] = ["score", "rank", "relevance", "confidence", "weight"];
/// Reason field names, checked in order.
const REASON_FIELDS: [&str; 5] = ["reason", "explanation", "rationale", "why", "filter_reason"];
/// Map keys recognized as the primary collection when inferring counts.
const COLLECTION_KEYS: [&str; 5] = ["items", "results", "data", "records", "candidates"];

/// JSON type name used in `_type` tags.
fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_i64() || n.is_u64() => "int",
        Value::Number(_) => "float",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

/// Infer an item count from a value.
///
/// Arrays report their length. Maps report the length of the first
/// recognized collection key (`items`, `results`, `data`, `records`,
/// `candidates`). Everything else has no count.
pub fn infer_count(value: &Value) -> Option<i64> {
    match value {
        Value::Array(items) => Some(items.len() as i64),
        Value::Object(map) => COLLECTION_KEYS.iter().find_map(|key| {
            map.get(*key)
                .and_then(Value::as_array)
                .map(|items| items.len() as i64)
        }),
        _ => None,
    }
}

/// Check whether a value is a list of candidate-like maps.
///
/// A candidate list is a non-empty array whose first few elements are all
/// maps carrying at least one recognized id field.
pub fn is_candidate_list(value: &Value) -> bool {
    let Value::Array(items) = value else {
        return false;
    };
    if items.is_empty() {
        return false;
    }

    let sample = items.len().min(3);
    items[..sample].iter().all(|item| match item {
        Value::Object(map) => ID_FIELDS.iter().any(|field| map.contains_key(*field)),
        _ => false,
    })
}

/// Extract id, score, and reason from a candidate map.
///
/// Missing scores are omitted; a missing reason is recorded as null.
pub fn extract_candidate(item: &Map<String, Value>) -> Value {
    let mut result = Map::new();

    if let Some(id) = ID_FIELDS.iter().find_map(|field| item.get(*field)) {
        result.insert("id".to_string(), id.clone());
    }
    if let Some(score) = SCORE_FIELDS.iter().find_map(|field| item.get(*field)) {
        result.insert("score".to_string(), score.clone());
    }
    let reason = REASON_FIELDS
        .iter()
        .find_map(|field| item.get(*field))
        .cloned()
        .unwrap_or(Value::Null);
    result.insert("reason".to_string(), reason);

    Value::Object(result)
}

/// Truncate a string if it exceeds the limit, appending "...".
fn truncate_string(s: &str) -> String {
    if s.chars().count() <= MAX_STRING_LENGTH {
        return s.to_string();
    }
    let mut out: String = s.chars().take(MAX_STRING_LENGTH).collect();
    out.push_str("...");
    out
}

/// Summarize any serializable value.
///
/// Serialization failures never propagate: the caller always gets a
/// `_type`-tagged summary back.
pub fn summarize<T: Serialize>(value: &T) -> Value {
    match serde_json::to_value(value) {
        Ok(v) => summarize_payload(&v),
        Err(_) => json!({"_type": short_type_name::<T>(), "_error": true}),
    }
}

/// Unqualified type name, without module path or generics noise.
pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

/// Summarize a JSON value for storage.
///
/// Candidate lists keep every id + score + reason (no sampling). Other data
/// is reduced to type tags, counts, keys, and truncated scalars.
pub fn summarize_payload(value: &Value) -> Value {
    summarize_at(value, 0)
}

fn summarize_at(value: &Value, depth: usize) -> Value {
    if depth >= MAX_PAYLOAD_DEPTH {
        return json!({"_type": type_name(value), "_truncated": true});
    }

    match value {
        Value::Null => json!({"_type": "null", "_value": null}),
        Value::Bool(b) => json!({"_type": "bool", "_value": b}),
        Value::Number(_) => json!({"_type": type_name(value), "_value": value}),
        Value::String(s) => {
            let length = s.chars().count();
            json!({
                "_type": "str",
                "_length": length,
                "_value": truncate_string(s),
                "_truncated": length > MAX_STRING_LENGTH,
            })
        }
        Value::Array(items) => {
            if is_candidate_list(value) {
                let candidates: Vec<Value> = items
                    .iter()
                    .map(|item| match item {
                        Value::Object(map) => extract_candidate(map),
                        // Unreachable for the sampled prefix, but later
                        // elements of a mixed list still need an entry.
                        other => json!({"id": null, "reason": null, "_type": type_name(other)}),
                    })
                    .collect();
                json!({
                    "_type": "candidates",
                    "_count": items.len(),
                    "_candidates": candidates,
                })
            } else {
                let mut result = Map::new();
                result.insert("_type".to_string(), json!("list"));
                result.insert("_count".to_string(), json!(items.len()));
                if let Some(first) = items.first() {
                    result.insert("_item_type".to_string(), json!(type_name(first)));
                }
                Value::Object(result)
            }
        }
        Value::Object(map) => summarize_map(map),
    }
}

fn summarize_map(map: &Map<String, Value>) -> Value {
    // Scalars are kept inline; anything structured collapses to a type tag.
    let mut keys = Vec::with_capacity(MAX_DICT_KEYS.min(map.len()));
    let mut values = Map::new();
    for (key, value) in map.iter().take(MAX_DICT_KEYS) {
        let entry = match value {
            Value::Null => Value::Null,
            Value::Bool(b) => json!(b),
            n @ Value::Number(_) => n.clone(),
            Value::String(s) => json!(truncate_string(s)),
            other => json!({"_type": type_name(other)}),
        };
        keys.push(key.clone());
        values.insert(key.clone(), entry);
    }

    let mut result = Map::new();
    result.insert("_type".to_string(), json!("dict"));
    result.insert("_key_count".to_string(), json!(map.len()));
    result.insert("_keys".to_string(), json!(keys));
    if map.len() > MAX_DICT_KEYS {
        result.insert("_keys_truncated".to_string(), json!(true));
    }
    result.insert("_values".to_string(), Value::Object(values));

    Value::Object(result)
}
