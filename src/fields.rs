//! Alias-priority lookups over loosely-typed JSON records.
//!
//! Upstream payloads name the same field several ways. Each helper takes the
//! aliases in priority order and returns the first one that is present and
//! non-null, the same way a chain of `a ?? b ?? c` would.

use serde_json::Value;
use uuid::Uuid;

/// First present alias, skipping `null`.
pub fn first_present<'a>(record: &'a Value, aliases: &[&str]) -> Option<&'a Value> {
    let map = record.as_object()?;
    aliases
        .iter()
        .filter_map(|alias| map.get(*alias))
        .find(|value| !value.is_null())
}

/// First alias holding a scalar, rendered as a string.
///
/// Numbers and booleans are stringified; arrays and objects are skipped.
pub fn first_string(record: &Value, aliases: &[&str]) -> Option<String> {
    let map = record.as_object()?;
    aliases
        .iter()
        .filter_map(|alias| map.get(*alias))
        .find_map(scalar_to_string)
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Coerce a single value into a vote count.
///
/// Accepts non-negative numbers (fractions are rounded) and numeric strings.
pub fn as_count(value: &Value) -> Option<u64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if n.is_finite() && n >= 0.0 {
        Some(n.round() as u64)
    } else {
        None
    }
}

/// First alias whose value coerces to a count.
pub fn first_count(record: &Value, aliases: &[&str]) -> Option<u64> {
    let map = record.as_object()?;
    aliases
        .iter()
        .filter_map(|alias| map.get(*alias))
        .find_map(as_count)
}

/// First alias holding a finite number.
pub fn first_number(record: &Value, aliases: &[&str]) -> Option<f64> {
    let map = record.as_object()?;
    aliases
        .iter()
        .filter_map(|alias| map.get(*alias))
        .find_map(|v| v.as_f64().filter(|n| n.is_finite()))
}

/// First alias holding a non-empty array.
pub fn first_array<'a>(record: &'a Value, aliases: &[&str]) -> Option<&'a Vec<Value>> {
    let map = record.as_object()?;
    aliases
        .iter()
        .filter_map(|alias| map.get(*alias))
        .filter_map(Value::as_array)
        .find(|items| !items.is_empty())
}

/// Follow a dotted path such as `vote.status`.
pub fn at_path<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(record, |current, key| current.as_object()?.get(key))
        .filter(|value| !value.is_null())
}

/// Items of a list payload: a bare array, or an array under one of `keys`.
pub fn list_items<'a>(payload: &'a Value, keys: &[&str]) -> &'a [Value] {
    if let Some(items) = payload.as_array() {
        return items;
    }
    payload
        .as_object()
        .and_then(|map| keys.iter().filter_map(|k| map.get(*k)).find_map(Value::as_array))
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

pub fn random_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_first_string_priority_and_null_skip() {
        let record = json!({"optionId": null, "id": 7, "_id": "x"});
        assert_eq!(first_string(&record, &["optionId", "id", "_id"]), Some("7".to_string()));
        assert_eq!(first_string(&json!({"text": ""}), &["text", "title"]), Some(String::new()));
        assert_eq!(first_string(&json!({"text": {"en": "x"}}), &["text"]), None);
        assert_eq!(first_string(&json!("not an object"), &["text"]), None);
    }

    #[test]
    fn test_as_count() {
        assert_eq!(as_count(&json!(3)), Some(3));
        assert_eq!(as_count(&json!(2.6)), Some(3));
        assert_eq!(as_count(&json!("4")), Some(4));
        assert_eq!(as_count(&json!(-1)), None);
        assert_eq!(as_count(&json!("many")), None);
        assert_eq!(as_count(&json!({"votes": 1})), None);
    }

    #[test]
    fn test_first_array_skips_empty() {
        let record = json!({"freeTexts": [], "customs": [{"customText": "a"}]});
        let items = first_array(&record, &["freeTexts", "customs"]).unwrap();
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn test_at_path() {
        let record = json!({"vote": {"status": "voted"}});
        assert_eq!(at_path(&record, "vote.status"), Some(&json!("voted")));
        assert_eq!(at_path(&record, "vote.missing"), None);
        assert_eq!(at_path(&json!({"vote": null}), "vote"), None);
    }

    #[test]
    fn test_list_items() {
        assert_eq!(list_items(&json!([1, 2]), &["items"]).len(), 2);
        assert_eq!(list_items(&json!({"options": [1]}), &["items", "options"]).len(), 1);
        assert!(list_items(&json!({"unrelated": true}), &["items"]).is_empty());
        assert!(list_items(&json!(null), &["items"]).is_empty());
    }
}
