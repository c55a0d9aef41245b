//! Conversion between JSON subtrees and the flat leaf rows both ledger
//! backends persist.

use serde_json::{Map, Value};
use std::collections::BTreeSet;

use super::path::{unescape_segment, LedgerPath};

/// Splits `value` into `(key, leaf)` rows rooted at `path`.
///
/// `null` and empty objects produce no rows, which is how a subtree is
/// deleted.
pub fn flatten(path: &LedgerPath, value: Value) -> Vec<(String, Value)> {
    let mut rows = Vec::new();
    flatten_into(path, value, &mut rows);
    rows
}

fn flatten_into(path: &LedgerPath, value: Value, rows: &mut Vec<(String, Value)>) {
    match value {
        Value::Null => {}
        Value::Object(map) => {
            for (key, child) in map {
                flatten_into(&path.child(key), child, rows);
            }
        }
        leaf => rows.push((path.key(), leaf)),
    }
}

/// Rebuilds the subtree at `path` from rows whose keys are `path` itself or
/// one of its descendants.
pub fn assemble<'a, I>(path: &LedgerPath, rows: I) -> Option<Value>
where
    I: IntoIterator<Item = (&'a str, &'a Value)>,
{
    let own_key = path.key();
    let prefix = path.descendant_prefix();
    let mut root = Map::new();

    for (key, value) in rows {
        if key == own_key && !path.is_root() {
            return Some(value.clone());
        }
        let Some(relative) = key.strip_prefix(prefix.as_str()) else {
            continue;
        };
        let segments: Vec<&str> = relative.split('/').collect();
        insert(&mut root, &segments, value.clone());
    }

    if root.is_empty() {
        None
    } else {
        Some(Value::Object(root))
    }
}

fn insert(node: &mut Map<String, Value>, segments: &[&str], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };
    let head = unescape_segment(head);
    if rest.is_empty() {
        node.insert(head, value);
        return;
    }
    let entry = node
        .entry(head)
        .or_insert_with(|| Value::Object(Map::new()));
    if !entry.is_object() {
        *entry = Value::Object(Map::new());
    }
    if let Value::Object(child) = entry {
        insert(child, rest, value);
    }
}

/// Immediate child names below `path`, decoded and sorted.
pub fn child_names<'a, I>(path: &LedgerPath, keys: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let prefix = path.descendant_prefix();
    keys.into_iter()
        .filter_map(|key| key.strip_prefix(prefix.as_str()))
        .filter_map(|relative| relative.split('/').next())
        .map(unescape_segment)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flatten_then_assemble_restores_subtree() {
        let path = LedgerPath::root().child("tickets").child("1");
        let value = json!({ "code": "A", "holder": { "name": "Ana" }, "validated": false });

        let rows = flatten(&path, value.clone());
        assert_eq!(rows.len(), 3);

        let rebuilt = assemble(&path, rows.iter().map(|(k, v)| (k.as_str(), v)));
        assert_eq!(rebuilt, Some(value));
    }

    #[test]
    fn test_null_and_empty_objects_have_no_rows() {
        let path = LedgerPath::root().child("x");
        assert!(flatten(&path, Value::Null).is_empty());
        assert!(flatten(&path, json!({ "a": {} })).is_empty());
    }

    #[test]
    fn test_assemble_ignores_siblings_sharing_a_prefix() {
        let path = LedgerPath::root().child("tickets").child("1");
        let rows = vec![
            ("tickets/1/code".to_string(), json!("A")),
            ("tickets/10/code".to_string(), json!("B")),
        ];
        let rebuilt = assemble(&path, rows.iter().map(|(k, v)| (k.as_str(), v)));
        assert_eq!(rebuilt, Some(json!({ "code": "A" })));
    }

    #[test]
    fn test_child_names_are_decoded() {
        let path = LedgerPath::root().child("events");
        let keys = ["events/Rock%2FPop/info/genre", "events/Rock%2FPop/last_ticket_number", "events/Jazz/info/genre"];
        assert_eq!(child_names(&path, keys), vec!["Jazz".to_string(), "Rock/Pop".to_string()]);
    }
}
