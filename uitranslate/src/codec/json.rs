//! Nested JSON ⇄ flat dot-path mapping
//!
//! `{"home": {"title": "Welcome"}}` flattens to `home.title → "Welcome"`.
//! For any tree whose keys contain no literal `.` and whose leaves are not
//! objects, `unflatten(flatten(tree)) == tree`.

use crate::error::CodecError;
use indexmap::IndexMap;
use serde_json::{Map, Value};

/// Separator between path segments in flattened keys
pub const PATH_SEPARATOR: char = '.';

/// Parse resource file content into a JSON tree
pub fn parse(content: &str) -> Result<Value, CodecError> {
    Ok(serde_json::from_str(content)?)
}

/// Flatten a nested JSON object into dot-path keys
///
/// Objects recurse; everything else (strings, numbers, arrays, null) is a leaf.
pub fn flatten(tree: &Value) -> Result<IndexMap<String, Value>, CodecError> {
    let object = tree
        .as_object()
        .ok_or_else(|| CodecError::NotAnObject(value_kind(tree)))?;
    let mut flat = IndexMap::new();
    flatten_into(object, "", &mut flat);
    Ok(flat)
}

fn flatten_into(object: &Map<String, Value>, prefix: &str, flat: &mut IndexMap<String, Value>) {
    for (key, value) in object {
        match value {
            Value::Object(child) => {
                flatten_into(child, &format!("{}{}{}", prefix, key, PATH_SEPARATOR), flat)
            }
            leaf => {
                flat.insert(format!("{}{}", prefix, key), leaf.clone());
            }
        }
    }
}

/// Rebuild a nested JSON object from dot-path keys
///
/// Intermediate objects are created as needed. A path that is used both as a
/// leaf and as a container is rejected.
pub fn unflatten<'a, I>(flat: I) -> Result<Value, CodecError>
where
    I: IntoIterator<Item = (&'a String, &'a Value)>,
{
    let mut root = Map::new();
    for (key, value) in flat {
        let segments: Vec<&str> = key.split(PATH_SEPARATOR).collect();
        let (leaf, parents) = match segments.split_last() {
            Some(split) => split,
            None => continue,
        };

        let mut node = &mut root;
        for (depth, segment) in parents.iter().enumerate() {
            node = match node
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()))
            {
                Value::Object(child) => child,
                _ => return Err(CodecError::PathConflict(parents[..=depth].join("."))),
            };
        }

        if let Some(Value::Object(_)) = node.get(*leaf) {
            return Err(CodecError::PathConflict(key.clone()));
        }
        node.insert(leaf.to_string(), value.clone());
    }
    Ok(Value::Object(root))
}

/// Rebuild a nested JSON object from flattened translations
pub fn unflatten_strings<'a, I>(flat: I) -> Result<Value, CodecError>
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    let values: IndexMap<String, Value> = flat
        .into_iter()
        .map(|(key, text)| (key.clone(), Value::String(text.clone())))
        .collect();
    unflatten(&values)
}

/// Pretty-print a tree as UTF-8 JSON (no ASCII escaping, source key order)
pub fn to_pretty_string(tree: &Value) -> Result<String, CodecError> {
    Ok(serde_json::to_string_pretty(tree)?)
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flatten_nested() {
        let tree = json!({
            "home": {"title": "Welcome", "menu": {"open": "Open"}},
            "footer": "Bye"
        });
        let flat = flatten(&tree).unwrap();
        assert_eq!(
            flat.keys().collect::<Vec<_>>(),
            vec!["home.title", "home.menu.open", "footer"]
        );
        assert_eq!(flat["home.menu.open"], json!("Open"));
    }

    #[test]
    fn test_flatten_keeps_non_string_leaves() {
        let tree = json!({"count": 3, "list": [1, 2], "nothing": null});
        let flat = flatten(&tree).unwrap();
        assert_eq!(flat["count"], json!(3));
        assert_eq!(flat["list"], json!([1, 2]));
        assert_eq!(flat["nothing"], Value::Null);
    }

    #[test]
    fn test_flatten_rejects_non_object_root() {
        let err = flatten(&json!(["a"])).unwrap_err();
        assert!(matches!(err, CodecError::NotAnObject("an array")));
    }

    #[test]
    fn test_round_trip() {
        let tree = json!({
            "auth": {
                "login": {"title": "Sign in", "button": "Go"},
                "logout": "Sign out"
            },
            "errors": {"network": "Offline", "retries": 3},
            "version": "1.0"
        });
        let flat = flatten(&tree).unwrap();
        assert_eq!(unflatten(&flat).unwrap(), tree);
    }

    #[test]
    fn test_round_trip_preserves_key_order() {
        let tree = json!({"z": {"b": "1", "a": "2"}, "y": "3"});
        let rebuilt = unflatten(&flatten(&tree).unwrap()).unwrap();
        assert_eq!(
            to_pretty_string(&rebuilt).unwrap(),
            to_pretty_string(&tree).unwrap()
        );
    }

    #[test]
    fn test_unflatten_path_conflict() {
        let flat: IndexMap<String, Value> = [
            ("a".to_string(), json!("leaf")),
            ("a.b".to_string(), json!("child")),
        ]
        .into_iter()
        .collect();
        let err = unflatten(&flat).unwrap_err();
        assert!(matches!(err, CodecError::PathConflict(path) if path == "a"));
    }

    #[test]
    fn test_unflatten_leaf_over_container_conflict() {
        let flat: IndexMap<String, Value> = [
            ("a.b".to_string(), json!("child")),
            ("a".to_string(), json!("leaf")),
        ]
        .into_iter()
        .collect();
        assert!(matches!(
            unflatten(&flat),
            Err(CodecError::PathConflict(path)) if path == "a"
        ));
    }

    #[test]
    fn test_unflatten_strings() {
        let flat: IndexMap<String, String> = [
            ("home.title".to_string(), "Bienvenue".to_string()),
            ("home.body".to_string(), "Texte".to_string()),
        ]
        .into_iter()
        .collect();
        assert_eq!(
            unflatten_strings(&flat).unwrap(),
            json!({"home": {"title": "Bienvenue", "body": "Texte"}})
        );
    }

    #[test]
    fn test_pretty_string_keeps_unicode() {
        let out = to_pretty_string(&json!({"title": "Добро пожаловать"})).unwrap();
        assert!(out.contains("Добро пожаловать"));
        assert!(!out.contains("\\u"));
    }
}
