//! Path reads and writes on nested JSON values.
//!
//! Reads never fail: a path that does not exist reads as `None`. Writes
//! create missing intermediate containers (an array when the next key
//! addresses an index, an object otherwise) and replace primitives
//! standing in the way.

use crate::error::{Result, WatchError};
use crate::types::{Key, KeyPath};
use serde_json::{Map, Value};

/// Borrow the value at `path`, if it exists.
pub fn get_at<'a>(root: &'a Value, path: &KeyPath) -> Option<&'a Value> {
    path.keys()
        .iter()
        .try_fold(root, |value, key| child(value, key))
}

/// Copy of the value at `path`, if it exists.
pub fn slice(root: &Value, path: &KeyPath) -> Option<Value> {
    get_at(root, path).cloned()
}

fn child<'a>(value: &'a Value, key: &Key) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(&key.as_field()),
        Value::Array(items) => key.as_index().and_then(|i| items.get(i)),
        _ => None,
    }
}

/// Check that `path` can be written into `root` without destroying data.
///
/// The only conflict is a non-index field key landing on an existing array.
pub fn check_writable(root: &Value, path: &KeyPath) -> Result<()> {
    let mut current = Some(root);

    for (depth, key) in path.keys().iter().enumerate() {
        let Some(value) = current else {
            // Everything below a missing node is created fresh.
            return Ok(());
        };
        match value {
            Value::Array(items) => match key.as_index() {
                Some(i) => current = items.get(i),
                None => {
                    return Err(WatchError::PathConflict {
                        path: KeyPath::from(&path.keys()[..=depth]),
                        reason: format!("field `{}` on an array", key.as_field()),
                    })
                }
            },
            Value::Object(map) => current = map.get(&key.as_field()),
            _ => return Ok(()),
        }
    }
    Ok(())
}

/// Write `value` at `path`, returning the value it replaced.
///
/// Validates first, so a conflicting write leaves `root` untouched.
pub fn set_at(root: &mut Value, path: &KeyPath, value: Value) -> Result<Option<Value>> {
    check_writable(root, path)?;
    set_from(root, path, 0, value)
}

fn set_from(target: &mut Value, path: &KeyPath, depth: usize, value: Value) -> Result<Option<Value>> {
    let keys = path.keys();
    let Some(key) = keys.get(depth) else {
        return Ok(Some(std::mem::replace(target, value)));
    };
    let next = keys.get(depth + 1);

    if !target.is_object() && !target.is_array() {
        *target = empty_container_for(key);
    }

    match target {
        Value::Array(items) => {
            let Some(index) = key.as_index() else {
                return Err(WatchError::PathConflict {
                    path: KeyPath::from(&keys[..=depth]),
                    reason: format!("field `{}` on an array", key.as_field()),
                });
            };
            if index >= items.len() {
                items.resize(index + 1, Value::Null);
                match next {
                    None => {
                        items[index] = value;
                        return Ok(None);
                    }
                    Some(next) => items[index] = empty_container_for(next),
                }
            }
            set_from(&mut items[index], path, depth + 1, value)
        }
        Value::Object(map) => {
            let field = key.as_field();
            let Some(next) = next else {
                return Ok(map.insert(field, value));
            };
            let slot = map
                .entry(field)
                .or_insert_with(|| empty_container_for(next));
            set_from(slot, path, depth + 1, value)
        }
        _ => Ok(None),
    }
}

/// Keys that compare equal create the same shape: `"0"` makes an array
/// just like `0`.
fn empty_container_for(key: &Key) -> Value {
    match key.as_index() {
        Some(_) => Value::Array(Vec::new()),
        None => Value::Object(Map::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path;
    use serde_json::json;

    #[test]
    fn test_get_nested() {
        let root = json!({"a": {"b": [10, {"c": true}]}});

        assert_eq!(get_at(&root, &path!["a", "b", 0]), Some(&json!(10)));
        assert_eq!(get_at(&root, &path!["a", "b", "1", "c"]), Some(&json!(true)));
        assert_eq!(get_at(&root, &path![]), Some(&root));
        assert_eq!(get_at(&root, &path!["a", "missing"]), None);
        assert_eq!(get_at(&root, &path!["a", "b", 0, "x"]), None);
    }

    #[test]
    fn test_index_key_on_object_uses_field_name() {
        let root = json!({"1": "one"});
        assert_eq!(slice(&root, &path![1]), Some(json!("one")));
    }

    #[test]
    fn test_set_creates_intermediates() {
        let mut root = json!({});

        set_at(&mut root, &path!["a", "b", "c"], json!(1)).unwrap();
        set_at(&mut root, &path!["list", 2], json!("x")).unwrap();
        set_at(&mut root, &path!["grid", 1, "cell"], json!(5)).unwrap();

        assert_eq!(
            root,
            json!({
                "a": {"b": {"c": 1}},
                "list": [null, null, "x"],
                "grid": [null, {"cell": 5}],
            })
        );
    }

    #[test]
    fn test_numeric_field_creates_same_shape_as_index() {
        let mut by_field = json!({});
        let mut by_index = json!({});

        set_at(&mut by_field, &path!["list", "0", "x"], json!(1)).unwrap();
        set_at(&mut by_index, &path!["list", 0, "x"], json!(1)).unwrap();

        assert_eq!(by_field, json!({"list": [{"x": 1}]}));
        assert_eq!(by_field, by_index);
    }

    #[test]
    fn test_set_returns_previous() {
        let mut root = json!({"a": {"b": 1}});

        let previous = set_at(&mut root, &path!["a", "b"], json!(2)).unwrap();
        assert_eq!(previous, Some(json!(1)));

        let previous = set_at(&mut root, &path!["a", "new"], json!(3)).unwrap();
        assert_eq!(previous, None);
    }

    #[test]
    fn test_set_replaces_primitive_in_the_way() {
        let mut root = json!({"a": 5});
        set_at(&mut root, &path!["a", "b"], json!(1)).unwrap();
        assert_eq!(root, json!({"a": {"b": 1}}));
    }

    #[test]
    fn test_set_root() {
        let mut root = json!({"a": 1});
        let previous = set_at(&mut root, &path![], json!([1, 2])).unwrap();
        assert_eq!(previous, Some(json!({"a": 1})));
        assert_eq!(root, json!([1, 2]));
    }

    #[test]
    fn test_field_on_array_conflicts_without_mutation() {
        let mut root = json!({"list": [1, 2]});

        let result = set_at(&mut root, &path!["list", "name"], json!("x"));

        match result {
            Err(WatchError::PathConflict { path, .. }) => assert_eq!(path, path!["list", "name"]),
            other => panic!("Expected PathConflict, got {:?}", other),
        }
        assert_eq!(root, json!({"list": [1, 2]}));
    }
}
