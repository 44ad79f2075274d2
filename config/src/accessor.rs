//! # KeyPath Accessor
//!
//! Low-level get/set/delete/exists/ensure operations on a raw nested mapping
//! given a [`KeyPath`].
//!
//! Traversal policy: a path segment that resolves to a non-mapping value
//! mid-path yields "not found" for reads, never an error. Writes replace any
//! non-mapping value found mid-path with a fresh mapping, since the write
//! must succeed.

use crate::keypath::KeyPath;
use errors::ConfigError;
use serde_json::Value;

/// Arbitrarily deep mapping of string keys to JSON values.
pub type Mapping = serde_json::Map<String, Value>;

/// Traverse to the value at `path`, or `None` if any segment is absent or an
/// intermediate value is not itself a mapping.
pub fn get<'a>(map: &'a Mapping, path: &KeyPath) -> Option<&'a Value> {
    let (leaf, intermediate) = path.segments().split_last()?;
    let mut current = map;
    for segment in intermediate {
        current = current.get(segment)?.as_object()?;
    }
    current.get(leaf)
}

/// Like [`get`], returning `default` for missing paths.
pub fn get_or<'a>(map: &'a Mapping, path: &KeyPath, default: &'a Value) -> &'a Value {
    get(map, path).unwrap_or(default)
}

/// Mutable traversal to the value at `path`.
pub fn get_mut<'a>(map: &'a mut Mapping, path: &KeyPath) -> Option<&'a mut Value> {
    let (leaf, intermediate) = path.segments().split_last()?;
    let mut current = map;
    for segment in intermediate {
        current = current.get_mut(segment)?.as_object_mut()?;
    }
    current.get_mut(leaf)
}

/// True iff every segment resolves without falling off the mapping.
pub fn exists(map: &Mapping, path: &KeyPath) -> bool {
    get(map, path).is_some()
}

/// Assign `value` at `path`, creating intermediate mappings as needed.
///
/// A non-mapping value found mid-path is overwritten with a fresh mapping.
pub fn set(map: &mut Mapping, path: &KeyPath, value: Value) {
    let Some((leaf, intermediate)) = path.segments().split_last() else {
        return;
    };
    let mut current = map;
    for segment in intermediate {
        current = child_mapping(current, segment);
    }
    current.insert(leaf.to_string(), value);
}

/// Remove the leaf key from its parent mapping.
///
/// If the path does not fully resolve, this either no-ops
/// (`ignore_missing = true`) or reports [`ConfigError::PathNotFound`].
pub fn delete(map: &mut Mapping, path: &KeyPath, ignore_missing: bool) -> Result<(), ConfigError> {
    let not_found = || ConfigError::PathNotFound {
        path: path.to_string()
    };

    let Some((leaf, intermediate)) = path.segments().split_last() else {
        return if ignore_missing { Ok(()) } else { Err(not_found()) };
    };

    let mut current = map;
    for segment in intermediate {
        match current.get_mut(segment).and_then(Value::as_object_mut) {
            Some(next) => current = next,
            None => return if ignore_missing { Ok(()) } else { Err(not_found()) }
        }
    }

    match current.remove(leaf) {
        Some(_) => Ok(()),
        None if ignore_missing => Ok(()),
        None => Err(not_found())
    }
}

/// Return the value at `path`, first creating it from `default_factory` if
/// the path does not exist.
pub fn ensure<'a, F>(map: &'a mut Mapping, path: &KeyPath, default_factory: F) -> &'a mut Value
where
    F: FnOnce() -> Value,
{
    if !exists(map, path) {
        set(map, path, default_factory());
    }
    match get_mut(map, path) {
        Some(value) => value,
        None => unreachable!("ensure just wrote the path")
    }
}

fn child_mapping<'a>(map: &'a mut Mapping, segment: &str) -> &'a mut Mapping {
    let entry = map
        .entry(segment.to_string())
        .or_insert_with(|| Value::Object(Mapping::new()));
    if !entry.is_object() {
        *entry = Value::Object(Mapping::new());
    }
    match entry {
        Value::Object(inner) => inner,
        _ => unreachable!("entry was just made an object")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Mapping {
        let value = json!({
            "app": {
                "name": "stratum",
                "limits": { "max_width": 0 }
            },
            "flag": true
        });
        match value {
            Value::Object(map) => map,
            _ => unreachable!()
        }
    }

    fn path(raw: &str) -> KeyPath {
        KeyPath::parse(raw).unwrap()
    }

    #[test]
    fn test_get_nested() {
        let map = sample();
        assert_eq!(get(&map, &path("app.name")), Some(&json!("stratum")));
        assert_eq!(get(&map, &path("app.limits.max_width")), Some(&json!(0)));
    }

    #[test]
    fn test_get_missing_is_none() {
        let map = sample();
        assert_eq!(get(&map, &path("app.missing")), None);
        assert_eq!(get(&map, &path("nope.deeper")), None);
    }

    #[test]
    fn test_get_through_non_mapping_is_none() {
        // Traversal stops and reports absence, not an error.
        let map = sample();
        assert_eq!(get(&map, &path("flag.inner")), None);
        assert_eq!(get(&map, &path("app.name.inner")), None);
    }

    #[test]
    fn test_get_or_default() {
        let map = sample();
        let default = json!("fallback");
        assert_eq!(get_or(&map, &path("nope"), &default), &default);
        assert_eq!(get_or(&map, &path("app.name"), &default), &json!("stratum"));
    }

    #[test]
    fn test_set_creates_intermediates() {
        let mut map = Mapping::new();
        set(&mut map, &path("a.b.c"), json!(42));
        assert_eq!(get(&map, &path("a.b.c")), Some(&json!(42)));
    }

    #[test]
    fn test_set_overwrites_non_mapping_mid_path() {
        let mut map = sample();
        set(&mut map, &path("flag.inner"), json!("x"));
        assert_eq!(get(&map, &path("flag.inner")), Some(&json!("x")));
    }

    #[test]
    fn test_exists() {
        let map = sample();
        assert!(exists(&map, &path("app.limits.max_width")));
        assert!(!exists(&map, &path("app.limits.max_height")));
    }

    #[test]
    fn test_delete_leaf() {
        let mut map = sample();
        delete(&mut map, &path("app.name"), false).unwrap();
        assert!(!exists(&map, &path("app.name")));
        assert!(exists(&map, &path("app.limits")));
    }

    #[test]
    fn test_delete_missing() {
        let mut map = sample();
        assert!(delete(&mut map, &path("app.nope"), true).is_ok());
        assert!(matches!(
            delete(&mut map, &path("app.nope"), false),
            Err(ConfigError::PathNotFound { .. })
        ));
        assert!(matches!(
            delete(&mut map, &path("nope.deeper"), false),
            Err(ConfigError::PathNotFound { .. })
        ));
    }

    #[test]
    fn test_ensure_existing() {
        let mut map = sample();
        let value = ensure(&mut map, &path("app.name"), || json!("other"));
        assert_eq!(value, &json!("stratum"));
    }

    #[test]
    fn test_ensure_creates() {
        let mut map = sample();
        let value = ensure(&mut map, &path("app.retries"), || json!(3));
        assert_eq!(value, &json!(3));
        assert_eq!(get(&map, &path("app.retries")), Some(&json!(3)));
    }
}
