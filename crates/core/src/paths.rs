//! Dot-notation path addressing over configuration value trees.
//!
//! Paths are dot-separated segments (`"a.b.c"`). A segment suffixed with
//! `[*]` expands the addressed list: the remainder of the path is applied
//! to every element, producing a list of per-element results. Wildcards
//! nest by reapplying the remaining path inside each element.
//!
//! Lookups never fail: a missing key, a map access on a non-map, or `[*]`
//! on a non-list all yield `None`.

use serde_json::Value;

use crate::model::JsonMap;

// ── Lookup ──────────────────────────────────────────────────────────

/// Get the value at `path` inside a configuration tree.
///
/// An empty path returns the whole tree. List wildcard segments return a
/// `Value::Array` of per-element results, with elements missing the
/// remaining path represented as null.
pub fn get_path(map: &JsonMap, path: &str) -> Option<Value> {
    if path.is_empty() {
        return Some(Value::Object(map.clone()));
    }
    let parts: Vec<&str> = path.split('.').collect();
    let (first, rest) = parts.split_first()?;
    if let Some(key) = first.strip_suffix("[*]") {
        expand_wildcard(map.get(key)?, rest)
    } else {
        let next = map.get(*first)?;
        get_parts(next, rest)
    }
}

fn get_parts(current: &Value, parts: &[&str]) -> Option<Value> {
    let Some((first, rest)) = parts.split_first() else {
        return Some(current.clone());
    };
    if let Some(key) = first.strip_suffix("[*]") {
        expand_wildcard(current.as_object()?.get(key)?, rest)
    } else {
        let next = current.as_object()?.get(*first)?;
        get_parts(next, rest)
    }
}

fn expand_wildcard(list: &Value, rest: &[&str]) -> Option<Value> {
    let items = list.as_array()?;
    if rest.is_empty() {
        return Some(Value::Array(items.clone()));
    }
    Some(Value::Array(
        items
            .iter()
            .map(|item| get_parts(item, rest).unwrap_or(Value::Null))
            .collect(),
    ))
}

/// Plain dot-path lookup without wildcard support, returning a reference.
///
/// Used by the merge engine and differ where paths come from
/// [`leaf_paths`] and never contain `[*]`.
pub fn get_dot_path<'a>(map: &'a JsonMap, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = map.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

// ── Mutation ────────────────────────────────────────────────────────

/// Set the value at `path`, auto-creating intermediate map levels.
///
/// An intermediate that exists but is not a map is replaced by one.
pub fn set_dot_path(map: &mut JsonMap, path: &str, value: Value) {
    let mut parts: Vec<&str> = path.split('.').collect();
    let Some(last) = parts.pop() else {
        return;
    };
    let mut current = map;
    for part in parts {
        let slot = current
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(JsonMap::new()));
        if !slot.is_object() {
            *slot = Value::Object(JsonMap::new());
        }
        current = match slot.as_object_mut() {
            Some(inner) => inner,
            None => return,
        };
    }
    current.insert(last.to_string(), value);
}

// ── Enumeration ─────────────────────────────────────────────────────

/// Depth-first enumeration of dot-joined paths to every non-map leaf.
///
/// Lists and scalars are leaves; only maps are descended into. This is the
/// set of meaningfully comparable paths when diffing two trees.
pub fn leaf_paths(map: &JsonMap) -> Vec<String> {
    let mut paths = Vec::new();
    walk_leaves(map, "", &mut paths);
    paths
}

fn walk_leaves(map: &JsonMap, prefix: &str, out: &mut Vec<String>) {
    for (key, value) in map {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        match value {
            Value::Object(inner) => walk_leaves(inner, &path, out),
            _ => out.push(path),
        }
    }
}

// ── Flattening ──────────────────────────────────────────────────────

/// Recursively flatten nested lists into a single flat list of values.
///
/// A scalar becomes a one-element list; null becomes an empty list.
pub fn flatten_values(value: &Value) -> Vec<Value> {
    match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items.iter().flat_map(flatten_values).collect(),
        other => vec![other.clone()],
    }
}

// ── Tests ───────────────────────────────────────────────────────────
