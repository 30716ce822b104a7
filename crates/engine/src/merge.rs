//! Priority-ordered configuration merging with conflict detection.
//!
//! Two layers:
//! - [`deep_merge`] — structural recursive merge of two trees, override
//!   winning on non-map values.
//! - [`detect_conflicts`] / [`effective_config`] — leaf-path-wise merge
//!   across an ordered set of sources, recording a [`Conflict`] wherever
//!   more than one distinct value is contributed for the same path.
//!
//! Distinctness during conflict detection compares compact JSON encodings
//! of the contributed values. Numeric representations are NOT coerced
//! (`1` and `1.0` are distinct); changing this requires product sign-off
//! because downstream consumers depend on the existing classification.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use driftwatch_core::model::{
    Conflict, ConflictValue, Difference, JsonMap, RESOLUTION_HIGHEST_PRIORITY,
};
use driftwatch_core::paths::{get_dot_path, leaf_paths, set_dot_path};

// ── Deep merge ──────────────────────────────────────────────────────

/// Recursively merge `overlay` on top of `base` without mutating either.
///
/// A key mapping to a map on both sides is merged recursively; any other
/// overlap (scalars, lists, mixed shapes) is replaced wholesale by the
/// overlay value. Lists are never concatenated or merged element-wise.
pub fn deep_merge(base: &JsonMap, overlay: &JsonMap) -> JsonMap {
    let mut merged = base.clone();
    for (key, value) in overlay {
        let merged_value = match (merged.get(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                Value::Object(deep_merge(existing, incoming))
            }
            _ => value.clone(),
        };
        merged.insert(key.clone(), merged_value);
    }
    merged
}

// ── Conflict detection ──────────────────────────────────────────────

/// One configuration source feeding the merge: the base config or a
/// resource group's override layer.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    /// Provenance label, e.g. `"base:AWS::S3::Bucket"` or `"group:prod"`.
    pub source_id: String,
    /// Higher numeric priority wins on conflicting paths.
    pub priority: i64,
    pub config: JsonMap,
}

/// Merge an ordered collection of sources, recording conflicts.
///
/// For every leaf path defined by any source, the non-null contributions
/// are collected in source iteration order. More than one distinct value
/// records a [`Conflict`] resolved `use_highest_priority`; sources tied on
/// priority resolve last-seen-wins in iteration order. A path with exactly
/// one distinct value (even from several sources) is adopted silently.
pub fn detect_conflicts(sources: &[ConfigSource]) -> (JsonMap, Vec<Conflict>) {
    let mut all_paths = BTreeSet::new();
    for source in sources {
        all_paths.extend(leaf_paths(&source.config));
    }

    let mut merged = JsonMap::new();
    let mut conflicts = Vec::new();

    for path in &all_paths {
        let mut contributions: Vec<ConflictValue> = Vec::new();
        for source in sources {
            let Some(value) = get_dot_path(&source.config, path) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            contributions.push(ConflictValue {
                priority: source.priority,
                value: value.clone(),
                source: source.source_id.clone(),
            });
        }

        let distinct: BTreeSet<String> =
            contributions.iter().map(|c| c.value.to_string()).collect();

        if distinct.len() > 1 {
            // max_by_key returns the last maximum: equal priorities resolve
            // last-seen-wins in source iteration order.
            if let Some(winner) = contributions.iter().max_by_key(|c| c.priority) {
                set_dot_path(&mut merged, path, winner.value.clone());
            }
            conflicts.push(Conflict {
                path: path.clone(),
                values: contributions,
                resolution_strategy: RESOLUTION_HIGHEST_PRIORITY.to_string(),
            });
        } else if let Some(first) = contributions.first() {
            set_dot_path(&mut merged, path, first.value.clone());
        }
    }

    (merged, conflicts)
}

/// Merge all sources, then overwrite each manually adjudicated path.
///
/// Manual resolutions apply unconditionally, whether or not the path was
/// in conflict.
pub fn effective_config(
    sources: &[ConfigSource],
    resolutions: &BTreeMap<String, Value>,
) -> JsonMap {
    let (mut merged, _) = detect_conflicts(sources);
    for (path, value) in resolutions {
        set_dot_path(&mut merged, path, value.clone());
    }
    merged
}

// ── Diffing ─────────────────────────────────────────────────────────

/// Per-path comparison of an observed tree against a desired tree.
///
/// The symmetric union of leaf paths is compared with deep equality; a
/// path missing on one side is represented as null there. Results are
/// sorted by path.
pub fn compare_configs(observed: &JsonMap, desired: &JsonMap) -> Vec<Difference> {
    let mut all_paths: BTreeSet<String> = leaf_paths(observed).into_iter().collect();
    all_paths.extend(leaf_paths(desired));

    let mut differences = Vec::new();
    for path in all_paths {
        let observed_value = get_dot_path(observed, &path).cloned().unwrap_or(Value::Null);
        let expected_value = get_dot_path(desired, &path).cloned().unwrap_or(Value::Null);
        if observed_value != expected_value {
            differences.push(Difference {
                path,
                observed: observed_value,
                expected: expected_value,
            });
        }
    }
    differences
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree(value: Value) -> JsonMap {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn source(id: &str, priority: i64, config: Value) -> ConfigSource {
        ConfigSource {
            source_id: id.to_string(),
            priority,
            config: tree(config),
        }
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn deep_merge_does_not_mutate_inputs() {
        let base = tree(json!({"a": {"b": 1}}));
        let overlay = tree(json!({"a": {"c": 2}}));
        let base_before = base.clone();
        let overlay_before = overlay.clone();

        let merged = deep_merge(&base, &overlay);

        assert_eq!(base, base_before);
        assert_eq!(overlay, overlay_before);
        assert_eq!(merged, tree(json!({"a": {"b": 1, "c": 2}})));
    }

    #[test]
    fn deep_merge_preserves_one_sided_paths() {
        let base = tree(json!({"only_base": 1, "shared": {"base_key": true}}));
        let overlay = tree(json!({"only_overlay": 2, "shared": {"overlay_key": false}}));

        let merged = deep_merge(&base, &overlay);

        assert_eq!(merged["only_base"], json!(1));
        assert_eq!(merged["only_overlay"], json!(2));
        assert_eq!(
            merged["shared"],
            json!({"base_key": true, "overlay_key": false})
        );
    }

    #[test]
    fn deep_merge_replaces_lists_and_scalars_wholesale() {
        let base = tree(json!({"list": [1, 2, 3], "scalar": "old", "map": {"x": 1}}));
        let overlay = tree(json!({"list": [9], "scalar": "new", "map": [1]}));

        let merged = deep_merge(&base, &overlay);

        assert_eq!(merged["list"], json!([9]));
        assert_eq!(merged["scalar"], json!("new"));
        // Map replaced by a list: overlay wins wholesale.
        assert_eq!(merged["map"], json!([1]));
    }

    #[test]
    fn deep_merge_is_idempotent() {
        let config = tree(json!({"a": {"b": [1, 2], "c": {"d": true}}, "e": null}));
        assert_eq!(deep_merge(&config, &config), config);
    }

    // ── detect_conflicts ────────────────────────────────────────────

    #[test]
    fn three_priorities_one_conflict_highest_wins() {
        let sources = vec![
            source("base", 0, json!({"a": {"b": "from-base"}})),
            source("group-10", 10, json!({"a": {"b": "from-10"}})),
            source("group-20", 20, json!({"a": {"b": "from-20"}})),
        ];

        let (merged, conflicts) = detect_conflicts(&sources);

        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].path, "a.b");
        assert_eq!(conflicts[0].resolution_strategy, RESOLUTION_HIGHEST_PRIORITY);
        assert_eq!(conflicts[0].values.len(), 3);
        assert_eq!(get_dot_path(&merged, "a.b"), Some(&json!("from-20")));
    }

    #[test]
    fn agreeing_sources_record_no_conflict() {
        let sources = vec![
            source("base", 0, json!({"a": 1})),
            source("group", 100, json!({"a": 1})),
        ];

        let (merged, conflicts) = detect_conflicts(&sources);

        assert!(conflicts.is_empty());
        assert_eq!(get_dot_path(&merged, "a"), Some(&json!(1)));
    }

    #[test]
    fn equal_priority_tie_break_is_last_seen() {
        let sources = vec![
            source("first", 50, json!({"a": "first"})),
            source("second", 50, json!({"a": "second"})),
        ];

        let (merged, conflicts) = detect_conflicts(&sources);

        assert_eq!(conflicts.len(), 1);
        assert_eq!(get_dot_path(&merged, "a"), Some(&json!("second")));
    }

    #[test]
    fn distinctness_is_by_json_encoding_not_numeric_value() {
        // 1 and 1.0 stringify differently, so they conflict.
        let sources = vec![
            source("int", 0, json!({"a": 1})),
            source("float", 10, json!({"a": 1.0})),
        ];

        let (merged, conflicts) = detect_conflicts(&sources);

        assert_eq!(conflicts.len(), 1);
        assert_eq!(get_dot_path(&merged, "a"), Some(&json!(1.0)));
    }

    #[test]
    fn null_contributions_are_ignored() {
        let sources = vec![
            source("nulled", 100, json!({"a": null})),
            source("set", 0, json!({"a": "value"})),
        ];

        let (merged, conflicts) = detect_conflicts(&sources);

        assert!(conflicts.is_empty());
        assert_eq!(get_dot_path(&merged, "a"), Some(&json!("value")));
    }

    #[test]
    fn disjoint_paths_merge_without_conflicts() {
        let sources = vec![
            source("base", 0, json!({"a": {"x": 1}})),
            source("group", 100, json!({"a": {"y": 2}, "b": 3})),
        ];

        let (merged, conflicts) = detect_conflicts(&sources);

        assert!(conflicts.is_empty());
        assert_eq!(get_dot_path(&merged, "a.x"), Some(&json!(1)));
        assert_eq!(get_dot_path(&merged, "a.y"), Some(&json!(2)));
        assert_eq!(get_dot_path(&merged, "b"), Some(&json!(3)));
    }

    // ── effective_config ────────────────────────────────────────────

    #[test]
    fn manual_resolutions_overwrite_unconditionally() {
        let sources = vec![
            source("base", 0, json!({"a": "base", "b": "untouched"})),
            source("group", 100, json!({"a": "group"})),
        ];
        let mut resolutions = BTreeMap::new();
        resolutions.insert("a".to_string(), json!("adjudicated"));
        resolutions.insert("c".to_string(), json!("added"));

        let effective = effective_config(&sources, &resolutions);

        assert_eq!(get_dot_path(&effective, "a"), Some(&json!("adjudicated")));
        assert_eq!(get_dot_path(&effective, "b"), Some(&json!("untouched")));
        assert_eq!(get_dot_path(&effective, "c"), Some(&json!("added")));
    }

    // ── compare_configs ─────────────────────────────────────────────

    #[test]
    fn identical_trees_produce_no_differences() {
        let config = tree(json!({"a": {"b": [1, 2]}, "c": true}));
        assert!(compare_configs(&config, &config).is_empty());
    }

    #[test]
    fn differing_and_missing_paths_are_reported() {
        let observed = tree(json!({"a": {"b": 1}, "only_observed": true}));
        let desired = tree(json!({"a": {"b": 2}, "only_desired": "x"}));

        let differences = compare_configs(&observed, &desired);

        assert_eq!(differences.len(), 3);
        // Sorted by path.
        assert_eq!(differences[0].path, "a.b");
        assert_eq!(differences[0].observed, json!(1));
        assert_eq!(differences[0].expected, json!(2));
        assert_eq!(differences[1].path, "only_desired");
        assert_eq!(differences[1].observed, Value::Null);
        assert_eq!(differences[1].expected, json!("x"));
        assert_eq!(differences[2].path, "only_observed");
        assert_eq!(differences[2].observed, json!(true));
        assert_eq!(differences[2].expected, Value::Null);
    }

    #[test]
    fn list_valued_leaves_compare_deeply() {
        let observed = tree(json!({"rules": [{"port": 22}]}));
        let desired = tree(json!({"rules": [{"port": 443}]}));

        let differences = compare_configs(&observed, &desired);

        assert_eq!(differences.len(), 1);
        assert_eq!(differences[0].path, "rules");
    }
}
