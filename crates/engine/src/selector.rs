//! Selector matching: tags, ARN patterns, name patterns.
//!
//! Pattern clauses use *search-from-start* semantics: the regex is anchored
//! at the beginning of the subject but may match any prefix of it, mirroring
//! the behavior selectors were originally written against. Full-match
//! semantics are NOT applied; a pattern that should match the whole subject
//! must end with `$`.

use std::collections::BTreeMap;

use regex::Regex;
use serde_json::Value;
use tracing::warn;

use driftwatch_core::model::{JsonMap, Resource};

use crate::schema::Selector;

impl Selector {
    /// Whether no clauses are present (matches every resource).
    pub fn is_empty(&self) -> bool {
        self.tags.is_none() && self.arn_pattern.is_none() && self.name_pattern.is_none()
    }

    /// Decide whether a resource satisfies this selector.
    ///
    /// All present clauses are AND-ed. An unparseable pattern is a
    /// configuration error: logged at `warn` and treated as a non-match,
    /// never a panic.
    pub fn matches(&self, resource: &Resource) -> bool {
        if let Some(required) = &self.tags {
            let tags = resource_tags(&resource.metadata);
            for (key, value) in required {
                if tags.get(key) != Some(value) {
                    return false;
                }
            }
        }

        if let Some(pattern) = &self.arn_pattern {
            if !prefix_match(pattern, &resource.arn) {
                return false;
            }
        }

        if let Some(pattern) = &self.name_pattern {
            if !prefix_match(pattern, resource.name()) {
                return false;
            }
        }

        true
    }
}

/// Match `pattern` against a prefix of `subject`.
fn prefix_match(pattern: &str, subject: &str) -> bool {
    match Regex::new(&format!(r"\A(?:{})", pattern)) {
        Ok(re) => re.is_match(subject),
        Err(error) => {
            warn!(pattern = %pattern, error = %error, "unparseable selector pattern, treating as non-match");
            false
        }
    }
}

/// Normalize resource tags to a key → value map.
///
/// Tags live under `metadata.Tags` as either a map or a list of
/// `{Key, Value}` pairs (the two shapes cloud inventory APIs produce).
/// Non-string values and malformed entries are dropped.
fn resource_tags(metadata: &JsonMap) -> BTreeMap<String, String> {
    let mut tags = BTreeMap::new();
    match metadata.get("Tags") {
        Some(Value::Object(map)) => {
            for (key, value) in map {
                if let Value::String(s) = value {
                    tags.insert(key.clone(), s.clone());
                }
            }
        }
        Some(Value::Array(items)) => {
            for item in items {
                let key = item.get("Key").and_then(Value::as_str);
                let value = item.get("Value").and_then(Value::as_str);
                if let (Some(key), Some(value)) = (key, value) {
                    tags.insert(key.to_string(), value.to_string());
                }
            }
        }
        _ => {}
    }
    tags
}

// ── Tests ───────────────────────────────────────────────────────────
