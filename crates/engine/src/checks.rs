//! Legacy check evaluators: equals, forbidden-any, forbidden-cidr-port,
//! golden-config.
//!
//! Each evaluator compares an observed value against the rule's expectation
//! and emits a structured finding on violation. Evaluators only fire when
//! the rule's resource type matches and its selector accepts the resource.
//! Malformed check parameters are configuration errors: logged and skipped,
//! never fatal to the batch.

use std::collections::BTreeSet;

use serde_json::{json, Value};
use tracing::warn;

use driftwatch_core::model::{Finding, Resource};
use driftwatch_core::paths::{flatten_values, get_path};

use crate::schema::{CheckKind, Rule};

/// Evaluate a single rule against a resource.
///
/// Returns a finding when the check fails, `None` when the resource is
/// compliant, out of scope for the rule, or the check is misconfigured.
pub fn evaluate_rule(resource: &Resource, rule: &Rule) -> Option<Finding> {
    if !rule.enabled {
        return None;
    }
    if resource.resource_type != rule.resource_type {
        return None;
    }
    if !rule.selector.matches(resource) {
        return None;
    }

    match rule.check.kind {
        CheckKind::Equals => evaluate_equals(resource, rule),
        CheckKind::ForbiddenAny => evaluate_forbidden_any(resource, rule),
        CheckKind::ForbiddenCidrPort => evaluate_forbidden_cidr_port(resource, rule),
        CheckKind::GoldenConfig => evaluate_golden_config(resource, rule),
    }
}

// ── equals ──────────────────────────────────────────────────────────

/// Deep equality of the value at `check.path` against `check.expected`.
fn evaluate_equals(resource: &Resource, rule: &Rule) -> Option<Finding> {
    let observed = get_path(&resource.config, &rule.check.path).unwrap_or(Value::Null);
    let expected = rule.check.expected.clone().unwrap_or(Value::Null);

    if observed != expected {
        return Some(Finding::record(
            &rule.id,
            resource,
            rule.severity,
            &rule.message,
            observed,
            expected,
        ));
    }
    None
}

// ── forbidden-any ───────────────────────────────────────────────────

/// Stringify a value the way forbidden sets are written: string content
/// without JSON quoting, everything else in compact JSON form.
fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Intersection between the (flattened) observed values and the forbidden set.
fn evaluate_forbidden_any(resource: &Resource, rule: &Rule) -> Option<Finding> {
    let observed = get_path(&resource.config, &rule.check.path).unwrap_or(Value::Null);

    let observed_set: BTreeSet<String> = flatten_values(&observed)
        .iter()
        .filter(|v| !v.is_null())
        .map(value_text)
        .collect();
    let forbidden_set: BTreeSet<&str> = rule.check.forbidden.iter().map(String::as_str).collect();

    let violations: Vec<&String> = observed_set
        .iter()
        .filter(|v| forbidden_set.contains(v.as_str()))
        .collect();

    if violations.is_empty() {
        return None;
    }
    Some(Finding::record(
        &rule.id,
        resource,
        rule.severity,
        &rule.message,
        json!(violations),
        json!(format!("None of: {:?}", rule.check.forbidden)),
    ))
}

// ── forbidden-cidr-port ─────────────────────────────────────────────

/// Scan an `IpPermissions`-shaped list for an ingress rule that opens the
/// forbidden port to the forbidden CIDR.
///
/// A permission violates when `FromPort <= port <= ToPort` and one of its
/// `IpRanges` carries an exact `CidrIp` string match. All violating tuples
/// are accumulated into a single finding.
fn evaluate_forbidden_cidr_port(resource: &Resource, rule: &Rule) -> Option<Finding> {
    let permissions = match get_path(&resource.config, &rule.check.path) {
        Some(Value::Array(items)) => items,
        _ => return None,
    };

    let port = rule.check.params.get("port").and_then(Value::as_i64);
    let cidr = rule.check.params.get("cidr").and_then(Value::as_str);
    let (Some(port), Some(cidr)) = (port, cidr) else {
        warn!(rule_id = %rule.id, "forbidden-cidr-port check missing port/cidr params, skipping");
        return None;
    };

    let mut violations = Vec::new();
    for permission in &permissions {
        let from_port = permission.get("FromPort").and_then(Value::as_i64);
        let to_port = permission.get("ToPort").and_then(Value::as_i64);
        let (Some(from_port), Some(to_port)) = (from_port, to_port) else {
            continue;
        };
        if !(from_port <= port && port <= to_port) {
            continue;
        }

        let ranges = permission.get("IpRanges").and_then(Value::as_array);
        for range in ranges.into_iter().flatten() {
            if range.get("CidrIp").and_then(Value::as_str) == Some(cidr) {
                violations.push(json!({
                    "port": port,
                    "cidr": cidr,
                    "from_port": from_port,
                    "to_port": to_port,
                }));
            }
        }
    }

    if violations.is_empty() {
        return None;
    }
    Some(Finding::record(
        &rule.id,
        resource,
        rule.severity,
        &rule.message,
        Value::Array(violations),
        json!(format!("Port {} not open to {}", port, cidr)),
    ))
}

// ── golden-config ───────────────────────────────────────────────────

/// Whole-subtree equality against a golden record.
///
/// Intentionally simplistic (no field-level ignore list); superseded by
/// hierarchical drift evaluation when a configuration store is available.
fn evaluate_golden_config(resource: &Resource, rule: &Rule) -> Option<Finding> {
    let observed = get_path(&resource.config, &rule.check.path).unwrap_or(Value::Null);
    let expected = rule.check.expected.clone().unwrap_or(Value::Null);

    if observed != expected {
        return Some(Finding::record(
            &rule.id,
            resource,
            rule.severity,
            &rule.message,
            observed,
            expected,
        ));
    }
    None
}

// ── Tests ───────────────────────────────────────────────────────────
