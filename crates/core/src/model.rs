//! Domain types for resources, findings, and merge conflicts.
//!
//! Configuration trees are dynamic, schema-less nested maps. They are
//! represented as `serde_json` values: `Value` is the tagged union
//! (Null | Bool | Number | String | Array | Object) and [`JsonMap`] is the
//! object form used wherever a tree root is known to be a mapping.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A configuration tree root: string keys to arbitrarily nested values.
pub type JsonMap = serde_json::Map<String, Value>;

// ── Compliance status ───────────────────────────────────────────────

/// Evaluation outcome for a single resource within one scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComplianceStatus {
    /// No desired configuration was available, or the lookup failed.
    NotEvaluated,
    /// Observed configuration matches the effective desired configuration.
    Compliant,
    /// At least one path differs from the effective desired configuration.
    NonCompliant,
}

impl Default for ComplianceStatus {
    fn default() -> Self {
        ComplianceStatus::NotEvaluated
    }
}

impl fmt::Display for ComplianceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComplianceStatus::NotEvaluated => write!(f, "NOT_EVALUATED"),
            ComplianceStatus::Compliant => write!(f, "COMPLIANT"),
            ComplianceStatus::NonCompliant => write!(f, "NON_COMPLIANT"),
        }
    }
}

impl FromStr for ComplianceStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "NOT_EVALUATED" => Ok(ComplianceStatus::NotEvaluated),
            "COMPLIANT" => Ok(ComplianceStatus::Compliant),
            "NON_COMPLIANT" => Ok(ComplianceStatus::NonCompliant),
            other => Err(format!("unknown compliance status: '{}'", other)),
        }
    }
}

// ── Severity ────────────────────────────────────────────────────────

/// Finding severity, ordered from least to most severe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "LOW"),
            Severity::Medium => write!(f, "MEDIUM"),
            Severity::High => write!(f, "HIGH"),
            Severity::Critical => write!(f, "CRITICAL"),
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LOW" => Ok(Severity::Low),
            "MEDIUM" => Ok(Severity::Medium),
            "HIGH" => Ok(Severity::High),
            "CRITICAL" => Ok(Severity::Critical),
            other => Err(format!("unknown severity: '{}'", other)),
        }
    }
}

// ── Finding status ──────────────────────────────────────────────────

/// Workflow state of a finding. The engine only ever emits `Open`;
/// transitions are performed by an external triage workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FindingStatus {
    Open,
    Acknowledged,
    Resolved,
}

impl Default for FindingStatus {
    fn default() -> Self {
        FindingStatus::Open
    }
}

// ── Resource ────────────────────────────────────────────────────────

/// A normalized cloud resource with compliance tracking fields.
///
/// Created once per scan by the collection step, mutated in place by the
/// evaluation orchestrator, then persisted. Never mutated after evaluation
/// completes for that scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub arn: String,
    /// Namespaced type string, e.g. `"AWS::S3::Bucket"`.
    pub resource_type: String,
    /// Observed configuration tree.
    #[serde(default)]
    pub config: JsonMap,
    pub region: String,
    pub account_id: String,
    /// Free-form metadata; tags live under the `Tags` key as either a map
    /// or a list of `{Key, Value}` pairs.
    #[serde(default)]
    pub metadata: JsonMap,

    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub compliance_status: ComplianceStatus,
    /// Normalized drift score in `[0.0, 1.0]`.
    #[serde(default)]
    pub drift_score: f64,
    #[serde(default)]
    pub findings_count: u32,
    #[serde(default)]
    pub last_evaluated: Option<DateTime<Utc>>,

    /// Identifier of the base config version used, e.g. `"AWS::S3::Bucket@v1"`.
    #[serde(default)]
    pub base_config_applied: Option<String>,
    /// Names of the groups that contributed, in merge order.
    #[serde(default)]
    pub groups_applied: Vec<String>,
    /// The computed effective desired configuration.
    #[serde(default)]
    pub desired_config: JsonMap,

    #[serde(default)]
    pub snapshot_key: String,
    #[serde(default)]
    pub scan_id: String,
}

impl Resource {
    /// Create a resource in its pre-evaluation state.
    pub fn new(
        arn: impl Into<String>,
        resource_type: impl Into<String>,
        config: JsonMap,
        region: impl Into<String>,
        account_id: impl Into<String>,
    ) -> Self {
        Self {
            arn: arn.into(),
            resource_type: resource_type.into(),
            config,
            region: region.into(),
            account_id: account_id.into(),
            metadata: JsonMap::new(),
            tenant_id: String::new(),
            compliance_status: ComplianceStatus::NotEvaluated,
            drift_score: 0.0,
            findings_count: 0,
            last_evaluated: None,
            base_config_applied: None,
            groups_applied: Vec::new(),
            desired_config: JsonMap::new(),
            snapshot_key: String::new(),
            scan_id: String::new(),
        }
    }

    /// The resource name derived from the ARN: the substring after the last
    /// `/` if present, else after the last `:`.
    pub fn name(&self) -> &str {
        if let Some(idx) = self.arn.rfind('/') {
            &self.arn[idx + 1..]
        } else if let Some(idx) = self.arn.rfind(':') {
            &self.arn[idx + 1..]
        } else {
            &self.arn
        }
    }
}

// ── Difference ──────────────────────────────────────────────────────

/// One per-path discrepancy between observed and desired configuration.
/// A side on which the path is missing is reported as null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Difference {
    pub path: String,
    pub observed: Value,
    pub expected: Value,
}

// ── Finding ─────────────────────────────────────────────────────────

/// One detected violation. Created exactly once per violation per
/// evaluation pass; immutable after the engine hands it to the sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub finding_id: String,
    pub tenant_id: String,
    /// Rule that fired, or the synthetic `"hierarchical-config"` identifier
    /// for drift-based findings.
    pub rule_id: String,
    pub resource_arn: String,
    pub resource_type: String,
    pub severity: Severity,
    #[serde(default)]
    pub status: FindingStatus,
    pub message: String,
    pub observed: Value,
    pub expected: Value,
    /// Per-path discrepancies (hierarchical mode only).
    #[serde(default)]
    pub differences: Vec<Difference>,
    pub timestamp: DateTime<Utc>,
    pub account_id: String,
    pub region: String,
    pub category: String,
    #[serde(default)]
    pub snapshot_key: String,
    /// Merge provenance: contributing base/groups, conflict count.
    #[serde(default)]
    pub metadata: JsonMap,
}

impl Finding {
    /// Record a new finding against a resource with a fresh id and timestamp.
    pub fn record(
        rule_id: impl Into<String>,
        resource: &Resource,
        severity: Severity,
        message: impl Into<String>,
        observed: Value,
        expected: Value,
    ) -> Self {
        Self {
            finding_id: Uuid::new_v4().to_string(),
            tenant_id: resource.tenant_id.clone(),
            rule_id: rule_id.into(),
            resource_arn: resource.arn.clone(),
            resource_type: resource.resource_type.clone(),
            severity,
            status: FindingStatus::Open,
            message: message.into(),
            observed,
            expected,
            differences: Vec::new(),
            timestamp: Utc::now(),
            account_id: resource.account_id.clone(),
            region: resource.region.clone(),
            category: "compliance".to_string(),
            snapshot_key: resource.snapshot_key.clone(),
            metadata: JsonMap::new(),
        }
    }
}

// ── Conflict ────────────────────────────────────────────────────────

/// Default resolution strategy applied when sources disagree on a path.
pub const RESOLUTION_HIGHEST_PRIORITY: &str = "use_highest_priority";

/// One value contributed to a conflicting path by a single source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictValue {
    pub priority: i64,
    pub value: Value,
    pub source: String,
}

/// A configuration path where two or more sources disagree.
///
/// Ephemeral: produced during merge, carried into finding metadata as a
/// count, never persisted as a first-class entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub path: String,
    /// Contributions in source iteration order.
    pub values: Vec<ConflictValue>,
    pub resolution_strategy: String,
}

// ── Tests ───────────────────────────────────────────────────────────
