//! Desired-configuration schema types with serde deserialization.
//!
//! Defines the document hierarchy the engine evaluates against:
//! - `BaseConfig`: resource-type-wide desired configuration
//! - `ResourceGroup`: selector-scoped override layer with a priority
//! - `Rule`: legacy check-based rule (equals, forbidden-any, ...)
//! - `Document`: tagged container dispatching on `kind`, used by the loader

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use driftwatch_core::model::{JsonMap, Severity};

fn default_true() -> bool {
    true
}

fn default_version() -> String {
    "v1".to_string()
}

fn default_author() -> String {
    "system".to_string()
}

fn default_priority() -> i64 {
    100
}

// ── Selector ────────────────────────────────────────────────────────

/// Predicate deciding whether a resource belongs to a group or rule.
///
/// All present clauses are AND-ed; an empty selector matches everything.
/// Unknown keys in serialized selectors are ignored for forward
/// compatibility. Matching logic lives in the `selector` module.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Selector {
    /// Required tag key → value pairs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeMap<String, String>>,
    /// Regex matched against a prefix of the resource ARN.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arn_pattern: Option<String>,
    /// Regex matched against a prefix of the name derived from the ARN.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_pattern: Option<String>,
}

// ── Base config ─────────────────────────────────────────────────────

/// The resource-type-wide desired configuration.
///
/// At most one active BaseConfig exists per `(resource_type, version)`
/// pair; read-only during evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseConfig {
    pub resource_type: String,
    #[serde(default)]
    pub desired_config: JsonMap,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_true")]
    pub editable: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    #[serde(default = "default_author")]
    pub created_by: String,
}

impl BaseConfig {
    /// Create a base config with default version and audit fields.
    pub fn new(resource_type: impl Into<String>, desired_config: JsonMap) -> Self {
        Self {
            resource_type: resource_type.into(),
            desired_config,
            version: default_version(),
            editable: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            created_by: default_author(),
        }
    }

    /// Identifier recorded on resources this config was applied to.
    pub fn applied_id(&self) -> String {
        format!("{}@{}", self.resource_type, self.version)
    }
}

// ── Resource group ──────────────────────────────────────────────────

/// An override layer applied to resources matching its selector.
///
/// Higher numeric `priority` wins when two groups conflict on a path.
/// A group is only ever applied to resources of its own `resource_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceGroup {
    pub group_id: String,
    pub name: String,
    pub resource_type: String,
    #[serde(default)]
    pub selector: Selector,
    #[serde(default = "default_priority")]
    pub priority: i64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub desired_config: JsonMap,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    #[serde(default = "default_author")]
    pub created_by: String,
}

impl ResourceGroup {
    /// Create a group with default priority and audit fields.
    pub fn new(
        group_id: impl Into<String>,
        name: impl Into<String>,
        resource_type: impl Into<String>,
        selector: Selector,
        desired_config: JsonMap,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            name: name.into(),
            resource_type: resource_type.into(),
            selector,
            priority: default_priority(),
            description: String::new(),
            desired_config,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            created_by: default_author(),
        }
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }
}

// ── Check spec ──────────────────────────────────────────────────────

/// Supported check kinds. The enum is closed: documents carrying an
/// unknown kind fail deserialization and are skipped at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckKind {
    Equals,
    ForbiddenAny,
    ForbiddenCidrPort,
    GoldenConfig,
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckKind::Equals => write!(f, "equals"),
            CheckKind::ForbiddenAny => write!(f, "forbidden-any"),
            CheckKind::ForbiddenCidrPort => write!(f, "forbidden-cidr-port"),
            CheckKind::GoldenConfig => write!(f, "golden-config"),
        }
    }
}

/// Kind plus kind-specific parameters for one check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckSpec {
    #[serde(rename = "type")]
    pub kind: CheckKind,
    /// Dot-notation path into the observed configuration; may use `[*]`.
    #[serde(default)]
    pub path: String,
    /// Expected value for `equals` / `golden-config`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<Value>,
    /// Forbidden value set for `forbidden-any`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub forbidden: Vec<String>,
    /// Extra parameters, e.g. `port` and `cidr` for `forbidden-cidr-port`.
    #[serde(default, skip_serializing_if = "JsonMap::is_empty")]
    pub params: JsonMap,
}

// ── Rule ────────────────────────────────────────────────────────────

/// Legacy check-based rule, kept for non-hierarchical evaluation mode.
/// Immutable once loaded for a given evaluation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub resource_type: String,
    pub check: CheckSpec,
    pub severity: Severity,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub selector: Selector,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

// ── Document (loader container) ─────────────────────────────────────

/// A configuration document of any supported kind, dispatched on the
/// `kind` field by the loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Document {
    Rule(Rule),
    BaseConfig(BaseConfig),
    ResourceGroup(ResourceGroup),
}

impl Document {
    /// Identifier used for duplicate detection and load reporting.
    pub fn id(&self) -> &str {
        match self {
            Document::Rule(rule) => &rule.id,
            Document::BaseConfig(config) => &config.resource_type,
            Document::ResourceGroup(group) => &group.group_id,
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────
