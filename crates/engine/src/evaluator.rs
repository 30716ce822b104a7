//! Batch evaluation orchestrator.
//!
//! For each resource in a run: resolve the applicable base config, resolve
//! matching groups sorted by priority, merge, compare, score, and emit a
//! finding when drift is detected. Evaluation is read-mostly and
//! parallelizable: resources are evaluated concurrently on a bounded
//! worker pool, with base config and group lookups funneled through a
//! per-run, per-resource-type cache.
//!
//! Two mutually exclusive modes per run:
//! - [`EvaluationMode::Hierarchical`] — base config + group overrides,
//!   drift scoring (the primary path).
//! - [`EvaluationMode::RuleSet`] — legacy check-based rules.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use driftwatch_core::config::EngineConfig;
use driftwatch_core::model::{ComplianceStatus, Finding, JsonMap, Resource};

use crate::checks::evaluate_rule;
use crate::error::Result;
use crate::merge::{compare_configs, deep_merge, detect_conflicts, ConfigSource};
use crate::schema::{BaseConfig, ResourceGroup, Rule};
use crate::score::{drift_score, drift_severity};
use crate::store::{ConfigStore, FindingSink, ResourceSource};

/// Synthetic rule identifier carried by drift-based findings.
pub const HIERARCHICAL_RULE_ID: &str = "hierarchical-config";

// ── Run options ─────────────────────────────────────────────────────

/// Which evaluation path a run uses. Modes are never mixed within a
/// single resource's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationMode {
    Hierarchical,
    RuleSet,
}

/// Per-run parameters.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub tenant_id: String,
    pub snapshot_key: String,
    pub scan_id: String,
    pub mode: EvaluationMode,
    /// Maximum resources evaluated concurrently.
    pub max_concurrency: usize,
}

impl RunOptions {
    /// Hierarchical-mode options with default concurrency.
    pub fn hierarchical(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            snapshot_key: String::new(),
            scan_id: String::new(),
            mode: EvaluationMode::Hierarchical,
            max_concurrency: 8,
        }
    }

    /// Legacy rule-set-mode options with default concurrency.
    pub fn rule_set(tenant_id: impl Into<String>) -> Self {
        Self {
            mode: EvaluationMode::RuleSet,
            ..Self::hierarchical(tenant_id)
        }
    }

    pub fn with_snapshot_key(mut self, snapshot_key: impl Into<String>) -> Self {
        self.snapshot_key = snapshot_key.into();
        self
    }

    pub fn with_scan_id(mut self, scan_id: impl Into<String>) -> Self {
        self.scan_id = scan_id.into();
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    /// Apply engine-level defaults from configuration.
    pub fn with_engine_config(mut self, config: &EngineConfig) -> Self {
        self.max_concurrency = config.max_concurrency;
        self
    }
}

// ── Run summary ─────────────────────────────────────────────────────

/// Aggregate counters for one run.
///
/// `lookup_errors`, `eval_errors`, and `skipped` distinguish an
/// under-reported (incomplete) result set from a complete clean one.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    /// Resources supplied to the run.
    pub resources: usize,
    /// Resources that reached a COMPLIANT or NON_COMPLIANT verdict.
    pub evaluated: usize,
    pub compliant: usize,
    pub non_compliant: usize,
    pub not_evaluated: usize,
    /// Resources dropped because the run was cancelled before they started.
    pub skipped: usize,
    pub findings: usize,
    /// Configuration store failures (affected resources are NOT_EVALUATED).
    pub lookup_errors: usize,
    /// Worker failures (affected resources produce no result at all).
    pub eval_errors: usize,
    pub cancelled: bool,
    pub duration_ms: u64,
}

/// Everything a run produces: updated resources, findings, counters.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub resources: Vec<Resource>,
    pub findings: Vec<Finding>,
    pub summary: RunSummary,
}

// ── Cancellation ────────────────────────────────────────────────────

/// Handle for aborting a run between resources.
///
/// Cancellation is cooperative: in-flight resources complete, unstarted
/// ones are skipped. Partially evaluated resources are never emitted.
#[derive(Clone, Default)]
pub struct CancellationHandle(Arc<AtomicBool>);

impl CancellationHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ── Per-run cache ───────────────────────────────────────────────────

/// Per-resource-type cache populated once per run.
///
/// Base configs and groups are read-only for the duration of a run, so
/// the first fetch per type is authoritative. Failed fetches are not
/// cached; the store call is retryable on the next resource of the type.
#[derive(Default)]
struct RunCache {
    base_configs: Mutex<HashMap<String, Option<BaseConfig>>>,
    groups: Mutex<HashMap<String, Vec<ResourceGroup>>>,
}

impl RunCache {
    async fn base_config(
        &self,
        store: &dyn ConfigStore,
        resource_type: &str,
    ) -> Result<Option<BaseConfig>> {
        let mut guard = self.base_configs.lock().await;
        if let Some(cached) = guard.get(resource_type) {
            return Ok(cached.clone());
        }
        let fetched = store.base_config(resource_type).await?;
        guard.insert(resource_type.to_string(), fetched.clone());
        Ok(fetched)
    }

    async fn groups(
        &self,
        store: &dyn ConfigStore,
        resource_type: &str,
    ) -> Result<Vec<ResourceGroup>> {
        let mut guard = self.groups.lock().await;
        if let Some(cached) = guard.get(resource_type) {
            return Ok(cached.clone());
        }
        let fetched = store.groups_for_type(resource_type).await?;
        guard.insert(resource_type.to_string(), fetched.clone());
        Ok(fetched)
    }
}

// ── Worker result ───────────────────────────────────────────────────

struct WorkerResult {
    resource: Resource,
    findings: Vec<Finding>,
    lookup_failed: bool,
    skipped: bool,
}

impl WorkerResult {
    fn evaluated(resource: Resource, findings: Vec<Finding>) -> Self {
        Self {
            resource,
            findings,
            lookup_failed: false,
            skipped: false,
        }
    }

    fn skipped(resource: Resource) -> Self {
        Self {
            resource,
            findings: Vec::new(),
            lookup_failed: false,
            skipped: true,
        }
    }
}

fn mark_not_evaluated(mut resource: Resource, lookup_failed: bool) -> WorkerResult {
    resource.compliance_status = ComplianceStatus::NotEvaluated;
    resource.last_evaluated = Some(Utc::now());
    WorkerResult {
        resource,
        findings: Vec::new(),
        lookup_failed,
        skipped: false,
    }
}

// ── Evaluator ───────────────────────────────────────────────────────

/// Runs batch evaluations against an explicit store handle.
///
/// Holds no global state: caching is scoped to each run, and the store is
/// whatever the embedding process passes in.
pub struct Evaluator {
    store: Arc<dyn ConfigStore>,
    options: RunOptions,
    cancellation: CancellationHandle,
}

impl Evaluator {
    pub fn new(store: Arc<dyn ConfigStore>, options: RunOptions) -> Self {
        Self {
            store,
            options,
            cancellation: CancellationHandle::default(),
        }
    }

    /// Handle for aborting this evaluator's runs between resources.
    pub fn cancellation_handle(&self) -> CancellationHandle {
        self.cancellation.clone()
    }

    /// Evaluate a snapshot of resources.
    ///
    /// Never fails as a whole: store and worker errors degrade individual
    /// resources and are surfaced through the summary counters.
    pub async fn run(&self, resources: Vec<Resource>) -> RunOutcome {
        let started = Instant::now();
        let mut summary = RunSummary {
            resources: resources.len(),
            ..RunSummary::default()
        };
        info!(
            mode = ?self.options.mode,
            tenant_id = %self.options.tenant_id,
            resources = resources.len(),
            "starting evaluation run"
        );

        // Legacy rules are fetched once per run, not per resource.
        let rules: Option<Arc<Vec<Rule>>> = match self.options.mode {
            EvaluationMode::RuleSet => match self.store.rules(&self.options.tenant_id).await {
                Ok(rules) => Some(Arc::new(rules)),
                Err(e) => {
                    error!(
                        tenant_id = %self.options.tenant_id,
                        error = %e,
                        "rule lookup failed, marking run NOT_EVALUATED"
                    );
                    return self.not_evaluated_outcome(resources, summary, started);
                }
            },
            EvaluationMode::Hierarchical => None,
        };

        let cache = Arc::new(RunCache::default());
        let semaphore = Arc::new(Semaphore::new(self.options.max_concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for mut resource in resources {
            self.stamp_run_ids(&mut resource);
            let store = Arc::clone(&self.store);
            let cache = Arc::clone(&cache);
            let semaphore = Arc::clone(&semaphore);
            let cancellation = self.cancellation.clone();
            let rules = rules.clone();
            let mode = self.options.mode;

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                if cancellation.is_cancelled() {
                    return WorkerResult::skipped(resource);
                }
                match mode {
                    EvaluationMode::Hierarchical => {
                        evaluate_hierarchical(store.as_ref(), cache.as_ref(), resource).await
                    }
                    EvaluationMode::RuleSet => {
                        let rules = rules.as_deref().map(Vec::as_slice).unwrap_or(&[]);
                        evaluate_rule_set(resource, rules)
                    }
                }
            });
        }

        let mut out_resources = Vec::with_capacity(summary.resources);
        let mut findings = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => {
                    if result.skipped {
                        summary.skipped += 1;
                        continue;
                    }
                    match result.resource.compliance_status {
                        ComplianceStatus::Compliant => summary.compliant += 1,
                        ComplianceStatus::NonCompliant => summary.non_compliant += 1,
                        ComplianceStatus::NotEvaluated => summary.not_evaluated += 1,
                    }
                    if result.lookup_failed {
                        summary.lookup_errors += 1;
                    }
                    findings.extend(result.findings);
                    out_resources.push(result.resource);
                }
                Err(e) => {
                    error!(error = %e, "evaluation worker failed");
                    summary.eval_errors += 1;
                }
            }
        }

        out_resources.sort_by(|a, b| a.arn.cmp(&b.arn));
        findings.sort_by(|a, b| a.resource_arn.cmp(&b.resource_arn));

        summary.evaluated = summary.compliant + summary.non_compliant;
        summary.findings = findings.len();
        summary.cancelled = self.cancellation.is_cancelled();
        summary.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            evaluated = summary.evaluated,
            compliant = summary.compliant,
            non_compliant = summary.non_compliant,
            not_evaluated = summary.not_evaluated,
            findings = summary.findings,
            lookup_errors = summary.lookup_errors,
            eval_errors = summary.eval_errors,
            duration_ms = summary.duration_ms,
            "evaluation run complete"
        );

        RunOutcome {
            resources: out_resources,
            findings,
            summary,
        }
    }

    /// Pull resources from a source, evaluate, push results to a sink.
    pub async fn execute(
        &self,
        source: &dyn ResourceSource,
        sink: &dyn FindingSink,
    ) -> Result<RunOutcome> {
        let resources = source.collect().await?;
        let outcome = self.run(resources).await;
        sink.persist(&outcome.resources, &outcome.findings).await?;
        Ok(outcome)
    }

    fn stamp_run_ids(&self, resource: &mut Resource) {
        if !self.options.tenant_id.is_empty() {
            resource.tenant_id = self.options.tenant_id.clone();
        }
        if !self.options.snapshot_key.is_empty() {
            resource.snapshot_key = self.options.snapshot_key.clone();
        }
        if !self.options.scan_id.is_empty() {
            resource.scan_id = self.options.scan_id.clone();
        }
    }

    fn not_evaluated_outcome(
        &self,
        mut resources: Vec<Resource>,
        mut summary: RunSummary,
        started: Instant,
    ) -> RunOutcome {
        let now = Utc::now();
        for resource in &mut resources {
            self.stamp_run_ids(resource);
            resource.compliance_status = ComplianceStatus::NotEvaluated;
            resource.last_evaluated = Some(now);
        }
        summary.not_evaluated = resources.len();
        summary.lookup_errors = resources.len();
        summary.duration_ms = started.elapsed().as_millis() as u64;
        RunOutcome {
            resources,
            findings: Vec::new(),
            summary,
        }
    }
}

// ── Hierarchical evaluation ─────────────────────────────────────────

/// Evaluate one resource against its effective desired configuration.
async fn evaluate_hierarchical(
    store: &dyn ConfigStore,
    cache: &RunCache,
    mut resource: Resource,
) -> WorkerResult {
    let base = match cache.base_config(store, &resource.resource_type).await {
        Ok(base) => base,
        Err(e) => {
            warn!(
                arn = %resource.arn,
                resource_type = %resource.resource_type,
                error = %e,
                "base config lookup failed"
            );
            return mark_not_evaluated(resource, true);
        }
    };
    // Absence of a base policy is not itself a violation, even when groups
    // would match.
    let Some(base) = base else {
        return mark_not_evaluated(resource, false);
    };

    let groups = match cache.groups(store, &resource.resource_type).await {
        Ok(groups) => groups,
        Err(e) => {
            warn!(
                arn = %resource.arn,
                resource_type = %resource.resource_type,
                error = %e,
                "group lookup failed"
            );
            return mark_not_evaluated(resource, true);
        }
    };
    let mut matching: Vec<ResourceGroup> = groups
        .into_iter()
        .filter(|g| g.selector.matches(&resource))
        .collect();
    // Ascending sort: each merge overwrites the previous layer, so the
    // highest-priority group's values win on overlapping paths.
    matching.sort_by_key(|g| g.priority);

    let mut effective = base.desired_config.clone();
    for group in &matching {
        effective = deep_merge(&effective, &group.desired_config);
    }

    resource.base_config_applied = Some(base.applied_id());
    resource.groups_applied = matching.iter().map(|g| g.name.clone()).collect();
    resource.desired_config = effective.clone();

    let differences = compare_configs(&resource.config, &effective);
    resource.last_evaluated = Some(Utc::now());

    if differences.is_empty() {
        resource.compliance_status = ComplianceStatus::Compliant;
        resource.drift_score = 0.0;
        resource.findings_count = 0;
        return WorkerResult::evaluated(resource, Vec::new());
    }

    let mut sources = Vec::with_capacity(matching.len() + 1);
    sources.push(ConfigSource {
        source_id: format!("base:{}", base.resource_type),
        priority: 0,
        config: base.desired_config.clone(),
    });
    for group in &matching {
        sources.push(ConfigSource {
            source_id: format!("group:{}", group.name),
            priority: group.priority,
            config: group.desired_config.clone(),
        });
    }
    let (_, conflicts) = detect_conflicts(&sources);

    let count = differences.len();
    let score = drift_score(count);
    resource.compliance_status = ComplianceStatus::NonCompliant;
    resource.drift_score = score;
    resource.findings_count = 1;

    let mut finding = Finding::record(
        HIERARCHICAL_RULE_ID,
        &resource,
        drift_severity(count),
        format!(
            "Configuration drift detected: {} difference(s) from desired configuration",
            count
        ),
        Value::Object(resource.config.clone()),
        Value::Object(effective),
    );
    finding.differences = differences;
    finding.metadata = drift_metadata(&resource, count, score, conflicts.len());

    info!(
        arn = %resource.arn,
        differences = count,
        drift_score = score,
        "configuration drift detected"
    );
    WorkerResult::evaluated(resource, vec![finding])
}

fn drift_metadata(resource: &Resource, count: usize, score: f64, conflict_count: usize) -> JsonMap {
    let mut metadata = JsonMap::new();
    metadata.insert(
        "base_config_applied".to_string(),
        json!(resource.base_config_applied),
    );
    metadata.insert("groups_applied".to_string(), json!(resource.groups_applied));
    metadata.insert("difference_count".to_string(), json!(count));
    metadata.insert("drift_score".to_string(), json!(score));
    metadata.insert("conflict_count".to_string(), json!(conflict_count));
    metadata
}

// ── Legacy rule-set evaluation ──────────────────────────────────────

/// Evaluate one resource against the run's rule set.
fn evaluate_rule_set(mut resource: Resource, rules: &[Rule]) -> WorkerResult {
    let mut findings = Vec::new();
    for rule in rules {
        if let Some(finding) = evaluate_rule(&resource, rule) {
            info!(rule_id = %rule.id, arn = %resource.arn, "rule violation");
            findings.push(finding);
        }
    }

    resource.findings_count = findings.len() as u32;
    resource.compliance_status = if findings.is_empty() {
        ComplianceStatus::Compliant
    } else {
        ComplianceStatus::NonCompliant
    };
    resource.last_evaluated = Some(Utc::now());
    WorkerResult::evaluated(resource, findings)
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    use driftwatch_core::model::Severity;

    use crate::error::EngineError;
    use crate::schema::{CheckKind, CheckSpec, Selector};
    use crate::store::MemoryStore;

    fn tree(value: Value) -> JsonMap {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn bucket(arn: &str, config: Value) -> Resource {
        Resource::new(arn, "AWS::S3::Bucket", tree(config), "us-east-1", "123456789012")
    }

    fn store_with_base(desired: Value) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.upsert_base_config(BaseConfig::new("AWS::S3::Bucket", tree(desired)));
        store
    }

    #[tokio::test]
    async fn compliant_resource_produces_no_finding() {
        let store = store_with_base(json!({"Versioning": {"Status": "Enabled"}}));
        let evaluator = Evaluator::new(store, RunOptions::hierarchical("t1"));

        let outcome = evaluator
            .run(vec![bucket("arn:aws:s3:::b/one", json!({"Versioning": {"Status": "Enabled"}}))])
            .await;

        assert!(outcome.findings.is_empty());
        let resource = &outcome.resources[0];
        assert_eq!(resource.compliance_status, ComplianceStatus::Compliant);
        assert_eq!(resource.drift_score, 0.0);
        assert!(resource.last_evaluated.is_some());
        assert_eq!(resource.base_config_applied.as_deref(), Some("AWS::S3::Bucket@v1"));
        assert_eq!(outcome.summary.compliant, 1);
        assert_eq!(outcome.summary.evaluated, 1);
    }

    #[tokio::test]
    async fn drifted_resource_produces_one_finding() {
        let store = store_with_base(json!({"Versioning": {"Status": "Enabled"}}));
        let evaluator = Evaluator::new(
            store,
            RunOptions::hierarchical("t1").with_snapshot_key("snap-1"),
        );

        let outcome = evaluator
            .run(vec![bucket("arn:aws:s3:::b/one", json!({"Versioning": {"Status": "Suspended"}}))])
            .await;

        assert_eq!(outcome.findings.len(), 1);
        let finding = &outcome.findings[0];
        assert_eq!(finding.rule_id, HIERARCHICAL_RULE_ID);
        assert_eq!(finding.severity, Severity::Low);
        assert_eq!(finding.tenant_id, "t1");
        assert_eq!(finding.snapshot_key, "snap-1");
        assert_eq!(finding.differences.len(), 1);
        assert_eq!(finding.differences[0].path, "Versioning.Status");
        assert_eq!(finding.metadata["difference_count"], json!(1));
        assert_eq!(finding.metadata["conflict_count"], json!(0));

        let resource = &outcome.resources[0];
        assert_eq!(resource.compliance_status, ComplianceStatus::NonCompliant);
        assert_eq!(resource.drift_score, 0.1);
        assert_eq!(resource.findings_count, 1);
    }

    #[tokio::test]
    async fn no_base_config_means_not_evaluated_despite_groups() {
        let store = Arc::new(MemoryStore::new());
        store.upsert_group(ResourceGroup::new(
            "g1",
            "everything",
            "AWS::S3::Bucket",
            Selector::default(),
            tree(json!({"Versioning": {"Status": "Enabled"}})),
        ));
        let evaluator = Evaluator::new(store, RunOptions::hierarchical("t1"));

        let outcome = evaluator
            .run(vec![bucket("arn:aws:s3:::b/one", json!({}))])
            .await;

        assert!(outcome.findings.is_empty());
        let resource = &outcome.resources[0];
        assert_eq!(resource.compliance_status, ComplianceStatus::NotEvaluated);
        assert!(resource.last_evaluated.is_some());
        assert!(resource.groups_applied.is_empty());
        assert_eq!(outcome.summary.not_evaluated, 1);
        assert_eq!(outcome.summary.lookup_errors, 0);
    }

    #[tokio::test]
    async fn groups_merge_in_ascending_priority_order() {
        let store = store_with_base(json!({"Logging": {"Enabled": false}}));
        store.upsert_group(
            ResourceGroup::new(
                "g-low",
                "low",
                "AWS::S3::Bucket",
                Selector::default(),
                tree(json!({"Logging": {"Enabled": true, "Target": "low-bucket"}})),
            )
            .with_priority(10),
        );
        store.upsert_group(
            ResourceGroup::new(
                "g-high",
                "high",
                "AWS::S3::Bucket",
                Selector::default(),
                tree(json!({"Logging": {"Target": "high-bucket"}})),
            )
            .with_priority(20),
        );
        let evaluator = Evaluator::new(store, RunOptions::hierarchical("t1"));

        let outcome = evaluator
            .run(vec![bucket("arn:aws:s3:::b/one", json!({}))])
            .await;

        let resource = &outcome.resources[0];
        assert_eq!(resource.groups_applied, vec!["low", "high"]);
        // Highest priority wins on the overlapping path; the lower group's
        // non-overlapping value survives.
        assert_eq!(
            resource.desired_config["Logging"],
            json!({"Enabled": true, "Target": "high-bucket"})
        );
    }

    #[tokio::test]
    async fn non_matching_group_is_not_applied() {
        let store = store_with_base(json!({"A": 1}));
        store.upsert_group(ResourceGroup::new(
            "g1",
            "prod-only",
            "AWS::S3::Bucket",
            Selector {
                tags: Some([("Environment".to_string(), "production".to_string())].into_iter().collect()),
                ..Selector::default()
            },
            tree(json!({"A": 2})),
        ));
        let evaluator = Evaluator::new(store, RunOptions::hierarchical("t1"));

        let outcome = evaluator
            .run(vec![bucket("arn:aws:s3:::b/untagged", json!({"A": 1}))])
            .await;

        let resource = &outcome.resources[0];
        assert!(resource.groups_applied.is_empty());
        assert_eq!(resource.compliance_status, ComplianceStatus::Compliant);
    }

    #[tokio::test]
    async fn cancelled_run_skips_unstarted_resources() {
        let store = store_with_base(json!({"A": 1}));
        let evaluator = Evaluator::new(store, RunOptions::hierarchical("t1"));
        evaluator.cancellation_handle().cancel();

        let outcome = evaluator
            .run(vec![
                bucket("arn:aws:s3:::b/one", json!({})),
                bucket("arn:aws:s3:::b/two", json!({})),
            ])
            .await;

        assert!(outcome.resources.is_empty());
        assert!(outcome.findings.is_empty());
        assert_eq!(outcome.summary.skipped, 2);
        assert!(outcome.summary.cancelled);
    }

    #[tokio::test]
    async fn run_options_pick_up_engine_config() {
        let mut config = EngineConfig::default();
        config.max_concurrency = 2;
        let options = RunOptions::hierarchical("t1").with_engine_config(&config);
        assert_eq!(options.max_concurrency, 2);

        let store = store_with_base(json!({"A": 1}));
        let evaluator = Evaluator::new(store, options);
        let outcome = evaluator
            .run(vec![
                bucket("arn:aws:s3:::b/one", json!({"A": 1})),
                bucket("arn:aws:s3:::b/two", json!({"A": 1})),
                bucket("arn:aws:s3:::b/three", json!({"A": 1})),
            ])
            .await;
        assert_eq!(outcome.summary.compliant, 3);
    }

    #[tokio::test]
    async fn rule_set_mode_emits_findings_per_rule() {
        let store = Arc::new(MemoryStore::new());
        store.set_rules(
            "t1",
            vec![Rule {
                id: "versioning-on".to_string(),
                resource_type: "AWS::S3::Bucket".to_string(),
                check: CheckSpec {
                    kind: CheckKind::Equals,
                    path: "Versioning.Status".to_string(),
                    expected: Some(json!("Enabled")),
                    forbidden: Vec::new(),
                    params: JsonMap::new(),
                },
                severity: Severity::Medium,
                message: "versioning must be enabled".to_string(),
                selector: Selector::default(),
                enabled: true,
            }],
        );
        let evaluator = Evaluator::new(store, RunOptions::rule_set("t1"));

        let outcome = evaluator
            .run(vec![
                bucket("arn:aws:s3:::b/bad", json!({"Versioning": {"Status": "Suspended"}})),
                bucket("arn:aws:s3:::b/good", json!({"Versioning": {"Status": "Enabled"}})),
            ])
            .await;

        assert_eq!(outcome.findings.len(), 1);
        assert_eq!(outcome.findings[0].rule_id, "versioning-on");
        assert_eq!(outcome.summary.compliant, 1);
        assert_eq!(outcome.summary.non_compliant, 1);
    }

    // ── Failing store ───────────────────────────────────────────────

    struct FailingStore;

    #[async_trait]
    impl ConfigStore for FailingStore {
        async fn base_config(&self, _resource_type: &str) -> Result<Option<BaseConfig>> {
            Err(EngineError::Store("connection refused".to_string()))
        }

        async fn groups_for_type(&self, _resource_type: &str) -> Result<Vec<ResourceGroup>> {
            Err(EngineError::Store("connection refused".to_string()))
        }

        async fn rules(&self, _tenant_id: &str) -> Result<Vec<Rule>> {
            Err(EngineError::Store("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn store_failure_marks_resource_not_evaluated() {
        let evaluator = Evaluator::new(Arc::new(FailingStore), RunOptions::hierarchical("t1"));

        let outcome = evaluator
            .run(vec![bucket("arn:aws:s3:::b/one", json!({}))])
            .await;

        assert!(outcome.findings.is_empty());
        assert_eq!(outcome.resources[0].compliance_status, ComplianceStatus::NotEvaluated);
        assert_eq!(outcome.summary.lookup_errors, 1);
        assert_eq!(outcome.summary.not_evaluated, 1);
    }

    #[tokio::test]
    async fn rule_lookup_failure_degrades_whole_run() {
        let evaluator = Evaluator::new(Arc::new(FailingStore), RunOptions::rule_set("t1"));

        let outcome = evaluator
            .run(vec![
                bucket("arn:aws:s3:::b/one", json!({})),
                bucket("arn:aws:s3:::b/two", json!({})),
            ])
            .await;

        assert!(outcome.findings.is_empty());
        assert_eq!(outcome.summary.not_evaluated, 2);
        assert_eq!(outcome.summary.lookup_errors, 2);
        for resource in &outcome.resources {
            assert_eq!(resource.compliance_status, ComplianceStatus::NotEvaluated);
        }
    }

    #[tokio::test]
    async fn execute_persists_through_sink() {
        let store = store_with_base(json!({"Versioning": {"Status": "Enabled"}}));
        store.set_resources(vec![bucket(
            "arn:aws:s3:::b/drifted",
            json!({"Versioning": {"Status": "Suspended"}}),
        )]);
        let evaluator = Evaluator::new(store.clone(), RunOptions::hierarchical("t1"));

        let outcome = evaluator
            .execute(store.as_ref(), store.as_ref())
            .await
            .unwrap();

        assert_eq!(outcome.findings.len(), 1);
        assert_eq!(store.persisted_findings().len(), 1);
        assert_eq!(store.persisted_resources().len(), 1);
        assert_eq!(
            store.persisted_resources()[0].compliance_status,
            ComplianceStatus::NonCompliant
        );
    }
}
