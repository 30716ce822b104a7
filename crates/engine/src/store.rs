//! Abstract collaborators consumed by the engine, plus an in-memory
//! implementation for tests and embedders.
//!
//! The engine never talks to a network or database itself: base configs,
//! resource groups, and rules come from a [`ConfigStore`]; the resources
//! for one run come from a [`ResourceSource`]; evaluated resources and
//! findings go to a [`FindingSink`]. Store calls are treated as possibly
//! latent and retryable by the caller.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use driftwatch_core::model::{Finding, Resource};

use crate::error::Result;
use crate::schema::{BaseConfig, ResourceGroup, Rule};

// ── Traits ──────────────────────────────────────────────────────────

/// Read-only source of desired-configuration data for one evaluation run.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// The active base config for a resource type, if any.
    async fn base_config(&self, resource_type: &str) -> Result<Option<BaseConfig>>;

    /// All groups declared for a resource type. The caller applies the
    /// selector matcher; this is a type-level fetch only.
    async fn groups_for_type(&self, resource_type: &str) -> Result<Vec<ResourceGroup>>;

    /// Legacy-mode rule set for a tenant.
    async fn rules(&self, tenant_id: &str) -> Result<Vec<Rule>>;
}

/// Supplies the point-in-time resource snapshot for one evaluation run.
#[async_trait]
pub trait ResourceSource: Send + Sync {
    async fn collect(&self) -> Result<Vec<Resource>>;
}

/// Accepts evaluated resources and emitted findings for persistence.
#[async_trait]
pub trait FindingSink: Send + Sync {
    async fn persist(&self, resources: &[Resource], findings: &[Finding]) -> Result<()>;
}

// ── In-memory implementation ────────────────────────────────────────

/// In-memory store backing all three collaborator traits.
///
/// Thread-safe via `std::sync::RwLock`; usable from async contexts since
/// no lock is held across an await point. Base config upserts keep the
/// one-active-config-per-resource-type invariant: writing a new version
/// for a type replaces the previous one.
#[derive(Default)]
pub struct MemoryStore {
    base_configs: RwLock<HashMap<String, BaseConfig>>,
    groups: RwLock<HashMap<String, ResourceGroup>>,
    rules: RwLock<HashMap<String, Vec<Rule>>>,
    resources: RwLock<Vec<Resource>>,
    persisted: RwLock<Persisted>,
}

#[derive(Default)]
struct Persisted {
    resources: Vec<Resource>,
    findings: Vec<Finding>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the active base config for its resource type.
    pub fn upsert_base_config(&self, config: BaseConfig) {
        let mut guard = self.base_configs.write().expect("store lock poisoned");
        guard.insert(config.resource_type.clone(), config);
    }

    /// Insert or replace a group by `group_id`.
    pub fn upsert_group(&self, group: ResourceGroup) {
        let mut guard = self.groups.write().expect("store lock poisoned");
        guard.insert(group.group_id.clone(), group);
    }

    /// Remove a group by id, returning whether it existed.
    pub fn delete_group(&self, group_id: &str) -> bool {
        let mut guard = self.groups.write().expect("store lock poisoned");
        guard.remove(group_id).is_some()
    }

    /// Replace the rule set for a tenant.
    pub fn set_rules(&self, tenant_id: impl Into<String>, rules: Vec<Rule>) {
        let mut guard = self.rules.write().expect("store lock poisoned");
        guard.insert(tenant_id.into(), rules);
    }

    /// Replace the resource snapshot served by [`ResourceSource::collect`].
    pub fn set_resources(&self, resources: Vec<Resource>) {
        let mut guard = self.resources.write().expect("store lock poisoned");
        *guard = resources;
    }

    /// Resources handed to the sink by the last persisted run.
    pub fn persisted_resources(&self) -> Vec<Resource> {
        self.persisted.read().expect("store lock poisoned").resources.clone()
    }

    /// Findings handed to the sink by the last persisted run.
    pub fn persisted_findings(&self) -> Vec<Finding> {
        self.persisted.read().expect("store lock poisoned").findings.clone()
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn base_config(&self, resource_type: &str) -> Result<Option<BaseConfig>> {
        let guard = self.base_configs.read().expect("store lock poisoned");
        Ok(guard.get(resource_type).cloned())
    }

    async fn groups_for_type(&self, resource_type: &str) -> Result<Vec<ResourceGroup>> {
        let guard = self.groups.read().expect("store lock poisoned");
        Ok(guard
            .values()
            .filter(|g| g.resource_type == resource_type)
            .cloned()
            .collect())
    }

    async fn rules(&self, tenant_id: &str) -> Result<Vec<Rule>> {
        let guard = self.rules.read().expect("store lock poisoned");
        Ok(guard.get(tenant_id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl ResourceSource for MemoryStore {
    async fn collect(&self) -> Result<Vec<Resource>> {
        Ok(self.resources.read().expect("store lock poisoned").clone())
    }
}

#[async_trait]
impl FindingSink for MemoryStore {
    async fn persist(&self, resources: &[Resource], findings: &[Finding]) -> Result<()> {
        let mut guard = self.persisted.write().expect("store lock poisoned");
        guard.resources = resources.to_vec();
        guard.findings = findings.to_vec();
        Ok(())
    }
}

// ── Tests ───────────────────────────────────────────────────────────
