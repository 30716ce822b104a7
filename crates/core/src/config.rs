//! Engine configuration from environment variables.

use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Engine config ───────────────────────────────────────────────────

/// Runtime knobs for the evaluation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum number of resources evaluated concurrently per run.
    pub max_concurrency: usize,
    /// Tenant used when the caller does not supply one.
    pub default_tenant: String,
    /// Directory scanned by the document loader.
    pub rules_dir: PathBuf,
}

impl EngineConfig {
    /// Build config from environment variables (call `load_dotenv()` first).
    pub fn from_env() -> Self {
        Self {
            max_concurrency: env_usize("DRIFTWATCH_MAX_CONCURRENCY", 8),
            default_tenant: env_or("DRIFTWATCH_TENANT", "default"),
            rules_dir: PathBuf::from(env_or("DRIFTWATCH_RULES_DIR", "data/rules")),
        }
    }

    /// Log a startup summary.
    pub fn log_summary(&self) {
        tracing::info!(
            max_concurrency = self.max_concurrency,
            default_tenant = %self.default_tenant,
            rules_dir = %self.rules_dir.display(),
            "engine config loaded"
        );
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            default_tenant: "default".to_string(),
            rules_dir: PathBuf::from("data/rules"),
        }
    }
}
