//! Filesystem loader for YAML configuration documents.
//!
//! Reads a directory of `*.yml` / `*.yaml` files, each containing one
//! tagged document (`kind: Rule | BaseConfig | ResourceGroup`). Bad files
//! never abort the scan: dotfiles and non-YAML are skipped, parse and
//! validation failures are recorded per file, and everything that loads
//! cleanly is returned.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::Result;
use crate::schema::{BaseConfig, Document, ResourceGroup, Rule};

// ── Load results ────────────────────────────────────────────────────

/// Outcome of loading a single document file.
#[derive(Debug)]
pub struct LoadResult {
    /// Path to the file that was loaded.
    pub path: PathBuf,
    /// Status of the load attempt.
    pub status: LoadStatus,
}

/// Status of a single file load attempt.
#[derive(Debug)]
pub enum LoadStatus {
    /// Document was successfully loaded.
    Loaded { document_id: String },
    /// File was skipped (dotfile, non-YAML extension).
    Skipped { reason: String },
    /// Parse or validation error occurred.
    Failed { error: String },
}

/// Everything a directory scan produced.
#[derive(Debug, Default)]
pub struct LoadedDocuments {
    pub rules: Vec<Rule>,
    pub base_configs: Vec<BaseConfig>,
    pub groups: Vec<ResourceGroup>,
    /// Per-file outcomes, in directory order.
    pub results: Vec<LoadResult>,
}

impl LoadedDocuments {
    /// Number of files that failed to parse or validate.
    pub fn failed_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.status, LoadStatus::Failed { .. }))
            .count()
    }
}

// ── Loader ──────────────────────────────────────────────────────────

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yml") | Some("yaml")
    )
}

fn is_dotfile(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}

/// Load all documents from a directory.
///
/// Files are visited in name order for deterministic results. A rule ID
/// seen twice is a validation error on the later file. Only an unreadable
/// directory fails the call as a whole.
pub fn load_documents(dir: &Path) -> Result<LoadedDocuments> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    entries.sort();

    let mut loaded = LoadedDocuments::default();
    let mut seen_rule_ids: HashSet<String> = HashSet::new();

    for path in entries {
        let status = load_file(&path, &mut loaded, &mut seen_rule_ids);
        if let LoadStatus::Failed { ref error } = status {
            warn!(path = %path.display(), error = %error, "document failed to load");
        }
        loaded.results.push(LoadResult { path, status });
    }

    info!(
        dir = %dir.display(),
        rules = loaded.rules.len(),
        base_configs = loaded.base_configs.len(),
        groups = loaded.groups.len(),
        failed = loaded.failed_count(),
        "document directory loaded"
    );
    Ok(loaded)
}

fn load_file(
    path: &Path,
    loaded: &mut LoadedDocuments,
    seen_rule_ids: &mut HashSet<String>,
) -> LoadStatus {
    if is_dotfile(path) {
        return LoadStatus::Skipped {
            reason: "dotfile".to_string(),
        };
    }
    if !is_yaml(path) {
        return LoadStatus::Skipped {
            reason: "not a YAML file".to_string(),
        };
    }

    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            return LoadStatus::Failed {
                error: e.to_string(),
            }
        }
    };

    let document: Document = match serde_yaml::from_str(&contents) {
        Ok(document) => document,
        Err(e) => {
            return LoadStatus::Failed {
                error: e.to_string(),
            }
        }
    };

    let document_id = document.id().to_string();
    match document {
        Document::Rule(rule) => {
            if !seen_rule_ids.insert(rule.id.clone()) {
                return LoadStatus::Failed {
                    error: format!("duplicate rule id: '{}'", rule.id),
                };
            }
            loaded.rules.push(rule);
        }
        Document::BaseConfig(config) => loaded.base_configs.push(config),
        Document::ResourceGroup(group) => loaded.groups.push(group),
    }

    LoadStatus::Loaded { document_id }
}

// ── Tests ───────────────────────────────────────────────────────────
