//! Hierarchical configuration resolution and drift evaluation engine.
//!
//! This crate provides:
//! - Desired-configuration schema types (base configs, resource groups, rules)
//! - Selector matching (tags, ARN patterns, name patterns)
//! - Priority-ordered deep merge with conflict detection
//! - Check evaluators (equals, forbidden-any, forbidden-cidr-port, golden-config)
//! - Drift scoring and the batch evaluation orchestrator
//! - Abstract store/source/sink collaborators with an in-memory implementation
//! - A filesystem loader for YAML configuration documents

pub mod checks;
pub mod error;
pub mod evaluator;
pub mod loader;
pub mod merge;
pub mod schema;
pub mod score;
pub mod selector;
pub mod store;

pub use error::{EngineError, Result};
pub use evaluator::{
    CancellationHandle, EvaluationMode, Evaluator, RunOptions, RunOutcome, RunSummary,
};
pub use schema::{BaseConfig, CheckKind, CheckSpec, ResourceGroup, Rule, Selector};
