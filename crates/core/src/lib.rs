//! Core data model for configuration drift evaluation.
//!
//! This crate provides:
//! - Domain types (Resource, Finding, Conflict) with serde serialization
//! - Dot-notation path addressing over `serde_json::Value` trees
//! - Environment-driven engine configuration
//! - Tracing subscriber setup

pub mod config;
pub mod logging;
pub mod model;
pub mod paths;

pub use config::EngineConfig;
pub use model::*;
