//! Container lifecycle and self-healing orchestrator
//!
//! This crate provides the core functionality for:
//! - Typed, validated configuration
//! - A client for a remote container engine API
//! - Idempotent, dependency-ordered container deployment
//! - A poll loop with tiered, budgeted recovery workflows
//! - Health snapshots, alert rules and remedial actions
//! - Health checks and observability

pub mod config;
pub mod engine;
pub mod error;
pub mod health;
pub mod lifecycle;
pub mod manager;
pub mod models;
pub mod monitor;
pub mod notify;
pub mod observability;
pub mod orchestrator;

#[cfg(test)]
mod testing;

pub use config::{LoadOptions, WardenConfig};
pub use error::{EngineError, Result, WardenError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{OrchestratorMetrics, StructuredLogger};
pub use orchestrator::{Orchestrator, StatusReport, ValidationReport};
