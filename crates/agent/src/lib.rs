//! Stack Warden agent
//!
//! Long-running host for the orchestrator: runs the poll loop and the
//! health monitor, and serves health, readiness, metrics and status over
//! HTTP.

pub mod api;
pub mod config;
