//! Container engine API
//!
//! This module provides:
//! - The `ContainerEngine` trait the rest of the orchestrator talks to
//! - An HTTP client for an endpoint-scoped container management API
//! - Create-payload normalization from `ContainerSpec`
//!
//! Every operation returns `EngineResult`; transport failures, non-success
//! statuses and malformed bodies all come back as `EngineError`.

mod client;
mod payload;

pub use client::{EngineClient, MAX_API_VERSION, MIN_API_VERSION};
pub use payload::build_create_payload;

use crate::config::RegistryCredentials;
use crate::error::EngineError;
use crate::models::{ContainerSpec, ContainerState};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub type EngineResult<T> = Result<T, EngineError>;

/// Operations the orchestrator needs from a container engine
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// List containers; `all` includes stopped ones
    async fn list_containers(&self, all: bool) -> EngineResult<Vec<ContainerSummary>>;

    async fn inspect_container(&self, id: &str) -> EngineResult<ContainerDetails>;

    /// Create (but not start) a container from a spec
    async fn create_container(&self, spec: &ContainerSpec) -> EngineResult<CreatedContainer>;

    async fn start_container(&self, id: &str) -> EngineResult<()>;

    async fn stop_container(&self, id: &str, timeout: Duration) -> EngineResult<()>;

    async fn restart_container(&self, id: &str, timeout: Duration) -> EngineResult<()>;

    /// Remove a container; a missing container is not an error
    async fn remove_container(&self, id: &str, force: bool) -> EngineResult<()>;

    /// Last `tail` lines of combined stdout/stderr
    async fn container_logs(&self, id: &str, tail: usize) -> EngineResult<String>;

    async fn pull_image(
        &self,
        image: &str,
        auth: Option<&RegistryCredentials>,
    ) -> EngineResult<()>;

    /// Create a bridge network; an existing network is not an error
    async fn create_network(&self, name: &str) -> EngineResult<()>;

    /// Remove a network; a missing network is not an error
    async fn remove_network(&self, name: &str) -> EngineResult<()>;

    /// Engine version info, also used as a connectivity check
    async fn version(&self) -> EngineResult<EngineVersion>;
}

/// Entry from the container list
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerSummary {
    pub id: String,
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub image: String,
    /// Missing on old engine versions; derived from `status` then
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub status: String,
}

impl ContainerSummary {
    /// Whether one of the container's names matches (engines prefix names with `/`)
    pub fn has_name(&self, name: &str) -> bool {
        self.names
            .iter()
            .any(|n| n.trim_start_matches('/') == name)
    }

    pub fn container_state(&self) -> ContainerState {
        if !self.state.is_empty() {
            return ContainerState::from_engine(&self.state);
        }
        if self.status.starts_with("Up") {
            if self.status.contains("(Paused)") {
                ContainerState::Paused
            } else {
                ContainerState::Running
            }
        } else {
            ContainerState::Exited
        }
    }
}

/// Result of inspecting one container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerDetails {
    pub id: String,
    pub name: String,
    pub state: ContainerState,
    pub status: String,
    pub exit_code: Option<i64>,
    pub started_at: Option<String>,
    pub restart_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedContainer {
    pub id: String,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineVersion {
    pub api_version: String,
    pub version: String,
    pub os: Option<String>,
}
