//! Core data models for the orchestrator

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role a container plays in the stack; also fixes the deployment order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Database,
    Cache,
    App,
}

impl Role {
    /// Dependency order: database, then cache, then application
    pub const ORDER: [Role; 3] = [Role::Database, Role::Cache, Role::App];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Database => "database",
            Role::Cache => "cache",
            Role::App => "app",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Restart policy handed to the engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestartPolicy {
    No,
    Always,
    #[default]
    UnlessStopped,
    OnFailure,
}

impl RestartPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RestartPolicy::No => "no",
            RestartPolicy::Always => "always",
            RestartPolicy::UnlessStopped => "unless-stopped",
            RestartPolicy::OnFailure => "on-failure",
        }
    }
}

/// Declarative description of one container
///
/// Identity is `name`. Ports use `[ip:]host:container[/proto]` or a bare
/// port, env entries are `KEY=VALUE`, volumes are `source:target[:mode]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerSpec {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub ports: Vec<String>,
    #[serde(default)]
    pub env: Vec<String>,
    #[serde(default)]
    pub volumes: Vec<String>,
    #[serde(default)]
    pub restart_policy: RestartPolicy,
    /// Network to attach to; filled from the stack network when empty
    #[serde(default)]
    pub network: String,
}

impl ContainerSpec {
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            ports: Vec::new(),
            env: Vec::new(),
            volumes: Vec::new(),
            restart_policy: RestartPolicy::default(),
            network: String::new(),
        }
    }

    /// Parsed port mappings
    pub fn port_mappings(&self) -> Result<Vec<PortMapping>, String> {
        self.ports.iter().map(|p| PortMapping::parse(p)).collect()
    }

    /// First published host port, used for infra reachability checks
    pub fn primary_host_port(&self) -> Option<u16> {
        self.port_mappings()
            .ok()
            .and_then(|ports| ports.first().map(|p| p.host_port))
    }
}

/// A single host-to-container port binding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    pub host_ip: Option<String>,
    pub host_port: u16,
    pub container_port: u16,
    pub protocol: String,
}

impl PortMapping {
    /// Parse `8080`, `8080:80`, `8080:80/udp` or `127.0.0.1:8080:80`
    pub fn parse(raw: &str) -> Result<Self, String> {
        let raw = raw.trim();
        let (ports, protocol) = match raw.split_once('/') {
            Some((ports, proto)) => (ports, proto.to_lowercase()),
            None => (raw, "tcp".to_string()),
        };
        if protocol != "tcp" && protocol != "udp" && protocol != "sctp" {
            return Err(format!("unsupported protocol in port spec '{}'", raw));
        }

        let parse_port = |s: &str| {
            s.parse::<u16>()
                .ok()
                .filter(|p| *p > 0)
                .ok_or_else(|| format!("invalid port '{}' in port spec '{}'", s, raw))
        };

        let parts: Vec<&str> = ports.split(':').collect();
        let (host_ip, host_port, container_port) = match parts.as_slice() {
            [port] => (None, parse_port(port)?, parse_port(port)?),
            [host, container] => (None, parse_port(host)?, parse_port(container)?),
            [ip, host, container] => (
                Some(ip.to_string()),
                parse_port(host)?,
                parse_port(container)?,
            ),
            _ => return Err(format!("malformed port spec '{}'", raw)),
        };

        Ok(Self {
            host_ip,
            host_port,
            container_port,
            protocol,
        })
    }

    /// Engine key for the container side, e.g. `5432/tcp`
    pub fn container_key(&self) -> String {
        format!("{}/{}", self.container_port, self.protocol)
    }
}

/// Observed container state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    Running,
    Exited,
    Missing,
    Paused,
}

impl ContainerState {
    /// Map the engine's state string
    pub fn from_engine(state: &str) -> Self {
        match state.to_lowercase().as_str() {
            "running" => ContainerState::Running,
            "paused" => ContainerState::Paused,
            _ => ContainerState::Exited,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, ContainerState::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerState::Running => "running",
            ContainerState::Exited => "exited",
            ContainerState::Missing => "missing",
            ContainerState::Paused => "paused",
        }
    }
}

impl std::fmt::Display for ContainerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runtime state of one container, refreshed on every poll
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerRuntimeState {
    pub name: String,
    pub role: Role,
    pub id: Option<String>,
    pub state: ContainerState,
    pub status: String,
    pub last_checked: DateTime<Utc>,
}

impl ContainerRuntimeState {
    pub fn missing(name: impl Into<String>, role: Role) -> Self {
        Self {
            name: name.into(),
            role,
            id: None,
            state: ContainerState::Missing,
            status: "not found".to_string(),
            last_checked: Utc::now(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }
}

/// What a deploy step did to reach its result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployAction {
    /// Already running, nothing done
    AlreadyRunning,
    /// Existing stopped container was started
    Started,
    /// New container was created and started
    Created,
    /// Step failed before completing
    Failed,
}

impl DeployAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeployAction::AlreadyRunning => "already running",
            DeployAction::Started => "started",
            DeployAction::Created => "created",
            DeployAction::Failed => "failed",
        }
    }
}

/// Outcome of deploying one container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentResult {
    pub container: String,
    pub success: bool,
    pub action: DeployAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeploymentResult {
    pub fn ok(container: impl Into<String>, action: DeployAction, id: Option<String>) -> Self {
        Self {
            container: container.into(),
            success: true,
            action,
            container_id: id,
            error: None,
        }
    }

    pub fn failed(container: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            success: false,
            action: DeployAction::Failed,
            container_id: None,
            error: Some(error.into()),
        }
    }
}

/// Aggregate classification of the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallHealth {
    /// Every container running
    Healthy,
    /// Some containers running
    Degraded,
    /// No container running
    Unhealthy,
}

impl OverallHealth {
    pub fn from_counts(running: usize, total: usize) -> Self {
        if total > 0 && running == total {
            OverallHealth::Healthy
        } else if running > 0 {
            OverallHealth::Degraded
        } else {
            OverallHealth::Unhealthy
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OverallHealth::Healthy => "healthy",
            OverallHealth::Degraded => "degraded",
            OverallHealth::Unhealthy => "unhealthy",
        }
    }
}

impl std::fmt::Display for OverallHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// System-wide status built from per-container runtime state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemStatus {
    pub health: OverallHealth,
    pub running: usize,
    pub total: usize,
    pub containers: Vec<ContainerRuntimeState>,
    pub checked_at: DateTime<Utc>,
}

impl SystemStatus {
    pub fn from_containers(containers: Vec<ContainerRuntimeState>) -> Self {
        let running = containers.iter().filter(|c| c.is_running()).count();
        let total = containers.len();
        Self {
            health: OverallHealth::from_counts(running, total),
            running,
            total,
            containers,
            checked_at: Utc::now(),
        }
    }

    pub fn container(&self, name: &str) -> Option<&ContainerRuntimeState> {
        self.containers.iter().find(|c| c.name == name)
    }

    pub fn container_by_role(&self, role: Role) -> Option<&ContainerRuntimeState> {
        self.containers.iter().find(|c| c.role == role)
    }

    /// Names of containers that are not running
    pub fn unhealthy_containers(&self) -> Vec<String> {
        self.containers
            .iter()
            .filter(|c| !c.is_running())
            .map(|c| c.name.clone())
            .collect()
    }
}
