//! Container manager
//!
//! Name-based lookup, idempotent single-container deploy, dependency-ordered
//! deploy of the whole stack and status aggregation. Nothing here panics or
//! raises past its public surface: deploy operations report per-container
//! `DeploymentResult`s and everything else returns `Result`.

use crate::config::{ContainerSet, DeploySettings, RegistryCredentials, WardenConfig};
use crate::engine::{ContainerEngine, ContainerSummary, EngineResult};
use crate::error::{Result, WardenError};
use crate::models::{
    ContainerRuntimeState, ContainerSpec, DeployAction, DeploymentResult, Role, SystemStatus,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// Outcome of `deploy_all`; holds one entry per container attempted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentSummary {
    pub success: bool,
    pub results: Vec<DeploymentResult>,
}

impl DeploymentSummary {
    pub fn get(&self, name: &str) -> Option<&DeploymentResult> {
        self.results.iter().find(|r| r.container == name)
    }

    pub fn succeeded(&self) -> Vec<String> {
        self.results
            .iter()
            .filter(|r| r.success)
            .map(|r| r.container.clone())
            .collect()
    }

    pub fn failure(&self) -> Option<&DeploymentResult> {
        self.results.iter().find(|r| !r.success)
    }

    /// `PartialDeployment` describing where the chain stopped
    pub fn to_error(&self) -> Option<WardenError> {
        self.failure().map(|failed| WardenError::PartialDeployment {
            succeeded: self.succeeded(),
            failed: failed.container.clone(),
            error: failed.error.clone().unwrap_or_default(),
        })
    }
}

/// Manages the fixed set of stack containers through a container engine
pub struct ContainerManager {
    engine: Arc<dyn ContainerEngine>,
    containers: ContainerSet,
    network: String,
    settings: DeploySettings,
    registry: Option<RegistryCredentials>,
    /// Last observed state per container name
    state_cache: RwLock<HashMap<String, ContainerRuntimeState>>,
}

impl ContainerManager {
    pub fn new(engine: Arc<dyn ContainerEngine>, config: &WardenConfig) -> Self {
        Self {
            engine,
            containers: config.containers.clone(),
            network: config.network.clone(),
            settings: config.deploy.clone(),
            registry: config.registry.clone(),
            state_cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn engine(&self) -> &Arc<dyn ContainerEngine> {
        &self.engine
    }

    pub fn containers(&self) -> &ContainerSet {
        &self.containers
    }

    pub fn settings(&self) -> &DeploySettings {
        &self.settings
    }

    /// Resolve a configured container by name
    pub fn resolve(&self, name: &str) -> Result<(Role, &ContainerSpec)> {
        self.containers
            .by_name(name)
            .ok_or_else(|| WardenError::UnknownContainer(name.to_string()))
    }

    pub fn name_of(&self, role: Role) -> &str {
        &self.containers.get(role).name
    }

    /// Find the existing instance of a container by name
    pub async fn find_container(&self, name: &str) -> EngineResult<Option<ContainerSummary>> {
        let containers = self.engine.list_containers(true).await?;
        Ok(containers.into_iter().find(|c| c.has_name(name)))
    }

    /// Deploy one container
    ///
    /// Running and not forced: no-op. Stopped: started. Missing: created and
    /// started. Forced: stopped (best effort), removed, then created.
    pub async fn deploy(&self, name: &str, force_recreate: bool) -> DeploymentResult {
        let spec = match self.resolve(name) {
            Ok((_, spec)) => spec,
            Err(e) => return DeploymentResult::failed(name, e.to_string()),
        };

        let existing = match self.find_container(name).await {
            Ok(existing) => existing,
            Err(e) => {
                error!(container = %name, error = %e, "Failed to look up container");
                return DeploymentResult::failed(name, format!("lookup failed: {}", e));
            }
        };

        if let Some(container) = existing {
            if force_recreate {
                info!(container = %name, id = %container.id, "Force recreate requested, removing existing container");
                if let Err(e) = self
                    .engine
                    .stop_container(&container.id, self.stop_timeout())
                    .await
                {
                    warn!(container = %name, error = %e, "Stop before recreate failed, forcing removal");
                }
                if let Err(e) = self.engine.remove_container(&container.id, true).await {
                    error!(container = %name, error = %e, "Failed to remove container");
                    return DeploymentResult::failed(name, format!("remove failed: {}", e));
                }
            } else if container.container_state().is_running() {
                debug!(container = %name, "Container already running");
                return DeploymentResult::ok(name, DeployAction::AlreadyRunning, Some(container.id));
            } else {
                info!(container = %name, state = %container.container_state(), "Starting existing container");
                return match self.engine.start_container(&container.id).await {
                    Ok(()) => DeploymentResult::ok(name, DeployAction::Started, Some(container.id)),
                    Err(e) => {
                        error!(container = %name, error = %e, "Failed to start container");
                        DeploymentResult::failed(name, format!("start failed: {}", e))
                    }
                };
            }
        }

        self.create_and_start(spec).await
    }

    async fn create_and_start(&self, spec: &ContainerSpec) -> DeploymentResult {
        let name = spec.name.as_str();

        if !spec.network.is_empty() {
            if let Err(e) = self.engine.create_network(&spec.network).await {
                error!(network = %spec.network, error = %e, "Failed to ensure network");
                return DeploymentResult::failed(name, format!("network setup failed: {}", e));
            }
        }

        if self.settings.pull_images {
            if let Err(e) = self
                .engine
                .pull_image(&spec.image, self.registry.as_ref())
                .await
            {
                // The image may already be present locally
                warn!(container = %name, image = %spec.image, error = %e, "Image pull failed, trying local image");
            }
        }

        info!(container = %name, image = %spec.image, "Creating container");
        let created = match self.engine.create_container(spec).await {
            Ok(created) => created,
            Err(e) => {
                error!(container = %name, error = %e, "Failed to create container");
                return DeploymentResult::failed(name, format!("create failed: {}", e));
            }
        };
        for warning in &created.warnings {
            warn!(container = %name, warning = %warning, "Engine warning on create");
        }

        match self.engine.start_container(&created.id).await {
            Ok(()) => {
                info!(container = %name, id = %created.id, "Container created and started");
                DeploymentResult::ok(name, DeployAction::Created, Some(created.id))
            }
            Err(e) => {
                error!(container = %name, error = %e, "Created container failed to start");
                let mut result = DeploymentResult::failed(name, format!("start failed: {}", e));
                result.container_id = Some(created.id);
                result
            }
        }
    }

    /// Deploy every container in dependency order, stopping at the first failure
    pub async fn deploy_all(&self, force_recreate: bool) -> DeploymentSummary {
        let mut results = Vec::with_capacity(Role::ORDER.len());

        for (index, (role, spec)) in self.containers.ordered().into_iter().enumerate() {
            if index > 0 {
                // Give the previous container time to accept connections
                tokio::time::sleep(self.settings.inter_container_delay()).await;
            }

            info!(role = %role, container = %spec.name, force = force_recreate, "Deploying");
            let result = self.deploy(&spec.name, force_recreate).await;
            let ok = result.success;
            results.push(result);

            if !ok {
                error!(role = %role, container = %spec.name, "Deployment chain stopped");
                break;
            }
        }

        let success = results.len() == Role::ORDER.len() && results.iter().all(|r| r.success);
        DeploymentSummary { success, results }
    }

    /// Force-recreate one container
    pub async fn recreate(&self, name: &str) -> DeploymentResult {
        self.deploy(name, true).await
    }

    pub async fn restart(&self, name: &str) -> Result<()> {
        self.resolve(name)?;
        self.engine
            .restart_container(name, self.stop_timeout())
            .await
            .map_err(WardenError::from)
    }

    pub async fn stop(&self, name: &str) -> Result<()> {
        self.resolve(name)?;
        self.engine
            .stop_container(name, self.stop_timeout())
            .await
            .map_err(WardenError::from)
    }

    pub async fn logs(&self, name: &str, tail: usize) -> Result<String> {
        self.resolve(name)?;
        self.engine
            .container_logs(name, tail)
            .await
            .map_err(WardenError::from)
    }

    /// Current runtime state of one container
    pub async fn container_state(&self, name: &str) -> Result<ContainerRuntimeState> {
        let (role, _) = self.resolve(name)?;
        let existing = self.find_container(name).await?;
        Ok(runtime_state(name, role, existing.as_ref()))
    }

    /// Aggregate every container's runtime state
    pub async fn system_status(&self) -> Result<SystemStatus> {
        let listed = self.engine.list_containers(true).await?;

        let containers: Vec<ContainerRuntimeState> = self
            .containers
            .ordered()
            .into_iter()
            .map(|(role, spec)| {
                let found = listed.iter().find(|c| c.has_name(&spec.name));
                runtime_state(&spec.name, role, found)
            })
            .collect();

        {
            let mut cache = self.state_cache.write().await;
            for state in &containers {
                cache.insert(state.name.clone(), state.clone());
            }
        }

        Ok(SystemStatus::from_containers(containers))
    }

    /// States from the last aggregation, without calling the engine
    pub async fn cached_states(&self) -> Vec<ContainerRuntimeState> {
        let cache = self.state_cache.read().await;
        self.containers
            .ordered()
            .into_iter()
            .filter_map(|(_, spec)| cache.get(&spec.name).cloned())
            .collect()
    }

    fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.stop_timeout_secs)
    }
}

fn runtime_state(
    name: &str,
    role: Role,
    found: Option<&ContainerSummary>,
) -> ContainerRuntimeState {
    match found {
        Some(c) => ContainerRuntimeState {
            name: name.to_string(),
            role,
            id: Some(c.id.clone()),
            state: c.container_state(),
            status: c.status.clone(),
            last_checked: Utc::now(),
        },
        None => ContainerRuntimeState::missing(name, role),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContainerState, OverallHealth};
    use crate::testing::{test_config, FakeEngine};

    fn manager(engine: Arc<FakeEngine>) -> ContainerManager {
        ContainerManager::new(engine, &test_config())
    }

    #[tokio::test]
    async fn test_deploy_twice_is_idempotent() {
        let engine = Arc::new(FakeEngine::new());
        let manager = manager(engine.clone());

        let first = manager.deploy("test-app", false).await;
        let second = manager.deploy("test-app", false).await;

        assert!(first.success);
        assert_eq!(first.action, DeployAction::Created);
        assert!(second.success);
        assert_eq!(second.action, DeployAction::AlreadyRunning);
        assert_eq!(engine.count_calls("create:test-app"), 1);
    }

    #[tokio::test]
    async fn test_deploy_unknown_name_fails() {
        let manager = manager(Arc::new(FakeEngine::new()));
        let result = manager.deploy("nope", false).await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("unknown container"));
    }

    #[tokio::test]
    async fn test_deploy_starts_stopped_container() {
        let engine = Arc::new(FakeEngine::new());
        engine.seed("test-cache", ContainerState::Exited);
        let manager = manager(engine.clone());

        let result = manager.deploy("test-cache", false).await;

        assert!(result.success);
        assert_eq!(result.action, DeployAction::Started);
        assert_eq!(engine.count_calls("create:test-cache"), 0);
        assert_eq!(engine.state_of("test-cache"), Some(ContainerState::Running));
    }

    #[tokio::test]
    async fn test_force_recreate_replaces_running_container() {
        let engine = Arc::new(FakeEngine::new());
        let old_id = engine.seed("test-database", ContainerState::Running);
        let manager = manager(engine.clone());

        let result = manager.deploy("test-database", true).await;

        assert!(result.success);
        assert_eq!(result.action, DeployAction::Created);
        assert_ne!(result.container_id.as_deref(), Some(old_id.as_str()));
        assert_eq!(
            engine.calls_for("test-database"),
            vec![
                "stop:test-database",
                "remove:test-database",
                "create:test-database",
                "start:test-database"
            ]
        );
    }

    #[tokio::test]
    async fn test_force_recreate_survives_failed_stop() {
        let engine = Arc::new(FakeEngine::new());
        engine.seed("test-app", ContainerState::Running);
        engine.fail_on("stop:test-app");
        let manager = manager(engine.clone());

        let result = manager.deploy("test-app", true).await;

        assert!(result.success);
        assert_eq!(engine.count_calls("remove:test-app"), 1);
    }

    #[tokio::test]
    async fn test_deploy_all_follows_dependency_order() {
        let engine = Arc::new(FakeEngine::new());
        let manager = manager(engine.clone());

        let summary = manager.deploy_all(true).await;

        assert!(summary.success);
        assert_eq!(
            engine.calls_matching("create:"),
            vec!["create:test-database", "create:test-cache", "create:test-app"]
        );
    }

    #[tokio::test]
    async fn test_deploy_all_fails_fast_on_database() {
        let engine = Arc::new(FakeEngine::new());
        engine.fail_on("create:test-database");
        let manager = manager(engine.clone());

        let summary = manager.deploy_all(false).await;

        assert!(!summary.success);
        assert_eq!(summary.results.len(), 1);
        assert!(summary.get("test-cache").is_none());
        assert!(summary.get("test-app").is_none());
        assert_eq!(engine.count_calls("create:test-cache"), 0);
        assert_eq!(engine.count_calls("create:test-app"), 0);

        match summary.to_error() {
            Some(WardenError::PartialDeployment { succeeded, failed, .. }) => {
                assert!(succeeded.is_empty());
                assert_eq!(failed, "test-database");
            }
            other => panic!("expected partial deployment, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_healthy_round_trip() {
        let engine = Arc::new(FakeEngine::new());
        let manager = manager(engine);

        assert!(manager.deploy_all(false).await.success);
        let status = manager.system_status().await.unwrap();

        assert_eq!(status.health, OverallHealth::Healthy);
        assert_eq!(status.running, 3);
        assert_eq!(status.total, 3);
        assert_eq!(manager.cached_states().await.len(), 3);
    }

    #[tokio::test]
    async fn test_status_counts_missing_as_not_running() {
        let engine = Arc::new(FakeEngine::new());
        engine.seed("test-database", ContainerState::Running);
        engine.seed("test-cache", ContainerState::Exited);
        let manager = manager(engine);

        let status = manager.system_status().await.unwrap();

        assert_eq!(status.health, OverallHealth::Degraded);
        assert_eq!(status.running, 1);
        assert_eq!(
            status.container("test-app").map(|c| c.state),
            Some(ContainerState::Missing)
        );
    }

    #[tokio::test]
    async fn test_status_engine_failure_is_an_error() {
        let engine = Arc::new(FakeEngine::new());
        engine.fail_on("list:*");
        let manager = manager(engine);

        assert!(manager.system_status().await.is_err());
    }
}
