//! Test doubles shared by the unit tests
//!
//! `FakeEngine` keeps containers in memory, records every call as
//! `op:name` and can be told to fail or slow down specific calls. A slowed
//! call also records `done:op:name` once it completes.

use crate::config::{
    ContainerSet, DeploySettings, EngineSettings, LifecycleSettings, MonitorSettings,
    NotifySettings, RegistryCredentials, WardenConfig,
};
use crate::engine::{
    ContainerDetails, ContainerEngine, ContainerSummary, CreatedContainer, EngineResult,
    EngineVersion,
};
use crate::error::{EngineError, Result};
use crate::models::{ContainerSpec, ContainerState};
use crate::notify::{Notifier, Severity};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

/// Config with `test-*` container names and no waits
pub fn test_config() -> WardenConfig {
    let mut containers = ContainerSet::default();
    containers.database.name = "test-database".to_string();
    containers.cache.name = "test-cache".to_string();
    containers.app.name = "test-app".to_string();
    containers.app.image = "survey-app:test".to_string();
    for spec in [
        &mut containers.database,
        &mut containers.cache,
        &mut containers.app,
    ] {
        spec.network = "test-network".to_string();
    }

    WardenConfig {
        environment: "development".to_string(),
        project: "test".to_string(),
        network: "test-network".to_string(),
        engine: EngineSettings {
            base_url: "http://127.0.0.1:9".to_string(),
            api_key: "test-key".to_string(),
            ..Default::default()
        },
        registry: None,
        containers,
        deploy: DeploySettings {
            inter_container_delay_secs: 0,
            stabilization_secs: 0,
            emergency_stabilization_secs: 0,
            stop_timeout_secs: 1,
            pull_images: true,
        },
        lifecycle: LifecycleSettings {
            poll_interval_secs: 1,
            recovery_delay_secs: 0,
            stop_timeout_secs: 2,
            ..Default::default()
        },
        monitor: MonitorSettings {
            interval_secs: 1,
            infra_targets: Vec::new(),
            infra_timeout_secs: 1,
            probe_timeout_secs: 1,
            ..Default::default()
        },
        notify: NotifySettings::default(),
    }
}

struct FakeContainer {
    id: String,
    image: String,
    state: ContainerState,
}

#[derive(Default)]
struct FakeState {
    containers: HashMap<String, FakeContainer>,
    calls: Vec<String>,
    failures: HashSet<String>,
    stuck: HashSet<String>,
    delays: HashMap<String, Duration>,
    networks: HashSet<String>,
    next_id: u64,
}

#[derive(Default)]
pub struct FakeEngine {
    state: Mutex<FakeState>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a container in the given state, returning its id
    pub fn seed(&self, name: &str, state: ContainerState) -> String {
        let mut inner = self.state.lock().unwrap();
        inner.next_id += 1;
        let id = format!("{}-{}", name, inner.next_id);
        inner.containers.insert(
            name.to_string(),
            FakeContainer {
                id: id.clone(),
                image: "seeded:latest".to_string(),
                state,
            },
        );
        id
    }

    pub fn set_state(&self, name: &str, state: ContainerState) {
        let mut inner = self.state.lock().unwrap();
        if state == ContainerState::Missing {
            inner.containers.remove(name);
        } else if let Some(c) = inner.containers.get_mut(name) {
            c.state = state;
        }
    }

    pub fn state_of(&self, name: &str) -> Option<ContainerState> {
        let inner = self.state.lock().unwrap();
        inner.containers.get(name).map(|c| c.state)
    }

    /// Fail calls matching `op:name`; `op:*` fails the op for every container
    pub fn fail_on(&self, key: &str) {
        self.state.lock().unwrap().failures.insert(key.to_string());
    }

    pub fn clear_failures(&self) {
        self.state.lock().unwrap().failures.clear();
    }

    /// Hold calls matching `op:name` for `delay` before they take effect
    pub fn slow_on(&self, key: &str, delay: Duration) {
        self.state
            .lock()
            .unwrap()
            .delays
            .insert(key.to_string(), delay);
    }

    /// Calls recorded between the start and the end of a slowed call
    pub fn calls_during(&self, call: &str) -> Vec<String> {
        let calls = self.calls();
        let done = format!("done:{}", call);
        let Some(start) = calls.iter().position(|c| c == call) else {
            return Vec::new();
        };
        calls[start + 1..]
            .iter()
            .take_while(|c| **c != done)
            .cloned()
            .collect()
    }

    async fn pause(&self, op: &str, name: &str) {
        let key = format!("{}:{}", op, name);
        let delay = self.state.lock().unwrap().delays.get(&key).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
            self.state
                .lock()
                .unwrap()
                .calls
                .push(format!("done:{}", key));
        }
    }

    /// Start and restart succeed for this container but leave it stopped
    pub fn keep_down(&self, name: &str) {
        self.state.lock().unwrap().stuck.insert(name.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count_calls(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == call).count()
    }

    pub fn calls_for(&self, name: &str) -> Vec<String> {
        let suffix = format!(":{}", name);
        self.calls()
            .into_iter()
            .filter(|c| c.ends_with(&suffix))
            .collect()
    }

    pub fn calls_matching(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }

    pub fn has_network(&self, name: &str) -> bool {
        self.state.lock().unwrap().networks.contains(name)
    }

    fn record(inner: &mut FakeState, op: &str, name: &str) -> EngineResult<()> {
        inner.calls.push(format!("{}:{}", op, name));
        let exact = format!("{}:{}", op, name);
        let wildcard = format!("{}:*", op);
        if inner.failures.contains(&exact) || inner.failures.contains(&wildcard) {
            return Err(EngineError::Status {
                code: 500,
                message: format!("injected failure for {}", exact),
            });
        }
        Ok(())
    }

    /// Resolve an id or name to the container name
    fn resolve(inner: &FakeState, id: &str) -> Option<String> {
        if inner.containers.contains_key(id) {
            return Some(id.to_string());
        }
        inner
            .containers
            .iter()
            .find(|(_, c)| c.id == id)
            .map(|(name, _)| name.clone())
    }

    fn not_found(id: &str) -> EngineError {
        EngineError::Status {
            code: 404,
            message: format!("No such container: {}", id),
        }
    }

    fn set_running(inner: &mut FakeState, name: &str) {
        let stuck = inner.stuck.contains(name);
        if let Some(c) = inner.containers.get_mut(name) {
            c.state = if stuck {
                ContainerState::Exited
            } else {
                ContainerState::Running
            };
        }
    }
}

#[async_trait]
impl ContainerEngine for FakeEngine {
    async fn list_containers(&self, all: bool) -> EngineResult<Vec<ContainerSummary>> {
        let mut inner = self.state.lock().unwrap();
        Self::record(&mut inner, "list", "*")?;
        Ok(inner
            .containers
            .iter()
            .filter(|(_, c)| all || c.state.is_running())
            .map(|(name, c)| ContainerSummary {
                id: c.id.clone(),
                names: vec![format!("/{}", name)],
                image: c.image.clone(),
                state: c.state.as_str().to_string(),
                status: if c.state.is_running() {
                    "Up 5 minutes".to_string()
                } else {
                    "Exited (1) 1 minute ago".to_string()
                },
            })
            .collect())
    }

    async fn inspect_container(&self, id: &str) -> EngineResult<ContainerDetails> {
        let mut inner = self.state.lock().unwrap();
        let name = Self::resolve(&inner, id).ok_or_else(|| Self::not_found(id))?;
        Self::record(&mut inner, "inspect", &name)?;
        let c = &inner.containers[&name];
        Ok(ContainerDetails {
            id: c.id.clone(),
            name: name.clone(),
            state: c.state,
            status: c.state.as_str().to_string(),
            exit_code: None,
            started_at: None,
            restart_count: 0,
        })
    }

    async fn create_container(&self, spec: &ContainerSpec) -> EngineResult<CreatedContainer> {
        {
            let mut inner = self.state.lock().unwrap();
            Self::record(&mut inner, "create", &spec.name)?;
        }
        self.pause("create", &spec.name).await;
        let mut inner = self.state.lock().unwrap();
        if inner.containers.contains_key(&spec.name) {
            return Err(EngineError::Status {
                code: 409,
                message: format!("name '{}' already in use", spec.name),
            });
        }
        inner.next_id += 1;
        let id = format!("{}-{}", spec.name, inner.next_id);
        inner.containers.insert(
            spec.name.clone(),
            FakeContainer {
                id: id.clone(),
                image: spec.image.clone(),
                state: ContainerState::Exited,
            },
        );
        Ok(CreatedContainer {
            id,
            warnings: Vec::new(),
        })
    }

    async fn start_container(&self, id: &str) -> EngineResult<()> {
        let mut inner = self.state.lock().unwrap();
        let name = Self::resolve(&inner, id).ok_or_else(|| Self::not_found(id))?;
        Self::record(&mut inner, "start", &name)?;
        Self::set_running(&mut inner, &name);
        Ok(())
    }

    async fn stop_container(&self, id: &str, _timeout: Duration) -> EngineResult<()> {
        let mut inner = self.state.lock().unwrap();
        let name = Self::resolve(&inner, id).ok_or_else(|| Self::not_found(id))?;
        Self::record(&mut inner, "stop", &name)?;
        if let Some(c) = inner.containers.get_mut(&name) {
            c.state = ContainerState::Exited;
        }
        Ok(())
    }

    async fn restart_container(&self, id: &str, _timeout: Duration) -> EngineResult<()> {
        let name = {
            let mut inner = self.state.lock().unwrap();
            let name = Self::resolve(&inner, id).ok_or_else(|| Self::not_found(id))?;
            Self::record(&mut inner, "restart", &name)?;
            name
        };
        self.pause("restart", &name).await;
        let mut inner = self.state.lock().unwrap();
        Self::set_running(&mut inner, &name);
        Ok(())
    }

    async fn remove_container(&self, id: &str, _force: bool) -> EngineResult<()> {
        let mut inner = self.state.lock().unwrap();
        let Some(name) = Self::resolve(&inner, id) else {
            return Ok(());
        };
        Self::record(&mut inner, "remove", &name)?;
        inner.containers.remove(&name);
        Ok(())
    }

    async fn container_logs(&self, id: &str, tail: usize) -> EngineResult<String> {
        let mut inner = self.state.lock().unwrap();
        let name = Self::resolve(&inner, id).ok_or_else(|| Self::not_found(id))?;
        Self::record(&mut inner, "logs", &name)?;
        Ok((1..=tail.min(3))
            .map(|i| format!("{} log line {}", name, i))
            .collect::<Vec<_>>()
            .join("\n"))
    }

    async fn pull_image(
        &self,
        image: &str,
        _auth: Option<&RegistryCredentials>,
    ) -> EngineResult<()> {
        let mut inner = self.state.lock().unwrap();
        Self::record(&mut inner, "pull", image)
    }

    async fn create_network(&self, name: &str) -> EngineResult<()> {
        let mut inner = self.state.lock().unwrap();
        Self::record(&mut inner, "network", name)?;
        inner.networks.insert(name.to_string());
        Ok(())
    }

    async fn remove_network(&self, name: &str) -> EngineResult<()> {
        let mut inner = self.state.lock().unwrap();
        Self::record(&mut inner, "remove-network", name)?;
        inner.networks.remove(name);
        Ok(())
    }

    async fn version(&self) -> EngineResult<EngineVersion> {
        let mut inner = self.state.lock().unwrap();
        Self::record(&mut inner, "version", "*")?;
        Ok(EngineVersion {
            api_version: "1.43".to_string(),
            version: "24.0.7".to_string(),
            os: Some("linux".to_string()),
        })
    }
}

/// Notifier that keeps everything it is sent
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(Severity, String, String)>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<(Severity, String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.sent().iter().filter(|(s, _, _)| *s == severity).count()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, severity: Severity, title: &str, message: &str) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((severity, title.to_string(), message.to_string()));
        Ok(())
    }
}
