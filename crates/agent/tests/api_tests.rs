//! Integration tests for the agent HTTP API

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use config::{Config, File, FileFormat};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;
use warden_agent::api::{create_router, AppState};
use warden_lib::{
    config::{environment_source, RegistryCredentials},
    engine::{
        ContainerDetails, ContainerEngine, ContainerSummary, CreatedContainer, EngineResult,
        EngineVersion,
    },
    health::components,
    monitor::{AppProbeResult, HealthProbe},
    notify::LogNotifier,
    ContainerSpec, ContainerState, EngineError, Orchestrator, WardenConfig,
};

const CONFIG: &str = r#"
environment = "development"
project = "api-test"

[engine]
base_url = "http://127.0.0.1:9"
api_key = "test-key"

[containers.app]
image = "survey-app:test"
"#;

/// Engine with a fixed set of containers, reachable or not
#[derive(Default)]
struct StubEngine {
    containers: Mutex<HashMap<String, ContainerState>>,
    offline: bool,
}

impl StubEngine {
    fn running(names: &[&str]) -> Self {
        let containers = names
            .iter()
            .map(|n| (n.to_string(), ContainerState::Running))
            .collect();
        Self {
            containers: Mutex::new(containers),
            offline: false,
        }
    }

    fn offline() -> Self {
        Self {
            offline: true,
            ..Default::default()
        }
    }

    fn check(&self) -> EngineResult<()> {
        if self.offline {
            Err(EngineError::Transport("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ContainerEngine for StubEngine {
    async fn list_containers(&self, _all: bool) -> EngineResult<Vec<ContainerSummary>> {
        self.check()?;
        let containers = self.containers.lock().unwrap();
        Ok(containers
            .iter()
            .map(|(name, state)| ContainerSummary {
                id: format!("id-{}", name),
                names: vec![format!("/{}", name)],
                image: "image:latest".to_string(),
                state: state.to_string(),
                status: String::new(),
            })
            .collect())
    }

    async fn inspect_container(&self, id: &str) -> EngineResult<ContainerDetails> {
        self.check()?;
        Err(EngineError::Status {
            code: 404,
            message: format!("no such container: {}", id),
        })
    }

    async fn create_container(&self, spec: &ContainerSpec) -> EngineResult<CreatedContainer> {
        self.check()?;
        self.containers
            .lock()
            .unwrap()
            .insert(spec.name.clone(), ContainerState::Exited);
        Ok(CreatedContainer {
            id: format!("id-{}", spec.name),
            warnings: Vec::new(),
        })
    }

    async fn start_container(&self, id: &str) -> EngineResult<()> {
        self.check()?;
        let name = id.trim_start_matches("id-");
        self.containers
            .lock()
            .unwrap()
            .insert(name.to_string(), ContainerState::Running);
        Ok(())
    }

    async fn stop_container(&self, _id: &str, _timeout: Duration) -> EngineResult<()> {
        self.check()
    }

    async fn restart_container(&self, _id: &str, _timeout: Duration) -> EngineResult<()> {
        self.check()
    }

    async fn remove_container(&self, _id: &str, _force: bool) -> EngineResult<()> {
        self.check()
    }

    async fn container_logs(&self, _id: &str, _tail: usize) -> EngineResult<String> {
        self.check()?;
        Ok(String::new())
    }

    async fn pull_image(
        &self,
        _image: &str,
        _auth: Option<&RegistryCredentials>,
    ) -> EngineResult<()> {
        self.check()
    }

    async fn create_network(&self, _name: &str) -> EngineResult<()> {
        self.check()
    }

    async fn remove_network(&self, _name: &str) -> EngineResult<()> {
        self.check()
    }

    async fn version(&self) -> EngineResult<EngineVersion> {
        self.check()?;
        Ok(EngineVersion {
            api_version: "1.43".to_string(),
            version: "24.0.7".to_string(),
            os: Some("linux".to_string()),
        })
    }
}

struct HealthyProbe;

#[async_trait]
impl HealthProbe for HealthyProbe {
    async fn probe(&self) -> AppProbeResult {
        AppProbeResult {
            healthy: true,
            status_code: Some(200),
            response_time_ms: Some(12),
            ..Default::default()
        }
    }
}

fn test_config() -> WardenConfig {
    let builder = Config::builder()
        .add_source(File::from_str(CONFIG, FileFormat::Toml))
        .add_source(environment_source(Some(HashMap::new())));
    WardenConfig::from_builder(builder).unwrap()
}

/// Create a test app around the given engine
async fn setup_test_app(engine: StubEngine) -> (Router, Arc<AppState>) {
    let orchestrator = Orchestrator::with_parts(
        test_config(),
        Arc::new(engine),
        Arc::new(LogNotifier),
        Arc::new(HealthyProbe),
    );
    let health = orchestrator.health();
    health.register(components::ENGINE).await;
    health.register(components::POLL_LOOP).await;
    health.register(components::MONITOR).await;

    let state = Arc::new(AppState::new(Arc::new(orchestrator)));
    let router = create_router(state.clone());

    (router, state)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let (status, body) = get(app, uri).await;
    (status, serde_json::from_slice(&body).unwrap())
}

fn all_names() -> Vec<&'static str> {
    vec!["api-test-database", "api-test-cache", "api-test-app"]
}

#[tokio::test]
async fn test_healthz_returns_ok_when_healthy() {
    let (app, _state) = setup_test_app(StubEngine::running(&all_names())).await;

    let (status, health) = get_json(app, "/healthz").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "healthy");
}

#[tokio::test]
async fn test_healthz_returns_ok_when_degraded() {
    let (app, state) = setup_test_app(StubEngine::running(&all_names())).await;

    state
        .orchestrator
        .health()
        .set_degraded(components::MONITOR, "Probe slow")
        .await;

    let (status, health) = get_json(app, "/healthz").await;

    // Degraded still returns 200 (operational)
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "degraded");
}

#[tokio::test]
async fn test_healthz_returns_503_when_engine_unhealthy() {
    let (app, state) = setup_test_app(StubEngine::running(&all_names())).await;

    state
        .orchestrator
        .health()
        .set_unhealthy(components::ENGINE, "connection refused")
        .await;

    let (status, health) = get_json(app, "/healthz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(health["status"], "unhealthy");
    assert_eq!(health["components"]["engine"]["status"], "unhealthy");
}

#[tokio::test]
async fn test_readyz_returns_503_before_start() {
    let (app, _state) = setup_test_app(StubEngine::running(&all_names())).await;

    let (status, readiness) = get_json(app, "/readyz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(readiness["ready"], false);
}

#[tokio::test]
async fn test_readyz_ignores_down_stack() {
    let (app, state) = setup_test_app(StubEngine::running(&all_names())).await;

    let health = state.orchestrator.health();
    health.set_ready(true).await;
    health
        .set_unhealthy(components::STACK, "0/3 containers running")
        .await;

    let (status, readiness) = get_json(app, "/readyz").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(readiness["ready"], true);
}

#[tokio::test]
async fn test_readyz_returns_503_when_ready_but_unhealthy() {
    let (app, state) = setup_test_app(StubEngine::running(&all_names())).await;

    let health = state.orchestrator.health();
    health.set_ready(true).await;
    health.set_unhealthy(components::POLL_LOOP, "Stalled").await;

    let (status, _) = get_json(app, "/readyz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_status_lists_running_containers() {
    let (app, _state) = setup_test_app(StubEngine::running(&all_names())).await;

    let (status, report) = get_json(app, "/status").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["environment"], "development");
    assert_eq!(report["system"]["running"], 3);
    assert_eq!(report["system"]["health"], "healthy");
    assert_eq!(report["polling"], false);
}

#[tokio::test]
async fn test_status_reports_degraded_stack() {
    let (app, _state) =
        setup_test_app(StubEngine::running(&["api-test-database", "api-test-app"])).await;

    let (status, report) = get_json(app, "/status").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["system"]["running"], 2);
    assert_eq!(report["system"]["health"], "degraded");
}

#[tokio::test]
async fn test_status_returns_503_when_engine_unreachable() {
    let (app, _state) = setup_test_app(StubEngine::offline()).await;

    let (status, body) = get_json(app, "/status").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].as_str().unwrap().contains("connection refused"));
}

#[tokio::test]
async fn test_report_after_monitor_cycle() {
    let (app, state) = setup_test_app(StubEngine::running(&all_names())).await;

    state.orchestrator.monitor().run_cycle().await.wait().await;
    let (status, report) = get_json(app, "/report").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["snapshots"], 1);
    assert_eq!(report["uptime_percent"], 100.0);
    assert_eq!(report["latest"]["app"]["healthy"], true);
}

#[tokio::test]
async fn test_metrics_endpoint_returns_prometheus_format() {
    let (app, state) = setup_test_app(StubEngine::running(&all_names())).await;

    // A poll cycle registers and touches the orchestrator metrics
    state.orchestrator.lifecycle().poll_once().await.unwrap();

    let (status, body) = get(app, "/metrics").await;
    let body = String::from_utf8(body).unwrap();

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("warden_poll_cycles_total"));
    assert!(body.contains("warden_containers_running"));
}
