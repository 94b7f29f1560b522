//! Orchestrator configuration
//!
//! Settings are resolved once at startup from, in increasing precedence:
//! an optional env-style file (loaded into the process environment), an
//! optional config file, and `WARDEN_`-prefixed environment variables
//! using `__` as the nesting separator. Defaults are applied at load time
//! and the result is validated as a whole.

use crate::error::{Result, WardenError};
use crate::models::{ContainerSpec, PortMapping, Role};
use config::{Config, ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Prefix for environment variable overrides
pub const ENV_PREFIX: &str = "WARDEN";

/// Known deployment environments
pub const ENVIRONMENTS: &[&str] = &["development", "staging", "production"];

/// Keys whose environment values are comma-separated lists
const LIST_KEYS: &[&str] = &[
    "containers.database.ports",
    "containers.database.env",
    "containers.database.volumes",
    "containers.cache.ports",
    "containers.cache.env",
    "containers.cache.volumes",
    "containers.app.ports",
    "containers.app.env",
    "containers.app.volumes",
    "monitor.infra_targets",
];

/// Complete orchestrator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WardenConfig {
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Project prefix for generated container names
    #[serde(default = "default_project")]
    pub project: String,

    /// Network every container joins
    #[serde(default = "default_network")]
    pub network: String,

    #[serde(default)]
    pub engine: EngineSettings,

    #[serde(default)]
    pub registry: Option<RegistryCredentials>,

    #[serde(default)]
    pub containers: ContainerSet,

    #[serde(default)]
    pub deploy: DeploySettings,

    #[serde(default)]
    pub lifecycle: LifecycleSettings,

    #[serde(default)]
    pub monitor: MonitorSettings,

    #[serde(default)]
    pub notify: NotifySettings,
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_project() -> String {
    "stack".to_string()
}

fn default_network() -> String {
    "stack-network".to_string()
}

/// Remote container engine API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Base URL of the management API, e.g. `https://portainer.internal:9443`
    pub base_url: String,
    pub api_key: String,
    pub endpoint_id: u32,
    /// Pin an engine API version instead of negotiating one
    pub api_version: Option<String>,
    pub timeout_secs: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            endpoint_id: 1,
            api_version: None,
            timeout_secs: 30,
        }
    }
}

impl EngineSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Image registry credentials used for pulls
#[derive(Clone, Serialize, Deserialize)]
pub struct RegistryCredentials {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub server: Option<String>,
}

impl std::fmt::Debug for RegistryCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryCredentials")
            .field("username", &self.username)
            .field("password", &"***")
            .field("server", &self.server)
            .finish()
    }
}

/// The three managed containers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerSet {
    #[serde(default = "default_database")]
    pub database: ContainerSpec,
    #[serde(default = "default_cache")]
    pub cache: ContainerSpec,
    #[serde(default = "default_app")]
    pub app: ContainerSpec,
}

fn default_database() -> ContainerSpec {
    let mut spec = ContainerSpec::new("", "postgres:15-alpine");
    spec.ports = vec!["5432:5432".to_string()];
    spec
}

fn default_cache() -> ContainerSpec {
    let mut spec = ContainerSpec::new("", "redis:7-alpine");
    spec.ports = vec!["6379:6379".to_string()];
    spec
}

fn default_app() -> ContainerSpec {
    let mut spec = ContainerSpec::new("", "");
    spec.ports = vec!["8000:8000".to_string()];
    spec
}

impl Default for ContainerSet {
    fn default() -> Self {
        Self {
            database: default_database(),
            cache: default_cache(),
            app: default_app(),
        }
    }
}

impl ContainerSet {
    pub fn get(&self, role: Role) -> &ContainerSpec {
        match role {
            Role::Database => &self.database,
            Role::Cache => &self.cache,
            Role::App => &self.app,
        }
    }

    fn get_mut(&mut self, role: Role) -> &mut ContainerSpec {
        match role {
            Role::Database => &mut self.database,
            Role::Cache => &mut self.cache,
            Role::App => &mut self.app,
        }
    }

    /// Specs in deployment order
    pub fn ordered(&self) -> Vec<(Role, &ContainerSpec)> {
        Role::ORDER.iter().map(|role| (*role, self.get(*role))).collect()
    }

    pub fn by_name(&self, name: &str) -> Option<(Role, &ContainerSpec)> {
        self.ordered().into_iter().find(|(_, spec)| spec.name == name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploySettings {
    /// Wait between consecutive containers in `deploy_all`
    pub inter_container_delay_secs: u64,
    /// Wait after a manual deploy before polling resumes
    pub stabilization_secs: u64,
    /// Wait after emergency recovery before re-checking health
    pub emergency_stabilization_secs: u64,
    pub stop_timeout_secs: u64,
    pub pull_images: bool,
}

impl Default for DeploySettings {
    fn default() -> Self {
        Self {
            inter_container_delay_secs: 5,
            stabilization_secs: 10,
            emergency_stabilization_secs: 30,
            stop_timeout_secs: 10,
            pull_images: true,
        }
    }
}

impl DeploySettings {
    pub fn inter_container_delay(&self) -> Duration {
        Duration::from_secs(self.inter_container_delay_secs)
    }

    pub fn stabilization(&self) -> Duration {
        Duration::from_secs(self.stabilization_secs)
    }

    pub fn emergency_stabilization(&self) -> Duration {
        Duration::from_secs(self.emergency_stabilization_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleSettings {
    pub poll_interval_secs: u64,
    pub recovery_enabled: bool,
    /// Base delay between recovery attempts
    pub recovery_delay_secs: u64,
    pub backoff_multiplier: f64,
    pub max_restart_attempts: u32,
    /// Recovery workflows allowed per container per calendar day
    pub max_daily_attempts: u32,
    /// Bound on waiting for the poll worker to exit
    pub stop_timeout_secs: u64,
    pub recovery_history_size: usize,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
            recovery_enabled: true,
            recovery_delay_secs: 10,
            backoff_multiplier: 2.0,
            max_restart_attempts: 2,
            max_daily_attempts: 5,
            stop_timeout_secs: 10,
            recovery_history_size: 100,
        }
    }
}

impl LifecycleSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn recovery_delay(&self) -> Duration {
        Duration::from_secs(self.recovery_delay_secs)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    pub interval_secs: u64,
    pub app_health_url: String,
    pub probe_timeout_secs: u64,
    pub history_retention_hours: i64,
    pub max_history: usize,
    /// Alert records kept for the 24h count, independent of `max_history`
    pub max_alerts: usize,
    /// Number of recent snapshots the rolling error rate covers
    pub error_rate_window: usize,
    pub error_rate_threshold: f64,
    pub slow_response_ms: u64,
    pub alert_cooldown_secs: u64,
    pub self_healing_enabled: bool,
    /// `host:port` pairs checked for TCP reachability
    pub infra_targets: Vec<String>,
    pub infra_timeout_secs: u64,
    pub log_dir: PathBuf,
    pub log_retention_days: u64,
    pub min_free_disk_mb: u64,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            app_health_url: "http://localhost:8000/health".to_string(),
            probe_timeout_secs: 10,
            history_retention_hours: 24,
            max_history: 2880,
            max_alerts: 10_000,
            error_rate_window: 10,
            error_rate_threshold: 0.2,
            slow_response_ms: 2000,
            alert_cooldown_secs: 300,
            self_healing_enabled: true,
            infra_targets: Vec::new(),
            infra_timeout_secs: 5,
            log_dir: PathBuf::from("logs"),
            log_retention_days: 7,
            min_free_disk_mb: 500,
        }
    }
}

impl MonitorSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn infra_timeout(&self) -> Duration {
        Duration::from_secs(self.infra_timeout_secs)
    }

    pub fn alert_cooldown(&self) -> Duration {
        Duration::from_secs(self.alert_cooldown_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifySettings {
    /// Chat webhook receiving alert notifications; log-only when unset
    pub webhook_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for NotifySettings {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_secs: 10,
        }
    }
}

/// Where to load configuration from
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Overrides `WARDEN_ENVIRONMENT`
    pub environment: Option<String>,
    /// Explicit config file; otherwise `config/<environment>.*` if present
    pub config_path: Option<PathBuf>,
    /// Env-style file; otherwise `.env` if present
    pub env_file: Option<PathBuf>,
}

impl WardenConfig {
    /// Load, resolve defaults and validate
    pub fn load(options: &LoadOptions) -> Result<Self> {
        match &options.env_file {
            Some(path) => {
                dotenvy::from_path(path).map_err(|e| {
                    WardenError::Configuration(format!(
                        "failed to read env file {}: {}",
                        path.display(),
                        e
                    ))
                })?;
            }
            None => {
                dotenvy::dotenv().ok();
            }
        }

        let environment = options
            .environment
            .clone()
            .or_else(|| std::env::var(format!("{}_ENVIRONMENT", ENV_PREFIX)).ok())
            .unwrap_or_else(default_environment);

        let mut builder = Config::builder();
        builder = match &options.config_path {
            Some(path) => builder.add_source(File::from(path.as_path()).required(true)),
            None => builder
                .add_source(File::with_name(&format!("config/{}", environment)).required(false)),
        };
        builder = builder
            .add_source(environment_source(None))
            .set_override("environment", environment.clone())?;

        debug!(environment = %environment, "Loading configuration");
        Self::from_builder(builder)
    }

    /// Build from prepared sources, resolve defaults and validate
    pub fn from_builder(builder: ConfigBuilder<config::builder::DefaultState>) -> Result<Self> {
        let mut config: WardenConfig = builder.build()?.try_deserialize()?;
        config.resolve_defaults();
        config.validate()?;
        Ok(config)
    }

    /// Fill derived defaults: container names, network, infra targets
    pub fn resolve_defaults(&mut self) {
        for role in Role::ORDER {
            let project = self.project.clone();
            let network = self.network.clone();
            let spec = self.containers.get_mut(role);
            if spec.name.trim().is_empty() {
                spec.name = format!("{}-{}", project, role);
            }
            if spec.network.trim().is_empty() {
                spec.network = network;
            }
        }

        if self.containers.database.image.is_empty() {
            self.containers.database.image = default_database().image;
        }
        if self.containers.cache.image.is_empty() {
            self.containers.cache.image = default_cache().image;
        }

        if self.monitor.infra_targets.is_empty() {
            self.monitor.infra_targets = [Role::Database, Role::Cache]
                .iter()
                .filter_map(|role| self.containers.get(*role).primary_host_port())
                .map(|port| format!("127.0.0.1:{}", port))
                .collect();
        }
    }

    /// Fail with every problem found
    pub fn validate(&self) -> Result<()> {
        let problems = self.problems();
        if problems.is_empty() {
            Ok(())
        } else {
            Err(WardenError::Configuration(problems.join("; ")))
        }
    }

    /// All configuration problems, empty when valid
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if !ENVIRONMENTS.contains(&self.environment.as_str()) {
            problems.push(format!(
                "environment must be one of {:?}, got '{}'",
                ENVIRONMENTS, self.environment
            ));
        }

        if self.engine.base_url.trim().is_empty() {
            problems.push("engine.base_url is required".to_string());
        } else if url::Url::parse(&self.engine.base_url).is_err() {
            problems.push(format!("engine.base_url '{}' is not a valid URL", self.engine.base_url));
        }
        if self.engine.api_key.trim().is_empty() {
            problems.push("engine.api_key is required".to_string());
        }
        if self.engine.endpoint_id == 0 {
            problems.push("engine.endpoint_id must be positive".to_string());
        }

        let mut names = HashSet::new();
        for (role, spec) in self.containers.ordered() {
            if spec.name.trim().is_empty() {
                problems.push(format!("containers.{}.name is required", role));
            } else if !names.insert(spec.name.as_str()) {
                problems.push(format!("container name '{}' is used more than once", spec.name));
            }
            if spec.image.trim().is_empty() {
                problems.push(format!("containers.{}.image is required", role));
            }
            for port in &spec.ports {
                if let Err(e) = PortMapping::parse(port) {
                    problems.push(format!("containers.{}.ports: {}", role, e));
                }
            }
            for entry in &spec.env {
                if !entry.contains('=') {
                    problems.push(format!(
                        "containers.{}.env entry '{}' must be KEY=VALUE",
                        role, entry
                    ));
                }
            }
        }

        if url::Url::parse(&self.monitor.app_health_url).is_err() {
            problems.push(format!(
                "monitor.app_health_url '{}' is not a valid URL",
                self.monitor.app_health_url
            ));
        }
        if let Some(webhook) = &self.notify.webhook_url {
            if url::Url::parse(webhook).is_err() {
                problems.push(format!("notify.webhook_url '{}' is not a valid URL", webhook));
            }
        }
        if self.lifecycle.poll_interval_secs == 0 {
            problems.push("lifecycle.poll_interval_secs must be positive".to_string());
        }
        if self.monitor.interval_secs == 0 {
            problems.push("monitor.interval_secs must be positive".to_string());
        }
        if self.lifecycle.max_daily_attempts == 0 {
            problems.push("lifecycle.max_daily_attempts must be positive".to_string());
        }
        if self.lifecycle.max_restart_attempts == 0 {
            problems.push("lifecycle.max_restart_attempts must be positive".to_string());
        }
        if self.lifecycle.backoff_multiplier < 1.0 {
            problems.push("lifecycle.backoff_multiplier must be at least 1.0".to_string());
        }
        if self.monitor.error_rate_window == 0 {
            problems.push("monitor.error_rate_window must be positive".to_string());
        }

        problems
    }
}

/// `WARDEN_`-prefixed environment source; `vars` replaces the process env in tests
pub fn environment_source(vars: Option<HashMap<String, String>>) -> Environment {
    let mut env = Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
        .list_separator(",");
    for key in LIST_KEYS {
        env = env.with_list_parse_key(key);
    }
    env.source(vars)
}
