//! Orchestration façade
//!
//! `Orchestrator` owns the configuration, the engine client, the container
//! manager, the lifecycle manager and the health monitor, and exposes the
//! operator commands on top of them: validate, deploy, status, monitor
//! (start/stop) and emergency recovery.

use crate::config::WardenConfig;
use crate::engine::{ContainerEngine, EngineClient, EngineVersion};
use crate::error::Result;
use crate::health::{components, HealthRegistry};
use crate::lifecycle::{ContainerHealth, EmergencyReport, LifecycleManager};
use crate::manager::{ContainerManager, DeploymentSummary};
use crate::models::{OverallHealth, SystemStatus};
use crate::monitor::{default_rules, HealthMonitor, HealthProbe, HttpHealthProbe, MonitoringReport};
use crate::notify::{build_notifier, Notifier};
use crate::observability::StructuredLogger;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Outcome of `validate`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub environment: String,
    pub problems: Vec<String>,
    pub engine: Option<EngineVersion>,
    pub engine_error: Option<String>,
}

impl ValidationReport {
    pub fn ok(&self) -> bool {
        self.problems.is_empty() && self.engine.is_some()
    }
}

/// Engine status plus the lifecycle view of each container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub environment: String,
    pub system: SystemStatus,
    pub lifecycle: Vec<ContainerHealth>,
    pub polling: bool,
}

impl StatusReport {
    pub fn healthy(&self) -> bool {
        self.system.health == OverallHealth::Healthy
    }
}

pub struct Orchestrator {
    config: WardenConfig,
    engine: Arc<dyn ContainerEngine>,
    manager: Arc<ContainerManager>,
    lifecycle: LifecycleManager,
    monitor: HealthMonitor,
    health: HealthRegistry,
    logger: StructuredLogger,
}

impl Orchestrator {
    /// Build every component from a loaded configuration
    pub fn new(config: WardenConfig) -> Result<Self> {
        let engine: Arc<dyn ContainerEngine> = Arc::new(EngineClient::new(&config.engine)?);
        let notifier = build_notifier(&config.notify, &config.environment)?;
        let probe: Arc<dyn HealthProbe> = Arc::new(HttpHealthProbe::new(
            config.monitor.app_health_url.clone(),
            config.monitor.probe_timeout(),
        )?);
        Ok(Self::with_parts(config, engine, notifier, probe))
    }

    /// Build around an existing engine, notifier and probe
    pub fn with_parts(
        config: WardenConfig,
        engine: Arc<dyn ContainerEngine>,
        notifier: Arc<dyn Notifier>,
        probe: Arc<dyn HealthProbe>,
    ) -> Self {
        let health = HealthRegistry::new();
        let logger = StructuredLogger::new(&config.environment);
        let manager = Arc::new(ContainerManager::new(Arc::clone(&engine), &config));

        let lifecycle = LifecycleManager::new(
            Arc::clone(&manager),
            config.lifecycle.clone(),
            Arc::clone(&notifier),
            health.clone(),
            logger.clone(),
        );
        let monitor = HealthMonitor::new(
            Arc::clone(&manager),
            config.monitor.clone(),
            probe,
            default_rules(&config.monitor),
            notifier,
            lifecycle.locks(),
            health.clone(),
            logger.clone(),
        );

        Self {
            config,
            engine,
            manager,
            lifecycle,
            monitor,
            health,
            logger,
        }
    }

    pub fn config(&self) -> &WardenConfig {
        &self.config
    }

    pub fn manager(&self) -> &Arc<ContainerManager> {
        &self.manager
    }

    pub fn lifecycle(&self) -> &LifecycleManager {
        &self.lifecycle
    }

    pub fn monitor(&self) -> &HealthMonitor {
        &self.monitor
    }

    pub fn health(&self) -> &HealthRegistry {
        &self.health
    }

    /// Re-check the configuration and reach the engine
    pub async fn validate(&self) -> ValidationReport {
        let problems = self.config.problems();
        let (engine, engine_error) = match self.engine.version().await {
            Ok(version) => {
                info!(
                    api_version = %version.api_version,
                    version = %version.version,
                    "Engine reachable"
                );
                self.health.set_healthy(components::ENGINE).await;
                (Some(version), None)
            }
            Err(e) => {
                warn!(error = %e, "Engine unreachable");
                self.health
                    .set_unhealthy(components::ENGINE, e.to_string())
                    .await;
                (None, Some(e.to_string()))
            }
        };

        ValidationReport {
            environment: self.config.environment.clone(),
            problems,
            engine,
            engine_error,
        }
    }

    /// Deploy the stack in dependency order with both loops paused
    pub async fn deploy(&self, force_recreate: bool) -> DeploymentSummary {
        let monitoring = self.pause_monitor().await;
        let summary = self.lifecycle.deploy_system(force_recreate).await;
        self.resume_monitor(monitoring).await;
        summary
    }

    pub async fn status(&self) -> Result<StatusReport> {
        let system = self.manager.system_status().await?;
        Ok(StatusReport {
            environment: self.config.environment.clone(),
            system,
            lifecycle: self.lifecycle.container_states().await,
            polling: self.lifecycle.is_running().await,
        })
    }

    /// Start the poll loop and the health monitor
    pub async fn start(&self) {
        self.lifecycle.start().await;
        self.monitor.start().await;
        self.health.set_ready(true).await;
        self.logger
            .log_startup(VERSION, self.manager.containers().ordered().len());
    }

    /// Stop both loops, each within the lifecycle stop timeout
    pub async fn stop(&self, reason: &str) {
        self.logger.log_shutdown(reason);
        self.health.set_ready(false).await;
        self.monitor
            .stop(self.config.lifecycle.stop_timeout())
            .await;
        self.lifecycle.stop().await;
    }

    pub async fn emergency(&self) -> EmergencyReport {
        let monitoring = self.pause_monitor().await;
        let report = self.lifecycle.emergency_recovery().await;
        self.resume_monitor(monitoring).await;
        report
    }

    /// Stop the monitor loop for a manual operation; true if it was running
    async fn pause_monitor(&self) -> bool {
        let was_running = self
            .monitor
            .stop(self.config.lifecycle.stop_timeout())
            .await;
        if was_running {
            info!("Health monitor paused for manual deployment");
        }
        was_running
    }

    async fn resume_monitor(&self, was_running: bool) {
        if was_running {
            self.monitor.start().await;
        }
    }

    pub async fn report(&self) -> MonitoringReport {
        self.monitor.report().await
    }
}
