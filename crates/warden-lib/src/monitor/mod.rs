//! Health monitoring and alerting
//!
//! Each cycle builds a `MetricsSnapshot` from the application probe,
//! container status, infrastructure reachability and the rolling error rate,
//! then evaluates every alert rule against it. Firing rules are logged,
//! recorded and, with self-healing on, dispatch their remedial actions on a
//! separate task.

mod actions;
mod probe;
mod rules;
mod snapshot;

pub use actions::{cleanup_logs, free_disk_bytes, ActionContext, RemedialAction};
pub use probe::{check_tcp, AppProbeResult, HealthProbe, HttpHealthProbe, InfraCheck};
pub use rules::{default_rules, due_rules, AlertCondition, AlertRecord, AlertRule};
pub use snapshot::{MetricsSnapshot, SnapshotHistory};

use crate::config::MonitorSettings;
use crate::health::{components, HealthRegistry};
use crate::lifecycle::ContainerLocks;
use crate::manager::ContainerManager;
use crate::notify::{Notifier, Severity};
use crate::observability::{OrchestratorMetrics, StructuredLogger};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Alerts kept in the report's recent list
const RECENT_ALERTS: usize = 10;

/// Cooldown view of one rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleCooldown {
    pub rule: String,
    pub severity: Severity,
    pub last_fired: Option<DateTime<Utc>>,
    pub remaining_secs: u64,
}

/// The externally consumed monitoring status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringReport {
    pub generated_at: DateTime<Utc>,
    /// Share of retained snapshots with a healthy app probe, in percent
    pub uptime_percent: Option<f64>,
    pub snapshots: usize,
    pub alerts_last_24h: usize,
    pub cooldowns: Vec<RuleCooldown>,
    pub latest: Option<MetricsSnapshot>,
    pub recent_alerts: Vec<AlertRecord>,
    pub self_healing: bool,
}

/// Result of one monitor cycle
pub struct CycleOutcome {
    pub snapshot: MetricsSnapshot,
    pub fired: Vec<AlertRecord>,
    /// Remedial action tasks started this cycle
    pub pending_actions: Vec<JoinHandle<()>>,
}

impl CycleOutcome {
    /// Wait for this cycle's remedial actions
    pub async fn wait(self) -> Vec<AlertRecord> {
        for handle in self.pending_actions {
            if let Err(e) = handle.await {
                warn!(error = %e, "Remedial action task panicked");
            }
        }
        self.fired
    }
}

struct MonitorState {
    history: SnapshotHistory,
    last_fired: HashMap<String, DateTime<Utc>>,
    alerts: VecDeque<AlertRecord>,
}

struct MonitorWorker {
    shutdown: broadcast::Sender<()>,
    handle: JoinHandle<()>,
}

struct MonitorInner {
    settings: MonitorSettings,
    manager: Arc<ContainerManager>,
    probe: Arc<dyn HealthProbe>,
    rules: Vec<AlertRule>,
    actions: ActionContext,
    state: Mutex<MonitorState>,
    latest: watch::Sender<Option<MetricsSnapshot>>,
    health: HealthRegistry,
    metrics: OrchestratorMetrics,
    logger: StructuredLogger,
}

pub struct HealthMonitor {
    inner: Arc<MonitorInner>,
    worker: Mutex<Option<MonitorWorker>>,
}

impl HealthMonitor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        manager: Arc<ContainerManager>,
        settings: MonitorSettings,
        probe: Arc<dyn HealthProbe>,
        rules: Vec<AlertRule>,
        notifier: Arc<dyn Notifier>,
        locks: ContainerLocks,
        health: HealthRegistry,
        logger: StructuredLogger,
    ) -> Self {
        let actions = ActionContext {
            manager: Arc::clone(&manager),
            locks,
            notifier,
            log_dir: settings.log_dir.clone(),
            log_retention: Duration::from_secs(settings.log_retention_days * 86_400),
            min_free_disk_mb: settings.min_free_disk_mb,
        };
        let history = SnapshotHistory::new(
            chrono::Duration::hours(settings.history_retention_hours),
            settings.max_history,
        );
        let (latest, _) = watch::channel(None);

        Self {
            inner: Arc::new(MonitorInner {
                settings,
                manager,
                probe,
                rules,
                actions,
                state: Mutex::new(MonitorState {
                    history,
                    last_fired: HashMap::new(),
                    alerts: VecDeque::new(),
                }),
                latest,
                health,
                metrics: OrchestratorMetrics::new(),
                logger,
            }),
            worker: Mutex::new(None),
        }
    }

    /// Start the monitor loop; false if it was already running
    pub async fn start(&self) -> bool {
        let mut worker = self.worker.lock().await;
        if worker.is_some() {
            return false;
        }

        let (shutdown, shutdown_rx) = broadcast::channel(1);
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move { inner.run(shutdown_rx).await });
        *worker = Some(MonitorWorker { shutdown, handle });

        self.inner.health.set_healthy(components::MONITOR).await;
        true
    }

    /// Stop the monitor loop within `timeout`; returns whether it was running
    pub async fn stop(&self, timeout: Duration) -> bool {
        let Some(worker) = self.worker.lock().await.take() else {
            return false;
        };

        let _ = worker.shutdown.send(());
        let mut handle = worker.handle;
        if tokio::time::timeout(timeout, &mut handle).await.is_err() {
            warn!(
                timeout_secs = timeout.as_secs(),
                "Monitor loop did not stop in time, aborting"
            );
            handle.abort();
        }
        self.inner
            .health
            .set_degraded(components::MONITOR, "monitor stopped")
            .await;
        true
    }

    pub async fn is_running(&self) -> bool {
        self.worker
            .lock()
            .await
            .as_ref()
            .map(|w| !w.handle.is_finished())
            .unwrap_or(false)
    }

    /// Run one monitoring cycle now
    pub async fn run_cycle(&self) -> CycleOutcome {
        self.inner.run_cycle().await
    }

    /// Build a snapshot without evaluating rules or recording it
    pub async fn snapshot(&self) -> MetricsSnapshot {
        self.inner.build_snapshot().await
    }

    /// Receives every snapshot the loop records
    pub fn subscribe(&self) -> watch::Receiver<Option<MetricsSnapshot>> {
        self.inner.latest.subscribe()
    }

    pub async fn report(&self) -> MonitoringReport {
        self.inner.report(Utc::now()).await
    }

    pub async fn alert_history(&self) -> Vec<AlertRecord> {
        self.inner.state.lock().await.alerts.iter().cloned().collect()
    }

    pub fn rules(&self) -> &[AlertRule] {
        &self.inner.rules
    }
}

impl MonitorInner {
    async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_secs = self.settings.interval_secs,
            rules = self.rules.len(),
            self_healing = self.settings.self_healing_enabled,
            "Starting health monitor"
        );

        let mut ticker = interval(self.settings.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let outcome = self.run_cycle().await;
                    debug!(
                        fired = outcome.fired.len(),
                        app_healthy = outcome.snapshot.app.healthy,
                        "Monitor cycle complete"
                    );
                    // Remedial tasks run detached; the next cycle does not wait for them
                }
                _ = shutdown.recv() => {
                    info!("Shutting down health monitor");
                    break;
                }
            }
        }
    }

    async fn build_snapshot(&self) -> MetricsSnapshot {
        let (app, containers) = tokio::join!(self.probe.probe(), self.manager.system_status());
        if let Some(ms) = app.response_time_ms {
            self.metrics.observe_probe_latency(ms as f64 / 1000.0);
        }

        let containers = match containers {
            Ok(status) => Some(status),
            Err(e) => {
                warn!(error = %e, "Container status unavailable for snapshot");
                None
            }
        };

        let mut infra = Vec::with_capacity(self.settings.infra_targets.len());
        for target in &self.settings.infra_targets {
            infra.push(check_tcp(target, self.settings.infra_timeout()).await);
        }

        let error_rate = self
            .state
            .lock()
            .await
            .history
            .rolling_error_rate(app.healthy, self.settings.error_rate_window);

        MetricsSnapshot {
            timestamp: Utc::now(),
            app,
            containers,
            infra,
            error_rate,
        }
    }

    async fn run_cycle(self: &Arc<Self>) -> CycleOutcome {
        let generation = self.actions.locks.deploy_generation();
        // Every check completes before any rule sees the snapshot
        let snapshot = self.build_snapshot().await;
        let now = snapshot.timestamp;

        let fired: Vec<(AlertRule, AlertRecord)> = {
            let mut state = self.state.lock().await;
            state.history.push(snapshot.clone());

            let due: Vec<AlertRule> = due_rules(&self.rules, &snapshot, &state.last_fired, now)
                .into_iter()
                .cloned()
                .collect();

            let mut fired = Vec::with_capacity(due.len());
            for rule in due {
                state.last_fired.insert(rule.name.clone(), now);
                let record = AlertRecord {
                    rule: rule.name.clone(),
                    severity: rule.severity,
                    message: rule.condition.describe(&snapshot),
                    fired_at: now,
                    actions: rule.actions.clone(),
                };
                state.alerts.push_back(record.clone());
                fired.push((rule, record));
            }

            let cutoff = now - chrono::Duration::hours(24);
            while state
                .alerts
                .front()
                .map(|a| a.fired_at < cutoff)
                .unwrap_or(false)
            {
                state.alerts.pop_front();
            }
            let max = self.settings.max_alerts.max(1);
            while state.alerts.len() > max {
                state.alerts.pop_front();
            }
            fired
        };

        self.metrics.inc_monitor_cycles();
        if snapshot.containers.is_some() {
            self.health.set_healthy(components::MONITOR).await;
        } else {
            self.health
                .set_degraded(components::MONITOR, "container status unavailable")
                .await;
        }
        self.latest.send_replace(Some(snapshot.clone()));

        let mut pending_actions = Vec::new();
        let mut records = Vec::with_capacity(fired.len());
        for (rule, record) in fired {
            let severity = record.severity.to_string();
            self.logger.log_alert(&rule.name, &severity, &record.message);
            self.metrics.inc_alerts_fired(&rule.name, &severity);

            if self.settings.self_healing_enabled && !rule.actions.is_empty() {
                let inner = Arc::clone(self);
                let task_record = record.clone();
                pending_actions.push(tokio::spawn(async move {
                    inner.dispatch(&rule, &task_record, generation).await;
                }));
            }
            records.push(record);
        }

        CycleOutcome {
            snapshot,
            fired: records,
            pending_actions,
        }
    }

    /// Run a rule's actions in order; a failure never stops the rest
    async fn dispatch(&self, rule: &AlertRule, record: &AlertRecord, generation: u64) {
        for action in &rule.actions {
            match action.execute(&self.actions, record, generation).await {
                Ok(()) => self
                    .logger
                    .log_remedial_action(&rule.name, action.as_str(), Ok(())),
                Err(e) => {
                    self.metrics.inc_remedial_action_failures(action.as_str());
                    self.logger.log_remedial_action(
                        &rule.name,
                        action.as_str(),
                        Err(&e.to_string()),
                    );
                }
            }
        }
    }

    async fn report(&self, now: DateTime<Utc>) -> MonitoringReport {
        let state = self.state.lock().await;
        let day_ago = now - chrono::Duration::hours(24);

        let cooldowns = self
            .rules
            .iter()
            .map(|rule| {
                let last_fired = state.last_fired.get(&rule.name).copied();
                RuleCooldown {
                    rule: rule.name.clone(),
                    severity: rule.severity,
                    last_fired,
                    remaining_secs: rule.cooldown_remaining(last_fired, now).as_secs(),
                }
            })
            .collect();

        MonitoringReport {
            generated_at: now,
            uptime_percent: state.history.uptime_percent(),
            snapshots: state.history.len(),
            alerts_last_24h: state.alerts.iter().filter(|a| a.fired_at >= day_ago).count(),
            cooldowns,
            latest: state.history.latest().cloned(),
            recent_alerts: state
                .alerts
                .iter()
                .rev()
                .take(RECENT_ALERTS)
                .cloned()
                .collect(),
            self_healing: self.settings.self_healing_enabled,
        }
    }
}
