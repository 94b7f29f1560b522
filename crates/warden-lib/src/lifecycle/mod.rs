//! Container lifecycle management
//!
//! This module provides:
//! - The poll loop that re-checks system status on a fixed interval
//! - A per-container health state machine:
//!   unknown -> healthy <-> unhealthy -> recovering -> healthy | failed
//! - Tiered recovery workflows, each on its own task, capped per day
//! - Manual deploy and emergency recovery that pause polling while they run
//!
//! The poll task is the only writer of the state machine. Recovery workers
//! report back through their join handles, which the next cycle reaps.

mod ledger;
mod recovery;

pub use ledger::RecoveryLedger;
pub use recovery::{
    default_actions, ContainerLocks, RecoveryAction, RecoveryKind, RecoveryReport,
};

use crate::config::LifecycleSettings;
use crate::error::{Result, WardenError};
use crate::health::{components, HealthRegistry};
use crate::manager::{ContainerManager, DeploymentSummary};
use crate::models::{ContainerRuntimeState, ContainerState, OverallHealth, Role, SystemStatus};
use crate::notify::{notify_best_effort, Notifier, Severity};
use crate::observability::{OrchestratorMetrics, StructuredLogger};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, Mutex, OwnedMutexGuard, RwLock};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Log lines attached to a failed-recovery notification
const LOG_TAIL_LINES: usize = 50;

/// Health of one container as tracked by the poll loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Unknown,
    Healthy,
    Unhealthy,
    Recovering,
    /// Recovery failed or the daily budget is spent
    Failed,
}

impl HealthState {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthState::Unknown => "unknown",
            HealthState::Healthy => "healthy",
            HealthState::Unhealthy => "unhealthy",
            HealthState::Recovering => "recovering",
            HealthState::Failed => "failed",
        }
    }

    /// Not running and not being worked on
    fn needs_recovery(&self) -> bool {
        matches!(self, HealthState::Unhealthy | HealthState::Failed)
    }
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerHealth {
    pub name: String,
    pub role: Role,
    pub state: HealthState,
    /// Engine state seen on the last poll
    pub engine_state: Option<ContainerState>,
    pub since: DateTime<Utc>,
}

impl ContainerHealth {
    fn unknown(name: &str, role: Role) -> Self {
        Self {
            name: name.to_string(),
            role,
            state: HealthState::Unknown,
            engine_state: None,
            since: Utc::now(),
        }
    }
}

/// Result of `emergency_recovery`, returned whatever happened
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyReport {
    pub before: Option<SystemStatus>,
    pub deployment: DeploymentSummary,
    pub after: Option<SystemStatus>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl EmergencyReport {
    pub fn success(&self) -> bool {
        self.deployment.success
            && self
                .after
                .as_ref()
                .map(|s| s.health == OverallHealth::Healthy)
                .unwrap_or(false)
    }
}

struct PollWorker {
    shutdown: broadcast::Sender<()>,
    handle: JoinHandle<()>,
}

struct LifecycleInner {
    manager: Arc<ContainerManager>,
    settings: LifecycleSettings,
    actions: Vec<RecoveryAction>,
    notifier: Arc<dyn Notifier>,
    ledger: RecoveryLedger,
    locks: ContainerLocks,
    states: RwLock<HashMap<String, ContainerHealth>>,
    in_flight: Mutex<HashMap<String, JoinHandle<RecoveryReport>>>,
    history: Mutex<VecDeque<RecoveryReport>>,
    health: HealthRegistry,
    metrics: OrchestratorMetrics,
    logger: StructuredLogger,
}

/// Owns the poll loop and every recovery workflow
pub struct LifecycleManager {
    inner: Arc<LifecycleInner>,
    worker: Mutex<Option<PollWorker>>,
}

impl LifecycleManager {
    pub fn new(
        manager: Arc<ContainerManager>,
        settings: LifecycleSettings,
        notifier: Arc<dyn Notifier>,
        health: HealthRegistry,
        logger: StructuredLogger,
    ) -> Self {
        let actions = default_actions(&settings);
        let ledger = RecoveryLedger::new(settings.max_daily_attempts);
        Self {
            inner: Arc::new(LifecycleInner {
                manager,
                settings,
                actions,
                notifier,
                ledger,
                locks: ContainerLocks::new(),
                states: RwLock::new(HashMap::new()),
                in_flight: Mutex::new(HashMap::new()),
                history: Mutex::new(VecDeque::new()),
                health,
                metrics: OrchestratorMetrics::new(),
                logger,
            }),
            worker: Mutex::new(None),
        }
    }

    /// Start the poll loop; false if it was already running
    pub async fn start(&self) -> bool {
        let mut worker = self.worker.lock().await;
        if worker.is_some() {
            return false;
        }

        let (shutdown, shutdown_rx) = broadcast::channel(1);
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move { inner.run(shutdown_rx).await });
        *worker = Some(PollWorker { shutdown, handle });

        self.inner.health.set_healthy(components::POLL_LOOP).await;
        true
    }

    /// Stop the poll loop, waiting up to the configured timeout
    ///
    /// Returns whether a loop was running. Recovery workflows already in
    /// flight are left to finish.
    pub async fn stop(&self) -> bool {
        let Some(worker) = self.worker.lock().await.take() else {
            return false;
        };

        let _ = worker.shutdown.send(());
        let mut handle = worker.handle;
        let timeout = self.inner.settings.stop_timeout();
        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(Ok(())) => debug!("Poll loop stopped"),
            Ok(Err(e)) => warn!(error = %e, "Poll loop ended abnormally"),
            Err(_) => {
                warn!(
                    timeout_secs = timeout.as_secs(),
                    "Poll loop did not stop in time, aborting"
                );
                handle.abort();
            }
        }

        self.inner
            .health
            .set_degraded(components::POLL_LOOP, "poll loop stopped")
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

    /// Run one poll cycle; the loop calls this on every tick
    pub async fn poll_once(&self) -> Result<SystemStatus> {
        self.inner.poll_once().await
    }

    /// Wait for every in-flight recovery workflow and apply its outcome
    pub async fn join_recoveries(&self) {
        self.inner.join_recoveries().await;
    }

    /// Run a recovery workflow for one container now, on the caller's task
    pub async fn recover_container(&self, name: &str) -> Result<RecoveryReport> {
        self.inner.manager.resolve(name)?;
        self.inner.acquire_budget(name).await?;
        let generation = self.inner.locks.deploy_generation();
        Ok(self.inner.run_workflow(name, generation).await)
    }

    /// Deploy the whole stack with polling paused
    pub async fn deploy_system(&self, force_recreate: bool) -> DeploymentSummary {
        let was_running = self.stop().await;

        let summary = self.inner.deploy_all_locked(force_recreate).await;
        if summary.success {
            let wait = self.inner.manager.settings().stabilization();
            debug!(wait_secs = wait.as_secs(), "Waiting for the stack to stabilize");
            tokio::time::sleep(wait).await;
        }

        if was_running {
            self.start().await;
        }
        summary
    }

    /// Force-recreate every container whatever its current health
    pub async fn emergency_recovery(&self) -> EmergencyReport {
        let started_at = Utc::now();
        let clock = Instant::now();
        warn!("Emergency recovery: recreating every container");

        let was_running = self.stop().await;
        let before = self.inner.status_or_log("before emergency recovery").await;

        let deployment = self.inner.deploy_all_locked(true).await;
        tokio::time::sleep(self.inner.manager.settings().emergency_stabilization()).await;

        let after = self.inner.status_or_log("after emergency recovery").await;
        if was_running {
            self.start().await;
        }

        let report = EmergencyReport {
            before,
            deployment,
            after,
            started_at,
            duration_ms: clock.elapsed().as_millis() as u64,
        };

        let summary = match &report.after {
            Some(status) => format!("{}/{} containers running", status.running, status.total),
            None => "status unavailable".to_string(),
        };
        let (severity, title) = if report.success() {
            (Severity::Info, "Emergency recovery completed")
        } else {
            (Severity::Critical, "Emergency recovery failed")
        };
        notify_best_effort(self.inner.notifier.as_ref(), severity, title, &summary).await;

        report
    }

    /// State machine snapshot in dependency order
    pub async fn container_states(&self) -> Vec<ContainerHealth> {
        let states = self.inner.states.read().await;
        self.inner
            .manager
            .containers()
            .ordered()
            .into_iter()
            .map(|(role, spec)| {
                states
                    .get(&spec.name)
                    .cloned()
                    .unwrap_or_else(|| ContainerHealth::unknown(&spec.name, role))
            })
            .collect()
    }

    pub async fn recovery_history(&self) -> Vec<RecoveryReport> {
        self.inner.history.lock().await.iter().cloned().collect()
    }

    pub fn ledger(&self) -> &RecoveryLedger {
        &self.inner.ledger
    }

    /// Lock registry shared with anything else that restarts containers
    pub fn locks(&self) -> ContainerLocks {
        self.inner.locks.clone()
    }

    pub fn actions(&self) -> &[RecoveryAction] {
        &self.inner.actions
    }
}

impl LifecycleInner {
    async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_secs = self.settings.poll_interval_secs,
            recovery_enabled = self.settings.recovery_enabled,
            "Starting lifecycle poll loop"
        );

        let mut ticker = interval(self.settings.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // A bad cycle is logged and the loop carries on
                    if let Err(e) = self.poll_once().await {
                        warn!(error = %e, "Poll cycle aborted");
                    }
                }
                _ = shutdown.recv() => {
                    info!("Shutting down lifecycle poll loop");
                    break;
                }
            }
        }
    }

    async fn poll_once(self: &Arc<Self>) -> Result<SystemStatus> {
        self.reap_finished().await;

        let status = match self.manager.system_status().await {
            Ok(status) => status,
            Err(e) => {
                self.metrics.inc_poll_errors();
                self.health
                    .set_degraded(components::ENGINE, e.to_string())
                    .await;
                return Err(e);
            }
        };
        self.metrics.inc_poll_cycles();
        self.metrics.set_containers_running(status.running as i64);
        self.health.set_healthy(components::ENGINE).await;
        self.health.record_stack(&status).await;

        let in_flight: HashSet<String> = self.in_flight.lock().await.keys().cloned().collect();
        let mut went_down = false;
        {
            let mut states = self.states.write().await;
            for container in &status.containers {
                if self.observe(&mut states, container, &in_flight) {
                    went_down = true;
                }
            }
        }

        if went_down && self.settings.recovery_enabled {
            let targets: Vec<String> = {
                let states = self.states.read().await;
                status
                    .containers
                    .iter()
                    .filter(|c| !in_flight.contains(&c.name))
                    .filter(|c| {
                        states
                            .get(&c.name)
                            .map(|h| h.state.needs_recovery())
                            .unwrap_or(false)
                    })
                    .map(|c| c.name.clone())
                    .collect()
            };
            for name in targets {
                self.trigger_recovery(&name).await;
            }
        }

        Ok(status)
    }

    /// Advance one container's state machine; true on a running -> down transition
    fn observe(
        &self,
        states: &mut HashMap<String, ContainerHealth>,
        container: &ContainerRuntimeState,
        in_flight: &HashSet<String>,
    ) -> bool {
        let entry = states
            .entry(container.name.clone())
            .or_insert_with(|| ContainerHealth::unknown(&container.name, container.role));
        entry.engine_state = Some(container.state);

        let previous = entry.state;
        let mut went_down = false;
        let next = if in_flight.contains(&container.name) {
            HealthState::Recovering
        } else if container.is_running() {
            HealthState::Healthy
        } else {
            match previous {
                HealthState::Unknown | HealthState::Healthy => {
                    went_down = true;
                    HealthState::Unhealthy
                }
                HealthState::Recovering => HealthState::Unhealthy,
                other => other,
            }
        };

        if next != previous {
            self.logger.log_state_change(
                &container.name,
                previous.as_str(),
                next.as_str(),
                container.state.as_str(),
            );
            entry.state = next;
            entry.since = Utc::now();
        }
        went_down
    }

    async fn set_state(&self, name: &str, state: HealthState) {
        let mut states = self.states.write().await;
        if let Some(entry) = states.get_mut(name) {
            if entry.state != state {
                self.logger.log_state_change(
                    name,
                    entry.state.as_str(),
                    state.as_str(),
                    entry.engine_state.map(|s| s.as_str()).unwrap_or("unknown"),
                );
                entry.state = state;
                entry.since = Utc::now();
            }
        }
    }

    /// Take one unit of today's budget, reporting exhaustion
    async fn acquire_budget(&self, name: &str) -> Result<u32> {
        match self.ledger.try_acquire(name, RecoveryLedger::today()).await {
            Ok(attempt) => {
                self.logger
                    .log_recovery_started(name, attempt, self.ledger.cap());
                Ok(attempt)
            }
            Err(e) => {
                if let WardenError::RecoveryExhausted { attempts, cap, .. } = &e {
                    self.logger.log_recovery_exhausted(name, *attempts, *cap);
                }
                self.metrics.inc_recovery_outcome(name, "exhausted");
                notify_best_effort(
                    self.notifier.as_ref(),
                    Severity::Critical,
                    &format!("Recovery exhausted: {}", name),
                    &format!("{}. Manual intervention required.", e),
                )
                .await;
                Err(e)
            }
        }
    }

    async fn trigger_recovery(self: &Arc<Self>, name: &str) {
        if self.acquire_budget(name).await.is_err() {
            self.set_state(name, HealthState::Failed).await;
            return;
        }

        self.set_state(name, HealthState::Recovering).await;
        let inner = Arc::clone(self);
        let container = name.to_string();
        let generation = self.locks.deploy_generation();
        let handle =
            tokio::spawn(async move { inner.run_workflow(&container, generation).await });
        self.in_flight.lock().await.insert(name.to_string(), handle);
    }

    async fn reap_finished(&self) {
        let finished: Vec<(String, JoinHandle<RecoveryReport>)> = {
            let mut in_flight = self.in_flight.lock().await;
            let done: Vec<String> = in_flight
                .iter()
                .filter(|(_, handle)| handle.is_finished())
                .map(|(name, _)| name.clone())
                .collect();
            done.into_iter()
                .filter_map(|name| in_flight.remove(&name).map(|h| (name, h)))
                .collect()
        };

        for (name, handle) in finished {
            self.apply_outcome(&name, handle.await).await;
        }
    }

    async fn join_recoveries(&self) {
        let pending: Vec<(String, JoinHandle<RecoveryReport>)> =
            self.in_flight.lock().await.drain().collect();
        for (name, handle) in pending {
            self.apply_outcome(&name, handle.await).await;
        }
    }

    async fn apply_outcome(&self, name: &str, outcome: std::result::Result<RecoveryReport, JoinError>) {
        let state = match outcome {
            Ok(report) if report.success => HealthState::Healthy,
            Ok(_) => HealthState::Failed,
            Err(e) => {
                error!(container = %name, error = %e, "Recovery worker panicked");
                HealthState::Failed
            }
        };
        self.set_state(name, state).await;
    }

    /// Try each tier in priority order until the container runs again
    ///
    /// `generation` is the deploy generation the failure was observed in.
    /// If a whole-stack deploy finished while the workflow waited for the
    /// container lock and the container is running, there is nothing to do.
    async fn run_workflow(&self, name: &str, generation: u64) -> RecoveryReport {
        let mut guard = Some(self.locks.acquire(name).await);
        let started_at = Utc::now();
        let clock = Instant::now();
        let base = self.settings.recovery_delay();

        if self.locks.deploy_generation() != generation {
            if let Ok(state) = self.manager.container_state(name).await {
                if state.is_running() {
                    info!(container = %name, "Stack redeployed while recovery was queued, standing down");
                    return RecoveryReport {
                        container: name.to_string(),
                        success: true,
                        action: None,
                        attempts: 0,
                        started_at,
                        duration_ms: clock.elapsed().as_millis() as u64,
                        error: None,
                    };
                }
            }
        }

        let mut attempts = 0u32;
        let mut last_error = None;

        for action in &self.actions {
            for attempt in 1..=action.max_attempts {
                if attempts > 0 {
                    let wait = if attempt == 1 {
                        base
                    } else {
                        action.backoff(base, attempt)
                    };
                    tokio::time::sleep(wait).await;
                }
                attempts += 1;
                self.metrics.inc_recovery_attempt(name, action.name());
                info!(container = %name, action = %action.kind, attempt, "Attempting recovery");

                let outcome = if action.kind == RecoveryKind::FullSystem {
                    // Swap our own lock for every lock in dependency order
                    drop(guard.take());
                    let _stack = self.lock_stack().await;
                    let outcome = self.attempt(action, name).await;
                    self.locks.mark_deployed();
                    outcome
                } else {
                    self.attempt(action, name).await
                };
                if guard.is_none() {
                    guard = Some(self.locks.acquire(name).await);
                }

                match outcome {
                    Ok(()) => {
                        notify_best_effort(
                            self.notifier.as_ref(),
                            Severity::Info,
                            &format!("Container recovered: {}", name),
                            &format!("{} succeeded after {} attempt(s)", action.kind, attempts),
                        )
                        .await;
                        return self
                            .finish(RecoveryReport {
                                container: name.to_string(),
                                success: true,
                                action: Some(action.kind),
                                attempts,
                                started_at,
                                duration_ms: clock.elapsed().as_millis() as u64,
                                error: None,
                            })
                            .await;
                    }
                    Err(e) => {
                        warn!(container = %name, action = %action.kind, attempt, error = %e, "Recovery attempt failed");
                        last_error = Some(e);
                    }
                }
            }
        }

        let logs = self
            .manager
            .logs(name, LOG_TAIL_LINES)
            .await
            .unwrap_or_else(|e| format!("(logs unavailable: {})", e));
        let error = last_error.unwrap_or_else(|| "no recovery action configured".to_string());
        notify_best_effort(
            self.notifier.as_ref(),
            Severity::Critical,
            &format!("Recovery failed: {}", name),
            &format!(
                "All recovery actions failed after {} attempt(s): {}\n\nLast {} log lines:\n{}",
                attempts, error, LOG_TAIL_LINES, logs
            ),
        )
        .await;

        self.finish(RecoveryReport {
            container: name.to_string(),
            success: false,
            action: None,
            attempts,
            started_at,
            duration_ms: clock.elapsed().as_millis() as u64,
            error: Some(error),
        })
        .await
    }

    /// Run one tier and confirm the container is running afterwards
    async fn attempt(&self, action: &RecoveryAction, name: &str) -> std::result::Result<(), String> {
        action
            .execute(&self.manager, name)
            .await
            .map_err(|e| e.to_string())?;

        match self.manager.container_state(name).await {
            Ok(state) if state.is_running() => Ok(()),
            Ok(state) => Err(format!("container is {} after {}", state.state, action.kind)),
            Err(e) => Err(format!("could not verify container state: {}", e)),
        }
    }

    async fn finish(&self, report: RecoveryReport) -> RecoveryReport {
        let outcome = if report.success { "recovered" } else { "failed" };
        self.metrics.inc_recovery_outcome(&report.container, outcome);
        self.logger.log_recovery_finished(
            &report.container,
            report.success,
            report.action.map(|a| a.as_str()),
            report.attempts,
        );

        let mut history = self.history.lock().await;
        history.push_back(report.clone());
        while history.len() > self.settings.recovery_history_size.max(1) {
            history.pop_front();
        }
        report
    }

    /// Every container lock, taken in dependency order
    async fn lock_stack(&self) -> Vec<OwnedMutexGuard<()>> {
        let names: Vec<String> = self
            .manager
            .containers()
            .ordered()
            .into_iter()
            .map(|(_, spec)| spec.name.clone())
            .collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        self.locks.acquire_all(&refs).await
    }

    /// `deploy_all` while holding every container lock
    async fn deploy_all_locked(&self, force_recreate: bool) -> DeploymentSummary {
        let _guards = self.lock_stack().await;
        let summary = self.manager.deploy_all(force_recreate).await;
        self.locks.mark_deployed();
        summary
    }

    async fn status_or_log(&self, stage: &str) -> Option<SystemStatus> {
        match self.manager.system_status().await {
            Ok(status) => Some(status),
            Err(e) => {
                warn!(stage = %stage, error = %e, "Could not read system status");
                None
            }
        }
    }
}
