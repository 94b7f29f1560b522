//! Observability infrastructure for the orchestrator
//!
//! Provides:
//! - Prometheus metrics (poll cycles, recoveries, alerts, probe latency)
//! - Structured logging of lifecycle and alerting events with tracing

use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Encoder, Histogram, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};
use std::sync::OnceLock;
use tracing::{error, info, warn};

/// Histogram buckets for health probe latency (in seconds)
const PROBE_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0, 10.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<OrchestratorMetricsInner> = OnceLock::new();

struct OrchestratorMetricsInner {
    poll_cycles: IntCounter,
    poll_errors: IntCounter,
    containers_running: IntGauge,
    recovery_attempts: IntCounterVec,
    recovery_outcomes: IntCounterVec,
    monitor_cycles: IntCounter,
    alerts_fired: IntCounterVec,
    app_probe_latency_seconds: Histogram,
    remedial_action_failures: IntCounterVec,
}

impl OrchestratorMetricsInner {
    fn new() -> Self {
        Self {
            poll_cycles: register_int_counter!(
                "warden_poll_cycles_total",
                "Lifecycle poll cycles completed"
            )
            .expect("Failed to register poll_cycles"),

            poll_errors: register_int_counter!(
                "warden_poll_errors_total",
                "Lifecycle poll cycles aborted by an engine error"
            )
            .expect("Failed to register poll_errors"),

            containers_running: register_int_gauge!(
                "warden_containers_running",
                "Managed containers observed running on the last poll"
            )
            .expect("Failed to register containers_running"),

            recovery_attempts: register_int_counter_vec!(
                "warden_recovery_attempts_total",
                "Recovery actions attempted",
                &["container", "action"]
            )
            .expect("Failed to register recovery_attempts"),

            recovery_outcomes: register_int_counter_vec!(
                "warden_recovery_outcomes_total",
                "Recovery workflows finished, by outcome",
                &["container", "outcome"]
            )
            .expect("Failed to register recovery_outcomes"),

            monitor_cycles: register_int_counter!(
                "warden_monitor_cycles_total",
                "Health monitor cycles completed"
            )
            .expect("Failed to register monitor_cycles"),

            alerts_fired: register_int_counter_vec!(
                "warden_alerts_fired_total",
                "Alerts fired, by rule and severity",
                &["rule", "severity"]
            )
            .expect("Failed to register alerts_fired"),

            app_probe_latency_seconds: register_histogram!(
                "warden_app_probe_latency_seconds",
                "Application health probe round-trip time",
                PROBE_BUCKETS.to_vec()
            )
            .expect("Failed to register app_probe_latency_seconds"),

            remedial_action_failures: register_int_counter_vec!(
                "warden_remedial_action_failures_total",
                "Remedial actions that failed",
                &["action"]
            )
            .expect("Failed to register remedial_action_failures"),
        }
    }
}

/// Orchestrator metrics for Prometheus exposition
///
/// A lightweight handle to the global metrics instance; clones share it.
#[derive(Clone)]
pub struct OrchestratorMetrics {
    _private: (),
}

impl Default for OrchestratorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl OrchestratorMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(OrchestratorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &OrchestratorMetricsInner {
        GLOBAL_METRICS.get_or_init(OrchestratorMetricsInner::new)
    }

    pub fn inc_poll_cycles(&self) {
        self.inner().poll_cycles.inc();
    }

    pub fn inc_poll_errors(&self) {
        self.inner().poll_errors.inc();
    }

    pub fn set_containers_running(&self, count: i64) {
        self.inner().containers_running.set(count);
    }

    pub fn inc_recovery_attempt(&self, container: &str, action: &str) {
        self.inner()
            .recovery_attempts
            .with_label_values(&[container, action])
            .inc();
    }

    /// `outcome` is one of `recovered`, `failed` or `exhausted`
    pub fn inc_recovery_outcome(&self, container: &str, outcome: &str) {
        self.inner()
            .recovery_outcomes
            .with_label_values(&[container, outcome])
            .inc();
    }

    pub fn inc_monitor_cycles(&self) {
        self.inner().monitor_cycles.inc();
    }

    pub fn inc_alerts_fired(&self, rule: &str, severity: &str) {
        self.inner()
            .alerts_fired
            .with_label_values(&[rule, severity])
            .inc();
    }

    pub fn observe_probe_latency(&self, duration_secs: f64) {
        self.inner().app_probe_latency_seconds.observe(duration_secs);
    }

    pub fn inc_remedial_action_failures(&self, action: &str) {
        self.inner()
            .remedial_action_failures
            .with_label_values(&[action])
            .inc();
    }
}

/// Render the default registry in the Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Structured logger for orchestrator events
///
/// Every line carries `event` and `environment` so log pipelines can key
/// on them.
#[derive(Clone)]
pub struct StructuredLogger {
    environment: String,
}

impl StructuredLogger {
    pub fn new(environment: impl Into<String>) -> Self {
        Self {
            environment: environment.into(),
        }
    }

    pub fn log_startup(&self, version: &str, containers: usize) {
        info!(
            event = "orchestrator_started",
            environment = %self.environment,
            version = %version,
            containers = containers,
            "Orchestrator started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "orchestrator_shutdown",
            environment = %self.environment,
            reason = %reason,
            "Orchestrator shutting down"
        );
    }

    pub fn log_state_change(&self, container: &str, from: &str, to: &str, engine_state: &str) {
        if to == "unhealthy" || to == "failed" {
            warn!(
                event = "container_state_changed",
                environment = %self.environment,
                container = %container,
                from = %from,
                to = %to,
                engine_state = %engine_state,
                "Container health changed"
            );
        } else {
            info!(
                event = "container_state_changed",
                environment = %self.environment,
                container = %container,
                from = %from,
                to = %to,
                engine_state = %engine_state,
                "Container health changed"
            );
        }
    }

    pub fn log_recovery_started(&self, container: &str, daily_attempt: u32, daily_cap: u32) {
        warn!(
            event = "recovery_started",
            environment = %self.environment,
            container = %container,
            daily_attempt = daily_attempt,
            daily_cap = daily_cap,
            "Starting container recovery"
        );
    }

    pub fn log_recovery_finished(&self, container: &str, success: bool, action: Option<&str>, attempts: u32) {
        if success {
            info!(
                event = "recovery_finished",
                environment = %self.environment,
                container = %container,
                success = true,
                action = ?action,
                attempts = attempts,
                "Container recovered"
            );
        } else {
            error!(
                event = "recovery_finished",
                environment = %self.environment,
                container = %container,
                success = false,
                attempts = attempts,
                "All recovery actions failed"
            );
        }
    }

    pub fn log_recovery_exhausted(&self, container: &str, attempts: u32, cap: u32) {
        error!(
            event = "recovery_exhausted",
            environment = %self.environment,
            container = %container,
            attempts = attempts,
            cap = cap,
            "Daily recovery budget exhausted, manual intervention required"
        );
    }

    pub fn log_alert(&self, rule: &str, severity: &str, message: &str) {
        match severity {
            "critical" => error!(
                event = "alert_fired",
                environment = %self.environment,
                rule = %rule,
                severity = %severity,
                message = %message,
                "Alert fired"
            ),
            "warning" => warn!(
                event = "alert_fired",
                environment = %self.environment,
                rule = %rule,
                severity = %severity,
                message = %message,
                "Alert fired"
            ),
            _ => info!(
                event = "alert_fired",
                environment = %self.environment,
                rule = %rule,
                severity = %severity,
                message = %message,
                "Alert fired"
            ),
        }
    }

    pub fn log_remedial_action(&self, rule: &str, action: &str, result: Result<(), &str>) {
        match result {
            Ok(()) => info!(
                event = "remedial_action",
                environment = %self.environment,
                rule = %rule,
                action = %action,
                success = true,
                "Remedial action completed"
            ),
            Err(e) => warn!(
                event = "remedial_action",
                environment = %self.environment,
                rule = %rule,
                action = %action,
                success = false,
                error = %e,
                "Remedial action failed"
            ),
        }
    }
}
