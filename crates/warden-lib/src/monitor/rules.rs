//! Alert rules and cooldown evaluation

use super::actions::RemedialAction;
use super::snapshot::MetricsSnapshot;
use crate::config::MonitorSettings;
use crate::models::{OverallHealth, Role};
use crate::notify::Severity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Predicate over a metrics snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AlertCondition {
    /// Health probe failed or timed out
    AppUnhealthy,
    /// Healthy, but slower than the threshold
    AppSlow { threshold_ms: u64 },
    /// The container for a role is not running
    ContainerDown { role: Role },
    /// Rolling probe failure share above the threshold
    HighErrorRate { threshold: f64 },
    InfraUnreachable,
    /// Not every container is running
    SystemDegraded,
}

impl AlertCondition {
    pub fn matches(&self, snapshot: &MetricsSnapshot) -> bool {
        match self {
            AlertCondition::AppUnhealthy => !snapshot.app.healthy,
            AlertCondition::AppSlow { threshold_ms } => {
                snapshot.app.healthy
                    && snapshot
                        .app
                        .response_time_ms
                        .map(|ms| ms > *threshold_ms)
                        .unwrap_or(false)
            }
            AlertCondition::ContainerDown { role } => {
                snapshot.container_running(*role) == Some(false)
            }
            AlertCondition::HighErrorRate { threshold } => snapshot.error_rate > *threshold,
            AlertCondition::InfraUnreachable => !snapshot.unreachable_infra().is_empty(),
            AlertCondition::SystemDegraded => snapshot
                .containers
                .as_ref()
                .map(|s| s.health != OverallHealth::Healthy)
                .unwrap_or(false),
        }
    }

    /// Message for a firing alert
    pub fn describe(&self, snapshot: &MetricsSnapshot) -> String {
        match self {
            AlertCondition::AppUnhealthy => format!(
                "Application health check failed: {}",
                snapshot.app.error.as_deref().unwrap_or("unhealthy")
            ),
            AlertCondition::AppSlow { threshold_ms } => format!(
                "Application responded in {}ms (threshold {}ms)",
                snapshot.app.response_time_ms.unwrap_or_default(),
                threshold_ms
            ),
            AlertCondition::ContainerDown { role } => {
                let detail = snapshot
                    .containers
                    .as_ref()
                    .and_then(|s| s.container_by_role(*role))
                    .map(|c| format!("{} is {}", c.name, c.state))
                    .unwrap_or_else(|| format!("{} container not running", role));
                format!("{} container down: {}", role, detail)
            }
            AlertCondition::HighErrorRate { threshold } => format!(
                "Error rate {:.1}% exceeds {:.1}%",
                snapshot.error_rate * 100.0,
                threshold * 100.0
            ),
            AlertCondition::InfraUnreachable => {
                let targets: Vec<&str> = snapshot
                    .unreachable_infra()
                    .iter()
                    .map(|c| c.target.as_str())
                    .collect();
                format!("Unreachable infrastructure: {}", targets.join(", "))
            }
            AlertCondition::SystemDegraded => match &snapshot.containers {
                Some(s) => format!(
                    "System {}: {}/{} containers running",
                    s.health, s.running, s.total
                ),
                None => "System status unavailable".to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRule {
    pub name: String,
    pub condition: AlertCondition,
    pub severity: Severity,
    pub cooldown_secs: u64,
    /// Run in order when the rule fires and self-healing is on
    pub actions: Vec<RemedialAction>,
}

impl AlertRule {
    pub fn new(
        name: impl Into<String>,
        condition: AlertCondition,
        severity: Severity,
        cooldown: Duration,
        actions: Vec<RemedialAction>,
    ) -> Self {
        Self {
            name: name.into(),
            condition,
            severity,
            cooldown_secs: cooldown.as_secs(),
            actions,
        }
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    /// Time left before the rule may fire again
    pub fn cooldown_remaining(&self, last_fired: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Duration {
        let Some(last) = last_fired else {
            return Duration::ZERO;
        };
        let elapsed = (now - last).to_std().unwrap_or(Duration::ZERO);
        self.cooldown().saturating_sub(elapsed)
    }
}

/// The built-in rule registry
pub fn default_rules(settings: &MonitorSettings) -> Vec<AlertRule> {
    let cooldown = settings.alert_cooldown();
    vec![
        AlertRule::new(
            "app_down",
            AlertCondition::AppUnhealthy,
            Severity::Critical,
            cooldown,
            vec![RemedialAction::RestartApp, RemedialAction::NotifyAdmin],
        ),
        AlertRule::new(
            "app_slow",
            AlertCondition::AppSlow {
                threshold_ms: settings.slow_response_ms,
            },
            Severity::Warning,
            cooldown,
            vec![RemedialAction::CheckResources],
        ),
        AlertRule::new(
            "database_down",
            AlertCondition::ContainerDown {
                role: Role::Database,
            },
            Severity::Critical,
            cooldown,
            vec![RemedialAction::RestartDatabase, RemedialAction::NotifyAdmin],
        ),
        AlertRule::new(
            "cache_down",
            AlertCondition::ContainerDown { role: Role::Cache },
            Severity::Warning,
            cooldown,
            vec![RemedialAction::RestartCache],
        ),
        AlertRule::new(
            "high_error_rate",
            AlertCondition::HighErrorRate {
                threshold: settings.error_rate_threshold,
            },
            Severity::Warning,
            cooldown,
            vec![RemedialAction::CheckResources, RemedialAction::NotifyAdmin],
        ),
        AlertRule::new(
            "infra_unreachable",
            AlertCondition::InfraUnreachable,
            Severity::Warning,
            cooldown,
            vec![RemedialAction::NotifyAdmin],
        ),
        AlertRule::new(
            "system_degraded",
            AlertCondition::SystemDegraded,
            Severity::Warning,
            cooldown,
            vec![RemedialAction::CleanupLogs, RemedialAction::CheckResources],
        ),
    ]
}

/// Rules whose predicate holds and whose cooldown has elapsed at `now`
pub fn due_rules<'a>(
    rules: &'a [AlertRule],
    snapshot: &MetricsSnapshot,
    last_fired: &HashMap<String, DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Vec<&'a AlertRule> {
    rules
        .iter()
        .filter(|rule| rule.condition.matches(snapshot))
        .filter(|rule| {
            rule.cooldown_remaining(last_fired.get(&rule.name).copied(), now)
                .is_zero()
        })
        .collect()
}

/// One firing of a rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRecord {
    pub rule: String,
    pub severity: Severity,
    pub message: String,
    pub fired_at: DateTime<Utc>,
    pub actions: Vec<RemedialAction>,
}
