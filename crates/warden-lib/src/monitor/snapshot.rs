//! Metrics snapshots and their bounded history

use super::probe::{AppProbeResult, InfraCheck};
use crate::models::{Role, SystemStatus};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Everything one monitor cycle observed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub app: AppProbeResult,
    /// `None` when the engine could not be reached this cycle
    pub containers: Option<SystemStatus>,
    pub infra: Vec<InfraCheck>,
    /// Share of failed app probes over the rolling window, 0.0 to 1.0
    pub error_rate: f64,
}

impl MetricsSnapshot {
    /// Running state of a role; `None` when unknown this cycle
    pub fn container_running(&self, role: Role) -> Option<bool> {
        self.containers
            .as_ref()
            .and_then(|s| s.container_by_role(role))
            .map(|c| c.is_running())
    }

    pub fn unreachable_infra(&self) -> Vec<&InfraCheck> {
        self.infra.iter().filter(|c| !c.reachable).collect()
    }

    /// One-line summary for periodic console output
    pub fn summary_line(&self) -> String {
        let app = if self.app.healthy {
            match self.app.response_time_ms {
                Some(ms) => format!("app healthy ({}ms)", ms),
                None => "app healthy".to_string(),
            }
        } else {
            "app DOWN".to_string()
        };
        let containers = match &self.containers {
            Some(s) => format!("{} {}/{} running", s.health, s.running, s.total),
            None => "containers unknown".to_string(),
        };
        let infra_ok = self.infra.iter().filter(|c| c.reachable).count();
        format!(
            "[{}] {} | {} | infra {}/{} | error rate {:.0}%",
            self.timestamp.format("%H:%M:%S"),
            app,
            containers,
            infra_ok,
            self.infra.len(),
            self.error_rate * 100.0
        )
    }
}

/// Snapshots pruned by age and count
#[derive(Debug)]
pub struct SnapshotHistory {
    entries: VecDeque<MetricsSnapshot>,
    retention: Duration,
    max_entries: usize,
}

impl SnapshotHistory {
    pub fn new(retention: Duration, max_entries: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            retention,
            max_entries: max_entries.max(1),
        }
    }

    pub fn push(&mut self, snapshot: MetricsSnapshot) {
        let cutoff = snapshot.timestamp - self.retention;
        self.entries.push_back(snapshot);
        while self
            .entries
            .front()
            .map(|s| s.timestamp < cutoff)
            .unwrap_or(false)
        {
            self.entries.pop_front();
        }
        while self.entries.len() > self.max_entries {
            self.entries.pop_front();
        }
    }

    pub fn latest(&self) -> Option<&MetricsSnapshot> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Failure share over the last `window` probes, counting `current` as the newest
    pub fn rolling_error_rate(&self, current_healthy: bool, window: usize) -> f64 {
        let window = window.max(1);
        let previous: Vec<bool> = self
            .entries
            .iter()
            .rev()
            .take(window - 1)
            .map(|s| s.app.healthy)
            .collect();
        let total = previous.len() + 1;
        let failures =
            previous.iter().filter(|h| !**h).count() + usize::from(!current_healthy);
        failures as f64 / total as f64
    }

    /// Percentage of snapshots with a healthy app probe; `None` before the first one
    pub fn uptime_percent(&self) -> Option<f64> {
        if self.entries.is_empty() {
            return None;
        }
        let healthy = self.entries.iter().filter(|s| s.app.healthy).count();
        Some(healthy as f64 / self.entries.len() as f64 * 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(at: DateTime<Utc>, healthy: bool) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: at,
            app: AppProbeResult {
                healthy,
                ..Default::default()
            },
            containers: None,
            infra: Vec::new(),
            error_rate: 0.0,
        }
    }

    #[test]
    fn test_history_prunes_by_age() {
        let mut history = SnapshotHistory::new(Duration::hours(24), 100);
        let now = Utc::now();

        history.push(snapshot(now - Duration::hours(30), true));
        history.push(snapshot(now - Duration::hours(2), true));
        history.push(snapshot(now, false));

        assert_eq!(history.len(), 2);
        assert!(!history.latest().unwrap().app.healthy);
    }

    #[test]
    fn test_history_bounded_by_count() {
        let mut history = SnapshotHistory::new(Duration::hours(24), 3);
        let now = Utc::now();
        for i in 0..5 {
            history.push(snapshot(now + Duration::seconds(i), true));
        }
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn test_rolling_error_rate_uses_window() {
        let mut history = SnapshotHistory::new(Duration::hours(24), 100);
        let now = Utc::now();
        // an old failure outside the window of 4
        history.push(snapshot(now, false));
        for i in 1..=3 {
            history.push(snapshot(now + Duration::seconds(i), true));
        }

        assert_eq!(history.rolling_error_rate(true, 4), 0.0);
        assert_eq!(history.rolling_error_rate(false, 4), 0.25);
        assert_eq!(SnapshotHistory::new(Duration::hours(1), 10).rolling_error_rate(false, 10), 1.0);
    }

    #[test]
    fn test_uptime_percent() {
        let mut history = SnapshotHistory::new(Duration::hours(24), 100);
        assert_eq!(history.uptime_percent(), None);

        let now = Utc::now();
        history.push(snapshot(now, true));
        history.push(snapshot(now + Duration::seconds(1), true));
        history.push(snapshot(now + Duration::seconds(2), true));
        history.push(snapshot(now + Duration::seconds(3), false));

        assert_eq!(history.uptime_percent(), Some(75.0));
    }
}
