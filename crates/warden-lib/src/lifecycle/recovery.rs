//! Recovery tiers and per-container serialization

use crate::config::LifecycleSettings;
use crate::error::{Result, WardenError};
use crate::manager::ContainerManager;
use crate::models::DeploymentResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// What a recovery tier does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryKind {
    /// Restart the existing container
    Restart,
    /// Stop, remove, create and start the container
    Recreate,
    /// Recreate every container in dependency order
    FullSystem,
}

impl RecoveryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryKind::Restart => "restart",
            RecoveryKind::Recreate => "recreate",
            RecoveryKind::FullSystem => "full_system",
        }
    }
}

impl std::fmt::Display for RecoveryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recovery tier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryAction {
    pub kind: RecoveryKind,
    /// Lower runs first
    pub priority: u8,
    /// Attempts of this tier within one workflow
    pub max_attempts: u32,
    /// Growth of the wait between attempts of this tier
    pub backoff_multiplier: f64,
}

impl RecoveryAction {
    pub fn name(&self) -> &'static str {
        self.kind.as_str()
    }

    /// Wait before retry number `attempt` (2 or more) of this tier
    pub fn backoff(&self, base: Duration, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(2) as i32;
        base.mul_f64(self.backoff_multiplier.max(1.0).powi(exponent))
    }

    pub async fn execute(&self, manager: &ContainerManager, container: &str) -> Result<()> {
        match self.kind {
            RecoveryKind::Restart => manager.restart(container).await,
            RecoveryKind::Recreate => deploy_outcome(manager.recreate(container).await),
            RecoveryKind::FullSystem => match manager.deploy_all(true).await.to_error() {
                Some(e) => Err(e),
                None => Ok(()),
            },
        }
    }
}

fn deploy_outcome(result: DeploymentResult) -> Result<()> {
    if result.success {
        Ok(())
    } else {
        Err(WardenError::DeployFailed {
            container: result.container,
            error: result.error.unwrap_or_default(),
        })
    }
}

/// Tiers in the order a workflow tries them
pub fn default_actions(settings: &LifecycleSettings) -> Vec<RecoveryAction> {
    let mut actions = vec![
        RecoveryAction {
            kind: RecoveryKind::Restart,
            priority: 1,
            max_attempts: settings.max_restart_attempts,
            backoff_multiplier: settings.backoff_multiplier,
        },
        RecoveryAction {
            kind: RecoveryKind::Recreate,
            priority: 2,
            max_attempts: 1,
            backoff_multiplier: settings.backoff_multiplier,
        },
        RecoveryAction {
            kind: RecoveryKind::FullSystem,
            priority: 3,
            max_attempts: 1,
            backoff_multiplier: settings.backoff_multiplier,
        },
    ];
    actions.sort_by_key(|a| a.priority);
    actions
}

/// Outcome of one recovery workflow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryReport {
    pub container: String,
    pub success: bool,
    /// Tier that brought the container back
    pub action: Option<RecoveryKind>,
    pub attempts: u32,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub error: Option<String>,
}

/// Per-container async mutexes
///
/// Anything that mutates a container takes its lock, so recovery workflows,
/// remedial restarts and manual deploys never interleave. A whole-stack
/// deploy takes every lock in dependency order and bumps the deploy
/// generation, which lets work queued before it notice it was superseded.
#[derive(Debug, Clone, Default)]
pub struct ContainerLocks {
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
    generation: Arc<AtomicU64>,
}

impl ContainerLocks {
    pub fn new() -> Self {
        Self::default()
    }

    async fn handle(&self, container: &str) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .await
            .entry(container.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    pub async fn acquire(&self, container: &str) -> OwnedMutexGuard<()> {
        self.handle(container).await.lock_owned().await
    }

    /// Lock several containers in the given order
    pub async fn acquire_all(&self, containers: &[&str]) -> Vec<OwnedMutexGuard<()>> {
        let mut guards = Vec::with_capacity(containers.len());
        for container in containers {
            guards.push(self.acquire(container).await);
        }
        guards
    }

    /// Number of whole-stack deploys completed so far
    pub fn deploy_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Record a whole-stack deploy; call while holding every lock
    pub fn mark_deployed(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Whether some worker currently holds the container's lock
    pub async fn is_locked(&self, container: &str) -> bool {
        let handle = self.handle(container).await;
        let locked = handle.try_lock().is_err();
        locked
    }
}
