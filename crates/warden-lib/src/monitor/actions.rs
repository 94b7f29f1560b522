//! Remedial actions run by firing alert rules

use super::rules::AlertRecord;
use crate::error::{Result, WardenError};
use crate::lifecycle::ContainerLocks;
use crate::manager::ContainerManager;
use crate::models::Role;
use crate::notify::{Notifier, Severity};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RemedialAction {
    RestartApp,
    RestartDatabase,
    RestartCache,
    NotifyAdmin,
    /// Delete `*.log` files past retention in the log directory
    CleanupLogs,
    /// Warn when free disk space is below the threshold
    CheckResources,
}

impl RemedialAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemedialAction::RestartApp => "restart-app",
            RemedialAction::RestartDatabase => "restart-database",
            RemedialAction::RestartCache => "restart-cache",
            RemedialAction::NotifyAdmin => "notify-admin",
            RemedialAction::CleanupLogs => "cleanup-logs",
            RemedialAction::CheckResources => "check-resources",
        }
    }

    fn restart_role(&self) -> Option<Role> {
        match self {
            RemedialAction::RestartApp => Some(Role::App),
            RemedialAction::RestartDatabase => Some(Role::Database),
            RemedialAction::RestartCache => Some(Role::Cache),
            _ => None,
        }
    }

    /// Run the action for `alert`, raised in deploy generation `generation`
    ///
    /// Restarts are skipped when the stack was redeployed after the alert.
    pub async fn execute(
        &self,
        ctx: &ActionContext,
        alert: &AlertRecord,
        generation: u64,
    ) -> Result<()> {
        if let Some(role) = self.restart_role() {
            let name = ctx.manager.name_of(role).to_string();
            let _guard = ctx.locks.acquire(&name).await;
            if ctx.locks.deploy_generation() != generation {
                info!(container = %name, rule = %alert.rule, "Stack redeployed since alert, skipping restart");
                return Ok(());
            }
            info!(container = %name, rule = %alert.rule, "Restarting container for alert");
            return ctx.manager.restart(&name).await;
        }

        match self {
            RemedialAction::NotifyAdmin => {
                ctx.notifier
                    .notify(
                        alert.severity,
                        &format!("Alert: {}", alert.rule),
                        &alert.message,
                    )
                    .await
            }
            RemedialAction::CleanupLogs => {
                let removed = cleanup_logs(&ctx.log_dir, ctx.log_retention).await?;
                info!(dir = %ctx.log_dir.display(), removed, "Old log files cleaned up");
                Ok(())
            }
            RemedialAction::CheckResources => {
                let free_mb = free_disk_bytes(existing_dir(&ctx.log_dir))? / (1024 * 1024);
                if free_mb < ctx.min_free_disk_mb {
                    warn!(free_mb, min_free_mb = ctx.min_free_disk_mb, "Low disk space");
                    ctx.notifier
                        .notify(
                            Severity::Warning,
                            "Low disk space",
                            &format!(
                                "{}MB free under {} (minimum {}MB)",
                                free_mb,
                                ctx.log_dir.display(),
                                ctx.min_free_disk_mb
                            ),
                        )
                        .await?;
                } else {
                    debug!(free_mb, "Disk space ok");
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// What remedial actions may touch
#[derive(Clone)]
pub struct ActionContext {
    pub manager: Arc<ContainerManager>,
    pub locks: ContainerLocks,
    pub notifier: Arc<dyn Notifier>,
    pub log_dir: PathBuf,
    pub log_retention: Duration,
    pub min_free_disk_mb: u64,
}

/// Delete `*.log` files in `dir` last modified more than `retention` ago
///
/// A missing directory counts as nothing to clean.
pub async fn cleanup_logs(dir: &Path, retention: Duration) -> Result<usize> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    let cutoff = SystemTime::now()
        .checked_sub(retention)
        .unwrap_or(SystemTime::UNIX_EPOCH);
    let mut removed = 0;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("log") {
            continue;
        }
        let metadata = entry.metadata().await?;
        if !metadata.is_file() {
            continue;
        }
        if metadata.modified()? <= cutoff {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove log file"),
            }
        }
    }
    Ok(removed)
}

fn existing_dir(dir: &Path) -> &Path {
    if dir.exists() {
        dir
    } else {
        Path::new(".")
    }
}

/// Free bytes available to unprivileged users on the filesystem holding `path`
#[cfg(unix)]
pub fn free_disk_bytes(path: &Path) -> Result<u64> {
    use std::mem::MaybeUninit;

    let c_path = std::ffi::CString::new(path.to_string_lossy().as_bytes())
        .map_err(|e| WardenError::Io(std::io::Error::new(std::io::ErrorKind::InvalidInput, e)))?;
    let mut stat = MaybeUninit::<libc::statvfs>::uninit();

    let result = unsafe { libc::statvfs(c_path.as_ptr(), stat.as_mut_ptr()) };
    if result == 0 {
        let stat = unsafe { stat.assume_init() };
        Ok((stat.f_bavail as u64).saturating_mul(stat.f_frsize as u64))
    } else {
        Err(WardenError::Io(std::io::Error::last_os_error()))
    }
}

#[cfg(not(unix))]
pub fn free_disk_bytes(_path: &Path) -> Result<u64> {
    Err(WardenError::Io(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "disk space check is only supported on unix",
    )))
}
