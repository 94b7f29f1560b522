//! Configuration lookup for the CLI

use std::path::{Path, PathBuf};
use warden_lib::LoadOptions;

const DEFAULT_ENVIRONMENT: &str = "development";

/// Resolve where the orchestrator configuration comes from
///
/// An explicit `--config` wins. Otherwise `config/<env>.toml` in the working
/// directory is picked up by the loader itself, and only when it is absent
/// do we fall back to the per-user `~/.config/warden/<env>.toml`.
pub fn load_options(
    environment: Option<String>,
    config: Option<PathBuf>,
    env_file: Option<PathBuf>,
) -> LoadOptions {
    let config_path = match config {
        Some(path) => Some(path),
        None => {
            let env = environment.as_deref().unwrap_or(DEFAULT_ENVIRONMENT);
            if local_config_exists(Path::new("config"), env) {
                None
            } else {
                user_config_path(env).filter(|p| p.exists())
            }
        }
    };

    LoadOptions {
        environment,
        config_path,
        env_file,
    }
}

fn local_config_exists(dir: &Path, environment: &str) -> bool {
    ["toml", "yaml", "yml", "json"]
        .iter()
        .any(|ext| dir.join(format!("{}.{}", environment, ext)).exists())
}

/// Per-user configuration file for an environment
pub fn user_config_path(environment: &str) -> Option<PathBuf> {
    let home = dirs_next::home_dir()?;
    Some(
        home.join(".config")
            .join("warden")
            .join(format!("{}.toml", environment)),
    )
}
