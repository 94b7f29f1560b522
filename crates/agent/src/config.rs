//! Agent configuration

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use warden_lib::LoadOptions;

/// Agent process settings, read from `AGENT_`-prefixed environment variables
///
/// Orchestrator settings themselves come from the `WARDEN_` layer; these
/// only say where to find them and how the agent runs.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// API server port for health/metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Deployment environment, overrides `WARDEN_ENVIRONMENT`
    #[serde(default)]
    pub environment: Option<String>,

    /// Explicit orchestrator config file
    #[serde(default)]
    pub config_path: Option<PathBuf>,

    /// Env-style file loaded before the orchestrator config
    #[serde(default)]
    pub env_file: Option<PathBuf>,

    /// Deploy the stack before starting the loops
    #[serde(default = "default_deploy_on_start")]
    pub deploy_on_start: bool,
}

fn default_api_port() -> u16 {
    8080
}

fn default_deploy_on_start() -> bool {
    true
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            api_port: default_api_port(),
            environment: None,
            config_path: None,
            env_file: None,
            deploy_on_start: default_deploy_on_start(),
        }
    }
}

impl AgentConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        Self::from_source(config::Environment::with_prefix("AGENT"))
    }

    fn from_source(source: config::Environment) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(source.try_parsing(true))
            .build()?;

        config
            .try_deserialize()
            .context("invalid AGENT_* environment settings")
    }

    /// Where the orchestrator configuration is loaded from
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            environment: self.environment.clone(),
            config_path: self.config_path.clone(),
            env_file: self.env_file.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_vars(vars: &[(&str, &str)]) -> Result<AgentConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AgentConfig::from_source(config::Environment::with_prefix("AGENT").source(Some(vars)))
    }

    #[test]
    fn test_defaults_without_variables() {
        let config = from_vars(&[]).unwrap();
        assert_eq!(config.api_port, 8080);
        assert!(config.deploy_on_start);
        assert!(config.environment.is_none());
    }

    #[test]
    fn test_variables_override_defaults() {
        let config = from_vars(&[
            ("AGENT_API_PORT", "9100"),
            ("AGENT_ENVIRONMENT", "staging"),
            ("AGENT_DEPLOY_ON_START", "false"),
            ("AGENT_CONFIG_PATH", "/etc/warden/staging.toml"),
        ])
        .unwrap();

        assert_eq!(config.api_port, 9100);
        assert!(!config.deploy_on_start);

        let options = config.load_options();
        assert_eq!(options.environment.as_deref(), Some("staging"));
        assert_eq!(
            options.config_path,
            Some(PathBuf::from("/etc/warden/staging.toml"))
        );
    }

    #[test]
    fn test_invalid_port_is_an_error() {
        assert!(from_vars(&[("AGENT_API_PORT", "not-a-port")]).is_err());
    }
}
