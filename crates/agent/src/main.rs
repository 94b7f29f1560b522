//! Stack Warden agent - keeps the managed stack running
//!
//! Deploys the stack (optionally), then runs the lifecycle poll loop and
//! the health monitor until interrupted.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use warden_agent::{api, config::AgentConfig};
use warden_lib::{health::components, Orchestrator, WardenConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting warden-agent");

    let agent_config = AgentConfig::load()?;
    let config = WardenConfig::load(&agent_config.load_options())
        .context("failed to load orchestrator configuration")?;
    info!(
        environment = %config.environment,
        project = %config.project,
        "Agent configured"
    );

    let orchestrator = Arc::new(Orchestrator::new(config)?);

    let health = orchestrator.health();
    health.register(components::ENGINE).await;
    health.register(components::POLL_LOOP).await;
    health.register(components::MONITOR).await;

    let validation = orchestrator.validate().await;
    if let Some(e) = &validation.engine_error {
        warn!(error = %e, "Engine not reachable at startup");
    }

    if agent_config.deploy_on_start {
        let summary = orchestrator.deploy(false).await;
        if let Some(e) = summary.to_error() {
            // the poll loop keeps retrying from here
            error!(error = %e, "Initial deployment incomplete");
        }
    }

    orchestrator.start().await;

    let app_state = Arc::new(api::AppState::new(Arc::clone(&orchestrator)));
    let mut api_handle = tokio::spawn(api::serve(agent_config.api_port, app_state));

    let reason = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            "SIGINT received"
        }
        served = &mut api_handle => {
            match served {
                Ok(Ok(())) => "API server exited",
                Ok(Err(e)) => {
                    error!(error = %e, "API server failed");
                    "API server failed"
                }
                Err(e) => {
                    error!(error = %e, "API server task panicked");
                    "API server failed"
                }
            }
        }
    };

    orchestrator.stop(reason).await;
    api_handle.abort();
    info!("Shutting down");

    Ok(())
}
