//! `deploy`: bring the stack up in dependency order

use anyhow::Result;
use colored::Colorize;
use warden_lib::Orchestrator;

use super::monitor;
use crate::output::{print_deployment, print_error, print_json, print_success, OutputFormat};

pub async fn run(
    orchestrator: &Orchestrator,
    force: bool,
    no_monitoring: bool,
    format: OutputFormat,
) -> Result<bool> {
    if let OutputFormat::Table = format {
        println!("{}", "Deploying stack".bold());
        println!("{}", "=".repeat(60));
        println!("Environment: {}", orchestrator.config().environment.cyan());
        if force {
            println!("Mode:        {}", "force recreate".yellow());
        }
        println!();
    }

    let summary = orchestrator.deploy(force).await;

    match format {
        OutputFormat::Json => print_json(&summary)?,
        OutputFormat::Table => {
            print_deployment(&summary);
            match summary.to_error() {
                Some(e) => print_error(&e.to_string()),
                None => print_success("Stack deployed"),
            }
        }
    }

    if !summary.success {
        return Ok(false);
    }
    if no_monitoring {
        return Ok(true);
    }
    monitor::run(orchestrator, format).await
}
