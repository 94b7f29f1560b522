//! `status`: current container and lifecycle state

use anyhow::Result;
use colored::Colorize;
use tabled::Tabled;
use warden_lib::{Orchestrator, StatusReport};

use crate::output::{
    color_status, print_error, print_json, print_system_status, print_table, OutputFormat,
};

/// Row for the lifecycle table
#[derive(Tabled)]
struct LifecycleRow {
    #[tabled(rename = "Container")]
    name: String,
    #[tabled(rename = "Health")]
    state: String,
    #[tabled(rename = "Since")]
    since: String,
}

/// Returns whether every container is running
pub async fn run(orchestrator: &Orchestrator, format: OutputFormat) -> Result<bool> {
    let report = match orchestrator.status().await {
        Ok(report) => report,
        Err(e) => {
            match format {
                OutputFormat::Json => print_json(&serde_json::json!({
                    "status": "failed",
                    "error": e.to_string(),
                }))?,
                OutputFormat::Table => print_error(&format!("Cannot read system status: {}", e)),
            }
            return Ok(false);
        }
    };

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => print_report(&report),
    }
    Ok(report.healthy())
}

fn print_report(report: &StatusReport) {
    println!("{}", "System Status".bold());
    println!("{}", "=".repeat(60));
    println!("Environment: {}", report.environment.cyan());
    println!();
    print_system_status(&report.system);

    // The lifecycle view only has content while the poll loop runs in this process
    if report.polling {
        println!();
        let rows: Vec<LifecycleRow> = report
            .lifecycle
            .iter()
            .map(|c| LifecycleRow {
                name: c.name.clone(),
                state: color_status(c.state.as_str()),
                since: c.since.format("%Y-%m-%d %H:%M:%S").to_string(),
            })
            .collect();
        print_table(rows);
    }
}
