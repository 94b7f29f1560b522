//! `validate`: configuration check plus engine reachability

use anyhow::Result;
use colored::Colorize;
use warden_lib::{LoadOptions, Orchestrator, ValidationReport, WardenConfig, WardenError};

use crate::output::{print_error, print_json, print_success, OutputFormat};

/// Returns whether the configuration is valid and the engine answered
pub async fn run(options: &LoadOptions, format: OutputFormat) -> Result<bool> {
    let config = match WardenConfig::load(options) {
        Ok(config) => config,
        Err(WardenError::Configuration(problems)) => {
            let problems: Vec<String> = problems.split("; ").map(str::to_string).collect();
            report_invalid(&problems, format)?;
            return Ok(false);
        }
        Err(e) => return Err(e.into()),
    };

    let orchestrator = Orchestrator::new(config)?;
    let report = orchestrator.validate().await;

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => print_report(&report),
    }
    Ok(report.ok())
}

fn report_invalid(problems: &[String], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "valid": false,
            "problems": problems,
        })),
        OutputFormat::Table => {
            print_error("Configuration is invalid");
            for problem in problems {
                println!("  - {}", problem);
            }
            Ok(())
        }
    }
}

fn print_report(report: &ValidationReport) {
    println!("{}", "Configuration".bold());
    println!("{}", "=".repeat(60));
    println!("Environment: {}", report.environment.cyan());

    if report.problems.is_empty() {
        print_success("Configuration is valid");
    } else {
        print_error("Configuration is invalid");
        for problem in &report.problems {
            println!("  - {}", problem);
        }
    }

    match (&report.engine, &report.engine_error) {
        (Some(version), _) => print_success(&format!(
            "Engine reachable (version {}, API {})",
            version.version, version.api_version
        )),
        (None, Some(e)) => print_error(&format!("Engine unreachable: {}", e)),
        (None, None) => print_error("Engine unreachable"),
    }
}
