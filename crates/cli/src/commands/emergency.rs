//! `emergency`: force-recreate the whole stack

use anyhow::{Context, Result};
use colored::Colorize;
use std::io::{BufRead, Write};
use warden_lib::{lifecycle::EmergencyReport, Orchestrator, SystemStatus};

use crate::output::{
    print_deployment, print_error, print_info, print_json, print_success, print_system_status,
    print_warning, OutputFormat,
};

pub async fn run(orchestrator: &Orchestrator, yes: bool, format: OutputFormat) -> Result<bool> {
    if !yes && !confirm(&orchestrator.config().environment)? {
        print_info("Emergency recovery cancelled");
        return Ok(false);
    }

    if let OutputFormat::Table = format {
        print_warning("Running emergency recovery: every container will be recreated");
    }
    let report = orchestrator.emergency().await;

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => print_report(&report),
    }
    Ok(report.success())
}

fn confirm(environment: &str) -> Result<bool> {
    print!(
        "Recreate every container in {}? Type 'yes' to continue: ",
        environment.bold()
    );
    std::io::stdout().flush()?;

    let mut answer = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("failed to read confirmation")?;
    Ok(answer.trim().eq_ignore_ascii_case("yes"))
}

fn print_status(title: &str, status: Option<&SystemStatus>) {
    println!();
    println!("{}", title.bold());
    match status {
        Some(status) => print_system_status(status),
        None => print_warning("Status unavailable"),
    }
}

fn print_report(report: &EmergencyReport) {
    print_status("Before", report.before.as_ref());

    println!();
    println!("{}", "Redeployment".bold());
    print_deployment(&report.deployment);

    print_status("After", report.after.as_ref());

    println!();
    if report.success() {
        print_success(&format!(
            "Emergency recovery completed in {:.1}s",
            report.duration_ms as f64 / 1000.0
        ));
    } else {
        print_error("Emergency recovery did not restore a healthy stack");
    }
}
