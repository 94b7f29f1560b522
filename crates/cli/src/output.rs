//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};
use warden_lib::{manager::DeploymentSummary, SystemStatus};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a table from a list of rows
pub fn print_table<T: Tabled>(rows: Vec<T>) {
    if rows.is_empty() {
        println!("{}", "No items found".yellow());
        return;
    }
    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Color status based on value
pub fn color_status(status: &str) -> String {
    match status.to_lowercase().as_str() {
        "healthy" | "running" | "created" | "started" | "already running" => {
            status.green().to_string()
        }
        "degraded" | "recovering" | "paused" | "unknown" => status.yellow().to_string(),
        "unhealthy" | "exited" | "missing" | "failed" => status.red().to_string(),
        _ => status.to_string(),
    }
}

/// Row for container status tables
#[derive(Tabled)]
struct ContainerRow {
    #[tabled(rename = "Container")]
    name: String,
    #[tabled(rename = "Role")]
    role: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Status")]
    status: String,
}

/// Print the container table and the overall health line
pub fn print_system_status(status: &SystemStatus) {
    let rows: Vec<ContainerRow> = status
        .containers
        .iter()
        .map(|c| ContainerRow {
            name: c.name.clone(),
            role: c.role.to_string(),
            state: color_status(c.state.as_str()),
            status: c.status.clone(),
        })
        .collect();
    print_table(rows);
    println!(
        "System: {} ({}/{} running)",
        color_status(status.health.as_str()),
        status.running,
        status.total
    );
}

/// Row for deployment result tables
#[derive(Tabled)]
struct DeployRow {
    #[tabled(rename = "Container")]
    container: String,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Error")]
    error: String,
}

pub fn print_deployment(summary: &DeploymentSummary) {
    let rows: Vec<DeployRow> = summary
        .results
        .iter()
        .map(|r| DeployRow {
            container: r.container.clone(),
            action: color_status(r.action.as_str()),
            id: r
                .container_id
                .as_deref()
                .map(short_id)
                .unwrap_or("-")
                .to_string(),
            error: r.error.clone().unwrap_or_default(),
        })
        .collect();
    print_table(rows);
}

/// First 12 characters of an engine container id
pub fn short_id(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("0123456789abcdef0123"), "0123456789ab");
        assert_eq!(short_id("abc"), "abc");
    }

    #[test]
    fn test_color_status_keeps_text() {
        colored::control::set_override(false);
        assert_eq!(color_status("running"), "running");
        assert_eq!(color_status("something-else"), "something-else");
    }
}
