//! Stack Warden CLI
//!
//! Operator commands for deploying, inspecting and healing the managed
//! container stack.

mod commands;
mod config;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use warden_lib::{LoadOptions, Orchestrator, WardenConfig};

use commands::{deploy, emergency, monitor, status, validate};
use output::{print_error, OutputFormat};

/// Stack Warden CLI
#[derive(Parser)]
#[command(name = "warden")]
#[command(author, version, about = "Container lifecycle and self-healing orchestrator", long_about = None)]
pub struct Cli {
    /// Deployment environment: development, staging or production
    #[arg(long = "env", short = 'e', env = "WARDEN_ENVIRONMENT", global = true)]
    pub environment: Option<String>,

    /// Configuration file (default: config/<env>.toml, then ~/.config/warden/<env>.toml)
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Env-style file loaded before the configuration (default: .env if present)
    #[arg(long, global = true)]
    pub env_file: Option<PathBuf>,

    /// Output format
    #[arg(long, short, default_value = "table", global = true)]
    pub format: OutputFormat,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate the configuration and check the engine connection
    Validate,

    /// Deploy the stack in dependency order
    Deploy {
        /// Remove and recreate containers that already exist
        #[arg(long)]
        force: bool,

        /// Exit after deploying instead of continuing into monitor mode
        #[arg(long)]
        no_monitoring: bool,
    },

    /// Show container status
    Status,

    /// Run the poll loop and health monitor until interrupted
    Monitor,

    /// Recreate every container and report before/after status
    Emergency {
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
}

fn init_tracing(cli: &Cli) {
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if cli.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }
}

fn connect(options: &LoadOptions) -> Result<Orchestrator> {
    let config = WardenConfig::load(options).context("failed to load configuration")?;
    debug!(
        environment = %config.environment,
        engine = %config.engine.base_url,
        "Configuration loaded"
    );
    Ok(Orchestrator::new(config)?)
}

async fn run(cli: Cli) -> Result<bool> {
    let options = config::load_options(cli.environment, cli.config, cli.env_file);
    let format = cli.format;

    match cli.command {
        Commands::Validate => validate::run(&options, format).await,
        Commands::Deploy {
            force,
            no_monitoring,
        } => deploy::run(&connect(&options)?, force, no_monitoring, format).await,
        Commands::Status => status::run(&connect(&options)?, format).await,
        Commands::Monitor => monitor::run(&connect(&options)?, format).await,
        Commands::Emergency { yes } => emergency::run(&connect(&options)?, yes, format).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            print_error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}
