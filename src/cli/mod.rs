//! Scanlift CLI - provision a scan engine, run automation plans, tear down
//!
//! ## Commands
//! - `run`: one session per plan on a bounded worker pool, outcomes as JSON lines
//! - `select`: print the provider the selector would choose
//! - `validate-plan`: check a plan file offline

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use scanlift_core::config::{ConfigLoadError, LoggingConfig};
use scanlift_core::domain::ExecutionMode;
use scanlift_core::{ConfigOverrides, ScanConfig};

/// Scanlift - automated web application scans on local, remote or cloud engines
#[derive(Parser, Debug)]
#[command(
    name = "scanlift",
    author = "Scanlift Team",
    version,
    about = "Provision a scan engine, drive an automation plan and tear everything down",
    long_about = "Scanlift obtains a reachable scan engine (a local container, an already running \
                  remote engine or a freshly provisioned cloud instance), runs an automation plan \
                  against it, writes progress snapshots and reports, and always releases the \
                  engine afterwards.\n\n\
                  Configuration layers: defaults, scanlift.{toml,yaml,json}, SCANLIFT__* \
                  environment variables, then command-line flags."
)]
pub struct Cli {
    /// Configuration file path
    #[arg(long, global = true, env = "SCANLIFT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Execution mode: auto, local, remote or cloud
    #[arg(short, long, global = true)]
    pub mode: Option<ExecutionMode>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one scan session per automation plan
    Run(commands::run::RunArgs),

    /// Show which provider would be used
    Select(commands::select::SelectArgs),

    /// Validate an automation plan without contacting any engine
    #[command(name = "validate-plan", visible_alias = "validate")]
    ValidatePlan(commands::validate_plan::ValidatePlanArgs),
}

/// CLI application runner
pub struct CliApp {
    cli: Cli,
}

impl CliApp {
    /// Parse the process arguments
    pub fn new() -> Self {
        Self { cli: Cli::parse() }
    }

    pub fn from_cli(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the selected command and return the process exit code
    pub async fn run(self) -> anyhow::Result<i32> {
        let exit_code = match self.cli.command {
            Commands::Run(ref args) => commands::run::run(&self.cli, args).await,
            Commands::Select(ref args) => commands::select::run(&self.cli, args).await,
            Commands::ValidatePlan(ref args) => {
                commands::validate_plan::run(&self.cli, args).await
            }
        }?;

        Ok(exit_code)
    }
}

impl Default for CliApp {
    fn default() -> Self {
        Self::new()
    }
}

/// Load the layered configuration and install logging from it
///
/// Logging falls back to defaults when the configuration cannot be loaded so the
/// error itself still reaches the user.
fn load_config(cli: &Cli, overrides: ConfigOverrides) -> Result<ScanConfig, ConfigLoadError> {
    let overrides = ConfigOverrides {
        mode: cli.mode,
        ..overrides
    };

    match ScanConfig::load(cli.config.as_deref(), &overrides) {
        Ok(config) => {
            init_logging(cli, &config.logging);
            Ok(config)
        }
        Err(e) => {
            init_logging(cli, &LoggingConfig::default());
            Err(e)
        }
    }
}

fn init_logging(cli: &Cli, logging: &LoggingConfig) {
    let mut logging = logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    if let Err(e) = scanlift_core::init_tracing(&logging) {
        eprintln!("Warning: {e}");
    }
}

/// Exit codes for CI integration
pub mod exit_codes {
    /// Every session succeeded
    pub const SUCCESS: i32 = 0;
    /// At least one scan session failed
    pub const SCAN_FAILED: i32 = 1;
    /// Configuration or input error
    pub const CONFIG_ERROR: i32 = 2;
    /// Internal error
    pub const INTERNAL_ERROR: i32 = 99;
}
