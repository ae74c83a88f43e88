//! Run command - one scan session per plan

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::Args;

use scanlift_core::{ConfigOverrides, ScanConfig};
use scanlift_orchestrator::{ScanRunner, ScanSessionController, SystemClock};
use scanlift_provider::{DefaultProviderFactory, ProviderSelector, SystemProbe};

use crate::cli::{Cli, exit_codes, load_config};

/// Arguments for the run command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Automation plan file; repeat to run several sessions
    #[arg(short, long = "plan")]
    pub plans: Vec<PathBuf>,

    /// Directory for reports and progress snapshots
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Overall plan timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Seconds between progress polls
    #[arg(long)]
    pub poll_interval: Option<u64>,

    /// Sessions allowed to run at the same time
    #[arg(short, long)]
    pub workers: Option<usize>,
}

/// Execute the run command
pub async fn run(cli: &Cli, args: &RunArgs) -> Result<i32> {
    let overrides = ConfigOverrides {
        plan_path: match args.plans.as_slice() {
            [single] => Some(single.clone()),
            _ => None,
        },
        output_dir: args.output_dir.clone(),
        timeout_seconds: args.timeout,
        poll_interval_seconds: args.poll_interval,
        workers: args.workers,
        ..ConfigOverrides::default()
    };

    let config = match load_config(cli, overrides) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return Ok(exit_codes::CONFIG_ERROR);
        }
    };

    let sessions = session_configs(&config, &args.plans);
    if sessions.is_empty() {
        eprintln!("Error: no automation plan given (use --plan or set scan.plan_path)");
        return Ok(exit_codes::CONFIG_ERROR);
    }

    tracing::info!(
        sessions = sessions.len(),
        mode = %config.mode,
        workers = config.runner.workers,
        "Starting scan sessions"
    );

    let controller = ScanSessionController::new(
        ProviderSelector::new(Arc::new(SystemProbe::default())),
        Arc::new(DefaultProviderFactory::new()),
        Arc::new(SystemClock),
    );
    let runner = ScanRunner::new(Arc::new(controller), config.runner.workers);

    let outcomes = runner.run_all(sessions).await;

    for outcome in &outcomes {
        println!("{}", serde_json::to_string(outcome)?);
    }

    let summary = runner.timings().summary();
    tracing::info!("{summary}");

    if outcomes.iter().all(|o| o.is_success()) {
        Ok(exit_codes::SUCCESS)
    } else {
        Ok(exit_codes::SCAN_FAILED)
    }
}

/// One configuration per session
///
/// Several plans get numbered sub-directories of the output directory so their
/// snapshots and reports never collide.
fn session_configs(config: &ScanConfig, plans: &[PathBuf]) -> Vec<ScanConfig> {
    if plans.len() > 1 {
        return plans
            .iter()
            .enumerate()
            .map(|(index, plan)| {
                let output_dir = config.scan.output_dir.join(output_subdir(index, plan));
                config.for_plan(plan.clone(), output_dir)
            })
            .collect();
    }

    match config.scan.plan_path {
        Some(_) => vec![config.clone()],
        None => Vec::new(),
    }
}

fn output_subdir(index: usize, plan: &Path) -> String {
    let stem = plan
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "plan".to_string());
    format!("{:02}-{}", index + 1, stem)
}
