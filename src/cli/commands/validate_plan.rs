//! Validate-plan command - offline plan checks

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use scanlift_core::config::LoggingConfig;
use scanlift_core::domain::LoadedPlan;

use crate::cli::{Cli, exit_codes, init_logging};

/// Arguments for the validate-plan command
#[derive(Args, Debug)]
pub struct ValidatePlanArgs {
    /// Automation plan file (YAML)
    pub file: PathBuf,
}

/// Load and validate the plan, printing a short summary
pub async fn run(cli: &Cli, args: &ValidatePlanArgs) -> Result<i32> {
    init_logging(cli, &LoggingConfig::default());

    let loaded = match LoadedPlan::load(&args.file).await {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("{}: {}", args.file.display(), e.user_message());
            return Ok(exit_codes::CONFIG_ERROR);
        }
    };

    let plan = &loaded.plan;
    println!(
        "{}: valid ({} context(s), {} job(s))",
        args.file.display(),
        plan.contexts.len(),
        plan.jobs.len()
    );
    for url in plan.target_urls() {
        println!("  target: {url}");
    }
    if plan.has_report_job() {
        for artifact in plan.report_artifacts() {
            println!("  report: {artifact}");
        }
    } else {
        println!("  no report job; only the JSON report will be downloaded");
    }

    Ok(exit_codes::SUCCESS)
}
