//! Select command - report the provider a run would use

use std::sync::Arc;

use anyhow::Result;
use clap::Args;

use scanlift_core::ConfigOverrides;
use scanlift_provider::{ProviderSelector, SystemProbe};

use crate::cli::{Cli, exit_codes, load_config};

/// Arguments for the select command
#[derive(Args, Debug)]
pub struct SelectArgs {}

/// Print the provider kind on stdout
pub async fn run(cli: &Cli, _args: &SelectArgs) -> Result<i32> {
    let config = match load_config(cli, ConfigOverrides::default()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return Ok(exit_codes::CONFIG_ERROR);
        }
    };

    let selector = ProviderSelector::new(Arc::new(SystemProbe::default()));
    let kind = selector.select(&config).await;

    tracing::debug!(mode = %config.mode, provider = %kind, "Provider selected");
    println!("{kind}");

    Ok(exit_codes::SUCCESS)
}
