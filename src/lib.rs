//! Scanlift - scan-engine provisioning and plan execution
//!
//! The binary is a thin layer over three crates:
//!
//! - [`scanlift_core`]: configuration, domain types, the engine client
//! - [`scanlift_provider`]: local, remote and cloud engine providers
//! - [`scanlift_orchestrator`]: session control, plan monitoring, the worker pool

pub mod cli;

pub use scanlift_core::{ConfigOverrides, ScanConfig, ScanError, init_tracing};
pub use scanlift_orchestrator::{ScanOutcome, ScanRunner, ScanSessionController};
pub use scanlift_provider::{DefaultProviderFactory, ProviderSelector};
