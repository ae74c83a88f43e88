//! Scanlift Core - Foundation crate for the scanlift workspace
//!
//! This crate provides the pieces every other scanlift crate builds on:
//!
//! # Modules
//!
//! - [`config`]: Strongly-typed scan configuration with file, environment and override layers
//! - [`domain`]: Automation plans, instance descriptions, plan executions, progress snapshots
//!   and the error taxonomy shared by every backend
//! - [`infrastructure`]: The HTTP scan-engine client, the external command runner and
//!   retry-with-backoff helpers
//! - [`logging`]: Structured logging with tracing
//!
//! # Configuration
//!
//! ```rust,ignore
//! use scanlift_core::{ConfigOverrides, ScanConfig};
//!
//! let config = ScanConfig::load(Some(Path::new("scanlift.toml")), &ConfigOverrides::default())?;
//! ```
//!
//! Environment variables use the `SCANLIFT__` prefix with double underscore separators:
//!
//! ```bash
//! SCANLIFT__MODE=cloud
//! SCANLIFT__SCAN__TIMEOUT_SECONDS=1800
//! ```

pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod logging;

pub use config::{ConfigOverrides, ScanConfig};
pub use domain::errors::{ConnectivityKind, ScanError, ScanResult};
pub use logging::init_tracing;
