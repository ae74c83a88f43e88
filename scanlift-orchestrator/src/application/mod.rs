//! Orchestrator application layer

pub mod monitor;
pub mod runner;
pub mod session;

pub use monitor::{MonitorSettings, PlanMonitor};
pub use runner::ScanRunner;
pub use session::{ProvisionedInstance, ScanSessionController, SessionExecutor};
