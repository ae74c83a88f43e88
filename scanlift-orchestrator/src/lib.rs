//! Scanlift Orchestrator - scan session control
//!
//! Drives a provisioned scan engine through one automation plan and guarantees the
//! engine is released afterwards.
//!
//! # Architecture
//!
//! ```text
//! scanlift-orchestrator/
//! ├── application/
//! │   ├── session.rs    # ScanSessionController + ProvisionedInstance teardown guard
//! │   ├── monitor.rs    # PlanMonitor: polling loop, progress logging, snapshots
//! │   └── runner.rs     # ScanRunner: bounded pool of concurrent sessions
//! ├── infrastructure/
//! │   ├── clock.rs      # SystemClock and ManualClock
//! │   ├── snapshot_writer.rs
//! │   └── timing.rs     # TimingCollector
//! └── domain/           # Clock trait, ScanOutcome
//! ```
//!
//! Time only enters through [`Clock`], so a monitor with a one-hour timeout can be
//! exercised instantly with [`ManualClock`].

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::{
    MonitorSettings, PlanMonitor, ProvisionedInstance, ScanRunner, ScanSessionController,
    SessionExecutor,
};
pub use domain::{Clock, OutcomeStatus, ScanOutcome};
pub use infrastructure::{ManualClock, SnapshotWriter, SystemClock, TimingCollector};
