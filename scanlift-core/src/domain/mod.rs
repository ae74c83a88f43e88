//! Domain Layer - scan plans, engine instances and the shared error taxonomy
//!
//! Everything here is backend-agnostic: the local, remote and cloud providers all speak
//! in terms of these types.

pub mod engine;
pub mod errors;
pub mod execution;
pub mod instance;
pub mod plan;
pub mod snapshot;

pub use engine::{
    Component, EngineApi, EngineConnector, EngineEndpoint, EngineError, PlanWatcher,
};
pub use errors::{ConnectivityKind, ScanError, ScanResult};
pub use execution::{PlanExecution, PlanOutcome};
pub use instance::{
    CloudVendor, ComputeTier, ExecutionMode, InstanceInfo, PlanHandle, ProviderKind,
    ProviderMetadata,
};
pub use plan::{AutomationPlan, LoadedPlan, PlanContext, PlanError, PlanJob};
pub use snapshot::{
    AlertCounts, ComponentProgress, ProgressSnapshot, SNAPSHOT_FILE, SnapshotStatus,
};
