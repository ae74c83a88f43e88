//! Provider trait

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use scanlift_core::domain::{
    EngineApi, InstanceInfo, LoadedPlan, PlanHandle, PlanOutcome, PlanWatcher, ProviderKind,
    ScanError, ScanResult,
};

/// One deployment mode for the scan engine
///
/// A provider value serves exactly one session. Every successful `provision()` must be
/// matched by one `teardown()`; the session controller guarantees that.
///
/// Note: This trait is dyn-compatible for runtime polymorphism.
#[async_trait]
pub trait ScanProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Obtain a reachable, healthy engine
    async fn provision(&mut self) -> ScanResult<InstanceInfo>;

    /// Client for the provisioned engine
    fn engine(&self) -> ScanResult<Arc<dyn EngineApi>>;

    /// Transfer the plan to the engine and start it
    async fn upload_plan(
        &mut self,
        instance: &InstanceInfo,
        plan: &LoadedPlan,
    ) -> ScanResult<PlanHandle>;

    /// Block until the started plan finishes, fails or times out
    async fn monitor(
        &self,
        _instance: &InstanceInfo,
        handle: &PlanHandle,
        watcher: &dyn PlanWatcher,
    ) -> ScanResult<PlanOutcome> {
        let engine = self.engine()?;
        watcher.watch(engine, &handle.plan_id).await
    }

    /// Fetch the findings report (and any plan report artifacts) into `output_dir`
    async fn download_results(
        &mut self,
        instance: &InstanceInfo,
        plan: &LoadedPlan,
        output_dir: &Path,
        report_filename: &str,
    ) -> ScanResult<Vec<PathBuf>>;

    /// Release whatever `provision()` acquired. Calling it again is a no-op.
    async fn teardown(&mut self) -> ScanResult<()>;
}

/// Error for lifecycle calls made before `provision()` succeeded
pub fn not_provisioned(kind: ProviderKind) -> ScanError {
    ScanError::Provisioning(format!("{kind} provider has no provisioned engine"))
}
