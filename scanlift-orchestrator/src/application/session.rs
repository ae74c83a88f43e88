//! Scan session controller
//!
//! Runs one session end to end:
//!
//! ```text
//! load plan ─► select ─► create provider ─► provision ─┬─► upload ─► monitor ─► download ─┐
//!   (fail fast,                                         │                                  │
//!    no side effects)                                   └──────────── teardown ◄───────────┘
//! ```
//!
//! Once `provision()` succeeds the provider is held by a [`ProvisionedInstance`] guard
//! and released exactly once, whatever the pipeline body returns (panics included).
//! Every error ends up as a `fail` [`ScanOutcome`]; nothing propagates to the caller.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use scanlift_core::ScanConfig;
use scanlift_core::domain::{
    ComputeTier, InstanceInfo, LoadedPlan, ProviderKind, ScanError, ScanResult,
};
use scanlift_provider::{ProviderFactory, ProviderSelector, ScanProvider};

use crate::application::monitor::{MonitorSettings, PlanMonitor};
use crate::domain::clock::Clock;
use crate::domain::outcome::ScanOutcome;

/// Anything that can run one session from a configuration
#[async_trait]
pub trait SessionExecutor: Send + Sync {
    async fn run(&self, config: &ScanConfig) -> ScanOutcome;
}

/// A provisioned provider that still owes a teardown
pub struct ProvisionedInstance {
    provider: Box<dyn ScanProvider>,
    instance: InstanceInfo,
    released: bool,
}

impl ProvisionedInstance {
    pub fn new(provider: Box<dyn ScanProvider>, instance: InstanceInfo) -> Self {
        Self {
            provider,
            instance,
            released: false,
        }
    }

    pub fn instance(&self) -> &InstanceInfo {
        &self.instance
    }

    pub fn provider(&mut self) -> &mut dyn ScanProvider {
        self.provider.as_mut()
    }

    /// Tear the provider down. Consumes the guard so it cannot run twice.
    pub async fn release(mut self) -> ScanResult<()> {
        self.released = true;
        info!(session_id = %self.instance.session_id, provider = %self.provider.kind(), "Tearing down");
        self.provider.teardown().await
    }
}

impl Drop for ProvisionedInstance {
    fn drop(&mut self) {
        if !self.released {
            error!(
                session_id = %self.instance.session_id,
                provider = %self.provider.kind(),
                "Provisioned instance dropped without teardown; resources may be left behind"
            );
        }
    }
}

/// What a completed pipeline body produced
struct PipelineResult {
    plan_id: String,
    polls: u32,
    artifacts: Vec<PathBuf>,
}

pub struct ScanSessionController {
    selector: ProviderSelector,
    factory: Arc<dyn ProviderFactory>,
    clock: Arc<dyn Clock>,
}

impl ScanSessionController {
    pub fn new(
        selector: ProviderSelector,
        factory: Arc<dyn ProviderFactory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            selector,
            factory,
            clock,
        }
    }

    /// Upload, monitor and download against a provisioned instance
    async fn pipeline(
        &self,
        guard: &mut ProvisionedInstance,
        plan: &LoadedPlan,
        config: &ScanConfig,
    ) -> ScanResult<PipelineResult> {
        let instance = guard.instance().clone();
        let output_dir = config.scan.output_dir.clone();

        let handle = guard.provider().upload_plan(&instance, plan).await?;

        let monitor = PlanMonitor::new(
            MonitorSettings::from_scan_settings(&config.scan, Some(output_dir.clone())),
            self.clock.clone(),
        );
        let outcome = guard.provider().monitor(&instance, &handle, &monitor).await?;

        let artifacts = guard
            .provider()
            .download_results(&instance, plan, &output_dir, &config.scan.report_filename)
            .await?;

        Ok(PipelineResult {
            plan_id: outcome.plan_id,
            polls: outcome.polls,
            artifacts,
        })
    }

    #[instrument(skip(self, config))]
    async fn run_session(&self, session_id: Uuid, config: &ScanConfig) -> SessionReport {
        let mut report = SessionReport::default();

        let plan_path = match &config.scan.plan_path {
            Some(path) => path.clone(),
            None => {
                return report.failed(ScanError::Config(
                    "no automation plan given (scan.plan_path)".to_string(),
                ));
            }
        };
        let plan = match LoadedPlan::load(&plan_path).await {
            Ok(plan) => plan,
            Err(e) => return report.failed(e),
        };

        let kind = self.selector.select(config).await;
        report.mode = Some(kind);
        info!(provider = %kind, plan = %plan_path.display(), "Starting scan session");

        let mut provider = match self.factory.create(kind, config, session_id) {
            Ok(provider) => provider,
            Err(e) => return report.failed(e),
        };
        let instance = match provider.provision().await {
            Ok(instance) => instance,
            Err(e) => return report.failed(e),
        };
        report.compute_tier = instance.compute_tier();
        info!(base_url = %instance.base_url, "Scan engine provisioned");

        let mut guard = ProvisionedInstance::new(provider, instance);
        let body = AssertUnwindSafe(self.pipeline(&mut guard, &plan, config))
            .catch_unwind()
            .await;
        let teardown = guard.release().await;

        let body = match body {
            Ok(result) => result,
            Err(panic) => Err(ScanError::Internal(format!(
                "scan pipeline panicked: {}",
                panic_message(panic.as_ref())
            ))),
        };

        match (body, teardown) {
            (Ok(result), Ok(())) => {
                report.message = format!(
                    "Plan {} completed after {} poll(s); {} artifact(s) in {}",
                    result.plan_id,
                    result.polls,
                    result.artifacts.len(),
                    config.scan.output_dir.display()
                );
                report.artifacts = result.artifacts;
                report
            }
            (Ok(_), Err(teardown_err)) => {
                error!(error = %teardown_err, "Teardown failed after a successful scan");
                report.failed(teardown_err)
            }
            (Err(e), teardown) => {
                if let Err(teardown_err) = teardown {
                    error!(error = %teardown_err, "Teardown failed");
                }
                report.failed(e)
            }
        }
    }
}

#[async_trait]
impl SessionExecutor for ScanSessionController {
    async fn run(&self, config: &ScanConfig) -> ScanOutcome {
        let session_id = Uuid::new_v4();
        let started = self.clock.now();

        let report = self.run_session(session_id, config).await;
        let duration = self.clock.now().saturating_duration_since(started);

        let outcome = match report.error {
            Some(ref err) => {
                warn!(%session_id, kind = err.kind(), "Scan session failed: {err}");
                ScanOutcome::failure(session_id, err)
            }
            None => {
                info!(%session_id, "Scan session succeeded");
                ScanOutcome::success(session_id, report.message)
            }
        };

        outcome
            .with_plan(config.scan.plan_path.clone())
            .with_mode(report.mode)
            .with_compute_tier(report.compute_tier)
            .with_artifacts(report.artifacts)
            .with_duration(duration)
    }
}

/// Accumulates what is known about a session as it progresses
#[derive(Default)]
struct SessionReport {
    mode: Option<ProviderKind>,
    compute_tier: Option<ComputeTier>,
    artifacts: Vec<PathBuf>,
    message: String,
    error: Option<ScanError>,
}

impl SessionReport {
    fn failed(mut self, error: ScanError) -> Self {
        self.error = Some(error);
        self
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
