//! Plan monitor
//!
//! Polls a started plan at a fixed interval until the engine reports a finish time or
//! the configured timeout elapses. Every poll refreshes the progress snapshot when an
//! output directory was supplied.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use scanlift_core::config::ScanSettings;
use scanlift_core::domain::{
    AlertCounts, Component, ComponentProgress, EngineApi, PlanExecution, PlanOutcome,
    PlanWatcher, ProgressSnapshot, ScanError, ScanResult,
};

use crate::domain::clock::Clock;
use crate::infrastructure::snapshot_writer::SnapshotWriter;

/// Number of engine errors carried into a failed outcome
const REPORTED_ERRORS: usize = 3;

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub poll_interval: Duration,
    pub timeout: Duration,
    pub output_dir: Option<PathBuf>,
}

impl MonitorSettings {
    pub fn from_scan_settings(scan: &ScanSettings, output_dir: Option<PathBuf>) -> Self {
        Self {
            poll_interval: scan.poll_interval(),
            timeout: scan.timeout(),
            output_dir,
        }
    }
}

pub struct PlanMonitor {
    settings: MonitorSettings,
    clock: Arc<dyn Clock>,
    writer: Option<SnapshotWriter>,
}

/// How many job-status lines have already been logged
#[derive(Debug, Default)]
struct LogCursor {
    info: usize,
    warn: usize,
}

impl LogCursor {
    /// Log lines appended since the last poll
    ///
    /// A list that shrank means the engine restarted its log; it is logged again from
    /// the start.
    fn advance(&mut self, execution: &PlanExecution) {
        if execution.info.len() < self.info {
            self.info = 0;
        }
        for line in &execution.info[self.info..] {
            info!(plan_id = %execution.plan_id, "{line}");
        }
        self.info = execution.info.len();

        if execution.warn.len() < self.warn {
            self.warn = 0;
        }
        for line in &execution.warn[self.warn..] {
            warn!(plan_id = %execution.plan_id, "{line}");
        }
        self.warn = execution.warn.len();
    }
}

impl PlanMonitor {
    pub fn new(settings: MonitorSettings, clock: Arc<dyn Clock>) -> Self {
        let writer = settings.output_dir.clone().map(SnapshotWriter::new);
        Self {
            settings,
            clock,
            writer,
        }
    }

    /// Query alert counts and component progress; each failure is defaulted and recorded
    async fn auxiliary(&self, engine: &dyn EngineApi) -> (AlertCounts, ComponentProgress, Vec<String>) {
        let mut degraded = Vec::new();

        let alerts = match engine.alert_summary().await {
            Ok(alerts) => alerts,
            Err(e) => {
                warn!(error = %e, "Alert summary unavailable for snapshot");
                degraded.push("alerts".to_string());
                AlertCounts::default()
            }
        };

        let mut components = ComponentProgress::default();
        for component in Component::ALL {
            match engine.component_status(component).await {
                Ok(percent) => match component {
                    Component::Spider => components.spider = percent,
                    Component::ActiveScan => components.active_scan = percent,
                },
                Err(e) => {
                    warn!(component = component.as_str(), error = %e, "Component status unavailable for snapshot");
                    degraded.push(component.as_str().to_string());
                }
            }
        }

        (alerts, components, degraded)
    }

    async fn refresh_snapshot(
        &self,
        engine: &dyn EngineApi,
        execution: &PlanExecution,
        elapsed: Duration,
    ) {
        let Some(writer) = &self.writer else {
            return;
        };

        let (alerts, components, degraded) = self.auxiliary(engine).await;
        let snapshot = ProgressSnapshot::from_execution(
            execution,
            elapsed.as_secs(),
            alerts,
            components,
            degraded,
        );

        if let Err(e) = writer.write(&snapshot).await {
            warn!(error = %e, "Failed to write progress snapshot");
        }
    }
}

#[async_trait]
impl PlanWatcher for PlanMonitor {
    #[instrument(skip(self, engine), fields(poll_interval = ?self.settings.poll_interval, timeout = ?self.settings.timeout))]
    async fn watch(&self, engine: Arc<dyn EngineApi>, plan_id: &str) -> ScanResult<PlanOutcome> {
        let started = self.clock.now();
        let mut cursor = LogCursor::default();
        let mut polls = 0u32;

        loop {
            self.clock.sleep(self.settings.poll_interval).await;
            polls += 1;

            let execution = engine.plan_progress(plan_id).await?;
            let elapsed = self.clock.now().saturating_duration_since(started);

            cursor.advance(&execution);
            self.refresh_snapshot(engine.as_ref(), &execution, elapsed).await;

            if execution.is_finished() {
                if execution.has_errors() {
                    warn!(plan_id, errors = execution.error.len(), "Plan finished with errors");
                    return Err(ScanError::PlanExecution {
                        errors: execution
                            .error
                            .iter()
                            .take(REPORTED_ERRORS)
                            .cloned()
                            .collect(),
                    });
                }

                info!(plan_id, polls, elapsed_seconds = elapsed.as_secs(), "Plan finished");
                return Ok(PlanOutcome {
                    plan_id: plan_id.to_string(),
                    polls,
                    elapsed,
                    execution,
                });
            }

            if elapsed >= self.settings.timeout {
                warn!(plan_id, polls, "Plan did not finish in time");
                return Err(ScanError::Timeout {
                    seconds: self.settings.timeout.as_secs(),
                });
            }
        }
    }
}
