//! Progress snapshot: the externally observable view of an in-flight scan

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::execution::PlanExecution;

/// File name of the snapshot inside a session output directory
pub const SNAPSHOT_FILE: &str = "progress.json";

/// Number of trailing job-status lines kept in a snapshot
const LAST_LINES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotStatus {
    Running,
    Completed,
    Failed,
}

/// Finding counts by severity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertCounts {
    pub high: u64,
    pub medium: u64,
    pub low: u64,
    pub informational: u64,
}

impl AlertCounts {
    pub fn total(&self) -> u64 {
        self.high + self.medium + self.low + self.informational
    }
}

/// Percent complete of the long-running engine components
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentProgress {
    pub spider: u8,
    pub active_scan: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub plan_id: String,
    pub status: SnapshotStatus,
    pub started: Option<String>,
    pub finished: Option<String>,
    pub elapsed_seconds: u64,
    pub jobs_logged: usize,
    pub last_lines: Vec<String>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub alerts: AlertCounts,
    pub components: ComponentProgress,
    /// Auxiliary queries that failed on this poll and were defaulted
    pub degraded_fields: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl ProgressSnapshot {
    /// Project an execution into a snapshot
    ///
    /// The status is derived from the execution alone, so a snapshot can only read
    /// `completed` once the engine has reported a finish time.
    pub fn from_execution(
        execution: &PlanExecution,
        elapsed_seconds: u64,
        alerts: AlertCounts,
        components: ComponentProgress,
        degraded_fields: Vec<String>,
    ) -> Self {
        let status = if !execution.is_finished() {
            SnapshotStatus::Running
        } else if execution.has_errors() {
            SnapshotStatus::Failed
        } else {
            SnapshotStatus::Completed
        };

        let skip = execution.info.len().saturating_sub(LAST_LINES);

        Self {
            plan_id: execution.plan_id.clone(),
            status,
            started: non_empty(&execution.started),
            finished: non_empty(&execution.finished),
            elapsed_seconds,
            jobs_logged: execution.info.len(),
            last_lines: execution.info[skip..].to_vec(),
            warnings: execution.warn.clone(),
            errors: execution.error.clone(),
            alerts,
            components,
            degraded_fields,
            updated_at: Utc::now(),
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
