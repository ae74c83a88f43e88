//! Plan execution records reported by the engine

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Progress of one running plan, as last reported by the engine
///
/// `finished` going from empty to non-empty is the only completion signal. A non-empty
/// `error` list at completion means the run failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanExecution {
    pub plan_id: String,
    pub started: String,
    pub finished: String,
    /// Append-only job status lines
    pub info: Vec<String>,
    pub warn: Vec<String>,
    pub error: Vec<String>,
}

impl PlanExecution {
    pub fn is_finished(&self) -> bool {
        !self.finished.trim().is_empty()
    }

    pub fn has_errors(&self) -> bool {
        !self.error.is_empty()
    }
}

/// Result of watching a plan to successful completion
#[derive(Debug, Clone)]
pub struct PlanOutcome {
    pub plan_id: String,
    pub polls: u32,
    pub elapsed: Duration,
    pub execution: PlanExecution,
}
