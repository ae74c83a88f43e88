//! Result of one scan session

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use scanlift_core::domain::{ComputeTier, ProviderKind, ScanError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    Fail,
}

/// What a session reports back; every error is folded into a `fail` outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanOutcome {
    pub session_id: Uuid,
    pub status: OutcomeStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<ProviderKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compute_tier: Option<ComputeTier>,
    /// Error category (`timeout_error`, `capacity_error`, ...) for failed sessions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(default)]
    pub artifacts: Vec<PathBuf>,
    pub duration_ms: u64,
}

impl ScanOutcome {
    pub fn success(session_id: Uuid, message: impl Into<String>) -> Self {
        Self {
            session_id,
            status: OutcomeStatus::Success,
            message: message.into(),
            plan: None,
            mode: None,
            compute_tier: None,
            error_kind: None,
            artifacts: Vec::new(),
            duration_ms: 0,
        }
    }

    pub fn failure(session_id: Uuid, error: &ScanError) -> Self {
        Self {
            session_id,
            status: OutcomeStatus::Fail,
            message: error.user_message(),
            plan: None,
            mode: None,
            compute_tier: None,
            error_kind: Some(error.kind().to_string()),
            artifacts: Vec::new(),
            duration_ms: 0,
        }
    }

    /// A session whose task panicked
    pub fn panicked(session_id: Uuid, detail: &str) -> Self {
        Self {
            session_id,
            status: OutcomeStatus::Fail,
            message: format!("Scan session crashed: {detail}"),
            plan: None,
            mode: None,
            compute_tier: None,
            error_kind: Some("internal_error".to_string()),
            artifacts: Vec::new(),
            duration_ms: 0,
        }
    }

    pub fn with_plan(mut self, plan: Option<PathBuf>) -> Self {
        self.plan = plan;
        self
    }

    pub fn with_mode(mut self, mode: Option<ProviderKind>) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_compute_tier(mut self, tier: Option<ComputeTier>) -> Self {
        self.compute_tier = tier;
        self
    }

    pub fn with_artifacts(mut self, artifacts: Vec<PathBuf>) -> Self {
        self.artifacts = artifacts;
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}
