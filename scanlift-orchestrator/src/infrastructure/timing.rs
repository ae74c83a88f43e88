//! Per-session timing collection across a runner batch

use std::fmt;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use uuid::Uuid;

use crate::domain::outcome::ScanOutcome;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTiming {
    pub session_id: Uuid,
    pub plan: Option<PathBuf>,
    pub duration: Duration,
    pub success: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimingSummary {
    pub sessions: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Sum of session durations
    pub total: Duration,
    pub longest: Option<Duration>,
}

impl fmt::Display for TimingSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} session(s): {} succeeded, {} failed, {:.1}s total",
            self.sessions,
            self.succeeded,
            self.failed,
            self.total.as_secs_f64()
        )?;
        if let Some(longest) = self.longest {
            write!(f, ", longest {:.1}s", longest.as_secs_f64())?;
        }
        Ok(())
    }
}

/// Thread-safe collector fed by concurrently running sessions
#[derive(Debug, Default)]
pub struct TimingCollector {
    entries: Mutex<Vec<SessionTiming>>,
}

impl TimingCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, outcome: &ScanOutcome) {
        let entry = SessionTiming {
            session_id: outcome.session_id,
            plan: outcome.plan.clone(),
            duration: outcome.duration(),
            success: outcome.is_success(),
        };
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(entry);
    }

    pub fn entries(&self) -> Vec<SessionTiming> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn summary(&self) -> TimingSummary {
        let entries = self.entries();
        let succeeded = entries.iter().filter(|e| e.success).count();
        TimingSummary {
            sessions: entries.len(),
            succeeded,
            failed: entries.len() - succeeded,
            total: entries.iter().map(|e| e.duration).sum(),
            longest: entries.iter().map(|e| e.duration).max(),
        }
    }
}
