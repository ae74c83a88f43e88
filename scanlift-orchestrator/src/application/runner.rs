//! Bounded pool for running many sessions
//!
//! Sessions share nothing but the executor; each gets its own provider, instance and
//! output directory. At most `width` sessions run at once. A session that panics is
//! reported as failed and its siblings keep going.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info};
use uuid::Uuid;

use scanlift_core::ScanConfig;

use crate::application::session::{SessionExecutor, panic_message};
use crate::domain::outcome::ScanOutcome;
use crate::infrastructure::timing::TimingCollector;

pub struct ScanRunner {
    executor: Arc<dyn SessionExecutor>,
    width: usize,
    timings: Arc<TimingCollector>,
}

impl ScanRunner {
    pub fn new(executor: Arc<dyn SessionExecutor>, width: usize) -> Self {
        Self {
            executor,
            width: width.max(1),
            timings: Arc::new(TimingCollector::new()),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn timings(&self) -> &TimingCollector {
        &self.timings
    }

    /// Run every configuration as its own session; outcomes come back in input order
    pub async fn run_all(&self, configs: Vec<ScanConfig>) -> Vec<ScanOutcome> {
        let semaphore = Arc::new(Semaphore::new(self.width));
        let mut tasks = JoinSet::new();
        let total = configs.len();
        let plans: Vec<_> = configs.iter().map(|c| c.scan.plan_path.clone()).collect();

        info!(sessions = total, width = self.width, "Starting scan runner");

        for (index, config) in configs.into_iter().enumerate() {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(err) => {
                    error!(error = %err, "Failed to acquire session permit");
                    break;
                }
            };
            let executor = self.executor.clone();
            let timings = self.timings.clone();

            tasks.spawn(async move {
                let outcome = match AssertUnwindSafe(executor.run(&config)).catch_unwind().await {
                    Ok(outcome) => outcome,
                    Err(panic) => {
                        let detail = panic_message(panic.as_ref());
                        error!(plan = ?config.scan.plan_path, %detail, "Scan session panicked");
                        ScanOutcome::panicked(Uuid::new_v4(), &detail)
                            .with_plan(config.scan.plan_path.clone())
                    }
                };
                timings.record(&outcome);
                drop(permit);
                (index, outcome)
            });
        }

        let mut outcomes: Vec<Option<ScanOutcome>> = vec![None; total];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => outcomes[index] = Some(outcome),
                Err(e) => error!(error = %e, "Scan session task did not complete"),
            }
        }

        let outcomes: Vec<ScanOutcome> = outcomes
            .into_iter()
            .zip(plans)
            .map(|(outcome, plan)| {
                outcome.unwrap_or_else(|| {
                    ScanOutcome::panicked(Uuid::new_v4(), "session task was aborted").with_plan(plan)
                })
            })
            .collect();

        info!(summary = %self.timings.summary(), "Scan runner finished");
        outcomes
    }
}
