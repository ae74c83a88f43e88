mod common;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;
use uuid::Uuid;

use common::{
    CountingFactory, Fault, FixedProbe, ScriptedEngine, VALID_PLAN, session_config, write_plan,
};
use scanlift_core::ScanConfig;
use scanlift_orchestrator::{
    ManualClock, OutcomeStatus, ScanOutcome, ScanRunner, ScanSessionController, SessionExecutor,
};
use scanlift_provider::ProviderSelector;

/// Panics for one plan, succeeds for the rest
struct FragileExecutor {
    poison: PathBuf,
}

#[async_trait]
impl SessionExecutor for FragileExecutor {
    async fn run(&self, config: &ScanConfig) -> ScanOutcome {
        if config.scan.plan_path.as_deref() == Some(self.poison.as_path()) {
            panic!("session blew up");
        }
        tokio::task::yield_now().await;
        ScanOutcome::success(Uuid::new_v4(), "ok").with_plan(config.scan.plan_path.clone())
    }
}

fn config_for(plan: &str) -> ScanConfig {
    let mut config = ScanConfig::default();
    config.scan.plan_path = Some(Path::new(plan).to_path_buf());
    config
}

#[tokio::test]
async fn test_panicking_session_does_not_affect_siblings() {
    let executor = Arc::new(FragileExecutor {
        poison: PathBuf::from("b.yaml"),
    });
    let runner = ScanRunner::new(executor, 2);

    let outcomes = runner
        .run_all(vec![config_for("a.yaml"), config_for("b.yaml"), config_for("c.yaml")])
        .await;

    let statuses: Vec<_> = outcomes.iter().map(|o| o.status).collect();
    assert_eq!(
        statuses,
        vec![OutcomeStatus::Success, OutcomeStatus::Fail, OutcomeStatus::Success]
    );
    assert_eq!(outcomes[1].plan.as_deref(), Some(Path::new("b.yaml")));
    assert_eq!(outcomes[1].error_kind.as_deref(), Some("internal_error"));
    assert!(outcomes[1].message.contains("session blew up"));

    let summary = runner.timings().summary();
    assert_eq!(summary.sessions, 3);
    assert_eq!(summary.failed, 1);
}

#[tokio::test]
async fn test_every_session_gets_its_own_provider() {
    let dir = TempDir::new().unwrap();
    let engine = ScriptedEngine::finishing_after(1);
    let factory = CountingFactory::new(Fault::None, engine);
    let controller = ScanSessionController::new(
        ProviderSelector::new(Arc::new(FixedProbe::default())),
        factory.clone(),
        Arc::new(ManualClock::new()),
    );
    let runner = ScanRunner::new(Arc::new(controller), 3);

    let configs: Vec<_> = (0..4)
        .map(|i| {
            let plan = write_plan(dir.path(), &format!("plan-{i}.yaml"), VALID_PLAN);
            session_config(&plan, &dir.path().join(format!("out-{i}")))
        })
        .collect();

    let outcomes = runner.run_all(configs).await;

    assert!(outcomes.iter().all(ScanOutcome::is_success));
    let ids: std::collections::HashSet<_> = outcomes.iter().map(|o| o.session_id).collect();
    assert_eq!(ids.len(), 4);
    assert_eq!(factory.counters.created(), 4);
    assert_eq!(factory.counters.provisioned(), 4);
    assert_eq!(factory.counters.torn_down(), 4);
    for i in 0..4 {
        assert!(dir.path().join(format!("out-{i}")).join("scan-report.json").exists());
    }
}
