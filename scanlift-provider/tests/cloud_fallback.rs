mod common;

use std::sync::Arc;

use tempfile::TempDir;
use uuid::Uuid;

use common::{FakeConnector, FakeEngine, ScriptedRunner, TEST_HOST, cloud_settings, failed, fast_retry};
use scanlift_core::domain::{ComputeTier, ProviderMetadata, ScanError};
use scanlift_provider::infrastructure::cloud::lifecycle::{InfraLifecycleManager, VARIABLES_FILE};
use scanlift_provider::{CloudProvider, ProvisioningState, ScanProvider};

const SPOT_CAPACITY: &str = "Error: creating EC2 Instance: InsufficientInstanceCapacity: \
                             We currently do not have sufficient capacity in the Availability Zone";

struct Fixture {
    templates: TempDir,
    sessions: TempDir,
    runner: Arc<ScriptedRunner>,
}

impl Fixture {
    fn new() -> Self {
        Self {
            templates: TempDir::new().unwrap(),
            sessions: TempDir::new().unwrap(),
            runner: ScriptedRunner::new(),
        }
    }

    fn manager(&self, tier: ComputeTier) -> InfraLifecycleManager {
        let mut settings = cloud_settings(self.templates.path(), self.sessions.path());
        settings.compute_tier = tier;
        InfraLifecycleManager::new(settings, self.runner.clone(), self.sessions.path(), Uuid::new_v4())
    }
}

#[tokio::test]
async fn test_capacity_error_on_low_cost_falls_back_to_standard_once() {
    let fixture = Fixture::new();
    fixture.runner.push_apply(failed(SPOT_CAPACITY));
    let mut manager = fixture.manager(ComputeTier::LowCost);

    let infra = manager.provision("ssh-ed25519 AAAA").await.unwrap();

    assert_eq!(infra.host, TEST_HOST);
    assert_eq!(infra.compute_tier, ComputeTier::Standard);
    assert_eq!(infra.attempts, 2);
    assert_eq!(
        manager.history(),
        &[
            ProvisioningState::NotStarted,
            ProvisioningState::ProvisioningLowCost,
            ProvisioningState::CapacityFailed,
            ProvisioningState::ProvisioningStandard,
            ProvisioningState::Ready,
        ]
    );

    // the failed spot attempt is destroyed before the fallback starts
    assert_eq!(
        fixture.runner.tool_verbs(),
        vec!["init", "apply", "destroy", "init", "apply", "output"]
    );
}

#[tokio::test]
async fn test_fallback_attempt_requests_standard_compute() {
    let fixture = Fixture::new();
    fixture.runner.push_apply(failed(SPOT_CAPACITY));
    let mut manager = fixture.manager(ComputeTier::LowCost);

    manager.provision("ssh-ed25519 AAAA").await.unwrap();

    let variables = std::fs::read_to_string(fixture.sessions.path().join("infra-on-demand").join(VARIABLES_FILE)).unwrap();
    let variables: serde_json::Value = serde_json::from_str(&variables).unwrap();
    assert_eq!(variables["compute_tier"], "on-demand");
    assert_eq!(variables["use_spot"], false);
    assert_eq!(variables["ssh_public_key"], "ssh-ed25519 AAAA");

    let workspace = fixture.sessions.path().join("infra-on-demand");
    assert!(workspace.join("main.tf").exists());
    assert!(!workspace.join("README.md").exists());
    assert!(!fixture.sessions.path().join("infra-spot").exists());
}

#[tokio::test]
async fn test_non_capacity_failure_is_not_retried() {
    let fixture = Fixture::new();
    fixture
        .runner
        .push_apply(failed("Error: no valid credential sources for AWS Provider found"));
    let mut manager = fixture.manager(ComputeTier::LowCost);

    let err = manager.provision("ssh-ed25519 AAAA").await.unwrap_err();

    assert!(matches!(err, ScanError::Provisioning(ref msg) if msg.contains("credential")));
    assert_eq!(manager.state(), ProvisioningState::OtherFailed);
    let applies = fixture.runner.tool_verbs().iter().filter(|v| *v == "apply").count();
    assert_eq!(applies, 1);
}

#[tokio::test]
async fn test_capacity_failure_on_both_tiers_stops_after_two_attempts() {
    let fixture = Fixture::new();
    fixture.runner.push_apply(failed(SPOT_CAPACITY));
    fixture.runner.push_apply(failed(SPOT_CAPACITY));
    let mut manager = fixture.manager(ComputeTier::LowCost);

    let err = manager.provision("ssh-ed25519 AAAA").await.unwrap_err();

    assert!(matches!(
        err,
        ScanError::Capacity {
            tier: ComputeTier::Standard,
            ..
        }
    ));
    assert_eq!(manager.attempts(), 2);
    let applies = fixture.runner.tool_verbs().iter().filter(|v| *v == "apply").count();
    assert_eq!(applies, 2);
}

#[tokio::test]
async fn test_standard_preference_makes_a_single_attempt() {
    let fixture = Fixture::new();
    fixture.runner.push_apply(failed(SPOT_CAPACITY));
    let mut manager = fixture.manager(ComputeTier::Standard);

    let err = manager.provision("ssh-ed25519 AAAA").await.unwrap_err();

    assert!(matches!(
        err,
        ScanError::Capacity {
            tier: ComputeTier::Standard,
            ..
        }
    ));
    assert_eq!(
        manager.history(),
        &[
            ProvisioningState::NotStarted,
            ProvisioningState::ProvisioningStandard,
            ProvisioningState::OtherFailed,
        ]
    );
}

#[tokio::test]
async fn test_missing_module_directory_is_a_config_error() {
    let fixture = Fixture::new();
    let mut settings = cloud_settings(fixture.templates.path(), fixture.sessions.path());
    settings.templates_dir = fixture.sessions.path().join("nowhere");
    let mut manager =
        InfraLifecycleManager::new(settings, fixture.runner.clone(), fixture.sessions.path(), Uuid::new_v4());

    let err = manager.provision("ssh-ed25519 AAAA").await.unwrap_err();

    assert!(matches!(err, ScanError::Config(_)));
    assert!(fixture.runner.calls().is_empty());
}

#[tokio::test]
async fn test_destroy_is_idempotent() {
    let fixture = Fixture::new();
    let mut manager = fixture.manager(ComputeTier::LowCost);
    manager.provision("ssh-ed25519 AAAA").await.unwrap();

    manager.destroy().await.unwrap();
    manager.destroy().await.unwrap();

    let destroys = fixture.runner.tool_verbs().iter().filter(|v| *v == "destroy").count();
    assert_eq!(destroys, 1);
    assert!(!fixture.sessions.path().join("infra-spot").exists());
}

fn cloud_provider(fixture: &Fixture, engine: Arc<FakeEngine>) -> (CloudProvider, Arc<FakeConnector>) {
    let connector = FakeConnector::new(engine);
    let provider = CloudProvider::new(
        cloud_settings(fixture.templates.path(), fixture.sessions.path()),
        fast_retry(2),
        fixture.runner.clone(),
        connector.clone(),
        Uuid::new_v4(),
    );
    (provider, connector)
}

fn session_dirs(fixture: &Fixture) -> usize {
    std::fs::read_dir(fixture.sessions.path())
        .unwrap()
        .filter(|e| {
            e.as_ref()
                .map(|e| e.file_name().to_string_lossy().starts_with("scanlift-"))
                .unwrap_or(false)
        })
        .count()
}

#[tokio::test]
async fn test_cloud_provider_reports_tier_actually_used() {
    let fixture = Fixture::new();
    fixture.runner.push_apply(failed(SPOT_CAPACITY));
    let (mut provider, connector) = cloud_provider(&fixture, FakeEngine::new());

    let instance = provider.provision().await.unwrap();

    assert_eq!(instance.base_url, format!("http://{TEST_HOST}:8080"));
    assert_eq!(instance.compute_tier(), Some(ComputeTier::Standard));
    assert!(matches!(instance.metadata, ProviderMetadata::Cloud { ref host, .. } if host == TEST_HOST));
    assert_eq!(connector.endpoints()[0].api_key.as_deref(), Some("cloud-key"));

    let programs = fixture.runner.programs();
    assert_eq!(programs.first().map(String::as_str), Some("ssh-keygen"));
    assert!(programs.iter().any(|p| p == "ssh"));

    provider.teardown().await.unwrap();
}

#[tokio::test]
async fn test_cloud_teardown_destroys_infrastructure_and_keys() {
    let fixture = Fixture::new();
    let (mut provider, _) = cloud_provider(&fixture, FakeEngine::new());
    provider.provision().await.unwrap();
    assert_eq!(session_dirs(&fixture), 1);

    provider.teardown().await.unwrap();
    provider.teardown().await.unwrap();

    let destroys = fixture.runner.tool_verbs().iter().filter(|v| *v == "destroy").count();
    assert_eq!(destroys, 1);
    assert_eq!(session_dirs(&fixture), 0);
    assert!(provider.engine().is_err());
}

#[tokio::test]
async fn test_failed_destroy_keeps_state_and_reports_error() {
    let fixture = Fixture::new();
    let (mut provider, _) = cloud_provider(&fixture, FakeEngine::new());
    provider.provision().await.unwrap();
    fixture.runner.fail_destroy("Error: deleting EC2 Instance: RequestLimitExceeded");

    let err = provider.teardown().await.unwrap_err();

    assert!(matches!(err, ScanError::Provisioning(_)));
    assert_eq!(session_dirs(&fixture), 1);
}

#[tokio::test]
async fn test_engine_that_never_answers_triggers_teardown() {
    let fixture = Fixture::new();
    let engine = FakeEngine::failing(scanlift_core::domain::EngineError::ConnectionRefused(
        "refused".into(),
    ));
    let (mut provider, _) = cloud_provider(&fixture, engine.clone());

    let err = provider.provision().await.unwrap_err();

    assert!(matches!(err, ScanError::Connectivity { .. }));
    assert_eq!(engine.version_calls(), 2);
    let destroys = fixture.runner.tool_verbs().iter().filter(|v| *v == "destroy").count();
    assert_eq!(destroys, 1);
    assert_eq!(session_dirs(&fixture), 0);
}
