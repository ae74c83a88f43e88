//! Local container provider
//!
//! Reuses a running container with the configured name, or starts one when
//! `local.auto_start` is set. The container is left running after the scan unless
//! `local.cleanup` is set, so the next session starts warm. A container started here
//! that never becomes healthy is always removed.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use scanlift_core::config::LocalSettings;
use scanlift_core::domain::plan::ENGINE_WORK_DIR;
use scanlift_core::domain::{
    ConnectivityKind, EngineApi, EngineConnector, EngineEndpoint, InstanceInfo, LoadedPlan,
    PlanHandle, ProviderKind, ProviderMetadata, ScanError, ScanResult,
};
use scanlift_core::infrastructure::resilience::RetryConfig;
use scanlift_core::infrastructure::{CommandError, CommandOutput, CommandRunner, CommandSpec};

use crate::application::artifacts::{artifact_targets, write_json_report};
use crate::application::readiness::wait_for_engine;
use crate::domain::traits::{ScanProvider, not_provisioned};

/// Port the engine listens on inside the container
pub const CONTAINER_ENGINE_PORT: u16 = 8080;

const RUNTIME_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);
/// `run` may pull the image first
const CONTAINER_START_TIMEOUT: Duration = Duration::from_secs(600);

pub struct LocalProvider {
    settings: LocalSettings,
    health: RetryConfig,
    runner: Arc<dyn CommandRunner>,
    connector: Arc<dyn EngineConnector>,
    session_id: Uuid,
    engine: Option<Arc<dyn EngineApi>>,
    started_here: bool,
}

impl LocalProvider {
    pub fn new(
        settings: LocalSettings,
        health: RetryConfig,
        runner: Arc<dyn CommandRunner>,
        connector: Arc<dyn EngineConnector>,
        session_id: Uuid,
    ) -> Self {
        Self {
            settings,
            health,
            runner,
            connector,
            session_id,
            engine: None,
            started_here: false,
        }
    }

    fn base_url(&self) -> String {
        format!("http://localhost:{}", self.settings.port)
    }

    fn runtime(&self) -> CommandSpec {
        CommandSpec::new(self.settings.runtime.as_str()).timeout(RUNTIME_COMMAND_TIMEOUT)
    }

    /// Run a runtime command, mapping a missing or dead runtime to a connectivity error
    async fn run_runtime(&self, spec: CommandSpec) -> ScanResult<CommandOutput> {
        self.runner.run(&spec).await.map_err(|e| match e {
            CommandError::NotFound { .. } | CommandError::Spawn { .. } => ScanError::connectivity(
                ConnectivityKind::RuntimeUnavailable,
                self.settings.runtime.as_str(),
                e.to_string(),
            ),
            other => ScanError::Command(other),
        })
    }

    async fn container_running(&self) -> ScanResult<bool> {
        let spec = self.runtime().args([
            "ps".to_string(),
            "--filter".to_string(),
            format!("name=^/{}$", self.settings.container_name),
            "--format".to_string(),
            "{{.ID}}".to_string(),
        ]);
        let output = self.run_runtime(spec).await?;

        if !output.success() {
            return Err(ScanError::connectivity(
                ConnectivityKind::RuntimeUnavailable,
                self.settings.runtime.as_str(),
                output.stderr.trim().to_string(),
            ));
        }

        Ok(!output.stdout.trim().is_empty())
    }

    async fn start_container(&self) -> ScanResult<()> {
        let name = self.settings.container_name.as_str();

        // A stopped container with the same name would make `run` fail
        let removed = self.run_runtime(self.runtime().args(["rm", "-f", name])).await?;
        debug!(container = %name, status = ?removed.status, "Removed stale container");

        let mut spec = self
            .runtime()
            .timeout(CONTAINER_START_TIMEOUT)
            .args([
                "run".to_string(),
                "-d".to_string(),
                "--name".to_string(),
                name.to_string(),
                "-p".to_string(),
                format!("{}:{}", self.settings.port, CONTAINER_ENGINE_PORT),
                self.settings.image.clone(),
            ])
            .args(engine_daemon_args(CONTAINER_ENGINE_PORT));

        spec = match self.settings.api_key {
            Some(ref key) => spec.arg("-config").secret_arg(format!("api.key={key}")),
            None => spec.args(["-config", "api.disablekey=true"]),
        };

        info!(container = %name, image = %self.settings.image, port = self.settings.port, "Starting scan engine container");
        let output = self.run_runtime(spec).await?;
        if !output.success() {
            return Err(ScanError::connectivity(
                ConnectivityKind::EngineUnavailable,
                self.base_url(),
                format!("failed to start container {name}: {}", output.combined().trim()),
            ));
        }

        Ok(())
    }

    async fn remove_container(&self) -> ScanResult<()> {
        let name = self.settings.container_name.as_str();
        let output = self.run_runtime(self.runtime().args(["rm", "-f", name])).await?;
        if !output.success() {
            return Err(ScanError::Provisioning(format!(
                "failed to remove container {name}: {}",
                output.stderr.trim()
            )));
        }
        info!(container = %name, "Removed scan engine container");
        Ok(())
    }
}

/// Arguments that run the engine headless with its API reachable from the host
pub fn engine_daemon_args(port: u16) -> Vec<String> {
    vec![
        "zap.sh".to_string(),
        "-daemon".to_string(),
        "-host".to_string(),
        "0.0.0.0".to_string(),
        "-port".to_string(),
        port.to_string(),
        "-config".to_string(),
        "api.addrs.addr.name=.*".to_string(),
        "-config".to_string(),
        "api.addrs.addr.regex=true".to_string(),
    ]
}

#[async_trait]
impl ScanProvider for LocalProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Local
    }

    #[instrument(skip(self), fields(session_id = %self.session_id, container = %self.settings.container_name))]
    async fn provision(&mut self) -> ScanResult<InstanceInfo> {
        let running = self.container_running().await?;

        if running {
            info!("Reusing running scan engine container");
        } else if self.settings.auto_start {
            self.start_container().await?;
            self.started_here = true;
        } else {
            return Err(ScanError::connectivity(
                ConnectivityKind::EngineUnavailable,
                self.base_url(),
                format!(
                    "container {} is not running and local.auto_start is disabled",
                    self.settings.container_name
                ),
            ));
        }

        let base_url = self.base_url();
        let endpoint = EngineEndpoint::new(base_url.clone(), self.settings.api_key.clone());
        let engine = self
            .connector
            .connect(&endpoint)
            .map_err(|e| ScanError::from_engine_connect(&base_url, e))?;

        if let Err(e) = wait_for_engine(engine.as_ref(), &self.health).await {
            if self.started_here {
                if let Err(cleanup) = self.remove_container().await {
                    warn!(error = %cleanup, "Failed to remove container after failed health check");
                }
            }
            return Err(ScanError::from_engine_connect(&base_url, e));
        }

        self.engine = Some(engine);

        Ok(InstanceInfo {
            session_id: self.session_id,
            base_url,
            api_key: self.settings.api_key.clone(),
            mode: ProviderKind::Local,
            metadata: ProviderMetadata::Local {
                container_name: self.settings.container_name.clone(),
                started_here: self.started_here,
            },
        })
    }

    fn engine(&self) -> ScanResult<Arc<dyn EngineApi>> {
        self.engine.clone().ok_or_else(|| not_provisioned(self.kind()))
    }

    async fn upload_plan(
        &mut self,
        _instance: &InstanceInfo,
        plan: &LoadedPlan,
    ) -> ScanResult<PlanHandle> {
        let engine = self.engine()?;
        let name = self.settings.container_name.as_str();
        let engine_path = format!("{}/{}", ENGINE_WORK_DIR, plan.file_name);

        let mkdir = self
            .run_runtime(self.runtime().args(["exec", name, "mkdir", "-p", ENGINE_WORK_DIR]))
            .await?;
        if !mkdir.success() {
            debug!(stderr = %mkdir.stderr.trim(), "Could not create engine work directory");
        }

        let copy = self
            .run_runtime(self.runtime().args([
                "cp".to_string(),
                plan.path.display().to_string(),
                format!("{name}:{engine_path}"),
            ]))
            .await?;
        if !copy.success() {
            return Err(ScanError::Provisioning(format!(
                "failed to copy plan into container {name}: {}",
                copy.stderr.trim()
            )));
        }

        let plan_id = engine.run_plan(&engine_path).await?;
        info!(%plan_id, %engine_path, "Started automation plan");

        Ok(PlanHandle {
            plan_id,
            engine_path,
        })
    }

    async fn download_results(
        &mut self,
        _instance: &InstanceInfo,
        plan: &LoadedPlan,
        output_dir: &Path,
        report_filename: &str,
    ) -> ScanResult<Vec<PathBuf>> {
        let engine = self.engine()?;
        let mut files = vec![write_json_report(engine.as_ref(), output_dir, report_filename).await?];

        let name = self.settings.container_name.as_str();
        let artifacts = plan.plan.report_artifacts();
        for (artifact, target) in artifact_targets(&artifacts, output_dir, report_filename) {
            let spec = self.runtime().args([
                "cp".to_string(),
                format!("{name}:{artifact}"),
                target.display().to_string(),
            ]);
            match self.run_runtime(spec).await {
                Ok(output) if output.success() => files.push(target),
                Ok(output) => {
                    warn!(%artifact, stderr = %output.stderr.trim(), "Could not copy report artifact")
                }
                Err(e) => warn!(%artifact, error = %e, "Could not copy report artifact"),
            }
        }

        Ok(files)
    }

    #[instrument(skip(self), fields(session_id = %self.session_id))]
    async fn teardown(&mut self) -> ScanResult<()> {
        if self.engine.take().is_none() {
            return Ok(());
        }

        if self.settings.cleanup {
            self.remove_container().await
        } else {
            info!(container = %self.settings.container_name, "Leaving scan engine container running for reuse");
            Ok(())
        }
    }
}
