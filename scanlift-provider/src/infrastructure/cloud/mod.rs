//! Cloud provider: a fresh engine host per session
//!
//! Provisioning creates a session workspace, an ephemeral SSH keypair and the
//! infrastructure (low-cost first, with a single standard-tier fallback on capacity
//! errors), then starts the engine container on the host over SSH. Teardown destroys the
//! infrastructure and deletes the key material; it also runs when any stage after the
//! infrastructure came up fails.

pub mod capacity;
pub mod keypair;
pub mod lifecycle;
pub mod ssh;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use scanlift_core::config::CloudSettings;
use scanlift_core::domain::plan::ENGINE_WORK_DIR;
use scanlift_core::domain::{
    EngineApi, EngineConnector, EngineEndpoint, InstanceInfo, LoadedPlan, PlanHandle,
    ProviderKind, ProviderMetadata, ScanError, ScanResult,
};
use scanlift_core::infrastructure::CommandRunner;
use scanlift_core::infrastructure::resilience::RetryConfig;

use self::keypair::EphemeralKeypair;
use self::lifecycle::{InfraLifecycleManager, ProvisionedInfra};
use self::ssh::SshChannel;
use super::local::{CONTAINER_ENGINE_PORT, engine_daemon_args};
use crate::application::artifacts::{artifact_targets, write_json_report};
use crate::application::readiness::wait_for_engine;
use crate::domain::traits::{ScanProvider, not_provisioned};

/// Host directory mounted at the engine's work directory
pub const REMOTE_WORK_DIR: &str = "scanlift-wrk";
pub const REMOTE_CONTAINER_NAME: &str = "scanlift-engine";

pub struct CloudProvider {
    settings: CloudSettings,
    health: RetryConfig,
    runner: Arc<dyn CommandRunner>,
    connector: Arc<dyn EngineConnector>,
    session_id: Uuid,
    api_key: String,
    workspace: Option<TempDir>,
    keypair: Option<EphemeralKeypair>,
    manager: Option<InfraLifecycleManager>,
    channel: Option<SshChannel>,
    engine: Option<Arc<dyn EngineApi>>,
    torn_down: bool,
}

impl CloudProvider {
    pub fn new(
        settings: CloudSettings,
        health: RetryConfig,
        runner: Arc<dyn CommandRunner>,
        connector: Arc<dyn EngineConnector>,
        session_id: Uuid,
    ) -> Self {
        let api_key = settings
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().simple().to_string());

        Self {
            settings,
            health,
            runner,
            connector,
            session_id,
            api_key,
            workspace: None,
            keypair: None,
            manager: None,
            channel: None,
            engine: None,
            torn_down: false,
        }
    }

    /// Lifecycle manager of the current session, once provisioning has started
    pub fn lifecycle(&self) -> Option<&InfraLifecycleManager> {
        self.manager.as_ref()
    }

    fn create_workspace(&self) -> ScanResult<TempDir> {
        let prefix = format!("scanlift-{}-", self.session_id.simple());
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);
        let dir = match self.settings.workspace_root {
            Some(ref root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };
        debug!(path = %dir.path().display(), "Created session workspace");
        Ok(dir)
    }

    async fn provision_stages(&mut self) -> ScanResult<InstanceInfo> {
        let workspace = self.create_workspace()?;
        let session_dir = workspace.path().to_path_buf();
        self.workspace = Some(workspace);

        let keypair =
            EphemeralKeypair::generate(self.runner.as_ref(), &session_dir, self.session_id).await?;
        let public_key = keypair.public_key().to_string();
        let private_key = keypair.private_key().to_path_buf();
        self.keypair = Some(keypair);

        let manager = self.manager.insert(InfraLifecycleManager::new(
            self.settings.clone(),
            self.runner.clone(),
            &session_dir,
            self.session_id,
        ));
        let ProvisionedInfra {
            host, compute_tier, ..
        } = manager.provision(&public_key).await?;

        let channel = SshChannel::connect(
            self.runner.clone(),
            &host,
            &self.settings.ssh_user,
            &private_key,
            &session_dir,
            &self.settings.ssh_connect.to_retry_config(),
        )
        .await?;
        let channel = self.channel.insert(channel);

        info!(%host, image = %self.settings.engine_image, "Starting scan engine on host");
        let started = channel
            .exec_secret(&engine_start_command(
                &self.settings.engine_image,
                self.settings.engine_port,
                &self.api_key,
            ))
            .await?;
        if !started.success() {
            return Err(ScanError::Provisioning(format!(
                "failed to start scan engine on {host}: {}",
                started.combined().trim()
            )));
        }

        let base_url = format!("http://{}:{}", host, self.settings.engine_port);
        let endpoint = EngineEndpoint::new(base_url.clone(), Some(self.api_key.clone()));
        let engine = self
            .connector
            .connect(&endpoint)
            .map_err(|e| ScanError::from_engine_connect(&base_url, e))?;
        let version = wait_for_engine(engine.as_ref(), &self.health)
            .await
            .map_err(|e| ScanError::from_engine_connect(&base_url, e))?;
        info!(%base_url, %version, tier = %compute_tier, "Cloud scan engine ready");

        self.engine = Some(engine);

        Ok(InstanceInfo {
            session_id: self.session_id,
            base_url,
            api_key: Some(self.api_key.clone()),
            mode: ProviderKind::Cloud,
            metadata: ProviderMetadata::Cloud {
                vendor: self.settings.vendor,
                region: self.settings.region.clone(),
                compute_tier,
                host,
            },
        })
    }

    fn channel(&self) -> ScanResult<&SshChannel> {
        self.channel
            .as_ref()
            .ok_or_else(|| not_provisioned(ProviderKind::Cloud))
    }
}

/// Shell command that (re)starts the engine container on the host
fn engine_start_command(image: &str, host_port: u16, api_key: &str) -> String {
    let mut run = vec![
        "docker".to_string(),
        "run".to_string(),
        "-d".to_string(),
        "--name".to_string(),
        REMOTE_CONTAINER_NAME.to_string(),
        "-p".to_string(),
        format!("{host_port}:{CONTAINER_ENGINE_PORT}"),
        "-v".to_string(),
        format!("$HOME/{REMOTE_WORK_DIR}:{ENGINE_WORK_DIR}"),
        image.to_string(),
    ];
    run.extend(engine_daemon_args(CONTAINER_ENGINE_PORT));
    run.push("-config".to_string());
    run.push(format!("api.key={api_key}"));

    let run = run
        .iter()
        .map(|arg| shell_word(arg))
        .collect::<Vec<_>>()
        .join(" ");

    format!(
        "mkdir -p ~/{REMOTE_WORK_DIR} && chmod 777 ~/{REMOTE_WORK_DIR} && \
         (docker rm -f {REMOTE_CONTAINER_NAME} >/dev/null 2>&1 || true) && {run}"
    )
}

/// Quote an argument for a POSIX shell, leaving `$HOME` expandable
fn shell_word(arg: &str) -> String {
    let plain = arg
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "-_./:=@$".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// Map an engine-side work directory path to the host path it is mounted from
fn host_path(engine_path: &str) -> Option<String> {
    let rest = engine_path.strip_prefix(ENGINE_WORK_DIR)?;
    let rest = rest.trim_start_matches('/');
    if rest.is_empty() {
        return None;
    }
    Some(format!("{REMOTE_WORK_DIR}/{rest}"))
}

#[async_trait]
impl ScanProvider for CloudProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Cloud
    }

    #[instrument(skip(self), fields(session_id = %self.session_id, vendor = %self.settings.vendor))]
    async fn provision(&mut self) -> ScanResult<InstanceInfo> {
        match self.provision_stages().await {
            Ok(instance) => Ok(instance),
            Err(e) => {
                error!(error = %e, "Cloud provisioning failed, releasing session resources");
                if let Err(cleanup) = self.teardown().await {
                    error!(error = %cleanup, "Cleanup after failed provisioning did not complete");
                }
                Err(e)
            }
        }
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
        let channel = self.channel()?;

        channel
            .upload(&plan.path, &format!("{REMOTE_WORK_DIR}/{}", plan.file_name))
            .await?;

        let engine_path = format!("{}/{}", ENGINE_WORK_DIR, plan.file_name);
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

        let channel = self.channel()?;
        let artifacts = plan.plan.report_artifacts();
        for (artifact, target) in artifact_targets(&artifacts, output_dir, report_filename) {
            let Some(remote) = host_path(&artifact) else {
                warn!(%artifact, "Report artifact is outside the engine work directory");
                continue;
            };
            match channel.download(&remote, &target).await {
                Ok(()) => files.push(target),
                Err(e) => warn!(%artifact, error = %e, "Could not download report artifact"),
            }
        }

        Ok(files)
    }

    /// Destroy infrastructure and delete key material. Idempotent.
    #[instrument(skip(self), fields(session_id = %self.session_id))]
    async fn teardown(&mut self) -> ScanResult<()> {
        if self.torn_down || self.workspace.is_none() {
            return Ok(());
        }
        self.torn_down = true;
        self.engine = None;

        if let Some(mut channel) = self.channel.take() {
            channel.close().await;
        }

        let destroyed = match self.manager.as_mut() {
            Some(manager) => manager.destroy().await,
            None => Ok(()),
        };

        if let Some(keypair) = self.keypair.take() {
            keypair.delete().await;
        }

        let leaked = self
            .manager
            .as_ref()
            .is_some_and(|m| !m.leaked_workspaces().is_empty());
        if let Some(workspace) = self.workspace.take() {
            if leaked {
                let kept = workspace.keep();
                warn!(
                    path = %kept.display(),
                    "Infrastructure state kept for manual cleanup"
                );
            } else if let Err(e) = workspace.close() {
                warn!(error = %e, "Failed to remove session workspace");
            }
        }

        if destroyed.is_ok() {
            info!("Cloud session torn down");
        }
        destroyed
    }
}
