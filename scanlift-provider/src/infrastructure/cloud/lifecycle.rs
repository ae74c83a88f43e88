//! Infrastructure lifecycle manager
//!
//! Wraps the infrastructure tool (Terraform-compatible CLI) and implements the two-attempt
//! provisioning run: low-cost first, and exactly one standard-tier attempt when the
//! low-cost attempt fails for lack of capacity. Any other failure ends the run.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use scanlift_core::config::CloudSettings;
use scanlift_core::domain::{ComputeTier, ScanError, ScanResult};
use scanlift_core::infrastructure::{CommandRunner, CommandSpec};

use super::capacity::{FailureClass, classify_failure};
use crate::domain::lifecycle::{ProvisioningState, ProvisioningTransitionError};

pub const VARIABLES_FILE: &str = "terraform.tfvars.json";

const INIT_TIMEOUT: Duration = Duration::from_secs(600);
const APPLY_TIMEOUT: Duration = Duration::from_secs(3600);
const OUTPUT_TIMEOUT: Duration = Duration::from_secs(120);

/// Variables handed to the infrastructure module
#[derive(Debug, Clone, Serialize)]
pub struct InfraVariables {
    pub session_id: String,
    pub region: String,
    pub compute_tier: ComputeTier,
    pub use_spot: bool,
    pub instance_type: String,
    pub ssh_public_key: String,
    pub ssh_user: String,
    pub engine_port: u16,
}

/// Infrastructure that reached `Ready`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedInfra {
    pub host: String,
    pub compute_tier: ComputeTier,
    pub attempts: u32,
}

/// A tool working directory holding (possibly partial) state for one attempt
#[derive(Debug, Clone)]
struct Workspace {
    dir: PathBuf,
    tier: ComputeTier,
}

/// A failed attempt with the tool output used for classification
struct AttemptFailure {
    message: String,
    diagnostics: String,
}

impl AttemptFailure {
    fn new(message: impl Into<String>, diagnostics: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            diagnostics: diagnostics.into(),
        }
    }
}

pub struct InfraLifecycleManager {
    settings: CloudSettings,
    runner: Arc<dyn CommandRunner>,
    session_dir: PathBuf,
    session_id: Uuid,
    state: ProvisioningState,
    history: Vec<ProvisioningState>,
    attempts: u32,
    active: Option<Workspace>,
    leaked: Vec<PathBuf>,
}

impl InfraLifecycleManager {
    pub fn new(
        settings: CloudSettings,
        runner: Arc<dyn CommandRunner>,
        session_dir: &Path,
        session_id: Uuid,
    ) -> Self {
        Self {
            settings,
            runner,
            session_dir: session_dir.to_path_buf(),
            session_id,
            state: ProvisioningState::NotStarted,
            history: vec![ProvisioningState::NotStarted],
            attempts: 0,
            active: None,
            leaked: Vec::new(),
        }
    }

    pub fn state(&self) -> ProvisioningState {
        self.state
    }

    /// Every state visited so far, in order
    pub fn history(&self) -> &[ProvisioningState] {
        &self.history
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Workspaces whose infrastructure could not be destroyed
    pub fn leaked_workspaces(&self) -> &[PathBuf] {
        &self.leaked
    }

    fn transition(&mut self, to: ProvisioningState) -> ScanResult<()> {
        if !self.state.can_transition_to(&to) {
            let err = ProvisioningTransitionError {
                from: self.state,
                to,
            };
            return Err(ScanError::Provisioning(err.to_string()));
        }
        debug!(from = %self.state, %to, "Provisioning state transition");
        self.state = to;
        self.history.push(to);
        Ok(())
    }

    /// Provision infrastructure, falling back from low-cost to standard once on capacity errors
    #[instrument(skip(self, ssh_public_key), fields(session_id = %self.session_id, vendor = %self.settings.vendor))]
    pub async fn provision(&mut self, ssh_public_key: &str) -> ScanResult<ProvisionedInfra> {
        let module_dir = self.settings.module_dir();
        if !module_dir.is_dir() {
            return Err(ScanError::Config(format!(
                "infrastructure module directory {} does not exist",
                module_dir.display()
            )));
        }

        let first_tier = self.settings.compute_tier;
        self.transition(ProvisioningState::attempting(first_tier))?;

        let failure = match self.attempt(first_tier, ssh_public_key).await {
            Ok(host) => return self.ready(host, first_tier),
            Err(failure) => failure,
        };

        let class = classify_failure(self.settings.vendor, &failure.diagnostics);
        self.discard_active().await;

        if class != FailureClass::Capacity {
            self.transition(ProvisioningState::OtherFailed)?;
            error!(tier = %first_tier, error = %failure.message, "Provisioning failed");
            return Err(ScanError::Provisioning(failure.message));
        }

        if first_tier == ComputeTier::Standard {
            self.transition(ProvisioningState::OtherFailed)?;
            return Err(ScanError::Capacity {
                tier: first_tier,
                detail: failure.message,
            });
        }

        self.transition(ProvisioningState::CapacityFailed)?;
        warn!(
            tier = %first_tier,
            fallback = %ComputeTier::Standard,
            "No low-cost capacity available, retrying once with standard compute"
        );
        self.transition(ProvisioningState::ProvisioningStandard)?;

        match self.attempt(ComputeTier::Standard, ssh_public_key).await {
            Ok(host) => self.ready(host, ComputeTier::Standard),
            Err(failure) => {
                let class = classify_failure(self.settings.vendor, &failure.diagnostics);
                self.discard_active().await;
                self.transition(ProvisioningState::OtherFailed)?;
                error!(tier = %ComputeTier::Standard, error = %failure.message, "Fallback provisioning failed");
                match class {
                    FailureClass::Capacity => Err(ScanError::Capacity {
                        tier: ComputeTier::Standard,
                        detail: failure.message,
                    }),
                    FailureClass::Other => Err(ScanError::Provisioning(failure.message)),
                }
            }
        }
    }

    fn ready(&mut self, host: String, tier: ComputeTier) -> ScanResult<ProvisionedInfra> {
        self.transition(ProvisioningState::Ready)?;
        info!(%host, %tier, attempts = self.attempts, "Infrastructure ready");
        Ok(ProvisionedInfra {
            host,
            compute_tier: tier,
            attempts: self.attempts,
        })
    }

    fn tool(&self, workspace: &Path) -> CommandSpec {
        CommandSpec::new(self.settings.tool_binary.as_str())
            .arg(format!("-chdir={}", workspace.display()))
            .env("TF_IN_AUTOMATION", "1")
            .env("TF_INPUT", "0")
    }

    async fn attempt(
        &mut self,
        tier: ComputeTier,
        ssh_public_key: &str,
    ) -> Result<String, AttemptFailure> {
        self.attempts += 1;
        let dir = self.session_dir.join(format!("infra-{}", tier.as_str()));
        info!(%tier, attempt = self.attempts, workspace = %dir.display(), "Provisioning infrastructure");

        self.prepare_workspace(&dir, tier, ssh_public_key)
            .await
            .map_err(|e| AttemptFailure::new(format!("failed to prepare workspace: {e}"), ""))?;
        self.active = Some(Workspace {
            dir: dir.clone(),
            tier,
        });

        let init = self
            .tool(&dir)
            .args(["init", "-input=false", "-no-color"])
            .timeout(INIT_TIMEOUT);
        self.run_step("init", init).await?;

        let apply = self
            .tool(&dir)
            .args(["apply", "-auto-approve", "-input=false", "-no-color"])
            .arg(format!("-var-file={VARIABLES_FILE}"))
            .timeout(APPLY_TIMEOUT);
        self.run_step("apply", apply).await?;

        let output = self
            .tool(&dir)
            .args(["output", "-json"])
            .timeout(OUTPUT_TIMEOUT);
        let stdout = self.run_step("output", output).await?;

        parse_public_ip(&stdout).map_err(|message| AttemptFailure::new(message, ""))
    }

    async fn run_step(&self, step: &str, spec: CommandSpec) -> Result<String, AttemptFailure> {
        let output = self.runner.run(&spec).await.map_err(|e| {
            AttemptFailure::new(format!("{} {step} could not run: {e}", self.settings.tool_binary), "")
        })?;

        if output.success() {
            Ok(output.stdout)
        } else {
            let diagnostics = output.combined();
            Err(AttemptFailure::new(
                format!(
                    "{} {step} failed: {}",
                    self.settings.tool_binary,
                    last_lines(&diagnostics, 5)
                ),
                diagnostics,
            ))
        }
    }

    async fn prepare_workspace(
        &self,
        dir: &Path,
        tier: ComputeTier,
        ssh_public_key: &str,
    ) -> std::io::Result<()> {
        tokio::fs::create_dir_all(dir).await?;

        let mut entries = tokio::fs::read_dir(self.settings.module_dir()).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_module_file = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(".tf") || n.ends_with(".tf.json") || n.ends_with(".tftpl"));
            if is_module_file && entry.file_type().await?.is_file() {
                tokio::fs::copy(&path, dir.join(entry.file_name())).await?;
            }
        }

        let variables = InfraVariables {
            session_id: self.session_id.to_string(),
            region: self.settings.region.clone(),
            compute_tier: tier,
            use_spot: tier == ComputeTier::LowCost,
            instance_type: self.settings.instance_type.clone(),
            ssh_public_key: ssh_public_key.to_string(),
            ssh_user: self.settings.ssh_user.clone(),
            engine_port: self.settings.engine_port,
        };
        let json = serde_json::to_vec_pretty(&variables).map_err(std::io::Error::other)?;
        tokio::fs::write(dir.join(VARIABLES_FILE), json).await
    }

    async fn destroy_workspace(&self, workspace: &Workspace) -> ScanResult<()> {
        let spec = self
            .tool(&workspace.dir)
            .args(["destroy", "-auto-approve", "-input=false", "-no-color"])
            .arg(format!("-var-file={VARIABLES_FILE}"))
            .timeout(APPLY_TIMEOUT);
        let output = self.runner.run(&spec).await?;
        if !output.success() {
            return Err(ScanError::Provisioning(format!(
                "{} destroy failed for {} workspace: {}",
                self.settings.tool_binary,
                workspace.tier,
                last_lines(&output.combined(), 5)
            )));
        }
        Ok(())
    }

    /// Best-effort cleanup of a failed attempt's partial state
    async fn discard_active(&mut self) {
        let Some(workspace) = self.active.take() else {
            return;
        };

        match self.destroy_workspace(&workspace).await {
            Ok(()) => {
                debug!(tier = %workspace.tier, "Destroyed partial infrastructure");
                if let Err(e) = tokio::fs::remove_dir_all(&workspace.dir).await {
                    warn!(path = %workspace.dir.display(), error = %e, "Failed to remove workspace");
                }
            }
            Err(e) => {
                error!(
                    path = %workspace.dir.display(),
                    error = %e,
                    "Partial infrastructure may still exist; keeping its workspace for manual cleanup"
                );
                self.leaked.push(workspace.dir);
            }
        }
    }

    /// Destroy the ready infrastructure. Does nothing when none is active.
    #[instrument(skip(self), fields(session_id = %self.session_id))]
    pub async fn destroy(&mut self) -> ScanResult<()> {
        let Some(workspace) = self.active.take() else {
            return Ok(());
        };

        info!(tier = %workspace.tier, "Destroying infrastructure");
        match self.destroy_workspace(&workspace).await {
            Ok(()) => {
                if let Err(e) = tokio::fs::remove_dir_all(&workspace.dir).await {
                    warn!(path = %workspace.dir.display(), error = %e, "Failed to remove workspace");
                }
                info!("Infrastructure destroyed");
                Ok(())
            }
            Err(e) => {
                self.leaked.push(workspace.dir);
                Err(e)
            }
        }
    }
}

/// Read `public_ip` from `output -json`
fn parse_public_ip(stdout: &str) -> Result<String, String> {
    let outputs: serde_json::Value = serde_json::from_str(stdout)
        .map_err(|e| format!("could not parse infrastructure outputs: {e}"))?;
    outputs
        .get("public_ip")
        .and_then(|o| o.get("value"))
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
        .ok_or_else(|| "infrastructure outputs do not include public_ip".to_string())
}

fn last_lines(text: &str, count: usize) -> String {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let skip = lines.len().saturating_sub(count);
    lines[skip..].join(" | ")
}
