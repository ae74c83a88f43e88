//! Remote command channel to a provisioned host over the OpenSSH client

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use scanlift_core::domain::{ScanError, ScanResult};
use scanlift_core::infrastructure::resilience::{RetryConfig, retry_with_backoff};
use scanlift_core::infrastructure::{CommandError, CommandOutput, CommandRunner, CommandSpec};

/// Exit status the ssh client uses for its own (connection) failures
const SSH_CONNECTION_FAILURE: i32 = 255;
const SSH_COMMAND_TIMEOUT: Duration = Duration::from_secs(300);

/// Key-authenticated channel to one host
///
/// Connections are multiplexed through a control socket in the session directory, so
/// `close()` has a master connection to shut down.
pub struct SshChannel {
    runner: Arc<dyn CommandRunner>,
    host: String,
    user: String,
    key_path: PathBuf,
    control_path: PathBuf,
    open: bool,
}

impl SshChannel {
    /// Connect, retrying with backoff while the host boots
    pub async fn connect(
        runner: Arc<dyn CommandRunner>,
        host: &str,
        user: &str,
        key_path: &Path,
        control_dir: &Path,
        retry: &RetryConfig,
    ) -> ScanResult<Self> {
        let mut channel = Self {
            runner,
            host: host.to_string(),
            user: user.to_string(),
            key_path: key_path.to_path_buf(),
            control_path: control_dir.join("ssh-control"),
            open: true,
        };

        let target = &channel;
        let probe = move || async move {
            let output = target
                .run(target.ssh_spec("true"))
                .await
                .map_err(ConnectFailure::Command)?;
            if output.success() {
                Ok::<(), ConnectFailure>(())
            } else {
                Err(ConnectFailure::Rejected(output))
            }
        };

        let result = retry_with_backoff(retry, probe, ConnectFailure::is_retryable).await;

        match result {
            Ok(()) => {
                info!(host, user, "SSH channel established");
                Ok(channel)
            }
            Err(failure) => {
                channel.open = false;
                Err(ScanError::Provisioning(format!(
                    "could not open SSH channel to {user}@{host}: {failure}"
                )))
            }
        }
    }

    fn common_options(&self) -> Vec<String> {
        vec![
            "-i".to_string(),
            self.key_path.display().to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            "-o".to_string(),
            "UserKnownHostsFile=/dev/null".to_string(),
            "-o".to_string(),
            "ConnectTimeout=10".to_string(),
            "-o".to_string(),
            "ControlMaster=auto".to_string(),
            "-o".to_string(),
            format!("ControlPath={}", self.control_path.display()),
            "-o".to_string(),
            "ControlPersist=300".to_string(),
        ]
    }

    fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    fn ssh_spec(&self, command: &str) -> CommandSpec {
        CommandSpec::new("ssh")
            .args(self.common_options())
            .arg(self.destination())
            .arg(command)
            .timeout(SSH_COMMAND_TIMEOUT)
    }

    async fn run(&self, spec: CommandSpec) -> Result<CommandOutput, CommandError> {
        self.runner.run(&spec).await
    }

    fn ensure_open(&self) -> ScanResult<()> {
        if self.open {
            Ok(())
        } else {
            Err(ScanError::Provisioning(format!(
                "SSH channel to {} is closed",
                self.host
            )))
        }
    }

    /// Run a shell command on the host
    pub async fn exec(&self, command: &str) -> ScanResult<CommandOutput> {
        self.ensure_open()?;
        Ok(self.run(self.ssh_spec(command)).await?)
    }

    /// Run a command whose text must not show up in logs
    pub async fn exec_secret(&self, command: &str) -> ScanResult<CommandOutput> {
        self.ensure_open()?;
        let spec = CommandSpec::new("ssh")
            .args(self.common_options())
            .arg(self.destination())
            .secret_arg(command)
            .timeout(SSH_COMMAND_TIMEOUT);
        Ok(self.run(spec).await?)
    }

    /// Copy a local file to `remote_path` (relative paths land in the user's home)
    pub async fn upload(&self, local: &Path, remote_path: &str) -> ScanResult<()> {
        self.ensure_open()?;
        let spec = CommandSpec::new("scp")
            .args(self.common_options())
            .arg(local.display().to_string())
            .arg(format!("{}:{}", self.destination(), remote_path))
            .timeout(SSH_COMMAND_TIMEOUT);
        let output = self.run(spec).await?;
        if !output.success() {
            return Err(ScanError::Provisioning(format!(
                "failed to upload {} to {}: {}",
                local.display(),
                self.host,
                output.stderr.trim()
            )));
        }
        debug!(local = %local.display(), remote_path, "Uploaded file");
        Ok(())
    }

    /// Copy `remote_path` from the host to a local file
    pub async fn download(&self, remote_path: &str, local: &Path) -> ScanResult<()> {
        self.ensure_open()?;
        let spec = CommandSpec::new("scp")
            .args(self.common_options())
            .arg(format!("{}:{}", self.destination(), remote_path))
            .arg(local.display().to_string())
            .timeout(SSH_COMMAND_TIMEOUT);
        let output = self.run(spec).await?;
        if !output.success() {
            return Err(ScanError::Provisioning(format!(
                "failed to download {} from {}: {}",
                remote_path,
                self.host,
                output.stderr.trim()
            )));
        }
        debug!(remote_path, local = %local.display(), "Downloaded file");
        Ok(())
    }

    /// Shut down the master connection. Idempotent.
    pub async fn close(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;

        let spec = CommandSpec::new("ssh")
            .args(self.common_options())
            .args(["-O", "exit"])
            .arg(self.destination())
            .timeout(Duration::from_secs(10));
        match self.run(spec).await {
            Ok(_) => debug!(host = %self.host, "Closed SSH channel"),
            Err(e) => warn!(host = %self.host, error = %e, "Failed to close SSH channel"),
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }
}

/// Why a connection probe failed
enum ConnectFailure {
    Command(CommandError),
    Rejected(CommandOutput),
}

impl ConnectFailure {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Command(CommandError::Timeout { .. }) => true,
            Self::Command(_) => false,
            // 255 is ssh failing to connect or authenticate, which is normal while the host
            // is still booting and cloud-init installs the key
            Self::Rejected(output) => output.status == Some(SSH_CONNECTION_FAILURE),
        }
    }
}

impl std::fmt::Display for ConnectFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Command(e) => write!(f, "{e}"),
            Self::Rejected(output) => write!(
                f,
                "ssh exited with {:?}: {}",
                output.status,
                output.stderr.trim()
            ),
        }
    }
}
