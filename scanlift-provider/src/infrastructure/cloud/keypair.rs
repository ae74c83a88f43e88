//! Per-session SSH keypair

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, warn};
use uuid::Uuid;

use scanlift_core::domain::{ScanError, ScanResult};
use scanlift_core::infrastructure::{CommandRunner, CommandSpec};

const KEYGEN_TIMEOUT: Duration = Duration::from_secs(30);

/// An ed25519 keypair generated for one session and deleted at teardown
#[derive(Debug)]
pub struct EphemeralKeypair {
    private_key: PathBuf,
    public_key: String,
}

impl EphemeralKeypair {
    /// Generate a keypair in `dir` with `ssh-keygen`
    pub async fn generate(
        runner: &dyn CommandRunner,
        dir: &Path,
        session_id: Uuid,
    ) -> ScanResult<Self> {
        let private_key = dir.join("id_ed25519");

        let spec = CommandSpec::new("ssh-keygen")
            .args(["-q", "-t", "ed25519", "-N", ""])
            .arg("-f")
            .arg(private_key.display().to_string())
            .arg("-C")
            .arg(format!("scanlift-{session_id}"))
            .timeout(KEYGEN_TIMEOUT);

        let output = runner.run(&spec).await?;
        if !output.success() {
            return Err(ScanError::Provisioning(format!(
                "ssh-keygen failed: {}",
                output.combined().trim()
            )));
        }

        restrict_permissions(&private_key).await?;

        let public_key = tokio::fs::read_to_string(public_key_path(&private_key))
            .await?
            .trim()
            .to_string();
        if public_key.is_empty() {
            return Err(ScanError::Provisioning(
                "ssh-keygen produced an empty public key".to_string(),
            ));
        }

        debug!(path = %private_key.display(), "Generated session keypair");
        Ok(Self {
            private_key,
            public_key,
        })
    }

    pub fn private_key(&self) -> &Path {
        &self.private_key
    }

    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    /// Remove both key files; missing files are fine
    pub async fn delete(&self) {
        for path in [self.private_key.clone(), public_key_path(&self.private_key)] {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => debug!(path = %path.display(), "Deleted key file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to delete key file"),
            }
        }
    }
}

fn public_key_path(private_key: &Path) -> PathBuf {
    let mut path = private_key.as_os_str().to_owned();
    path.push(".pub");
    PathBuf::from(path)
}

#[cfg(unix)]
async fn restrict_permissions(path: &Path) -> ScanResult<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path) -> ScanResult<()> {
    Ok(())
}
