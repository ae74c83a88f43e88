//! Capability probe against the real system

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use scanlift_core::ScanConfig;
use scanlift_core::infrastructure::{CommandRunner, CommandSpec, TokioCommandRunner};

use crate::domain::probe::CapabilityProbe;

const RUNTIME_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Probes `PATH` and the container runtime daemon
pub struct SystemProbe {
    runner: Arc<dyn CommandRunner>,
}

impl SystemProbe {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self::new(Arc::new(TokioCommandRunner::new()))
    }
}

#[async_trait]
impl CapabilityProbe for SystemProbe {
    async fn container_runtime_available(&self, config: &ScanConfig) -> bool {
        let runtime = &config.local.runtime;

        if which::which(runtime).is_err() {
            debug!(%runtime, "Container runtime not found on PATH");
            return false;
        }

        // `info` talks to the daemon, so an installed but stopped runtime reads as unavailable
        let spec = CommandSpec::new(runtime.as_str())
            .args(["info", "--format", "{{.ServerVersion}}"])
            .timeout(RUNTIME_PROBE_TIMEOUT);

        match self.runner.run(&spec).await {
            Ok(output) if output.success() => true,
            Ok(output) => {
                debug!(%runtime, stderr = %output.stderr.trim(), "Container runtime is not answering");
                false
            }
            Err(e) => {
                debug!(%runtime, error = %e, "Container runtime probe failed");
                false
            }
        }
    }
}
