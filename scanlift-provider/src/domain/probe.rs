//! Capability probe used by automatic mode selection

use async_trait::async_trait;

use scanlift_core::ScanConfig;

/// Cheap, side-effect-free checks about the environment
#[async_trait]
pub trait CapabilityProbe: Send + Sync {
    /// Whether a remote engine endpoint is set in configuration or environment
    fn remote_endpoint_configured(&self, config: &ScanConfig) -> bool {
        config.remote.resolve_endpoint().is_some()
    }

    /// Whether the configured container runtime is installed and answering
    async fn container_runtime_available(&self, config: &ScanConfig) -> bool;
}
