//! Provider selector
//!
//! Chooses the provider for a session. Explicit configuration wins outright; `auto` runs
//! the capability probe in a fixed priority order.

use std::sync::Arc;
use tracing::{debug, info};

use scanlift_core::ScanConfig;
use scanlift_core::domain::ProviderKind;

use crate::domain::probe::CapabilityProbe;

/// Provider selector
///
/// In `auto` mode:
/// 1. Remote, when an engine endpoint is configured
/// 2. Local, when the container runtime answers
/// 3. Cloud otherwise
pub struct ProviderSelector {
    probe: Arc<dyn CapabilityProbe>,
}

impl ProviderSelector {
    pub fn new(probe: Arc<dyn CapabilityProbe>) -> Self {
        Self { probe }
    }

    /// Select the provider kind for `config`
    ///
    /// The only side effect is the capability probe itself, and only in `auto` mode.
    pub async fn select(&self, config: &ScanConfig) -> ProviderKind {
        if let Some(kind) = config.mode.explicit() {
            debug!(provider = %kind, "Using explicitly configured provider");
            return kind;
        }

        if self.probe.remote_endpoint_configured(config) {
            info!("Remote engine endpoint configured, using remote provider");
            return ProviderKind::Remote;
        }

        if self.probe.container_runtime_available(config).await {
            info!(runtime = %config.local.runtime, "Container runtime available, using local provider");
            return ProviderKind::Local;
        }

        info!("No remote endpoint or container runtime, using cloud provider");
        ProviderKind::Cloud
    }
}
