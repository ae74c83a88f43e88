//! Provider construction

use std::sync::Arc;

use uuid::Uuid;

use scanlift_core::ScanConfig;
use scanlift_core::domain::{EngineConnector, ProviderKind, ScanResult};
use scanlift_core::infrastructure::{CommandRunner, HttpEngineConnector, TokioCommandRunner};

use crate::domain::traits::ScanProvider;
use crate::infrastructure::cloud::CloudProvider;
use crate::infrastructure::local::LocalProvider;
use crate::infrastructure::remote::RemoteProvider;

/// Builds a fresh provider for one session
pub trait ProviderFactory: Send + Sync {
    fn create(
        &self,
        kind: ProviderKind,
        config: &ScanConfig,
        session_id: Uuid,
    ) -> ScanResult<Box<dyn ScanProvider>>;
}

/// Factory for the real local, remote and cloud providers
#[derive(Clone)]
pub struct DefaultProviderFactory {
    runner: Arc<dyn CommandRunner>,
    connector: Arc<dyn EngineConnector>,
}

impl DefaultProviderFactory {
    pub fn new() -> Self {
        Self::with_parts(Arc::new(TokioCommandRunner::new()), Arc::new(HttpEngineConnector))
    }

    pub fn with_parts(runner: Arc<dyn CommandRunner>, connector: Arc<dyn EngineConnector>) -> Self {
        Self { runner, connector }
    }
}

impl Default for DefaultProviderFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderFactory for DefaultProviderFactory {
    fn create(
        &self,
        kind: ProviderKind,
        config: &ScanConfig,
        session_id: Uuid,
    ) -> ScanResult<Box<dyn ScanProvider>> {
        let health = config.scan.health_check.to_retry_config();

        let provider: Box<dyn ScanProvider> = match kind {
            ProviderKind::Local => Box::new(LocalProvider::new(
                config.local.clone(),
                health,
                self.runner.clone(),
                self.connector.clone(),
                session_id,
            )),
            ProviderKind::Remote => Box::new(RemoteProvider::new(
                config.remote.clone(),
                self.connector.clone(),
                session_id,
            )),
            ProviderKind::Cloud => Box::new(CloudProvider::new(
                config.cloud.clone(),
                health,
                self.runner.clone(),
                self.connector.clone(),
                session_id,
            )),
        };

        Ok(provider)
    }
}
