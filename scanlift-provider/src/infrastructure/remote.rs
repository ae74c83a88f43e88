//! Remote provider: an engine that is already running somewhere reachable

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use scanlift_core::config::{REMOTE_ENDPOINT_ENV, RemoteSettings};
use scanlift_core::domain::{
    EngineApi, EngineConnector, EngineEndpoint, InstanceInfo, LoadedPlan, PlanHandle,
    ProviderKind, ProviderMetadata, ScanError, ScanResult,
};

use crate::application::artifacts::write_json_report;
use crate::domain::traits::{ScanProvider, not_provisioned};

pub struct RemoteProvider {
    settings: RemoteSettings,
    connector: Arc<dyn EngineConnector>,
    session_id: Uuid,
    engine: Option<Arc<dyn EngineApi>>,
}

impl RemoteProvider {
    pub fn new(
        settings: RemoteSettings,
        connector: Arc<dyn EngineConnector>,
        session_id: Uuid,
    ) -> Self {
        Self {
            settings,
            connector,
            session_id,
            engine: None,
        }
    }
}

#[async_trait]
impl ScanProvider for RemoteProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Remote
    }

    /// Connect and issue a single version query; no retries, no side effects
    #[instrument(skip(self), fields(session_id = %self.session_id))]
    async fn provision(&mut self) -> ScanResult<InstanceInfo> {
        let base_url = self.settings.resolve_endpoint().ok_or_else(|| {
            ScanError::Config(format!(
                "remote mode needs remote.endpoint or the {REMOTE_ENDPOINT_ENV} environment variable"
            ))
        })?;
        let api_key = self.settings.resolve_api_key();

        let endpoint = EngineEndpoint::new(base_url.clone(), api_key.clone())
            .with_timeout(self.settings.timeout())
            .with_verify_tls(self.settings.verify_tls);
        let engine = self
            .connector
            .connect(&endpoint)
            .map_err(|e| ScanError::from_engine_connect(&base_url, e))?;

        let version = engine
            .version()
            .await
            .map_err(|e| ScanError::from_engine_connect(&base_url, e))?;
        info!(%base_url, %version, "Connected to remote scan engine");

        self.engine = Some(engine);

        Ok(InstanceInfo {
            session_id: self.session_id,
            base_url,
            api_key,
            mode: ProviderKind::Remote,
            metadata: ProviderMetadata::Remote { version },
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

        let engine_path = engine
            .upload_file(&plan.file_name, plan.contents.clone())
            .await?;
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
        let report = write_json_report(engine.as_ref(), output_dir, report_filename).await?;

        for artifact in plan.plan.report_artifacts() {
            debug!(%artifact, "Report artifact stays on the remote engine host");
        }

        Ok(vec![report])
    }

    async fn teardown(&mut self) -> ScanResult<()> {
        self.engine = None;
        Ok(())
    }
}
