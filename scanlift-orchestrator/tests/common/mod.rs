#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uuid::Uuid;

use scanlift_core::ScanConfig;
use scanlift_core::domain::{
    AlertCounts, Component, EngineApi, EngineError, ExecutionMode, InstanceInfo, LoadedPlan,
    PlanExecution, PlanHandle, ProgressSnapshot, ProviderKind, ProviderMetadata, ScanError,
    ScanResult, SnapshotStatus,
};
use scanlift_provider::{CapabilityProbe, ProviderFactory, ScanProvider};

pub const VALID_PLAN: &str = r#"
env:
  contexts:
    - name: app
      urls: ["https://app.example.com"]
jobs:
  - type: spider
  - type: activeScan
  - type: report
    parameters:
      template: traditional-json
      reportFile: app.json
"#;

pub const PLAN_WITHOUT_JOBS: &str = r#"
env:
  contexts:
    - name: app
      urls: ["https://app.example.com"]
jobs: []
"#;

pub fn running(lines: usize) -> PlanExecution {
    PlanExecution {
        plan_id: "1".to_string(),
        started: "2026-03-01T09:00:00Z".to_string(),
        finished: String::new(),
        info: (0..lines).map(|i| format!("Job spider step {i}")).collect(),
        warn: Vec::new(),
        error: Vec::new(),
    }
}

pub fn finished(lines: usize, errors: &[&str]) -> PlanExecution {
    PlanExecution {
        finished: "2026-03-01T09:05:00Z".to_string(),
        error: errors.iter().map(|e| e.to_string()).collect(),
        ..running(lines)
    }
}

/// Engine whose plan progress follows a script; the last entry repeats
pub struct ScriptedEngine {
    progress: Mutex<VecDeque<Result<PlanExecution, EngineError>>>,
    last: Mutex<Option<Result<PlanExecution, EngineError>>>,
    pub aux_failing: AtomicBool,
    pub calls: AtomicU32,
    pub progress_calls: AtomicU32,
    /// Snapshot status seen on disk at each progress query
    snapshot_path: Mutex<Option<PathBuf>>,
    pub observed: Mutex<Vec<Option<SnapshotStatus>>>,
}

impl ScriptedEngine {
    pub fn new(script: Vec<Result<PlanExecution, EngineError>>) -> Arc<Self> {
        Arc::new(Self {
            progress: Mutex::new(script.into()),
            last: Mutex::new(None),
            aux_failing: AtomicBool::new(false),
            calls: AtomicU32::new(0),
            progress_calls: AtomicU32::new(0),
            snapshot_path: Mutex::new(None),
            observed: Mutex::new(Vec::new()),
        })
    }

    /// Finishes cleanly on the `polls`-th progress query
    pub fn finishing_after(polls: usize) -> Arc<Self> {
        let mut script: Vec<_> = (1..polls).map(|i| Ok(running(i * 2))).collect();
        script.push(Ok(finished(polls * 2, &[])));
        Self::new(script)
    }

    pub fn never_finishing() -> Arc<Self> {
        Self::new(vec![Ok(running(3))])
    }

    pub fn watch_snapshot(&self, path: &Path) {
        *self.snapshot_path.lock().unwrap() = Some(path.to_path_buf());
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn progress_calls(&self) -> u32 {
        self.progress_calls.load(Ordering::SeqCst)
    }

    fn aux<T>(&self, value: T) -> Result<T, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.aux_failing.load(Ordering::SeqCst) {
            Err(EngineError::Http {
                status: 500,
                message: "internal error".to_string(),
            })
        } else {
            Ok(value)
        }
    }
}

#[async_trait]
impl EngineApi for ScriptedEngine {
    async fn version(&self) -> Result<String, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok("2.16.0".to_string())
    }

    async fn upload_file(&self, file_name: &str, _contents: Vec<u8>) -> Result<String, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("/zap/wrk/{file_name}"))
    }

    async fn run_plan(&self, _engine_path: &str) -> Result<String, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok("1".to_string())
    }

    async fn plan_progress(&self, _plan_id: &str) -> Result<PlanExecution, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.progress_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(path) = self.snapshot_path.lock().unwrap().clone() {
            let status = std::fs::read(&path)
                .ok()
                .and_then(|bytes| serde_json::from_slice::<ProgressSnapshot>(&bytes).ok())
                .map(|s| s.status);
            self.observed.lock().unwrap().push(status);
        }

        let next = self.progress.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        if let Some(next) = next {
            *last = Some(next);
        }
        last.clone()
            .unwrap_or_else(|| Err(EngineError::InvalidResponse("empty script".to_string())))
    }

    async fn alert_summary(&self) -> Result<AlertCounts, EngineError> {
        self.aux(AlertCounts {
            high: 1,
            medium: 2,
            low: 3,
            informational: 4,
        })
    }

    async fn component_status(&self, component: Component) -> Result<u8, EngineError> {
        self.aux(match component {
            Component::Spider => 100,
            Component::ActiveScan => 40,
        })
    }

    async fn json_report(&self) -> Result<Vec<u8>, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(br#"{"site": []}"#.to_vec())
    }
}

/// Where a [`CountingProvider`] should go wrong
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    None,
    Provision,
    Upload,
    PanicOnUpload,
    Download,
    Teardown,
}

#[derive(Default)]
pub struct Counters {
    pub created: AtomicU32,
    pub provisioned: AtomicU32,
    pub torn_down: AtomicU32,
}

impl Counters {
    pub fn created(&self) -> u32 {
        self.created.load(Ordering::SeqCst)
    }

    pub fn provisioned(&self) -> u32 {
        self.provisioned.load(Ordering::SeqCst)
    }

    pub fn torn_down(&self) -> u32 {
        self.torn_down.load(Ordering::SeqCst)
    }
}

pub struct CountingProvider {
    kind: ProviderKind,
    session_id: Uuid,
    fault: Fault,
    engine: Arc<ScriptedEngine>,
    counters: Arc<Counters>,
    provisioned: bool,
}

#[async_trait]
impl ScanProvider for CountingProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn provision(&mut self) -> ScanResult<InstanceInfo> {
        if self.fault == Fault::Provision {
            return Err(ScanError::Provisioning("no capacity anywhere".to_string()));
        }
        self.counters.provisioned.fetch_add(1, Ordering::SeqCst);
        self.provisioned = true;
        Ok(InstanceInfo {
            session_id: self.session_id,
            base_url: "http://engine.test:8080".to_string(),
            api_key: None,
            mode: self.kind,
            metadata: ProviderMetadata::Remote {
                version: "2.16.0".to_string(),
            },
        })
    }

    fn engine(&self) -> ScanResult<Arc<dyn EngineApi>> {
        if !self.provisioned {
            return Err(ScanError::Provisioning("not provisioned".to_string()));
        }
        Ok(self.engine.clone())
    }

    async fn upload_plan(
        &mut self,
        _instance: &InstanceInfo,
        plan: &LoadedPlan,
    ) -> ScanResult<PlanHandle> {
        match self.fault {
            Fault::Upload => Err(ScanError::Provisioning("upload refused".to_string())),
            Fault::PanicOnUpload => panic!("provider bug during upload"),
            _ => {
                let engine_path = self
                    .engine
                    .upload_file(&plan.file_name, plan.contents.clone())
                    .await?;
                let plan_id = self.engine.run_plan(&engine_path).await?;
                Ok(PlanHandle {
                    plan_id,
                    engine_path,
                })
            }
        }
    }

    async fn download_results(
        &mut self,
        _instance: &InstanceInfo,
        _plan: &LoadedPlan,
        output_dir: &Path,
        report_filename: &str,
    ) -> ScanResult<Vec<PathBuf>> {
        if self.fault == Fault::Download {
            return Err(ScanError::Provisioning("report download failed".to_string()));
        }
        let report = self.engine.json_report().await?;
        tokio::fs::create_dir_all(output_dir).await?;
        let path = output_dir.join(report_filename);
        tokio::fs::write(&path, report).await?;
        Ok(vec![path])
    }

    async fn teardown(&mut self) -> ScanResult<()> {
        self.counters.torn_down.fetch_add(1, Ordering::SeqCst);
        if self.fault == Fault::Teardown {
            return Err(ScanError::Provisioning("destroy failed".to_string()));
        }
        Ok(())
    }
}

pub struct CountingFactory {
    pub fault: Fault,
    pub engine: Arc<ScriptedEngine>,
    pub counters: Arc<Counters>,
}

impl CountingFactory {
    pub fn new(fault: Fault, engine: Arc<ScriptedEngine>) -> Arc<Self> {
        Arc::new(Self {
            fault,
            engine,
            counters: Arc::new(Counters::default()),
        })
    }
}

impl ProviderFactory for CountingFactory {
    fn create(
        &self,
        kind: ProviderKind,
        _config: &ScanConfig,
        session_id: Uuid,
    ) -> ScanResult<Box<dyn ScanProvider>> {
        self.counters.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(CountingProvider {
            kind,
            session_id,
            fault: self.fault,
            engine: self.engine.clone(),
            counters: self.counters.clone(),
            provisioned: false,
        }))
    }
}

/// Probe with fixed answers that counts how often it is asked
#[derive(Default)]
pub struct FixedProbe {
    pub remote: bool,
    pub runtime: bool,
    pub calls: AtomicU32,
}

#[async_trait]
impl CapabilityProbe for FixedProbe {
    fn remote_endpoint_configured(&self, _config: &ScanConfig) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.remote
    }

    async fn container_runtime_available(&self, _config: &ScanConfig) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.runtime
    }
}

/// Configuration for one session against `plan` with output under `output_dir`
pub fn session_config(plan: &Path, output_dir: &Path) -> ScanConfig {
    let mut config = ScanConfig::default();
    config.mode = ExecutionMode::Local;
    config.scan.plan_path = Some(plan.to_path_buf());
    config.scan.output_dir = output_dir.to_path_buf();
    config.scan.poll_interval_seconds = 10;
    config.scan.timeout_seconds = 60;
    config
}

pub fn write_plan(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}
