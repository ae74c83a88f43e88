#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use scanlift_core::config::{CloudSettings, RetryConfigSerializable};
use scanlift_core::domain::{
    AlertCounts, Component, EngineApi, EngineConnector, EngineEndpoint, EngineError,
    PlanExecution,
};
use scanlift_core::infrastructure::{
    CommandError, CommandOutput, CommandRunner, CommandSpec, RetryConfig,
};

pub const TEST_HOST: &str = "203.0.113.10";

pub fn ok(stdout: &str) -> CommandOutput {
    CommandOutput {
        status: Some(0),
        stdout: stdout.to_string(),
        stderr: String::new(),
    }
}

pub fn failed(stderr: &str) -> CommandOutput {
    CommandOutput {
        status: Some(1),
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}

pub fn fast_retry(max_attempts: u32) -> RetryConfig {
    RetryConfig {
        max_attempts,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(2),
        backoff_multiplier: 1.0,
    }
}

/// Cloud settings pointing at a module directory with a single `main.tf`
pub fn cloud_settings(templates: &Path, workspace_root: &Path) -> CloudSettings {
    let module = templates.join("aws");
    std::fs::create_dir_all(&module).unwrap();
    std::fs::write(module.join("main.tf"), "# module").unwrap();
    std::fs::write(module.join("README.md"), "not copied").unwrap();

    CloudSettings {
        templates_dir: templates.to_path_buf(),
        workspace_root: Some(workspace_root.to_path_buf()),
        api_key: Some("cloud-key".to_string()),
        ssh_connect: RetryConfigSerializable {
            max_attempts: 2,
            initial_delay_ms: 1,
            max_delay_ms: 2,
            backoff_multiplier: 1.0,
        },
        ..CloudSettings::default()
    }
}

/// Command runner that answers from a script and records every command
#[derive(Default)]
pub struct ScriptedRunner {
    calls: Mutex<Vec<CommandSpec>>,
    applies: Mutex<VecDeque<CommandOutput>>,
    destroy: Mutex<Option<CommandOutput>>,
    runtime: Mutex<Vec<(String, CommandOutput)>>,
    missing: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue the result of the next `apply`; unscripted applies succeed
    pub fn push_apply(&self, output: CommandOutput) {
        self.applies.lock().unwrap().push_back(output);
    }

    pub fn fail_destroy(&self, stderr: &str) {
        *self.destroy.lock().unwrap() = Some(failed(stderr));
    }

    /// Answer container runtime commands whose first argument is `verb`
    pub fn on_runtime(&self, verb: &str, output: CommandOutput) {
        self.runtime
            .lock()
            .unwrap()
            .push((verb.to_string(), output));
    }

    /// Make `program` look uninstalled
    pub fn missing(&self, program: &str) {
        self.missing.lock().unwrap().push(program.to_string());
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    pub fn programs(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.program).collect()
    }

    /// Verbs of infrastructure tool calls, in order
    pub fn tool_verbs(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.program == "terraform")
            .filter_map(|c| c.args.get(1).cloned())
            .collect()
    }

    pub fn runtime_verbs(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.program == "docker")
            .filter_map(|c| c.args.first().cloned())
            .collect()
    }

    fn keygen(&self, spec: &CommandSpec) -> CommandOutput {
        let Some(index) = spec.args.iter().position(|a| a == "-f") else {
            return failed("missing -f");
        };
        let path = Path::new(&spec.args[index + 1]);
        std::fs::write(path, "PRIVATE KEY").unwrap();
        std::fs::write(
            format!("{}.pub", path.display()),
            "ssh-ed25519 AAAATESTKEY scanlift\n",
        )
        .unwrap();
        ok("")
    }

    fn tool(&self, spec: &CommandSpec) -> CommandOutput {
        match spec.args.get(1).map(String::as_str) {
            Some("apply") => self
                .applies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| ok("Apply complete!")),
            Some("output") => ok(&format!(
                r#"{{"public_ip": {{"sensitive": false, "type": "string", "value": "{TEST_HOST}"}}}}"#
            )),
            Some("destroy") => self
                .destroy
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| ok("Destroy complete!")),
            _ => ok(""),
        }
    }

    fn container_runtime(&self, spec: &CommandSpec) -> CommandOutput {
        let verb = spec.args.first().cloned().unwrap_or_default();
        self.runtime
            .lock()
            .unwrap()
            .iter()
            .find(|(v, _)| *v == verb)
            .map(|(_, output)| output.clone())
            .unwrap_or_else(|| ok(""))
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        self.calls.lock().unwrap().push(spec.clone());

        if self.missing.lock().unwrap().contains(&spec.program) {
            return Err(CommandError::NotFound {
                program: spec.program.clone(),
            });
        }

        let output = match spec.program.as_str() {
            "ssh-keygen" => self.keygen(spec),
            "terraform" => self.tool(spec),
            "docker" => self.container_runtime(spec),
            _ => ok(""),
        };
        Ok(output)
    }
}

/// In-memory engine
pub struct FakeEngine {
    version: Mutex<Result<String, EngineError>>,
    pub version_calls: AtomicU32,
    pub uploads: Mutex<Vec<String>>,
    pub started_plans: Mutex<Vec<String>>,
}

impl FakeEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            version: Mutex::new(Ok("2.16.0".to_string())),
            version_calls: AtomicU32::new(0),
            uploads: Mutex::new(Vec::new()),
            started_plans: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(error: EngineError) -> Arc<Self> {
        let engine = Self::new();
        *engine.version.lock().unwrap() = Err(error);
        engine
    }

    pub fn version_calls(&self) -> u32 {
        self.version_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EngineApi for FakeEngine {
    async fn version(&self) -> Result<String, EngineError> {
        self.version_calls.fetch_add(1, Ordering::SeqCst);
        self.version.lock().unwrap().clone()
    }

    async fn upload_file(&self, file_name: &str, _contents: Vec<u8>) -> Result<String, EngineError> {
        self.uploads.lock().unwrap().push(file_name.to_string());
        Ok(format!("/zap/wrk/{file_name}"))
    }

    async fn run_plan(&self, engine_path: &str) -> Result<String, EngineError> {
        self.started_plans
            .lock()
            .unwrap()
            .push(engine_path.to_string());
        Ok("7".to_string())
    }

    async fn plan_progress(&self, plan_id: &str) -> Result<PlanExecution, EngineError> {
        Ok(PlanExecution {
            plan_id: plan_id.to_string(),
            started: "2026-01-01T10:00:00Z".to_string(),
            finished: "2026-01-01T10:05:00Z".to_string(),
            ..Default::default()
        })
    }

    async fn alert_summary(&self) -> Result<AlertCounts, EngineError> {
        Ok(AlertCounts::default())
    }

    async fn component_status(&self, _component: Component) -> Result<u8, EngineError> {
        Ok(100)
    }

    async fn json_report(&self) -> Result<Vec<u8>, EngineError> {
        Ok(br#"{"site": []}"#.to_vec())
    }
}

/// Connector that hands out one shared [`FakeEngine`] and records endpoints
pub struct FakeConnector {
    pub engine: Arc<FakeEngine>,
    pub endpoints: Mutex<Vec<EngineEndpoint>>,
}

impl FakeConnector {
    pub fn new(engine: Arc<FakeEngine>) -> Arc<Self> {
        Arc::new(Self {
            engine,
            endpoints: Mutex::new(Vec::new()),
        })
    }

    pub fn endpoints(&self) -> Vec<EngineEndpoint> {
        self.endpoints.lock().unwrap().clone()
    }
}

impl EngineConnector for FakeConnector {
    fn connect(&self, endpoint: &EngineEndpoint) -> Result<Arc<dyn EngineApi>, EngineError> {
        self.endpoints.lock().unwrap().push(endpoint.clone());
        Ok(self.engine.clone())
    }
}

pub const PLAN: &str = r#"
env:
  contexts:
    - name: shop
      urls: ["https://shop.example.com"]
jobs:
  - type: spider
  - type: report
    parameters:
      template: traditional-html
      reportFile: shop.html
"#;

pub async fn load_plan(dir: &Path) -> scanlift_core::domain::LoadedPlan {
    let path = dir.join("shop-plan.yaml");
    std::fs::write(&path, PLAN).unwrap();
    scanlift_core::domain::LoadedPlan::load(&path).await.unwrap()
}
