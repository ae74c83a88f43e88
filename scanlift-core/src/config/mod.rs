//! Configuration management

pub mod validation;

pub use validation::{Validate, ValidationError};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::instance::{CloudVendor, ComputeTier, ExecutionMode};
use crate::infrastructure::resilience::RetryConfig;

/// Environment variable consulted when `remote.endpoint` is not configured
pub const REMOTE_ENDPOINT_ENV: &str = "SCAN_ENGINE_URL";

/// Environment variable consulted when `remote.api_key` is not configured
pub const REMOTE_API_KEY_ENV: &str = "SCAN_ENGINE_API_KEY";

/// Default engine image used by the local and cloud backends
pub const DEFAULT_ENGINE_IMAGE: &str = "ghcr.io/zaproxy/zaproxy:stable";

/// Retry configuration (serializable version)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfigSerializable {
    /// Maximum number of attempts
    pub max_attempts: u32,
    /// Initial delay between attempts (in milliseconds)
    pub initial_delay_ms: u64,
    /// Maximum delay between attempts (in milliseconds)
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryConfigSerializable {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            initial_delay_ms: 1000,
            max_delay_ms: 10_000,
            backoff_multiplier: 1.5,
        }
    }
}

impl RetryConfigSerializable {
    /// Convert to the runtime RetryConfig
    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            backoff_multiplier: self.backoff_multiplier,
        }
    }
}

/// Complete scan configuration
///
/// Built once per invocation by [`ScanConfig::load`] and never mutated afterwards.
/// Every component receives it (or one of its sections) explicitly.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ScanConfig {
    pub mode: ExecutionMode,
    pub local: LocalSettings,
    pub remote: RemoteSettings,
    pub cloud: CloudSettings,
    pub scan: ScanSettings,
    pub logging: LoggingConfig,
    pub runner: RunnerSettings,
}

/// Settings for the local container backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalSettings {
    /// Container runtime binary (docker or a compatible CLI such as podman)
    pub runtime: String,
    pub image: String,
    pub container_name: String,
    /// Host port the engine API is bound to
    pub port: u16,
    /// Start a container when none with `container_name` is running
    pub auto_start: bool,
    /// Stop and remove the container on teardown instead of leaving it warm
    pub cleanup: bool,
    pub api_key: Option<String>,
}

impl Default for LocalSettings {
    fn default() -> Self {
        Self {
            runtime: "docker".to_string(),
            image: DEFAULT_ENGINE_IMAGE.to_string(),
            container_name: "scanlift-engine".to_string(),
            port: 8090,
            auto_start: true,
            cleanup: false,
            api_key: None,
        }
    }
}

/// Settings for an already running engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteSettings {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub timeout_seconds: u64,
    pub verify_tls: bool,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            timeout_seconds: 30,
            verify_tls: true,
        }
    }
}

impl RemoteSettings {
    /// Endpoint from configuration, falling back to `SCAN_ENGINE_URL`
    pub fn resolve_endpoint(&self) -> Option<String> {
        non_empty(self.endpoint.clone()).or_else(|| non_empty(std::env::var(REMOTE_ENDPOINT_ENV).ok()))
    }

    /// API key from configuration, falling back to `SCAN_ENGINE_API_KEY`
    pub fn resolve_api_key(&self) -> Option<String> {
        non_empty(self.api_key.clone()).or_else(|| non_empty(std::env::var(REMOTE_API_KEY_ENV).ok()))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Settings for ephemeral cloud infrastructure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudSettings {
    pub vendor: CloudVendor,
    pub region: String,
    /// Preferred compute tier. `spot` falls back to `on-demand` on capacity errors.
    pub compute_tier: ComputeTier,
    pub instance_type: String,
    /// Directory holding one infrastructure module per vendor (`<templates_dir>/<vendor>`)
    pub templates_dir: PathBuf,
    /// Infrastructure tool binary
    pub tool_binary: String,
    pub ssh_user: String,
    pub engine_image: String,
    pub engine_port: u16,
    /// Engine API key; a random one is generated per session when unset
    pub api_key: Option<String>,
    /// Root for per-session working directories (system temp dir when unset)
    pub workspace_root: Option<PathBuf>,
    /// Retries while waiting for the provisioned host to accept SSH
    pub ssh_connect: RetryConfigSerializable,
}

impl Default for CloudSettings {
    fn default() -> Self {
        Self {
            vendor: CloudVendor::Aws,
            region: "us-east-1".to_string(),
            compute_tier: ComputeTier::LowCost,
            instance_type: "t3.large".to_string(),
            templates_dir: PathBuf::from("infra"),
            tool_binary: "terraform".to_string(),
            ssh_user: "ubuntu".to_string(),
            engine_image: DEFAULT_ENGINE_IMAGE.to_string(),
            engine_port: 8080,
            api_key: None,
            workspace_root: None,
            ssh_connect: RetryConfigSerializable {
                max_attempts: 12,
                initial_delay_ms: 2000,
                max_delay_ms: 15_000,
                backoff_multiplier: 2.0,
            },
        }
    }
}

impl CloudSettings {
    /// Infrastructure module directory for the configured vendor
    pub fn module_dir(&self) -> PathBuf {
        self.templates_dir.join(self.vendor.as_str())
    }
}

/// Settings shared by every backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    pub plan_path: Option<PathBuf>,
    pub poll_interval_seconds: u64,
    pub timeout_seconds: u64,
    pub report_filename: String,
    pub output_dir: PathBuf,
    /// Retries while waiting for a freshly started engine to answer
    pub health_check: RetryConfigSerializable,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            plan_path: None,
            poll_interval_seconds: 10,
            timeout_seconds: 3600,
            report_filename: "scan-report.json".to_string(),
            output_dir: PathBuf::from("scanlift-output"),
            health_check: RetryConfigSerializable::default(),
        }
    }
}

impl ScanSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// One of `compact`, `pretty` or `json`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

/// Worker pool configuration for running several sessions at once
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerSettings {
    pub workers: usize,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self { workers: 2 }
    }
}

/// Explicit overrides applied on top of every other configuration layer
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub mode: Option<ExecutionMode>,
    pub plan_path: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub timeout_seconds: Option<u64>,
    pub poll_interval_seconds: Option<u64>,
    pub workers: Option<usize>,
}

impl ConfigOverrides {
    fn apply(&self, config: &mut ScanConfig) {
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(ref plan_path) = self.plan_path {
            config.scan.plan_path = Some(plan_path.clone());
        }
        if let Some(ref output_dir) = self.output_dir {
            config.scan.output_dir = output_dir.clone();
        }
        if let Some(timeout) = self.timeout_seconds {
            config.scan.timeout_seconds = timeout;
        }
        if let Some(poll) = self.poll_interval_seconds {
            config.scan.poll_interval_seconds = poll;
        }
        if let Some(workers) = self.workers {
            config.runner.workers = workers;
        }
    }
}

impl ScanConfig {
    /// Load configuration from defaults, an optional file, environment variables and overrides
    ///
    /// Without an explicit path, `scanlift.{toml,yaml,json}` in the working directory is
    /// picked up when present.
    pub fn load(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self, ConfigLoadError> {
        let mut builder = config::Config::builder();

        builder = match path {
            Some(path) => builder.add_source(config::File::from(path).required(true)),
            None => builder.add_source(config::File::with_name("scanlift").required(false)),
        };

        builder = builder.add_source(
            config::Environment::with_prefix("SCANLIFT")
                .separator("__")
                .try_parsing(true),
        );

        let mut config: ScanConfig = builder.build()?.try_deserialize()?;

        overrides.apply(&mut config);

        config.validate()?;

        Ok(config)
    }

    /// Copy of this configuration pointing at a different plan and output directory
    ///
    /// Used when one invocation fans out into several sessions.
    pub fn for_plan(&self, plan_path: PathBuf, output_dir: PathBuf) -> Self {
        let mut config = self.clone();
        config.scan.plan_path = Some(plan_path);
        config.scan.output_dir = output_dir;
        config
    }
}

/// Error type for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("Configuration file error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Configuration validation error: {0}")]
    Validation(#[from] ValidationError),
}
