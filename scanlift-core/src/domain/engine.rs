//! Scan-engine API abstraction
//!
//! Providers differ in how they reach an engine, never in what they ask it. Every call
//! the subsystem makes against the engine goes through [`EngineApi`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use super::errors::ScanResult;
use super::execution::{PlanExecution, PlanOutcome};
use super::snapshot::AlertCounts;

/// Errors returned by engine API calls
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("connection refused: {0}")]
    ConnectionRefused(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("engine rejected the API key (HTTP {status})")]
    Unauthorized { status: u16 },

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("invalid engine response: {0}")]
    InvalidResponse(String),

    #[error("transport error: {0}")]
    Transport(String),
}

impl EngineError {
    /// Whether waiting and asking again could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ConnectionRefused(_) | Self::Timeout(_) | Self::Transport(_) => true,
            Self::Http { status, .. } => *status >= 500 || *status == 429,
            Self::Unauthorized { .. } | Self::InvalidResponse(_) => false,
        }
    }
}

/// Long-running engine components that report a percent-complete figure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Spider,
    ActiveScan,
}

impl Component {
    pub const ALL: [Component; 2] = [Component::Spider, Component::ActiveScan];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spider => "spider",
            Self::ActiveScan => "active_scan",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operations the subsystem needs from a scan engine
#[async_trait]
pub trait EngineApi: Send + Sync {
    /// Engine version; doubles as the health check
    async fn version(&self) -> Result<String, EngineError>;

    /// Upload a file into the engine's working area, returning the engine-side path
    async fn upload_file(&self, file_name: &str, contents: Vec<u8>) -> Result<String, EngineError>;

    /// Start an automation plan already present on the engine host
    async fn run_plan(&self, engine_path: &str) -> Result<String, EngineError>;

    async fn plan_progress(&self, plan_id: &str) -> Result<PlanExecution, EngineError>;

    async fn alert_summary(&self) -> Result<AlertCounts, EngineError>;

    /// Percent complete (0-100) of a component
    async fn component_status(&self, component: Component) -> Result<u8, EngineError>;

    /// Full findings document in JSON
    async fn json_report(&self) -> Result<Vec<u8>, EngineError>;
}

/// Where and how to reach an engine
#[derive(Debug, Clone)]
pub struct EngineEndpoint {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub verify_tls: bool,
}

impl EngineEndpoint {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key,
            timeout: Duration::from_secs(30),
            verify_tls: true,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_verify_tls(mut self, verify_tls: bool) -> Self {
        self.verify_tls = verify_tls;
        self
    }
}

/// Builds engine clients; swapped for in-memory engines in tests
pub trait EngineConnector: Send + Sync {
    fn connect(&self, endpoint: &EngineEndpoint) -> Result<Arc<dyn EngineApi>, EngineError>;
}

/// Watches a started plan until it finishes, fails or runs out of time
#[async_trait]
pub trait PlanWatcher: Send + Sync {
    async fn watch(&self, engine: Arc<dyn EngineApi>, plan_id: &str) -> ScanResult<PlanOutcome>;
}
