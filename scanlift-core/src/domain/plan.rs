//! Automation plan parsing and structural validation
//!
//! Plans are validated before any provider is selected, so an invalid plan never
//! costs a container start or a cloud instance.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use thiserror::Error;

use super::errors::{ScanError, ScanResult};

/// Directory the engine reads plans from and writes reports to by default
pub const ENGINE_WORK_DIR: &str = "/zap/wrk";

/// Structural problems in an automation plan
#[derive(Debug, Error, PartialEq)]
pub enum PlanError {
    #[error("plan is not a valid YAML/JSON document: {0}")]
    Parse(String),

    #[error("plan declares no contexts under env.contexts")]
    NoContexts,

    #[error("context #{index} has no target URLs")]
    ContextWithoutUrls { index: usize },

    #[error("plan declares no jobs")]
    NoJobs,

    #[error("job #{index} does not declare a type")]
    MissingJobKind { index: usize },
}

impl From<PlanError> for ScanError {
    fn from(err: PlanError) -> Self {
        ScanError::PlanValidation(err.to_string())
    }
}

/// A scan context: what to scan and how to authenticate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanContext {
    pub name: String,
    pub urls: Vec<String>,
    pub include_paths: Vec<String>,
    pub exclude_paths: Vec<String>,
    pub authentication: Option<Value>,
}

/// One job in the plan, with its kind-specific parameters kept opaque
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanJob {
    pub kind: String,
    pub name: Option<String>,
    pub parameters: Value,
}

impl PlanJob {
    pub fn is_report(&self) -> bool {
        self.kind == "report"
    }

    fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(Value::as_str)
    }
}

/// A validated automation plan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AutomationPlan {
    pub contexts: Vec<PlanContext>,
    pub jobs: Vec<PlanJob>,
}

#[derive(Deserialize)]
struct RawPlan {
    env: Option<RawEnv>,
    jobs: Option<Vec<RawJob>>,
}

#[derive(Deserialize)]
struct RawEnv {
    contexts: Option<Vec<RawContext>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawContext {
    name: Option<String>,
    url: Option<String>,
    urls: Option<Vec<String>>,
    include_paths: Option<Vec<String>>,
    exclude_paths: Option<Vec<String>>,
    authentication: Option<Value>,
}

#[derive(Deserialize)]
struct RawJob {
    #[serde(rename = "type")]
    kind: Option<String>,
    name: Option<String>,
    parameters: Option<Value>,
}

impl AutomationPlan {
    /// Parse and validate a plan document (YAML or JSON)
    pub fn parse(document: &str) -> Result<Self, PlanError> {
        let raw: RawPlan =
            serde_yaml::from_str(document).map_err(|e| PlanError::Parse(e.to_string()))?;

        let raw_contexts = raw.env.and_then(|env| env.contexts).unwrap_or_default();
        if raw_contexts.is_empty() {
            return Err(PlanError::NoContexts);
        }

        let mut contexts = Vec::with_capacity(raw_contexts.len());
        for (index, raw) in raw_contexts.into_iter().enumerate() {
            let mut urls = raw.urls.unwrap_or_default();
            if let Some(url) = raw.url {
                urls.insert(0, url);
            }
            urls.retain(|u| !u.trim().is_empty());
            if urls.is_empty() {
                return Err(PlanError::ContextWithoutUrls { index });
            }
            contexts.push(PlanContext {
                name: raw.name.unwrap_or_else(|| format!("context-{index}")),
                urls,
                include_paths: raw.include_paths.unwrap_or_default(),
                exclude_paths: raw.exclude_paths.unwrap_or_default(),
                authentication: raw.authentication,
            });
        }

        let raw_jobs = raw.jobs.unwrap_or_default();
        if raw_jobs.is_empty() {
            return Err(PlanError::NoJobs);
        }

        let mut jobs = Vec::with_capacity(raw_jobs.len());
        for (index, raw) in raw_jobs.into_iter().enumerate() {
            let kind = raw
                .kind
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .ok_or(PlanError::MissingJobKind { index })?;
            jobs.push(PlanJob {
                kind,
                name: raw.name,
                parameters: raw.parameters.unwrap_or(Value::Null),
            });
        }

        Ok(Self { contexts, jobs })
    }

    pub fn has_report_job(&self) -> bool {
        self.jobs.iter().any(PlanJob::is_report)
    }

    /// Engine-side paths the plan's report jobs will write
    pub fn report_artifacts(&self) -> Vec<String> {
        self.jobs
            .iter()
            .filter(|job| job.is_report())
            .filter_map(|job| {
                let file = job.parameter("reportFile")?;
                let dir = job.parameter("reportDir").unwrap_or(ENGINE_WORK_DIR);
                Some(format!("{}/{}", dir.trim_end_matches('/'), file))
            })
            .collect()
    }

    pub fn target_urls(&self) -> Vec<&str> {
        self.contexts
            .iter()
            .flat_map(|c| c.urls.iter().map(String::as_str))
            .collect()
    }
}

/// A plan read from disk, with the raw bytes kept for upload
#[derive(Debug, Clone)]
pub struct LoadedPlan {
    pub path: PathBuf,
    pub file_name: String,
    pub contents: Vec<u8>,
    pub plan: AutomationPlan,
}

impl LoadedPlan {
    /// Read and validate a plan file
    pub async fn load(path: &Path) -> ScanResult<Self> {
        let contents = tokio::fs::read(path).await.map_err(|e| {
            ScanError::Config(format!("cannot read plan file {}: {}", path.display(), e))
        })?;

        let document = std::str::from_utf8(&contents).map_err(|e| {
            ScanError::PlanValidation(format!("plan file is not valid UTF-8: {e}"))
        })?;
        let plan = AutomationPlan::parse(document)?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "plan.yaml".to_string());

        Ok(Self {
            path: path.to_path_buf(),
            file_name,
            contents,
            plan,
        })
    }
}
