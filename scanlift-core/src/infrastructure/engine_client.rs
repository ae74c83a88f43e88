//! HTTP client for the scan engine's REST API

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::engine::{Component, EngineApi, EngineConnector, EngineEndpoint, EngineError};
use crate::domain::execution::PlanExecution;
use crate::domain::snapshot::AlertCounts;

/// Header carrying the engine API key
pub const API_KEY_HEADER: &str = "X-ZAP-API-Key";

/// [`EngineApi`] over the engine's JSON REST routes
pub struct HttpEngineClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpEngineClient {
    pub fn new(endpoint: &EngineEndpoint) -> Result<Self, EngineError> {
        let client = Client::builder()
            .timeout(endpoint.timeout)
            .danger_accept_invalid_certs(!endpoint.verify_tls)
            .build()
            .map_err(|e| EngineError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: endpoint.base_url.trim_end_matches('/').to_string(),
            api_key: endpoint.api_key.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, route: &str) -> String {
        format!("{}{}", self.base_url, route)
    }

    fn get(&self, route: &str) -> RequestBuilder {
        self.authorize(self.client.get(self.url(route)))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.api_key {
            Some(ref key) => request.header(API_KEY_HEADER, key),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, EngineError> {
        let response = request.send().await.map_err(map_transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::UNAUTHORIZED
            || status == StatusCode::FORBIDDEN
            || body.contains("bad_api_key")
        {
            return Err(EngineError::Unauthorized {
                status: status.as_u16(),
            });
        }

        Err(EngineError::Http {
            status: status.as_u16(),
            message: engine_message(&body),
        })
    }

    async fn get_json(&self, request: RequestBuilder) -> Result<Value, EngineError> {
        let response = self.send(request).await?;
        response
            .json::<Value>()
            .await
            .map_err(|e| EngineError::InvalidResponse(e.to_string()))
    }
}

fn map_transport_error(error: reqwest::Error) -> EngineError {
    if error.is_timeout() {
        EngineError::Timeout(error.to_string())
    } else if error.is_connect() {
        EngineError::ConnectionRefused(error.to_string())
    } else {
        EngineError::Transport(error.to_string())
    }
}

/// The engine wraps errors as `{"code": ..., "message": ...}`
fn engine_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.chars().take(200).collect())
}

fn field_string(value: &Value, key: &str) -> Result<String, EngineError> {
    match value.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(EngineError::InvalidResponse(format!(
            "missing '{key}' in engine response"
        ))),
    }
}

fn optional_string(value: &Value, key: &str) -> String {
    field_string(value, key).unwrap_or_default()
}

fn string_list(value: &Value, key: &str) -> Vec<String> {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn count(value: &Value, key: &str) -> u64 {
    match value.get(key) {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

#[async_trait]
impl EngineApi for HttpEngineClient {
    async fn version(&self) -> Result<String, EngineError> {
        let body = self.get_json(self.get("/JSON/core/view/version/")).await?;
        field_string(&body, "version")
    }

    async fn upload_file(&self, file_name: &str, contents: Vec<u8>) -> Result<String, EngineError> {
        let part = reqwest::multipart::Part::bytes(contents).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new()
            .part("fileContents", part)
            .text("fileName", file_name.to_string());

        let request = self.authorize(
            self.client
                .post(self.url("/OTHER/core/other/fileUpload/"))
                .multipart(form),
        );
        let body = self.get_json(request).await?;
        let path = field_string(&body, "Uploaded")?;
        debug!(file_name, engine_path = %path, "Uploaded file to engine");
        Ok(path)
    }

    async fn run_plan(&self, engine_path: &str) -> Result<String, EngineError> {
        let request = self
            .get("/JSON/automation/action/runPlan/")
            .query(&[("filePath", engine_path)]);
        let body = self.get_json(request).await?;
        field_string(&body, "planId")
    }

    async fn plan_progress(&self, plan_id: &str) -> Result<PlanExecution, EngineError> {
        let request = self
            .get("/JSON/automation/view/planProgress/")
            .query(&[("planId", plan_id)]);
        let body = self.get_json(request).await?;

        Ok(PlanExecution {
            plan_id: field_string(&body, "planId").unwrap_or_else(|_| plan_id.to_string()),
            started: optional_string(&body, "started"),
            finished: optional_string(&body, "finished"),
            info: string_list(&body, "info"),
            warn: string_list(&body, "warn"),
            error: string_list(&body, "error"),
        })
    }

    async fn alert_summary(&self) -> Result<AlertCounts, EngineError> {
        let body = self.get_json(self.get("/JSON/alert/view/alertsSummary/")).await?;
        let summary = body.get("alertsSummary").ok_or_else(|| {
            EngineError::InvalidResponse("missing 'alertsSummary' in engine response".into())
        })?;

        Ok(AlertCounts {
            high: count(summary, "High"),
            medium: count(summary, "Medium"),
            low: count(summary, "Low"),
            informational: count(summary, "Informational"),
        })
    }

    async fn component_status(&self, component: Component) -> Result<u8, EngineError> {
        let route = match component {
            Component::Spider => "/JSON/spider/view/status/",
            Component::ActiveScan => "/JSON/ascan/view/status/",
        };
        let body = self.get_json(self.get(route)).await?;
        let raw = field_string(&body, "status")?;
        let percent: u32 = raw.trim().parse().map_err(|_| {
            EngineError::InvalidResponse(format!("{component} status '{raw}' is not a percentage"))
        })?;
        if percent > 100 {
            warn!(%component, percent, "Engine reported more than 100 percent");
        }
        Ok(percent.min(100) as u8)
    }

    async fn json_report(&self) -> Result<Vec<u8>, EngineError> {
        let response = self.send(self.get("/OTHER/core/other/jsonreport/")).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| EngineError::InvalidResponse(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// [`EngineConnector`] producing [`HttpEngineClient`]s
#[derive(Debug, Default, Clone)]
pub struct HttpEngineConnector;

impl EngineConnector for HttpEngineConnector {
    fn connect(&self, endpoint: &EngineEndpoint) -> Result<Arc<dyn EngineApi>, EngineError> {
        Ok(Arc::new(HttpEngineClient::new(endpoint)?))
    }
}
