//! Error taxonomy shared by every scanlift crate

use std::fmt;

use thiserror::Error;

use super::engine::EngineError;
use super::instance::ComputeTier;
use crate::infrastructure::process::CommandError;

/// Result type for scan operations
pub type ScanResult<T> = Result<T, ScanError>;

/// Why a scan engine could not be reached
///
/// Each kind maps to different remediation guidance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityKind {
    /// Nothing is listening on the endpoint
    ConnectionRefused,
    /// The endpoint did not answer in time
    Timeout,
    /// The engine answered but rejected the API key
    AuthenticationRejected,
    /// The local container runtime is missing or not running
    RuntimeUnavailable,
    /// The engine is not running and could not be started
    EngineUnavailable,
}

impl ConnectivityKind {
    pub fn remediation(&self) -> &'static str {
        match self {
            Self::ConnectionRefused => {
                "check that the scan engine is running and that the endpoint host and port are correct"
            }
            Self::Timeout => {
                "check network reachability (VPN, firewall, proxy) or raise remote.timeout_seconds"
            }
            Self::AuthenticationRejected => {
                "check the API key (remote.api_key or SCAN_ENGINE_API_KEY) matches the engine's configured key"
            }
            Self::RuntimeUnavailable => {
                "install or start the container runtime, or select the remote or cloud mode"
            }
            Self::EngineUnavailable => {
                "start the engine container or enable local.auto_start"
            }
        }
    }
}

impl fmt::Display for ConnectivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::ConnectionRefused => "connection refused",
            Self::Timeout => "timed out",
            Self::AuthenticationRejected => "authentication rejected",
            Self::RuntimeUnavailable => "container runtime unavailable",
            Self::EngineUnavailable => "engine unavailable",
        };
        f.write_str(text)
    }
}

/// Errors that can end a scan session
#[derive(Debug, Error)]
pub enum ScanError {
    /// Missing or invalid required parameter; nothing was attempted
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed automation plan; nothing was attempted
    #[error("Invalid automation plan: {0}")]
    PlanValidation(String),

    /// Engine unreachable or unauthenticated
    #[error("Cannot reach scan engine at {endpoint}: {kind} ({detail})")]
    Connectivity {
        kind: ConnectivityKind,
        endpoint: String,
        detail: String,
    },

    /// No compute capacity for the requested tier
    #[error("No {tier} capacity available: {detail}")]
    Capacity { tier: ComputeTier, detail: String },

    /// Any other infrastructure failure
    #[error("Provisioning failed: {0}")]
    Provisioning(String),

    /// The engine reported errors while running the plan
    #[error("Scan plan reported errors: {}", errors.join("; "))]
    PlanExecution { errors: Vec<String> },

    /// The polling budget ran out
    #[error("Scan did not finish within {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Scan engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A bug in scanlift itself, such as a panic inside the session pipeline
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ScanError {
    pub fn connectivity(
        kind: ConnectivityKind,
        endpoint: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self::Connectivity {
            kind,
            endpoint: endpoint.into(),
            detail: detail.into(),
        }
    }

    /// Map a failed first contact with an engine to a connectivity error
    pub fn from_engine_connect(endpoint: &str, error: EngineError) -> Self {
        let kind = match error {
            EngineError::ConnectionRefused(_) => ConnectivityKind::ConnectionRefused,
            EngineError::Timeout(_) => ConnectivityKind::Timeout,
            EngineError::Unauthorized { .. } => ConnectivityKind::AuthenticationRejected,
            _ => ConnectivityKind::EngineUnavailable,
        };
        Self::connectivity(kind, endpoint, error.to_string())
    }

    /// Stable snake_case name used in outcomes and logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config_error",
            Self::PlanValidation(_) => "plan_validation_error",
            Self::Connectivity { .. } => "connectivity_error",
            Self::Capacity { .. } => "capacity_error",
            Self::Provisioning(_) => "provisioning_error",
            Self::PlanExecution { .. } => "plan_execution_error",
            Self::Timeout { .. } => "timeout_error",
            Self::Engine(_) => "engine_error",
            Self::Command(_) => "command_error",
            Self::Io(_) => "io_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Message for humans, with a remediation hint where one exists
    pub fn user_message(&self) -> String {
        match self {
            Self::Connectivity { kind, .. } => format!("{self}. Hint: {}", kind.remediation()),
            Self::Capacity { .. } => format!(
                "{self}. Hint: try another region or instance type, or retry later"
            ),
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_connect_mapping() {
        let err = ScanError::from_engine_connect(
            "http://engine:8080",
            EngineError::ConnectionRefused("tcp connect error".into()),
        );
        assert!(matches!(
            err,
            ScanError::Connectivity {
                kind: ConnectivityKind::ConnectionRefused,
                ..
            }
        ));

        let err = ScanError::from_engine_connect(
            "http://engine:8080",
            EngineError::Unauthorized { status: 401 },
        );
        assert!(matches!(
            err,
            ScanError::Connectivity {
                kind: ConnectivityKind::AuthenticationRejected,
                ..
            }
        ));

        let err = ScanError::from_engine_connect(
            "http://engine:8080",
            EngineError::Timeout("deadline elapsed".into()),
        );
        assert!(matches!(
            err,
            ScanError::Connectivity {
                kind: ConnectivityKind::Timeout,
                ..
            }
        ));
    }

    #[test]
    fn test_user_message_carries_remediation() {
        let err = ScanError::connectivity(
            ConnectivityKind::AuthenticationRejected,
            "http://engine:8080",
            "HTTP 401",
        );
        let message = err.user_message();
        assert!(message.contains("authentication rejected"));
        assert!(message.contains("SCAN_ENGINE_API_KEY"));
    }

    #[test]
    fn test_internal_error_kind() {
        let err = ScanError::Internal("pipeline panicked".to_string());
        assert_eq!(err.kind(), "internal_error");
        assert_eq!(err.user_message(), "Internal error: pipeline panicked");
    }

    #[test]
    fn test_plan_execution_message_lists_errors() {
        let err = ScanError::PlanExecution {
            errors: vec!["Job spider failed".into(), "Context invalid".into()],
        };
        assert_eq!(
            err.to_string(),
            "Scan plan reported errors: Job spider failed; Context invalid"
        );
        assert_eq!(err.kind(), "plan_execution_error");
    }
}
