//! Configuration validation module

use crate::config::{
    CloudSettings, LocalSettings, LoggingConfig, RemoteSettings, RetryConfigSerializable,
    RunnerSettings, ScanConfig, ScanSettings,
};

/// Trait for validating configuration sections
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Scan configuration error: {message}")]
    Scan { message: String },

    #[error("Local backend configuration error: {message}")]
    Local { message: String },

    #[error("Remote backend configuration error: {message}")]
    Remote { message: String },

    #[error("Cloud backend configuration error: {message}")]
    Cloud { message: String },

    #[error("Runner configuration error: {message}")]
    Runner { message: String },

    #[error("Logging configuration error: {message}")]
    Logging { message: String },
}

impl ValidationError {
    pub fn scan(message: impl Into<String>) -> Self {
        Self::Scan {
            message: message.into(),
        }
    }

    pub fn local(message: impl Into<String>) -> Self {
        Self::Local {
            message: message.into(),
        }
    }

    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
        }
    }

    pub fn cloud(message: impl Into<String>) -> Self {
        Self::Cloud {
            message: message.into(),
        }
    }

    pub fn runner(message: impl Into<String>) -> Self {
        Self::Runner {
            message: message.into(),
        }
    }

    pub fn logging(message: impl Into<String>) -> Self {
        Self::Logging {
            message: message.into(),
        }
    }
}

fn validate_retry(
    name: &str,
    retry: &RetryConfigSerializable,
    make: fn(String) -> ValidationError,
) -> Result<(), ValidationError> {
    if retry.max_attempts == 0 {
        return Err(make(format!("{name}.max_attempts must be at least 1")));
    }
    if retry.backoff_multiplier < 1.0 {
        return Err(make(format!(
            "{name}.backoff_multiplier must be >= 1.0, got {}",
            retry.backoff_multiplier
        )));
    }
    if retry.initial_delay_ms > retry.max_delay_ms {
        return Err(make(format!(
            "{name}.initial_delay_ms ({}) exceeds max_delay_ms ({})",
            retry.initial_delay_ms, retry.max_delay_ms
        )));
    }
    Ok(())
}

impl Validate for ScanSettings {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.poll_interval_seconds == 0 {
            return Err(ValidationError::scan(
                "poll_interval_seconds must be greater than 0",
            ));
        }

        if self.timeout_seconds == 0 {
            return Err(ValidationError::scan("timeout_seconds must be greater than 0"));
        }

        if self.timeout_seconds < self.poll_interval_seconds {
            return Err(ValidationError::scan(format!(
                "timeout_seconds ({}) must not be shorter than poll_interval_seconds ({})",
                self.timeout_seconds, self.poll_interval_seconds
            )));
        }

        if self.report_filename.trim().is_empty() {
            return Err(ValidationError::scan("report_filename cannot be empty"));
        }

        if self.report_filename.contains('/') || self.report_filename.contains('\\') {
            return Err(ValidationError::scan(format!(
                "report_filename must be a bare file name, got '{}'",
                self.report_filename
            )));
        }

        validate_retry("health_check", &self.health_check, ValidationError::scan)
    }
}

impl Validate for LocalSettings {
    fn validate(&self) -> Result<(), ValidationError> {
        // u16 cannot exceed 65535, so only 0 needs rejecting
        if self.port == 0 {
            return Err(ValidationError::local("port must be in range 1-65535"));
        }

        if self.runtime.trim().is_empty() {
            return Err(ValidationError::local("runtime cannot be empty"));
        }

        if self.image.trim().is_empty() {
            return Err(ValidationError::local("image cannot be empty"));
        }

        if self.container_name.trim().is_empty() {
            return Err(ValidationError::local("container_name cannot be empty"));
        }

        Ok(())
    }
}

impl Validate for RemoteSettings {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.timeout_seconds == 0 {
            return Err(ValidationError::remote("timeout_seconds must be greater than 0"));
        }

        if let Some(ref endpoint) = self.endpoint
            && !endpoint.trim().is_empty()
        {
            let parsed = url::Url::parse(endpoint.trim()).map_err(|e| {
                ValidationError::remote(format!("endpoint '{}' is not a valid URL: {}", endpoint, e))
            })?;
            if parsed.scheme() != "http" && parsed.scheme() != "https" {
                return Err(ValidationError::remote(format!(
                    "endpoint must use http or https, got '{}'",
                    parsed.scheme()
                )));
            }
        }

        Ok(())
    }
}

impl Validate for CloudSettings {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.region.trim().is_empty() {
            return Err(ValidationError::cloud("region cannot be empty"));
        }

        if self.instance_type.trim().is_empty() {
            return Err(ValidationError::cloud("instance_type cannot be empty"));
        }

        if self.tool_binary.trim().is_empty() {
            return Err(ValidationError::cloud("tool_binary cannot be empty"));
        }

        if self.ssh_user.trim().is_empty() {
            return Err(ValidationError::cloud("ssh_user cannot be empty"));
        }

        if self.engine_port == 0 {
            return Err(ValidationError::cloud("engine_port must be in range 1-65535"));
        }

        validate_retry("ssh_connect", &self.ssh_connect, ValidationError::cloud)
    }
}

impl Validate for RunnerSettings {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.workers == 0 {
            return Err(ValidationError::runner("workers must be at least 1"));
        }
        Ok(())
    }
}

impl Validate for LoggingConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        match self.format.as_str() {
            "compact" | "pretty" | "json" => Ok(()),
            other => Err(ValidationError::logging(format!(
                "format must be one of compact, pretty, json; got '{}'",
                other
            ))),
        }
    }
}

impl Validate for ScanConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        self.scan.validate()?;
        self.local.validate()?;
        self.remote.validate()?;
        self.cloud.validate()?;
        self.runner.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}
