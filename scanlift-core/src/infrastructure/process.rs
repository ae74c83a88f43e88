//! External command execution
//!
//! Container runtimes, the infrastructure tool and the SSH client are all driven through
//! [`CommandRunner`], so providers can be exercised in tests with scripted outputs.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Errors starting or waiting for a command. A non-zero exit is not an error here.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("{program}: command not found")]
    NotFound { program: String },

    #[error("failed to start {program}: {message}")]
    Spawn { program: String, message: String },

    #[error("{program} did not finish within {seconds}s")]
    Timeout { program: String, seconds: u64 },

    #[error("I/O error while running {program}: {message}")]
    Io { program: String, message: String },
}

/// A command line to run
#[derive(Debug, Clone, Default)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
    pub timeout: Option<Duration>,
    secret_args: Vec<usize>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add an argument that is masked when the command is displayed
    pub fn secret_arg(mut self, arg: impl Into<String>) -> Self {
        self.secret_args.push(self.args.len());
        self.args.push(arg.into());
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for (index, arg) in self.args.iter().enumerate() {
            if self.secret_args.contains(&index) {
                f.write_str(" ***")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Captured result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` when the process was killed by a signal
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// stdout and stderr together, for diagnostics and classification
    pub fn combined(&self) -> String {
        match (self.stdout.trim().is_empty(), self.stderr.trim().is_empty()) {
            (true, _) => self.stderr.clone(),
            (false, true) => self.stdout.clone(),
            (false, false) => format!("{}\n{}", self.stdout, self.stderr),
        }
    }
}

/// Runs external commands
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError>;
}

/// [`CommandRunner`] backed by `tokio::process`
#[derive(Debug, Default, Clone)]
pub struct TokioCommandRunner;

impl TokioCommandRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        debug!(command = %spec, "Running command");

        let mut command = Command::new(&spec.program);
        command.args(&spec.args);
        if let Some(ref cwd) = spec.cwd {
            command.current_dir(cwd);
        }
        for (key, value) in &spec.env {
            command.env(key, value);
        }

        let child = command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => CommandError::NotFound {
                    program: spec.program.clone(),
                },
                _ => CommandError::Spawn {
                    program: spec.program.clone(),
                    message: e.to_string(),
                },
            })?;

        let output = match spec.timeout {
            Some(timeout) => tokio::time::timeout(timeout, child.wait_with_output())
                .await
                .map_err(|_| CommandError::Timeout {
                    program: spec.program.clone(),
                    seconds: timeout.as_secs(),
                })?,
            None => child.wait_with_output().await,
        }
        .map_err(|e| CommandError::Io {
            program: spec.program.clone(),
            message: e.to_string(),
        })?;

        let result = CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        debug!(program = %spec.program, status = ?result.status, "Command finished");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_captures_output_and_exit_code() {
        let spec = CommandSpec::new("sh")
            .arg("-c")
            .arg("echo out; echo err >&2; exit 3");
        let output = TokioCommandRunner::new().run(&spec).await.unwrap();

        assert_eq!(output.status, Some(3));
        assert!(!output.success());
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
        assert!(output.combined().contains("out"));
        assert!(output.combined().contains("err"));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let spec = CommandSpec::new("scanlift-no-such-binary-3f9a");
        let err = TokioCommandRunner::new().run(&spec).await.unwrap_err();
        assert!(matches!(err, CommandError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_timeout_kills_command() {
        let spec = CommandSpec::new("sleep")
            .arg("5")
            .timeout(Duration::from_millis(100));
        let err = TokioCommandRunner::new().run(&spec).await.unwrap_err();
        assert!(matches!(err, CommandError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_working_directory_and_env() {
        let dir = tempfile::tempdir().unwrap();
        let spec = CommandSpec::new("sh")
            .arg("-c")
            .arg("pwd; echo $SCANLIFT_TEST_VALUE")
            .current_dir(dir.path())
            .env("SCANLIFT_TEST_VALUE", "42");
        let output = TokioCommandRunner::new().run(&spec).await.unwrap();
        assert!(output.success());
        assert!(output.stdout.contains("42"));
    }

    #[test]
    fn test_display_masks_secrets() {
        let spec = CommandSpec::new("docker")
            .args(["run", "-d"])
            .arg("-config")
            .secret_arg("api.key=hunter2");
        let shown = spec.to_string();
        assert_eq!(shown, "docker run -d -config ***");
    }
}
