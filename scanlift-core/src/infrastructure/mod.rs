//! Infrastructure Layer - engine HTTP client, external commands and retries

pub mod engine_client;
pub mod process;
pub mod resilience;

pub use engine_client::{HttpEngineClient, HttpEngineConnector};
pub use process::{CommandError, CommandOutput, CommandRunner, CommandSpec, TokioCommandRunner};
pub use resilience::{RetryConfig, retry_with_backoff};
