//! Waiting for a freshly started engine to answer

use tracing::{debug, info};

use scanlift_core::domain::{EngineApi, EngineError};
use scanlift_core::infrastructure::resilience::{RetryConfig, retry_with_backoff};

/// Poll the engine's version endpoint until it answers
///
/// Transient failures (connection refused while the engine boots, 5xx) are retried with
/// backoff; a rejected API key is returned immediately.
pub async fn wait_for_engine(
    engine: &dyn EngineApi,
    retry: &RetryConfig,
) -> Result<String, EngineError> {
    debug!(max_attempts = retry.max_attempts, "Waiting for scan engine to become ready");

    let version = retry_with_backoff(retry, || engine.version(), EngineError::is_transient).await?;

    info!(%version, "Scan engine is ready");
    Ok(version)
}
