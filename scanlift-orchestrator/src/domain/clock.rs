//! Time source for polling loops

use std::time::{Duration, Instant};

use async_trait::async_trait;

/// Injected so polling loops can be driven without real waiting
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    async fn sleep(&self, duration: Duration);
}
