use crate::app::ports::Pacer;
use crate::rate_limiter::RateLimiter;
use async_trait::async_trait;
use std::time::Duration;

/// Sleeps a fixed duration every time it is awaited.
pub struct FixedDelayPacer(pub Duration);

#[async_trait]
impl Pacer for FixedDelayPacer {
    async fn wait(&self) {
        if !self.0.is_zero() {
            tokio::time::sleep(self.0).await;
        }
    }
}

pub struct NoopPacer;

#[async_trait]
impl Pacer for NoopPacer {
    async fn wait(&self) {}
}

/// Spends one request token per wait.
pub struct TokenBucketPacer(pub RateLimiter);

#[async_trait]
impl Pacer for TokenBucketPacer {
    async fn wait(&self) {
        self.0.acquire().await;
    }
}
