use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Request budget for an upstream service.
#[derive(Clone, Debug, Default)]
pub struct Limits {
    pub requests_per_min: Option<u64>,
}

#[derive(Clone, Debug)]
pub struct RateLimiter {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    limits: Limits,
    // token bucket modeled by the current tokens and the time of last refill
    rpm_tokens: Mutex<(f64, Instant)>,
}

impl RateLimiter {
    pub fn new(limits: Limits) -> Self {
        let now = Instant::now();
        let rpm_capacity = limits.requests_per_min.unwrap_or(0) as f64;
        Self {
            inner: Arc::new(Inner {
                limits,
                rpm_tokens: Mutex::new((rpm_capacity, now)),
            }),
        }
    }

    pub fn per_minute(requests: u64) -> Self {
        Self::new(Limits {
            requests_per_min: Some(requests),
        })
    }

    // Acquire permission for one request. Awaits until a token is available.
    pub async fn acquire(&self) {
        if let Some(rpm) = self.inner.limits.requests_per_min {
            if rpm > 0 {
                self.consume_tokens(rpm as f64, 60.0, 1.0).await;
            }
        }
    }

    async fn consume_tokens(&self, capacity: f64, period_secs: f64, cost: f64) {
        // refill continuously, wait until enough tokens accumulate
        loop {
            let mut guard = self.inner.rpm_tokens.lock().await;
            let (ref mut tokens, ref mut last) = *guard;
            let now = Instant::now();
            let elapsed = now.duration_since(*last).as_secs_f64();
            let refill_rate = capacity / period_secs; // tokens per second
            *tokens = (*tokens + elapsed * refill_rate).min(capacity);
            *last = now;
            if *tokens >= cost {
                *tokens -= cost;
                break;
            } else {
                let need = cost - *tokens;
                let secs = need / refill_rate;
                drop(guard);
                tokio::time::sleep(Duration::from_secs_f64(secs.max(0.001))).await;
            }
        }
    }
}
