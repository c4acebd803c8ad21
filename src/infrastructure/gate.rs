//! Admission control for provider calls.
//!
//! Two limits compose here: a semaphore caps in-flight calls across the
//! whole process, and a token bucket caps the sustained request rate.
//! Workers hold an admission permit for the duration of one provider call.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::sleep;

use crate::domain::errors::ProviderError;

/// Token bucket rate limiter for provider request throttling.
///
/// Tokens refill continuously with elapsed time; capacity equals the
/// refill rate, so a full second of idle time buys a one-second burst.
#[derive(Clone)]
pub struct TokenBucketRateLimiter {
    tokens: Arc<Mutex<f64>>,
    capacity: f64,
    refill_rate: f64,
    last_refill: Arc<Mutex<Instant>>,
}

impl TokenBucketRateLimiter {
    /// Create a limiter allowing `rate_limit_rps` sustained requests per
    /// second.
    pub fn new(rate_limit_rps: f64) -> Self {
        assert!(rate_limit_rps > 0.0, "rate limit must be positive");

        Self {
            tokens: Arc::new(Mutex::new(rate_limit_rps)),
            capacity: rate_limit_rps,
            refill_rate: rate_limit_rps,
            last_refill: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// Take one token, sleeping until the bucket can supply it.
    pub async fn acquire(&self) {
        loop {
            let mut tokens = self.tokens.lock().await;
            let mut last_refill = self.last_refill.lock().await;

            let now = Instant::now();
            let elapsed = now.duration_since(*last_refill).as_secs_f64();
            let refilled = (*tokens + elapsed * self.refill_rate).min(self.capacity);

            if refilled >= 1.0 {
                *tokens = refilled - 1.0;
                *last_refill = now;
                break;
            }

            let tokens_needed = 1.0 - refilled;
            let wait = Duration::from_secs_f64((tokens_needed / self.refill_rate).max(0.01));

            // Locks must not be held across the sleep.
            drop(tokens);
            drop(last_refill);

            sleep(wait).await;
        }
    }

    #[cfg(test)]
    pub async fn available_tokens(&self) -> f64 {
        let tokens = self.tokens.lock().await;
        let last_refill = self.last_refill.lock().await;

        let elapsed = Instant::now().duration_since(*last_refill).as_secs_f64();
        (*tokens + elapsed * self.refill_rate).min(self.capacity)
    }
}

/// Combined concurrency and rate gate shared by every provider adapter.
#[derive(Clone)]
pub struct ProviderGate {
    permits: Arc<Semaphore>,
    limiter: TokenBucketRateLimiter,
}

impl ProviderGate {
    /// Gate allowing `concurrency` in-flight calls and `rate_limit_rps`
    /// sustained calls per second.
    pub fn new(concurrency: usize, rate_limit_rps: f64) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(concurrency)),
            limiter: TokenBucketRateLimiter::new(rate_limit_rps),
        }
    }

    /// Wait for a concurrency slot, then a rate token. The returned permit
    /// frees the slot on drop; rate tokens are consumed, not returned.
    pub async fn admit(&self) -> Result<OwnedSemaphorePermit, ProviderError> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ProviderError::Fatal("provider gate closed".to_string()))?;
        self.limiter.acquire().await;
        Ok(permit)
    }

    /// Slots not currently held.
    pub fn available_slots(&self) -> usize {
        self.permits.available_permits()
    }
}
