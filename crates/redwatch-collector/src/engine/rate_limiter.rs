//! Token-bucket rate limiter
//!
//! Enforces "at most `max_calls` acquisitions per `period`" across any
//! number of concurrent tasks sharing one limiter. Tokens regenerate
//! continuously at `max_calls / period`; `acquire` consumes exactly one
//! token, sleeping while the bucket is empty.

use std::time::Duration;

use rand::Rng;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::{debug, trace};

use super::{EngineError, Result};

struct Bucket {
    allowance: f64,
    last_check: Instant,
}

/// Asynchronous token-bucket rate limiter.
///
/// All state lives behind a single async mutex, so no caller ever observes
/// or mutates the bucket concurrently with another; a waiter holds the
/// critical section through its sleep, which strictly serializes grants.
/// Sleeps cover the exact deficit `(1 - allowance) * period / max_calls`,
/// and the elapsed time is re-checked on wakeup before granting.
pub struct RateLimiter {
    max_calls: f64,
    period: Duration,
    /// Symmetric refill-rate perturbation, e.g. 0.1 for ±10%. Desynchronizes
    /// limiters in sibling processes; never enters the sleep formula.
    jitter: f64,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// Create a limiter that starts with an empty bucket (strict mode):
    /// tokens accrue from construction time, so even the first acquisitions
    /// are paced.
    pub fn new(max_calls: u32, period: Duration) -> Result<Self> {
        Self::with_initial_allowance(max_calls, period, 0.0)
    }

    /// Create a limiter whose bucket starts full, allowing an initial burst
    /// of `max_calls` before pacing kicks in.
    pub fn bursty(max_calls: u32, period: Duration) -> Result<Self> {
        Self::with_initial_allowance(max_calls, period, max_calls as f64)
    }

    fn with_initial_allowance(max_calls: u32, period: Duration, allowance: f64) -> Result<Self> {
        if max_calls == 0 {
            return Err(EngineError::Config(
                "rate limiter max_calls must be at least 1".to_string(),
            ));
        }
        if period.is_zero() {
            return Err(EngineError::Config(
                "rate limiter period must be positive".to_string(),
            ));
        }

        Ok(Self {
            max_calls: max_calls as f64,
            period,
            jitter: 0.0,
            bucket: Mutex::new(Bucket {
                allowance,
                last_check: Instant::now(),
            }),
        })
    }

    /// Enable refill-rate jitter. `fraction` is clamped to `[0, 1)`.
    pub fn with_jitter(mut self, fraction: f64) -> Self {
        self.jitter = fraction.clamp(0.0, 0.999);
        self
    }

    /// Suspend until a token is available, then consume it.
    pub async fn acquire(&self) {
        let mut bucket = self.bucket.lock().await;
        loop {
            let now = Instant::now();
            let elapsed = now.duration_since(bucket.last_check).as_secs_f64();
            bucket.last_check = now;

            bucket.allowance += elapsed * self.refill_rate();
            if bucket.allowance > self.max_calls {
                bucket.allowance = self.max_calls;
            }

            if bucket.allowance >= 1.0 {
                trace!(allowance = bucket.allowance, "limiter grants one token");
                bucket.allowance -= 1.0;
                return;
            }

            // Sleep is computed from the un-jittered rate so a granted wait
            // is never longer than the true deficit requires.
            let sleep_for = (1.0 - bucket.allowance) * self.period.as_secs_f64() / self.max_calls;
            debug!(sleep_secs = sleep_for, "limiter sleeping for next token");
            sleep(Duration::from_secs_f64(sleep_for)).await;
        }
    }

    fn refill_rate(&self) -> f64 {
        let base = self.max_calls / self.period.as_secs_f64();
        if self.jitter == 0.0 {
            return base;
        }
        let factor = 1.0 + rand::thread_rng().gen_range(-self.jitter..=self.jitter);
        base * factor
    }
}
