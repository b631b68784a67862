//! Classified, bounded retry with exponential backoff
//!
//! Only transient errors ([`Error::is_transient`]) are retried. The delay
//! before retry `n` (zero-based) is `min(base * 2^n, max_delay)`, and nothing
//! sleeps after the final attempt.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Upper bound on any single backoff
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Exponents beyond this already exceed any sane cap
const MAX_EXPONENT: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(5000))
    }
}

impl RetryPolicy {
    /// `max_attempts` counts the first try; zero is treated as one.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }

    /// Lower the backoff cap; it never exceeds [`DEFAULT_MAX_DELAY`]
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay.min(DEFAULT_MAX_DELAY);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Backoff after the zero-based `attempt` failed
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.min(MAX_EXPONENT);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    ///
    /// The error returned is the last one observed.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!("Operation succeeded after {} retries", attempt);
                    }
                    return Ok(value);
                }
                Err(e) if e.is_transient() && attempt + 1 < self.max_attempts => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        "Attempt {}/{} failed, retrying in {:?}: {}",
                        attempt + 1,
                        self.max_attempts,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(exhausted(e, attempt + 1)),
            }
        }
    }
}

fn exhausted(error: Error, attempts: u32) -> Error {
    if error.is_transient() {
        warn!("Giving up after {} attempt(s): {}", attempts, error);
    }
    error
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    /// Paused time advances to timer deadlines at millisecond granularity
    fn assert_close(actual: Duration, expected: Duration) {
        assert!(
            actual >= expected && actual < expected + Duration::from_millis(5),
            "expected ~{expected:?}, got {actual:?}"
        );
    }

    fn unavailable() -> Error {
        Error::from_status("cloudns", 503, "service unavailable")
    }

    #[test]
    fn delays_double_and_cap() {
        let policy = RetryPolicy::new(10, Duration::from_millis(5000));
        assert_eq!(policy.delay_for(0), Duration::from_millis(5000));
        assert_eq!(policy.delay_for(1), Duration::from_millis(10000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(20000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(30000));
        assert_eq!(policy.delay_for(63), Duration::from_millis(30000));
    }

    #[test]
    fn max_delay_cannot_exceed_cap() {
        let policy = RetryPolicy::new(5, Duration::from_millis(20_000)).with_max_delay(Duration::from_secs(120));
        assert_eq!(policy.delay_for(0), Duration::from_millis(20_000));
        assert_eq!(policy.delay_for(1), DEFAULT_MAX_DELAY);

        let policy = RetryPolicy::new(5, Duration::from_millis(100)).with_max_delay(Duration::from_millis(250));
        assert_eq!(policy.delay_for(2), Duration::from_millis(250));
    }

    #[test]
    fn zero_attempts_means_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_back_off_then_succeed() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100));
        let calls = Arc::new(AtomicU32::new(0));
        let started = Instant::now();
        let stamps = Arc::new(std::sync::Mutex::new(Vec::new()));

        let result = policy
            .run(|| {
                let calls = calls.clone();
                let stamps = stamps.clone();
                async move {
                    stamps.lock().unwrap().push(started.elapsed());
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(unavailable())
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let stamps = stamps.lock().unwrap();
        assert_close(stamps[1] - stamps[0], Duration::from_millis(100));
        assert_close(stamps[2] - stamps[1], Duration::from_millis(200));
        assert_close(started.elapsed(), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_errors_are_not_retried() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100));
        let calls = Arc::new(AtomicU32::new(0));
        let started = Instant::now();

        let result: Result<()> = policy
            .run(|| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(Error::from_status("cloudns", 400, "bad request"))
                }
            })
            .await;

        assert_eq!(result.unwrap_err().status(), Some(400));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_returns_last_error_without_trailing_sleep() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100));
        let calls = Arc::new(AtomicU32::new(0));
        let started = Instant::now();

        let result: Result<()> = policy
            .run(|| {
                let calls = calls.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    Err(Error::from_status("cloudns", 500 + n as u16, "server error"))
                }
            })
            .await;

        assert_eq!(result.unwrap_err().status(), Some(502));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 100 + 200; no sleep after the third attempt
        assert_close(started.elapsed(), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limits_are_retried() {
        let policy = RetryPolicy::new(2, Duration::from_millis(10));
        let calls = Arc::new(AtomicU32::new(0));

        let result = policy
            .run(|| {
                let calls = calls.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(Error::from_status("cloudns", 429, "slow down"))
                    } else {
                        Ok(())
                    }
                }
            })
            .await;
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
