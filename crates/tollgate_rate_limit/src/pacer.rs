//! Minimum-interval pacing using governor.
//!
//! The [`IntervalPacer`] spaces admissions evenly: at most one call per
//! `window / max_requests`. It never bursts, which suits local inference
//! servers that choke on concurrent requests more than on volume.
//!
//! The GCRA implementation in governor is lock-free, so pacing adds no
//! contention beyond the wait itself.

use crate::{Admission, WindowConfig};
use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as GovernorRateLimiter};
use std::num::NonZeroU32;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument};

type DirectRateLimiter = GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Admission source enforcing a minimum spacing between calls.
///
/// # Example
///
/// ```rust,ignore
/// use tollgate_rate_limit::{Admission, IntervalPacer, WindowConfig};
///
/// // 10 requests per minute -> one every 6 seconds
/// let pacer = IntervalPacer::new(WindowConfig::new(10, Duration::from_secs(60))?);
/// pacer.admit().await;
/// ```
pub struct IntervalPacer {
    config: WindowConfig,
    limiter: DirectRateLimiter,
}

impl IntervalPacer {
    /// Create a pacer from window parameters.
    ///
    /// The spacing is `window / max_requests`, floored at one nanosecond.
    pub fn new(config: WindowConfig) -> Self {
        let interval = config.interval().max(Duration::from_nanos(1));
        debug!(interval_ms = interval.as_millis() as u64, "Creating interval pacer");

        // with_period only fails for a zero period, which the floor rules out
        let quota = Quota::with_period(interval)
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
            .allow_burst(NonZeroU32::MIN);

        Self {
            config,
            limiter: GovernorRateLimiter::direct(quota),
        }
    }

    /// The pacer's window parameters.
    pub fn config(&self) -> &WindowConfig {
        &self.config
    }
}

impl std::fmt::Debug for IntervalPacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntervalPacer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Admission for IntervalPacer {
    #[instrument(skip(self))]
    async fn admit(&self) -> Duration {
        if self.limiter.check().is_ok() {
            debug!("Admitted without pacing");
            return Duration::ZERO;
        }

        let started = Instant::now();
        info!(
            "Pacing requests, next slot in up to {:.2}s",
            self.config.interval().as_secs_f64()
        );
        self.limiter.until_ready().await;
        started.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_call_not_paced() {
        let pacer = IntervalPacer::new(WindowConfig::new(1, Duration::from_millis(200)).unwrap());
        assert_eq!(pacer.admit().await, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_second_call_waits_for_interval() {
        let pacer = IntervalPacer::new(WindowConfig::new(2, Duration::from_millis(200)).unwrap());

        let started = Instant::now();
        pacer.admit().await;
        let waited = pacer.admit().await;

        assert!(waited > Duration::ZERO);
        assert!(started.elapsed() >= Duration::from_millis(90));
    }
}
