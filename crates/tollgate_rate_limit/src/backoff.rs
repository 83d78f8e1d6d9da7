//! Retry policy and backoff schedule.

use crate::{MAX_WAIT, RateLimitErrorKind, RateLimitResult};
use std::time::Duration;
use tokio_retry2::strategy::jitter_range;

/// Immutable retry parameters.
///
/// Defines the deterministic delay sequence `d, d*m, d*m², …` slept between
/// successive attempts of one throttled call. `max_retries` counts attempts,
/// so a policy with `max_retries = 3` sleeps at most twice.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use tollgate_rate_limit::RetryPolicy;
///
/// let policy = RetryPolicy::new(3, Duration::from_secs(2), 2.0).unwrap();
/// assert_eq!(
///     policy.delays(),
///     vec![Duration::from_secs(2), Duration::from_secs(4)]
/// );
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    max_retries: u32,
    initial_delay: Duration,
    backoff_multiplier: f64,
    jitter: bool,
}

impl RetryPolicy {
    /// Create a retry policy.
    ///
    /// # Errors
    ///
    /// Fails when `max_retries` is zero, `initial_delay` is zero,
    /// `backoff_multiplier` is not a finite number greater than one, or the
    /// longest scheduled delay exceeds [`MAX_WAIT`].
    #[track_caller]
    pub fn new(
        max_retries: u32,
        initial_delay: Duration,
        backoff_multiplier: f64,
    ) -> RateLimitResult<Self> {
        if max_retries == 0 {
            return Err(RateLimitErrorKind::InvalidRetry(
                "max_retries must be at least 1".to_string(),
            )
            .into());
        }
        if initial_delay.is_zero() {
            return Err(RateLimitErrorKind::InvalidRetry(
                "initial_delay must be longer than zero".to_string(),
            )
            .into());
        }
        if !backoff_multiplier.is_finite() || backoff_multiplier <= 1.0 {
            return Err(RateLimitErrorKind::InvalidRetry(format!(
                "backoff_multiplier must be greater than 1, got {}",
                backoff_multiplier
            ))
            .into());
        }
        let policy = Self {
            max_retries,
            initial_delay,
            backoff_multiplier,
            jitter: false,
        };
        // Delays grow monotonically, so the last one is the longest.
        let longest = policy.delay_for(max_retries.saturating_sub(1).max(1));
        if longest > MAX_WAIT {
            return Err(RateLimitErrorKind::InvalidRetry(format!(
                "longest backoff delay must be at most {}s, got {:.0}s",
                MAX_WAIT.as_secs(),
                longest.as_secs_f64()
            ))
            .into());
        }
        Ok(policy)
    }

    /// Randomise each delay between zero and its scheduled value.
    pub fn with_jitter(mut self, enabled: bool) -> Self {
        self.jitter = enabled;
        self
    }

    /// Total attempts allowed for one call.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay after the first throttled attempt.
    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    /// Growth factor between successive delays.
    pub fn backoff_multiplier(&self) -> f64 {
        self.backoff_multiplier
    }

    /// Whether jitter is applied.
    pub fn jitter(&self) -> bool {
        self.jitter
    }

    /// Scheduled delay after the given 1-based attempt failed.
    ///
    /// Saturates at `Duration::MAX` instead of overflowing. Attempts within
    /// `max_retries` never get that far.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let factor = self.backoff_multiplier.powi(exponent);
        Duration::try_from_secs_f64(self.initial_delay.as_secs_f64() * factor)
            .unwrap_or(Duration::MAX)
    }

    /// The full deterministic schedule: one delay per retry, `max_retries - 1` in total.
    pub fn delays(&self) -> Vec<Duration> {
        (1..self.max_retries).map(|attempt| self.delay_for(attempt)).collect()
    }

    /// The schedule actually slept, with jitter applied when enabled.
    pub fn schedule(&self) -> Vec<Duration> {
        let delays = self.delays();
        if self.jitter {
            delays.into_iter().map(jitter_range(0.0, 1.0)).collect()
        } else {
            delays
        }
    }
}
