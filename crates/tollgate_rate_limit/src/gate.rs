//! Sliding-window admission control.
//!
//! The [`AdmissionGate`] keeps a log of recent admission instants and blocks
//! callers until admitting another call would keep the number of admissions
//! in any trailing window at or below the configured ceiling.
//!
//! The log is guarded by a single async mutex. Eviction, the capacity check
//! and insertion all happen inside one critical section, so two callers can
//! never both observe spare capacity and both insert. Waiting happens
//! *outside* the lock: a blocked caller releases the log, sleeps for the
//! computed duration, then re-evaluates from scratch. This lets other callers
//! make eviction progress while one is asleep, at the cost of strict FIFO
//! ordering under contention.

use crate::{RateLimitErrorKind, RateLimitResult};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, instrument};

/// Longest window, settle margin or backoff delay accepted at construction.
///
/// Every wait the crate computes stays at or below this bound, so adding it
/// to the current instant cannot overflow.
pub const MAX_WAIT: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Anything that can admit a call, possibly after waiting.
///
/// Implemented by [`AdmissionGate`] and [`IntervalPacer`](crate::IntervalPacer).
/// A single admission source is usually shared (behind an `Arc`) by every
/// call site that talks to the same remote endpoint.
///
/// Dropping an in-progress `admit()` future must not record an admission.
#[async_trait]
pub trait Admission: Send + Sync {
    /// Wait until a call may proceed and record it.
    ///
    /// Returns the total time spent waiting, which is zero when capacity was
    /// immediately available.
    async fn admit(&self) -> Duration;
}

/// Immutable sliding-window parameters.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use tollgate_rate_limit::WindowConfig;
///
/// let window = WindowConfig::new(3, Duration::from_secs(60)).unwrap();
/// assert_eq!(window.max_requests(), 3);
/// assert!(WindowConfig::new(0, Duration::from_secs(60)).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowConfig {
    max_requests: u32,
    window: Duration,
    settle_margin: Duration,
}

impl WindowConfig {
    /// Create a window allowing `max_requests` admissions per `window`.
    ///
    /// # Errors
    ///
    /// Fails when `max_requests` is zero, or `window` is zero or longer
    /// than [`MAX_WAIT`].
    #[track_caller]
    pub fn new(max_requests: u32, window: Duration) -> RateLimitResult<Self> {
        if max_requests == 0 {
            return Err(RateLimitErrorKind::InvalidWindow(
                "max_requests must be at least 1".to_string(),
            )
            .into());
        }
        if window.is_zero() {
            return Err(RateLimitErrorKind::InvalidWindow(
                "window must be longer than zero".to_string(),
            )
            .into());
        }
        if window > MAX_WAIT {
            return Err(RateLimitErrorKind::InvalidWindow(format!(
                "window must be at most {}s, got {}s",
                MAX_WAIT.as_secs(),
                window.as_secs()
            ))
            .into());
        }
        Ok(Self {
            max_requests,
            window,
            settle_margin: Duration::ZERO,
        })
    }

    /// Add a fixed margin on top of every computed wait.
    ///
    /// Useful against providers whose own window boundary is slightly later
    /// than ours. Clamped to [`MAX_WAIT`].
    pub fn with_settle_margin(mut self, margin: Duration) -> Self {
        self.settle_margin = margin.min(MAX_WAIT);
        self
    }

    /// Maximum admissions per window.
    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    /// Window length.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Extra margin added to each computed wait.
    pub fn settle_margin(&self) -> Duration {
        self.settle_margin
    }

    /// Mean spacing between admissions at full utilisation.
    pub fn interval(&self) -> Duration {
        self.window / self.max_requests
    }
}

/// Sliding-window-log admission gate.
///
/// Guarantees that no more than `max_requests` admissions happen within any
/// trailing `window`, across every task admitting through it.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use tollgate_rate_limit::{Admission, AdmissionGate, WindowConfig};
///
/// # #[tokio::main]
/// # async fn main() {
/// let gate = AdmissionGate::new(WindowConfig::new(2, Duration::from_secs(60)).unwrap());
/// assert_eq!(gate.admit().await, Duration::ZERO);
/// assert_eq!(gate.admit().await, Duration::ZERO);
/// assert_eq!(gate.in_window().await, 2);
/// # }
/// ```
#[derive(Debug)]
pub struct AdmissionGate {
    config: WindowConfig,
    // Oldest first.
    log: Mutex<VecDeque<Instant>>,
}

impl AdmissionGate {
    /// Create a gate with an empty log.
    pub fn new(config: WindowConfig) -> Self {
        debug!(
            max_requests = config.max_requests,
            window_secs = config.window.as_secs_f64(),
            "Creating admission gate"
        );
        Self {
            config,
            log: Mutex::new(VecDeque::with_capacity(config.max_requests as usize)),
        }
    }

    /// Convenience constructor validating the raw parameters.
    #[track_caller]
    pub fn with_limits(max_requests: u32, window: Duration) -> RateLimitResult<Self> {
        Ok(Self::new(WindowConfig::new(max_requests, window)?))
    }

    /// The gate's window parameters.
    pub fn config(&self) -> &WindowConfig {
        &self.config
    }

    /// Number of admissions recorded within the trailing window right now.
    pub async fn in_window(&self) -> usize {
        let mut log = self.log.lock().await;
        evict(&mut log, Instant::now(), self.config.window);
        log.len()
    }

    /// One pass of the critical section.
    ///
    /// Records an admission and returns `None` when there is capacity,
    /// otherwise returns how long to wait before trying again.
    async fn try_admit(&self) -> Option<Duration> {
        let mut log = self.log.lock().await;
        let now = Instant::now();
        evict(&mut log, now, self.config.window);

        if log.len() < self.config.max_requests as usize {
            log.push_back(now);
            return None;
        }

        // Full: the oldest entry is the next to leave the window.
        let oldest = log.front().copied().unwrap_or(now);
        let remaining = oldest
            .checked_add(self.config.window)
            .map_or(self.config.window, |expires| {
                expires.saturating_duration_since(now)
            });
        Some(remaining.saturating_add(self.config.settle_margin))
    }
}

#[async_trait]
impl Admission for AdmissionGate {
    #[instrument(skip(self), fields(max_requests = self.config.max_requests))]
    async fn admit(&self) -> Duration {
        let mut waited = Duration::ZERO;
        loop {
            match self.try_admit().await {
                None => {
                    debug!(waited_ms = waited.as_millis() as u64, "Admitted");
                    return waited;
                }
                Some(wait) => {
                    info!("Rate limit reached, waiting {:.1}s", wait.as_secs_f64());
                    tokio::time::sleep(wait).await;
                    waited += wait;
                }
            }
        }
    }
}

/// Drop every entry that is `window` old or older.
fn evict(log: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&oldest) = log.front() {
        if now.saturating_duration_since(oldest) >= window {
            log.pop_front();
        } else {
            break;
        }
    }
}
