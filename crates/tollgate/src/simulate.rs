//! Simulated throttling provider and load driver.
//!
//! [`SimulatedProvider`] stands in for a quota-limited inference API: it
//! answers HTTP 429 whenever callers exceed its own quota, and can inject
//! non-throttling failures. [`simulate`] drives concurrent calls through a
//! [`CallInterceptor`] against it so limits can be tuned without spending
//! real quota.

use governor::clock::Clock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as GovernorRateLimiter};
use serde::Serialize;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tollgate_error::{ConfigError, RemoteError, RemoteErrorKind, TollgateResult};
use tollgate_rate_limit::{CallInterceptor, InvokeError, MAX_WAIT, SignalClassifier};
use tracing::{debug, info, instrument};

/// Governor clock driven by tokio's time source.
///
/// Readings are offsets from creation, so a paused test runtime also pauses
/// the provider's quota.
#[derive(Debug, Clone, Copy)]
struct TokioClock {
    origin: tokio::time::Instant,
}

impl TokioClock {
    fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Clock for TokioClock {
    type Instant = Duration;

    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

type DirectRateLimiter =
    GovernorRateLimiter<NotKeyed, InMemoryState, TokioClock, NoOpMiddleware<Duration>>;

/// Fake remote endpoint with its own request quota.
pub struct SimulatedProvider {
    quota: DirectRateLimiter,
    fatal_every: Option<u32>,
    latency: Duration,
    calls: AtomicU32,
    rejections: AtomicU32,
}

impl SimulatedProvider {
    /// Create a provider accepting at most `limit` calls per `window`.
    ///
    /// # Errors
    ///
    /// Fails when `limit` is zero, when `window` is longer than
    /// [`MAX_WAIT`], or when `window` is too short to give each of the
    /// `limit` requests at least a nanosecond.
    #[track_caller]
    pub fn new(limit: u32, window: Duration) -> TollgateResult<Self> {
        let burst = NonZeroU32::new(limit)
            .ok_or_else(|| ConfigError::new("provider limit must be at least 1"))?;
        if window > MAX_WAIT {
            return Err(ConfigError::new(format!(
                "provider window must be at most {}s",
                MAX_WAIT.as_secs()
            ))
            .into());
        }
        let quota = Quota::with_period(window / limit)
            .ok_or_else(|| {
                ConfigError::new(format!(
                    "provider window of {:?} is too short for {} requests",
                    window, limit
                ))
            })?
            .allow_burst(burst);

        Ok(Self {
            quota: GovernorRateLimiter::direct_with_clock(quota, TokioClock::new()),
            fatal_every: None,
            latency: Duration::ZERO,
            calls: AtomicU32::new(0),
            rejections: AtomicU32::new(0),
        })
    }

    /// Fail every `n`th call with an authorization error.
    pub fn with_fatal_every(mut self, n: Option<u32>) -> Self {
        self.fatal_every = n.filter(|n| *n > 0);
        self
    }

    /// Simulated response latency.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Calls received so far, including rejected ones.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Calls answered with HTTP 429.
    pub fn rejections(&self) -> u32 {
        self.rejections.load(Ordering::SeqCst)
    }

    /// Handle one completion request.
    pub async fn complete(&self, prompt: &str) -> Result<String, RemoteError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if self.quota.check().is_err() {
            self.rejections.fetch_add(1, Ordering::SeqCst);
            debug!(call = n, "Provider quota exceeded");
            return Err(RemoteError::new(RemoteErrorKind::HttpStatus {
                status_code: 429,
                message: "Resource has been exhausted (e.g. check quota).".to_string(),
            }));
        }

        if self.fatal_every.is_some_and(|every| n % every == 0) {
            return Err(RemoteError::new(RemoteErrorKind::Unauthorized(
                "API key not valid".to_string(),
            )));
        }

        Ok(format!("completion #{} for '{}'", n, prompt))
    }
}

impl std::fmt::Debug for SimulatedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedProvider")
            .field("fatal_every", &self.fatal_every)
            .field("latency", &self.latency)
            .field("calls", &self.calls())
            .field("rejections", &self.rejections())
            .finish_non_exhaustive()
    }
}

/// Outcome of one simulated call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum CallOutcome {
    /// The call returned a value
    #[display("ok")]
    Ok,
    /// The call failed without being throttled
    #[display("fatal")]
    Fatal,
    /// The call stayed throttled through every attempt
    #[display("retries_exhausted")]
    RetriesExhausted,
    /// The call was abandoned
    #[display("cancelled")]
    Cancelled,
}

/// Report for one simulated call.
#[derive(Debug, Clone, Serialize)]
pub struct CallReport {
    /// Call index, starting at 1
    pub index: u32,
    /// What happened
    pub outcome: CallOutcome,
    /// Attempts made
    pub attempts: u32,
    /// Time spent waiting on the gate, in milliseconds
    pub gate_wait_ms: u64,
    /// Total time for the call, in milliseconds
    pub elapsed_ms: u64,
    /// Response text or error message
    pub detail: String,
}

/// Aggregate results of a simulation run.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationSummary {
    /// Per-call reports, ordered by index
    pub calls: Vec<CallReport>,
    /// Calls that succeeded
    pub succeeded: usize,
    /// Calls that failed fatally
    pub fatal: usize,
    /// Calls that exhausted their retries
    pub exhausted: usize,
    /// HTTP 429 responses the provider sent
    pub provider_rejections: u32,
    /// Wall time for the whole run, in milliseconds
    pub elapsed_ms: u64,
}

/// Drive `calls` concurrent calls through `interceptor` against `provider`.
#[instrument(skip(interceptor, provider))]
pub async fn simulate(
    interceptor: CallInterceptor<SignalClassifier>,
    provider: Arc<SimulatedProvider>,
    calls: u32,
) -> SimulationSummary {
    let started = Instant::now();
    let mut tasks = JoinSet::new();

    for index in 1..=calls {
        let interceptor = interceptor.clone();
        let provider = Arc::clone(&provider);
        tasks.spawn(async move {
            let prompt = format!("review #{}", index);
            let invocation = interceptor
                .run(|| {
                    let provider = Arc::clone(&provider);
                    let prompt = prompt.clone();
                    async move { provider.complete(&prompt).await }
                })
                .await;

            let (outcome, detail) = match invocation.outcome {
                Ok(text) => (CallOutcome::Ok, text),
                Err(err @ InvokeError::Fatal { .. }) => (CallOutcome::Fatal, err.to_string()),
                Err(err @ InvokeError::RetriesExhausted { .. }) => {
                    (CallOutcome::RetriesExhausted, err.to_string())
                }
                Err(err @ InvokeError::Cancelled(_)) => (CallOutcome::Cancelled, err.to_string()),
            };

            CallReport {
                index,
                outcome,
                attempts: invocation.attempts,
                gate_wait_ms: invocation.gate_wait.as_millis() as u64,
                elapsed_ms: invocation.elapsed.as_millis() as u64,
                detail,
            }
        });
    }

    let mut reports = Vec::with_capacity(calls as usize);
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(report) => reports.push(report),
            Err(e) => debug!("Simulated call task failed: {}", e),
        }
    }
    reports.sort_by_key(|r| r.index);

    let count = |outcome: CallOutcome| reports.iter().filter(|r| r.outcome == outcome).count();
    let summary = SimulationSummary {
        succeeded: count(CallOutcome::Ok),
        fatal: count(CallOutcome::Fatal),
        exhausted: count(CallOutcome::RetriesExhausted),
        provider_rejections: provider.rejections(),
        elapsed_ms: started.elapsed().as_millis() as u64,
        calls: reports,
    };

    info!(
        succeeded = summary.succeeded,
        fatal = summary.fatal,
        exhausted = summary.exhausted,
        provider_rejections = summary.provider_rejections,
        "Simulation finished"
    );
    summary
}
