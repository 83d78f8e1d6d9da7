//! Gate-then-call retry loop.
//!
//! [`RetryExecutor`] runs one externally supplied call through an admission
//! source. Throttled failures are retried on the policy's backoff schedule,
//! each retry re-entering the gate for a fresh admission. Fatal failures
//! propagate after the first attempt that produced them.

use crate::{Admission, Classify, FailureClass, RetryPolicy};
use std::error::Error;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tokio_retry2::{Retry, RetryError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

/// Why an invocation was abandoned before it finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum CancelReason {
    /// The caller's cancellation token fired.
    #[strum(to_string = "cancellation requested")]
    Signalled,
    /// The caller's deadline passed.
    #[strum(to_string = "deadline elapsed")]
    DeadlineElapsed,
}

/// Failure surfaced by an invocation.
///
/// Throttled failures within the retry budget never appear here; they are
/// recovered locally.
#[derive(Debug)]
pub enum InvokeError<E> {
    /// The call failed with a non-throttling error. Not retried.
    Fatal {
        /// Attempt (1-based) that failed
        attempt: u32,
        /// The call's original error
        source: E,
    },
    /// The call kept being throttled until the retry budget ran out.
    RetriesExhausted {
        /// Attempts made, always equal to the policy's `max_retries`
        attempts: u32,
        /// The last throttling error
        source: E,
    },
    /// A wait was aborted by the caller.
    Cancelled(CancelReason),
}

impl<E> InvokeError<E> {
    /// True for [`InvokeError::RetriesExhausted`].
    pub fn is_retries_exhausted(&self) -> bool {
        matches!(self, InvokeError::RetriesExhausted { .. })
    }

    /// True for [`InvokeError::Cancelled`].
    pub fn is_cancelled(&self) -> bool {
        matches!(self, InvokeError::Cancelled(_))
    }

    /// The call's own error, if the invocation got far enough to see one.
    pub fn source_error(&self) -> Option<&E> {
        match self {
            InvokeError::Fatal { source, .. } | InvokeError::RetriesExhausted { source, .. } => {
                Some(source)
            }
            InvokeError::Cancelled(_) => None,
        }
    }

    /// Unwrap into the call's own error.
    pub fn into_source(self) -> Option<E> {
        match self {
            InvokeError::Fatal { source, .. } | InvokeError::RetriesExhausted { source, .. } => {
                Some(source)
            }
            InvokeError::Cancelled(_) => None,
        }
    }
}

impl<E: fmt::Display> fmt::Display for InvokeError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvokeError::Fatal { attempt, source } => {
                write!(f, "Call failed on attempt {}: {}", attempt, source)
            }
            InvokeError::RetriesExhausted { attempts, source } => {
                write!(f, "Retries exhausted after {} attempts: {}", attempts, source)
            }
            InvokeError::Cancelled(reason) => write!(f, "Call cancelled: {}", reason),
        }
    }
}

impl<E> Error for InvokeError<E>
where
    E: Error + 'static,
{
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source_error().map(|e| e as &(dyn Error + 'static))
    }
}

/// Record of one finished invocation.
#[derive(Debug)]
pub struct Invocation<T, E> {
    /// Final result
    pub outcome: Result<T, InvokeError<E>>,
    /// Attempts started, including the last one
    pub attempts: u32,
    /// Total time spent waiting on the gate across all attempts
    pub gate_wait: Duration,
    /// Wall time from start to finish
    pub elapsed: Duration,
}

/// Attempt-level failure, before retry bookkeeping.
enum AttemptFailure<E> {
    Throttled(E),
    Fatal(E),
}

/// Runs calls through an admission source with throttle-aware retry.
pub struct RetryExecutor<C> {
    gate: Arc<dyn Admission>,
    policy: RetryPolicy,
    classifier: C,
}

impl<C> RetryExecutor<C> {
    /// Create an executor over a shared admission source.
    pub fn new(gate: Arc<dyn Admission>, policy: RetryPolicy, classifier: C) -> Self {
        Self {
            gate,
            policy,
            classifier,
        }
    }

    /// The admission source.
    pub fn gate(&self) -> &Arc<dyn Admission> {
        &self.gate
    }

    /// The retry policy.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// The failure classifier.
    pub fn classifier(&self) -> &C {
        &self.classifier
    }

    /// Run a call and report how it went.
    ///
    /// Each attempt admits through the gate, then executes `call`. On
    /// success the value is returned immediately. On failure the classifier
    /// decides: fatal failures propagate at once, throttled ones sleep the
    /// next scheduled delay and try again until `max_retries` attempts have
    /// been made.
    #[instrument(skip_all, fields(max_retries = self.policy.max_retries()))]
    pub async fn run<T, E, F, Fut>(&self, call: F) -> Invocation<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Classify<E>,
        E: fmt::Display,
    {
        let started = Instant::now();
        let attempts = AtomicU32::new(0);
        let gate_wait_nanos = AtomicU64::new(0);
        let max_retries = self.policy.max_retries();
        let schedule = self.policy.schedule();
        // Attempts never overlap; the lock only lends `call` past the gate wait.
        let call = Mutex::new(call);

        let result = Retry::spawn(schedule.clone(), || {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            let call = &call;
            let schedule = &schedule;
            let gate_wait_nanos = &gate_wait_nanos;
            async move {
                let waited = self.gate.admit().await;
                gate_wait_nanos.fetch_add(
                    u64::try_from(waited.as_nanos()).unwrap_or(u64::MAX),
                    Ordering::SeqCst,
                );

                let pending = {
                    let mut call = call.lock().unwrap_or_else(PoisonError::into_inner);
                    (*call)()
                };
                let err = match pending.await {
                    Ok(value) => {
                        debug!(attempt, "Call succeeded");
                        return Ok(value);
                    }
                    Err(err) => err,
                };

                match self.classifier.classify(&err) {
                    FailureClass::Fatal => {
                        warn!(attempt, "Fatal error, not retrying: {}", err);
                        Err(RetryError::Permanent(AttemptFailure::Fatal(err)))
                    }
                    FailureClass::Throttled => {
                        if let Some(delay) = schedule.get(attempt as usize - 1) {
                            warn!(
                                "Retry attempt {}/{}: rate limited, waiting {:.1}s: {}",
                                attempt,
                                max_retries,
                                delay.as_secs_f64(),
                                err
                            );
                        }
                        Err(RetryError::Transient {
                            err: AttemptFailure::Throttled(err),
                            retry_after: None,
                        })
                    }
                }
            }
        })
        .await;

        let attempts = attempts.load(Ordering::SeqCst);
        let outcome = result.map_err(|failure| match failure {
            AttemptFailure::Fatal(source) => InvokeError::Fatal {
                attempt: attempts,
                source,
            },
            AttemptFailure::Throttled(source) => {
                warn!(attempts, "Retries exhausted, giving up");
                InvokeError::RetriesExhausted { attempts, source }
            }
        });

        Invocation {
            outcome,
            attempts,
            gate_wait: Duration::from_nanos(gate_wait_nanos.load(Ordering::SeqCst)),
            elapsed: started.elapsed(),
        }
    }

    /// Run a call and return only its outcome.
    pub async fn invoke<T, E, F, Fut>(&self, call: F) -> Result<T, InvokeError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Classify<E>,
        E: fmt::Display,
    {
        self.run(call).await.outcome
    }

    /// Like [`invoke`](Self::invoke), abandoning the call when `token` fires.
    ///
    /// Cancellation aborts gate waits and backoff sleeps. An attempt that is
    /// already executing is dropped. No admission is recorded for an
    /// abandoned gate wait.
    pub async fn invoke_with_cancel<T, E, F, Fut>(
        &self,
        token: &CancellationToken,
        call: F,
    ) -> Result<T, InvokeError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Classify<E>,
        E: fmt::Display,
    {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!("Invocation cancelled");
                Err(InvokeError::Cancelled(CancelReason::Signalled))
            }
            outcome = self.invoke(call) => outcome,
        }
    }

    /// Like [`invoke`](Self::invoke), abandoning the call at `deadline`.
    pub async fn invoke_until<T, E, F, Fut>(
        &self,
        deadline: Instant,
        call: F,
    ) -> Result<T, InvokeError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Classify<E>,
        E: fmt::Display,
    {
        match tokio::time::timeout_at(deadline, self.invoke(call)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                debug!("Invocation deadline elapsed");
                Err(InvokeError::Cancelled(CancelReason::DeadlineElapsed))
            }
        }
    }
}

impl<C: fmt::Debug> fmt::Debug for RetryExecutor<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("policy", &self.policy)
            .field("classifier", &self.classifier)
            .finish_non_exhaustive()
    }
}
