//! Transparent guard for remote calls.
//!
//! A [`CallInterceptor`] is what call sites hold. It wraps any zero-argument
//! async call in "admit, execute, classify, retry or propagate" without the
//! call site knowing about gates or retry policies. Cloning is cheap and all
//! clones share the same admission source.

use crate::{
    Admission, AdmissionGate, Classify, IntervalPacer, Invocation, InvokeError, PatternClassifier,
    RateLimitResult, RetryExecutor, RetryPolicy, WindowConfig,
};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Rate-gated, throttle-retrying wrapper around remote calls.
///
/// The classifier type defaults to [`PatternClassifier`], which works with
/// any error that implements `Display`. Use
/// [`with_classifier`](Self::with_classifier) to switch to
/// [`SignalClassifier`](crate::SignalClassifier) for structured errors.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use tollgate_rate_limit::CallInterceptor;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let interceptor = CallInterceptor::new(
///     3,                       // max_requests
///     Duration::from_secs(60), // window
///     5,                       // max_retries
///     Duration::from_secs(4),  // initial_delay
///     2.0,                     // backoff_multiplier
/// )?;
///
/// let answer = interceptor
///     .invoke(|| async { Ok::<_, std::io::Error>("positive") })
///     .await?;
/// assert_eq!(answer, "positive");
/// # Ok(())
/// # }
/// ```
pub struct CallInterceptor<C = PatternClassifier> {
    executor: Arc<RetryExecutor<C>>,
}

impl CallInterceptor<PatternClassifier> {
    /// Build an interceptor with its own sliding-window gate.
    ///
    /// # Errors
    ///
    /// Fails when any parameter is zero or `backoff_multiplier` is not
    /// greater than one.
    #[track_caller]
    pub fn new(
        max_requests: u32,
        window: Duration,
        max_retries: u32,
        initial_delay: Duration,
        backoff_multiplier: f64,
    ) -> RateLimitResult<Self> {
        let window = WindowConfig::new(max_requests, window)?;
        let policy = RetryPolicy::new(max_retries, initial_delay, backoff_multiplier)?;
        Ok(Self::with_gate(AdmissionGate::new(window), policy))
    }

    /// Build an interceptor that paces calls instead of windowing them.
    pub fn paced(window: WindowConfig, policy: RetryPolicy) -> Self {
        Self::with_gate(IntervalPacer::new(window), policy)
    }

    /// Build an interceptor around an admission source it owns.
    pub fn with_gate(gate: impl Admission + 'static, policy: RetryPolicy) -> Self {
        Self::sharing(Arc::new(gate), policy)
    }

    /// Build an interceptor around an admission source shared with others.
    pub fn sharing(gate: Arc<dyn Admission>, policy: RetryPolicy) -> Self {
        Self {
            executor: Arc::new(RetryExecutor::new(gate, policy, PatternClassifier)),
        }
    }
}

impl<C> CallInterceptor<C> {
    /// Replace the failure classifier, keeping gate and policy.
    pub fn with_classifier<D>(self, classifier: D) -> CallInterceptor<D> {
        CallInterceptor {
            executor: Arc::new(RetryExecutor::new(
                Arc::clone(self.executor.gate()),
                *self.executor.policy(),
                classifier,
            )),
        }
    }

    /// The shared admission source.
    pub fn gate(&self) -> Arc<dyn Admission> {
        Arc::clone(self.executor.gate())
    }

    /// The retry policy.
    pub fn policy(&self) -> &RetryPolicy {
        self.executor.policy()
    }

    /// Guard one call.
    pub async fn invoke<T, E, F, Fut>(&self, call: F) -> Result<T, InvokeError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Classify<E>,
        E: fmt::Display,
    {
        self.executor.invoke(call).await
    }

    /// Guard one call and report attempts and waits.
    pub async fn run<T, E, F, Fut>(&self, call: F) -> Invocation<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Classify<E>,
        E: fmt::Display,
    {
        self.executor.run(call).await
    }

    /// Guard one call, abandoning it when `token` fires.
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
        self.executor.invoke_with_cancel(token, call).await
    }

    /// Guard one call, abandoning it at `deadline`.
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
        self.executor.invoke_until(deadline, call).await
    }
}

impl<C> Clone for CallInterceptor<C> {
    fn clone(&self) -> Self {
        Self {
            executor: Arc::clone(&self.executor),
        }
    }
}

impl<C: fmt::Debug> fmt::Debug for CallInterceptor<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallInterceptor")
            .field("executor", &self.executor)
            .finish()
    }
}
