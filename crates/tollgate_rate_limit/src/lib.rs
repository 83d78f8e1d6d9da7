//! Admission control and throttle-aware retry for quota-limited remote calls.
//!
//! This crate protects calls to a rate-limited inference service from
//! exceeding the provider's request budget, and recovers from throttling
//! errors with bounded exponential backoff.
//!
//! ## Components
//!
//! - [`AdmissionGate`] - sliding-window log; at most `max_requests` admissions
//!   in any trailing window, across all tasks sharing it
//! - [`IntervalPacer`] - evenly spaced admissions, one per `window / max_requests`
//! - [`RetryExecutor`] - admit, call, classify, then retry or propagate
//! - [`CallInterceptor`] - the cheap-to-clone handle call sites wrap their calls in
//! - [`TollgateConfig`] - per-endpoint limits loaded from TOML
//!
//! ## Example
//!
//! ```rust,ignore
//! use tollgate_rate_limit::TollgateConfig;
//!
//! let interceptor = TollgateConfig::load()?.interceptor(Some("gemini"))?;
//! let reply = interceptor.invoke(|| client.generate(&request)).await?;
//! ```

mod backoff;
mod classify;
mod config;
mod error;
mod executor;
mod gate;
mod interceptor;
mod pacer;

pub use backoff::RetryPolicy;
pub use classify::{Classify, FailureClass, PatternClassifier, SignalClassifier};
pub use config::{AdmissionStrategy, EndpointConfig, RetryConfig, TollgateConfig};
pub use error::{RateLimitError, RateLimitErrorKind, RateLimitResult};
pub use executor::{CancelReason, Invocation, InvokeError, RetryExecutor};
pub use gate::{Admission, AdmissionGate, MAX_WAIT, WindowConfig};
pub use interceptor::CallInterceptor;
pub use pacer::IntervalPacer;
