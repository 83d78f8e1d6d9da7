//! Tollgate - rate-gated calls to quota-limited inference APIs
//!
//! Tollgate protects calls to a remote inference service from exceeding the
//! provider's request budget, and recovers transparently from throttling
//! errors with bounded exponential backoff.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use tollgate::{SignalClassifier, TollgateConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let interceptor = TollgateConfig::load()?
//!         .interceptor(Some("gemini"))?
//!         .with_classifier(SignalClassifier);
//!
//!     let label = interceptor.invoke(|| client.classify(&review)).await?;
//!     println!("Sentiment: {}", label);
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - `tollgate_error` - Error types and the `ThrottleSignal` trait
//! - `tollgate_rate_limit` - Admission gates, retry executor, call interceptor, configuration
//!
//! This crate re-exports both and adds the `tollgate` command-line tool.

pub use tollgate_error::*;
pub use tollgate_rate_limit::*;

mod observability;
mod overrides;
mod simulate;

pub use observability::{LogConfig, init_logging};
pub use overrides::EndpointOverrides;
pub use simulate::{CallOutcome, CallReport, SimulatedProvider, SimulationSummary, simulate};
