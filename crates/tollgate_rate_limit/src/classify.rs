//! Failure classification: throttled or fatal.
//!
//! Two classifiers are provided. [`SignalClassifier`] relies on the error
//! type implementing [`ThrottleSignal`], the structured tag attached by the
//! layer that performs the remote call. [`PatternClassifier`] falls back to
//! matching the error's text and type name, for opaque third-party errors.

use std::fmt::Display;
use tollgate_error::ThrottleSignal;

/// Outcome of classifying one failed attempt.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum FailureClass {
    /// The provider rejected the call for rate or quota reasons; retry later.
    Throttled,
    /// Anything else; never retried.
    Fatal,
}

/// Decides whether a failure of type `E` is worth retrying.
///
/// Classification must be pure: the same error always yields the same class.
pub trait Classify<E>: Send + Sync {
    /// Classify one failure.
    fn classify(&self, err: &E) -> FailureClass;
}

/// Classifier for errors carrying a structured throttle tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SignalClassifier;

impl<E: ThrottleSignal> Classify<E> for SignalClassifier {
    fn classify(&self, err: &E) -> FailureClass {
        if err.is_throttle() {
            FailureClass::Throttled
        } else {
            FailureClass::Fatal
        }
    }
}

/// Textual fallback classifier.
///
/// A failure is throttled when its message contains `429`, `quota` (any
/// case) or `RESOURCE_EXHAUSTED`, or when the error type's name contains
/// `RateLimit`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatternClassifier;

impl PatternClassifier {
    /// Classify a message and type name directly.
    pub fn classify_text(message: &str, type_name: &str) -> FailureClass {
        let throttled = message.contains("429")
            || message.to_lowercase().contains("quota")
            || message.contains("RESOURCE_EXHAUSTED")
            || short_type_name(type_name).contains("RateLimit");
        if throttled {
            FailureClass::Throttled
        } else {
            FailureClass::Fatal
        }
    }
}

impl<E: Display> Classify<E> for PatternClassifier {
    fn classify(&self, err: &E) -> FailureClass {
        Self::classify_text(&err.to_string(), std::any::type_name::<E>())
    }
}

/// Last path segment of a type name, ignoring generic arguments.
fn short_type_name(type_name: &str) -> &str {
    let base = type_name.split('<').next().unwrap_or(type_name);
    base.rsplit("::").next().unwrap_or(base)
}
