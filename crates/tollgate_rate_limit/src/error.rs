//! Error types for rate limiting operations.

use std::fmt;

/// Error kinds for rate limiting operations.
///
/// These are raised while building gates and retry policies, never from
/// `invoke()`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RateLimitErrorKind {
    /// Invalid admission window parameters.
    InvalidWindow(String),
    /// Invalid retry parameters.
    InvalidRetry(String),
    /// No endpoint with this name in the configuration.
    UnknownEndpoint(String),
}

impl fmt::Display for RateLimitErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateLimitErrorKind::InvalidWindow(msg) => write!(f, "Invalid window: {}", msg),
            RateLimitErrorKind::InvalidRetry(msg) => write!(f, "Invalid retry policy: {}", msg),
            RateLimitErrorKind::UnknownEndpoint(name) => write!(f, "Unknown endpoint: {}", name),
        }
    }
}

/// Rate limiting error with location tracking.
#[derive(Debug, Clone)]
pub struct RateLimitError {
    kind: RateLimitErrorKind,
    line: u32,
    file: &'static str,
}

impl RateLimitError {
    /// Create a new rate limiting error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: RateLimitErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> &RateLimitErrorKind {
        &self.kind
    }
}

impl fmt::Display for RateLimitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Rate Limit Error: {} at line {} in {}",
            self.kind, self.line, self.file
        )
    }
}

impl std::error::Error for RateLimitError {}

impl<T> From<T> for RateLimitError
where
    T: Into<RateLimitErrorKind>,
{
    #[track_caller]
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for rate limiting operations.
pub type RateLimitResult<T> = std::result::Result<T, RateLimitError>;
