//! Structured failures reported by remote inference calls.

/// Failure conditions reported by the layer that performs a remote call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum RemoteErrorKind {
    /// HTTP error with status code and message
    #[display("HTTP {} error: {}", status_code, message)]
    HttpStatus {
        /// HTTP status code
        status_code: u16,
        /// Error message
        message: String,
    },
    /// Provider reported an exhausted quota (e.g. `RESOURCE_EXHAUSTED`)
    #[display("Quota exhausted: {}", _0)]
    QuotaExhausted(String),
    /// Provider-specific rate-limit signature
    #[display("Rate limited: {}", _0)]
    RateLimited(String),
    /// Credentials missing or rejected
    #[display("Unauthorized: {}", _0)]
    Unauthorized(String),
    /// Transport failure unrelated to throttling
    #[display("Network error: {}", _0)]
    Network(String),
    /// Request rejected as malformed
    #[display("Invalid request: {}", _0)]
    InvalidRequest(String),
    /// Response could not be interpreted
    #[display("Invalid response: {}", _0)]
    InvalidResponse(String),
}

impl RemoteErrorKind {
    /// Check if this failure means the provider throttled the call.
    ///
    /// Only HTTP 429, quota exhaustion and explicit rate-limit signatures
    /// count. Server errors and network failures are not throttling.
    pub fn is_throttle(&self) -> bool {
        match self {
            RemoteErrorKind::HttpStatus { status_code, .. } => *status_code == 429,
            RemoteErrorKind::QuotaExhausted(_) | RemoteErrorKind::RateLimited(_) => true,
            _ => false,
        }
    }
}

/// Remote call error with source location tracking.
///
/// # Examples
///
/// ```
/// use tollgate_error::{RemoteError, RemoteErrorKind};
///
/// let err = RemoteError::new(RemoteErrorKind::Unauthorized("bad key".to_string()));
/// assert!(format!("{}", err).contains("bad key"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Remote Error: {} at line {} in {}", kind, line, file)]
pub struct RemoteError {
    /// The kind of error that occurred
    pub kind: RemoteErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl RemoteError {
    /// Create a new RemoteError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: RemoteErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> &RemoteErrorKind {
        &self.kind
    }
}

/// Trait for errors that can say whether they represent provider throttling.
///
/// Implement this on the error type of a remote-call layer so the retry
/// executor can classify failures structurally.
///
/// # Examples
///
/// ```
/// use tollgate_error::ThrottleSignal;
///
/// enum ClientError {
///     TooManyRequests,
///     BadApiKey,
/// }
///
/// impl ThrottleSignal for ClientError {
///     fn is_throttle(&self) -> bool {
///         matches!(self, ClientError::TooManyRequests)
///     }
/// }
///
/// assert!(ClientError::TooManyRequests.is_throttle());
/// assert!(!ClientError::BadApiKey.is_throttle());
/// ```
pub trait ThrottleSignal {
    /// Returns true if the provider rejected the call for rate or quota reasons.
    fn is_throttle(&self) -> bool;
}

impl ThrottleSignal for RemoteError {
    fn is_throttle(&self) -> bool {
        self.kind.is_throttle()
    }
}

impl ThrottleSignal for RemoteErrorKind {
    fn is_throttle(&self) -> bool {
        RemoteErrorKind::is_throttle(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_429_is_throttle() {
        let err = RemoteError::new(RemoteErrorKind::HttpStatus {
            status_code: 429,
            message: "Too many requests".to_string(),
        });
        assert!(err.is_throttle());
    }

    #[test]
    fn test_server_errors_are_not_throttle() {
        for status_code in [400, 401, 404, 500, 502, 503] {
            let kind = RemoteErrorKind::HttpStatus {
                status_code,
                message: "nope".to_string(),
            };
            assert!(!kind.is_throttle(), "{} should not be throttle", status_code);
        }
    }

    #[test]
    fn test_quota_and_rate_limit_signatures() {
        assert!(RemoteErrorKind::QuotaExhausted("RESOURCE_EXHAUSTED".to_string()).is_throttle());
        assert!(RemoteErrorKind::RateLimited("slow down".to_string()).is_throttle());
        assert!(!RemoteErrorKind::Network("connection reset".to_string()).is_throttle());
        assert!(!RemoteErrorKind::Unauthorized("bad key".to_string()).is_throttle());
    }

    #[test]
    fn test_location_is_captured() {
        let err = RemoteError::new(RemoteErrorKind::InvalidRequest("empty prompt".to_string()));
        assert!(err.file.ends_with("remote.rs"));
        assert!(err.line > 0);
    }
}
