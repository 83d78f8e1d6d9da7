//! Error types for the Tollgate library.
//!
//! This crate provides the foundation error types used throughout the Tollgate workspace.
//!
//! # Error Hierarchy
//!
//! All errors follow the `ErrorKind` + wrapper struct pattern:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - All errors use `#[track_caller]` for automatic location capture
//!
//! Remote-call layers attach a [`RemoteErrorKind`] to their failures so the
//! retry executor can tell throttling apart from everything else through
//! [`ThrottleSignal`] instead of matching on message text.
//!
//! # Examples
//!
//! ```
//! use tollgate_error::{RemoteError, RemoteErrorKind, ThrottleSignal};
//!
//! let err = RemoteError::new(RemoteErrorKind::HttpStatus {
//!     status_code: 429,
//!     message: "Too many requests".to_string(),
//! });
//! assert!(err.is_throttle());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod remote;

pub use config::ConfigError;
pub use error::{TollgateError, TollgateErrorKind, TollgateResult};
pub use remote::{RemoteError, RemoteErrorKind, ThrottleSignal};
