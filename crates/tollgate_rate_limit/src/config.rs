//! Configuration structures for endpoint rate limits.
//!
//! This module provides TOML-based configuration for the gates and retry
//! policies guarding each remote endpoint. The configuration system supports:
//! - Bundled defaults (include_str! from tollgate.toml)
//! - User overrides (./tollgate.toml or ~/.config/tollgate/tollgate.toml)
//! - Environment overrides (`TOLLGATE__ENDPOINTS__GEMINI__MAX_REQUESTS=5`)
//! - Automatic merging with later sources taking precedence

use crate::{
    AdmissionGate, CallInterceptor, IntervalPacer, PatternClassifier, RateLimitErrorKind,
    RateLimitResult, RetryPolicy, WindowConfig,
};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tollgate_error::{ConfigError, TollgateError, TollgateResult};
use tracing::{debug, instrument};

/// How an endpoint admits calls.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Deserialize,
    Serialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AdmissionStrategy {
    /// At most `max_requests` in any trailing window; bursts allowed.
    #[default]
    SlidingWindow,
    /// Evenly spaced, one call per `window / max_requests`.
    Interval,
}

/// Retry settings for one endpoint.
///
/// # Example
///
/// ```toml
/// [endpoints.gemini.retry]
/// max_retries = 5
/// initial_delay_ms = 4000
/// backoff_multiplier = 2.0
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Total attempts per call
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay after the first throttled attempt, in milliseconds
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Growth factor between delays
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Randomise delays
    #[serde(default)]
    pub jitter: bool,
}

fn default_max_retries() -> u32 {
    5
}

fn default_initial_delay_ms() -> u64 {
    4000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: false,
        }
    }
}

impl RetryConfig {
    /// Validate into a [`RetryPolicy`].
    #[track_caller]
    pub fn policy(&self) -> RateLimitResult<RetryPolicy> {
        Ok(RetryPolicy::new(
            self.max_retries,
            Duration::from_millis(self.initial_delay_ms),
            self.backoff_multiplier,
        )?
        .with_jitter(self.jitter))
    }
}

/// Limits for one remote endpoint.
///
/// # Example
///
/// ```toml
/// [endpoints.gemini]
/// max_requests = 3
/// window_secs = 60
/// settle_margin_ms = 100
/// strategy = "sliding_window"
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EndpointConfig {
    /// Admissions allowed per window
    pub max_requests: u32,

    /// Window length in seconds
    pub window_secs: u64,

    /// How calls are admitted
    #[serde(default)]
    pub strategy: AdmissionStrategy,

    /// Extra margin added to each gate wait, in milliseconds
    #[serde(default)]
    pub settle_margin_ms: u64,

    /// Retry settings
    #[serde(default)]
    pub retry: RetryConfig,
}

impl EndpointConfig {
    /// Validate into a [`WindowConfig`].
    #[track_caller]
    pub fn window(&self) -> RateLimitResult<WindowConfig> {
        Ok(
            WindowConfig::new(self.max_requests, Duration::from_secs(self.window_secs))?
                .with_settle_margin(Duration::from_millis(self.settle_margin_ms)),
        )
    }

    /// Build an interceptor with a fresh admission source for this endpoint.
    #[track_caller]
    pub fn interceptor(&self) -> RateLimitResult<CallInterceptor<PatternClassifier>> {
        let window = self.window()?;
        let policy = self.retry.policy()?;
        Ok(match self.strategy {
            AdmissionStrategy::SlidingWindow => {
                CallInterceptor::with_gate(AdmissionGate::new(window), policy)
            }
            AdmissionStrategy::Interval => {
                CallInterceptor::with_gate(IntervalPacer::new(window), policy)
            }
        })
    }
}

/// Top-level Tollgate configuration.
///
/// # Example
///
/// ```no_run
/// use tollgate_rate_limit::TollgateConfig;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = TollgateConfig::load()?;
/// let gemini = config.endpoint(None)?;
/// println!("Gemini: {} requests per {}s", gemini.max_requests, gemini.window_secs);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
pub struct TollgateConfig {
    /// Endpoint used when none is named
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_endpoint: Option<String>,

    /// Map of endpoint name to limits
    #[serde(default)]
    pub endpoints: BTreeMap<String, EndpointConfig>,
}

impl TollgateConfig {
    /// Load configuration from a specific file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<std::path::Path>) -> TollgateResult<Self> {
        debug!("Loading configuration from file");

        Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .map_err(|e| {
                TollgateError::from(ConfigError::new(format!(
                    "Failed to read configuration from {}: {}",
                    path.as_ref().display(),
                    e
                )))
            })?
            .try_deserialize()
            .map_err(|e| {
                TollgateError::from(ConfigError::new(format!(
                    "Failed to parse configuration: {}",
                    e
                )))
            })
    }

    /// Load configuration with precedence: environment > current dir > home dir > bundled.
    ///
    /// User config files are optional and silently skipped if not found.
    #[instrument]
    pub fn load() -> TollgateResult<Self> {
        debug!("Loading configuration with precedence: env > current dir > home dir > bundled");

        const DEFAULT_CONFIG: &str = include_str!("../../../tollgate.toml");

        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".config/tollgate/tollgate.toml");
            builder = builder.add_source(File::from(home_config).required(false));
        }

        builder = builder
            .add_source(File::with_name("tollgate").required(false))
            .add_source(
                Environment::with_prefix("TOLLGATE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        builder
            .build()
            .map_err(|e| {
                TollgateError::from(ConfigError::new(format!(
                    "Failed to build configuration: {}",
                    e
                )))
            })?
            .try_deserialize()
            .map_err(|e| {
                TollgateError::from(ConfigError::new(format!(
                    "Failed to parse configuration: {}",
                    e
                )))
            })
    }

    /// Look up an endpoint, falling back to `default_endpoint` when `name` is None.
    #[instrument(skip(self))]
    pub fn endpoint(&self, name: Option<&str>) -> RateLimitResult<&EndpointConfig> {
        let name = match name.or(self.default_endpoint.as_deref()) {
            Some(name) => name,
            None => {
                return Err(RateLimitErrorKind::UnknownEndpoint(
                    "no endpoint named and no default_endpoint set".to_string(),
                )
                .into());
            }
        };
        debug!(endpoint = name, "Looking up endpoint configuration");
        self.endpoints
            .get(name)
            .ok_or_else(|| RateLimitErrorKind::UnknownEndpoint(name.to_string()).into())
    }

    /// Build an interceptor for a named endpoint.
    ///
    /// Each call creates a fresh admission source; clone the returned
    /// interceptor to share one gate between call sites.
    pub fn interceptor(
        &self,
        name: Option<&str>,
    ) -> RateLimitResult<CallInterceptor<PatternClassifier>> {
        self.endpoint(name)?.interceptor()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_names() {
        assert_eq!(AdmissionStrategy::SlidingWindow.to_string(), "sliding_window");
        assert_eq!(
            "interval".parse::<AdmissionStrategy>().unwrap(),
            AdmissionStrategy::Interval
        );
    }

    #[test]
    fn test_invalid_endpoint_fails_at_construction() {
        let endpoint = EndpointConfig {
            max_requests: 0,
            window_secs: 60,
            strategy: AdmissionStrategy::SlidingWindow,
            settle_margin_ms: 0,
            retry: RetryConfig::default(),
        };
        let err = endpoint.interceptor().unwrap_err();
        assert!(matches!(err.kind(), RateLimitErrorKind::InvalidWindow(_)));
    }

    #[test]
    fn test_missing_default_endpoint() {
        let config = TollgateConfig::default();
        let err = config.endpoint(None).unwrap_err();
        assert!(matches!(err.kind(), RateLimitErrorKind::UnknownEndpoint(_)));
    }
}
