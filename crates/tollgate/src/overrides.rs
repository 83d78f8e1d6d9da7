//! Command-line overrides for endpoint limits.

use tollgate_rate_limit::{AdmissionStrategy, EndpointConfig};

/// Per-field overrides applied on top of a configured endpoint.
///
/// Every field is optional; unset fields keep the configured value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EndpointOverrides {
    /// Admissions per window
    pub max_requests: Option<u32>,
    /// Window length in seconds
    pub window_secs: Option<u64>,
    /// Admission strategy
    pub strategy: Option<AdmissionStrategy>,
    /// Total attempts per call
    pub max_retries: Option<u32>,
    /// First backoff delay in milliseconds
    pub initial_delay_ms: Option<u64>,
    /// Backoff growth factor
    pub backoff_multiplier: Option<f64>,
    /// Force jitter on
    pub jitter: bool,
}

impl EndpointOverrides {
    /// Apply overrides to an endpoint configuration.
    ///
    /// Values are not validated here; validation happens when the endpoint
    /// is turned into an interceptor.
    pub fn apply_to_config(&self, mut config: EndpointConfig) -> EndpointConfig {
        if let Some(max_requests) = self.max_requests {
            config.max_requests = max_requests;
        }
        if let Some(window_secs) = self.window_secs {
            config.window_secs = window_secs;
        }
        if let Some(strategy) = self.strategy {
            config.strategy = strategy;
        }
        if let Some(max_retries) = self.max_retries {
            config.retry.max_retries = max_retries;
        }
        if let Some(initial_delay_ms) = self.initial_delay_ms {
            config.retry.initial_delay_ms = initial_delay_ms;
        }
        if let Some(multiplier) = self.backoff_multiplier {
            config.retry.backoff_multiplier = multiplier;
        }
        if self.jitter {
            config.retry.jitter = true;
        }
        config
    }
}
