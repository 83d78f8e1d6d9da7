//! Tests for endpoint configuration.

use std::io::Write;
use tempfile::Builder;
use tollgate_rate_limit::{AdmissionStrategy, RateLimitErrorKind, TollgateConfig};

#[test]
fn test_load_bundled_defaults() {
    let config = TollgateConfig::load().unwrap();

    assert_eq!(config.default_endpoint.as_deref(), Some("gemini"));

    let gemini = config.endpoint(None).unwrap();
    assert_eq!(gemini.max_requests, 3);
    assert_eq!(gemini.window_secs, 60);
    assert_eq!(gemini.settle_margin_ms, 100);
    assert_eq!(gemini.strategy, AdmissionStrategy::SlidingWindow);
    assert_eq!(gemini.retry.max_retries, 5);
    assert_eq!(gemini.retry.initial_delay_ms, 4000);
    assert_eq!(gemini.retry.backoff_multiplier, 2.0);
    assert!(!gemini.retry.jitter);

    let ollama = config.endpoint(Some("ollama")).unwrap();
    assert_eq!(ollama.strategy, AdmissionStrategy::Interval);
}

#[test]
fn test_interceptor_for_named_endpoint() {
    let config = TollgateConfig::load().unwrap();
    let interceptor = config.interceptor(Some("openrouter")).unwrap();
    assert_eq!(interceptor.policy().max_retries(), 4);
}

#[test]
fn test_unknown_endpoint() {
    let config = TollgateConfig::load().unwrap();
    let err = config.interceptor(Some("nonexistent")).unwrap_err();
    assert_eq!(
        err.kind(),
        &RateLimitErrorKind::UnknownEndpoint("nonexistent".to_string())
    );
}

#[test]
fn test_config_from_file() {
    let mut temp_file = Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        temp_file,
        r#"
default_endpoint = "custom"

[endpoints.custom]
max_requests = 42
window_secs = 10

[endpoints.custom.retry]
max_retries = 2
backoff_multiplier = 3.0
"#
    )
    .unwrap();

    let config = TollgateConfig::from_file(temp_file.path()).unwrap();
    let custom = config.endpoint(None).unwrap();

    assert_eq!(custom.max_requests, 42);
    assert_eq!(custom.window_secs, 10);
    assert_eq!(custom.strategy, AdmissionStrategy::SlidingWindow);
    assert_eq!(custom.settle_margin_ms, 0);
    assert_eq!(custom.retry.max_retries, 2);
    // unspecified fields fall back to defaults
    assert_eq!(custom.retry.initial_delay_ms, 4000);

    let policy = custom.retry.policy().unwrap();
    assert_eq!(policy.backoff_multiplier(), 3.0);
}

#[test]
fn test_invalid_values_rejected_at_construction() {
    let mut temp_file = Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        temp_file,
        r#"
[endpoints.broken]
max_requests = 5
window_secs = 60

[endpoints.broken.retry]
backoff_multiplier = 1.0
"#
    )
    .unwrap();

    let config = TollgateConfig::from_file(temp_file.path()).unwrap();
    let err = config.interceptor(Some("broken")).unwrap_err();
    assert!(matches!(err.kind(), RateLimitErrorKind::InvalidRetry(_)));
}

#[test]
fn test_missing_file_is_config_error() {
    let err = TollgateConfig::from_file("/nonexistent/tollgate.toml").unwrap_err();
    assert!(err.to_string().contains("Configuration Error"));
}
