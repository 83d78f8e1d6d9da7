//! Logging initialisation for the `tollgate` binary.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Filter used when `RUST_LOG` is unset (e.g., "info", "debug")
    pub default_level: String,
    /// Emit JSON lines instead of human-readable text
    pub json: bool,
}

impl LogConfig {
    /// Create a configuration with the given fallback level.
    pub fn new(default_level: impl Into<String>) -> Self {
        Self {
            default_level: default_level.into(),
            json: false,
        }
    }

    /// Enable JSON-formatted logs.
    pub fn with_json(mut self, enabled: bool) -> Self {
        self.json = enabled;
        self
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::new("info")
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `default_level`.
pub fn init_logging(config: &LogConfig) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.default_level))?;

    let registry = tracing_subscriber::registry().with(env_filter);

    if config.json {
        registry.with(fmt::layer().json()).try_init()?;
    } else {
        registry.with(fmt::layer().with_target(false)).try_init()?;
    }

    Ok(())
}
