//! CLI command definitions.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tollgate::{AdmissionStrategy, EndpointOverrides};

/// Tollgate - rate-gated, throttle-retrying calls to quota-limited inference APIs
#[derive(Parser, Debug)]
#[command(name = "tollgate")]
#[command(about = "Rate-gated, throttle-retrying calls to quota-limited inference APIs", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Read configuration from this file only, skipping the layered defaults
    #[arg(long, global = true, env = "TOLLGATE_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List configured endpoints and their limits
    Profiles {
        /// Output format
        #[arg(long, default_value = "human")]
        format: OutputFormat,
    },

    /// Drive simulated calls through an endpoint's gate against a throttling fake provider
    Simulate {
        /// Endpoint profile to use (defaults to `default_endpoint`)
        #[arg(long)]
        endpoint: Option<String>,

        /// Number of concurrent calls
        #[arg(long, default_value = "6")]
        calls: u32,

        /// Requests the fake provider accepts per window before answering 429
        #[arg(long, default_value = "3")]
        provider_limit: u32,

        /// Fake provider's window in seconds
        #[arg(long, default_value = "60")]
        provider_window_secs: u64,

        /// Fail every Nth call with a non-throttling error
        #[arg(long)]
        fatal_every: Option<u32>,

        /// Fake provider latency in milliseconds
        #[arg(long, default_value = "0")]
        latency_ms: u64,

        #[command(flatten)]
        overrides: OverrideArgs,

        /// Output format
        #[arg(long, default_value = "human")]
        format: OutputFormat,
    },
}

/// Endpoint limit overrides
#[derive(clap::Args, Debug, Clone, Default)]
pub struct OverrideArgs {
    /// Admissions per window
    #[arg(long)]
    pub max_requests: Option<u32>,

    /// Window length in seconds
    #[arg(long)]
    pub window_secs: Option<u64>,

    /// Admission strategy (sliding_window or interval)
    #[arg(long)]
    pub strategy: Option<AdmissionStrategy>,

    /// Total attempts per call
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// First backoff delay in milliseconds
    #[arg(long)]
    pub initial_delay_ms: Option<u64>,

    /// Backoff growth factor
    #[arg(long)]
    pub backoff_multiplier: Option<f64>,

    /// Randomise backoff delays
    #[arg(long)]
    pub jitter: bool,
}

impl From<OverrideArgs> for EndpointOverrides {
    fn from(args: OverrideArgs) -> Self {
        Self {
            max_requests: args.max_requests,
            window_secs: args.window_secs,
            strategy: args.strategy,
            max_retries: args.max_retries,
            initial_delay_ms: args.initial_delay_ms,
            backoff_multiplier: args.backoff_multiplier,
            jitter: args.jitter,
        }
    }
}

/// Output format options
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum OutputFormat {
    /// Human-readable format
    Human,
    /// JSON format
    Json,
}
