//! Tollgate CLI binary.
//!
//! This binary provides command-line access to Tollgate's functionality:
//! - Inspect configured endpoint limits
//! - Simulate load against a throttling provider to tune gates and retries

use clap::Parser;
use std::time::Duration;
use tollgate::{LogConfig, init_logging};

mod cli;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use cli::{Cli, Commands, SimulationOptions, run_simulation, show_profiles};

    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    init_logging(&LogConfig::new(log_level).with_json(cli.json_logs))?;

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Profiles { format } => {
            show_profiles(config_path, format)?;
        }

        Commands::Simulate {
            endpoint,
            calls,
            provider_limit,
            provider_window_secs,
            fatal_every,
            latency_ms,
            overrides,
            format,
        } => {
            let options = SimulationOptions {
                endpoint,
                calls,
                provider_limit,
                provider_window: Duration::from_secs(provider_window_secs),
                fatal_every,
                latency: Duration::from_millis(latency_ms),
                overrides: overrides.into(),
                format,
            };
            run_simulation(config_path, options).await?;
        }
    }

    Ok(())
}
