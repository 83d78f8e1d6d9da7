//! `tollgate profiles` handler.

use super::{OutputFormat, load_config};
use std::path::Path;

/// Print every configured endpoint.
pub fn show_profiles(
    config_path: Option<&Path>,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        OutputFormat::Human => {
            for (name, endpoint) in &config.endpoints {
                let marker = if config.default_endpoint.as_deref() == Some(name.as_str()) {
                    " (default)"
                } else {
                    ""
                };
                println!("{}{}", name, marker);
                println!(
                    "  {} requests / {}s, {}",
                    endpoint.max_requests, endpoint.window_secs, endpoint.strategy
                );
                println!(
                    "  retry: {} attempts, {}ms x{}{}",
                    endpoint.retry.max_retries,
                    endpoint.retry.initial_delay_ms,
                    endpoint.retry.backoff_multiplier,
                    if endpoint.retry.jitter { " with jitter" } else { "" }
                );
            }
        }
    }

    Ok(())
}
