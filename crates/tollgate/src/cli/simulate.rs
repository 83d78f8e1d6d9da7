//! `tollgate simulate` handler.

use super::{OutputFormat, load_config};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tollgate::{EndpointOverrides, SignalClassifier, SimulatedProvider, simulate};
use tracing::info;

/// Options for a simulation run.
#[derive(Debug)]
pub struct SimulationOptions {
    pub endpoint: Option<String>,
    pub calls: u32,
    pub provider_limit: u32,
    pub provider_window: Duration,
    pub fatal_every: Option<u32>,
    pub latency: Duration,
    pub overrides: EndpointOverrides,
    pub format: OutputFormat,
}

/// Build the endpoint's interceptor and drive simulated calls through it.
pub async fn run_simulation(
    config_path: Option<&Path>,
    options: SimulationOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let endpoint = options
        .overrides
        .apply_to_config(config.endpoint(options.endpoint.as_deref())?.clone());

    info!(
        max_requests = endpoint.max_requests,
        window_secs = endpoint.window_secs,
        strategy = %endpoint.strategy,
        calls = options.calls,
        "Starting simulation"
    );

    let interceptor = endpoint.interceptor()?.with_classifier(SignalClassifier);
    let provider = SimulatedProvider::new(options.provider_limit, options.provider_window)?
        .with_fatal_every(options.fatal_every)
        .with_latency(options.latency);

    let summary = simulate(interceptor, Arc::new(provider), options.calls).await;

    match options.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Human => {
            for call in &summary.calls {
                println!(
                    "#{:<3} {:<17} attempts={} gate_wait={}ms elapsed={}ms  {}",
                    call.index,
                    call.outcome.to_string(),
                    call.attempts,
                    call.gate_wait_ms,
                    call.elapsed_ms,
                    call.detail
                );
            }
            println!(
                "\n{} ok, {} fatal, {} retries exhausted, {} provider 429s in {}ms",
                summary.succeeded,
                summary.fatal,
                summary.exhausted,
                summary.provider_rejections,
                summary.elapsed_ms
            );
        }
    }

    Ok(())
}
