//! Command-line interface module.
//!
//! This module provides the CLI structure and command handlers for the tollgate binary.

mod commands;
mod profiles;
mod simulate;

pub use commands::{Cli, Commands, OutputFormat};
pub use profiles::show_profiles;
pub use simulate::{SimulationOptions, run_simulation};

use std::path::Path;
use tollgate::{TollgateConfig, TollgateResult};

/// Load the layered configuration, or a single file when one is given.
fn load_config(path: Option<&Path>) -> TollgateResult<TollgateConfig> {
    match path {
        Some(path) => TollgateConfig::from_file(path),
        None => TollgateConfig::load(),
    }
}
