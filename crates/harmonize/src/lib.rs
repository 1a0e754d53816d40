//! harmonize - command-line front end for harmonic analysis
//!
//! Reads notes (JSON) or chord symbols, runs the analysis engine with the
//! configured tunables, and prints the result as JSON.

pub mod config;
pub mod input;

pub use config::{ConfigError, ConfigSources, HarmonizeConfig, LoggingConfig};
pub use input::{parse_notes, read_notes, NoteDocument};

use anyhow::{Context, Result};
use harmonic_analysis::AnalysisResult;
use tracing_subscriber::EnvFilter;

/// Install the stderr subscriber.
///
/// `RUST_LOG` wins when set; otherwise `--verbose` means debug and the
/// configured level applies.
pub fn init_logging(logging: &LoggingConfig, verbose: bool) {
    let fallback = if verbose { "debug" } else { logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Render a result as JSON.
pub fn render(result: &AnalysisResult, pretty: bool) -> Result<String> {
    let text = if pretty {
        serde_json::to_string_pretty(result)
    } else {
        serde_json::to_string(result)
    };
    text.context("Failed to serialize analysis result")
}
