//! harmonize - harmonic analysis from the command line
//!
//! Subcommands:
//! - `harmonize notes <file|->` - Analyze timed notes from JSON
//! - `harmonize chords <symbol>...` - Analyze a chord progression
//! - `harmonize config` - Print the effective configuration

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use harmonic_analysis::{AnalysisEngine, AnalysisOptions, AnalysisResult};
use harmonize::{init_logging, read_notes, render, HarmonizeConfig};
use tracing::{debug, warn};

#[derive(Parser)]
#[command(name = "harmonize")]
#[command(about = "Key, chord, cadence, modulation and form analysis")]
#[command(version)]
struct Cli {
    /// Config file (replaces ./harmonize.toml)
    #[arg(long, global = true, env = "HARMONIZE_CONFIG")]
    config: Option<PathBuf>,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze timed notes from a JSON file, or stdin with `-`
    Notes {
        #[arg(default_value = "-")]
        input: PathBuf,

        #[command(flatten)]
        analysis: AnalysisArgs,
    },

    /// Analyze a chord progression, one time unit per chord
    Chords {
        /// Chord symbols (e.g. Dm7 G7 Cmaj7)
        #[arg(required = true)]
        symbols: Vec<String>,

        #[command(flatten)]
        analysis: AnalysisArgs,
    },

    /// Print the effective configuration as TOML
    Config {
        /// Also list the files and environment variables that were applied
        #[arg(long)]
        sources: bool,
    },
}

#[derive(Args)]
struct AnalysisArgs {
    /// Key context such as C, Am or F#; detected when omitted
    #[arg(short, long)]
    key: Option<String>,

    /// Phrase-end indices into the harmonic stream, comma separated.
    /// Consecutive repeats of a chord count as one entry.
    #[arg(short, long, value_delimiter = ',')]
    boundaries: Option<Vec<usize>>,

    /// Pretty-print the JSON result
    #[arg(short, long)]
    pretty: bool,
}

impl AnalysisArgs {
    fn options(&self) -> AnalysisOptions {
        AnalysisOptions {
            key: self.key.clone(),
            phrase_boundaries: self.boundaries.clone(),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, sources) = HarmonizeConfig::load_with_sources_from(cli.config.as_deref())
        .context("Failed to load configuration")?;
    init_logging(&config.logging, cli.verbose);
    debug!(files = ?sources.files, env = ?sources.env_overrides, "configuration loaded");

    match cli.command {
        Commands::Notes { input, analysis } => {
            let notes = read_notes(&input)?;
            let engine = AnalysisEngine::new(config.analysis);
            let result = engine
                .analyze_notes(&notes, &analysis.options())
                .context("Invalid note input")?;
            emit(&result, analysis.pretty)?;
        }
        Commands::Chords { symbols, analysis } => {
            let engine = AnalysisEngine::new(config.analysis);
            let result = engine.analyze_chord_symbols(&symbols, &analysis.options());
            emit(&result, analysis.pretty)?;
        }
        Commands::Config { sources: show_sources } => {
            if show_sources {
                for file in &sources.files {
                    eprintln!("# file: {}", file.display());
                }
                for var in &sources.env_overrides {
                    eprintln!("# env: {var}");
                }
            }
            let text = toml::to_string(&config).context("Failed to serialize configuration")?;
            print!("{text}");
        }
    }

    Ok(())
}

fn emit(result: &AnalysisResult, pretty: bool) -> Result<()> {
    for diagnostic in &result.diagnostics {
        warn!(kind = ?diagnostic.kind, input = %diagnostic.input, "{}", diagnostic.message);
    }
    println!("{}", render(result, pretty)?);
    Ok(())
}
