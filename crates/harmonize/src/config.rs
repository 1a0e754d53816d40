//! Config file discovery, loading, and environment variable overlay.
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/harmonize/config.toml` (system)
//! 2. `~/.config/harmonize/config.toml` (user)
//! 3. `./harmonize.toml` (local), or the path given with `--config`
//! 4. Environment variables (`HARMONIZE_*`)
//!
//! Tables merge key by key, so a later file may override a single field.
//!
//! ```toml
//! [analysis]
//! large_leap_threshold = 5
//! modulation_window = 6
//!
//! [logging]
//! level = "info"
//! ```

use std::env;
use std::path::{Path, PathBuf};

use harmonic_analysis::AnalysisConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Complete harmonize configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HarmonizeConfig {
    #[serde(default)]
    pub analysis: AnalysisConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

impl HarmonizeConfig {
    /// Load from all standard locations plus the environment.
    ///
    /// An explicit `config_path` replaces the local `./harmonize.toml` and
    /// must exist.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let files = discover_config_files_with_override(config_path);
        let (mut config, mut sources) = load_files(&files)?;
        apply_env_overrides(&mut config, &mut sources);
        Ok((config, sources))
    }
}

/// Discover config files, optionally with a CLI override path.
///
/// Returns paths in load order (system, user, local/cli). Standard
/// locations are skipped when absent; the CLI path is always returned so a
/// typo surfaces as a read error.
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/harmonize/config.toml");
    if system.exists() {
        files.push(system);
    }

    // XDG_CONFIG_HOME or ~/.config
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("harmonize/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        files.push(path.to_path_buf());
        return files;
    }

    let local = PathBuf::from("harmonize.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Merge the given files in order and deserialize the result.
pub fn load_files(files: &[PathBuf]) -> Result<(HarmonizeConfig, ConfigSources), ConfigError> {
    let mut merged = toml::Table::new();
    let mut sources = ConfigSources::default();

    for path in files {
        let table = load_table(path)?;
        merge_tables(&mut merged, table);
        sources.files.push(path.clone());
    }

    let config = toml::Value::Table(merged)
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::Parse {
            path: sources.files.last().cloned().unwrap_or_default(),
            message: e.to_string(),
        })?;

    Ok((config, sources))
}

/// Read one file as a raw table, checking that it fits the config shape on its own.
fn load_table(path: &Path) -> Result<toml::Table, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    let parse_error = |e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    };
    toml::from_str::<HarmonizeConfig>(&contents).map_err(parse_error)?;
    contents.parse::<toml::Table>().map_err(parse_error)
}

/// Recursively overlay `overlay` onto `base`; non-table values replace.
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        if let toml::Value::Table(incoming) = value {
            if let Some(toml::Value::Table(existing)) = base.get_mut(&key) {
                merge_tables(existing, incoming);
                continue;
            }
            base.insert(key, toml::Value::Table(incoming));
        } else {
            base.insert(key, value);
        }
    }
}

/// Apply environment variable overrides to config.
pub fn apply_env_overrides(config: &mut HarmonizeConfig, sources: &mut ConfigSources) {
    apply_overrides_from(config, sources, |name| env::var(name).ok());
}

/// Apply overrides from any variable lookup. Unparseable values are ignored.
pub fn apply_overrides_from(
    config: &mut HarmonizeConfig,
    sources: &mut ConfigSources,
    lookup: impl Fn(&str) -> Option<String>,
) {
    // Analysis tunables
    if let Some(v) = lookup("HARMONIZE_LARGE_LEAP_THRESHOLD") {
        if let Ok(n) = v.trim().parse() {
            config.analysis.large_leap_threshold = n;
            sources.env_overrides.push("HARMONIZE_LARGE_LEAP_THRESHOLD".to_string());
        }
    }
    if let Some(v) = lookup("HARMONIZE_MODULATION_WINDOW") {
        if let Ok(n) = v.trim().parse() {
            config.analysis.modulation_window = n;
            sources.env_overrides.push("HARMONIZE_MODULATION_WINDOW".to_string());
        }
    }
    if let Some(v) = lookup("HARMONIZE_MODULATION_DEBOUNCE") {
        if let Ok(n) = v.trim().parse() {
            config.analysis.modulation_debounce = n;
            sources.env_overrides.push("HARMONIZE_MODULATION_DEBOUNCE".to_string());
        }
    }
    if let Some(v) = lookup("HARMONIZE_MODULATION_CONFIDENCE") {
        if let Ok(n) = v.trim().parse() {
            config.analysis.modulation_confidence = n;
            sources.env_overrides.push("HARMONIZE_MODULATION_CONFIDENCE".to_string());
        }
    }
    if let Some(v) = lookup("HARMONIZE_PHRASE_LENGTH") {
        if let Ok(n) = v.trim().parse() {
            config.analysis.phrase_length = n;
            sources.env_overrides.push("HARMONIZE_PHRASE_LENGTH".to_string());
        }
    }
    if let Some(v) = lookup("HARMONIZE_KEY_ALTERNATIVES") {
        if let Ok(n) = v.trim().parse() {
            config.analysis.key_alternatives = n;
            sources.env_overrides.push("HARMONIZE_KEY_ALTERNATIVES".to_string());
        }
    }
    if let Some(v) = lookup("HARMONIZE_MAX_PATTERNS") {
        if let Ok(n) = v.trim().parse() {
            config.analysis.max_patterns = n;
            sources.env_overrides.push("HARMONIZE_MAX_PATTERNS".to_string());
        }
    }
    if let Some(v) = lookup("HARMONIZE_MAX_PATTERN_LENGTH") {
        if let Ok(n) = v.trim().parse() {
            config.analysis.max_pattern_length = n;
            sources.env_overrides.push("HARMONIZE_MAX_PATTERN_LENGTH".to_string());
        }
    }
    if let Some(v) = lookup("HARMONIZE_CHORD_SYMBOL_OCTAVE") {
        if let Ok(n) = v.trim().parse() {
            config.analysis.chord_symbol_octave = n;
            sources.env_overrides.push("HARMONIZE_CHORD_SYMBOL_OCTAVE".to_string());
        }
    }

    // Logging
    if let Some(v) = lookup("HARMONIZE_LOG_LEVEL") {
        config.logging.level = v;
        sources.env_overrides.push("HARMONIZE_LOG_LEVEL".to_string());
    }
}
