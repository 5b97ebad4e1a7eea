//! Configuration management for nvlv.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file (JSON)
//! 4. Default values

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cli::Args;
use crate::console::ConsoleOptions;
use crate::relay::{BootstrapPlan, Readiness, DEFAULT_URI};
use crate::session::InstanceId;

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub relay: RelaySection,
    pub console: ConsoleSection,
    pub bootstrap: BootstrapSection,
    pub logging: LoggingSection,
}

/// Relay configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaySection {
    /// Backend WebSocket endpoint.
    pub uri: String,
}

impl Default for RelaySection {
    fn default() -> Self {
        Self {
            uri: DEFAULT_URI.to_string(),
        }
    }
}

/// Console configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleSection {
    /// Namespace for persisted state.
    pub instance_id: String,
    /// File holding persisted state. In memory only when unset.
    pub state_file: Option<PathBuf>,
    /// History capacity. The persisted value is used when unset.
    pub hist_max: Option<usize>,
    /// Start with error catching on. The persisted value is used when unset.
    pub catch_errors: Option<bool>,
    /// Extra quick-pick snippets.
    pub snippets: Vec<String>,
}

impl Default for ConsoleSection {
    fn default() -> Self {
        Self {
            instance_id: InstanceId::GLOBAL.to_string(),
            state_file: None,
            hist_max: None,
            catch_errors: None,
            snippets: Vec::new(),
        }
    }
}

/// Session bootstrap section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapSection {
    /// Debug target started by the bootstrap.
    pub target: String,
    /// Breakpoint symbol.
    pub entry_symbol: String,
    pub readiness: Readiness,
    /// Grace delay for `delay` readiness, in milliseconds.
    pub grace_delay_ms: u64,
    /// Run the bootstrap at startup.
    pub auto_start: bool,
}

impl Default for BootstrapSection {
    fn default() -> Self {
        let plan = BootstrapPlan::default();
        Self {
            target: plan.target,
            entry_symbol: plan.entry_symbol,
            readiness: plan.readiness,
            grace_delay_ms: plan.grace_delay.as_millis() as u64,
            auto_start: false,
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level (error, warn, info, debug, trace) or a filter directive.
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: crate::logging::DEFAULT_FILTER.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_json::from_str(&content).map_err(ConfigError::Json)
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) {
        self.apply_vars(|name| std::env::var(name).ok());
    }

    /// Apply overrides from a variable lookup.
    pub fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(uri) = var("NVLV_URI") {
            self.relay.uri = uri;
        }

        if let Some(id) = var("NVLV_INSTANCE") {
            self.console.instance_id = id;
        }

        if let Some(path) = var("NVLV_STATE_FILE") {
            if !path.is_empty() {
                self.console.state_file = Some(PathBuf::from(path));
            }
        }

        if let Some(max) = var("NVLV_HIST_MAX") {
            if let Ok(max) = max.parse() {
                self.console.hist_max = Some(max);
            }
        }

        if let Some(level) = var("NVLV_LOG_LEVEL") {
            self.logging.level = level;
        } else if let Some(level) = var("RUST_LOG") {
            self.logging.level = level;
        }
    }

    /// Apply CLI argument overrides.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(ref uri) = args.uri {
            self.relay.uri = uri.clone();
        }

        if let Some(ref id) = args.instance_id {
            self.console.instance_id = id.clone();
        }

        if let Some(ref path) = args.state_file {
            self.console.state_file = Some(path.clone());
        }

        if args.catch_errors {
            self.console.catch_errors = Some(true);
        }

        if args.bootstrap {
            self.bootstrap.auto_start = true;
        }

        if let Some(ref level) = args.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Load configuration with full priority chain.
    ///
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(ref path) = args.config {
            config = Config::from_file(path)?;
        }

        config.apply_env();
        config.apply_args(args);

        Ok(config)
    }

    /// Convert to options for [`crate::Console`].
    pub fn to_console_options(&self) -> Result<ConsoleOptions, ConfigError> {
        let instance_id: InstanceId = self
            .console
            .instance_id
            .parse()
            .map_err(|_| ConfigError::InvalidInstance(self.console.instance_id.clone()))?;

        if self.console.hist_max == Some(0) {
            return Err(ConfigError::InvalidHistMax);
        }

        let mut options = ConsoleOptions {
            instance_id,
            uri: self.relay.uri.clone(),
            hist_max: self.console.hist_max,
            catch_errors: self.console.catch_errors,
            bootstrap: BootstrapPlan {
                target: self.bootstrap.target.clone(),
                entry_symbol: self.bootstrap.entry_symbol.clone(),
                readiness: self.bootstrap.readiness,
                grace_delay: Duration::from_millis(self.bootstrap.grace_delay_ms),
            },
            ..ConsoleOptions::default()
        };
        options.snippets.extend(self.console.snippets.iter().cloned());
        Ok(options)
    }

    /// Get the log level filter string.
    pub fn log_filter(&self) -> &str {
        &self.logging.level
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    Io(std::io::Error),
    /// JSON parsing error.
    Json(serde_json::Error),
    /// Instance id is not a short ASCII token.
    InvalidInstance(String),
    /// History capacity must be at least one.
    InvalidHistMax,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config file: {}", e),
            Self::Json(e) => write!(f, "failed to parse config file: {}", e),
            Self::InvalidInstance(id) => write!(f, "invalid instance id: {}", id),
            Self::InvalidHistMax => write!(f, "hist_max must be at least 1"),
        }
    }
}

impl std::error::Error for ConfigError {}
