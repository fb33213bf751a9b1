use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::paths::{PathSources, Paths};
use crate::pidfile::options::{PidFileOptions, SignalNameError, parse_signals};

/// Root configuration for pidguard.
///
/// Example:
/// ```toml
/// [pidfile]
/// dir = "/var/run"
/// signals = ["INT", "TERM"]
///
/// [logging]
/// level = "info"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// PID file location and policy.
    /// Example: [pidfile]
    pub pidfile: PidFileConfig,
    /// Log output.
    /// Example: [logging]
    pub logging: LoggingConfig,
}

/// PID file location and acquire/release policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PidFileConfig {
    /// Explicit PID file path, used verbatim. Takes precedence over `dir`.
    /// Example: path = "/var/run/mydaemon.pid"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Directory for `<program>.pid` (defaults to /var/run).
    /// Example: dir = "/var/run"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    /// Replace an existing PID file on startup.
    /// Example: overwrite_existing = false
    pub overwrite_existing: bool,
    /// Treat a missing or unreadable PID file as released.
    /// Example: overcome_adversity = false
    pub overcome_adversity: bool,
    /// Remove the PID file even when it records another process.
    /// Example: unlink_others = false
    pub unlink_others: bool,
    /// Signals that release the PID file and terminate.
    /// Example: signals = ["INT", "TERM"]
    pub signals: Vec<String>,
}

impl Default for PidFileConfig {
    fn default() -> Self {
        Self {
            path: None,
            dir: None,
            overwrite_existing: false,
            overcome_adversity: false,
            unlink_others: false,
            signals: vec!["INT".to_string(), "TERM".to_string()],
        }
    }
}

impl PidFileConfig {
    pub fn path_sources(&self) -> PathSources {
        PathSources {
            pid_file: self.path.clone(),
            pid_dir: self.dir.clone(),
            program_name: None,
        }
    }

    pub fn options(&self) -> Result<PidFileOptions, SignalNameError> {
        Ok(PidFileOptions {
            overwrite_existing: self.overwrite_existing,
            overcome_adversity: self.overcome_adversity,
            unlink_others: self.unlink_others,
            signals: parse_signals(&self.signals)?,
            exit_hook: true,
        })
    }
}

/// Log output configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    /// Example: level = "info"
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    /// Example: json = false
    pub json: bool,
    /// Optional log file, appended to in addition to stderr.
    /// Example: file = "/var/log/pidguard.log"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl Config {
    /// Load from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load from the platform config location (`PIDGUARD_CONFIG` override).
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load(&Paths::config_file())
    }
}
