//! Core configuration types.
//! - Config holds runtime settings with sensible defaults.
//! - LogLevel represents verbosity with simple parsing helpers.
//! - CleanupPolicy decides when the source tree is swept after a transfer.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use super::{EXECUTABLE_DEFAULT, FLAGS_DEFAULT, POLLING_DEFAULT};

/// Program-defined verbosity levels exposed to users/config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Only errors
    Quiet,
    /// Warnings and errors
    Warn,
    /// Informational output (default)
    #[default]
    Normal,
    /// More info (like verbose)
    Info,
    /// Debug/trace
    Debug,
}

impl LogLevel {
    /// Parse common string names into our LogLevel (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quiet" | "error" | "critical" | "none" => Some(LogLevel::Quiet),
            "warn" | "warning" => Some(LogLevel::Warn),
            "normal" => Some(LogLevel::Normal),
            "info" | "verbose" | "detailed" => Some(LogLevel::Info),
            "debug" | "trace" => Some(LogLevel::Debug),
            _ => None,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Quiet => "quiet",
            LogLevel::Warn => "warn",
            LogLevel::Normal => "normal",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        };
        f.write_str(s)
    }
}

impl FromStr for LogLevel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("invalid log level: '{s}'"))
    }
}

/// When to sweep empty directories out of the source root after a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum CleanupPolicy {
    /// After every transfer attempt, whatever the exit status.
    #[default]
    Always,
    /// Only after the transfer tool exits with status 0.
    OnSuccess,
}

impl CleanupPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "on_success" | "success" => Some(CleanupPolicy::OnSuccess),
            "always" => Some(CleanupPolicy::Always),
            _ => None,
        }
    }

    /// Should a sweep follow a transfer that ended this way?
    pub fn should_sweep(self, transfer_succeeded: bool) -> bool {
        match self {
            CleanupPolicy::OnSuccess => transfer_succeeded,
            CleanupPolicy::Always => true,
        }
    }
}

impl FromStr for CleanupPolicy {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("invalid cleanup policy: '{s}'"))
    }
}

/// Runtime configuration shared (read-only) by every component.
#[derive(Debug, Clone)]
pub struct Config {
    /// Staging directory the producer writes into
    pub source_root: PathBuf,
    /// Transfer-tool destination prefix (e.g. "gdrive:" or "/mnt/remote")
    pub destination: String,
    /// Transfer tool executable (name on PATH or full path)
    pub executable: String,
    /// Flags appended to every invocation, rendered as `--<flag>`
    pub flags: Vec<String>,
    /// Stability window
    pub polling_interval: Duration,
    /// Give up on a file that is still changing after this long (None = wait forever)
    pub max_wait: Option<Duration>,
    /// Feed files already present under the source root before watching
    pub scan_existing: bool,
    pub cleanup: CleanupPolicy,
    /// Console verbosity
    pub log_level: LogLevel,
    /// Optional path to a log file
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_root: PathBuf::new(),
            destination: String::new(),
            executable: EXECUTABLE_DEFAULT.to_string(),
            flags: FLAGS_DEFAULT.iter().map(|f| f.to_string()).collect(),
            polling_interval: POLLING_DEFAULT,
            max_wait: None,
            scan_existing: false,
            cleanup: CleanupPolicy::default(),
            log_level: LogLevel::Normal,
            log_file: None,
        }
    }
}

impl Config {
    /// Construct a Config with explicit source and destination; other fields use defaults.
    pub fn new(source_root: impl Into<PathBuf>, destination: impl Into<String>) -> Self {
        Self {
            source_root: source_root.into(),
            destination: destination.into(),
            ..Default::default()
        }
    }
}
