//! CLI definition and parsing.
//! Defines Args and provides parse() for command-line handling.
//!
//! Notes:
//! - Positional SOURCE and DESTINATION override the config file.
//! - --debug is a shorthand for --log-level debug and wins over it.
//! - --flag values are appended to whatever flag list is already in effect.

use clap::{Parser, ValueHint};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::types::{CleanupPolicy, Config, LogLevel};

/// Watch a staging directory and hand settled files to rclone.
/// CLI flags override config values (which are loaded from XML if present).
#[derive(Parser, Debug, Clone, Default)]
#[command(
    author,
    version,
    about = "Watch a staging directory and move settled files with rclone"
)]
pub struct Args {
    /// Staging directory to watch.
    #[arg(value_name = "SOURCE", value_hint = ValueHint::DirPath)]
    pub source: Option<PathBuf>,

    /// Destination prefix understood by the transfer tool (e.g. `gdrive:`).
    #[arg(value_name = "DESTINATION")]
    pub destination: Option<String>,

    /// Transfer tool executable (name on PATH or full path).
    #[arg(
        short = 'e',
        long,
        value_name = "PATH",
        value_hint = ValueHint::ExecutablePath,
        help = "Transfer tool executable (default: rclone)"
    )]
    pub executable: Option<String>,

    /// Extra flag for every transfer-tool call; rendered as `--<FLAG>`.
    #[arg(
        short = 'f',
        long = "flag",
        value_name = "FLAG",
        allow_hyphen_values = true,
        help = "Extra transfer-tool flag (repeatable), e.g. -f bwlimit=8M"
    )]
    pub flags: Vec<String>,

    /// Set log level. One of: quiet, warn, normal, info, debug.
    #[arg(short = 'l', long, help = "Set log level: quiet, warn, normal, info, debug")]
    pub log_level: Option<String>,

    /// Enable debug logging (equivalent to `--log-level debug`).
    #[arg(
        short = 'd',
        long,
        help = "Enable debug logging (shorthand for --log-level debug)"
    )]
    pub debug: bool,

    /// Seconds a file must stay unchanged before it is moved.
    #[arg(
        short = 'p',
        long,
        value_name = "SECONDS",
        help = "Stability window in seconds (default: 60)"
    )]
    pub polling: Option<u64>,

    /// Give up on a still-changing file after this many seconds (0 = never).
    #[arg(
        long,
        value_name = "SECONDS",
        help = "Abandon files still changing after this many seconds (0 = wait forever)"
    )]
    pub max_wait: Option<u64>,

    /// Queue files already under SOURCE before watching for new ones.
    #[arg(short = 's', long, help = "Process files already present at startup")]
    pub scan_existing: bool,

    /// When to remove empty directories from SOURCE.
    #[arg(long, value_enum, value_name = "POLICY")]
    pub cleanup: Option<CleanupPolicy>,

    /// Append logs to this file as well as stdout.
    #[arg(long, value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub log_file: Option<PathBuf>,

    /// Emit logs in structured JSON (includes timestamp, level, and structured fields).
    #[arg(long, help = "Emit logs in structured JSON")]
    pub json: bool,

    /// Print where stage_move will look for the config file (or STAGE_MOVE_CONFIG if set), then exit.
    #[arg(long, help = "Print the config file location used by stage_move and exit")]
    pub print_config: bool,
}

impl Args {
    /// Effective log level derived from flags.
    /// Precedence: --debug > --log-level value > None (use config default).
    pub fn effective_log_level(&self) -> Option<LogLevel> {
        if self.debug {
            return Some(LogLevel::Debug);
        }
        self.log_level.as_deref().and_then(LogLevel::parse)
    }

    /// Apply CLI overrides to a loaded Config (in-place). No-ops for unset flags.
    pub fn apply_overrides(&self, cfg: &mut Config) {
        if let Some(src) = &self.source {
            cfg.source_root = src.clone();
        }
        if let Some(dest) = &self.destination {
            cfg.destination = dest.clone();
        }
        if let Some(exe) = &self.executable {
            cfg.executable = exe.clone();
        }
        cfg.flags.extend(self.flags.iter().cloned());
        if let Some(secs) = self.polling {
            cfg.polling_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = self.max_wait {
            cfg.max_wait = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if self.scan_existing {
            cfg.scan_existing = true;
        }
        if let Some(policy) = self.cleanup {
            cfg.cleanup = policy;
        }
        if let Some(level) = self.effective_log_level() {
            cfg.log_level = level;
        }
        if let Some(lf) = &self.log_file {
            cfg.log_file = Some(lf.clone());
        }
    }
}

pub fn parse() -> Args {
    Args::parse()
}
