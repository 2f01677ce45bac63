//! Configuration: defaults, XML loading and validation.
//!
//! Uses quick-xml + serde to parse a simple <config> XML file:
//! <config>
//!   <source>/mnt/staging</source>
//!   <destination>gdrive:</destination>
//!   <executable>rclone</executable>
//!   <flags><flag>progress</flag><flag>stats=10s</flag></flags>
//!   <polling_seconds>60</polling_seconds>
//!   <scan_existing>true</scan_existing>
//!   <cleanup>always</cleanup>
//!   <log_level>normal</log_level>
//!   <log_file>/path/to/stage_move.log</log_file>
//! </config>
//!
//! Precedence: built-in defaults < XML file < CLI flags.

pub mod paths;
pub mod types;
pub mod validate;
pub mod xml;

use std::time::Duration;

pub use types::{CleanupPolicy, Config, LogLevel};

/// Transfer tool looked up on PATH when nothing else is configured.
pub const EXECUTABLE_DEFAULT: &str = "rclone";

/// Seconds a file must stay unchanged before it is moved.
pub const POLLING_DEFAULT: Duration = Duration::from_secs(60);

/// Flags always passed to the transfer tool unless the XML file supplies its own list.
pub const FLAGS_DEFAULT: &[&str] = &["progress", "stats=10s", "no-traverse"];

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "STAGE_MOVE_CONFIG";
