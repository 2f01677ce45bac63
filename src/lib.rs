//! Core library for `stage_move`.
//!
//! Watches a staging directory, waits for each new file to stop changing,
//! hands it to an external transfer tool (rclone) for relocation and then
//! prunes directories the move left empty.
//!
//! The pieces are small and composable: `Config` carries every setting,
//! `StabilityDetector` decides when a file has settled, `TransferInvoker`
//! runs the tool, `CleanupSweeper` prunes, and `MoveOrchestrator` ties them
//! together for one file. `Pipeline` feeds candidates from the `watch`
//! adapter to the orchestrator one at a time.

pub mod cli;
pub mod config;
pub mod errors;
pub mod orchestrator;
pub mod output;
pub mod pipeline;
pub mod platform;
pub mod shutdown;
pub mod stability;
pub mod stat;
pub mod sweep;
pub mod transfer;
pub mod watch;

pub use config::paths::{default_config_path, default_log_path, path_has_symlink_ancestor};
pub use config::validate::validate_and_normalize;
pub use config::xml::{load_config, load_config_from_xml_path};
pub use config::{CleanupPolicy, Config, LogLevel};
pub use errors::StageMoveError;
pub use orchestrator::{MoveOrchestrator, MoveOutcome};
pub use pipeline::{CandidateQueue, Pipeline};
pub use stability::{Stability, StabilityDetector};
pub use stat::{FileStat, FsSampler, SampleError, StatSampler};
pub use sweep::CleanupSweeper;
pub use transfer::{check_destination, Transfer, TransferInvoker, TransferOutcome};
pub use watch::{WatchBridge, WatchEvent};
