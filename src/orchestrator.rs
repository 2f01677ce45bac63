//! Per-candidate move coordination.
//!
//! DETECTED -> STABILITY_CHECK -> (STABLE -> TRANSFERRING -> DONE)
//!                             | (UNSTABLE_OR_VANISHED -> ABANDONED)
//!
//! The destination directory mirrors the file's place under the source root:
//! the source prefix of its parent directory is replaced by the destination
//! prefix and a trailing separator is appended.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::{CleanupPolicy, Config};
use crate::errors::StageMoveError;
use crate::stability::{Stability, StabilityDetector};
use crate::stat::StatSampler;
use crate::sweep::CleanupSweeper;
use crate::transfer::{move_args, Transfer};

/// How a single candidate ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Not a regular file under the source root.
    Ignored,
    /// Never became stable (vanished, unreadable, timed out, interrupted).
    Abandoned(Stability),
    Moved {
        src: PathBuf,
        dest_dir: String,
        bytes: u64,
        elapsed: Duration,
    },
    /// The transfer tool exited non-zero (or was killed).
    Failed {
        src: PathBuf,
        dest_dir: String,
        exit_code: Option<i32>,
    },
}

#[derive(Debug)]
pub struct MoveOrchestrator<T, S> {
    source_root: PathBuf,
    destination: String,
    cleanup: CleanupPolicy,
    detector: StabilityDetector<S>,
    transfer: T,
    sweeper: CleanupSweeper,
}

impl<T: Transfer, S: StatSampler> MoveOrchestrator<T, S> {
    pub fn new(cfg: &Config, transfer: T, sampler: S) -> Self {
        Self {
            source_root: cfg.source_root.clone(),
            destination: cfg.destination.clone(),
            cleanup: cfg.cleanup,
            detector: StabilityDetector::new(sampler, cfg.polling_interval)
                .with_max_wait(cfg.max_wait),
            transfer,
            sweeper: CleanupSweeper::new(cfg.source_root.clone()),
        }
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    /// Drive one candidate through stability check, transfer and cleanup.
    ///
    /// Only a transfer-tool spawn failure is returned as an error; every other
    /// problem is logged and reported through `MoveOutcome`.
    pub fn handle(&self, path: &Path) -> Result<MoveOutcome, StageMoveError> {
        match fs::symlink_metadata(path) {
            Ok(meta) if meta.file_type().is_file() => {}
            Ok(_) => {
                debug!(path = %path.display(), "Ignoring non-file candidate");
                return Ok(MoveOutcome::Ignored);
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Candidate already gone");
                return Ok(MoveOutcome::Ignored);
            }
        }

        let Some(dest_dir) = destination_dir(&self.source_root, &self.destination, path) else {
            warn!(
                path = %path.display(),
                source = %self.source_root.display(),
                "Candidate is outside the source root; ignoring"
            );
            return Ok(MoveOutcome::Ignored);
        };

        info!(path = %path.display(), "Detected");

        let stat = match self.detector.check(path) {
            Stability::Stable(stat) => stat,
            other => {
                debug!(path = %path.display(), outcome = ?other, "Abandoning candidate");
                return Ok(MoveOutcome::Abandoned(other));
            }
        };

        info!(src = %path.display(), dest = %dest_dir, "Moving");
        let started = Instant::now();
        let outcome = self.transfer.invoke(&move_args(path, &dest_dir))?;
        let elapsed = started.elapsed();

        let result = if outcome.succeeded() {
            info!(
                src = %path.display(),
                dest = %dest_dir,
                bytes = stat.size,
                "{}",
                completion_summary(path, &dest_dir, stat.size, elapsed)
            );
            MoveOutcome::Moved {
                src: path.to_path_buf(),
                dest_dir,
                bytes: stat.size,
                elapsed,
            }
        } else {
            warn!(
                src = %path.display(),
                dest = %dest_dir,
                exit_code = ?outcome.exit_code,
                "Transfer failed"
            );
            MoveOutcome::Failed {
                src: path.to_path_buf(),
                dest_dir,
                exit_code: outcome.exit_code,
            }
        };

        if self.cleanup.should_sweep(outcome.succeeded()) {
            self.sweeper.sweep_root();
        } else {
            debug!(policy = ?self.cleanup, "Skipping cleanup after failed transfer");
        }

        Ok(result)
    }
}

/// Destination directory for `file`: its parent with the source-root prefix
/// replaced by `destination`, plus a trailing '/'. None if `file` is not
/// under `source_root`.
///
/// `/staging` + `/remote:` + `/staging/a/b/file.mkv` -> `/remote:/a/b/`
pub fn destination_dir(source_root: &Path, destination: &str, file: &Path) -> Option<String> {
    let parent = file.parent()?;
    let rel = parent.strip_prefix(source_root).ok()?;

    let mut out = destination.trim_end_matches('/').to_string();
    out.push('/');
    for comp in rel.components() {
        match comp {
            Component::Normal(seg) => {
                out.push_str(&seg.to_string_lossy());
                out.push('/');
            }
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(out)
}

/// Whole hours, minutes and seconds in `d`.
pub fn hms(d: Duration) -> (u64, u64, u64) {
    let secs = d.as_secs();
    (secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Decimal megabits per second; None when no time has elapsed.
pub fn rate_mbits(bytes: u64, elapsed: Duration) -> Option<f64> {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return None;
    }
    Some((bytes as f64 * 8.0 / 1_000_000.0) / secs)
}

pub fn completion_summary(src: &Path, dest: &str, bytes: u64, elapsed: Duration) -> String {
    let (h, m, s) = hms(elapsed);
    let rate = rate_mbits(bytes, elapsed)
        .map(|r| format!("{r:.2}mbps"))
        .unwrap_or_else(|| "n/a".into());
    format!(
        "Finished: \"{}\" moved to \"{}\" in {} hours, {} minutes, and {} seconds ({})",
        src.display(),
        dest,
        h,
        m,
        s,
        rate
    )
}
