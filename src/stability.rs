//! Write-completion detection by polling.
//!
//! There is no portable "writer closed the file" signal, so a file counts as
//! finished once two samples taken one polling interval apart are identical.
//! The loop is unbounded unless a maximum wait is configured: a file that keeps
//! growing is never handed on early.

use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::shutdown;
use crate::stat::{FileStat, SampleError, StatSampler};

/// Result of waiting on a candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stability {
    /// Two consecutive samples matched; carries the last one.
    Stable(FileStat),
    /// The file disappeared while being watched.
    Vanished,
    /// The file could not be stat'd for another reason.
    Unreadable,
    /// Still changing when the maximum wait ran out.
    TimedOut,
    /// Shutdown was requested mid-wait.
    Interrupted,
}

impl Stability {
    pub fn is_stable(&self) -> bool {
        matches!(self, Stability::Stable(_))
    }
}

#[derive(Debug, Clone)]
pub struct StabilityDetector<S> {
    sampler: S,
    interval: Duration,
    max_wait: Option<Duration>,
}

impl<S: StatSampler> StabilityDetector<S> {
    pub fn new(sampler: S, interval: Duration) -> Self {
        Self {
            sampler,
            interval,
            max_wait: None,
        }
    }

    /// Give up on files still changing after `max_wait` (None = never give up).
    pub fn with_max_wait(mut self, max_wait: Option<Duration>) -> Self {
        self.max_wait = max_wait;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn sampler(&self) -> &S {
        &self.sampler
    }

    /// True once the file has stopped changing; false if it vanished, could
    /// not be stat'd, timed out, or shutdown was requested.
    pub fn wait_until_stable(&self, path: &Path) -> bool {
        self.check(path).is_stable()
    }

    /// Sample, sleep one interval, sample again; repeat until the pair matches
    /// or a sample fails.
    pub fn check(&self, path: &Path) -> Stability {
        info!(path = %path.display(), "Monitoring");
        let started = Instant::now();

        loop {
            let first = match self.sample(path) {
                Ok(s) => s,
                Err(outcome) => return outcome,
            };

            if !shutdown::sleep(self.interval) {
                debug!(path = %path.display(), "Stability wait interrupted");
                return Stability::Interrupted;
            }

            let second = match self.sample(path) {
                Ok(s) => s,
                Err(outcome) => return outcome,
            };

            if first == second {
                debug!(
                    path = %path.display(),
                    "File unchanged during polling window, assuming it is in a steady state"
                );
                return Stability::Stable(second);
            }

            debug!(
                path = %path.display(),
                before = first.size,
                after = second.size,
                "File still changing"
            );

            if let Some(limit) = self.max_wait
                && started.elapsed() >= limit
            {
                warn!(
                    path = %path.display(),
                    waited_secs = started.elapsed().as_secs(),
                    "File still changing after maximum wait; giving up"
                );
                return Stability::TimedOut;
            }
        }
    }

    fn sample(&self, path: &Path) -> Result<FileStat, Stability> {
        self.sampler.sample(path).map_err(|e| match e {
            SampleError::Vanished(_) => {
                warn!(path = %path.display(), "Vanished!");
                Stability::Vanished
            }
            SampleError::Stat { source, .. } => {
                warn!(path = %path.display(), error = %source, "Unable to stat file");
                Stability::Unreadable
            }
        })
    }
}
