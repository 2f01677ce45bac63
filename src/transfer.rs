//! External transfer-tool invocation.
//!
//! Command line: `<executable> <subcommand> [<positional>...] --<flag>...`.
//! Stdout is read line by line and split into progress events and passthrough
//! text; stderr is drained on its own thread and every line is logged as an
//! error. Failing to spawn the tool is the one fatal condition here.

pub mod progress;

use std::ffi::OsString;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::errors::StageMoveError;

pub use progress::{ProgressEvent, ProgressParser, RcloneProgressParser};

/// What one run of the transfer tool produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    /// None when the process was killed by a signal.
    pub exit_code: Option<i32>,
    /// Spawn to exit.
    pub duration: Duration,
    pub progress: Vec<ProgressEvent>,
}

impl TransferOutcome {
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Anything that can run a transfer-tool subcommand.
pub trait Transfer {
    fn invoke(&self, args: &[OsString]) -> Result<TransferOutcome, StageMoveError>;
}

impl<T: Transfer + ?Sized> Transfer for &T {
    fn invoke(&self, args: &[OsString]) -> Result<TransferOutcome, StageMoveError> {
        (**self).invoke(args)
    }
}

/// Render a configured flag as a long option. Text that already starts with
/// `--` is passed through untouched.
pub fn render_flag(flag: &str) -> String {
    if flag.starts_with("--") {
        flag.to_string()
    } else {
        format!("--{flag}")
    }
}

/// Arguments for moving one file into a destination directory.
pub fn move_args(src: &Path, dest_dir: &str) -> Vec<OsString> {
    vec![
        OsString::from("move"),
        src.as_os_str().to_os_string(),
        OsString::from(dest_dir),
    ]
}

/// Arguments for the destination connectivity check.
pub fn about_args(destination: &str) -> Vec<OsString> {
    vec![OsString::from("about"), OsString::from(destination)]
}

/// Runs the configured executable as a child process.
#[derive(Debug, Clone)]
pub struct TransferInvoker<P = RcloneProgressParser> {
    executable: String,
    flags: Vec<String>,
    parser: P,
}

impl TransferInvoker<RcloneProgressParser> {
    pub fn new(executable: impl Into<String>, flags: Vec<String>) -> Self {
        Self {
            executable: executable.into(),
            flags,
            parser: RcloneProgressParser::default(),
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.executable.clone(), cfg.flags.clone())
    }
}

impl<P: ProgressParser> TransferInvoker<P> {
    /// Swap the progress-line parser.
    pub fn with_parser<Q: ProgressParser>(self, parser: Q) -> TransferInvoker<Q> {
        TransferInvoker {
            executable: self.executable,
            flags: self.flags,
            parser,
        }
    }

    pub fn executable(&self) -> &str {
        &self.executable
    }

    /// Build the full command without running it.
    pub fn command(&self, args: &[OsString]) -> Command {
        let mut cmd = Command::new(&self.executable);
        cmd.args(args);
        cmd.args(self.flags.iter().map(|f| render_flag(f)));
        cmd
    }

    fn handle_stdout_line(&self, label: &str, line: &str, progress: &mut Vec<ProgressEvent>) {
        match self.parser.parse(line) {
            Some(ev) => {
                info!(
                    target_item = %label,
                    item = %ev.item,
                    fraction = %ev.fraction,
                    size = %ev.size,
                    elapsed = %ev.elapsed,
                    "Status"
                );
                progress.push(ev);
            }
            None => {
                let text = line.trim_end();
                if !text.is_empty() {
                    debug!(target_item = %label, output = %text, "transfer output");
                }
            }
        }
    }
}

impl<P: ProgressParser> Transfer for TransferInvoker<P> {
    fn invoke(&self, args: &[OsString]) -> Result<TransferOutcome, StageMoveError> {
        let mut cmd = self.command(args);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        debug!(command = ?cmd, "Running transfer tool");

        // The operand after the subcommand names what we're working on.
        let label = args
            .get(1)
            .map(|a| a.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.executable.clone());

        let started = Instant::now();
        let mut child = cmd.spawn().map_err(|source| StageMoveError::SpawnFailed {
            executable: self.executable.clone(),
            source,
        })?;

        let stderr_reader = child.stderr.take().map(|stderr| {
            let label = label.clone();
            thread::spawn(move || {
                for_each_line(stderr, |line| {
                    let text = line.trim_end();
                    if !text.is_empty() {
                        error!(target_item = %label, "{text}");
                    }
                })
            })
        });

        let mut progress = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            for_each_line(stdout, |line| self.handle_stdout_line(&label, line, &mut progress));
        }

        let exit_code = match child.wait() {
            Ok(status) => status.code(),
            Err(e) => {
                error!(error = %e, "Failed to collect transfer tool exit status");
                None
            }
        };
        if let Some(handle) = stderr_reader
            && handle.join().is_err()
        {
            warn!("stderr reader thread panicked");
        }

        let duration = started.elapsed();
        debug!(
            ?exit_code,
            elapsed_ms = duration.as_millis() as u64,
            events = progress.len(),
            "Transfer tool exited"
        );

        Ok(TransferOutcome {
            exit_code,
            duration,
            progress,
        })
    }
}

/// Run the destination health check; anything but exit code 0 is fatal.
pub fn check_destination<T: Transfer + ?Sized>(
    transfer: &T,
    destination: &str,
) -> Result<(), StageMoveError> {
    let outcome = transfer.invoke(&about_args(destination))?;
    if outcome.succeeded() {
        info!(destination, "Connected to backend");
        Ok(())
    } else {
        error!(destination, exit_code = ?outcome.exit_code, "Destination health check failed");
        Err(StageMoveError::HealthCheckFailed {
            destination: destination.to_string(),
            exit_code: outcome.exit_code,
        })
    }
}

/// Feed each newline-terminated chunk to `f`, decoding lossily so a stray
/// non-UTF-8 byte never stops the reader (which would stall the child).
fn for_each_line<R: Read>(reader: R, mut f: impl FnMut(&str)) {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => f(&String::from_utf8_lossy(&buf)),
            Err(e) => {
                warn!(error = %e, "Stopped reading transfer tool output");
                break;
            }
        }
    }
}
