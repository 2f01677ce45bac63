//! Tracing initialization.
//!
//! One registry, one EnvFilter derived from LogLevel (RUST_LOG is not
//! consulted), a stdout layer and an optional non-blocking file layer. Both
//! sinks share the compact or JSON format chosen by `--json`. The watcher
//! backend's own chatter is capped at WARN.

use anyhow::Result;
use chrono::Local;
use stage_move::output as out;
use stage_move::platform::open_log_file_secure_append;
use stage_move::{default_log_path, path_has_symlink_ancestor, LogLevel};
use std::fmt as stdfmt;
use std::path::Path;
use tracing::Subscriber;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::fmt as tsfmt;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

/// Local wall-clock timestamps as DD/MM/YY HH:MM:SS.
struct LocalHumanTime;

impl FormatTime for LocalHumanTime {
    fn format_time(&self, w: &mut tsfmt::format::Writer<'_>) -> stdfmt::Result {
        write!(w, "{}", Local::now().format("%d/%m/%y %H:%M:%S"))
    }
}

fn to_level_filter(lvl: &LogLevel) -> LevelFilter {
    match lvl {
        LogLevel::Quiet => LevelFilter::ERROR,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Normal => LevelFilter::INFO,
        LogLevel::Info => LevelFilter::DEBUG,
        LogLevel::Debug => LevelFilter::TRACE,
    }
}

fn env_filter_for(level: LevelFilter) -> EnvFilter {
    // LevelFilter's Display gives the lowercase directive ("info", "off", ...).
    let notify_level = level.min(LevelFilter::WARN);
    EnvFilter::new(format!("{level},notify={notify_level}"))
}

/// Formatting layer for one sink. Files get targets and never get colour codes.
fn fmt_layer<S, W>(writer: W, json: bool, to_file: bool) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    if json {
        tsfmt::layer()
            .json()
            .with_timer(LocalHumanTime)
            .with_level(true)
            .with_target(true)
            .with_ansi(false)
            .with_writer(writer)
            .boxed()
    } else {
        tsfmt::layer()
            .with_timer(LocalHumanTime)
            .with_level(true)
            .with_target(to_file)
            .with_ansi(!to_file)
            .compact()
            .with_writer(writer)
            .boxed()
    }
}

/// Open `path` for non-blocking appends, or explain on stderr why not.
/// Paths under a symlinked directory are refused.
fn open_file_sink(path: &Path) -> Option<(NonBlocking, WorkerGuard)> {
    let refusal = match path_has_symlink_ancestor(path) {
        Ok(false) => None,
        Ok(true) => Some("an ancestor directory is a symlink".to_string()),
        Err(e) => Some(format!("could not inspect its ancestors: {e}")),
    };
    if let Some(why) = refusal {
        eprintln!("Refusing file logging to {}: {why}", path.display());
        return None;
    }

    match open_log_file_secure_append(path) {
        Ok(file) => Some(tracing_appender::non_blocking(file)),
        Err(e) => {
            eprintln!("Failed to open log file {}: {e}", path.display());
            None
        }
    }
}

/// Install the global subscriber. The returned guard (present only when a
/// file sink is active) must be held until shutdown so buffered lines are flushed.
pub fn init_tracing(
    lvl: &LogLevel,
    log_file: Option<&Path>,
    json: bool,
) -> Result<Option<WorkerGuard>> {
    let sink = log_file.and_then(open_file_sink);
    if sink.is_none()
        && let Some(path) = log_file
    {
        out::print_warn(&format!(
            "File logging to '{}' is disabled; logs go to stdout only. Check that the directory is writable and not reached through a symlink.",
            path.display()
        ));
        if let Ok(def) = default_log_path() {
            out::print_info(&format!("The default log path is: {}", def.display()));
        }
    }

    let (file_layer, guard) = match sink {
        Some((writer, guard)) => (Some(fmt_layer(writer, json, true)), Some(guard)),
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter_for(to_level_filter(lvl)))
        .with(fmt_layer(std::io::stdout, json, false))
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}
