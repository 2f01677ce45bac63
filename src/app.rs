//! Application orchestrator.
//! Loads/merges config, initializes logging, installs the signal handler,
//! validates paths, checks the destination and then runs the watch loop
//! until interrupted or a fatal error occurs.

use anyhow::{Context, Result};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info};

use stage_move::cli::Args;
use stage_move::config::CONFIG_ENV;
use stage_move::errors::config_error;
use stage_move::output as out;
use stage_move::watch::{self, WatchBridge};
use stage_move::{
    check_destination, default_config_path, load_config, shutdown, validate_and_normalize,
    Config, FsSampler, MoveOrchestrator, Pipeline, StageMoveError, TransferInvoker,
};

use crate::logging::init_tracing;

/// Run the CLI application.
pub fn run(args: Args) -> Result<()> {
    // Handle --print-config before logging init
    if args.print_config {
        print_config_location();
        return Ok(());
    }

    // Defaults < XML file < CLI
    let mut cfg = load_config().map_err(config_error)?.unwrap_or_default();
    args.apply_overrides(&mut cfg);

    // Initialize logging and capture the guard so we can drop it on signal
    let guard_opt: Option<tracing_appender::non_blocking::WorkerGuard> =
        init_tracing(&cfg.log_level, cfg.log_file.as_deref(), args.json).map_err(|e| {
            out::print_error(&format!("Failed to initialize logging: {}", e));
            e
        })?;

    // Guard needs to be dropped on SIGINT to flush logs
    let guard_slot = Arc::new(Mutex::new(guard_opt));
    {
        let guard_slot = Arc::clone(&guard_slot);
        ctrlc::set_handler(move || {
            shutdown::request();
            out::print_warn("Received interrupt; finishing current transfer and shutting down...");
            if let Ok(mut g) = guard_slot.lock() {
                let _ = g.take();
            }
        })
        .context("install signal handler")?;
    }

    debug!(?args, "Starting stage_move");

    let result = serve(cfg);
    if let Err(e) = &result {
        match e.downcast_ref::<StageMoveError>() {
            Some(typed) => error!(code = typed.code(), error = %typed, "Stopping"),
            None => error!(error = ?e, "Stopping"),
        }
    }

    // Ensure logs are flushed before exit
    if let Ok(mut g) = guard_slot.lock() {
        let _ = g.take();
    }

    result
}

/// Validate, health-check the destination, then watch until told to stop.
fn serve(mut cfg: Config) -> Result<()> {
    validate_and_normalize(&mut cfg).map_err(config_error)?;

    let invoker = TransferInvoker::from_config(&cfg);
    check_destination(&invoker, &cfg.destination)?;

    let mut pipeline = Pipeline::new(MoveOrchestrator::new(&cfg, invoker, FsSampler));

    // Watch before scanning so nothing created during the scan is missed;
    // a file seen by both is queued once and ignored once it's gone.
    let (tx, rx) = mpsc::channel();
    let bridge = WatchBridge::start(&cfg.source_root, tx)?;

    if cfg.scan_existing {
        for path in watch::scan_existing(&cfg.source_root) {
            pipeline.enqueue(path);
        }
    }

    info!(
        seconds = cfg.polling_interval.as_secs(),
        max_wait = ?cfg.max_wait,
        cleanup = ?cfg.cleanup,
        "Polling timer"
    );

    let outcome = pipeline.run(&rx);
    drop(bridge);
    info!(root = %cfg.source_root.display(), "Stopped monitoring");
    outcome.map_err(Into::into)
}

fn print_config_location() {
    if let Ok(cfg_env) = std::env::var(CONFIG_ENV) {
        out::print_info(&format!("Using {CONFIG_ENV} (explicit):\n  {cfg_env}\n"));
        out::print_info(&format!(
            "To override, unset {CONFIG_ENV} or set it to another file."
        ));
        return;
    }
    match default_config_path() {
        Ok(p) => {
            out::print_info(&format!("Default stage_move config path:\n  {}\n", p.display()));
            if p.exists() {
                out::print_info("A config file already exists at that location.");
            } else {
                out::print_info(
                    "No config file exists there yet. Example:\n\n<config>\n  <source>/path/to/staging</source>\n  <destination>remote:</destination>\n  <polling_seconds>60</polling_seconds>\n</config>\n",
                );
            }
        }
        Err(e) => {
            out::print_error(&format!("Could not determine a default config path: {e}"));
        }
    }
}
