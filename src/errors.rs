//! Typed error definitions for stage_move.
//! Provides the small set of failures that end the process, each with its own exit code.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StageMoveError {
    #[error("Missing required setting: {0}")]
    MissingSetting(&'static str),

    #[error("Source root is not a readable directory: {0}")]
    SourceRootInvalid(PathBuf),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Could not run transfer tool '{executable}': {source}")]
    SpawnFailed {
        executable: String,
        #[source]
        source: io::Error,
    },

    #[error("Destination '{destination}' failed its health check (exit code {})", display_code(.exit_code))]
    HealthCheckFailed {
        destination: String,
        exit_code: Option<i32>,
    },
}

impl StageMoveError {
    /// Process exit code for this failure.
    pub fn code(&self) -> i32 {
        match self {
            StageMoveError::MissingSetting(_)
            | StageMoveError::SourceRootInvalid(_)
            | StageMoveError::InvalidConfig(_) => 2,
            StageMoveError::SpawnFailed { .. } => 3,
            StageMoveError::HealthCheckFailed { .. } => 4,
        }
    }
}

/// Fold an error from config loading or validation into a typed config failure.
/// Typed errors pass through unchanged.
pub fn config_error(e: anyhow::Error) -> StageMoveError {
    match e.downcast::<StageMoveError>() {
        Ok(typed) => typed,
        Err(other) => StageMoveError::InvalidConfig(format!("{other:#}")),
    }
}

/// Exit code for any error reaching `main`; untyped errors map to 1.
pub fn exit_code_for(e: &anyhow::Error) -> i32 {
    e.downcast_ref::<StageMoveError>()
        .map(StageMoveError::code)
        .unwrap_or(1)
}

fn display_code(code: &Option<i32>) -> String {
    code.map(|c| c.to_string())
        .unwrap_or_else(|| "none, killed by signal".into())
}
