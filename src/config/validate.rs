//! Config validation logic.
//! Verifies required settings, the source root directory, and that a local
//! destination does not sit inside the watched tree.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, error, info};

use crate::errors::StageMoveError;

use super::types::Config;

impl Config {
    /// Check settings without touching the configured values.
    pub fn validate(&self) -> Result<()> {
        if self.source_root.as_os_str().is_empty() {
            return Err(StageMoveError::MissingSetting("source").into());
        }
        if self.destination.trim().is_empty() {
            return Err(StageMoveError::MissingSetting("destination").into());
        }
        if self.executable.trim().is_empty() {
            return Err(StageMoveError::MissingSetting("executable").into());
        }
        if self.polling_interval.is_zero() {
            bail!("polling interval must be at least one second");
        }

        ensure_readable_dir(&self.source_root)?;

        // A local destination inside the source root would feed moved files back to us.
        let dest = Path::new(&self.destination);
        if dest.is_absolute() {
            let src_real = dunce::canonicalize(&self.source_root)
                .unwrap_or_else(|_| self.source_root.clone());
            let dest_real = dunce::canonicalize(dest).unwrap_or_else(|_| dest.to_path_buf());
            if dest_real.starts_with(&src_real) {
                bail!(
                    "destination '{}' must not be inside source '{}'",
                    dest_real.display(),
                    src_real.display()
                );
            }
        }

        info!(
            "Config validated: source='{}' destination='{}' executable='{}' polling={}s",
            self.source_root.display(),
            self.destination,
            self.executable,
            self.polling_interval.as_secs()
        );
        Ok(())
    }
}

/// Validate and canonicalize the source root so watch events and prefix
/// substitution see the same spelling of the path.
pub fn validate_and_normalize(cfg: &mut Config) -> Result<()> {
    cfg.validate()?;
    cfg.source_root = dunce::canonicalize(&cfg.source_root)
        .with_context(|| format!("canonicalize source '{}'", cfg.source_root.display()))?;
    debug!(source = %cfg.source_root.display(), "Normalized source root");
    Ok(())
}

/// Source root must exist, be a directory and be listable.
fn ensure_readable_dir(path: &Path) -> Result<()> {
    let ok = path.is_dir() && fs::read_dir(path).is_ok();
    if !ok {
        error!("source is not a readable directory: {}", path.display());
        return Err(StageMoveError::SourceRootInvalid(path.to_path_buf()).into());
    }
    debug!("source readable: {}", path.display());
    Ok(())
}
