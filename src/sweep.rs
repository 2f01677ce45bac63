//! Removal of directories left empty after a move.
//!
//! The tree is listed first (post-order, children before parents) and only
//! then pruned. `remove_dir` refuses non-empty directories, so a file that
//! appears between listing and removal simply keeps its directory alive.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct CleanupSweeper {
    root: PathBuf,
}

impl CleanupSweeper {
    /// `root` is the configured source root; it is never removed.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Remove every empty directory below `start`, deepest first.
    /// Returns how many directories were removed. Best-effort: failures are
    /// logged and skipped.
    pub fn sweep(&self, start: &Path) -> usize {
        info!(path = %start.display(), "Cleaning up empty directories");

        let dirs: Vec<PathBuf> = WalkDir::new(start)
            .min_depth(1)
            .follow_links(false)
            .contents_first(true)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(e) => Some(e),
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable entry during cleanup");
                    None
                }
            })
            .filter(|e| e.file_type().is_dir())
            .map(|e| e.into_path())
            .collect();

        let mut removed = 0;
        for dir in dirs {
            if dir == self.root || dir == start {
                continue;
            }
            match fs::remove_dir(&dir) {
                Ok(()) => {
                    info!(path = %dir.display(), "Removing directory");
                    removed += 1;
                }
                Err(e) if e.kind() == io::ErrorKind::DirectoryNotEmpty => {
                    debug!(path = %dir.display(), "Directory not empty; keeping");
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!(path = %dir.display(), "Directory already gone");
                }
                Err(e) => {
                    warn!(path = %dir.display(), error = %e, "Could not remove directory");
                }
            }
        }
        removed
    }

    /// Sweep the configured root.
    pub fn sweep_root(&self) -> usize {
        self.sweep(&self.root)
    }
}
