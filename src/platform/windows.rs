//! Windows implementations of platform helpers (best-effort, no ACL management).

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::Path;

pub fn create_log_dir(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)
}

/// Open log file for appending (no symlink defense available via std on Windows).
pub fn open_log_file_secure_append(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        create_log_dir(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}
