//! Point-in-time file identity snapshots.
//!
//! A sample either yields a `FileStat` (the file exists) or a `SampleError`
//! that tells a vanished file apart from any other stat failure, so callers
//! can log the two differently.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use tracing::debug;

/// Size and modification time of an existing file.
///
/// Existence is implied: a missing file never produces a `FileStat`, so two
/// stats compare equal exactly when size and mtime match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub size: u64,
    pub modified: SystemTime,
}

#[derive(Debug, Error)]
pub enum SampleError {
    #[error("vanished: {0}")]
    Vanished(PathBuf),

    #[error("could not stat {path}: {source}")]
    Stat {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl SampleError {
    pub fn is_vanished(&self) -> bool {
        matches!(self, SampleError::Vanished(_))
    }
}

/// Source of `FileStat` samples.
pub trait StatSampler {
    fn sample(&self, path: &Path) -> Result<FileStat, SampleError>;
}

impl<T: StatSampler + ?Sized> StatSampler for &T {
    fn sample(&self, path: &Path) -> Result<FileStat, SampleError> {
        (**self).sample(path)
    }
}

/// Samples the real filesystem with one metadata query per call.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsSampler;

impl StatSampler for FsSampler {
    fn sample(&self, path: &Path) -> Result<FileStat, SampleError> {
        let meta = fs::metadata(path).map_err(|e| classify(path, e))?;
        let modified = meta.modified().map_err(|e| classify(path, e))?;
        let stat = FileStat {
            size: meta.len(),
            modified,
        };
        debug!(path = %path.display(), size = stat.size, modified = ?stat.modified, "File stat");
        Ok(stat)
    }
}

fn classify(path: &Path, e: io::Error) -> SampleError {
    if e.kind() == io::ErrorKind::NotFound {
        SampleError::Vanished(path.to_path_buf())
    } else {
        SampleError::Stat {
            path: path.to_path_buf(),
            source: e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use filetime::{set_file_mtime, FileTime};

    #[test]
    fn sample_reports_size_and_mtime() {
        let dir = assert_fs::TempDir::new().unwrap();
        let f = dir.child("movie.mkv");
        f.write_str("twelve bytes").unwrap();
        set_file_mtime(f.path(), FileTime::from_unix_time(1_700_000_000, 0)).unwrap();

        let stat = FsSampler.sample(f.path()).unwrap();
        assert_eq!(stat.size, 12);
        assert_eq!(
            FileTime::from_system_time(stat.modified).unix_seconds(),
            1_700_000_000
        );
    }

    #[test]
    fn missing_file_is_vanished_not_stat_error() {
        let dir = assert_fs::TempDir::new().unwrap();
        let err = FsSampler.sample(&dir.path().join("gone.bin")).unwrap_err();
        assert!(err.is_vanished());
    }

    #[test]
    fn mtime_change_breaks_equality() {
        let dir = assert_fs::TempDir::new().unwrap();
        let f = dir.child("a.bin");
        f.write_str("abc").unwrap();
        set_file_mtime(f.path(), FileTime::from_unix_time(1_600_000_000, 0)).unwrap();
        let first = FsSampler.sample(f.path()).unwrap();
        set_file_mtime(f.path(), FileTime::from_unix_time(1_600_000_001, 0)).unwrap();
        let second = FsSampler.sample(f.path()).unwrap();
        assert_eq!(first.size, second.size);
        assert_ne!(first, second);
    }

    #[cfg(unix)]
    #[test]
    fn not_a_directory_component_is_a_stat_error() {
        let dir = assert_fs::TempDir::new().unwrap();
        let f = dir.child("plain");
        f.touch().unwrap();
        // ENOTDIR rather than ENOENT
        let err = FsSampler.sample(&f.path().join("child")).unwrap_err();
        assert!(!err.is_vanished(), "unexpected: {err}");
    }
}
