//! Platform-specific helpers.
//! Log files are opened append-only and created private where the OS allows it.

#[cfg(unix)]
mod unix;
#[cfg(not(unix))]
mod windows;

#[cfg(unix)]
pub use unix::{create_log_dir, open_log_file_secure_append};

#[cfg(not(unix))]
pub use windows::{create_log_dir, open_log_file_secure_append};
