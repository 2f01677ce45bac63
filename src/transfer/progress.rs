//! Progress-line recognition for transfer-tool stdout.
//!
//! rclone's `--progress` output lists in-flight items as
//! `*  name.mkv:  45% /10Gi, 12Mi/s, 1h2m3s`. The exact text is owned by the
//! tool, so all knowledge of it lives behind `ProgressParser`.

/// One parsed per-item progress update. Fields are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub item: String,
    /// Completion, e.g. "45%" or "45% /10Gi"
    pub fraction: String,
    /// Size or throughput, whichever the tool prints second
    pub size: String,
    pub elapsed: String,
}

/// Turns a stdout line into a progress event; `None` means passthrough.
pub trait ProgressParser: Send + Sync {
    fn parse(&self, line: &str) -> Option<ProgressEvent>;
}

/// Parser for rclone's per-transfer status lines.
#[derive(Debug, Clone, Copy)]
pub struct RcloneProgressParser {
    marker: char,
}

impl Default for RcloneProgressParser {
    fn default() -> Self {
        Self { marker: '*' }
    }
}

impl RcloneProgressParser {
    pub fn with_marker(marker: char) -> Self {
        Self { marker }
    }
}

impl ProgressParser for RcloneProgressParser {
    fn parse(&self, line: &str) -> Option<ProgressEvent> {
        let body = line.trim().strip_prefix(self.marker)?;
        // Item names may contain ':'; the stats never do.
        let (item, stats) = body.rsplit_once(':')?;
        let item = item.trim();
        let fields: Vec<&str> = stats.split(',').map(str::trim).collect();
        if item.is_empty() || fields.len() < 3 || fields.iter().any(|f| f.is_empty()) {
            return None;
        }
        Some(ProgressEvent {
            item: item.to_string(),
            fraction: fields[0].to_string(),
            size: fields[1].to_string(),
            elapsed: fields[fields.len() - 1].to_string(),
        })
    }
}
