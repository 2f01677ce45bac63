//! XML configuration support.
//! - Loads settings from config.xml (quick_xml + serde).
//! - $STAGE_MOVE_CONFIG names an explicit file which must exist; the default
//!   per-user location is optional.
//!
//! Notes:
//! - This module only reads the config file; directory validation happens elsewhere.
//! - Unknown XML elements are an error so typos surface at start-up.

use anyhow::{bail, Context, Result};
use quick_xml::de::from_str as from_xml_str;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use super::paths::default_config_path;
use super::types::{CleanupPolicy, Config, LogLevel};
use super::CONFIG_ENV;

/// Struct mirroring the XML config for deserialization.
#[derive(Debug, Deserialize)]
#[serde(rename = "config")]
#[serde(deny_unknown_fields)]
struct XmlConfig {
    source: Option<String>,
    destination: Option<String>,
    executable: Option<String>,
    flags: Option<XmlFlags>,
    #[serde(default, deserialize_with = "de_u64_trimmed_opt")]
    polling_seconds: Option<u64>,
    /// 0 means wait forever
    #[serde(default, deserialize_with = "de_u64_trimmed_opt")]
    max_wait_seconds: Option<u64>,
    scan_existing: Option<bool>,
    cleanup: Option<String>,
    log_level: Option<String>,
    log_file: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct XmlFlags {
    #[serde(rename = "flag", default)]
    flag: Vec<String>,
}

// Optional u64 with surrounding whitespace trimmed; an empty element counts
// as absent, anything else that is not a number is an error.
fn de_u64_trimmed_opt<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    match opt.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse::<u64>().map(Some).map_err(|e| {
            serde::de::Error::custom(format!("expected a whole number of seconds, got '{s}': {e}"))
        }),
    }
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

// Map XmlConfig -> Config, starting from defaults.
fn xml_to_config(parsed: XmlConfig) -> Result<Config> {
    let mut cfg = Config::default();

    if let Some(src) = non_empty(parsed.source) {
        cfg.source_root = PathBuf::from(src);
    }
    if let Some(dst) = non_empty(parsed.destination) {
        cfg.destination = dst;
    }
    if let Some(exe) = non_empty(parsed.executable) {
        cfg.executable = exe;
    }
    if let Some(flags) = parsed.flags {
        cfg.flags = flags
            .flag
            .into_iter()
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .collect();
    }
    if let Some(secs) = parsed.polling_seconds {
        cfg.polling_interval = Duration::from_secs(secs);
    }
    cfg.max_wait = parsed
        .max_wait_seconds
        .filter(|s| *s > 0)
        .map(Duration::from_secs);
    if let Some(scan) = parsed.scan_existing {
        cfg.scan_existing = scan;
    }
    if let Some(s) = non_empty(parsed.cleanup) {
        cfg.cleanup = s.parse::<CleanupPolicy>().map_err(anyhow::Error::msg)?;
    }
    if let Some(s) = non_empty(parsed.log_level) {
        cfg.log_level = s.parse::<LogLevel>().map_err(anyhow::Error::msg)?;
    }
    cfg.log_file = non_empty(parsed.log_file).map(PathBuf::from);

    Ok(cfg)
}

/// Load a Config from a specific XML file path.
pub fn load_config_from_xml_path(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("read config xml '{}'", path.display()))?;
    let parsed: XmlConfig = from_xml_str(&contents)
        .with_context(|| format!("parse config xml '{}'", path.display()))?;
    xml_to_config(parsed).with_context(|| format!("invalid value in '{}'", path.display()))
}

/// Load the config file if there is one.
///
/// - $STAGE_MOVE_CONFIG set: that file must exist and parse.
/// - otherwise the per-user default is read when present; Ok(None) when missing.
pub fn load_config() -> Result<Option<Config>> {
    let explicit = env::var_os(CONFIG_ENV).is_some();
    let path = match default_config_path() {
        Ok(p) => p,
        Err(e) if !explicit => {
            debug!(error = %e, "No default config location; using built-in defaults");
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    if !path.exists() {
        if explicit {
            bail!("{CONFIG_ENV} points at '{}' which does not exist", path.display());
        }
        debug!(path = %path.display(), "No config file; using built-in defaults");
        return Ok(None);
    }

    debug!(path = %path.display(), "Loading config file");
    load_config_from_xml_path(&path).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn parse(xml: &str) -> Result<Config> {
        let parsed: XmlConfig = from_xml_str(xml)?;
        xml_to_config(parsed)
    }

    #[test]
    fn full_document_maps_every_field() {
        let cfg = parse(
            r#"<config>
  <source>/mnt/staging</source>
  <destination>gdrive:</destination>
  <executable>/opt/rclone</executable>
  <flags><flag>progress</flag><flag> bwlimit=8M </flag></flags>
  <polling_seconds> 15 </polling_seconds>
  <max_wait_seconds>3600</max_wait_seconds>
  <scan_existing>true</scan_existing>
  <cleanup>always</cleanup>
  <log_level>debug</log_level>
  <log_file>/var/log/stage_move.log</log_file>
</config>"#,
        )
        .unwrap();

        assert_eq!(cfg.source_root, PathBuf::from("/mnt/staging"));
        assert_eq!(cfg.destination, "gdrive:");
        assert_eq!(cfg.executable, "/opt/rclone");
        assert_eq!(cfg.flags, vec!["progress".to_string(), "bwlimit=8M".to_string()]);
        assert_eq!(cfg.polling_interval, Duration::from_secs(15));
        assert_eq!(cfg.max_wait, Some(Duration::from_secs(3600)));
        assert!(cfg.scan_existing);
        assert_eq!(cfg.cleanup, CleanupPolicy::Always);
        assert_eq!(cfg.log_level, LogLevel::Debug);
        assert_eq!(cfg.log_file, Some(PathBuf::from("/var/log/stage_move.log")));
    }

    #[test]
    fn missing_elements_keep_defaults() {
        let cfg = parse("<config><destination>remote:</destination></config>").unwrap();
        assert_eq!(cfg.executable, "rclone");
        assert_eq!(cfg.flags, Config::default().flags);
        assert_eq!(cfg.max_wait, None);
        assert_eq!(cfg.log_file, None);
    }

    #[test]
    fn zero_max_wait_means_unbounded() {
        let cfg = parse("<config><max_wait_seconds>0</max_wait_seconds></config>").unwrap();
        assert_eq!(cfg.max_wait, None);
    }

    #[test]
    fn unknown_element_is_rejected() {
        let td = tempdir().unwrap();
        let p = td.path().join("config.xml");
        fs::write(&p, "<config><sauce>/x</sauce></config>").unwrap();
        assert!(load_config_from_xml_path(&p).is_err());
    }

    #[test]
    fn non_numeric_seconds_are_rejected() {
        let err = parse("<config><polling_seconds>sixty</polling_seconds></config>").unwrap_err();
        assert!(format!("{err:#}").contains("sixty"), "{err:#}");
        assert!(parse("<config><max_wait_seconds>-5</max_wait_seconds></config>").is_err());
    }

    #[test]
    fn empty_seconds_element_keeps_default() {
        let cfg = parse("<config><polling_seconds>  </polling_seconds></config>").unwrap();
        assert_eq!(cfg.polling_interval, Duration::from_secs(60));
    }

    #[test]
    fn bad_cleanup_value_is_rejected() {
        assert!(parse("<config><cleanup>sometimes</cleanup></config>").is_err());
    }
}
