//! Configuration file management for adsb-track.
//!
//! Reads/writes `~/.adsb-track/config.yaml`. The only recognized setting is
//! the track eviction timeout.

use std::path::{Path, PathBuf};

use crate::types::{Millis, TrackError};

/// Tracks silent for longer than this are evicted by `prune`.
pub const DEFAULT_TIMEOUT_MS: Millis = 30_000;

/// Full configuration structure.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub tracking: TableConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableConfig {
    pub timeout_ms: Millis,
}

impl Default for TableConfig {
    fn default() -> Self {
        TableConfig {
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

/// Get the config directory path (`~/.adsb-track/`).
pub fn config_dir() -> PathBuf {
    dirs_home().join(".adsb-track")
}

/// Get the config file path.
pub fn config_file() -> PathBuf {
    config_dir().join("config.yaml")
}

fn dirs_home() -> PathBuf {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Load config from `~/.adsb-track/config.yaml`.
///
/// Returns default config if the file doesn't exist or can't be read.
pub fn load_config() -> Config {
    load_config_from(&config_file()).unwrap_or_default()
}

/// Load config from an explicit path.
pub fn load_config_from(path: &Path) -> Result<Config, TrackError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| TrackError::Config(format!("{}: {e}", path.display())))?;
    parse_config(&text)
}

/// Save config to an explicit path, creating parent directories.
pub fn save_config_to(config: &Config, path: &Path) -> Result<(), TrackError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, serialize_config(config))?;
    Ok(())
}

/// Parse simple YAML-like config text. Unknown keys are ignored.
fn parse_config(text: &str) -> Result<Config, TrackError> {
    let mut config = Config::default();
    let mut current_section: Option<String> = None;

    for line in text.lines() {
        let stripped = line.trim();
        if stripped.is_empty() || stripped.starts_with('#') {
            continue;
        }

        let is_indented = line.starts_with("  ") || line.starts_with('\t');

        let Some((key, val)) = stripped.split_once(':') else {
            continue;
        };
        let key = key.trim();
        let val = val.trim();

        if !is_indented {
            current_section = val.is_empty().then(|| key.to_string());
            continue;
        }

        if current_section.as_deref() == Some("tracking") && key == "timeout_ms" {
            config.tracking.timeout_ms = val
                .parse()
                .map_err(|_| TrackError::Config(format!("invalid timeout_ms: {val:?}")))?;
        }
    }

    Ok(config)
}

/// Serialize config to YAML-like text.
fn serialize_config(config: &Config) -> String {
    let lines = [
        "# adsb-track configuration".to_string(),
        String::new(),
        "tracking:".into(),
        format!("  timeout_ms: {}", config.tracking.timeout_ms),
    ];
    lines.join("\n") + "\n"
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.tracking.timeout_ms, 30_000);
    }

    #[test]
    fn test_parse_config() {
        let text = r#"
# comment
tracking:
  timeout_ms: 45000
  unknown: 1

other:
  timeout_ms: 5
"#;
        let config = parse_config(text).unwrap();
        assert_eq!(config.tracking.timeout_ms, 45_000);
    }

    #[test]
    fn test_parse_config_missing_section() {
        let config = parse_config("receiver:\n  name: test\n").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_parse_config_bad_timeout() {
        let err = parse_config("tracking:\n  timeout_ms: soon\n").unwrap_err();
        assert!(matches!(err, TrackError::Config(_)));
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");
        let config = Config {
            tracking: TableConfig { timeout_ms: 12_345 },
        };
        save_config_to(&config, &path).unwrap();
        assert_eq!(load_config_from(&path).unwrap(), config);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config_from(&dir.path().join("absent.yaml")).is_err());
    }
}
