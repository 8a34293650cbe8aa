//! Panel configuration.
//!
//! Loaded from `intelligence.json` in the platform config directory. A
//! missing file means defaults; every field is optional in the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::services::Tone;

/// Config file name inside the application config directory.
const CONFIG_FILE_NAME: &str = "intelligence.json";

/// Progressive reveal timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RevealSettings {
    /// Time to reveal a whole summary.
    pub duration_ms: u64,
    /// Interval between reveal steps.
    pub tick_ms: u64,
}

impl RevealSettings {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    /// Tick interval, never zero.
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }
}

impl Default for RevealSettings {
    fn default() -> Self {
        Self {
            duration_ms: 1500,
            tick_ms: 16,
        }
    }
}

/// Analysis response cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub enabled: bool,
    /// Maximum number of cached responses.
    pub capacity: usize,
    /// Age after which a cached response is no longer served.
    pub stale_after_ms: u64,
}

impl CacheSettings {
    pub fn stale_after(&self) -> Duration {
        Duration::from_millis(self.stale_after_ms)
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 64,
            stale_after_ms: 5 * 60 * 1000,
        }
    }
}

/// Settings for the intelligence panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    /// Ceiling for any analysis or draft call.
    pub request_timeout_ms: u64,
    pub reveal: RevealSettings,
    pub cache: CacheSettings,
    /// Tone used when none is chosen.
    pub default_tone: Tone,
    /// Backend base URL. The simulated service is used when unset.
    pub service_url: Option<String>,
    /// Latency of the simulated service.
    pub simulated_latency_ms: u64,
    /// Capacity of the panel event channel.
    pub event_capacity: usize,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 30_000,
            reveal: RevealSettings::default(),
            cache: CacheSettings::default(),
            default_tone: Tone::default(),
            service_url: None,
            simulated_latency_ms: 1500,
            event_capacity: 256,
        }
    }
}

impl PanelConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn simulated_latency(&self) -> Duration {
        Duration::from_millis(self.simulated_latency_ms)
    }

    /// Default config file location, if the platform has one.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "panbanda", "heap")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    /// Loads config from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config {}", path.display()))
    }

    /// Loads config from a JSON file, falling back to defaults when the
    /// file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        Self::load(path)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn defaults() {
        let config = PanelConfig::default();
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.reveal.duration(), Duration::from_millis(1500));
        assert!(config.cache.enabled);
        assert_eq!(config.default_tone, Tone::Normal);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"request_timeout_ms": 500, "reveal": {{"tick_ms": 0}}, "default_tone": "formal"}}"#
        )
        .unwrap();

        let config = PanelConfig::load(file.path()).unwrap();
        assert_eq!(config.request_timeout(), Duration::from_millis(500));
        assert_eq!(config.reveal.duration_ms, 1500);
        assert_eq!(config.reveal.tick(), Duration::from_millis(1));
        assert_eq!(config.default_tone, Tone::Formal);
        assert_eq!(config.cache, CacheSettings::default());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = PanelConfig::load_or_default(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, PanelConfig::default());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(PanelConfig::load(file.path()).is_err());
    }
}
