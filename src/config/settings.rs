//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::AppPaths;

// ---------------------------------------------------------------------------
// ApiConfig
// ---------------------------------------------------------------------------

/// Connection settings for the remote classification service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the service (no trailing slash).
    pub base_url: String,
    /// Per-request timeout for `POST /predict` in milliseconds.
    pub request_timeout_ms: u64,
    /// Timeout for the `GET /health` probe in milliseconds.
    pub health_timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".into(),
            request_timeout_ms: 15_000,
            health_timeout_ms: 5_000,
        }
    }
}

impl ApiConfig {
    /// Per-request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Health-probe timeout as a [`Duration`].
    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.health_timeout_ms)
    }
}

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Settings for microphone capture and segment slicing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Target sample rate in Hz for encoded segments.
    pub sample_rate: u32,
    /// Nominal duration of one audio segment in milliseconds.
    pub chunk_duration_ms: u64,
    /// Maximum tolerated gap between consecutive segments in milliseconds.
    /// The capture thread polls well inside this bound.
    pub chunk_slack_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            chunk_duration_ms: 3_000,
            chunk_slack_ms: 200,
        }
    }
}

impl AudioConfig {
    /// Number of mono samples that make up one full segment.
    pub fn chunk_samples(&self) -> usize {
        (u64::from(self.sample_rate) * self.chunk_duration_ms / 1_000) as usize
    }
}

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Settings for session tracking and periodic reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Number of recent predictions kept in the published timeline view.
    pub timeline_items: usize,
    /// Interval between periodic session-status log lines, in seconds.
    pub report_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeline_items: 10,
            report_interval_secs: 5,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use emotion_monitor::config::AppConfig;
///
/// // Load (returns Default when the file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Classification service connection settings.
    pub api: ApiConfig,
    /// Microphone capture / segment slicing settings.
    pub audio: AudioConfig,
    /// Session tracking / reporting settings.
    pub session: SessionConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// (first-run scenario) so callers never need to special-case a missing
    /// file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    /// Verify default values match the service contract.
    #[test]
    fn default_values_match_contract() {
        let cfg = AppConfig::default();

        assert_eq!(cfg.api.base_url, "http://localhost:5000");
        assert_eq!(cfg.api.request_timeout_ms, 15_000);
        assert_eq!(cfg.api.health_timeout_ms, 5_000);
        assert_eq!(cfg.audio.sample_rate, 16_000);
        assert_eq!(cfg.audio.chunk_duration_ms, 3_000);
        assert_eq!(cfg.audio.chunk_slack_ms, 200);
        assert_eq!(cfg.session.timeline_items, 10);
    }

    /// One 3 s segment at 16 kHz is 48 000 mono samples.
    #[test]
    fn chunk_samples_from_duration() {
        let audio = AudioConfig::default();
        assert_eq!(audio.chunk_samples(), 48_000);
    }

    /// Verify that a default `AppConfig` survives a TOML round trip.
    #[test]
    fn round_trip_toml() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let original = AppConfig::default();
        original.save_to(&path).expect("save");

        let loaded = AppConfig::load_from(&path).expect("load");
        assert_eq!(original, loaded);
    }

    /// `load_from` on a non-existent path must return `Default` without error.
    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");
        assert_eq!(config, AppConfig::default());
    }

    /// Verify that modified non-default values survive a round trip.
    #[test]
    fn round_trip_modified_values() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("modified.toml");

        let mut cfg = AppConfig::default();
        cfg.api.base_url = "http://192.168.1.20:8000".into();
        cfg.api.request_timeout_ms = 30_000;
        cfg.audio.chunk_duration_ms = 5_000;
        cfg.session.timeline_items = 25;

        cfg.save_to(&path).expect("save");
        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(loaded.api.base_url, "http://192.168.1.20:8000");
        assert_eq!(loaded.api.request_timeout_ms, 30_000);
        assert_eq!(loaded.audio.chunk_duration_ms, 5_000);
        assert_eq!(loaded.session.timeline_items, 25);
    }
}
