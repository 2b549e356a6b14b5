//! Configuration for the screenlink agent.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use screenlink_core::automation::MatchThresholds;
use screenlink_core::automation::templates::{DEFAULT_ACCEPT_TEMPLATE, DEFAULT_RETRY_TEMPLATE};
use screenlink_core::stream::StreamConfig;

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Frame stream settings.
    pub stream: StreamSection,
    /// Template matching and auto-accept.
    pub automation: AutomationSection,
    /// Logging settings.
    pub logging: LoggingSection,
}

/// Frame stream settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamSection {
    /// Target frames per second (clamped to 1..=60).
    pub fps: u32,
    /// Frames wider than this are downscaled to it.
    pub target_width: u32,
    /// JPEG quality (clamped to 1..=100).
    pub jpeg_quality: u8,
    /// Monitor captured at startup (0 = whole desktop, 1.. = displays).
    pub initial_monitor: usize,
    /// Pause before reopening a failed capture session, in milliseconds.
    pub session_backoff_ms: u64,
}

/// Template matching settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationSection {
    /// Template directory. Relative paths are resolved against the
    /// executable's directory.
    pub assets_dir: PathBuf,
    pub accept_template: String,
    pub retry_template: String,
    /// Minimum similarity before the auto-accept loop clicks.
    pub accept_threshold: f32,
    /// Minimum similarity for the post-submission retry probe.
    pub retry_threshold: f32,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level: "trace", "debug", "info", "warn", "error".
    /// `RUST_LOG` takes precedence.
    pub level: String,
}

/// Where a loaded configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File,
    /// No file at the path; defaults used.
    Missing,
    /// The file did not parse; defaults used.
    Invalid(String),
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for StreamSection {
    fn default() -> Self {
        Self {
            fps: 15,
            target_width: 1024,
            jpeg_quality: 50,
            initial_monitor: 1,
            session_backoff_ms: 1000,
        }
    }
}

impl Default for AutomationSection {
    fn default() -> Self {
        let thresholds = MatchThresholds::default();
        Self {
            assets_dir: PathBuf::from("assets"),
            accept_template: DEFAULT_ACCEPT_TEMPLATE.into(),
            retry_template: DEFAULT_RETRY_TEMPLATE.into(),
            accept_threshold: thresholds.accept,
            retry_threshold: thresholds.retry,
        }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl AgentConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    ///
    /// Tracing is not up yet when this runs, so the outcome is returned
    /// for the caller to log.
    pub fn load(path: &Path) -> (Self, ConfigSource) {
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => (config, ConfigSource::File),
                Err(e) => (Self::default(), ConfigSource::Invalid(e.to_string())),
            },
            Err(_) => (Self::default(), ConfigSource::Missing),
        }
    }

    /// Convert stream settings into a `StreamConfig`.
    pub fn to_stream_config(&self) -> StreamConfig {
        StreamConfig {
            fps: self.stream.fps.clamp(1, 60),
            target_width: self.stream.target_width.max(16),
            jpeg_quality: self.stream.jpeg_quality.clamp(1, 100),
            session_backoff: Duration::from_millis(self.stream.session_backoff_ms),
        }
    }

    pub fn thresholds(&self) -> MatchThresholds {
        MatchThresholds {
            accept: self.automation.accept_threshold.clamp(0.0, 1.0),
            retry: self.automation.retry_threshold.clamp(0.0, 1.0),
        }
    }

    /// The template directory, with a relative path joined onto `base`.
    pub fn assets_dir(&self, base: Option<&Path>) -> PathBuf {
        let dir = &self.automation.assets_dir;
        match base {
            Some(base) if dir.is_relative() => base.join(dir),
            _ => dir.clone(),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
