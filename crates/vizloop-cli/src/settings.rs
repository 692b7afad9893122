//! Runner settings loaded from `vizloop.yaml`.
//!
//! Every section is optional; missing keys fall back to the same defaults
//! the demos use when built programmatically.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use vizloop_core::config::SchedulerSettings;
use vizloop_demos::DemoKind;
use vizloop_demos::attention::AttentionSettings;
use vizloop_demos::life::LifeSettings;
use vizloop_demos::mpc::MpcSettings;

/// Default settings file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "vizloop.yaml";

/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
pub const CONFIG_PATH_ENV: &str = "VIZLOOP_CONFIG";

/// Errors from reading or parsing the settings file.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// Failed to read the settings file from disk.
    #[error("failed to read settings file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// The file is not valid YAML or does not match the schema.
    #[error("failed to parse settings YAML: {source}")]
    Yaml {
        /// The underlying YAML error.
        #[from]
        source: serde_yml::Error,
    },
}

/// Top-level runner settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Which demo to run and for how long.
    #[serde(default)]
    pub run: RunSettings,

    /// Tick rate and log capacity shared by every demo.
    #[serde(default)]
    pub scheduler: SchedulerSettings,

    /// Game of Life parameters.
    #[serde(default)]
    pub life: LifeSettings,

    /// Cart controller parameters.
    #[serde(default)]
    pub mpc: MpcSettings,

    /// Attention head parameters.
    #[serde(default)]
    pub attention: AttentionSettings,
}

/// What to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSettings {
    /// Demo to mount on the scheduler.
    #[serde(default)]
    pub demo: DemoKind,

    /// Wall-clock budget for the run in milliseconds.
    #[serde(default = "default_duration_ms")]
    pub duration_ms: u64,
}

impl RunSettings {
    /// Run budget as a [`Duration`].
    pub const fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            demo: DemoKind::default(),
            duration_ms: default_duration_ms(),
        }
    }
}

const fn default_duration_ms() -> u64 {
    5_000
}

impl Settings {
    /// Load settings from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Io`] if the file cannot be read, or
    /// [`SettingsError::Yaml`] if the content is not valid.
    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse settings from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Yaml`] if the string is not valid.
    pub fn parse(yaml: &str) -> Result<Self, SettingsError> {
        let settings: Self = serde_yml::from_str(yaml)?;
        Ok(settings)
    }

    /// Load from `path`, or use defaults when the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, SettingsError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            tracing::info!(path = %path.display(), "Settings file not found, using defaults");
            Ok(Self::default())
        }
    }
}

/// Settings file location: `$VIZLOOP_CONFIG` if set, else `vizloop.yaml`.
pub fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_PATH_ENV)
        .filter(|value| !value.is_empty())
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
}
