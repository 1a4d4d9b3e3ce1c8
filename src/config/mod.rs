//! Configuration for the tether demo and defaults.
//!
//! Configuration is read from `~/.config/tether/config.toml`. If the file
//! doesn't exist, a default configuration with comments is created.
//! The library itself never reads this file; values are passed in explicitly.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration struct.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub normalizer: NormalizerConfig,
    pub demo: DemoConfig,
}

/// Rate normalizer defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Minimum spacing between emitted values in milliseconds (default: 250)
    pub window_ms: u64,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self { window_ms: 250 }
    }
}

impl NormalizerConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

/// Parameters of the simulated screen in `tether demo`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Total number of items the fake feed produces (default: 20)
    pub items: usize,

    /// Items produced back to back in each burst (default: 5)
    pub burst: usize,

    /// Gap between bursts in milliseconds (default: 1000)
    pub burst_gap_ms: u64,

    /// How long the screen stays resumed before it is paused (default: 3000)
    pub visible_ms: u64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            items: 20,
            burst: 5,
            burst_gap_ms: 1000,
            visible_ms: 3000,
        }
    }
}

impl DemoConfig {
    pub fn burst_gap(&self) -> Duration {
        Duration::from_millis(self.burst_gap_ms)
    }

    pub fn visible(&self) -> Duration {
        Duration::from_millis(self.visible_ms)
    }
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// If the config file doesn't exist, creates a default one with comments.
    /// Missing fields in the config file use default values.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::default_config_path()?;

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
            return Ok(Self::default());
        }

        Self::from_path(&config_path)
    }

    /// Load from an explicit file, which must exist.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source: e,
        })
    }

    /// Get the default config file path: `~/.config/tether/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("tether").join("config.toml"))
    }

    /// Render the resolved configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        Ok(())
    }

    fn default_config_content() -> &'static str {
        r##"# tether configuration

[normalizer]
# Minimum spacing between values let through the rate normalizer (milliseconds).
# 0 turns the normalizer into a pass-through.
window_ms = 250

[demo]
# Items the simulated feed produces in total
items = 20

# Items produced back to back in each burst
burst = 5

# Pause between bursts (milliseconds)
burst_gap_ms = 1000

# How long the simulated screen stays resumed before it is paused (milliseconds)
visible_ms = 3000
"##
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Failed to render config: {0}")]
    Serialize(#[from] toml::ser::Error),
}
