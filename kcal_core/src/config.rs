//! Configuration file support for kcal.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/kcal/config.toml`.

use crate::fasting::DEFAULT_GOAL_HOURS;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub fasting: FastingConfig,

    #[serde(default)]
    pub timers: TimerConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Fasting display configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FastingConfig {
    /// Target used only for the progress percentage
    #[serde(default = "default_goal_hours")]
    pub goal_hours: f64,
}

impl Default for FastingConfig {
    fn default() -> Self {
        Self {
            goal_hours: default_goal_hours(),
        }
    }
}

/// Cadence of the live watch timers
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimerConfig {
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,

    #[serde(default = "default_rollover_check_secs")]
    pub rollover_check_secs: u64,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            tick_secs: default_tick_secs(),
            rollover_check_secs: default_rollover_check_secs(),
        }
    }
}

impl TimerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_secs)
    }

    pub fn rollover_interval(&self) -> Duration {
        Duration::from_secs(self.rollover_check_secs)
    }
}

// Default value functions
fn home_relative(suffix: &str) -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(suffix)
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| home_relative(".local/share"))
        .join("kcal")
}

fn default_goal_hours() -> f64 {
    DEFAULT_GOAL_HOURS
}

fn default_tick_secs() -> u64 {
    1
}

fn default_rollover_check_secs() -> u64 {
    60
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| home_relative(".config"))
            .join("kcal")
            .join("config.toml")
    }

    /// Reject values the timers or progress display cannot work with
    pub fn validate(&self) -> Result<()> {
        if !(self.fasting.goal_hours.is_finite() && self.fasting.goal_hours > 0.0) {
            return Err(Error::Config(format!(
                "fasting.goal_hours must be positive, got {}",
                self.fasting.goal_hours
            )));
        }
        if self.timers.tick_secs == 0 || self.timers.rollover_check_secs == 0 {
            return Err(Error::Config("timer intervals must be at least 1 second".into()));
        }
        Ok(())
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.fasting.goal_hours, 16.0);
        assert_eq!(config.timers.tick_interval(), Duration::from_secs(1));
        assert_eq!(config.timers.rollover_interval(), Duration::from_secs(60));
        assert!(config.data.data_dir.ends_with("kcal"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[fasting]
goal_hours = 18.0
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.fasting.goal_hours, 18.0);
        assert_eq!(config.timers.tick_secs, 1); // default
    }

    #[test]
    fn test_save_and_load_from_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested/config.toml");

        let mut config = Config::default();
        config.data.data_dir = temp_dir.path().join("data");
        config.timers.rollover_check_secs = 30;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.data.data_dir, temp_dir.path().join("data"));
        assert_eq!(loaded.timers.rollover_check_secs, 30);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[timers]\ntick_secs = 0\n").unwrap();
        assert!(matches!(Config::load_from(&path), Err(Error::Config(_))));

        std::fs::write(&path, "[fasting]\ngoal_hours = -2.0\n").unwrap();
        assert!(matches!(Config::load_from(&path), Err(Error::Config(_))));
    }
}
