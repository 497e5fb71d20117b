use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::engine::{Downsample, EngineConfig, RetentionPolicy, SeriesLimits};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub retention: RetentionConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub refresh_rate_ms: u64,
    pub top_limit: usize,
    pub default_metric: String,
    /// Print a report every N committed ticks.
    pub report_every: u64,
    /// Stop after this many committed ticks; `None` runs until interrupted.
    pub max_ticks: Option<u64>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        GeneralConfig {
            refresh_rate_ms: 2000,
            top_limit: 10,
            default_metric: "cpu".to_string(),
            report_every: 1,
            max_ticks: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    pub policy: String,
    pub max_system_points: Option<usize>,
    pub max_process_points: Option<usize>,
    pub downsample: String,
    /// Sweep dead accumulators not seen for this long after every tick.
    pub sweep_dead_after_ms: Option<u64>,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        RetentionConfig {
            policy: "retain-forever".to_string(),
            max_system_points: None,
            max_process_points: None,
            downsample: "drop-oldest".to_string(),
            sweep_dead_after_ms: None,
        }
    }
}

impl RetentionConfig {
    pub fn engine_config(&self) -> EngineConfig {
        let downsample = Downsample::from_str_config(&self.downsample);
        EngineConfig {
            retention: RetentionPolicy::from_str_config(&self.policy),
            system_limits: SeriesLimits {
                max_points: self.max_system_points,
                downsample,
            },
            process_limits: SeriesLimits {
                max_points: self.max_process_points,
                downsample,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be greater than 0")]
    Zero(&'static str),
}

impl Config {
    /// Reject settings the polling loop cannot honor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.general.refresh_rate_ms == 0 {
            return Err(ConfigError::Zero("refresh rate"));
        }
        if self.general.report_every == 0 {
            return Err(ConfigError::Zero("general.report_every"));
        }
        if self.general.max_ticks == Some(0) {
            return Err(ConfigError::Zero("tick limit"));
        }
        Ok(())
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("proctally").join("config.toml"))
}

pub fn load_config() -> Config {
    match config_path() {
        Some(path) if path.exists() => load_config_from_path(&path),
        _ => Config::default(),
    }
}

pub fn load_config_from_path(path: &Path) -> Config {
    match std::fs::read_to_string(path) {
        Ok(contents) => toml::from_str(&contents).unwrap_or_else(|err| {
            tracing::warn!(path = %path.display(), %err, "invalid config, using defaults");
            Config::default()
        }),
        Err(_) => Config::default(),
    }
}
