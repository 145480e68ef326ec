//! Configuration loading and parsing
//!
//! The config file mirrors the engine configuration and adds the output
//! settings. Every value can be overridden from the command line.

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate};
use fault_episode_engine::config::parse_date;
use fault_episode_engine::{
    CodeMapColumns, DateRange, DetectionConfig, EngineConfig, ErrorListLayout, LogLayout,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub range: RangeConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub layout: LogLayout,
    #[serde(default)]
    pub error_list: ErrorListLayout,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct InputConfig {
    /// Directory with one sub-directory per device
    pub root: Option<PathBuf>,
    /// Devices to process; omit to process every sub-directory
    pub devices: Option<Vec<DeviceSpec>>,
    pub code_map: Option<PathBuf>,
    /// Column names of the code map; defaults depend on the command
    pub code_map_columns: Option<CodeMapColumns>,
}

/// Device id written either as a number or as a string
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum DeviceSpec {
    Number(u32),
    Name(String),
}

impl fmt::Display for DeviceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceSpec::Number(n) => write!(f, "{}", n),
            DeviceSpec::Name(name) => write!(f, "{}", name),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RangeConfig {
    /// First day (YYYYMMDD or YYYY-MM-DD); default: `window_days` before `end`
    pub start: Option<String>,
    /// Last day, inclusive; default: yesterday
    pub end: Option<String>,
    #[serde(default = "default_window_days")]
    pub window_days: i64,
}

fn default_window_days() -> i64 {
    30
}

impl Default for RangeConfig {
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            window_days: default_window_days(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Directory for the exported tables (default: current directory)
    pub output_dir: Option<PathBuf>,
    #[serde(default)]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    Ok(config)
}

impl AppConfig {
    pub fn root(&self) -> Result<&Path> {
        self.input
            .root
            .as_deref()
            .context("No log root given: pass --root or set [input] root in the config file")
    }

    /// Resolve the inclusive date window relative to `today`
    pub fn date_range(&self, today: NaiveDate) -> Result<DateRange> {
        let end = match &self.range.end {
            Some(end) => parse_date(end)?,
            None => DateRange::rolling(today, self.range.window_days).end,
        };
        let start = match &self.range.start {
            Some(start) => parse_date(start)?,
            None => end - Duration::days(self.range.window_days),
        };
        Ok(DateRange::new(start, end)?)
    }

    /// Build the engine configuration
    pub fn engine_config(&self, today: NaiveDate) -> Result<EngineConfig> {
        let mut config = EngineConfig::new(self.root()?).with_range(self.date_range(today)?);
        if let Some(devices) = &self.input.devices {
            config = config.with_devices(devices.iter().map(|d| d.to_string()));
        }
        config.detection = self.detection.clone();
        config.layout = self.layout.clone();
        config.error_list = self.error_list;
        Ok(config)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.output
            .output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }
}
