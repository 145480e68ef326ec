//! Core types for the fault episode engine
//!
//! This module defines the records that flow through the pipeline: normalized
//! log events, debounced boundaries, extracted fault episodes and gap records.
//! Nothing here is cached between runs; every value is rebuilt from raw files.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Timestamp type used throughout the engine (log files are stamped in UTC)
pub type Timestamp = DateTime<Utc>;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur while reading logs or running a batch
///
/// Only the configuration variants (`InvalidDeviceId`, `InvalidDateRange`,
/// `InvalidTriggerWindow`, `NoDevices`) ever reach the caller of
/// [`crate::Engine::run`]; the rest are absorbed per file and surface as
/// counters in [`crate::RunStats`].
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Log file not found: {0:?}")]
    FileMissing(PathBuf),

    #[error("Required column '{column}' not found in {path:?}")]
    MissingColumn { path: PathBuf, column: String },

    #[error("Invalid device id: {0:?}")]
    InvalidDeviceId(String),

    #[error("Invalid date range: {start} is after {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("Invalid date: {0:?} (expected YYYYMMDD or YYYY-MM-DD)")]
    InvalidDate(String),

    #[error("Invalid trigger window: {0}s (expected 0..={max}s)", max = crate::config::MAX_TRIGGER_WINDOW_SECS)]
    InvalidTriggerWindow(i64),

    #[error("No devices to process under {0:?}")]
    NoDevices(PathBuf),

    #[error("Failed to parse code map: {0}")]
    CodeMapParseError(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl EngineError {
    /// True for errors that describe a bad run configuration rather than a bad file
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            EngineError::InvalidDeviceId(_)
                | EngineError::InvalidDateRange { .. }
                | EngineError::InvalidDate(_)
                | EngineError::InvalidTriggerWindow(_)
                | EngineError::NoDevices(_)
        )
    }
}

/// One status-code event surviving normalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    /// Device (turbine) identifier as it appears in the directory layout
    pub device_id: String,
    /// File name the event was read from
    pub source_file: String,
    /// 1-based line number in the source file, header lines included
    pub row_number: usize,
    /// Event time (UTC)
    pub timestamp: Timestamp,
    /// Status code (first token of the code column)
    pub code: String,
    /// English description (remainder of the code column)
    pub description_en: String,
}

/// Classification of an event against the configured sentinel codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SentinelKind {
    /// Turbine available / reset: the device is running again
    Start,
    /// Brake program active: the device stopped
    Stop,
    /// Anything else (fault-class codes included)
    Other,
}

/// A debounced START or STOP boundary, pointing into a device timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Boundary {
    /// Index of the boundary event in the merged timeline
    pub index: usize,
    pub kind: SentinelKind,
    /// True for the closing boundary appended after a trailing STOP
    pub synthetic: bool,
}

/// One stop→start interval with its identified trigger code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultEpisode {
    pub device_id: String,
    /// File holding the STOP event
    pub source_file: String,
    /// Line of the STOP event in `source_file`
    pub stop_row: usize,
    /// Line of the trigger event in its own file
    pub fault_row: usize,
    pub stop_time: Timestamp,
    pub fault_time: Timestamp,
    pub code: String,
    pub description_en: String,
    /// Localized description from the code map (or a placeholder)
    pub description_cn: String,
    /// Episode end minus `stop_time`; never negative
    pub duration: Duration,
}

impl FaultEpisode {
    /// Duration in fractional hours
    pub fn duration_hours(&self) -> f64 {
        duration_hours(self.duration)
    }
}

/// Dates for which a device's expected log file was absent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapRecord {
    pub device_id: String,
    pub dates: Vec<NaiveDate>,
}

impl GapRecord {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            dates: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Gap dates formatted as `YYYYMMDD`, matching the log file names
    pub fn date_labels(&self) -> Vec<String> {
        self.dates
            .iter()
            .map(|d| d.format("%Y%m%d").to_string())
            .collect()
    }
}

/// Convert a duration to fractional hours
pub fn duration_hours(duration: Duration) -> f64 {
    duration.num_milliseconds() as f64 / 3_600_000.0
}
