//! Engine configuration types
//!
//! This module defines everything a run needs to know: where the logs live,
//! which devices and dates to read, how the files are laid out, and which codes
//! act as sentinels. Presentation concerns (output format, file names of the
//! exported tables) are handled by the application layer.

use crate::types::{EngineError, Result, SentinelKind};
use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default START sentinel (turbine available / fault reset)
pub const DEFAULT_START_CODE: &str = "SC_TURBINE_AVAILABLE";
/// Default STOP sentinel (brake program active)
pub const DEFAULT_STOP_CODE: &str = "OC_BrakeProgramActive";
/// Default prefix of fault-class descriptions (matched case-insensitively)
pub const DEFAULT_FAULT_PREFIX: &str = "SC_";
/// Largest accepted trigger window half-width (one day)
pub const MAX_TRIGGER_WINDOW_SECS: i64 = 86_400;
/// Known non-fault code dropped from the result tables
pub const DEFAULT_EXCLUDED_CODE: &str = "SC_WaitingForWind";

/// Configuration for one engine run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory holding one sub-directory per device
    pub root: PathBuf,

    /// Devices to process (None = every sub-directory of `root`)
    #[serde(default)]
    pub devices: Option<Vec<String>>,

    /// Inclusive date window
    #[serde(default = "DateRange::default_window")]
    pub range: DateRange,

    #[serde(default)]
    pub detection: DetectionConfig,

    #[serde(default)]
    pub layout: LogLayout,

    #[serde(default)]
    pub error_list: ErrorListLayout,
}

/// Sentinel codes, fault prefix and trigger window
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DetectionConfig {
    /// Half-width of the trigger search window around a STOP, in seconds
    #[serde(default = "default_trigger_window_secs")]
    pub trigger_window_secs: i64,

    #[serde(default = "default_start_code")]
    pub start_code: String,

    #[serde(default = "default_stop_code")]
    pub stop_code: String,

    #[serde(default = "default_fault_prefix")]
    pub fault_prefix: String,

    /// Descriptions removed from the result tables (non-fault codes)
    #[serde(default = "default_excluded_codes")]
    pub excluded_codes: Vec<String>,
}

/// Layout of the per-device, per-day status-code files
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogLayout {
    /// Tag between `Buffer` and the date in the file name
    #[serde(default = "default_file_tag")]
    pub file_tag: String,

    #[serde(default = "default_extension")]
    pub extension: String,

    /// Lines preceding the column header line
    #[serde(default = "default_header_lines")]
    pub header_lines: usize,

    #[serde(default = "default_timestamp_column")]
    pub timestamp_column: String,

    /// Column holding "code description"
    #[serde(default = "default_code_column")]
    pub code_column: String,
}

/// Layout of the pre-aggregated `ErrorList*.csv` files
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorListLayout {
    #[serde(default = "default_error_list_header")]
    pub header_lines: usize,

    #[serde(default = "default_error_list_footer")]
    pub footer_lines: usize,
}

/// Inclusive range of calendar days
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

fn default_trigger_window_secs() -> i64 {
    60
}

fn default_start_code() -> String {
    DEFAULT_START_CODE.to_string()
}

fn default_stop_code() -> String {
    DEFAULT_STOP_CODE.to_string()
}

fn default_fault_prefix() -> String {
    DEFAULT_FAULT_PREFIX.to_string()
}

fn default_excluded_codes() -> Vec<String> {
    vec![DEFAULT_EXCLUDED_CODE.to_string()]
}

fn default_file_tag() -> String {
    "Statuscodes".to_string()
}

fn default_extension() -> String {
    "txt".to_string()
}

fn default_header_lines() -> usize {
    11
}

fn default_timestamp_column() -> String {
    "TimeStampUTC".to_string()
}

fn default_code_column() -> String {
    "TrigKey".to_string()
}

fn default_error_list_header() -> usize {
    8
}

fn default_error_list_footer() -> usize {
    1
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            trigger_window_secs: default_trigger_window_secs(),
            start_code: default_start_code(),
            stop_code: default_stop_code(),
            fault_prefix: default_fault_prefix(),
            excluded_codes: default_excluded_codes(),
        }
    }
}

impl DetectionConfig {
    /// Reject a trigger window that is negative or wider than a day
    pub fn validate(&self) -> Result<()> {
        if !(0..=MAX_TRIGGER_WINDOW_SECS).contains(&self.trigger_window_secs) {
            return Err(EngineError::InvalidTriggerWindow(self.trigger_window_secs));
        }
        Ok(())
    }

    /// The trigger window half-width as a duration
    ///
    /// Clamped to the range [`DetectionConfig::validate`] accepts.
    pub fn trigger_window(&self) -> Duration {
        Duration::seconds(self.trigger_window_secs.clamp(0, MAX_TRIGGER_WINDOW_SECS))
    }

    /// Classify a description against the sentinel codes
    pub fn classify(&self, description: &str) -> SentinelKind {
        if description == self.start_code {
            SentinelKind::Start
        } else if description == self.stop_code {
            SentinelKind::Stop
        } else {
            SentinelKind::Other
        }
    }

    /// True if the description carries the fault prefix (case-insensitive)
    pub fn is_fault_class(&self, description: &str) -> bool {
        description
            .get(..self.fault_prefix.len())
            .map_or(false, |head| head.eq_ignore_ascii_case(&self.fault_prefix))
    }

    /// True if the event may be reported as the trigger of an episode
    pub fn is_trigger_candidate(&self, description: &str) -> bool {
        self.is_fault_class(description) && description != self.start_code
    }

    /// Reader-level filter: fault-class events and STOP sentinels survive
    pub fn keeps(&self, description: &str) -> bool {
        self.is_fault_class(description) || description == self.stop_code
    }

    pub fn is_excluded(&self, description: &str) -> bool {
        self.excluded_codes.iter().any(|c| c == description)
    }
}

impl Default for LogLayout {
    fn default() -> Self {
        Self {
            file_tag: default_file_tag(),
            extension: default_extension(),
            header_lines: default_header_lines(),
            timestamp_column: default_timestamp_column(),
            code_column: default_code_column(),
        }
    }
}

impl LogLayout {
    /// File name for one day, e.g. `BufferStatuscodes20240301.txt`
    pub fn file_name(&self, date: NaiveDate) -> String {
        format!(
            "Buffer{}{}.{}",
            self.file_tag,
            date.format("%Y%m%d"),
            self.extension
        )
    }
}

impl Default for ErrorListLayout {
    fn default() -> Self {
        Self {
            header_lines: default_error_list_header(),
            footer_lines: default_error_list_footer(),
        }
    }
}

impl DateRange {
    /// Create a validated inclusive range
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        let range = Self { start, end };
        range.validate()?;
        Ok(range)
    }

    /// Parse both ends with [`parse_date`]
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        Self::new(parse_date(start)?, parse_date(end)?)
    }

    /// `days` days ending the day before `today`
    pub fn rolling(today: NaiveDate, days: i64) -> Self {
        let end = today - Duration::days(1);
        Self {
            start: end - Duration::days(days),
            end,
        }
    }

    /// Rolling 30-day window ending yesterday (UTC)
    pub fn default_window() -> Self {
        Self::rolling(Utc::now().date_naive(), 30)
    }

    pub fn validate(&self) -> Result<()> {
        if self.start > self.end {
            return Err(EngineError::InvalidDateRange {
                start: self.start,
                end: self.end,
            });
        }
        Ok(())
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Every day in the range, in order
    pub fn days(&self) -> Vec<NaiveDate> {
        self.start
            .iter_days()
            .take_while(|d| *d <= self.end)
            .collect()
    }
}

/// Parse a date written as `YYYYMMDD` or `YYYY-MM-DD`
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y%m%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .map_err(|_| EngineError::InvalidDate(s.to_string()))
}

impl EngineConfig {
    /// Create a configuration with default layout and detection settings
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            devices: None,
            range: DateRange::default_window(),
            detection: DetectionConfig::default(),
            layout: LogLayout::default(),
            error_list: ErrorListLayout::default(),
        }
    }

    /// Builder method: restrict the run to these devices
    pub fn with_devices<I, S>(mut self, devices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.devices = Some(devices.into_iter().map(Into::into).collect());
        self
    }

    /// Builder method: set the date window
    pub fn with_range(mut self, range: DateRange) -> Self {
        self.range = range;
        self
    }

    /// Builder method: set the trigger window half-width in seconds
    pub fn with_trigger_window_secs(mut self, secs: i64) -> Self {
        self.detection.trigger_window_secs = secs;
        self
    }

    /// Builder method: set the number of lines before the column header
    pub fn with_header_lines(mut self, lines: usize) -> Self {
        self.layout.header_lines = lines;
        self
    }

    /// Builder method: replace the sentinel codes
    pub fn with_sentinels(mut self, start: impl Into<String>, stop: impl Into<String>) -> Self {
        self.detection.start_code = start.into();
        self.detection.stop_code = stop.into();
        self
    }

    /// Builder method: set the fault-class prefix
    pub fn with_fault_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.detection.fault_prefix = prefix.into();
        self
    }

    /// Path of one device's log file for one day
    pub fn log_path(&self, device_id: &str, date: NaiveDate) -> PathBuf {
        self.device_dir(device_id).join(self.layout.file_name(date))
    }

    pub fn device_dir(&self, device_id: &str) -> PathBuf {
        self.root.join(device_id)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_engine_config_builder() {
        let config = EngineConfig::new("/data/Statuscode")
            .with_devices(["1", "2"])
            .with_range(DateRange::new(date(2024, 1, 1), date(2024, 1, 5)).unwrap())
            .with_trigger_window_secs(30)
            .with_header_lines(5);

        assert_eq!(config.devices, Some(vec!["1".to_string(), "2".to_string()]));
        assert_eq!(config.detection.trigger_window(), Duration::seconds(30));
        assert_eq!(config.layout.header_lines, 5);
        assert_eq!(
            config.log_path("1", date(2024, 1, 2)),
            PathBuf::from("/data/Statuscode/1/BufferStatuscodes20240102.txt")
        );
    }

    #[test]
    fn test_classify_and_filter() {
        let detection = DetectionConfig::default();

        assert_eq!(detection.classify("SC_TURBINE_AVAILABLE"), SentinelKind::Start);
        assert_eq!(detection.classify("OC_BrakeProgramActive"), SentinelKind::Stop);
        assert_eq!(detection.classify("SC_GridLoss"), SentinelKind::Other);

        assert!(detection.is_fault_class("sc_lowercase_fault"));
        assert!(detection.is_trigger_candidate("SC_GridLoss"));
        assert!(!detection.is_trigger_candidate("SC_TURBINE_AVAILABLE"));
        assert!(detection.keeps("OC_BrakeProgramActive"));
        assert!(!detection.keeps("OC_YawRunning"));
        assert!(!detection.keeps("S"));
        assert!(detection.is_excluded("SC_WaitingForWind"));
    }

    #[test]
    fn test_trigger_window_validation() {
        let mut detection = DetectionConfig::default();
        assert!(detection.validate().is_ok());
        assert_eq!(detection.trigger_window(), Duration::seconds(60));

        detection.trigger_window_secs = -5;
        assert!(matches!(detection.validate(), Err(EngineError::InvalidTriggerWindow(-5))));
        assert_eq!(detection.trigger_window(), Duration::zero());

        detection.trigger_window_secs = i64::MAX / 100;
        assert!(detection.validate().is_err());
        assert_eq!(detection.trigger_window(), Duration::seconds(MAX_TRIGGER_WINDOW_SECS));
    }

    #[test]
    fn test_date_range() {
        let range = DateRange::parse("20240228", "2024-03-01").unwrap();
        assert_eq!(
            range.days(),
            vec![date(2024, 2, 28), date(2024, 2, 29), date(2024, 3, 1)]
        );
        assert!(range.contains(date(2024, 2, 29)));
        assert!(!range.contains(date(2024, 3, 2)));

        let err = DateRange::new(date(2024, 3, 2), date(2024, 3, 1)).unwrap_err();
        assert!(matches!(err, EngineError::InvalidDateRange { .. }));
        assert!(parse_date("2024/03/01").is_err());
    }

    #[test]
    fn test_rolling_window_ends_yesterday() {
        let range = DateRange::rolling(date(2024, 5, 31), 30);
        assert_eq!(range.end, date(2024, 5, 30));
        assert_eq!(range.start, date(2024, 4, 30));
    }
}
