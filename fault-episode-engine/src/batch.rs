//! Batch orchestrator
//!
//! This module provides the primary interface for the engine library. The
//! [`Engine`] struct validates a run configuration, then drives
//! reader → merger → segmenter for every device and hands the collected
//! episodes and gaps to the aggregator.
//!
//! Devices are independent end to end and run in parallel; each returns its
//! own [`DeviceOutcome`] by value, which is merged once all devices finish.
//! Per-file problems never abort a run: a missing file becomes a gap, any
//! other read failure is logged and that day contributes nothing.

use crate::aggregator::{detail_table, parse_device_id, summarize_error_list, summary_table};
use crate::aggregator::{DetailTable, ErrorCodeSummary, SummaryTable};
use crate::codemap::CodeMap;
use crate::config::{parse_date, DateRange, EngineConfig, ErrorListLayout};
use crate::formats::{read_error_list, read_status_log, ErrorListEntry};
use crate::merger::{merge_days, DayLog};
use crate::segmenter::segment;
use crate::types::{EngineError, FaultEpisode, GapRecord, Result};
use chrono::NaiveDate;
use rayon::prelude::*;
use serde::Serialize;
use std::ops::AddAssign;
use std::path::Path;

/// Prefix of the pre-aggregated error-list file names
const ERROR_LIST_PREFIX: &str = "ErrorList";

/// Counters describing what a run read, skipped and dropped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub devices: usize,
    pub files_read: usize,
    /// Files read successfully that held no events
    pub files_empty: usize,
    pub files_missing: usize,
    /// Files present but unreadable
    pub files_failed: usize,
    pub rows_dropped: usize,
    pub rows_filtered: usize,
    /// Stop/start pairs without a trigger in the window
    pub unresolved_episodes: usize,
    pub unmapped_codes: usize,
    pub episodes: usize,
    pub excluded_episodes: usize,
}

impl AddAssign for RunStats {
    fn add_assign(&mut self, other: Self) {
        self.devices += other.devices;
        self.files_read += other.files_read;
        self.files_empty += other.files_empty;
        self.files_missing += other.files_missing;
        self.files_failed += other.files_failed;
        self.rows_dropped += other.rows_dropped;
        self.rows_filtered += other.rows_filtered;
        self.unresolved_episodes += other.unresolved_episodes;
        self.unmapped_codes += other.unmapped_codes;
        self.episodes += other.episodes;
        self.excluded_episodes += other.excluded_episodes;
    }
}

/// Everything one device contributed to a run
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceOutcome {
    pub device_id: String,
    pub episodes: Vec<FaultEpisode>,
    pub gaps: GapRecord,
    pub stats: RunStats,
}

/// Result of [`Engine::run`]
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutput {
    /// Devices processed, in processing order
    pub devices: Vec<String>,
    pub details: DetailTable,
    pub summary: SummaryTable,
    /// One record per device with at least one missing day
    pub gaps: Vec<GapRecord>,
    pub stats: RunStats,
}

/// Result of [`Engine::error_list_summary`]
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorListReport {
    pub device_id: String,
    pub rows: Vec<ErrorCodeSummary>,
    pub stats: RunStats,
}

/// The main engine struct - entry point for all batch operations
pub struct Engine {
    config: EngineConfig,
    /// Shared read-only by every device worker
    code_map: Option<CodeMap>,
}

impl Engine {
    /// Create a new engine
    ///
    /// Without a code map, every episode's localized description is `_`.
    pub fn new(config: EngineConfig, code_map: Option<CodeMap>) -> Self {
        Self { config, code_map }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn code_map(&self) -> Option<&CodeMap> {
        self.code_map.as_ref()
    }

    /// Configured devices, or every sub-directory of the root
    pub fn resolve_devices(&self) -> Result<Vec<String>> {
        if let Some(devices) = &self.config.devices {
            return Ok(devices.iter().map(|d| d.trim().to_string()).collect());
        }

        let mut devices = Vec::new();
        for entry in std::fs::read_dir(&self.config.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                devices.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        devices.sort_by_key(|d| (d.parse::<u32>().unwrap_or(u32::MAX), d.clone()));

        log::debug!("Discovered {} devices under {:?}", devices.len(), self.config.root);
        Ok(devices)
    }

    /// Check the run configuration before any log file is opened
    ///
    /// Returns the devices to process.
    pub fn validate(&self) -> Result<Vec<String>> {
        self.config.range.validate()?;
        self.config.detection.validate()?;

        let devices = self.resolve_devices()?;
        if devices.is_empty() {
            return Err(EngineError::NoDevices(self.config.root.clone()));
        }
        for device in &devices {
            parse_device_id(device)?;
        }

        Ok(devices)
    }

    /// Run the whole batch
    ///
    /// Only configuration errors are returned; per-file conditions are
    /// reported through [`RunOutput::stats`].
    pub fn run(&self) -> Result<RunOutput> {
        let devices = self.validate()?;
        let range = self.config.range;

        log::info!(
            "Processing {} devices from {} to {} ({} days)",
            devices.len(),
            range.start,
            range.end,
            range.days().len()
        );

        let outcomes: Vec<DeviceOutcome> = devices
            .par_iter()
            .map(|device| self.process_device(device))
            .collect();

        let mut stats = RunStats {
            devices: devices.len(),
            ..RunStats::default()
        };
        let mut episodes = Vec::new();
        let mut gaps = Vec::new();

        for outcome in outcomes {
            stats += outcome.stats;
            episodes.extend(outcome.episodes);
            if !outcome.gaps.is_empty() {
                gaps.push(outcome.gaps);
            }
        }

        let details = detail_table(episodes, &self.config.detection)?;
        stats.episodes = details.len();
        stats.excluded_episodes = details.excluded;
        let summary = summary_table(&details, &gaps, &devices)?;

        log::info!(
            "Run complete: {} episodes ({} excluded), {} unresolved, {} unmapped codes",
            stats.episodes,
            stats.excluded_episodes,
            stats.unresolved_episodes,
            stats.unmapped_codes
        );
        log::info!(
            "Files: {} read ({} empty), {} missing, {} failed; rows: {} dropped, {} filtered",
            stats.files_read,
            stats.files_empty,
            stats.files_missing,
            stats.files_failed,
            stats.rows_dropped,
            stats.rows_filtered
        );

        Ok(RunOutput {
            devices,
            details,
            summary,
            gaps,
            stats,
        })
    }

    /// Read, merge and segment one device over the configured range
    pub fn process_device(&self, device_id: &str) -> DeviceOutcome {
        let reads: Vec<(NaiveDate, DayLog, RunStats)> = self
            .config
            .range
            .days()
            .into_par_iter()
            .map(|date| {
                let (day, stats) = self.read_day(device_id, date);
                (date, day, stats)
            })
            .collect();

        let mut stats = RunStats::default();
        let mut days = Vec::with_capacity(reads.len());
        for (date, day, day_stats) in reads {
            stats += day_stats;
            days.push((date, day));
        }

        let timeline = merge_days(device_id, days);
        let outcome = segment(&timeline.events, &self.config.detection, self.code_map.as_ref());

        stats.unresolved_episodes += outcome.unresolved;
        stats.unmapped_codes += outcome.unmapped;

        log::debug!(
            "Device {}: {} episodes, {} unresolved",
            device_id,
            outcome.episodes.len(),
            outcome.unresolved
        );

        DeviceOutcome {
            device_id: device_id.to_string(),
            episodes: outcome.episodes,
            gaps: timeline.gaps,
            stats,
        }
    }

    fn read_day(&self, device_id: &str, date: NaiveDate) -> (DayLog, RunStats) {
        let path = self.config.log_path(device_id, date);
        let mut stats = RunStats::default();

        let day = match read_status_log(&path, device_id, &self.config.layout, &self.config.detection) {
            Ok(output) => {
                stats.files_read += 1;
                stats.rows_dropped += output.rows_dropped;
                stats.rows_filtered += output.rows_filtered;
                if output.is_empty() {
                    stats.files_empty += 1;
                    log::debug!("Device {} {}: {:?} has no events", device_id, date, path);
                } else {
                    log::debug!(
                        "Device {} {}: {} events from {:?}",
                        device_id,
                        date,
                        output.records.len(),
                        path
                    );
                }
                DayLog::Loaded(output.records)
            }
            Err(EngineError::FileMissing(_)) => {
                stats.files_missing += 1;
                log::info!("Device {} {}: missing {:?}", device_id, date, path);
                DayLog::Missing
            }
            Err(e) => {
                stats.files_failed += 1;
                log::error!("Device {} {}: failed to read {:?}: {}", device_id, date, path, e);
                DayLog::Failed
            }
        };

        (day, stats)
    }

    /// Per-code summary of a device's `ErrorList*.csv` files within the range
    pub fn error_list_summary(&self, device_id: &str) -> Result<ErrorListReport> {
        self.config.range.validate()?;

        let dir = self.config.device_dir(device_id);
        let (entries, mut stats) = collect_error_lists(&dir, &self.config.range, &self.config.error_list)?;
        let summary = summarize_error_list(&entries, self.code_map.as_ref());
        stats.unmapped_codes += summary.unmapped;
        let rows = summary.rows;

        log::info!(
            "Device {}: {} error-list rows in {} codes",
            device_id,
            entries.len(),
            rows.len()
        );

        Ok(ErrorListReport {
            device_id: device_id.to_string(),
            rows,
            stats,
        })
    }
}

/// Read every `ErrorList<date>.csv` in `dir` whose date lies inside `range`
///
/// Files are read in date order. A file that fails to parse is logged and
/// skipped.
pub fn collect_error_lists(
    dir: &Path,
    range: &DateRange,
    layout: &ErrorListLayout,
) -> Result<(Vec<ErrorListEntry>, RunStats)> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("csv") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let Some(date_part) = stem.strip_prefix(ERROR_LIST_PREFIX) else {
            continue;
        };
        match parse_date(date_part) {
            Ok(date) if range.contains(date) => files.push((date, path)),
            Ok(_) => {}
            Err(_) => log::debug!("Skipping {:?}: no date in file name", path),
        }
    }
    files.sort();

    let mut stats = RunStats::default();
    let mut entries = Vec::new();
    for (_, path) in files {
        match read_error_list(&path, layout) {
            Ok(output) => {
                stats.files_read += 1;
                stats.rows_dropped += output.rows_dropped;
                stats.rows_filtered += output.rows_filtered;
                entries.extend(output.records);
            }
            Err(e) => {
                stats.files_failed += 1;
                log::error!("Failed to read {:?}: {}", path, e);
            }
        }
    }

    Ok((entries, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_TRIGGER_WINDOW_SECS;

    fn config() -> EngineConfig {
        EngineConfig::new("/nonexistent/root")
            .with_range(DateRange::parse("20240301", "20240302").unwrap())
    }

    #[test]
    fn test_run_stats_add_assign() {
        let mut total = RunStats {
            files_read: 2,
            unresolved_episodes: 1,
            ..RunStats::default()
        };
        total += RunStats {
            files_read: 1,
            files_missing: 3,
            ..RunStats::default()
        };
        assert_eq!(total.files_read, 3);
        assert_eq!(total.files_missing, 3);
        assert_eq!(total.unresolved_episodes, 1);
    }

    #[test]
    fn test_invalid_device_id_fails_fast() {
        let engine = Engine::new(config().with_devices(["1", "WT-2"]), None);
        let err = engine.run().unwrap_err();
        assert!(matches!(err, EngineError::InvalidDeviceId(ref id) if id == "WT-2"));
    }

    #[test]
    fn test_invalid_date_range_fails_fast() {
        let mut config = config().with_devices(["1"]);
        config.range.start = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let err = Engine::new(config, None).run().unwrap_err();
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_invalid_trigger_window_fails_fast() {
        for secs in [-5, MAX_TRIGGER_WINDOW_SECS + 1, i64::MAX / 100] {
            let config = config().with_devices(["1"]).with_trigger_window_secs(secs);
            let err = Engine::new(config, None).run().unwrap_err();
            assert!(matches!(err, EngineError::InvalidTriggerWindow(s) if s == secs));
            assert!(err.is_configuration_error());
        }

        let config = config().with_devices(["1"]).with_trigger_window_secs(0);
        assert!(Engine::new(config, None).run().is_ok());
    }

    #[test]
    fn test_no_devices() {
        let engine = Engine::new(config().with_devices(Vec::<String>::new()), None);
        assert!(matches!(engine.run(), Err(EngineError::NoDevices(_))));
    }

    #[test]
    fn test_all_files_missing_yields_gaps_only() {
        let engine = Engine::new(config().with_devices(["4"]), None);
        let output = engine.run().unwrap();

        assert!(output.details.is_empty());
        assert_eq!(output.stats.files_missing, 2);
        assert_eq!(output.gaps.len(), 1);
        assert_eq!(output.gaps[0].date_labels(), vec!["20240301", "20240302"]);
        assert_eq!(output.summary.rows.len(), 1);
    }
}
