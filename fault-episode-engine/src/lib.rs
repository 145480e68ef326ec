//! Fault Episode Engine Library
//!
//! Derives fault episodes from wind-turbine status-code logs: the interval
//! between a stop (brake program active) and the matching restart (turbine
//! available), together with the first fault code seen around the stop.
//! Episodes are aggregated into per-device, per-code statistics over a date
//! range, alongside the days whose log file was missing.
//!
//! # Architecture
//!
//! Data flows strictly downward:
//! - `formats` reads one device/day file into normalized events
//! - `merger` joins a device's days into one timeline and records gaps
//! - `segmenter` finds stop/start boundaries and the trigger of each episode
//! - `aggregator` builds the detail and summary tables
//! - `batch` drives the pipeline across devices and dates
//!
//! The library does NOT:
//! - Render HTML pages or charts
//! - Persist results between runs
//! - Choose output file names or formats
//!
//! Those concerns live in the application layer (fault-episode-cli).
//!
//! # Example Usage
//!
//! ```no_run
//! use fault_episode_engine::{CodeMapColumns, DateRange, Engine, EngineConfig};
//! use std::path::Path;
//!
//! let code_map = fault_episode_engine::parse_code_map_file(
//!     Path::new("config/fault_map.csv"),
//!     &CodeMapColumns::default(),
//! )
//! .unwrap();
//!
//! let config = EngineConfig::new("/data/Statuscode")
//!     .with_devices(["1", "2", "3"])
//!     .with_range(DateRange::parse("20240301", "20240331").unwrap());
//!
//! let output = Engine::new(config, Some(code_map)).run().unwrap();
//! for episode in &output.details.rows {
//!     println!(
//!         "{} {} {} {:.2}h",
//!         episode.device_id,
//!         episode.stop_time,
//!         episode.code,
//!         episode.duration_hours()
//!     );
//! }
//! ```

// Public modules
pub mod aggregator;
pub mod batch;
pub mod codemap;
pub mod config;
pub mod formats;
pub mod merger;
pub mod segmenter;
pub mod types;

// Re-export main types for convenience
pub use aggregator::{
    CodeSummary, DetailTable, ErrorCodeSummary, ErrorListSummary, SummaryRow, SummaryTable,
};
pub use batch::{DeviceOutcome, Engine, ErrorListReport, RunOutput, RunStats};
pub use codemap::{parse_code_map_file, CodeEntry, CodeMap, CodeMapColumns, NO_CODE_MAP, NO_MAPPING};
pub use config::{DateRange, DetectionConfig, EngineConfig, ErrorListLayout, LogLayout};
pub use types::{
    duration_hours, Boundary, EngineError, FaultEpisode, GapRecord, RawEvent, Result,
    SentinelKind, Timestamp,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_basics() {
        // Smoke test: an engine without a code map
        let engine = Engine::new(EngineConfig::new("."), None);
        assert!(engine.code_map().is_none());
        assert_eq!(engine.config().detection.trigger_window_secs, 60);
    }
}
