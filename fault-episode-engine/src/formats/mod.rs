//! Log file readers
//!
//! This module contains readers for the two log layouts the engine consumes:
//! the tab-delimited per-day status-code buffers and the pre-aggregated
//! `ErrorList*.csv` exports. Both tolerate bad rows: a row that fails to parse
//! is dropped and counted, it never aborts the file.

pub mod error_list;
pub mod status_log;

// Re-export reader entry points
pub use error_list::{parse_negated_duration, read_error_list, ErrorListEntry};
pub use status_log::{parse_timestamp, read_status_log};

/// Records read from one file plus the per-row bookkeeping
#[derive(Debug, Clone, PartialEq)]
pub struct ReadOutput<T> {
    pub records: Vec<T>,
    /// Rows that failed to parse
    pub rows_dropped: usize,
    /// Rows parsed but rejected by a content filter
    pub rows_filtered: usize,
}

impl<T> Default for ReadOutput<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            rows_dropped: 0,
            rows_filtered: 0,
        }
    }
}

impl<T> ReadOutput<T> {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
