//! Multi-day merger
//!
//! Joins one device's per-day event sequences into a single chronological
//! timeline and records the days whose file was absent. The gap record is a
//! plain value owned by the device's result, so devices can be merged on
//! separate threads without sharing any state.

use crate::types::{GapRecord, RawEvent};
use chrono::NaiveDate;

/// Outcome of reading one day's file
#[derive(Debug, Clone, PartialEq)]
pub enum DayLog {
    /// File read (possibly empty)
    Loaded(Vec<RawEvent>),
    /// File absent: becomes a gap entry
    Missing,
    /// File present but unreadable: contributes nothing, not a gap
    Failed,
}

/// One device's merged timeline
#[derive(Debug, Clone, PartialEq)]
pub struct MergedTimeline {
    pub device_id: String,
    /// Events ordered by timestamp; ties keep day order, then row order
    pub events: Vec<RawEvent>,
    pub gaps: GapRecord,
}

/// Merge per-day reads into one timeline
///
/// The day list does not need to be sorted. Sorting by timestamp is stable,
/// so events sharing a timestamp stay in file/day order and then row order.
pub fn merge_days(device_id: &str, mut days: Vec<(NaiveDate, DayLog)>) -> MergedTimeline {
    days.sort_by_key(|(date, _)| *date);

    let mut gaps = GapRecord::new(device_id);
    let mut events = Vec::new();

    for (date, day) in days {
        match day {
            DayLog::Loaded(day_events) => events.extend(day_events),
            DayLog::Missing => gaps.dates.push(date),
            DayLog::Failed => {}
        }
    }

    events.sort_by_key(|e| e.timestamp);

    log::debug!(
        "Device {}: merged {} events, {} missing days",
        device_id,
        events.len(),
        gaps.dates.len()
    );

    MergedTimeline {
        device_id: device_id.to_string(),
        events,
        gaps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn event(file: &str, row: usize, d: u32, h: u32, m: u32, s: u32) -> RawEvent {
        RawEvent {
            device_id: "3".to_string(),
            source_file: file.to_string(),
            row_number: row,
            timestamp: Utc.with_ymd_and_hms(2024, 3, d, h, m, s).unwrap(),
            code: "1".to_string(),
            description_en: "SC_X".to_string(),
        }
    }

    #[test]
    fn test_merge_orders_and_records_gaps() {
        let days = vec![
            (date(4), DayLog::Loaded(vec![event("d4", 13, 4, 1, 0, 0)])),
            (date(1), DayLog::Loaded(vec![event("d1", 14, 1, 9, 0, 0), event("d1", 13, 1, 8, 0, 0)])),
            (date(3), DayLog::Missing),
            (date(2), DayLog::Failed),
            (date(5), DayLog::Missing),
        ];

        let merged = merge_days("3", days);
        let order: Vec<_> = merged
            .events
            .iter()
            .map(|e| (e.source_file.as_str(), e.row_number))
            .collect();
        assert_eq!(order, vec![("d1", 13), ("d1", 14), ("d4", 13)]);
        assert_eq!(merged.gaps.device_id, "3");
        assert_eq!(merged.gaps.dates, vec![date(3), date(5)]);
    }

    #[test]
    fn test_ties_keep_day_then_row_order() {
        // A late-day event duplicated at the start of the next day's file
        let days = vec![
            (date(2), DayLog::Loaded(vec![event("d2", 13, 1, 23, 59, 59), event("d2", 14, 1, 23, 59, 59)])),
            (date(1), DayLog::Loaded(vec![event("d1", 20, 1, 23, 59, 59)])),
        ];

        let merged = merge_days("3", days);
        let order: Vec<_> = merged
            .events
            .iter()
            .map(|e| (e.source_file.as_str(), e.row_number))
            .collect();
        assert_eq!(order, vec![("d1", 20), ("d2", 13), ("d2", 14)]);
    }

    #[test]
    fn test_all_missing() {
        let merged = merge_days("9", vec![(date(1), DayLog::Missing)]);
        assert!(merged.events.is_empty());
        assert_eq!(merged.gaps.dates, vec![date(1)]);
    }
}
