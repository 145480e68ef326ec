//! Aggregation of episodes into result tables
//!
//! Produces the two tables a run hands to its caller:
//! - the detail table, one row per fault episode, ordered by numeric device id
//! - the summary table, one row per (device, code) plus one gap row per device
//!
//! The per-code summary of pre-aggregated error lists lives here as well.

use crate::codemap::{CodeMap, NO_CODE_MAP};
use crate::config::DetectionConfig;
use crate::formats::ErrorListEntry;
use crate::types::{EngineError, FaultEpisode, GapRecord, Result};
use chrono::{Duration, NaiveDate};
use std::collections::{BTreeMap, BTreeSet};

/// Normalize a device id to its numeric form
pub fn parse_device_id(raw: &str) -> Result<u32> {
    raw.trim()
        .parse()
        .map_err(|_| EngineError::InvalidDeviceId(raw.to_string()))
}

/// One row per fault episode
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetailTable {
    pub rows: Vec<FaultEpisode>,
    /// Episodes removed because their code is a known non-fault
    pub excluded: usize,
}

impl DetailTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Count and total downtime of one code on one device
#[derive(Debug, Clone, PartialEq)]
pub struct CodeSummary {
    pub device_id: u32,
    pub code: String,
    pub count: usize,
    /// Descriptions of the earliest episode with this code
    pub description_en: String,
    pub description_cn: String,
    pub total_duration: Duration,
}

/// Summary table row
#[derive(Debug, Clone, PartialEq)]
pub enum SummaryRow {
    Code(CodeSummary),
    /// Missing log days of a device, listed for visibility only
    Gaps { device_id: u32, dates: Vec<NaiveDate> },
}

impl SummaryRow {
    pub fn device_id(&self) -> u32 {
        match self {
            SummaryRow::Code(summary) => summary.device_id,
            SummaryRow::Gaps { device_id, .. } => *device_id,
        }
    }
}

/// Per-device, per-code statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummaryTable {
    pub rows: Vec<SummaryRow>,
}

impl SummaryTable {
    /// Statistical rows only
    pub fn code_rows(&self) -> impl Iterator<Item = &CodeSummary> {
        self.rows.iter().filter_map(|row| match row {
            SummaryRow::Code(summary) => Some(summary),
            SummaryRow::Gaps { .. } => None,
        })
    }

    /// Gap dates of one device
    pub fn gap_dates(&self, device_id: u32) -> Option<&[NaiveDate]> {
        self.rows.iter().find_map(|row| match row {
            SummaryRow::Gaps { device_id: id, dates } if *id == device_id => Some(dates.as_slice()),
            _ => None,
        })
    }
}

/// Build the detail table
///
/// Drops excluded (non-fault) codes and orders rows by numeric device id;
/// the sort is stable, so each device keeps its stop-time order.
pub fn detail_table(episodes: Vec<FaultEpisode>, detection: &DetectionConfig) -> Result<DetailTable> {
    let total = episodes.len();
    let mut keyed = episodes
        .into_iter()
        .filter(|e| !detection.is_excluded(&e.description_en))
        .map(|e| Ok((parse_device_id(&e.device_id)?, e)))
        .collect::<Result<Vec<_>>>()?;

    keyed.sort_by_key(|(id, _)| *id);

    let rows: Vec<FaultEpisode> = keyed.into_iter().map(|(_, e)| e).collect();
    Ok(DetailTable {
        excluded: total - rows.len(),
        rows,
    })
}

/// Build the summary table
///
/// Every device in `devices`, in the detail table, or in `gaps` gets a gap row
/// (possibly empty) after its code rows. Devices ascend numerically, codes
/// ascend lexically within a device.
pub fn summary_table(details: &DetailTable, gaps: &[GapRecord], devices: &[String]) -> Result<SummaryTable> {
    let mut device_ids = BTreeSet::new();
    for device in devices {
        device_ids.insert(parse_device_id(device)?);
    }

    let mut gap_dates: BTreeMap<u32, Vec<NaiveDate>> = BTreeMap::new();
    for gap in gaps {
        let id = parse_device_id(&gap.device_id)?;
        device_ids.insert(id);
        gap_dates.entry(id).or_default().extend(gap.dates.iter().copied());
    }

    let mut codes: BTreeMap<(u32, String), CodeSummary> = BTreeMap::new();
    for episode in &details.rows {
        let id = parse_device_id(&episode.device_id)?;
        device_ids.insert(id);
        codes
            .entry((id, episode.code.clone()))
            .and_modify(|s| {
                s.count += 1;
                s.total_duration = s.total_duration + episode.duration;
            })
            .or_insert_with(|| CodeSummary {
                device_id: id,
                code: episode.code.clone(),
                count: 1,
                description_en: episode.description_en.clone(),
                description_cn: episode.description_cn.clone(),
                total_duration: episode.duration,
            });
    }

    let mut rows = Vec::with_capacity(codes.len() + device_ids.len());
    let mut codes = codes.into_values().peekable();
    for id in device_ids {
        while let Some(summary) = codes.next_if(|s| s.device_id == id) {
            rows.push(SummaryRow::Code(summary));
        }
        let mut dates = gap_dates.remove(&id).unwrap_or_default();
        dates.sort();
        dates.dedup();
        rows.push(SummaryRow::Gaps { device_id: id, dates });
    }

    Ok(SummaryTable { rows })
}

/// Per-code summary of error-list rows
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorCodeSummary {
    pub code: String,
    pub description_en: String,
    pub description_cn: String,
    pub severity: Option<String>,
    pub count: usize,
    pub total_duration: Duration,
}

/// Per-code error-list rows plus the number of rows without a code map entry
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorListSummary {
    pub rows: Vec<ErrorCodeSummary>,
    pub unmapped: usize,
}

/// Group error-list rows by code, ordered by code
pub fn summarize_error_list(entries: &[ErrorListEntry], code_map: Option<&CodeMap>) -> ErrorListSummary {
    let mut groups: BTreeMap<&str, ErrorCodeSummary> = BTreeMap::new();
    let mut unmapped = 0;

    for entry in entries {
        if code_map.map_or(false, |m| m.lookup(&entry.code).is_none()) {
            unmapped += 1;
        }

        groups
            .entry(entry.code.as_str())
            .and_modify(|s| {
                s.count += 1;
                s.total_duration = s.total_duration + entry.duration;
            })
            .or_insert_with(|| ErrorCodeSummary {
                code: entry.code.clone(),
                description_en: entry.description_en.clone(),
                description_cn: code_map
                    .map(|m| m.describe(&entry.code).to_string())
                    .unwrap_or_else(|| NO_CODE_MAP.to_string()),
                severity: code_map.and_then(|m| m.severity(&entry.code)).map(str::to_string),
                count: 1,
                total_duration: entry.duration,
            });
    }

    ErrorListSummary {
        rows: groups.into_values().collect(),
        unmapped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codemap::{CodeEntry, NO_MAPPING};
    use chrono::{TimeZone, Utc};

    fn episode(device: &str, code: &str, description: &str, hour: u32, minutes: i64) -> FaultEpisode {
        let stop = Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap();
        FaultEpisode {
            device_id: device.to_string(),
            source_file: "BufferStatuscodes20240301.txt".to_string(),
            stop_row: 20,
            fault_row: 21,
            stop_time: stop,
            fault_time: stop,
            code: code.to_string(),
            description_en: description.to_string(),
            description_cn: format!("{}-cn", description),
            duration: Duration::minutes(minutes),
        }
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn test_parse_device_id() {
        assert_eq!(parse_device_id(" 12 ").unwrap(), 12);
        assert_eq!(parse_device_id("007").unwrap(), 7);
        assert!(matches!(parse_device_id("001#"), Err(EngineError::InvalidDeviceId(_))));
    }

    #[test]
    fn test_detail_table_sorts_numerically_and_excludes() {
        let episodes = vec![
            episode("10", "1001", "SC_GridLoss", 1, 30),
            episode("9", "1002", "SC_WaitingForWind", 2, 30),
            episode("9", "1003", "SC_PitchFault", 3, 30),
            episode("10", "1001", "SC_GridLoss", 4, 30),
            episode("9", "1001", "SC_GridLoss", 5, 30),
        ];

        let table = detail_table(episodes, &DetectionConfig::default()).unwrap();
        assert_eq!(table.excluded, 1);
        let order: Vec<_> = table.rows.iter().map(|e| (e.device_id.as_str(), e.code.as_str())).collect();
        assert_eq!(
            order,
            vec![("9", "1003"), ("9", "1001"), ("10", "1001"), ("10", "1001")]
        );
    }

    #[test]
    fn test_detail_table_rejects_bad_device_id() {
        let err = detail_table(vec![episode("WT-1", "1", "SC_X", 1, 1)], &DetectionConfig::default()).unwrap_err();
        assert!(matches!(err, EngineError::InvalidDeviceId(_)));
    }

    #[test]
    fn test_summary_groups_and_gap_rows() {
        let details = detail_table(
            vec![
                episode("2", "1002", "SC_PitchFault", 1, 30),
                episode("2", "1001", "SC_GridLoss", 2, 60),
                episode("2", "1001", "SC_GridLoss_later", 3, 90),
                episode("1", "1001", "SC_GridLoss", 4, 15),
            ],
            &DetectionConfig::default(),
        )
        .unwrap();

        let gaps = vec![GapRecord {
            device_id: "2".to_string(),
            dates: vec![date(5), date(3)],
        }];
        let devices = vec!["1".to_string(), "2".to_string(), "3".to_string()];

        let summary = summary_table(&details, &gaps, &devices).unwrap();
        let ids: Vec<u32> = summary.rows.iter().map(SummaryRow::device_id).collect();
        assert_eq!(ids, vec![1, 1, 2, 2, 2, 3]);

        let codes: Vec<_> = summary.code_rows().collect();
        assert_eq!(codes.len(), 3);
        assert_eq!((codes[0].device_id, codes[0].code.as_str(), codes[0].count), (1, "1001", 1));

        let grid_loss = codes[1];
        assert_eq!((grid_loss.device_id, grid_loss.code.as_str()), (2, "1001"));
        assert_eq!(grid_loss.count, 2);
        assert_eq!(grid_loss.description_en, "SC_GridLoss");
        assert_eq!(grid_loss.total_duration, Duration::minutes(150));

        assert_eq!(codes[2].code, "1002");

        assert_eq!(summary.gap_dates(2), Some(&[date(3), date(5)][..]));
        assert_eq!(summary.gap_dates(1), Some(&[][..]));
        assert_eq!(summary.gap_dates(3), Some(&[][..]));
        assert_eq!(summary.gap_dates(4), None);
    }

    #[test]
    fn test_summarize_error_list() {
        let entry = |code: &str, secs: i64| ErrorListEntry {
            seq_no: "1".to_string(),
            trigger_time: "2024-06-01 10:00:00".to_string(),
            description_en: format!("{}_SC_Something", code),
            code: code.to_string(),
            reset_time: String::new(),
            duration: Duration::seconds(secs),
        };

        let mut map = CodeMap::new();
        map.insert(
            "A01",
            CodeEntry {
                description: "发电机过温".to_string(),
                severity: Some("3".to_string()),
            },
        );

        let entries = vec![entry("B02", 60), entry("A01", 5), entry("A01", 3600), entry("B02", 1)];
        let ErrorListSummary { rows: summary, unmapped } = summarize_error_list(&entries, Some(&map));
        assert_eq!(unmapped, 2);

        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].code, "A01");
        assert_eq!(summary[0].count, 2);
        assert_eq!(summary[0].total_duration, Duration::seconds(3605));
        assert_eq!(summary[0].severity.as_deref(), Some("3"));
        assert_eq!(summary[0].description_cn, "发电机过温");
        assert_eq!(summary[1].description_cn, NO_MAPPING);
        assert_eq!(summary[1].severity, None);

        let without_map = summarize_error_list(&entries, None);
        assert_eq!(without_map.unmapped, 0);
        assert_eq!(without_map.rows[0].description_cn, NO_CODE_MAP);
    }
}
