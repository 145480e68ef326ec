//! Status-code buffer reader
//!
//! Parses one `Buffer<Tag><YYYYMMDD>.txt` file into normalized [`RawEvent`]s.
//!
//! ## File layout
//! - A fixed block of preamble lines (11 by default), skipped verbatim
//! - One tab-delimited header line naming the columns
//! - Tab-delimited data rows; data rows often carry a trailing tab the header
//!   lacks, so rows are read with flexible widths
//!
//! Only two columns matter: the UTC timestamp (`DD.MM.YYYY HH:MM:SS,fff`) and
//! the combined "code description" column. Both are located by header name.

use crate::config::{DetectionConfig, LogLayout};
use crate::formats::ReadOutput;
use crate::types::{EngineError, RawEvent, Result, Timestamp};
use chrono::{NaiveDateTime, TimeZone, Utc};
use std::borrow::Cow;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// Read one device/day status-code file
///
/// Returns [`EngineError::FileMissing`] when the file does not exist; the
/// orchestrator turns that into a gap entry. A file with nothing after the
/// preamble is a valid empty result.
pub fn read_status_log(
    path: &Path,
    device_id: &str,
    layout: &LogLayout,
    detection: &DetectionConfig,
) -> Result<ReadOutput<RawEvent>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(EngineError::FileMissing(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };

    let source_file = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "_".to_string());

    let output = parse_status_log(
        BufReader::new(file),
        path,
        device_id,
        &source_file,
        layout,
        detection,
    )?;

    log::trace!(
        "{:?}: {} events kept, {} filtered, {} dropped",
        path,
        output.records.len(),
        output.rows_filtered,
        output.rows_dropped
    );

    Ok(output)
}

/// Parse status-code rows from any buffered reader
pub fn parse_status_log<R: BufRead>(
    mut reader: R,
    path: &Path,
    device_id: &str,
    source_file: &str,
    layout: &LogLayout,
    detection: &DetectionConfig,
) -> Result<ReadOutput<RawEvent>> {
    let mut output = ReadOutput::default();

    // Preamble
    let mut line = Vec::new();
    for _ in 0..layout.header_lines {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            return Ok(output);
        }
    }

    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = csv_reader.byte_headers()?.clone();
    if headers.iter().all(|h| h.iter().all(u8::is_ascii_whitespace)) {
        return Ok(output);
    }

    let find = |name: &str| -> Result<usize> {
        headers
            .iter()
            .position(|h| lossy_trim(h) == name)
            .ok_or_else(|| EngineError::MissingColumn {
                path: path.to_path_buf(),
                column: name.to_string(),
            })
    };
    let timestamp_idx = find(&layout.timestamp_column)?;
    let code_idx = find(&layout.code_column)?;

    for record in csv_reader.byte_records() {
        let record = record?;
        let line = record.position().map(|p| p.line() as usize).unwrap_or(0);
        let row_number = layout.header_lines + line;

        let timestamp = record
            .get(timestamp_idx)
            .and_then(|raw| parse_timestamp(&lossy_trim(raw)));
        let split = record
            .get(code_idx)
            .and_then(|raw| split_code_column(&lossy_trim(raw)));

        let (timestamp, (code, description_en)) = match (timestamp, split) {
            (Some(ts), Some(split)) => (ts, split),
            _ => {
                log::trace!("{}:{} dropped (unparsable row)", source_file, row_number);
                output.rows_dropped += 1;
                continue;
            }
        };

        if !detection.keeps(&description_en) {
            output.rows_filtered += 1;
            continue;
        }

        output.records.push(RawEvent {
            device_id: device_id.to_string(),
            source_file: source_file.to_string(),
            row_number,
            timestamp,
            code,
            description_en,
        });
    }

    Ok(output)
}

/// Parse a `DD.MM.YYYY HH:MM:SS,fff` timestamp as UTC
pub fn parse_timestamp(raw: &str) -> Option<Timestamp> {
    let normalized = raw.trim().replacen(',', ".", 1);
    NaiveDateTime::parse_from_str(&normalized, "%d.%m.%Y %H:%M:%S%.f")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Split "code description" at the first whitespace run
fn split_code_column(raw: &str) -> Option<(String, String)> {
    let (code, rest) = raw.split_once(char::is_whitespace)?;
    let description = rest.trim();
    if code.is_empty() || description.is_empty() {
        return None;
    }
    Some((code.to_string(), description.to_string()))
}

fn lossy_trim(bytes: &[u8]) -> Cow<'_, str> {
    match String::from_utf8_lossy(bytes) {
        Cow::Borrowed(s) => Cow::Borrowed(s.trim()),
        Cow::Owned(s) => Cow::Owned(s.trim().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    fn layout(header_lines: usize) -> LogLayout {
        LogLayout {
            header_lines,
            ..LogLayout::default()
        }
    }

    fn parse(content: &str, header_lines: usize) -> Result<ReadOutput<RawEvent>> {
        parse_status_log(
            content.as_bytes(),
            Path::new("BufferStatuscodes20240301.txt"),
            "12",
            "BufferStatuscodes20240301.txt",
            &layout(header_lines),
            &DetectionConfig::default(),
        )
    }

    #[test]
    fn test_parse_timestamp() {
        let ts = parse_timestamp(" 01.03.2024 10:00:05,250 ").unwrap();
        assert_eq!((ts.year(), ts.month(), ts.day()), (2024, 3, 1));
        assert_eq!((ts.hour(), ts.minute(), ts.second()), (10, 0, 5));
        assert_eq!(ts.timestamp_subsec_millis(), 250);

        assert!(parse_timestamp("2024-03-01 10:00:05").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn test_split_code_column() {
        assert_eq!(
            split_code_column("1001   SC_GridLoss"),
            Some(("1001".to_string(), "SC_GridLoss".to_string()))
        );
        assert_eq!(split_code_column("1001"), None);
        assert_eq!(split_code_column(""), None);
    }

    #[test]
    fn test_parse_file_with_preamble() {
        let content = "preamble 1\npreamble 2\n\
            Index\t TimeStampUTC \tTrigKey \n\
            1\t01.03.2024 10:00:00,000\t 2 OC_BrakeProgramActive \t\n\
            2\t01.03.2024 10:00:10,000\t1001 SC_GridLoss\t\n\
            3\t01.03.2024 10:00:11,000\t3001 OC_YawRunning\t\n\
            4\tnot a time\t1002 SC_PitchFault\t\n\
            5\t01.03.2024 12:00:00,000\t7 SC_TURBINE_AVAILABLE\t\n";

        let output = parse(content, 2).unwrap();
        assert_eq!(output.records.len(), 3);
        assert_eq!(output.rows_filtered, 1);
        assert_eq!(output.rows_dropped, 1);

        let first = &output.records[0];
        assert_eq!(first.device_id, "12");
        assert_eq!(first.code, "2");
        assert_eq!(first.description_en, "OC_BrakeProgramActive");
        // 2 preamble lines + header line, first data row is line 4
        assert_eq!(first.row_number, 4);
        assert_eq!(output.records[1].row_number, 5);
        assert_eq!(output.records[2].description_en, "SC_TURBINE_AVAILABLE");
        assert_eq!(output.records[2].row_number, 8);
    }

    #[test]
    fn test_empty_file_is_not_an_error() {
        assert!(parse("", 11).unwrap().is_empty());
        assert!(parse("only\ntwo lines\n", 11).unwrap().is_empty());

        let header_only = "a\nb\nTimeStampUTC\tTrigKey\n";
        let output = parse(header_only, 2).unwrap();
        assert!(output.is_empty());
        assert_eq!(output.rows_dropped, 0);
    }

    #[test]
    fn test_missing_column() {
        let content = "TimeStampUTC\tCode\n01.03.2024 10:00:00,000\t1 SC_X\n";
        let err = parse(content, 0).unwrap_err();
        assert!(matches!(err, EngineError::MissingColumn { ref column, .. } if column == "TrigKey"));
    }

    #[test]
    fn test_missing_file() {
        let err = read_status_log(
            Path::new("/nonexistent/dir/BufferStatuscodes20240301.txt"),
            "1",
            &LogLayout::default(),
            &DetectionConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::FileMissing(_)));
    }
}
