//! Pre-aggregated error-list reader
//!
//! Offshore controllers export `ErrorList<date>.csv` files in which every row
//! is already a finished fault: trigger time, description, reset time and the
//! time the fault stayed active. The duration column is written negated
//! (`-00:00:05`) and must be flipped; rows whose flipped duration is not
//! strictly positive carry no downtime and are filtered out.
//!
//! Columns (no header line, fixed order):
//! `SeqNo, TriggerTime, Description, OperationMode, WindSpeed, RotorSpeed,
//! GeneratorSpeed, PowerOutPut, PitchPosition, PowerSetPoint, Res, Error`

use crate::config::ErrorListLayout;
use crate::formats::ReadOutput;
use crate::types::{EngineError, Result};
use chrono::Duration;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

const COL_SEQ_NO: usize = 0;
const COL_TRIGGER_TIME: usize = 1;
const COL_DESCRIPTION: usize = 2;
const COL_RESET_TIME: usize = 10;
const COL_DURATION: usize = 11;
const NUM_COLUMNS: usize = 12;

/// Separator between the code and the rest of an error-list description
const CODE_SEPARATOR: &str = "_SC_";

/// One row of an error list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorListEntry {
    pub seq_no: String,
    /// Trigger time as written by the controller
    pub trigger_time: String,
    pub description_en: String,
    /// Part of the description before `_SC_`
    pub code: String,
    pub reset_time: String,
    /// Time the fault stayed active (sign already flipped, always positive)
    pub duration: Duration,
}

/// Read one error-list file
pub fn read_error_list(path: &Path, layout: &ErrorListLayout) -> Result<ReadOutput<ErrorListEntry>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(EngineError::FileMissing(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };
    parse_error_list(BufReader::new(file), layout)
}

/// Parse error-list rows from any buffered reader
pub fn parse_error_list<R: BufRead>(mut reader: R, layout: &ErrorListLayout) -> Result<ReadOutput<ErrorListEntry>> {
    let mut output = ReadOutput::default();

    let mut line = Vec::new();
    for _ in 0..layout.header_lines {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            return Ok(output);
        }
    }

    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut records = Vec::new();
    for record in csv_reader.byte_records() {
        records.push(record?);
    }
    let keep = records.len().saturating_sub(layout.footer_lines);
    records.truncate(keep);

    for record in &records {
        let field = |idx: usize| {
            record
                .get(idx)
                .map(|raw| String::from_utf8_lossy(raw).trim().to_string())
        };

        if record.len() < NUM_COLUMNS {
            output.rows_dropped += 1;
            continue;
        }

        let (description_en, duration) = match (
            field(COL_DESCRIPTION),
            field(COL_DURATION).as_deref().and_then(parse_negated_duration),
        ) {
            (Some(description), Some(duration)) if !description.is_empty() => (description, duration),
            _ => {
                output.rows_dropped += 1;
                continue;
            }
        };

        if duration <= Duration::zero() {
            output.rows_filtered += 1;
            continue;
        }

        output.records.push(ErrorListEntry {
            seq_no: field(COL_SEQ_NO).unwrap_or_default(),
            trigger_time: field(COL_TRIGGER_TIME).unwrap_or_default(),
            code: error_list_code(&description_en).to_string(),
            description_en,
            reset_time: field(COL_RESET_TIME).unwrap_or_default(),
            duration,
        });
    }

    Ok(output)
}

/// Code of an error-list description (`A01_SC_GenOverTemp` → `A01`)
pub fn error_list_code(description: &str) -> &str {
    description
        .split_once(CODE_SEPARATOR)
        .map_or(description, |(code, _)| code)
}

/// Parse a stored (negated) duration and flip its sign
pub fn parse_negated_duration(raw: &str) -> Option<Duration> {
    parse_signed_duration(raw).map(|d| -d)
}

/// Parse `[-]HH:MM:SS[.fff]`, optionally preceded by `N days `
fn parse_signed_duration(raw: &str) -> Option<Duration> {
    let s = raw.trim();
    if let Some((days, clock)) = s.split_once("day") {
        let days: i64 = days.trim().parse().ok()?;
        let clock = clock.trim_start_matches('s').trim();
        return Duration::try_days(days)?.checked_add(&parse_clock(clock)?);
    }
    parse_clock(s)
}

fn parse_clock(s: &str) -> Option<Duration> {
    let (negative, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };

    let mut parts = body.split(':');
    let hours: i64 = parts.next()?.trim().parse().ok()?;
    let minutes: i64 = parts.next()?.trim().parse().ok()?;
    let seconds = parts.next()?.trim();
    if parts.next().is_some() {
        return None;
    }

    let (whole, frac) = seconds.split_once('.').unwrap_or((seconds, ""));
    let whole: i64 = whole.parse().ok()?;
    if !frac.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let nanos: i64 = if frac.is_empty() {
        0
    } else {
        format!("{:0<9}", &frac[..frac.len().min(9)]).parse().ok()?
    };

    // Out-of-range fields make the row unparsable
    let total = Duration::try_hours(hours)?
        .checked_add(&Duration::try_minutes(minutes)?)?
        .checked_add(&Duration::try_seconds(whole)?)?
        .checked_add(&Duration::nanoseconds(nanos))?;
    Some(if negative { -total } else { total })
}
