//! Report generation
//!
//! Writes the detail and summary tables of a run (and the error-list summary)
//! as CSV or JSON, and prints a short overview to stdout.

use crate::config::OutputFormat;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use fault_episode_engine::{
    duration_hours, DetailTable, ErrorListReport, RunOutput, RunStats, SummaryRow, SummaryTable,
    Timestamp,
};
use serde::Serialize;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Hours rounded to two decimals
pub fn round_hours(hours: f64) -> f64 {
    (hours * 100.0).round() / 100.0
}

fn format_time(ts: &Timestamp) -> String {
    ts.format(TIME_FORMAT).to_string()
}

/// One exported detail row
#[derive(Debug, Serialize)]
pub struct DetailRecord<'a> {
    pub device_id: &'a str,
    pub source_file: &'a str,
    pub stop_row: usize,
    pub fault_row: usize,
    pub stop_time: String,
    pub fault_time: String,
    pub code: &'a str,
    pub description_en: &'a str,
    pub description_cn: &'a str,
    pub duration_secs: i64,
    pub duration_hours: f64,
}

/// One exported summary row; gap rows leave the statistical columns empty
#[derive(Debug, Serialize)]
pub struct SummaryRecord<'a> {
    pub device_id: u32,
    pub code: Option<&'a str>,
    pub count: Option<usize>,
    pub description_en: Option<&'a str>,
    pub description_cn: Option<&'a str>,
    pub duration_hours: Option<f64>,
    pub missing_days: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorListRecord<'a> {
    pub code: &'a str,
    pub description_en: &'a str,
    pub description_cn: &'a str,
    pub severity: Option<&'a str>,
    pub count: usize,
    pub duration_hours: f64,
}

#[derive(Serialize)]
struct RunDocument<'a> {
    details: Vec<DetailRecord<'a>>,
    summary: Vec<SummaryRecord<'a>>,
    stats: &'a RunStats,
}

pub fn detail_records(details: &DetailTable) -> Vec<DetailRecord<'_>> {
    details
        .rows
        .iter()
        .map(|e| DetailRecord {
            device_id: &e.device_id,
            source_file: &e.source_file,
            stop_row: e.stop_row,
            fault_row: e.fault_row,
            stop_time: format_time(&e.stop_time),
            fault_time: format_time(&e.fault_time),
            code: &e.code,
            description_en: &e.description_en,
            description_cn: &e.description_cn,
            duration_secs: e.duration.num_seconds(),
            duration_hours: round_hours(e.duration_hours()),
        })
        .collect()
}

/// Missing days rendered as `[YYYYMMDD,YYYYMMDD]`
fn format_missing_days(dates: &[NaiveDate]) -> String {
    let labels: Vec<String> = dates.iter().map(|d| d.format("%Y%m%d").to_string()).collect();
    format!("[{}]", labels.join(","))
}

pub fn summary_records(summary: &SummaryTable) -> Vec<SummaryRecord<'_>> {
    summary
        .rows
        .iter()
        .map(|row| match row {
            SummaryRow::Code(s) => SummaryRecord {
                device_id: s.device_id,
                code: Some(&s.code),
                count: Some(s.count),
                description_en: Some(&s.description_en),
                description_cn: Some(&s.description_cn),
                duration_hours: Some(round_hours(duration_hours(s.total_duration))),
                missing_days: None,
            },
            SummaryRow::Gaps { device_id, dates } => SummaryRecord {
                device_id: *device_id,
                code: None,
                count: None,
                description_en: None,
                description_cn: None,
                duration_hours: None,
                missing_days: Some(format_missing_days(dates)),
            },
        })
        .collect()
}

pub fn error_list_records(report: &ErrorListReport) -> Vec<ErrorListRecord<'_>> {
    report
        .rows
        .iter()
        .map(|s| ErrorListRecord {
            code: &s.code,
            description_en: &s.description_en,
            description_cn: &s.description_cn,
            severity: s.severity.as_deref(),
            count: s.count,
            duration_hours: round_hours(duration_hours(s.total_duration)),
        })
        .collect()
}

fn write_csv<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("Failed to create {:?}", path))?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)
        .with_context(|| format!("Failed to write {:?}", path))?;
    Ok(())
}

/// Write the run tables into `dir`, labelled with `label` (YYYYMMDD)
///
/// CSV produces `fault_{label}.csv` (details) and `fault_simple_{label}.csv`
/// (summary); JSON produces a single `fault_{label}.json`.
pub fn write_run(output: &RunOutput, dir: &Path, format: OutputFormat, label: NaiveDate) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create output directory {:?}", dir))?;
    let label = label.format("%Y%m%d");

    let written = match format {
        OutputFormat::Csv => {
            let detail_path = dir.join(format!("fault_{}.csv", label));
            write_csv(&detail_path, &detail_records(&output.details))?;

            let summary_path = dir.join(format!("fault_simple_{}.csv", label));
            write_csv(&summary_path, &summary_records(&output.summary))?;

            vec![detail_path, summary_path]
        }
        OutputFormat::Json => {
            let path = dir.join(format!("fault_{}.json", label));
            let document = RunDocument {
                details: detail_records(&output.details),
                summary: summary_records(&output.summary),
                stats: &output.stats,
            };
            write_json(&path, &document)?;
            vec![path]
        }
    };

    for path in &written {
        log::info!("Wrote {:?}", path);
    }
    Ok(written)
}

/// Write an error-list summary into `dir`
pub fn write_error_list(
    report: &ErrorListReport,
    dir: &Path,
    format: OutputFormat,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create output directory {:?}", dir))?;
    let stem = format!(
        "error_list_{}_{}_{}",
        report.device_id,
        start.format("%Y%m%d"),
        end.format("%Y%m%d")
    );

    let records = error_list_records(report);
    let path = match format {
        OutputFormat::Csv => {
            let path = dir.join(format!("{}.csv", stem));
            write_csv(&path, &records)?;
            path
        }
        OutputFormat::Json => {
            let path = dir.join(format!("{}.json", stem));
            write_json(&path, &records)?;
            path
        }
    };

    log::info!("Wrote {:?}", path);
    Ok(path)
}

fn print_stats(stats: &RunStats) {
    println!("  Files read:     {} ({} empty)", stats.files_read, stats.files_empty);
    println!("  Files missing:  {}", stats.files_missing);
    println!("  Files failed:   {}", stats.files_failed);
    println!("  Rows dropped:   {} (filtered: {})", stats.rows_dropped, stats.rows_filtered);
}

/// Print a short overview of a run
pub fn print_run_summary(output: &RunOutput) {
    println!("═══════════════════════════════════════════════");
    println!("  Fault Episodes");
    println!("═══════════════════════════════════════════════\n");

    let stats = &output.stats;
    println!("📊 Run statistics:");
    println!("  Devices:        {}", stats.devices);
    print_stats(stats);
    println!("  Episodes:       {} (excluded: {})", output.details.len(), stats.excluded_episodes);
    println!("  No trigger:     {}", stats.unresolved_episodes);
    println!("  Unmapped codes: {}", stats.unmapped_codes);

    let with_gaps: Vec<_> = output.gaps.iter().filter(|g| !g.is_empty()).collect();
    if !with_gaps.is_empty() {
        println!("\n⚠️  Missing log days:");
        for gap in with_gaps {
            println!("  {:>6}: {}", gap.device_id, format_missing_days(&gap.dates));
        }
    }

    let mut top: Vec<_> = output.summary.code_rows().collect();
    top.sort_by(|a, b| b.total_duration.cmp(&a.total_duration));
    if !top.is_empty() {
        println!("\n⏱  Longest total downtime:");
        for s in top.iter().take(10) {
            println!(
                "  {:>6}  {:<10} {:>4}x {:>9.2}h  {}",
                s.device_id,
                s.code,
                s.count,
                duration_hours(s.total_duration),
                s.description_en
            );
        }
    }
    println!();
}

/// Print an error-list summary
pub fn print_error_list(report: &ErrorListReport) {
    println!("═══════════════════════════════════════════════");
    println!("  Error List: {}", report.device_id);
    println!("═══════════════════════════════════════════════\n");

    print_stats(&report.stats);
    println!("  Unmapped codes: {}", report.stats.unmapped_codes);
    println!();
    for s in &report.rows {
        println!(
            "  {:<10} {:>4}x {:>9.2}h  {}",
            s.code,
            s.count,
            duration_hours(s.total_duration),
            s.description_cn
        );
    }
    println!();
}
