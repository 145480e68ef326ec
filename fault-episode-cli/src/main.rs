//! Fault Episode CLI Application
//!
//! This is the command-line interface for the fault episode engine.
//! It uses the fault-episode-engine library and adds:
//! - TOML configuration with command-line overrides
//! - Rolling default date window
//! - CSV/JSON export of the detail and summary tables
//! - Per-device summary of pre-aggregated error lists

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use config::{AppConfig, DeviceSpec, OutputFormat};
use fault_episode_engine::{parse_code_map_file, CodeMap, CodeMapColumns, Engine};
use std::path::PathBuf;

mod config;
mod report;

/// Fault Episode CLI - Extract fault episodes from turbine status-code logs
#[derive(Parser, Debug)]
#[command(name = "fault-episode-cli")]
#[command(about = "Extract and summarize wind-turbine fault episodes", long_about = None)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file (config.toml)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Detect fault episodes in the daily status-code buffers
    Episodes(EpisodeArgs),
    /// Summarize the ErrorList files of one device
    ErrorList(ErrorListArgs),
}

/// Options shared by both commands
#[derive(clap::Args, Debug)]
struct InputArgs {
    /// Directory with one sub-directory per device
    #[arg(long, value_name = "DIR")]
    root: Option<PathBuf>,

    /// First day to read (YYYYMMDD or YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    start: Option<String>,

    /// Last day to read, inclusive (default: yesterday)
    #[arg(long, value_name = "DATE")]
    end: Option<String>,

    /// Code map CSV
    #[arg(long, value_name = "FILE")]
    code_map: Option<PathBuf>,

    /// Output directory (default: current directory)
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,
}

#[derive(clap::Args, Debug)]
struct EpisodeArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Device to process (can be repeated; default: every device directory)
    #[arg(short, long = "device", value_name = "ID")]
    devices: Vec<String>,

    /// Trigger search half-window around a stop, in seconds
    #[arg(long, value_name = "SECS")]
    window_secs: Option<i64>,
}

#[derive(clap::Args, Debug)]
struct ErrorListArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Device directory holding the ErrorList files
    #[arg(short, long, value_name = "ID")]
    device: String,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    log::info!("Fault Episode CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using engine library v{}", fault_episode_engine::VERSION);

    let mut app = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => AppConfig::default(),
    };

    let today = Local::now().date_naive();
    match args.command {
        Command::Episodes(cmd) => {
            cmd.input.apply(&mut app);
            if !cmd.devices.is_empty() {
                app.input.devices = Some(cmd.devices.into_iter().map(DeviceSpec::Name).collect());
            }
            if let Some(secs) = cmd.window_secs {
                app.detection.trigger_window_secs = secs;
            }
            episodes_mode(&app, today, args.quiet)
        }
        Command::ErrorList(cmd) => {
            cmd.input.apply(&mut app);
            error_list_mode(&app, &cmd.device, today, args.quiet)
        }
    }
}

impl InputArgs {
    /// Command-line values win over the config file
    fn apply(self, app: &mut AppConfig) {
        if let Some(root) = self.root {
            app.input.root = Some(root);
        }
        if let Some(start) = self.start {
            app.range.start = Some(start);
        }
        if let Some(end) = self.end {
            app.range.end = Some(end);
        }
        if let Some(code_map) = self.code_map {
            app.input.code_map = Some(code_map);
        }
        if let Some(output) = self.output {
            app.output.output_dir = Some(output);
        }
        if let Some(format) = self.format {
            app.output.format = format;
        }
    }
}

/// Load the code map if one is configured
fn load_code_map(app: &AppConfig, default_columns: CodeMapColumns) -> Result<Option<CodeMap>> {
    let Some(path) = &app.input.code_map else {
        log::warn!("No code map configured; localized descriptions will be empty");
        return Ok(None);
    };

    let columns = app.input.code_map_columns.clone().unwrap_or(default_columns);
    let map = parse_code_map_file(path, &columns)
        .with_context(|| format!("Failed to load code map {:?}", path))?;

    let stats = map.stats();
    log::info!(
        "Loaded code map {}: {} codes ({} with severity)",
        map.source().unwrap_or("<unnamed>"),
        stats.num_codes,
        stats.num_with_severity
    );
    Ok(Some(map))
}

/// Detect episodes across devices and export the result tables
fn episodes_mode(app: &AppConfig, today: NaiveDate, quiet: bool) -> Result<()> {
    let engine_config = app.engine_config(today)?;
    let label = engine_config.range.end;
    log::info!(
        "Date range {} to {}",
        engine_config.range.start,
        engine_config.range.end
    );

    let code_map = load_code_map(app, CodeMapColumns::default())?;
    let output = Engine::new(engine_config, code_map).run()?;

    report::write_run(&output, &app.output_dir(), app.output.format, label)?;
    if !quiet {
        report::print_run_summary(&output);
    }
    Ok(())
}

/// Summarize one device's ErrorList files
fn error_list_mode(app: &AppConfig, device: &str, today: NaiveDate, quiet: bool) -> Result<()> {
    let engine_config = app.engine_config(today)?;
    let range = engine_config.range;

    let code_map = load_code_map(app, CodeMapColumns::offshore())?;
    let summary = Engine::new(engine_config, code_map).error_list_summary(device)?;

    report::write_error_list(&summary, &app.output_dir(), app.output.format, range.start, range.end)?;
    if !quiet {
        report::print_error_list(&summary);
    }
    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_episode_args() {
        let args = Args::try_parse_from([
            "fault-episode-cli",
            "-v",
            "episodes",
            "--root",
            "/data",
            "-d",
            "1",
            "--device",
            "7",
            "--start",
            "20240301",
            "--format",
            "json",
        ])
        .unwrap();
        assert_eq!(args.verbose, 1);

        let Command::Episodes(cmd) = args.command else {
            panic!("expected episodes command");
        };
        assert_eq!(cmd.devices, vec!["1", "7"]);

        let mut app = AppConfig::default();
        app.output.format = OutputFormat::Csv;
        cmd.input.apply(&mut app);
        assert_eq!(app.input.root, Some(PathBuf::from("/data")));
        assert_eq!(app.range.start.as_deref(), Some("20240301"));
        assert_eq!(app.output.format, OutputFormat::Json);
    }

    #[test]
    fn test_error_list_requires_device() {
        assert!(Args::try_parse_from(["fault-episode-cli", "error-list", "--root", "/data"]).is_err());
        assert!(Args::try_parse_from(["fault-episode-cli", "error-list", "--device", "001#"]).is_ok());
    }
}
