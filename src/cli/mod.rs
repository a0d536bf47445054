//! Command-line parsing for the `wx` weather cleaning and curve-fitting tool.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the cleaning/fitting code.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::calendar::GapGrouping;
use crate::impute::ImputeMethod;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "wx", version, about = "Daily weather cleaning, validation and seasonal curve fitting")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Expand each station to a contiguous daily calendar.
    Complete(CompleteArgs),
    /// Summarize missing days per station (or station-month).
    Gaps(GapsArgs),
    /// Fill gaps in numeric columns.
    Impute(ImputeArgs),
    /// Run quality checks and report flags.
    Validate(ValidateArgs),
    /// Fit seasonal temperature curves.
    Fit(FitArgs),
    /// Fit seasonal curves to astronomical day length at a latitude.
    Photo(PhotoArgs),
    /// Additive temperature-shift scenarios from a fitted curve.
    Shift(ShiftArgs),
    /// Month-pooled rainfall resampling scenarios.
    Rain(RainArgs),
    /// Run the whole pipeline on a synthetic station series.
    ///
    /// This is also what `wx` with no arguments does.
    Demo(DemoArgs),
}

/// Input CSV and optional export path shared by data commands.
#[derive(Debug, Args, Clone)]
pub struct IoArgs {
    /// Daily weather CSV (`entity_id`, `date`, measurement columns).
    #[arg(short, long, value_name = "CSV")]
    pub input: PathBuf,

    /// Write the result table to this CSV.
    #[arg(short, long, value_name = "CSV")]
    pub out: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct CompleteArgs {
    #[command(flatten)]
    pub io: IoArgs,

    /// First calendar day for every station (default: its first observation).
    #[arg(long)]
    pub start: Option<NaiveDate>,

    /// Last calendar day for every station (default: its last observation).
    #[arg(long)]
    pub end: Option<NaiveDate>,
}

#[derive(Debug, Args, Clone)]
pub struct GapsArgs {
    #[command(flatten)]
    pub io: IoArgs,

    /// Grouping of the summary.
    #[arg(long, value_enum, default_value_t = GapGrouping::Entity)]
    pub by: GapGrouping,

    /// Summarize the input as-is instead of completing the calendar first.
    #[arg(long)]
    pub no_complete: bool,
}

#[derive(Debug, Args, Clone)]
pub struct ImputeArgs {
    #[command(flatten)]
    pub io: IoArgs,

    /// Columns to fill (comma-separated). Default: every present column.
    #[arg(long, value_delimiter = ',')]
    pub columns: Vec<String>,

    #[arg(long, value_enum, default_value_t = ImputeMethod::Linear)]
    pub method: ImputeMethod,

    /// Longest run of missing days to fill.
    #[arg(long)]
    pub max_gap: Option<usize>,
}

#[derive(Debug, Args, Clone)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub io: IoArgs,

    /// Lowest plausible temperature (°C).
    #[arg(long, default_value_t = -60.0, allow_hyphen_values = true)]
    pub temp_min: f64,

    /// Highest plausible temperature (°C).
    #[arg(long, default_value_t = 60.0, allow_hyphen_values = true)]
    pub temp_max: f64,

    /// Daily rain ceiling (mm); `inf` disables.
    #[arg(long, default_value_t = 200.0)]
    pub rain_max: f64,

    /// Daily snow ceiling (cm); `inf` disables.
    #[arg(long, default_value_t = f64::INFINITY)]
    pub snow_max: f64,

    /// Skip the precipitation consistency check.
    #[arg(long)]
    pub no_precip_check: bool,

    /// Liquid equivalent (mm) per cm of snow.
    #[arg(long, default_value_t = 10.0)]
    pub swe_ratio: f64,

    /// Number of individual flags to print.
    #[arg(long, default_value_t = 20)]
    pub show: usize,
}

/// Model selection and solver settings shared by `fit`, `photo` and `shift`.
#[derive(Debug, Args, Clone)]
pub struct ModelArgs {
    /// Built-in models to fit (comma-separated).
    #[arg(long, value_delimiter = ',', default_value = "harmonic,cosine_phase")]
    pub models: Vec<String>,

    /// Levenberg–Marquardt iteration limit per model.
    #[arg(long, default_value_t = 200)]
    pub max_iter: usize,
}

#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    #[command(flatten)]
    pub io: IoArgs,

    #[command(flatten)]
    pub model: ModelArgs,

    /// Export fit metrics, parameters and the day-of-year table to JSON.
    #[arg(long = "export-fit", value_name = "JSON")]
    pub export_fit: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct PhotoArgs {
    /// Latitude in degrees (north positive).
    #[arg(long, allow_hyphen_values = true)]
    pub latitude: f64,

    /// First date of the series.
    #[arg(long, default_value = "2021-01-01")]
    pub start: NaiveDate,

    /// Last date of the series.
    #[arg(long, default_value = "2021-12-31")]
    pub end: NaiveDate,

    #[command(flatten)]
    pub model: ModelArgs,

    /// Write the day-of-year table to this CSV.
    #[arg(short, long, value_name = "CSV")]
    pub out: Option<PathBuf>,

    #[arg(long = "export-fit", value_name = "JSON")]
    pub export_fit: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct ShiftArgs {
    #[command(flatten)]
    pub io: IoArgs,

    #[command(flatten)]
    pub model: ModelArgs,

    /// Baseline model name (default: lowest AIC).
    #[arg(long)]
    pub baseline: Option<String>,

    /// Additive temperature deltas in °C (comma-separated).
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true, default_value = "1,2,3")]
    pub deltas: Vec<f64>,

    /// Evaluate on calendar dates from here (requires `--to`).
    #[arg(long, requires = "to")]
    pub from: Option<NaiveDate>,

    #[arg(long, requires = "from")]
    pub to: Option<NaiveDate>,

    /// Export one column per scenario instead of long format.
    #[arg(long)]
    pub wide: bool,
}

#[derive(Debug, Args, Clone)]
pub struct RainArgs {
    #[command(flatten)]
    pub io: IoArgs,

    /// First simulated date.
    #[arg(long)]
    pub from: NaiveDate,

    /// Last simulated date.
    #[arg(long)]
    pub to: NaiveDate,

    /// Scenarios to generate (comma-separated).
    #[arg(long, value_delimiter = ',', default_value = "baseline,dry,wet,erratic")]
    pub scenarios: Vec<String>,

    /// Seed for reproducible draws.
    #[arg(long)]
    pub seed: Option<u64>,

    #[arg(long, default_value_t = 0.5)]
    pub dry_scale: f64,

    #[arg(long, default_value_t = 1.5)]
    pub wet_scale: f64,

    #[arg(long, default_value_t = 0.1)]
    pub erratic_min: f64,

    #[arg(long, default_value_t = 2.0)]
    pub erratic_max: f64,

    #[arg(long)]
    pub wide: bool,
}

#[derive(Debug, Args, Clone)]
pub struct DemoArgs {
    /// Random seed for the synthetic series.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Number of days per station.
    #[arg(long, default_value_t = 3 * 365)]
    pub days: usize,

    /// Station ids (comma-separated).
    #[arg(long, value_delimiter = ',', default_value = "STATION_A,STATION_B")]
    pub entities: Vec<String>,

    /// Probability that a day is missing entirely.
    #[arg(long, default_value_t = 0.02)]
    pub drop_prob: f64,

    /// Write the generated series and pipeline outputs into this directory.
    #[arg(long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_negative_deltas_and_lists() {
        let cli = Cli::parse_from([
            "wx", "shift", "--input", "a.csv", "--deltas", "-1,2.5", "--models", "harmonic",
        ]);
        let Command::Shift(args) = cli.command else {
            panic!("expected shift");
        };
        assert_eq!(args.deltas, vec![-1.0, 2.5]);
        assert_eq!(args.model.models, vec!["harmonic"]);
        assert!(args.from.is_none());
    }

    #[test]
    fn parses_dates_and_enums() {
        let cli = Cli::parse_from(["wx", "gaps", "-i", "a.csv", "--by", "entity-month"]);
        let Command::Gaps(args) = cli.command else {
            panic!("expected gaps");
        };
        assert_eq!(args.by, GapGrouping::EntityMonth);

        let cli = Cli::parse_from(["wx", "rain", "-i", "a.csv", "--from", "2030-01-01", "--to", "2030-12-31"]);
        let Command::Rain(args) = cli.command else {
            panic!("expected rain");
        };
        assert_eq!(args.from, NaiveDate::from_ymd_opt(2030, 1, 1).unwrap());
        assert_eq!(args.scenarios.len(), 4);
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
