//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - installs logging
//! - parses CLI arguments
//! - loads the input CSV
//! - runs the requested cleaning / fitting stage
//! - prints reports and writes optional exports

use std::path::Path;

use chrono::NaiveDate;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::calendar::{CalendarOptions, DateRange, complete_daily_calendar, summarise_gaps};
use crate::cli::{
    Command, CompleteArgs, DemoArgs, FitArgs, GapsArgs, ImputeArgs, IoArgs, ModelArgs, PhotoArgs, RainArgs, ShiftArgs,
    ValidateArgs,
};
use crate::data::{DemoConfig, generate_demo_series};
use crate::domain::{CalendarTable, Field, WeatherTable};
use crate::error::AppError;
use crate::fit::{ModelRequest, SeasonalFitResult, fit_seasonal_photo, fit_seasonal_temp};
use crate::impute::impute_table;
use crate::io::{FitFile, IngestedData, load_weather_csv};
use crate::math::LmOptions;
use crate::scenario::{
    ModelChoice, RainScenarioConfig, ScenarioSeries, ShiftTarget, pivot_wide, simulate_rainfall_scenarios,
    simulate_temp_shifts,
};
use crate::validate::{ValidationConfig, validate_weather};

pub mod pipeline;

/// Entry point for the `wx` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    // `wx` with no arguments runs the demo.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    match cli.command {
        Command::Complete(args) => handle_complete(args),
        Command::Gaps(args) => handle_gaps(args),
        Command::Impute(args) => handle_impute(args),
        Command::Validate(args) => handle_validate(args),
        Command::Fit(args) => handle_fit(args),
        Command::Photo(args) => handle_photo(args),
        Command::Shift(args) => handle_shift(args),
        Command::Rain(args) => handle_rain(args),
        Command::Demo(args) => handle_demo(args),
    }
}

/// Log to stderr, filtered by `RUST_LOG` (default `info`).
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load(io: &IoArgs) -> Result<IngestedData, AppError> {
    let ingest = load_weather_csv(&io.input)?;
    println!("{}", crate::report::format_ingest_summary(&io.input.display().to_string(), &ingest));
    if ingest.rows_used == 0 {
        return Err(AppError::insufficient("No valid rows in the input CSV."));
    }
    Ok(ingest)
}

fn metadata(operation: &str, source: &Path, extra: &[(&str, String)]) -> Vec<(String, String)> {
    let mut meta = vec![
        ("tool".to_string(), format!("wx {}", env!("CARGO_PKG_VERSION"))),
        ("operation".to_string(), operation.to_string()),
        ("source".to_string(), source.display().to_string()),
    ];
    meta.extend(extra.iter().map(|(k, v)| (k.to_string(), v.clone())));
    meta
}

fn handle_complete(args: CompleteArgs) -> Result<(), AppError> {
    let ingest = load(&args.io)?;
    let completed = complete_daily_calendar(&ingest.table, &calendar_options_from_args(&args))?;
    println!("{}", crate::report::format_calendar_summary(&completed));

    if let Some(path) = &args.io.out {
        let meta = metadata("complete", &args.io.input, &[("inserted_rows", completed.synthetic_count().to_string())]);
        crate::io::write_calendar_csv(path, &completed, &meta)?;
        info!(path = %path.display(), "calendar written");
    }
    Ok(())
}

fn handle_gaps(args: GapsArgs) -> Result<(), AppError> {
    let ingest = load(&args.io)?;
    let table = if args.no_complete {
        CalendarTable::from_observed(&ingest.table)
    } else {
        complete_daily_calendar(&ingest.table, &CalendarOptions::default())?
    };
    let gaps = summarise_gaps(&table, args.by);
    println!("{}", crate::report::format_gaps(&gaps));

    if let Some(path) = &args.io.out {
        let meta = metadata("gaps", &args.io.input, &[("grouping", format!("{:?}", args.by))]);
        crate::io::write_gaps_csv(path, &gaps, &meta)?;
    }
    Ok(())
}

fn handle_impute(args: ImputeArgs) -> Result<(), AppError> {
    let ingest = load(&args.io)?;
    let completed = complete_daily_calendar(&ingest.table, &CalendarOptions::default())?;

    let targets: Vec<&str> = if args.columns.is_empty() {
        completed.columns().iter().map(|f| f.name()).collect()
    } else {
        args.columns.iter().map(String::as_str).collect()
    };
    let imputed = impute_table(&completed, &targets, args.method, args.max_gap);

    let fields: Vec<Field> = targets.iter().filter_map(|t| Field::from_name(t)).filter(|&f| imputed.has(f)).collect();
    println!("{}", crate::report::format_impute_summary(&completed, &imputed, &fields));

    if let Some(path) = &args.io.out {
        let meta = metadata(
            "impute",
            &args.io.input,
            &[
                ("method", format!("{:?}", args.method).to_lowercase()),
                ("max_gap", args.max_gap.map(|g| g.to_string()).unwrap_or_else(|| "none".to_string())),
            ],
        );
        crate::io::write_calendar_csv(path, &imputed, &meta)?;
    }
    Ok(())
}

fn handle_validate(args: ValidateArgs) -> Result<(), AppError> {
    let ingest = load(&args.io)?;
    let config = validation_config_from_args(&args);
    let report = validate_weather(&ingest.table, &config)?;
    println!("{}", crate::report::format_validation(&report, args.show));

    if let Some(path) = &args.io.out {
        let meta = metadata(
            "validate",
            &args.io.input,
            &[("temp_bounds", format!("{:?}", config.temp_bounds)), ("flags", report.flags.len().to_string())],
        );
        crate::io::write_flags_csv(path, &report.flags, &meta)?;
    }
    Ok(())
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let ingest = load(&args.io)?;
    let result = fit_seasonal_temp(&ingest.table, &model_request_from_args(&args.model), &lm_options_from_args(&args.model))?;
    println!("{}", crate::report::format_fit_summary("seasonal temperature fit", &result));
    export_fit(&result, &args.io.input, args.io.out.as_deref(), args.export_fit.as_deref(), "fit")
}

fn handle_photo(args: PhotoArgs) -> Result<(), AppError> {
    if args.start > args.end {
        return Err(AppError::input(format!("--start ({}) is after --end ({}).", args.start, args.end)));
    }
    let dates: Vec<NaiveDate> = DateRange(args.start, args.end).collect();
    let result = fit_seasonal_photo(
        &dates,
        args.latitude,
        &model_request_from_args(&args.model),
        &lm_options_from_args(&args.model),
    )?;
    println!("{}", crate::report::format_fit_summary(&format!("photoperiod fit at {}°", args.latitude), &result));
    let source = format!("day length at latitude {}", args.latitude);
    export_fit(&result, Path::new(&source), args.out.as_deref(), args.export_fit.as_deref(), "photo")
}

fn export_fit(
    result: &SeasonalFitResult,
    source: &Path,
    csv: Option<&Path>,
    json: Option<&Path>,
    operation: &str,
) -> Result<(), AppError> {
    if let Some(path) = csv {
        let best = result.best().map(|b| b.model_name.clone()).unwrap_or_default();
        crate::io::write_daily_average_csv(path, &result.daily_average, &metadata(operation, source, &[("best_model", best)]))?;
    }
    if let Some(path) = json {
        crate::io::write_fit_json(path, &FitFile::from_result(result, source.display().to_string()))?;
    }
    Ok(())
}

fn handle_shift(args: ShiftArgs) -> Result<(), AppError> {
    let ingest = load(&args.io)?;
    let result = fit_seasonal_temp(&ingest.table, &model_request_from_args(&args.model), &lm_options_from_args(&args.model))?;
    let choice = match &args.baseline {
        Some(name) => ModelChoice::Named(name.clone()),
        None => ModelChoice::Best,
    };
    let target = match (args.from, args.to) {
        (Some(from), Some(to)) if from <= to => ShiftTarget::Dates(DateRange(from, to).collect()),
        (Some(from), Some(to)) => {
            return Err(AppError::input(format!("--from ({from}) is after --to ({to}).")));
        }
        _ => ShiftTarget::DayOfYear,
    };
    let series = simulate_temp_shifts(&result, &choice, &args.deltas, &target)?;
    print_and_export_scenarios(&series, &args.io, args.wide, "shift")
}

fn handle_rain(args: RainArgs) -> Result<(), AppError> {
    if args.from > args.to {
        return Err(AppError::input(format!("--from ({}) is after --to ({}).", args.from, args.to)));
    }
    let ingest = load(&args.io)?;
    let dates: Vec<NaiveDate> = DateRange(args.from, args.to).collect();
    let names: Vec<&str> = args.scenarios.iter().map(String::as_str).collect();
    let series = simulate_rainfall_scenarios(&ingest.table, &dates, &names, &rain_config_from_args(&args), args.seed)?;
    print_and_export_scenarios(&series, &args.io, args.wide, "rain")
}

fn print_and_export_scenarios(series: &[ScenarioSeries], io: &IoArgs, wide: bool, operation: &str) -> Result<(), AppError> {
    println!("{}", crate::report::format_scenarios(&pivot_wide(series), 15));
    if let Some(path) = &io.out {
        let layout = if wide { "wide" } else { "long" };
        crate::io::write_scenarios_csv(path, series, wide, &metadata(operation, &io.input, &[("layout", layout.to_string())]))?;
    }
    Ok(())
}

fn handle_demo(args: DemoArgs) -> Result<(), AppError> {
    let config = demo_config_from_args(&args);
    let table = generate_demo_series(&config)?;
    info!(rows = table.len(), seed = config.seed, "generated demo series");

    let run = pipeline::run_pipeline(&table, &pipeline::PipelineConfig::default())?;
    println!("{}", crate::report::format_calendar_summary(&run.completed));
    println!("{}", crate::report::format_gaps(&run.gaps));
    println!("{}", crate::report::format_validation(&run.validation, 10));
    println!("{}", crate::report::format_fit_summary("demo seasonal fit", &run.fit));
    println!("{}", crate::report::format_scenarios(&pivot_wide(&run.shifts), 10));
    println!("{}", crate::report::format_scenarios(&pivot_wide(&run.rain), 10));

    if let Some(dir) = &args.out_dir {
        std::fs::create_dir_all(dir)?;
        let source = Path::new("synthetic");
        let seed = [("seed", config.seed.to_string())];
        write_demo_input(&dir.join("demo_input.csv"), &table, &metadata("demo", source, &seed))?;
        crate::io::write_calendar_csv(&dir.join("imputed.csv"), &run.imputed, &metadata("demo", source, &seed))?;
        crate::io::write_gaps_csv(&dir.join("gaps.csv"), &run.gaps, &metadata("demo", source, &seed))?;
        crate::io::write_flags_csv(&dir.join("flags.csv"), &run.validation.flags, &metadata("demo", source, &seed))?;
        crate::io::write_daily_average_csv(&dir.join("daily_average.csv"), &run.fit.daily_average, &metadata("demo", source, &seed))?;
        crate::io::write_scenarios_csv(&dir.join("temp_shifts.csv"), &run.shifts, true, &metadata("demo", source, &seed))?;
        crate::io::write_scenarios_csv(&dir.join("rain_scenarios.csv"), &run.rain, true, &metadata("demo", source, &seed))?;
        crate::io::write_fit_json(&dir.join("fit.json"), &FitFile::from_result(&run.fit, "synthetic"))?;
        info!(dir = %dir.display(), "demo outputs written");
    }
    Ok(())
}

fn write_demo_input(path: &Path, table: &WeatherTable, meta: &[(String, String)]) -> Result<(), AppError> {
    crate::io::write_calendar_csv(path, &CalendarTable::from_observed(table), meta)
}

pub fn calendar_options_from_args(args: &CompleteArgs) -> CalendarOptions {
    CalendarOptions {
        start: args.start,
        end: args.end,
        ..CalendarOptions::default()
    }
}

pub fn validation_config_from_args(args: &ValidateArgs) -> ValidationConfig {
    ValidationConfig {
        temp_bounds: (args.temp_min, args.temp_max),
        rain_max: args.rain_max,
        snow_max: args.snow_max,
        check_precip_consistency: !args.no_precip_check,
        swe_ratio: args.swe_ratio,
    }
}

pub fn model_request_from_args(args: &ModelArgs) -> ModelRequest {
    ModelRequest::builtin(&args.models[..])
}

pub fn lm_options_from_args(args: &ModelArgs) -> LmOptions {
    LmOptions {
        max_iter: args.max_iter,
        ..LmOptions::default()
    }
}

pub fn rain_config_from_args(args: &RainArgs) -> RainScenarioConfig {
    RainScenarioConfig {
        dry_scale: args.dry_scale,
        wet_scale: args.wet_scale,
        erratic_range: (args.erratic_min, args.erratic_max),
    }
}

pub fn demo_config_from_args(args: &DemoArgs) -> DemoConfig {
    DemoConfig {
        entities: args.entities.clone(),
        days: args.days,
        drop_prob: args.drop_prob,
        seed: args.seed,
        ..DemoConfig::default()
    }
}

/// Rewrite argv so a bare `wx` runs `wx demo`.
///
/// Rules:
/// - `wx`                      -> `wx demo`
/// - `wx --seed 7 ...`         -> `wx demo --seed 7 ...`
/// - `wx --help/--version/-h`  -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("demo".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(arg1.as_str(), "-h" | "--help" | "-V" | "--version" | "help");
    if is_top_level_help_or_version {
        return argv;
    }

    // If the first token is a flag, treat it as "demo flags".
    if arg1.starts_with('-') {
        argv.insert(1, "demo".to_string());
    }
    argv
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn bare_invocation_runs_demo() {
        assert_eq!(rewrite_args(argv(&["wx"])), argv(&["wx", "demo"]));
        assert_eq!(rewrite_args(argv(&["wx", "--seed", "7"])), argv(&["wx", "demo", "--seed", "7"]));
        assert_eq!(rewrite_args(argv(&["wx", "--help"])), argv(&["wx", "--help"]));
        assert_eq!(rewrite_args(argv(&["wx", "fit", "-i", "x.csv"])), argv(&["wx", "fit", "-i", "x.csv"]));
    }

    #[test]
    fn validation_args_map_onto_config() {
        let cli = crate::cli::Cli::parse_from(["wx", "validate", "-i", "x.csv", "--temp-min", "-40", "--no-precip-check"]);
        let Command::Validate(args) = cli.command else {
            panic!("expected validate");
        };
        let cfg = validation_config_from_args(&args);
        assert_eq!(cfg.temp_bounds, (-40.0, 60.0));
        assert!(!cfg.check_precip_consistency);
        assert!(cfg.snow_max.is_infinite());
    }
}
