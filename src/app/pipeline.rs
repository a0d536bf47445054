//! End-to-end cleaning and fitting pipeline.
//!
//! Keeping this in one place avoids duplicating the core workflow between the
//! `demo` command and the integration tests:
//! complete calendar -> gap summary -> impute -> validate -> seasonal fit ->
//! temperature shifts -> rainfall scenarios

use chrono::{Duration, NaiveDate};
use tracing::info;

use crate::calendar::{CalendarOptions, GapGrouping, GapSummary, complete_daily_calendar, summarise_gaps};
use crate::domain::{CalendarTable, Field, WeatherTable};
use crate::error::AppError;
use crate::fit::{ModelRequest, SeasonalFitResult, fit_seasonal_temp};
use crate::impute::{ImputeMethod, impute_table};
use crate::math::LmOptions;
use crate::scenario::{
    ModelChoice, RAIN_SCENARIOS, RainScenarioConfig, ScenarioSeries, ShiftTarget, simulate_rainfall_scenarios,
    simulate_temp_shifts,
};
use crate::validate::{ValidationConfig, ValidationReport, validate_weather};

/// Settings for every pipeline stage.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub calendar: CalendarOptions,
    pub grouping: GapGrouping,
    pub impute_method: ImputeMethod,
    pub max_gap: Option<usize>,
    pub validation: ValidationConfig,
    pub models: ModelRequest,
    pub lm: LmOptions,
    pub deltas: Vec<f64>,
    pub rain: RainScenarioConfig,
    /// Days of rainfall to simulate, starting the day after the last observation.
    pub rain_horizon_days: usize,
    pub seed: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            calendar: CalendarOptions::default(),
            grouping: GapGrouping::Entity,
            impute_method: ImputeMethod::Linear,
            max_gap: Some(7),
            validation: ValidationConfig::default(),
            models: ModelRequest::default(),
            lm: LmOptions::default(),
            deltas: vec![1.0, 2.0, 3.0],
            rain: RainScenarioConfig::default(),
            rain_horizon_days: 365,
            seed: Some(42),
        }
    }
}

/// All computed outputs of a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub completed: CalendarTable,
    pub gaps: Vec<GapSummary>,
    pub imputed: CalendarTable,
    pub validation: ValidationReport,
    pub fit: SeasonalFitResult,
    pub shifts: Vec<ScenarioSeries>,
    /// Empty when the input has no `rain` column.
    pub rain: Vec<ScenarioSeries>,
}

/// Execute every stage on `table`.
pub fn run_pipeline(table: &WeatherTable, config: &PipelineConfig) -> Result<PipelineOutput, AppError> {
    // 1) Calendar completion and gap summary.
    let completed = complete_daily_calendar(table, &config.calendar)?;
    let gaps = summarise_gaps(&completed, config.grouping);
    info!(rows = completed.len(), inserted = completed.synthetic_count(), "calendar completed");

    // 2) Fill every present column.
    let targets: Vec<&str> = completed.columns().iter().map(|f| f.name()).collect();
    let imputed = impute_table(&completed, &targets, config.impute_method, config.max_gap);

    // 3) Validate the raw input.
    let validation = validate_weather(table, &config.validation)?;
    info!(flags = validation.flags.len(), "validation finished");

    // 4) Seasonal fit on the cleaned series, then shifts from the best model.
    let fit = fit_seasonal_temp(&imputed.to_weather_table(), &config.models, &config.lm)?;
    let shifts = simulate_temp_shifts(&fit, &ModelChoice::Best, &config.deltas, &ShiftTarget::DayOfYear)?;

    // 5) Rainfall scenarios over the horizon after the data ends.
    let rain = match table.rows().iter().map(|r| r.date).max() {
        Some(last) if table.has(Field::Rain) && config.rain_horizon_days > 0 => {
            let dates = horizon(last, config.rain_horizon_days);
            simulate_rainfall_scenarios(table, &dates, &RAIN_SCENARIOS, &config.rain, config.seed)?
        }
        _ => Vec::new(),
    };

    Ok(PipelineOutput {
        completed,
        gaps,
        imputed,
        validation,
        fit,
        shifts,
        rain,
    })
}

fn horizon(last: NaiveDate, days: usize) -> Vec<NaiveDate> {
    (1..=days as i64).map(|i| last + Duration::days(i)).collect()
}
