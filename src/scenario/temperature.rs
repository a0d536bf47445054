//! Additive temperature-shift scenarios on a fitted seasonal curve.

use std::collections::HashSet;

use chrono::NaiveDate;
use tracing::debug;

use crate::domain::{TimeKey, day_of_year};
use crate::error::AppError;
use crate::fit::SeasonalFitResult;
use crate::math::linear_interpolate;
use crate::scenario::{BASELINE, ScenarioSeries};

/// Which converged model supplies the baseline curve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelChoice {
    /// Lowest AIC among converged models.
    Best,
    Named(String),
}

/// Where the baseline is evaluated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShiftTarget {
    /// Every ordinal of the daily average.
    DayOfYear,
    /// Calendar dates, mapped to their ordinal and linearly interpolated.
    Dates(Vec<NaiveDate>),
}

/// Column label for an additive delta, e.g. `+1.5` or `-2`.
pub fn delta_label(delta: f64) -> String {
    format!("{delta:+}")
}

/// Baseline plus one shifted series per distinct non-zero delta.
///
/// Output is scenario-major: the whole baseline first, then each delta in the
/// order requested.
pub fn simulate_temp_shifts(
    result: &SeasonalFitResult,
    choice: &ModelChoice,
    deltas: &[f64],
    target: &ShiftTarget,
) -> Result<Vec<ScenarioSeries>, AppError> {
    let model = match choice {
        ModelChoice::Best => result
            .best()
            .ok_or_else(|| AppError::insufficient("No converged models to choose a baseline from."))?,
        ModelChoice::Named(name) => result.get(name).ok_or_else(|| {
            AppError::input(format!(
                "Model '{name}' is not among the converged models ({}).",
                result.model_names().join(", ")
            ))
        })?,
    };
    let fitted = result
        .daily_average
        .fitted_column(&model.model_name)
        .ok_or_else(|| AppError::new(4, format!("No fitted curve stored for '{}'.", model.model_name)))?;

    if let Some(bad) = deltas.iter().find(|d| !d.is_finite()) {
        return Err(AppError::input(format!("Temperature delta must be finite (got {bad}).")));
    }
    let deltas = distinct_deltas(deltas);
    debug!(model = %model.model_name, deltas = ?deltas, "building temperature shifts");

    let baseline: Vec<(TimeKey, f64)> = match target {
        ShiftTarget::DayOfYear => result
            .daily_average
            .day_of_year
            .iter()
            .zip(fitted)
            .map(|(&doy, &v)| (TimeKey::DayOfYear(doy), v))
            .collect(),
        ShiftTarget::Dates(dates) => {
            let xs: Vec<f64> = result.daily_average.day_of_year.iter().map(|&d| f64::from(d)).collect();
            dates
                .iter()
                .map(|&date| {
                    let v = linear_interpolate(&xs, fitted, f64::from(day_of_year(date)));
                    (TimeKey::Date(date), v)
                })
                .collect()
        }
    };

    let mut out = Vec::with_capacity(baseline.len() * (deltas.len() + 1));
    out.extend(baseline.iter().map(|&(key, value)| ScenarioSeries {
        key,
        scenario: BASELINE.to_string(),
        value,
    }));
    for delta in deltas {
        let label = delta_label(delta);
        out.extend(baseline.iter().map(|&(key, value)| ScenarioSeries {
            key,
            scenario: label.clone(),
            value: value + delta,
        }));
    }
    Ok(out)
}

/// Drop zero deltas (the baseline already covers them) and repeats.
fn distinct_deltas(deltas: &[f64]) -> Vec<f64> {
    let mut seen = HashSet::new();
    deltas
        .iter()
        .copied()
        .filter(|&d| d != 0.0 && seen.insert(d.to_bits()))
        .collect()
}
