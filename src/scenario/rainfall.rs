//! Month-pooled rainfall resampling.
//!
//! Every non-null historical `rain` value goes into the pool of its calendar
//! month, across all entities and years. Each target date draws one value from
//! its month's pool with replacement; an empty pool draws 0.
//!
//! Random streams are derived from the seed per purpose, so the draws are the
//! same whether or not scenario multipliers are also requested.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use chrono::{Datelike, NaiveDate};
use rand::prelude::*;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::{Field, TimeKey, WeatherTable};
use crate::error::AppError;
use crate::scenario::{BASELINE, ScenarioSeries};

/// Multipliers applied to baseline draws.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RainScenarioConfig {
    pub dry_scale: f64,
    pub wet_scale: f64,
    /// Range of the per-day multiplier for `erratic`.
    pub erratic_range: (f64, f64),
}

impl Default for RainScenarioConfig {
    fn default() -> Self {
        Self {
            dry_scale: 0.5,
            wet_scale: 1.5,
            erratic_range: (0.1, 2.0),
        }
    }
}

impl RainScenarioConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        let (lo, hi) = self.erratic_range;
        let scales = [self.dry_scale, self.wet_scale, lo, hi];
        if scales.iter().any(|s| !s.is_finite() || *s < 0.0) {
            return Err(AppError::input("Rain scenario multipliers must be finite and non-negative."));
        }
        if lo > hi {
            return Err(AppError::input(format!("erratic_range low ({lo}) exceeds high ({hi}).")));
        }
        Ok(())
    }
}

/// Recognized rainfall scenario names.
pub const RAIN_SCENARIOS: [&str; 4] = [BASELINE, "dry", "wet", "erratic"];

/// Historical rain values grouped by calendar month (index 0 = January).
pub fn monthly_pools(table: &WeatherTable) -> Result<[Vec<f64>; 12], AppError> {
    if !table.has(Field::Rain) {
        return Err(AppError::input("Rainfall resampling needs a `rain` column."));
    }
    let mut pools: [Vec<f64>; 12] = Default::default();
    for record in table.rows() {
        if let Some(v) = record.get(Field::Rain) {
            pools[record.date.month0() as usize].push(v);
        }
    }
    Ok(pools)
}

/// One draw per date from that month's pool.
///
/// With `Some(seed)` the result is exactly reproducible; with `None` the seed
/// comes from the thread RNG.
pub fn sample_rainfall_by_month(
    table: &WeatherTable,
    dates: &[NaiveDate],
    seed: Option<u64>,
) -> Result<Vec<f64>, AppError> {
    let pools = monthly_pools(table)?;
    Ok(draw(&pools, dates, resolve_seed(seed)))
}

/// Baseline draws plus the requested scenario transforms, in long format.
///
/// Unknown scenario names log a warning and carry the baseline values under
/// the requested label.
pub fn simulate_rainfall_scenarios(
    table: &WeatherTable,
    dates: &[NaiveDate],
    scenarios: &[&str],
    config: &RainScenarioConfig,
    seed: Option<u64>,
) -> Result<Vec<ScenarioSeries>, AppError> {
    config.validate()?;
    let pools = monthly_pools(table)?;
    let seed = resolve_seed(seed);
    let baseline = draw(&pools, dates, seed);

    let mut out = Vec::with_capacity(dates.len() * scenarios.len());
    for &name in scenarios {
        let values: Vec<f64> = match name {
            "baseline" => baseline.clone(),
            "dry" => baseline.iter().map(|v| v * config.dry_scale).collect(),
            "wet" => baseline.iter().map(|v| v * config.wet_scale).collect(),
            "erratic" => {
                let (lo, hi) = config.erratic_range;
                let mut rng = StdRng::seed_from_u64(stream_seed(seed, "erratic"));
                baseline.iter().map(|v| v * rng.gen_range(lo..=hi)).collect()
            }
            other => {
                warn!(scenario = other, known = ?RAIN_SCENARIOS, "unknown rainfall scenario; using baseline values");
                baseline.clone()
            }
        };
        out.extend(dates.iter().zip(values).map(|(&date, value)| ScenarioSeries {
            key: TimeKey::Date(date),
            scenario: name.to_string(),
            value,
        }));
    }
    Ok(out)
}

fn draw(pools: &[Vec<f64>; 12], dates: &[NaiveDate], seed: u64) -> Vec<f64> {
    let empty: Vec<usize> = (0..12).filter(|&m| pools[m].is_empty()).map(|m| m + 1).collect();
    if !empty.is_empty() {
        debug!(months = ?empty, "empty rainfall pools draw zero");
    }

    let mut rng = StdRng::seed_from_u64(stream_seed(seed, "draws"));
    dates
        .iter()
        .map(|d| pools[d.month0() as usize].choose(&mut rng).copied().unwrap_or(0.0))
        .collect()
}

fn resolve_seed(seed: Option<u64>) -> u64 {
    seed.unwrap_or_else(|| rand::thread_rng().r#gen())
}

fn stream_seed(seed: u64, purpose: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    seed.hash(&mut hasher);
    purpose.hash(&mut hasher);
    hasher.finish()
}
