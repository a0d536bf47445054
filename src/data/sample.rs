//! Synthetic multi-year station series for demos and integration tests.
//!
//! Temperature follows an annual cosine with Gaussian day-to-day noise; rain is
//! a wet/dry coin flip with exponentially distributed amounts. A fraction of
//! days is dropped entirely and a further fraction has its values blanked, so
//! the output exercises both missingness paths.

use std::collections::hash_map::DefaultHasher;
use std::f64::consts::PI;
use std::hash::{Hash, Hasher};

use chrono::{Duration, NaiveDate};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::{Exp, Normal};

use crate::domain::{Field, WeatherRecord, WeatherTable, day_of_year};
use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct DemoConfig {
    pub entities: Vec<String>,
    pub start: NaiveDate,
    pub days: usize,
    /// Annual mean of the daily mean temperature (°C).
    pub mean_temp: f64,
    /// Half the seasonal swing (°C).
    pub amplitude: f64,
    /// Day-of-year of the warmest day.
    pub peak_doy: f64,
    /// Difference between tmax and tmin (°C).
    pub diurnal_range: f64,
    pub temp_noise_sd: f64,
    pub wet_prob: f64,
    /// Mean rain on wet days (mm).
    pub mean_rain: f64,
    /// Probability that a day has no row at all.
    pub drop_prob: f64,
    /// Probability that a kept row has every value blanked.
    pub blank_prob: f64,
    pub seed: u64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            entities: vec!["STATION_A".to_string(), "STATION_B".to_string()],
            start: NaiveDate::from_ymd_opt(2018, 1, 1).unwrap_or_default(),
            days: 3 * 365,
            mean_temp: 12.0,
            amplitude: 9.0,
            peak_doy: 200.0,
            diurnal_range: 9.0,
            temp_noise_sd: 1.5,
            wet_prob: 0.35,
            mean_rain: 6.0,
            drop_prob: 0.02,
            blank_prob: 0.01,
            seed: 42,
        }
    }
}

/// Generate the demo table described by `config`.
pub fn generate_demo_series(config: &DemoConfig) -> Result<WeatherTable, AppError> {
    if config.entities.is_empty() || config.days == 0 {
        return Err(AppError::input("Demo series needs at least one entity and one day."));
    }
    for (name, p) in [
        ("wet_prob", config.wet_prob),
        ("drop_prob", config.drop_prob),
        ("blank_prob", config.blank_prob),
    ] {
        if !(0.0..=1.0).contains(&p) {
            return Err(AppError::input(format!("{name} must be within [0, 1] (got {p}).")));
        }
    }
    if !(config.mean_rain.is_finite() && config.mean_rain > 0.0) {
        return Err(AppError::input("mean_rain must be positive."));
    }

    let noise = Normal::new(0.0, config.temp_noise_sd)
        .map_err(|e| AppError::input(format!("Noise distribution error: {e}")))?;
    let rain = Exp::new(1.0 / config.mean_rain)
        .map_err(|e| AppError::input(format!("Rain distribution error: {e}")))?;

    let mut rows = Vec::with_capacity(config.entities.len() * config.days);
    for entity in &config.entities {
        let mut rng = StdRng::seed_from_u64(sample_seed(config, entity));
        // Each station gets a small fixed offset so entities are distinguishable.
        let offset = noise.sample(&mut rng) * 0.5;

        for i in 0..config.days {
            let date = config.start + Duration::days(i as i64);
            let roll: f64 = rng.r#gen();
            if roll < config.drop_prob {
                continue;
            }
            let mut record = WeatherRecord::new(entity.clone(), date);
            if roll < config.drop_prob + config.blank_prob {
                rows.push(record);
                continue;
            }

            let doy = f64::from(day_of_year(date));
            let seasonal =
                config.mean_temp + offset + config.amplitude * (2.0 * PI * (doy - config.peak_doy) / 365.0).cos();
            let tmean = seasonal + noise.sample(&mut rng);
            let half = config.diurnal_range / 2.0;
            let rain_mm = if rng.gen_bool(config.wet_prob) {
                rain.sample(&mut rng)
            } else {
                0.0
            };

            record.set(Field::Tmin, Some(round1(tmean - half)));
            record.set(Field::Tmax, Some(round1(tmean + half)));
            record.set(Field::Tmean, Some(round1(tmean)));
            record.set(Field::Rain, Some(round1(rain_mm)));
            rows.push(record);
        }
    }

    Ok(WeatherTable::new([Field::Tmin, Field::Tmax, Field::Tmean, Field::Rain], rows))
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn sample_seed(config: &DemoConfig, entity: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    config.seed.hash(&mut hasher);
    entity.hash(&mut hasher);
    config.start.hash(&mut hasher);
    config.days.hash(&mut hasher);
    config.mean_temp.to_bits().hash(&mut hasher);
    config.amplitude.to_bits().hash(&mut hasher);
    config.temp_noise_sd.to_bits().hash(&mut hasher);
    config.wet_prob.to_bits().hash(&mut hasher);
    config.mean_rain.to_bits().hash(&mut hasher);
    hasher.finish()
}
