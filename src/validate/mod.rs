//! Rule-based quality checks over a raw weather table.
//!
//! The engine is standalone: missing dates are found by regenerating each
//! entity's calendar, not by reading synthetic flags from calendar completion.
//! Every check only runs when the columns it needs are present.

pub mod checks;

pub use checks::*;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{WeatherRecord, WeatherTable};
use crate::error::AppError;

/// Validation thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Plausible temperature range in °C; `±∞` disables that side.
    pub temp_bounds: (f64, f64),
    /// Daily rain ceiling in mm (`∞` disables).
    pub rain_max: f64,
    /// Daily snow ceiling in cm (`∞` disables).
    pub snow_max: f64,
    pub check_precip_consistency: bool,
    /// Liquid equivalent (mm) per cm of snow.
    pub swe_ratio: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            temp_bounds: (-60.0, 60.0),
            rain_max: 200.0,
            snow_max: f64::INFINITY,
            check_precip_consistency: true,
            swe_ratio: 10.0,
        }
    }
}

impl ValidationConfig {
    /// Reject configurations no check could interpret.
    pub fn validate(&self) -> Result<(), AppError> {
        let (low, high) = self.temp_bounds;
        if low.is_nan() || high.is_nan() {
            return Err(AppError::input("temp_bounds must not be NaN."));
        }
        if low > high {
            return Err(AppError::input(format!(
                "temp_bounds low ({low}) is greater than high ({high})."
            )));
        }
        if self.rain_max.is_nan() || self.snow_max.is_nan() {
            return Err(AppError::input("rain_max and snow_max must not be NaN."));
        }
        if self.check_precip_consistency && !(self.swe_ratio.is_finite() && self.swe_ratio > 0.0) {
            return Err(AppError::input(format!(
                "swe_ratio must be a positive finite number (got {}).",
                self.swe_ratio
            )));
        }
        Ok(())
    }
}

/// Kind of validation failure. Ordering is the tie-break when sorting flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagKind {
    MissingDate,
    NegativeRain,
    NegativeSnow,
    NegativePrecip,
    RainGtMax,
    SnowGtMax,
    TmaxLtTmin,
    TempOutOfRange,
    GustDirOutOfRange,
    PrecipInconsistent,
}

impl FlagKind {
    pub fn name(self) -> &'static str {
        match self {
            FlagKind::MissingDate => "missing_date",
            FlagKind::NegativeRain => "negative_rain",
            FlagKind::NegativeSnow => "negative_snow",
            FlagKind::NegativePrecip => "negative_precip",
            FlagKind::RainGtMax => "rain_gt_max",
            FlagKind::SnowGtMax => "snow_gt_max",
            FlagKind::TmaxLtTmin => "tmax_lt_tmin",
            FlagKind::TempOutOfRange => "temp_out_of_range",
            FlagKind::GustDirOutOfRange => "gust_dir_out_of_range",
            FlagKind::PrecipInconsistent => "precip_inconsistent",
        }
    }
}

impl std::fmt::Display for FlagKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One failed check.
///
/// `record` carries the offending row; it is `None` for `missing_date` flags,
/// which by definition have no row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationFlag {
    pub entity_id: String,
    pub date: NaiveDate,
    pub kind: FlagKind,
    pub record: Option<WeatherRecord>,
}

impl ValidationFlag {
    fn for_row(record: &WeatherRecord, kind: FlagKind) -> Self {
        Self {
            entity_id: record.entity_id.clone(),
            date: record.date,
            kind,
            record: Some(record.clone()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub n_rows: usize,
    pub n_entities: usize,
    pub date_start: Option<NaiveDate>,
    pub date_end: Option<NaiveDate>,
    pub n_missing_dates: usize,
    /// `negative_rain`, `negative_snow` and `negative_precip` combined.
    pub n_negative_values: usize,
    pub n_rain_gt_max: usize,
    pub n_snow_gt_max: usize,
    pub n_tmax_lt_tmin: usize,
    pub n_temp_out_of_range: usize,
    pub n_gust_dir_out_of_range: usize,
    pub n_precip_inconsistent: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// All flags sorted by entity, date, then kind.
    pub flags: Vec<ValidationFlag>,
    pub summary: ValidationSummary,
}

impl ValidationReport {
    pub fn count(&self, kind: FlagKind) -> usize {
        self.flags.iter().filter(|f| f.kind == kind).count()
    }

    pub fn is_clean(&self) -> bool {
        self.flags.is_empty()
    }
}

/// Run every applicable check over `table`.
pub fn validate_weather(table: &WeatherTable, config: &ValidationConfig) -> Result<ValidationReport, AppError> {
    config.validate()?;

    let mut flags = missing_date_flags(table);
    for record in table.rows() {
        flags.extend(row_flags(record, table, config).into_iter().map(|k| ValidationFlag::for_row(record, k)));
    }
    flags.sort_by(|a, b| (&a.entity_id, a.date, a.kind).cmp(&(&b.entity_id, b.date, b.kind)));

    let summary = summarise(table, &flags);
    debug!(flags = flags.len(), rows = summary.n_rows, "validation finished");
    Ok(ValidationReport { flags, summary })
}

fn summarise(table: &WeatherTable, flags: &[ValidationFlag]) -> ValidationSummary {
    let mut summary = ValidationSummary {
        n_rows: table.len(),
        n_entities: table.by_entity().len(),
        date_start: table.rows().iter().map(|r| r.date).min(),
        date_end: table.rows().iter().map(|r| r.date).max(),
        ..ValidationSummary::default()
    };
    for flag in flags {
        let counter = match flag.kind {
            FlagKind::MissingDate => &mut summary.n_missing_dates,
            FlagKind::NegativeRain | FlagKind::NegativeSnow | FlagKind::NegativePrecip => {
                &mut summary.n_negative_values
            }
            FlagKind::RainGtMax => &mut summary.n_rain_gt_max,
            FlagKind::SnowGtMax => &mut summary.n_snow_gt_max,
            FlagKind::TmaxLtTmin => &mut summary.n_tmax_lt_tmin,
            FlagKind::TempOutOfRange => &mut summary.n_temp_out_of_range,
            FlagKind::GustDirOutOfRange => &mut summary.n_gust_dir_out_of_range,
            FlagKind::PrecipInconsistent => &mut summary.n_precip_inconsistent,
        };
        *counter += 1;
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Field;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 3, day).unwrap()
    }

    fn table(rows: Vec<WeatherRecord>) -> WeatherTable {
        WeatherTable::from_records(rows)
    }

    #[test]
    fn one_day_gap_and_negative_rain() {
        let t = table(vec![
            WeatherRecord::new("S1", d(1)).with(Field::Rain, -1.0),
            WeatherRecord::new("S1", d(3)).with(Field::Rain, 2.0),
        ]);
        let report = validate_weather(&t, &ValidationConfig::default()).unwrap();
        assert!(report.summary.n_missing_dates >= 1);
        assert_eq!(report.count(FlagKind::NegativeRain), 1);
        assert_eq!(report.summary.n_negative_values, 1);
        assert_eq!(report.summary.n_rows, 2);
        assert_eq!(report.summary.n_entities, 1);
        assert_eq!(report.summary.date_start, Some(d(1)));
        assert_eq!(report.summary.date_end, Some(d(3)));

        let missing: Vec<_> = report.flags.iter().filter(|f| f.kind == FlagKind::MissingDate).collect();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].date, d(2));
        assert!(missing[0].record.is_none());
    }

    #[test]
    fn narrower_temp_bounds_never_flag_less() {
        let temps = [-70.0, -20.0, -5.0, 0.0, 12.0, 31.0, 45.0, 65.0];
        let t = table(
            temps
                .iter()
                .enumerate()
                .map(|(i, &v)| WeatherRecord::new("S1", d(i as u32 + 1)).with(Field::Tmax, v).with(Field::Tmin, v - 3.0))
                .collect(),
        );
        let bounds = [(-60.0, 60.0), (-30.0, 40.0), (-10.0, 20.0), (0.0, 5.0)];
        let mut previous = 0;
        for b in bounds {
            let cfg = ValidationConfig {
                temp_bounds: b,
                ..ValidationConfig::default()
            };
            let n = validate_weather(&t, &cfg).unwrap().summary.n_temp_out_of_range;
            assert!(n >= previous, "bounds {b:?} gave {n} < {previous}");
            previous = n;
        }
        let wide = ValidationConfig {
            temp_bounds: (f64::NEG_INFINITY, f64::INFINITY),
            ..ValidationConfig::default()
        };
        assert_eq!(validate_weather(&t, &wide).unwrap().summary.n_temp_out_of_range, 0);
    }

    #[test]
    fn absent_columns_produce_no_flags() {
        let t = WeatherTable::new([Field::Tmean], vec![WeatherRecord::new("S1", d(1)).with(Field::Tmean, 500.0)]);
        let report = validate_weather(&t, &ValidationConfig::default()).unwrap();
        assert!(report.is_clean());
    }

    #[test]
    fn precip_consistency_is_one_bucket() {
        let t = table(vec![
            // precip below rain
            WeatherRecord::new("S1", d(1)).with(Field::Rain, 5.0).with(Field::Snow, 0.0).with(Field::Precip, 3.0),
            // precip below snow equivalent
            WeatherRecord::new("S1", d(2)).with(Field::Rain, 0.0).with(Field::Snow, 1.0).with(Field::Precip, 4.0),
            // both at once: still one flag
            WeatherRecord::new("S1", d(3)).with(Field::Rain, 5.0).with(Field::Snow, 1.0).with(Field::Precip, 1.0),
            WeatherRecord::new("S1", d(4)).with(Field::Rain, 2.0).with(Field::Snow, 0.5).with(Field::Precip, 8.0),
        ]);
        let report = validate_weather(&t, &ValidationConfig::default()).unwrap();
        assert_eq!(report.summary.n_precip_inconsistent, 3);

        let off = ValidationConfig {
            check_precip_consistency: false,
            ..ValidationConfig::default()
        };
        assert_eq!(validate_weather(&t, &off).unwrap().summary.n_precip_inconsistent, 0);
    }

    #[test]
    fn ceilings_and_direction() {
        let t = table(vec![
            WeatherRecord::new("S1", d(1)).with(Field::Rain, 250.0).with(Field::Snow, 900.0),
            WeatherRecord::new("S1", d(2)).with(Field::WindDirection, 361.0),
            WeatherRecord::new("S1", d(3)).with(Field::WindDirection, 360.0).with(Field::Tmax, 1.0).with(Field::Tmin, 2.0),
        ]);
        let report = validate_weather(&t, &ValidationConfig::default()).unwrap();
        assert_eq!(report.summary.n_rain_gt_max, 1);
        assert_eq!(report.summary.n_snow_gt_max, 0);
        assert_eq!(report.summary.n_gust_dir_out_of_range, 1);
        assert_eq!(report.summary.n_tmax_lt_tmin, 1);

        let capped = ValidationConfig {
            snow_max: 100.0,
            rain_max: f64::INFINITY,
            ..ValidationConfig::default()
        };
        let report = validate_weather(&t, &capped).unwrap();
        assert_eq!(report.summary.n_snow_gt_max, 1);
        assert_eq!(report.summary.n_rain_gt_max, 0);
    }

    #[test]
    fn flags_sorted_by_entity_then_date() {
        let t = table(vec![
            WeatherRecord::new("B", d(2)).with(Field::Rain, -1.0),
            WeatherRecord::new("A", d(5)).with(Field::Rain, -1.0).with(Field::Precip, -2.0),
            WeatherRecord::new("A", d(1)).with(Field::Rain, -1.0),
        ]);
        let report = validate_weather(&t, &ValidationConfig::default()).unwrap();
        let keys: Vec<(&str, NaiveDate)> = report.flags.iter().map(|f| (f.entity_id.as_str(), f.date)).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        assert_eq!(report.summary.n_missing_dates, 3);
        assert_eq!(report.summary.n_entities, 2);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let t = table(vec![WeatherRecord::new("S1", d(1)).with(Field::Rain, 1.0)]);
        for cfg in [
            ValidationConfig {
                temp_bounds: (10.0, -10.0),
                ..ValidationConfig::default()
            },
            ValidationConfig {
                temp_bounds: (f64::NAN, 10.0),
                ..ValidationConfig::default()
            },
            ValidationConfig {
                swe_ratio: 0.0,
                ..ValidationConfig::default()
            },
        ] {
            assert_eq!(validate_weather(&t, &cfg).unwrap_err().exit_code(), 2);
        }
    }
}
