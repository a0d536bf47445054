//! Individual checks.

use crate::calendar::DateRange;
use crate::domain::{Field, WeatherRecord, WeatherTable};
use crate::validate::{FlagKind, ValidationConfig, ValidationFlag};

/// Dates absent from each entity's contiguous calendar between its first and
/// last observed date.
pub fn missing_date_flags(table: &WeatherTable) -> Vec<ValidationFlag> {
    let mut flags = Vec::new();
    for (entity, rows) in table.by_entity() {
        let (Some(first), Some(last)) = (rows.first(), rows.last()) else {
            continue;
        };
        let mut observed = rows.iter().map(|r| r.date).peekable();
        for day in DateRange(first.date, last.date) {
            while observed.next_if(|&d| d < day).is_some() {}
            if observed.next_if_eq(&day).is_some() {
                // Skip any duplicates of the same day.
                while observed.next_if_eq(&day).is_some() {}
                continue;
            }
            flags.push(ValidationFlag {
                entity_id: entity.to_string(),
                date: day,
                kind: FlagKind::MissingDate,
                record: None,
            });
        }
    }
    flags
}

/// Row-level flag kinds for one record, in check order.
pub fn row_flags(record: &WeatherRecord, table: &WeatherTable, config: &ValidationConfig) -> Vec<FlagKind> {
    let mut kinds = Vec::new();
    let value = |field: Field| table.has(field).then(|| record.get(field)).flatten();

    for (field, kind) in [
        (Field::Rain, FlagKind::NegativeRain),
        (Field::Snow, FlagKind::NegativeSnow),
        (Field::Precip, FlagKind::NegativePrecip),
    ] {
        if value(field).is_some_and(|v| v < 0.0) {
            kinds.push(kind);
        }
    }

    if exceeds(value(Field::Rain), config.rain_max) {
        kinds.push(FlagKind::RainGtMax);
    }
    if exceeds(value(Field::Snow), config.snow_max) {
        kinds.push(FlagKind::SnowGtMax);
    }

    let (tmin, tmax) = (value(Field::Tmin), value(Field::Tmax));
    if matches!((tmin, tmax), (Some(lo), Some(hi)) if hi < lo) {
        kinds.push(FlagKind::TmaxLtTmin);
    }
    if [tmin, tmax].into_iter().flatten().any(|t| out_of_bounds(t, config.temp_bounds)) {
        kinds.push(FlagKind::TempOutOfRange);
    }

    if value(Field::WindDirection).is_some_and(|dir| !(0.0..=360.0).contains(&dir)) {
        kinds.push(FlagKind::GustDirOutOfRange);
    }

    if config.check_precip_consistency && precip_inconsistent(record, table, config.swe_ratio) {
        kinds.push(FlagKind::PrecipInconsistent);
    }
    kinds
}

fn exceeds(value: Option<f64>, ceiling: f64) -> bool {
    ceiling.is_finite() && value.is_some_and(|v| v > ceiling)
}

/// Each side of `bounds` is checked on its own; an infinite side never fires.
fn out_of_bounds(t: f64, (low, high): (f64, f64)) -> bool {
    (low.is_finite() && t < low) || (high.is_finite() && t > high)
}

/// Precipitation below rain, or below the snow liquid equivalent.
fn precip_inconsistent(record: &WeatherRecord, table: &WeatherTable, swe_ratio: f64) -> bool {
    if !table.has(Field::Precip) {
        return false;
    }
    let Some(precip) = record.get(Field::Precip) else {
        return false;
    };
    let below_rain = table.has(Field::Rain) && record.get(Field::Rain).is_some_and(|rain| precip < rain);
    let below_snow =
        table.has(Field::Snow) && record.get(Field::Snow).is_some_and(|snow| precip < snow * swe_ratio);
    below_rain || below_snow
}
