//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - passed between the cleaning, validation and fitting stages in-memory
//! - exported to CSV/JSON
//! - built directly in tests without going through CSV ingest

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// A recognized numeric measurement column.
///
/// Units follow the ingest contract: temperatures in °C, rain/precipitation in
/// mm, snow in cm, wind speed in km/h, wind direction in degrees.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Tmin,
    Tmax,
    Tmean,
    Rain,
    Snow,
    Precip,
    WindSpeed,
    WindDirection,
}

impl Field {
    pub const ALL: [Field; 8] = [
        Field::Tmin,
        Field::Tmax,
        Field::Tmean,
        Field::Rain,
        Field::Snow,
        Field::Precip,
        Field::WindSpeed,
        Field::WindDirection,
    ];

    /// Canonical column name.
    pub fn name(self) -> &'static str {
        match self {
            Field::Tmin => "tmin",
            Field::Tmax => "tmax",
            Field::Tmean => "tmean",
            Field::Rain => "rain",
            Field::Snow => "snow",
            Field::Precip => "precip",
            Field::WindSpeed => "wind_speed",
            Field::WindDirection => "wind_direction",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Field::Tmin | Field::Tmax | Field::Tmean => "degC",
            Field::Rain | Field::Precip => "mm",
            Field::Snow => "cm",
            Field::WindSpeed => "km/h",
            Field::WindDirection => "deg",
        }
    }

    /// Look up a field by its canonical name (case-insensitive).
    ///
    /// Non-measurement columns such as `entity_id` or `date` return `None`.
    pub fn from_name(name: &str) -> Option<Field> {
        let name = name.trim().to_ascii_lowercase();
        Field::ALL.into_iter().find(|f| f.name() == name)
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One observation row: a station on a given day.
///
/// `None` means the value is missing. NaN values are treated as missing by
/// [`WeatherRecord::get`] and are never stored by [`WeatherRecord::set`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    pub entity_id: String,
    pub date: NaiveDate,
    pub tmin: Option<f64>,
    pub tmax: Option<f64>,
    pub tmean: Option<f64>,
    pub rain: Option<f64>,
    pub snow: Option<f64>,
    pub precip: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_direction: Option<f64>,
}

impl WeatherRecord {
    /// A row with every measurement unset.
    pub fn new(entity_id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            entity_id: entity_id.into(),
            date,
            tmin: None,
            tmax: None,
            tmean: None,
            rain: None,
            snow: None,
            precip: None,
            wind_speed: None,
            wind_direction: None,
        }
    }

    /// Builder-style setter, handy in tests and generators.
    pub fn with(mut self, field: Field, value: f64) -> Self {
        self.set(field, Some(value));
        self
    }

    pub fn get(&self, field: Field) -> Option<f64> {
        let v = match field {
            Field::Tmin => self.tmin,
            Field::Tmax => self.tmax,
            Field::Tmean => self.tmean,
            Field::Rain => self.rain,
            Field::Snow => self.snow,
            Field::Precip => self.precip,
            Field::WindSpeed => self.wind_speed,
            Field::WindDirection => self.wind_direction,
        };
        v.filter(|x| !x.is_nan())
    }

    pub fn set(&mut self, field: Field, value: Option<f64>) {
        let value = value.filter(|x| !x.is_nan());
        let slot = match field {
            Field::Tmin => &mut self.tmin,
            Field::Tmax => &mut self.tmax,
            Field::Tmean => &mut self.tmean,
            Field::Rain => &mut self.rain,
            Field::Snow => &mut self.snow,
            Field::Precip => &mut self.precip,
            Field::WindSpeed => &mut self.wind_speed,
            Field::WindDirection => &mut self.wind_direction,
        };
        *slot = value;
    }

    /// True when no measurement field carries a value.
    pub fn has_no_measurements(&self) -> bool {
        Field::ALL.iter().all(|&f| self.get(f).is_none())
    }

    /// Calendar month key in `YYYY-MM` form.
    pub fn month_key(&self) -> String {
        format!("{:04}-{:02}", self.date.year(), self.date.month())
    }
}

/// The single missingness rule shared by calendar completion, gap summaries and
/// anything else that needs to know whether a day was observed.
///
/// A row is missing when it was inserted by calendar completion, or when it
/// exists in the input but every measurement is null.
pub fn is_missing(record: &WeatherRecord, is_synthetic: bool) -> bool {
    is_synthetic || record.has_no_measurements()
}

/// A table of weather observations plus the set of measurement columns present.
///
/// Column presence is tracked separately from values so that a column that is
/// present but entirely null is distinguishable from an absent column.
#[derive(Debug, Clone, Default)]
pub struct WeatherTable {
    columns: BTreeSet<Field>,
    rows: Vec<WeatherRecord>,
}

impl WeatherTable {
    pub fn new(columns: impl IntoIterator<Item = Field>, rows: Vec<WeatherRecord>) -> Self {
        Self {
            columns: columns.into_iter().collect(),
            rows,
        }
    }

    /// Build a table, treating a column as present if any row carries a value.
    pub fn from_records(rows: Vec<WeatherRecord>) -> Self {
        let columns = Field::ALL
            .into_iter()
            .filter(|&f| rows.iter().any(|r| r.get(f).is_some()))
            .collect();
        Self { columns, rows }
    }

    pub fn columns(&self) -> &BTreeSet<Field> {
        &self.columns
    }

    pub fn has(&self, field: Field) -> bool {
        self.columns.contains(&field)
    }

    pub fn rows(&self) -> &[WeatherRecord] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<WeatherRecord> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows grouped by entity (sorted by id), each group sorted by date.
    pub fn by_entity(&self) -> BTreeMap<&str, Vec<&WeatherRecord>> {
        let mut groups: BTreeMap<&str, Vec<&WeatherRecord>> = BTreeMap::new();
        for row in &self.rows {
            groups.entry(row.entity_id.as_str()).or_default().push(row);
        }
        for rows in groups.values_mut() {
            rows.sort_by_key(|r| r.date);
        }
        groups
    }
}

/// A row of a calendar-completed table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarRow {
    pub record: WeatherRecord,
    /// True when the row was inserted to make the date sequence contiguous.
    pub is_synthetic: bool,
}

impl CalendarRow {
    pub fn observed(record: WeatherRecord) -> Self {
        Self {
            record,
            is_synthetic: false,
        }
    }

    pub fn synthetic(entity_id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            record: WeatherRecord::new(entity_id, date),
            is_synthetic: true,
        }
    }

    pub fn is_missing(&self) -> bool {
        is_missing(&self.record, self.is_synthetic)
    }
}

/// A table whose rows carry the synthetic-row flag.
#[derive(Debug, Clone, Default)]
pub struct CalendarTable {
    columns: BTreeSet<Field>,
    rows: Vec<CalendarRow>,
}

impl CalendarTable {
    pub fn new(columns: impl IntoIterator<Item = Field>, rows: Vec<CalendarRow>) -> Self {
        Self {
            columns: columns.into_iter().collect(),
            rows,
        }
    }

    /// Wrap a raw table without completing it: every row is marked observed,
    /// so missingness is decided purely by content.
    pub fn from_observed(table: &WeatherTable) -> Self {
        Self {
            columns: table.columns().clone(),
            rows: table.rows().iter().cloned().map(CalendarRow::observed).collect(),
        }
    }

    /// Drop the synthetic flag and return a plain weather table.
    pub fn to_weather_table(&self) -> WeatherTable {
        WeatherTable::new(
            self.columns.iter().copied(),
            self.rows.iter().map(|r| r.record.clone()).collect(),
        )
    }

    pub fn columns(&self) -> &BTreeSet<Field> {
        &self.columns
    }

    pub fn has(&self, field: Field) -> bool {
        self.columns.contains(&field)
    }

    pub fn rows(&self) -> &[CalendarRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn synthetic_count(&self) -> usize {
        self.rows.iter().filter(|r| r.is_synthetic).count()
    }

    /// Rows grouped by entity (sorted by id), each group sorted by date.
    pub fn by_entity(&self) -> BTreeMap<&str, Vec<&CalendarRow>> {
        let mut groups: BTreeMap<&str, Vec<&CalendarRow>> = BTreeMap::new();
        for row in &self.rows {
            groups.entry(row.record.entity_id.as_str()).or_default().push(row);
        }
        for rows in groups.values_mut() {
            rows.sort_by_key(|r| r.record.date);
        }
        groups
    }
}

/// Day-of-year ordinal (1..=366). Dec 31 of a leap year is 366.
pub fn day_of_year(date: NaiveDate) -> u32 {
    date.ordinal()
}

/// Time axis for scenario output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeKey {
    DayOfYear(u32),
    Date(NaiveDate),
}

impl std::fmt::Display for TimeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeKey::DayOfYear(d) => write!(f, "{d}"),
            TimeKey::Date(d) => write!(f, "{d}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn all_null_observed_row_counts_as_missing() {
        let row = CalendarRow::observed(WeatherRecord::new("S1", d(2020, 1, 1)));
        assert!(row.is_missing());

        let row = CalendarRow::observed(WeatherRecord::new("S1", d(2020, 1, 1)).with(Field::Rain, 0.0));
        assert!(!row.is_missing());
    }

    #[test]
    fn nan_is_never_stored() {
        let mut r = WeatherRecord::new("S1", d(2020, 1, 1));
        r.set(Field::Tmax, Some(f64::NAN));
        assert_eq!(r.tmax, None);
        r.tmin = Some(f64::NAN);
        assert_eq!(r.get(Field::Tmin), None);
    }

    #[test]
    fn from_records_infers_present_columns() {
        let t = WeatherTable::from_records(vec![
            WeatherRecord::new("A", d(2020, 1, 1)).with(Field::Tmax, 10.0),
            WeatherRecord::new("A", d(2020, 1, 2)).with(Field::Rain, 1.0),
        ]);
        assert!(t.has(Field::Tmax));
        assert!(t.has(Field::Rain));
        assert!(!t.has(Field::Snow));
    }

    #[test]
    fn field_names_round_trip() {
        for f in Field::ALL {
            assert_eq!(Field::from_name(f.name()), Some(f));
        }
        assert_eq!(Field::from_name("entity_id"), None);
        assert_eq!(Field::from_name(" TMAX "), Some(Field::Tmax));
    }

    #[test]
    fn leap_year_day_366() {
        assert_eq!(day_of_year(d(2020, 12, 31)), 366);
        assert_eq!(day_of_year(d(2021, 12, 31)), 365);
        assert_eq!(d(2021, 3, 5).ordinal(), day_of_year(d(2021, 3, 5)));
    }
}
