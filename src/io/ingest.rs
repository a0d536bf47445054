//! CSV ingest and normalization.
//!
//! Turns a daily weather CSV with loosely named headers into a
//! [`WeatherTable`].
//!
//! Design goals:
//! - **Strict schema** for `entity_id` and `date` (clear errors + exit code 2)
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - **Column presence is preserved**: a recognized header with only blank
//!   cells still marks the column as present

use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use csv::StringRecord;
use tracing::debug;

use crate::domain::{Field, WeatherRecord, WeatherTable};
use crate::error::AppError;

/// A row-level error encountered during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Ingest output: the table plus what was skipped.
#[derive(Debug, Clone)]
pub struct IngestedData {
    pub table: WeatherTable,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    pub rows_used: usize,
}

/// Load a weather CSV from disk.
pub fn load_weather_csv(path: &Path) -> Result<IngestedData, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::input(format!("Failed to open CSV '{}': {e}", path.display())))?;
    read_weather_csv(file)
}

/// Parse weather CSV from any reader.
pub fn read_weather_csv<R: Read>(input: R) -> Result<IngestedData, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_reader(input);

    let headers = reader
        .headers()
        .map_err(|e| AppError::input(format!("Failed to read CSV headers: {e}")))?
        .clone();
    let columns = resolve_columns(&headers)?;
    let present: BTreeSet<Field> = columns.fields.iter().map(|(f, _)| *f).collect();

    let mut rows = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // Line numbers are 1-based and the header is line 1. Comment lines are
        // not counted, so this is the record's position, not its byte line.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        match parse_row(&record, &columns) {
            Ok(row) => rows.push(row),
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }

    if !row_errors.is_empty() {
        debug!(skipped = row_errors.len(), "rows skipped during ingest");
    }
    let rows_used = rows.len();
    Ok(IngestedData {
        table: WeatherTable::new(present, rows),
        row_errors,
        rows_read,
        rows_used,
    })
}

/// Column positions resolved from the header row.
#[derive(Debug)]
struct ColumnMap {
    entity_id: usize,
    date: usize,
    fields: Vec<(Field, usize)>,
}

fn resolve_columns(headers: &StringRecord) -> Result<ColumnMap, AppError> {
    // First header wins when two map to the same canonical name.
    let mut header_map: HashMap<String, usize> = HashMap::new();
    for (idx, name) in headers.iter().enumerate() {
        header_map.entry(canonical_name(&normalize_header_name(name))).or_insert(idx);
    }

    let entity_id = *header_map
        .get("entity_id")
        .ok_or_else(|| AppError::input("Missing required column: `entity_id` (or `station`/`site`/`id`)"))?;
    let date = *header_map
        .get("date")
        .ok_or_else(|| AppError::input("Missing required column: `date`"))?;
    let fields = Field::ALL
        .into_iter()
        .filter_map(|f| header_map.get(f.name()).map(|&idx| (f, idx)))
        .collect();

    Ok(ColumnMap { entity_id, date, fields })
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports often prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase().replace([' ', '-'], "_")
}

/// Map common header spellings onto canonical column names.
fn canonical_name(name: &str) -> String {
    let canonical = match name {
        "station" | "station_id" | "site" | "site_id" | "id" | "entity" => "entity_id",
        "day" | "obs_date" | "datetime" => "date",
        "max_temp" | "temp_max" | "tmax_c" | "maxtemp" => "tmax",
        "min_temp" | "temp_min" | "tmin_c" | "mintemp" => "tmin",
        "mean_temp" | "temp_mean" | "tavg" | "tmean_c" | "avg_temp" => "tmean",
        "rainfall" | "rain_mm" => "rain",
        "snowfall" | "snow_cm" => "snow",
        "prcp" | "precipitation" | "precip_mm" | "total_precip" => "precip",
        "wind" | "wspd" | "gust_speed" => "wind_speed",
        "wdir" | "gust_dir" | "wind_dir" => "wind_direction",
        other => other,
    };
    canonical.to_string()
}

fn parse_row(record: &StringRecord, columns: &ColumnMap) -> Result<WeatherRecord, String> {
    let entity_id = get_cell(record, columns.entity_id).ok_or("Missing required value: `entity_id`")?;
    let date = parse_date(get_cell(record, columns.date).ok_or("Missing required value: `date`")?)?;

    let mut row = WeatherRecord::new(entity_id, date);
    for &(field, idx) in &columns.fields {
        row.set(field, parse_value(get_cell(record, idx), field)?);
    }
    Ok(row)
}

fn get_cell(record: &StringRecord, idx: usize) -> Option<&str> {
    record.get(idx).map(str::trim).filter(|s| !s.is_empty())
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    const FMTS: [&str; 2] = ["%Y-%m-%d", "%d/%m/%Y"];
    for fmt in FMTS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(d);
        }
    }
    Err(format!("Invalid date '{s}'. Expected YYYY-MM-DD or DD/MM/YYYY."))
}

/// Blank, `NA`, `NaN` and `null` cells are missing values.
fn parse_value(s: Option<&str>, field: Field) -> Result<Option<f64>, String> {
    let Some(s) = s else {
        return Ok(None);
    };
    if ["na", "nan", "null", "n/a"].iter().any(|m| s.eq_ignore_ascii_case(m)) {
        return Ok(None);
    }
    let v = s
        .parse::<f64>()
        .map_err(|_| format!("Invalid `{field}` value '{s}'."))?;
    Ok(v.is_finite().then_some(v))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_bom_and_missing_markers() {
        let csv = "\u{feff}Station,Date,Max Temp,min_temp,PRCP,wdir\n\
                   S1,2020-01-01,10.5,2.0,NA,270\n\
                   S1,02/01/2020,,1.0,3.5,\n";
        let data = read_weather_csv(csv.as_bytes()).unwrap();
        assert_eq!(data.rows_used, 2);
        assert!(data.row_errors.is_empty());

        let t = &data.table;
        assert!(t.has(Field::Tmax) && t.has(Field::Tmin) && t.has(Field::Precip) && t.has(Field::WindDirection));
        assert!(!t.has(Field::Rain));

        let rows = t.rows();
        assert_eq!(rows[0].entity_id, "S1");
        assert_eq!(rows[0].tmax, Some(10.5));
        assert_eq!(rows[0].precip, None);
        assert_eq!(rows[1].date, NaiveDate::from_ymd_opt(2020, 1, 2).unwrap());
        assert_eq!(rows[1].tmax, None);
        assert_eq!(rows[1].wind_direction, None);
    }

    #[test]
    fn empty_column_is_still_present() {
        let csv = "entity_id,date,snow\nS1,2020-01-01,\n";
        let data = read_weather_csv(csv.as_bytes()).unwrap();
        assert!(data.table.has(Field::Snow));
        assert!(data.table.rows()[0].has_no_measurements());
    }

    #[test]
    fn bad_rows_are_reported_not_fatal() {
        let csv = "site,date,rain\nA,2020-01-01,1\nA,not-a-date,2\n,2020-01-03,1\nA,2020-01-04,abc\nA,2020-01-05,0\n";
        let data = read_weather_csv(csv.as_bytes()).unwrap();
        assert_eq!(data.rows_read, 5);
        assert_eq!(data.rows_used, 2);
        let lines: Vec<usize> = data.row_errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![3, 4, 5]);
    }

    #[test]
    fn missing_key_columns_are_structural() {
        let err = read_weather_csv("date,rain\n2020-01-01,1\n".as_bytes()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        let err = read_weather_csv("entity_id,rain\nA,1\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("date"));
    }

    #[test]
    fn metadata_comments_are_skipped() {
        let csv = "# source: test\nentity_id,date,tmean\nA,2020-01-01,4\n";
        let data = read_weather_csv(csv.as_bytes()).unwrap();
        assert_eq!(data.rows_used, 1);
        assert!(data.table.has(Field::Tmean));
    }
}
