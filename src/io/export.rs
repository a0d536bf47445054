//! Export result tables to CSV (with a metadata header) and fit results to JSON.
//!
//! Every CSV starts with `# key: value` comment lines describing how the table
//! was produced, followed by a regular header row. [`crate::io::read_weather_csv`]
//! skips those comment lines, so exported calendar tables can be read back.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::calendar::GapSummary;
use crate::domain::{CalendarTable, Field, WeatherRecord};
use crate::error::AppError;
use crate::fit::{DailyAverage, FitMetrics, SeasonalFitResult};
use crate::scenario::{ScenarioSeries, pivot_wide};
use crate::validate::ValidationFlag;

/// Write `# key: value` lines, then `columns` and `rows` as CSV.
pub fn write_table_csv(
    path: &Path,
    metadata: &[(String, String)],
    columns: &[String],
    rows: &[Vec<String>],
) -> Result<(), AppError> {
    let mut file = File::create(path)
        .map_err(|e| AppError::input(format!("Failed to create export CSV '{}': {e}", path.display())))?;
    for (key, value) in metadata {
        writeln!(file, "# {key}: {value}")
            .map_err(|e| AppError::input(format!("Failed to write export metadata: {e}")))?;
    }

    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(columns)?;
    for row in rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Calendar-completed table, one column per present field plus `is_synthetic`.
pub fn write_calendar_csv(path: &Path, table: &CalendarTable, metadata: &[(String, String)]) -> Result<(), AppError> {
    let fields: Vec<Field> = table.columns().iter().copied().collect();
    let mut columns = vec!["entity_id".to_string(), "date".to_string()];
    columns.extend(fields.iter().map(|f| f.name().to_string()));
    columns.push("is_synthetic".to_string());

    let rows: Vec<Vec<String>> = table
        .rows()
        .iter()
        .map(|row| {
            let mut cells = record_cells(&row.record, &fields);
            cells.push(row.is_synthetic.to_string());
            cells
        })
        .collect();
    write_table_csv(path, metadata, &columns, &rows)
}

pub fn write_gaps_csv(path: &Path, gaps: &[GapSummary], metadata: &[(String, String)]) -> Result<(), AppError> {
    let columns = [
        "entity_id",
        "month",
        "total_days",
        "missing_days",
        "coverage_ratio",
        "gap_run_count",
        "longest_gap_run",
    ]
    .map(String::from);
    let rows: Vec<Vec<String>> = gaps
        .iter()
        .map(|g| {
            vec![
                g.entity_id.clone(),
                g.month.clone().unwrap_or_default(),
                g.total_days.to_string(),
                g.missing_days.to_string(),
                format!("{:.6}", g.coverage_ratio),
                g.gap_run_count.to_string(),
                g.longest_gap_run.to_string(),
            ]
        })
        .collect();
    write_table_csv(path, metadata, &columns, &rows)
}

/// Validation flags with the offending row's values.
pub fn write_flags_csv(path: &Path, flags: &[ValidationFlag], metadata: &[(String, String)]) -> Result<(), AppError> {
    let mut columns = vec!["entity_id".to_string(), "date".to_string(), "flag_kind".to_string()];
    columns.extend(Field::ALL.iter().map(|f| f.name().to_string()));
    let rows: Vec<Vec<String>> = flags
        .iter()
        .map(|f| {
            let mut cells = vec![f.entity_id.clone(), f.date.to_string(), f.kind.to_string()];
            match &f.record {
                Some(record) => cells.extend(record_cells(record, &Field::ALL).into_iter().skip(2)),
                None => cells.extend(Field::ALL.iter().map(|_| String::new())),
            }
            cells
        })
        .collect();
    write_table_csv(path, metadata, &columns, &rows)
}

/// Day-of-year table: observed mean, observation count, one column per model.
pub fn write_daily_average_csv(
    path: &Path,
    daily: &DailyAverage,
    metadata: &[(String, String)],
) -> Result<(), AppError> {
    let mut columns = vec!["day_of_year".to_string(), "observed".to_string(), "n_obs".to_string()];
    columns.extend(daily.fitted.iter().map(|(name, _)| format!("fitted_{name}")));
    let rows: Vec<Vec<String>> = (0..daily.len())
        .map(|i| {
            let mut cells = vec![
                daily.day_of_year[i].to_string(),
                format!("{:.6}", daily.observed[i]),
                daily.n_obs[i].to_string(),
            ];
            cells.extend(daily.fitted.iter().map(|(_, v)| format!("{:.6}", v[i])));
            cells
        })
        .collect();
    write_table_csv(path, metadata, &columns, &rows)
}

/// Scenario output, either long (`key,scenario,value`) or wide (one column per scenario).
pub fn write_scenarios_csv(
    path: &Path,
    series: &[ScenarioSeries],
    wide: bool,
    metadata: &[(String, String)],
) -> Result<(), AppError> {
    if wide {
        let table = pivot_wide(series);
        let mut columns = vec!["key".to_string()];
        columns.extend(table.scenarios.iter().cloned());
        let rows: Vec<Vec<String>> = table
            .keys
            .iter()
            .zip(&table.values)
            .map(|(key, values)| {
                let mut cells = vec![key.to_string()];
                cells.extend(values.iter().map(|v| fmt_value(Some(*v))));
                cells
            })
            .collect();
        return write_table_csv(path, metadata, &columns, &rows);
    }

    let columns = ["key", "scenario", "value"].map(String::from);
    let rows: Vec<Vec<String>> = series
        .iter()
        .map(|s| vec![s.key.to_string(), s.scenario.clone(), fmt_value(Some(s.value))])
        .collect();
    write_table_csv(path, metadata, &columns, &rows)
}

/// JSON form of a seasonal fit: metrics, parameters and the day-of-year table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitFile {
    pub tool: String,
    pub source: String,
    pub best_model: Option<String>,
    pub models: Vec<FitMetrics>,
    pub warnings: Vec<String>,
    pub daily_average: DailyAverage,
}

impl FitFile {
    pub fn from_result(result: &SeasonalFitResult, source: impl Into<String>) -> Self {
        Self {
            tool: "wx".to_string(),
            source: source.into(),
            best_model: result.best().map(|b| b.model_name.clone()),
            models: result.metrics.clone(),
            warnings: result.warnings.clone(),
            daily_average: result.daily_average.clone(),
        }
    }
}

pub fn write_fit_json(path: &Path, fit: &FitFile) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::input(format!("Failed to create fit JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, fit).map_err(|e| AppError::input(format!("Failed to write fit JSON: {e}")))?;
    Ok(())
}

/// `entity_id`, `date`, then one cell per field (blank for missing).
fn record_cells(record: &WeatherRecord, fields: &[Field]) -> Vec<String> {
    let mut cells = vec![record.entity_id.clone(), record.date.to_string()];
    cells.extend(fields.iter().map(|&f| fmt_value(record.get(f))));
    cells
}

fn fmt_value(v: Option<f64>) -> String {
    match v {
        Some(v) if v.is_finite() => format!("{v:.4}"),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::{CalendarOptions, complete_daily_calendar};
    use crate::domain::WeatherTable;
    use crate::io::read_weather_csv;
    use chrono::NaiveDate;

    #[test]
    fn calendar_export_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calendar.csv");
        let d = |day| NaiveDate::from_ymd_opt(2021, 5, day).unwrap();
        let table = WeatherTable::from_records(vec![
            WeatherRecord::new("S1", d(1)).with(Field::Rain, 1.25),
            WeatherRecord::new("S1", d(3)).with(Field::Rain, 0.0),
        ]);
        let completed = complete_daily_calendar(&table, &CalendarOptions::default()).unwrap();
        let meta = vec![("operation".to_string(), "complete".to_string())];
        write_calendar_csv(&path, &completed, &meta).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("# operation: complete\nentity_id,date,rain,is_synthetic\n"));

        let back = read_weather_csv(text.as_bytes()).unwrap();
        assert_eq!(back.rows_used, 3);
        assert_eq!(back.table.rows()[0].rain, Some(1.25));
        assert_eq!(back.table.rows()[1].rain, None);
    }
}
