//! Calendar completion: expand each station's series to a contiguous daily
//! sequence and mark inserted rows as synthetic.

use std::collections::HashMap;

use chrono::{Duration, NaiveDate};
use tracing::{debug, warn};

use crate::domain::{CalendarRow, CalendarTable, WeatherRecord, WeatherTable};
use crate::error::AppError;

/// Options for [`complete_daily_calendar`].
#[derive(Debug, Clone)]
pub struct CalendarOptions {
    /// Explicit first day for every entity (default: each entity's first observation).
    pub start: Option<NaiveDate>,
    /// Explicit last day for every entity (default: each entity's last observation).
    pub end: Option<NaiveDate>,
    /// Calendar step. Only one day is supported.
    pub step: Duration,
}

impl Default for CalendarOptions {
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            step: Duration::days(1),
        }
    }
}

/// Inclusive iterator over consecutive days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange(pub NaiveDate, pub NaiveDate);

impl Iterator for DateRange {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<Self::Item> {
        if self.0 <= self.1 {
            let current = self.0;
            self.0 = current.succ_opt()?;
            Some(current)
        } else {
            None
        }
    }
}

/// Expand every entity to a complete daily calendar.
///
/// Rows are left-joined onto the generated sequence by `(entity, date)`. Days
/// that had no input row are emitted as synthetic rows with every measurement
/// unset. Input rows outside explicit bounds are dropped, and for duplicated
/// `(entity, date)` pairs the first row wins. An entity whose observations all
/// fall outside a one-sided bound (e.g. only `start` given, every row before
/// it) has an empty range and is left out of the output with a warning.
///
/// Output is ordered by entity id, then date.
pub fn complete_daily_calendar(
    table: &WeatherTable,
    options: &CalendarOptions,
) -> Result<CalendarTable, AppError> {
    if options.step != Duration::days(1) {
        return Err(AppError::input(format!(
            "Unsupported calendar step of {} seconds: only daily completion is supported.",
            options.step.num_seconds()
        )));
    }
    if let (Some(start), Some(end)) = (options.start, options.end) {
        if start > end {
            return Err(AppError::input(format!(
                "Calendar start {start} is after end {end}."
            )));
        }
    }

    let mut rows = Vec::new();
    for (entity, records) in table.by_entity() {
        // `by_entity` sorts each group, so first/last are the observed extent.
        let (Some(first), Some(last)) = (records.first(), records.last()) else {
            continue;
        };
        let start = options.start.unwrap_or(first.date);
        let end = options.end.unwrap_or(last.date);
        if start > end {
            warn!(entity, %start, %end, "entity has no days inside the requested bounds; dropped");
            continue;
        }

        let mut by_date: HashMap<NaiveDate, &WeatherRecord> = HashMap::with_capacity(records.len());
        for &record in &records {
            if by_date.contains_key(&record.date) {
                debug!(entity, date = %record.date, "duplicate row ignored during calendar completion");
                continue;
            }
            by_date.insert(record.date, record);
        }

        for date in DateRange(start, end) {
            match by_date.get(&date) {
                Some(record) => rows.push(CalendarRow::observed((*record).clone())),
                None => rows.push(CalendarRow::synthetic(entity, date)),
            }
        }
    }

    Ok(CalendarTable::new(table.columns().iter().copied(), rows))
}
