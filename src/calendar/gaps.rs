//! Gap classification and coverage summaries.
//!
//! A day is missing when it was inserted by calendar completion or when all of
//! its measurements are null (see [`crate::domain::is_missing`]). Gaps are the
//! maximal runs of consecutive missing days within a group, in date order.

use std::collections::BTreeMap;

use clap::ValueEnum;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::{CalendarRow, CalendarTable};

/// How rows are grouped before summarizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum GapGrouping {
    /// One summary per entity.
    Entity,
    /// One summary per entity and calendar month (`YYYY-MM`).
    EntityMonth,
}

/// Coverage statistics for one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapSummary {
    pub entity_id: String,
    /// `YYYY-MM` when grouping by month.
    pub month: Option<String>,
    pub total_days: usize,
    pub missing_days: usize,
    pub coverage_ratio: f64,
    pub gap_run_count: usize,
    pub longest_gap_run: usize,
}

/// Summarize missingness per entity or per entity-month.
///
/// Groups are never empty, so the coverage ratio is always defined. Entities are
/// summarized independently (in parallel); output is ordered by entity, then month.
pub fn summarise_gaps(table: &CalendarTable, grouping: GapGrouping) -> Vec<GapSummary> {
    let groups: Vec<(&str, Vec<&CalendarRow>)> = table.by_entity().into_iter().collect();

    groups
        .par_iter()
        .flat_map_iter(|(entity, rows)| summarise_entity(entity, rows, grouping))
        .collect()
}

fn summarise_entity(entity: &str, rows: &[&CalendarRow], grouping: GapGrouping) -> Vec<GapSummary> {
    match grouping {
        GapGrouping::Entity => summarise_group(entity, None, rows).into_iter().collect(),
        GapGrouping::EntityMonth => {
            let mut months: BTreeMap<String, Vec<&CalendarRow>> = BTreeMap::new();
            for &row in rows {
                months.entry(row.record.month_key()).or_default().push(row);
            }
            months
                .into_iter()
                .filter_map(|(month, rows)| summarise_group(entity, Some(month), &rows))
                .collect()
        }
    }
}

fn summarise_group(entity: &str, month: Option<String>, rows: &[&CalendarRow]) -> Option<GapSummary> {
    if rows.is_empty() {
        return None;
    }
    let flags: Vec<bool> = rows.iter().map(|r| r.is_missing()).collect();
    let runs = missing_runs(&flags);

    let total_days = rows.len();
    let missing_days = flags.iter().filter(|&&m| m).count();
    Some(GapSummary {
        entity_id: entity.to_string(),
        month,
        total_days,
        missing_days,
        coverage_ratio: (total_days - missing_days) as f64 / total_days as f64,
        gap_run_count: runs.len(),
        longest_gap_run: runs.iter().map(|r| r.len).max().unwrap_or(0),
    })
}

/// A maximal run of `true` values in a boolean sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Run {
    pub start: usize,
    pub len: usize,
}

/// Run-length encode the `true` runs of a missingness mask.
pub fn missing_runs(flags: &[bool]) -> Vec<Run> {
    let mut runs = Vec::new();
    let mut current: Option<Run> = None;
    for (i, &missing) in flags.iter().enumerate() {
        if missing {
            match current.as_mut() {
                Some(run) => run.len += 1,
                None => current = Some(Run { start: i, len: 1 }),
            }
        } else if let Some(run) = current.take() {
            runs.push(run);
        }
    }
    runs.extend(current);
    runs
}
