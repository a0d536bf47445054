//! Bounded gap filling for numeric columns.
//!
//! Every method works on one entity's date-ordered series at a time, so values
//! from one station never leak into another station's gaps. Gaps are the
//! maximal runs of missing values; a run longer than `max_gap` is left alone.
//!
//! - `Nearest` copies the closest observed value by index distance (ties go to
//!   the following value) and also fills leading/trailing runs.
//! - `Linear` and `Spline` interpolate through all observed points and only
//!   write into interior runs: they never extrapolate past the first or last
//!   observation.

use clap::ValueEnum;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::calendar::missing_runs;
use crate::domain::{CalendarRow, CalendarTable, Field};
use crate::math::{CubicSpline, linear_interpolate};

/// Gap-filling strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ImputeMethod {
    Nearest,
    Linear,
    Spline,
}

/// Fill missing values in a single ordered series.
///
/// `max_gap = None` fills runs of any length. The input is not modified.
pub fn impute_series(values: &[Option<f64>], method: ImputeMethod, max_gap: Option<usize>) -> Vec<Option<f64>> {
    let mut out: Vec<Option<f64>> = values.iter().map(|v| v.filter(|x| !x.is_nan())).collect();
    let observed: Vec<(f64, f64)> = out
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|v| (i as f64, v)))
        .collect();

    let min_points = match method {
        ImputeMethod::Nearest => 1,
        ImputeMethod::Linear | ImputeMethod::Spline => 2,
    };
    if observed.len() < min_points || observed.len() == out.len() {
        return out;
    }

    let flags: Vec<bool> = out.iter().map(Option::is_none).collect();
    let n = out.len();
    let fits_gate = |len: usize| max_gap.is_none_or(|g| len <= g);

    match method {
        ImputeMethod::Nearest => {
            for run in missing_runs(&flags) {
                if !fits_gate(run.len) {
                    continue;
                }
                let end = run.start + run.len;
                let prev = run.start.checked_sub(1).and_then(|i| values_at(&out, i));
                let next = if end < n { values_at(&out, end) } else { None };
                for i in run.start..end {
                    out[i] = match (prev, next) {
                        (Some((pi, pv)), Some((ni, nv))) => {
                            if ni - i <= i - pi { Some(nv) } else { Some(pv) }
                        }
                        (Some((_, pv)), None) => Some(pv),
                        (None, Some((_, nv))) => Some(nv),
                        (None, None) => None,
                    };
                }
            }
        }
        ImputeMethod::Linear => {
            let (xs, ys): (Vec<f64>, Vec<f64>) = observed.into_iter().unzip();
            fill_interior(&mut out, &flags, fits_gate, |i| linear_interpolate(&xs, &ys, i as f64));
        }
        ImputeMethod::Spline => {
            let (xs, ys): (Vec<f64>, Vec<f64>) = observed.into_iter().unzip();
            let Some(spline) = CubicSpline::fmm(&xs, &ys) else {
                return out;
            };
            fill_interior(&mut out, &flags, fits_gate, |i| spline.eval(i as f64));
        }
    }

    out
}

fn values_at(values: &[Option<f64>], i: usize) -> Option<(usize, f64)> {
    values.get(i).copied().flatten().map(|v| (i, v))
}

fn fill_interior(
    out: &mut [Option<f64>],
    flags: &[bool],
    fits_gate: impl Fn(usize) -> bool,
    eval: impl Fn(usize) -> f64,
) {
    let n = out.len();
    for run in missing_runs(flags) {
        let end = run.start + run.len;
        let interior = run.start > 0 && end < n;
        if !interior || !fits_gate(run.len) {
            continue;
        }
        for i in run.start..end {
            let v = eval(i);
            out[i] = v.is_finite().then_some(v);
        }
    }
}

/// Fill the named columns of a calendar table, entity by entity.
///
/// Names that are not recognized measurement columns, or that are absent from
/// the table, are skipped. Output rows are ordered by entity, then date;
/// synthetic rows keep their flag after being filled.
pub fn impute_table(
    table: &CalendarTable,
    targets: &[&str],
    method: ImputeMethod,
    max_gap: Option<usize>,
) -> CalendarTable {
    let fields: Vec<Field> = targets
        .iter()
        .filter_map(|name| match Field::from_name(name) {
            Some(f) if table.has(f) => Some(f),
            Some(f) => {
                debug!(column = %f, "imputation target absent from table; skipped");
                None
            }
            None => {
                debug!(column = %name, "imputation target is not a numeric column; skipped");
                None
            }
        })
        .collect();

    let groups: Vec<Vec<&CalendarRow>> = table.by_entity().into_values().collect();
    let rows: Vec<CalendarRow> = groups
        .par_iter()
        .flat_map_iter(|rows| impute_entity(rows, &fields, method, max_gap))
        .collect();

    CalendarTable::new(table.columns().iter().copied(), rows)
}

fn impute_entity(
    rows: &[&CalendarRow],
    fields: &[Field],
    method: ImputeMethod,
    max_gap: Option<usize>,
) -> Vec<CalendarRow> {
    let mut out: Vec<CalendarRow> = rows.iter().map(|&r| r.clone()).collect();
    for &field in fields {
        let series: Vec<Option<f64>> = out.iter().map(|r| r.record.get(field)).collect();
        let filled = impute_series(&series, method, max_gap);
        for (row, value) in out.iter_mut().zip(filled) {
            row.record.set(field, value);
        }
    }
    out
}
