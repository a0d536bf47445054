//! Formatted terminal output for every `wx` subcommand.
//!
//! We keep formatting code in one place so:
//! - the cleaning and fitting code stays clean and testable
//! - output changes are localized

use crate::calendar::GapSummary;
use crate::domain::{CalendarTable, Field};
use crate::fit::SeasonalFitResult;
use crate::io::IngestedData;
use crate::scenario::WideTable;
use crate::validate::ValidationReport;

/// Rows read / used / skipped, with the first few row errors.
pub fn format_ingest_summary(source: &str, ingest: &IngestedData) -> String {
    let mut out = String::new();
    let columns: Vec<&str> = ingest.table.columns().iter().map(|f| f.name()).collect();
    out.push_str(&format!("Input: {source}\n"));
    out.push_str(&format!(
        "Rows: read={} used={} skipped={} | entities={}\n",
        ingest.rows_read,
        ingest.rows_used,
        ingest.row_errors.len(),
        ingest.table.by_entity().len()
    ));
    out.push_str(&format!("Columns: {}\n", columns.join(", ")));
    for err in ingest.row_errors.iter().take(5) {
        out.push_str(&format!("  line {}: {}\n", err.line, err.message));
    }
    if ingest.row_errors.len() > 5 {
        out.push_str(&format!("  ... {} more\n", ingest.row_errors.len() - 5));
    }
    out
}

pub fn format_calendar_summary(table: &CalendarTable) -> String {
    let mut out = String::from("Calendar completion:\n");
    for (entity, rows) in table.by_entity() {
        let synthetic = rows.iter().filter(|r| r.is_synthetic).count();
        let (first, last) = match (rows.first(), rows.last()) {
            (Some(f), Some(l)) => (f.record.date.to_string(), l.record.date.to_string()),
            _ => (String::new(), String::new()),
        };
        out.push_str(&format!(
            "  {:<16} {first} .. {last}  days={:<6} inserted={synthetic}\n",
            truncate(entity, 16),
            rows.len()
        ));
    }
    out
}

pub fn format_gaps(gaps: &[GapSummary]) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:<16} {:<8} {:>7} {:>7} {:>9} {:>5} {:>8}\n",
            "entity", "month", "days", "missing", "coverage", "runs", "longest"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(format!("{:-<16} {:-<8} {:-<7} {:-<7} {:-<9} {:-<5} {:-<8}\n", "", "", "", "", "", "", "").trim_end());
    out.push('\n');

    for g in gaps {
        out.push_str(
            format!(
                "{:<16} {:<8} {:>7} {:>7} {:>8.1}% {:>5} {:>8}\n",
                truncate(&g.entity_id, 16),
                g.month.as_deref().unwrap_or("-"),
                g.total_days,
                g.missing_days,
                g.coverage_ratio * 100.0,
                g.gap_run_count,
                g.longest_gap_run
            )
            .trim_end(),
        );
        out.push('\n');
    }
    out
}

/// Non-null counts per field before and after imputation.
pub fn format_impute_summary(before: &CalendarTable, after: &CalendarTable, fields: &[Field]) -> String {
    let mut out = String::from("Imputation:\n");
    for &field in fields {
        let count = |t: &CalendarTable| t.rows().iter().filter(|r| r.record.get(field).is_some()).count();
        let (b, a) = (count(before), count(after));
        out.push_str(&format!(
            "  {:<15} non-null {b} -> {a} (+{}) of {}\n",
            field.name(),
            a.saturating_sub(b),
            after.len()
        ));
    }
    out
}

pub fn format_validation(report: &ValidationReport, max_flags: usize) -> String {
    let s = &report.summary;
    let mut out = String::from("=== wx - validation ===\n");
    let span = match (s.date_start, s.date_end) {
        (Some(a), Some(b)) => format!("{a} .. {b}"),
        _ => "-".to_string(),
    };
    out.push_str(&format!("Rows: {} | entities: {} | span: {span}\n\n", s.n_rows, s.n_entities));

    let counts = [
        ("missing dates", s.n_missing_dates),
        ("negative values", s.n_negative_values),
        ("rain > max", s.n_rain_gt_max),
        ("snow > max", s.n_snow_gt_max),
        ("tmax < tmin", s.n_tmax_lt_tmin),
        ("temp out of range", s.n_temp_out_of_range),
        ("wind dir out of range", s.n_gust_dir_out_of_range),
        ("precip inconsistent", s.n_precip_inconsistent),
    ];
    for (label, n) in counts {
        out.push_str(&format!("  {label:<22} {n:>6}\n"));
    }

    if !report.flags.is_empty() && max_flags > 0 {
        out.push_str("\nFlags:\n");
        for f in report.flags.iter().take(max_flags) {
            out.push_str(&format!("  {:<16} {} {}\n", truncate(&f.entity_id, 16), f.date, f.kind));
        }
        if report.flags.len() > max_flags {
            out.push_str(&format!("  ... {} more\n", report.flags.len() - max_flags));
        }
    }
    out
}

/// Model diagnostics, best model marked with `*`, then parameters and warnings.
pub fn format_fit_summary(title: &str, result: &SeasonalFitResult) -> String {
    let mut out = format!("=== wx - {title} ===\n");
    let daily = &result.daily_average;
    out.push_str(&format!(
        "Day-of-year points: {} | observations: {}\n",
        daily.len(),
        daily.n_obs.iter().sum::<usize>()
    ));

    out.push_str("\nModel diagnostics:\n");
    let best = result.best().map(|b| b.model_name.as_str());
    for m in &result.metrics {
        let chosen = if Some(m.model.as_str()) == best { "*" } else { " " };
        out.push_str(&format!(
            "{chosen} {:<16} SSE={:.3} RMSE={:.3} AIC={:.3} R2={}\n",
            truncate(&m.model, 16),
            m.quality.sse,
            m.quality.rmse,
            m.quality.aic,
            fmt_r2(m.quality.r2)
        ));
    }

    for fit in &result.fits {
        let params: Vec<String> = fit
            .model
            .param_names
            .iter()
            .zip(&fit.model.params)
            .map(|(n, v)| format!("{n}={v:.6}"))
            .collect();
        out.push_str(&format!("- {}: {}\n", fit.model_name, params.join(", ")));
        if let Some(formula) = fit.model.form.formula() {
            out.push_str(&format!("  {formula}\n"));
        }
    }

    for w in &result.warnings {
        out.push_str(&format!("warning: {w}\n"));
    }
    out
}

/// First `max_rows` rows of a wide scenario table.
pub fn format_scenarios(table: &WideTable, max_rows: usize) -> String {
    let mut out = String::new();
    let mut header = format!("{:<12}", "key");
    for s in &table.scenarios {
        header.push_str(&format!(" {:>10}", truncate(s, 10)));
    }
    out.push_str(header.trim_end());
    out.push('\n');

    for (key, values) in table.keys.iter().zip(&table.values).take(max_rows) {
        let mut line = format!("{:<12}", key.to_string());
        for v in values {
            line.push_str(&format!(" {v:>10.2}"));
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    if table.keys.len() > max_rows {
        out.push_str(&format!("... {} more rows\n", table.keys.len() - max_rows));
    }
    out
}

fn fmt_r2(r2: f64) -> String {
    if r2.is_nan() { "n/a".to_string() } else { format!("{r2:.4}") }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}
