use weather_curves::app::pipeline::{PipelineConfig, run_pipeline};
use weather_curves::calendar::{CalendarOptions, GapGrouping, complete_daily_calendar, summarise_gaps};
use weather_curves::data::{DemoConfig, generate_demo_series};
use weather_curves::domain::Field;
use weather_curves::io::{FitFile, load_weather_csv, write_calendar_csv, write_fit_json};
use weather_curves::scenario::{BASELINE, pivot_wide};

fn demo() -> weather_curves::domain::WeatherTable {
    generate_demo_series(&DemoConfig {
        days: 2 * 365,
        drop_prob: 0.05,
        ..DemoConfig::default()
    })
    .unwrap()
}

#[test]
fn full_pipeline_on_demo_series() {
    let table = demo();
    let run = run_pipeline(&table, &PipelineConfig::default()).unwrap();

    // Every entity spans its full date range after completion.
    for (_, rows) in run.completed.by_entity() {
        assert!(rows.windows(2).all(|w| w[1].record.date == w[0].record.date.succ_opt().unwrap()));
    }
    assert!(run.completed.synthetic_count() > 0);
    assert_eq!(run.gaps.len(), 2);
    assert!(run.gaps.iter().all(|g| (0.0..=1.0).contains(&g.coverage_ratio) && g.missing_days > 0));

    // Short gaps are filled; the imputed table keeps the calendar shape.
    assert_eq!(run.imputed.len(), run.completed.len());
    let missing_tmean = |t: &weather_curves::domain::CalendarTable| {
        t.rows().iter().filter(|r| r.record.get(Field::Tmean).is_none()).count()
    };
    assert!(missing_tmean(&run.imputed) < missing_tmean(&run.completed));

    assert!(run.validation.summary.n_missing_dates > 0);
    assert_eq!(run.validation.summary.n_tmax_lt_tmin, 0);

    assert!(!run.fit.fits.is_empty());
    for fit in &run.fit.fits {
        assert!(fit.aic.is_finite());
        assert!((0.0..=1.0).contains(&fit.r2));
    }

    let shifts = pivot_wide(&run.shifts);
    assert_eq!(shifts.scenarios, vec![BASELINE, "+1", "+2", "+3"]);
    let rain = pivot_wide(&run.rain);
    assert_eq!(rain.keys.len(), 365);
    assert_eq!(rain.scenarios, vec!["baseline", "dry", "wet", "erratic"]);
}

#[test]
fn calendar_csv_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("completed.csv");

    let table = demo();
    let completed = complete_daily_calendar(&table, &CalendarOptions::default()).unwrap();
    write_calendar_csv(&path, &completed, &[("operation".to_string(), "complete".to_string())]).unwrap();

    let back = load_weather_csv(&path).unwrap();
    assert!(back.row_errors.is_empty());
    assert_eq!(back.rows_used, completed.len());
    assert_eq!(back.table.columns(), completed.columns());

    // Re-reading loses the synthetic flag but not the missingness: all-null rows
    // still count as missing days.
    let from_disk = complete_daily_calendar(&back.table, &CalendarOptions::default()).unwrap();
    let a = summarise_gaps(&completed, GapGrouping::EntityMonth);
    let b = summarise_gaps(&from_disk, GapGrouping::EntityMonth);
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(&b) {
        assert_eq!(x.missing_days, y.missing_days);
        assert_eq!(x.longest_gap_run, y.longest_gap_run);
    }
}

#[test]
fn fit_json_export() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fit.json");
    let run = run_pipeline(&demo(), &PipelineConfig::default()).unwrap();

    write_fit_json(&path, &FitFile::from_result(&run.fit, "demo")).unwrap();
    let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["tool"], "wx");
    assert_eq!(json["models"].as_array().unwrap().len(), run.fit.metrics.len());
    assert!(json["best_model"].is_string());
}
