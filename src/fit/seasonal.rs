//! Seasonal curve fitting over day-of-year means.
//!
//! Pipeline:
//! 1. map every date to its day-of-year ordinal (1..=366)
//! 2. average the series per ordinal, ignoring nulls
//! 3. fit every requested model independently (built-ins first, then custom)
//! 4. drop models that fail to converge, with a warning naming them
//! 5. report AIC / R² for the survivors and their fitted curves
//!
//! A failing model never affects the others. The call itself only fails on
//! structural problems: no models requested, no temperature columns, or no
//! observations at all.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::data::photoperiod::day_length_hours;
use crate::domain::{Field, WeatherTable, day_of_year};
use crate::error::AppError;
use crate::fit::fitter::{FitQuality, FittedModel, fit_model, r_squared};
use crate::math::LmOptions;
use crate::models::{BuiltinModel, CustomModel, ModelForm, lookup_builtin};

/// Which models to fit.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    /// Built-in registry keys, fitted in the order given.
    pub builtin: Vec<String>,
    /// User-supplied models, fitted after the built-ins.
    pub custom: Vec<CustomModel>,
}

impl Default for ModelRequest {
    fn default() -> Self {
        Self {
            builtin: vec![
                BuiltinModel::Harmonic.name().to_string(),
                BuiltinModel::CosinePhase.name().to_string(),
            ],
            custom: Vec::new(),
        }
    }
}

impl ModelRequest {
    pub fn builtin<S: AsRef<str>>(names: &[S]) -> Self {
        Self {
            builtin: names.iter().map(|s| s.as_ref().to_string()).collect(),
            custom: Vec::new(),
        }
    }

    pub fn with_custom(mut self, model: CustomModel) -> Self {
        self.custom.push(model);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.builtin.is_empty() && self.custom.is_empty()
    }
}

/// Observed day-of-year means and one fitted column per converged model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyAverage {
    pub day_of_year: Vec<u32>,
    pub observed: Vec<f64>,
    /// Number of non-null observations averaged into each ordinal.
    pub n_obs: Vec<usize>,
    /// `(model name, fitted values)` in fit order.
    pub fitted: Vec<(String, Vec<f64>)>,
}

impl DailyAverage {
    pub fn len(&self) -> usize {
        self.day_of_year.len()
    }

    pub fn is_empty(&self) -> bool {
        self.day_of_year.is_empty()
    }

    pub fn fitted_column(&self, model: &str) -> Option<&[f64]> {
        self.fitted
            .iter()
            .find(|(name, _)| name == model)
            .map(|(_, v)| v.as_slice())
    }
}

/// A converged model with its goodness-of-fit numbers.
#[derive(Debug, Clone)]
pub struct SeasonalFit {
    pub model_name: String,
    pub model: FittedModel,
    pub aic: f64,
    pub r2: f64,
}

/// One row of the metrics table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitMetrics {
    pub model: String,
    pub n_params: usize,
    pub params: BTreeMap<String, f64>,
    pub quality: FitQuality,
}

/// Output of a seasonal fit.
#[derive(Debug, Clone)]
pub struct SeasonalFitResult {
    pub daily_average: DailyAverage,
    /// Converged models in request order.
    pub fits: Vec<SeasonalFit>,
    pub metrics: Vec<FitMetrics>,
    /// Recoverable problems (unknown names, failed models).
    pub warnings: Vec<String>,
}

impl SeasonalFitResult {
    pub fn get(&self, model: &str) -> Option<&SeasonalFit> {
        self.fits.iter().find(|f| f.model_name == model)
    }

    /// Converged model with the lowest AIC (first wins on ties).
    pub fn best(&self) -> Option<&SeasonalFit> {
        let mut best: Option<&SeasonalFit> = None;
        for fit in &self.fits {
            if best.is_none_or(|b| fit.aic < b.aic) {
                best = Some(fit);
            }
        }
        best
    }

    pub fn model_names(&self) -> Vec<&str> {
        self.fits.iter().map(|f| f.model_name.as_str()).collect()
    }
}

/// Fit seasonal temperature models.
///
/// Uses `tmean` when the column is present; otherwise the row-wise mean of the
/// available `tmin`/`tmax` values.
pub fn fit_seasonal_temp(
    table: &WeatherTable,
    request: &ModelRequest,
    opts: &LmOptions,
) -> Result<SeasonalFitResult, AppError> {
    if request.is_empty() {
        return Err(AppError::input("No models requested for seasonal fitting."));
    }
    let series = temperature_series(table)?;
    fit_daily_series(&series, request, opts)
}

/// Fit seasonal models to astronomical day length (hours) at `latitude`
/// for the given dates.
pub fn fit_seasonal_photo(
    dates: &[NaiveDate],
    latitude: f64,
    request: &ModelRequest,
    opts: &LmOptions,
) -> Result<SeasonalFitResult, AppError> {
    if request.is_empty() {
        return Err(AppError::input("No models requested for seasonal fitting."));
    }
    if !(latitude.is_finite() && (-90.0..=90.0).contains(&latitude)) {
        return Err(AppError::input(format!("Latitude {latitude} is outside [-90, 90].")));
    }
    let series: Vec<(NaiveDate, Option<f64>)> = dates
        .iter()
        .map(|&d| (d, Some(day_length_hours(latitude, day_of_year(d)))))
        .collect();
    fit_daily_series(&series, request, opts)
}

/// Daily temperature series used by [`fit_seasonal_temp`].
pub fn temperature_series(table: &WeatherTable) -> Result<Vec<(NaiveDate, Option<f64>)>, AppError> {
    if table.has(Field::Tmean) {
        return Ok(table.rows().iter().map(|r| (r.date, r.get(Field::Tmean))).collect());
    }
    if !(table.has(Field::Tmin) || table.has(Field::Tmax)) {
        return Err(AppError::input(
            "No temperature columns available: need `tmean`, or `tmin`/`tmax`.",
        ));
    }
    Ok(table
        .rows()
        .iter()
        .map(|r| {
            let values: Vec<f64> = [r.get(Field::Tmin), r.get(Field::Tmax)].into_iter().flatten().collect();
            let mean = (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64);
            (r.date, mean)
        })
        .collect())
}

/// Aggregate to day-of-year means and fit every requested model.
pub fn fit_daily_series(
    series: &[(NaiveDate, Option<f64>)],
    request: &ModelRequest,
    opts: &LmOptions,
) -> Result<SeasonalFitResult, AppError> {
    if request.is_empty() {
        return Err(AppError::input("No models requested for seasonal fitting."));
    }

    let (day_of_year, observed, n_obs) = aggregate_by_day_of_year(series);
    if day_of_year.is_empty() {
        return Err(AppError::insufficient("No non-null observations to aggregate by day of year."));
    }
    let t: Vec<f64> = day_of_year.iter().map(|&d| f64::from(d)).collect();

    let mut warnings = Vec::new();
    let forms = resolve_models(request, &mut warnings);

    // Models are independent; fit them in parallel and report in request order.
    let outcomes: Vec<Result<FittedModel, AppError>> =
        forms.par_iter().map(|form| fit_model(form, &t, &observed, opts)).collect();

    let mut fits = Vec::new();
    let mut metrics = Vec::new();
    let mut fitted = Vec::new();
    for (form, outcome) in forms.iter().zip(outcomes) {
        let model = match outcome {
            Ok(model) => model,
            Err(e) => {
                warn!(model = form.name(), reason = %e, "model failed to converge; excluded");
                warnings.push(format!("Model '{}' failed to converge and was excluded: {e}", form.name()));
                continue;
            }
        };
        debug!(model = form.name(), iterations = model.iterations, sse = model.sse, "model converged");

        let aic = model.aic();
        let r2 = r_squared(&observed, model.sse);
        metrics.push(FitMetrics {
            model: model.name().to_string(),
            n_params: model.params.len(),
            params: model.param_names.iter().cloned().zip(model.params.iter().copied()).collect(),
            quality: FitQuality {
                sse: model.sse,
                rmse: model.rmse(),
                aic,
                r2,
                n: model.n,
            },
        });
        fitted.push((model.name().to_string(), t.iter().map(|&ti| model.predict(ti)).collect()));
        fits.push(SeasonalFit {
            model_name: model.name().to_string(),
            model,
            aic,
            r2,
        });
    }

    Ok(SeasonalFitResult {
        daily_average: DailyAverage {
            day_of_year,
            observed,
            n_obs,
            fitted,
        },
        fits,
        metrics,
        warnings,
    })
}

fn aggregate_by_day_of_year(series: &[(NaiveDate, Option<f64>)]) -> (Vec<u32>, Vec<f64>, Vec<usize>) {
    let mut sums: BTreeMap<u32, (f64, usize)> = BTreeMap::new();
    for &(date, value) in series {
        let Some(v) = value.filter(|v| v.is_finite()) else {
            continue;
        };
        let entry = sums.entry(day_of_year(date)).or_insert((0.0, 0));
        entry.0 += v;
        entry.1 += 1;
    }

    let mut days = Vec::with_capacity(sums.len());
    let mut means = Vec::with_capacity(sums.len());
    let mut counts = Vec::with_capacity(sums.len());
    for (doy, (sum, count)) in sums {
        days.push(doy);
        means.push(sum / count as f64);
        counts.push(count);
    }
    (days, means, counts)
}

fn resolve_models(request: &ModelRequest, warnings: &mut Vec<String>) -> Vec<ModelForm> {
    let mut forms = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut unknown = Vec::new();

    for name in &request.builtin {
        match lookup_builtin(name) {
            Some(model) => {
                if seen.insert(model.name().to_string()) {
                    forms.push(ModelForm::Builtin(model));
                }
            }
            None => unknown.push(name.as_str()),
        }
    }
    if !unknown.is_empty() {
        let known: Vec<&str> = BuiltinModel::ALL.iter().map(|m| m.name()).collect();
        warn!(unknown = ?unknown, "unrecognized built-in model names ignored");
        warnings.push(format!(
            "Unrecognized built-in model(s) ignored: {} (available: {})",
            unknown.join(", "),
            known.join(", ")
        ));
    }

    for model in &request.custom {
        if seen.insert(model.name.clone()) {
            forms.push(ModelForm::Custom(model.clone()));
        } else {
            warn!(model = %model.name, "duplicate model name ignored");
            warnings.push(format!("Duplicate model name '{}' ignored.", model.name));
        }
    }
    forms
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::WeatherRecord;
    use chrono::Duration;
    use std::f64::consts::PI;

    /// Two years of smooth daily temperature with a small deterministic wobble.
    fn two_year_table(with_mean: bool) -> WeatherTable {
        let start = NaiveDate::from_ymd_opt(2019, 1, 1).unwrap();
        let rows = (0..730)
            .map(|i| {
                let date = start + Duration::days(i);
                let doy = f64::from(day_of_year(date));
                let base = 12.0 + 9.0 * (2.0 * PI * (doy - 200.0) / 365.0).cos() + 0.3 * ((i % 7) as f64 - 3.0);
                let r = WeatherRecord::new("S1", date);
                if with_mean {
                    r.with(Field::Tmean, base)
                } else if i % 11 == 0 {
                    // Only one side present: the mean falls back to it.
                    r.with(Field::Tmax, base)
                } else {
                    r.with(Field::Tmin, base - 5.0).with(Field::Tmax, base + 5.0)
                }
            })
            .collect();
        WeatherTable::from_records(rows)
    }

    #[test]
    fn builtins_converge_with_valid_metrics() {
        let result = fit_seasonal_temp(&two_year_table(true), &ModelRequest::default(), &LmOptions::default()).unwrap();
        assert_eq!(result.model_names(), vec!["harmonic", "cosine_phase"]);
        for fit in &result.fits {
            assert!(fit.aic.is_finite(), "{}", fit.model_name);
            assert!((0.0..=1.0).contains(&fit.r2), "{} r2={}", fit.model_name, fit.r2);
            assert!(fit.r2 > 0.9);
        }
        assert_eq!(result.metrics.len(), 2);
        assert_eq!(result.daily_average.fitted.len(), 2);
        assert!(result.warnings.is_empty());
        assert_eq!(result.daily_average.len(), 365);
    }

    #[test]
    fn derives_mean_from_min_max() {
        let result = fit_seasonal_temp(
            &two_year_table(false),
            &ModelRequest::builtin(&["harmonic"]),
            &LmOptions::default(),
        )
        .unwrap();
        let fit = result.get("harmonic").unwrap();
        assert!((fit.model.param("a").unwrap() - 12.0).abs() < 0.5);
    }

    #[test]
    fn under_specified_custom_model_is_excluded() {
        let bad = CustomModel::new("three_param", &["a", "b", "c"], |t, p| {
            p[0] + p[1] * (2.0 * PI * t / 365.0).sin() + p[2] * (2.0 * PI * t / 365.0).cos()
        })
        .with_start("a", 10.0)
        .with_start("b", 1.0);
        let request = ModelRequest::builtin(&["harmonic"]).with_custom(bad);

        let result = fit_seasonal_temp(&two_year_table(true), &request, &LmOptions::default()).unwrap();
        assert_eq!(result.model_names(), vec!["harmonic"]);
        assert!(result.metrics.iter().all(|m| m.model != "three_param"));
        assert!(result.daily_average.fitted_column("three_param").is_none());
        assert!(result.warnings.iter().any(|w| w.contains("three_param")));
    }

    #[test]
    fn each_recoverable_problem_is_reported_once() {
        let unstarted = CustomModel::new("unstarted", &["a"], |_, p| p[0]);
        let clash = CustomModel::new("harmonic", &["a"], |_, p| p[0]).with_start("a", 0.0);
        let request = ModelRequest::builtin(&["harmonic", "nope"]).with_custom(unstarted).with_custom(clash);

        let result = fit_seasonal_temp(&two_year_table(true), &request, &LmOptions::default()).unwrap();
        assert_eq!(result.model_names(), vec!["harmonic"]);
        assert_eq!(result.warnings.len(), 3, "{:?}", result.warnings);
        for needle in ["nope", "unstarted", "Duplicate model name 'harmonic'"] {
            assert_eq!(result.warnings.iter().filter(|w| w.contains(needle)).count(), 1, "{needle}");
        }
    }

    #[test]
    fn well_specified_custom_model_is_fitted() {
        let good = CustomModel::new("shifted_cos", &["m", "amp", "peak"], |t, p| {
            p[0] + p[1] * (2.0 * PI * (t - p[2]) / 365.0).cos()
        })
        .with_start("m", 10.0)
        .with_start("amp", 5.0)
        .with_start("peak", 180.0);
        let request = ModelRequest::builtin::<&str>(&[]).with_custom(good);
        let result = fit_seasonal_temp(&two_year_table(true), &request, &LmOptions::default()).unwrap();
        let fit = result.get("shifted_cos").unwrap();
        assert!((fit.model.param("peak").unwrap() - 200.0).abs() < 2.0);
    }

    #[test]
    fn unknown_builtin_warns_but_keeps_others() {
        let request = ModelRequest::builtin(&["harmonic", "nope", "also_nope"]);
        let result = fit_seasonal_temp(&two_year_table(true), &request, &LmOptions::default()).unwrap();
        assert_eq!(result.model_names(), vec!["harmonic"]);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("nope, also_nope"));
    }

    #[test]
    fn only_unknown_names_gives_empty_result() {
        let result =
            fit_seasonal_temp(&two_year_table(true), &ModelRequest::builtin(&["nope"]), &LmOptions::default()).unwrap();
        assert!(result.fits.is_empty());
        assert!(result.best().is_none());
    }

    #[test]
    fn structural_errors() {
        let table = two_year_table(true);
        let err = fit_seasonal_temp(&table, &ModelRequest::builtin::<&str>(&[]), &LmOptions::default()).unwrap_err();
        assert_eq!(err.exit_code(), 2);

        let rain_only = WeatherTable::from_records(vec![
            WeatherRecord::new("S1", NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()).with(Field::Rain, 1.0),
        ]);
        let err = fit_seasonal_temp(&rain_only, &ModelRequest::default(), &LmOptions::default()).unwrap_err();
        assert!(err.to_string().contains("temperature"));
    }

    #[test]
    fn best_is_lowest_aic() {
        let request = ModelRequest::builtin(&["harmonic", "double_harmonic"]);
        let result = fit_seasonal_temp(&two_year_table(true), &request, &LmOptions::default()).unwrap();
        let best = result.best().unwrap();
        assert!(result.fits.iter().all(|f| best.aic <= f.aic));
    }

    #[test]
    fn leap_day_is_its_own_ordinal() {
        let series = vec![
            (NaiveDate::from_ymd_opt(2020, 12, 31).unwrap(), Some(1.0)),
            (NaiveDate::from_ymd_opt(2021, 12, 31).unwrap(), Some(3.0)),
            (NaiveDate::from_ymd_opt(2022, 12, 31).unwrap(), Some(5.0)),
            (NaiveDate::from_ymd_opt(2022, 12, 30).unwrap(), None),
        ];
        let (days, means, counts) = aggregate_by_day_of_year(&series);
        assert_eq!(days, vec![365, 366]);
        assert_eq!(means, vec![4.0, 1.0]);
        assert_eq!(counts, vec![2, 1]);
    }

    #[test]
    fn photoperiod_fit_is_near_perfect() {
        let start = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
        let dates: Vec<NaiveDate> = (0..365).map(|i| start + Duration::days(i)).collect();
        let result = fit_seasonal_photo(&dates, 45.0, &ModelRequest::default(), &LmOptions::default()).unwrap();
        assert!(!result.fits.is_empty());
        for fit in &result.fits {
            assert!(fit.r2 > 0.98, "{} r2={}", fit.model_name, fit.r2);
            assert!(fit.aic.is_finite());
        }
        assert!(fit_seasonal_photo(&dates, 95.0, &ModelRequest::default(), &LmOptions::default()).is_err());
    }
}
