//! Low-level fitting routine for a single model.
//!
//! Given:
//! - day-of-year ordinals `t_i`
//! - aggregated observations `y_i`
//! - a model form (built-in or custom)
//!
//! we obtain starting values, run Levenberg–Marquardt, and package the result
//! with the goodness-of-fit numbers the batch fitter reports.

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::math::{LmOptions, levenberg_marquardt};
use crate::models::ModelForm;

/// A converged nonlinear fit.
#[derive(Debug, Clone)]
pub struct FittedModel {
    pub form: ModelForm,
    pub param_names: Vec<String>,
    pub params: Vec<f64>,
    pub sse: f64,
    pub n: usize,
    pub iterations: usize,
}

impl FittedModel {
    pub fn name(&self) -> &str {
        self.form.name()
    }

    pub fn predict(&self, t: f64) -> f64 {
        self.form.predict(t, &self.params)
    }

    pub fn param(&self, name: &str) -> Option<f64> {
        self.param_names
            .iter()
            .position(|p| p == name)
            .map(|i| self.params[i])
    }

    pub fn rmse(&self) -> f64 {
        (self.sse / self.n.max(1) as f64).sqrt()
    }

    /// Gaussian-likelihood AIC with the residual variance counted as a parameter:
    /// `n·(ln 2π + 1 + ln(SSE/n)) + 2·(k + 1)`.
    pub fn aic(&self) -> f64 {
        let n = self.n as f64;
        let k = self.params.len() as f64;
        // An exact fit would give ln(0); floor SSE so AIC stays finite.
        let sse = self.sse.max(f64::MIN_POSITIVE);
        n * ((2.0 * std::f64::consts::PI).ln() + 1.0 + (sse / n).ln()) + 2.0 * (k + 1.0)
    }
}

/// Fit quality diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitQuality {
    pub sse: f64,
    pub rmse: f64,
    pub aic: f64,
    pub r2: f64,
    pub n: usize,
}

/// Fit one model to `(t, y)`.
pub fn fit_model(form: &ModelForm, t: &[f64], y: &[f64], opts: &LmOptions) -> Result<FittedModel, AppError> {
    if t.is_empty() {
        return Err(AppError::insufficient("No data points to fit."));
    }
    let start = form.start_values(t, y)?;
    let param_names = form.param_names();
    if start.len() != param_names.len() {
        return Err(AppError::input(format!(
            "expected {} starting values, got {}",
            param_names.len(),
            start.len()
        )));
    }

    let solution = levenberg_marquardt(t, y, &start, |x, p| form.predict(x, p), opts)?;
    Ok(FittedModel {
        form: form.clone(),
        param_names,
        params: solution.params,
        sse: solution.sse,
        n: t.len(),
        iterations: solution.iterations,
    })
}

/// Coefficient of determination against the series' own mean.
///
/// NaN when the series has zero variance.
pub fn r_squared(y: &[f64], sse: f64) -> f64 {
    if y.is_empty() {
        return f64::NAN;
    }
    let mean = y.iter().sum::<f64>() / y.len() as f64;
    let ss_tot: f64 = y.iter().map(|v| (v - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        return f64::NAN;
    }
    1.0 - sse / ss_tot
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BuiltinModel, CustomModel};

    fn synthetic(params: &[f64], model: BuiltinModel) -> (Vec<f64>, Vec<f64>) {
        let t: Vec<f64> = (1..=365).map(f64::from).collect();
        let y = t.iter().map(|&ti| model.predict(ti, params)).collect();
        (t, y)
    }

    #[test]
    fn harmonic_recovers_exact_parameters() {
        let truth = [12.0, -3.0, -7.5];
        let (t, y) = synthetic(&truth, BuiltinModel::Harmonic);
        let fit = fit_model(&ModelForm::Builtin(BuiltinModel::Harmonic), &t, &y, &LmOptions::default()).unwrap();
        for (a, b) in fit.params.iter().zip(truth) {
            assert!((a - b).abs() < 1e-6, "{:?}", fit.params);
        }
        assert!(fit.aic().is_finite());
        assert_eq!(fit.param("b2"), Some(fit.params[2]));
    }

    #[test]
    fn cosine_phase_fits_seasonal_cycle() {
        let truth = [14.0, 0.6, 1.0, -195.0];
        let (t, y) = synthetic(&truth, BuiltinModel::CosinePhase);
        let fit =
            fit_model(&ModelForm::Builtin(BuiltinModel::CosinePhase), &t, &y, &LmOptions::default()).unwrap();
        let r2 = r_squared(&y, fit.sse);
        assert!(r2 > 0.999, "r2={r2} params={:?}", fit.params);
        assert!((fit.predict(195.0) - 14.0 * 1.6).abs() < 0.05);
    }

    #[test]
    fn custom_model_without_start_fails() {
        let form = ModelForm::Custom(CustomModel::new("bad", &["a", "b"], |t, p| p[0] + p[1] * t).with_start("a", 1.0));
        let err = fit_model(&form, &[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0], &LmOptions::default()).unwrap_err();
        assert!(err.to_string().contains("b"));
    }

    #[test]
    fn r_squared_is_nan_for_constant_series() {
        assert!(r_squared(&[2.0, 2.0, 2.0], 0.0).is_nan());
        assert!((r_squared(&[1.0, 2.0, 3.0], 0.5) - 0.75).abs() < 1e-12);
    }
}
