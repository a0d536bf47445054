//! Built-in periodic models for day-of-year series.
//!
//! The fitter relies on three primitive operations per model:
//! - evaluate `y(t)` for a parameter vector (for residuals and fitted curves)
//! - name the parameters (for reports and exports)
//! - derive starting values from the data (built-ins never need user guesses)
//!
//! `t` is the day-of-year ordinal (1..=366) and the period is fixed at 365 days.

use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

/// Period of the seasonal cycle, in days.
pub const YEAR_DAYS: f64 = 365.0;

/// Concrete built-in model kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinModel {
    /// `a + b1·sin(2πt/365) + b2·cos(2πt/365)`
    Harmonic,
    /// `T0·(1 + T1·cos(2π(ω·t + θ)/365))`
    CosinePhase,
    /// Harmonic plus a half-year pair `b3·sin(4πt/365) + b4·cos(4πt/365)`.
    DoubleHarmonic,
}

impl BuiltinModel {
    pub const ALL: [BuiltinModel; 3] = [
        BuiltinModel::Harmonic,
        BuiltinModel::CosinePhase,
        BuiltinModel::DoubleHarmonic,
    ];

    /// Registry key.
    pub fn name(self) -> &'static str {
        match self {
            BuiltinModel::Harmonic => "harmonic",
            BuiltinModel::CosinePhase => "cosine_phase",
            BuiltinModel::DoubleHarmonic => "double_harmonic",
        }
    }

    pub fn formula(self) -> &'static str {
        match self {
            BuiltinModel::Harmonic => "a + b1*sin(2*pi*t/365) + b2*cos(2*pi*t/365)",
            BuiltinModel::CosinePhase => "T0*(1 + T1*cos(2*pi*(omega*t + theta)/365))",
            BuiltinModel::DoubleHarmonic => {
                "a + b1*sin(2*pi*t/365) + b2*cos(2*pi*t/365) + b3*sin(4*pi*t/365) + b4*cos(4*pi*t/365)"
            }
        }
    }

    pub fn param_names(self) -> &'static [&'static str] {
        match self {
            BuiltinModel::Harmonic => &["a", "b1", "b2"],
            BuiltinModel::CosinePhase => &["T0", "T1", "omega", "theta"],
            BuiltinModel::DoubleHarmonic => &["a", "b1", "b2", "b3", "b4"],
        }
    }

    /// Evaluate `y(t)`.
    ///
    /// # Panics
    /// Panics if `params` is shorter than `param_names()`.
    pub fn predict(self, t: f64, params: &[f64]) -> f64 {
        let w = 2.0 * PI * t / YEAR_DAYS;
        match self {
            BuiltinModel::Harmonic => params[0] + params[1] * w.sin() + params[2] * w.cos(),
            BuiltinModel::CosinePhase => {
                let (t0, t1, omega, theta) = (params[0], params[1], params[2], params[3]);
                t0 * (1.0 + t1 * (2.0 * PI * (omega * t + theta) / YEAR_DAYS).cos())
            }
            BuiltinModel::DoubleHarmonic => {
                params[0]
                    + params[1] * w.sin()
                    + params[2] * w.cos()
                    + params[3] * (2.0 * w).sin()
                    + params[4] * (2.0 * w).cos()
            }
        }
    }

    /// Data-driven starting values.
    ///
    /// `t` and `y` are the aggregated day-of-year series (same length, non-empty).
    pub fn start_values(self, t: &[f64], y: &[f64]) -> Vec<f64> {
        let n = y.len().max(1) as f64;
        let mean = y.iter().sum::<f64>() / n;
        match self {
            BuiltinModel::Harmonic => vec![mean, 0.0, 0.0],
            BuiltinModel::DoubleHarmonic => vec![mean, 0.0, 0.0, 0.0, 0.0],
            BuiltinModel::CosinePhase => {
                let (mut t_peak, mut y_max, mut y_min) = (1.0, f64::NEG_INFINITY, f64::INFINITY);
                for (&ti, &yi) in t.iter().zip(y) {
                    if yi > y_max {
                        y_max = yi;
                        t_peak = ti;
                    }
                    y_min = y_min.min(yi);
                }
                // T0 multiplies the whole curve, so keep it away from zero.
                let t0 = if mean.abs() < 1e-3 { 1e-3_f64.copysign(mean) } else { mean };
                let t1 = if y_max.is_finite() && y_min.is_finite() {
                    0.5 * (y_max - y_min) / t0
                } else {
                    0.0
                };
                // cos(2π(t - t_peak)/365) peaks at t_peak.
                vec![t0, t1, 1.0, -t_peak]
            }
        }
    }
}

impl std::fmt::Display for BuiltinModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Static name → model registry, built once on first use.
pub fn builtin_registry() -> &'static BTreeMap<&'static str, BuiltinModel> {
    static REGISTRY: OnceLock<BTreeMap<&'static str, BuiltinModel>> = OnceLock::new();
    REGISTRY.get_or_init(|| BuiltinModel::ALL.into_iter().map(|m| (m.name(), m)).collect())
}

/// Look up a built-in model by registry key (case-insensitive).
pub fn lookup_builtin(name: &str) -> Option<BuiltinModel> {
    builtin_registry().get(name.trim().to_ascii_lowercase().as_str()).copied()
}
