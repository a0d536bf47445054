//! Levenberg–Marquardt nonlinear least squares.
//!
//! Fits `y ≈ f(x; θ)` for a scalar predictor by minimizing the residual sum of
//! squares. The Jacobian is taken by forward differences, and each step solves
//! the damped system `[J; √λ D] δ ≈ [r; 0]` with SVD, where `D` is the diagonal
//! scaling `sqrt(diag(JᵀJ))` (Marquardt's scale-invariant damping).
//!
//! Convergence is declared when an accepted step reduces SSE by less than
//! `ftol` relative, or when a step (accepted or rejected) becomes smaller than
//! `xtol` relative to the parameter vector. Running out of iterations is a
//! failure, never a silent partial result.

use nalgebra::DMatrix;

use crate::error::{AppError, EXIT_COMPUTE};
use crate::math::solve_damped;

/// Residual sum of squares treated as an exact fit.
const SSE_FLOOR: f64 = 1e-24;

/// Damping beyond which the solver gives up.
const LAMBDA_MAX: f64 = 1e16;

/// Solver settings.
#[derive(Debug, Clone)]
pub struct LmOptions {
    /// Maximum number of step attempts (accepted or rejected).
    pub max_iter: usize,
    /// Relative SSE decrease below which the fit is considered converged.
    pub ftol: f64,
    /// Relative step size below which the fit is considered converged.
    pub xtol: f64,
    /// Initial damping.
    pub lambda0: f64,
}

impl Default for LmOptions {
    fn default() -> Self {
        Self {
            max_iter: 200,
            ftol: 1e-10,
            xtol: 1e-10,
            lambda0: 1e-3,
        }
    }
}

/// A converged fit.
#[derive(Debug, Clone)]
pub struct LmSolution {
    pub params: Vec<f64>,
    pub sse: f64,
    pub iterations: usize,
}

/// Fit `model(x, params)` to `(xs, ys)` starting from `start`.
pub fn levenberg_marquardt<F>(
    xs: &[f64],
    ys: &[f64],
    start: &[f64],
    model: F,
    opts: &LmOptions,
) -> Result<LmSolution, AppError>
where
    F: Fn(f64, &[f64]) -> f64,
{
    let n = xs.len();
    let p = start.len();
    if ys.len() != n {
        return Err(fail("predictor and response lengths differ"));
    }
    if p == 0 {
        return Err(fail("model has no parameters"));
    }
    if n < p {
        return Err(fail(format!("{n} observations cannot identify {p} parameters")));
    }
    if start.iter().any(|v| !v.is_finite()) {
        return Err(fail("non-finite starting value"));
    }

    let mut params = start.to_vec();
    let mut residuals = residuals_at(xs, ys, &params, &model);
    let mut sse = sum_sq(&residuals);
    if !sse.is_finite() {
        return Err(fail("model is not finite at the starting values"));
    }
    if sse <= SSE_FLOOR {
        return Ok(LmSolution {
            params,
            sse,
            iterations: 0,
        });
    }

    let mut lambda = opts.lambda0;
    let mut jac = jacobian(xs, &params, &model);

    for iter in 1..=opts.max_iter {
        if jac.iter().any(|v| !v.is_finite()) {
            return Err(fail("non-finite Jacobian"));
        }

        let step = solve_damped(&jac, &residuals, lambda)
            .ok_or_else(|| fail("singular gradient: damped system could not be solved"))?;

        let candidate: Vec<f64> = params.iter().zip(step.iter()).map(|(a, b)| a + b).collect();
        let step_small = step.norm() <= opts.xtol * (norm(&params) + opts.xtol);

        let cand_residuals = residuals_at(xs, ys, &candidate, &model);
        let cand_sse = sum_sq(&cand_residuals);

        if cand_sse.is_finite() && cand_sse < sse {
            let decrease = sse - cand_sse;
            params = candidate;
            residuals = cand_residuals;
            sse = cand_sse;
            lambda = (lambda / 10.0).max(1e-12);

            // A tiny decrease under heavy damping only means the step was tiny.
            let stalled = decrease <= opts.ftol * sse && lambda < 1.0;
            if sse <= SSE_FLOOR || stalled || step_small {
                return Ok(LmSolution {
                    params,
                    sse,
                    iterations: iter,
                });
            }
            jac = jacobian(xs, &params, &model);
        } else {
            if step_small {
                // No descent direction left at this resolution: we are at the minimum.
                return Ok(LmSolution {
                    params,
                    sse,
                    iterations: iter,
                });
            }
            lambda *= 10.0;
            if lambda > LAMBDA_MAX {
                return Err(fail("step factor reduced below its minimum without progress"));
            }
        }
    }

    Err(fail(format!(
        "did not converge within {} iterations",
        opts.max_iter
    )))
}

fn fail(message: impl Into<String>) -> AppError {
    AppError::new(EXIT_COMPUTE, message)
}

fn residuals_at<F>(xs: &[f64], ys: &[f64], params: &[f64], model: &F) -> Vec<f64>
where
    F: Fn(f64, &[f64]) -> f64,
{
    xs.iter().zip(ys).map(|(&x, &y)| y - model(x, params)).collect()
}

fn jacobian<F>(xs: &[f64], params: &[f64], model: &F) -> DMatrix<f64>
where
    F: Fn(f64, &[f64]) -> f64,
{
    let n = xs.len();
    let p = params.len();
    let base: Vec<f64> = xs.iter().map(|&x| model(x, params)).collect();

    let mut jac = DMatrix::<f64>::zeros(n, p);
    let mut shifted = params.to_vec();
    for j in 0..p {
        let h = f64::EPSILON.sqrt() * params[j].abs().max(1.0);
        shifted[j] = params[j] + h;
        for i in 0..n {
            jac[(i, j)] = (model(xs[i], &shifted) - base[i]) / h;
        }
        shifted[j] = params[j];
    }
    jac
}

fn sum_sq(values: &[f64]) -> f64 {
    values.iter().map(|v| v * v).sum()
}

fn norm(values: &[f64]) -> f64 {
    sum_sq(values).sqrt()
}
