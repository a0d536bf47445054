//! Damped linear least squares: the inner solve of every Levenberg–Marquardt
//! iteration.
//!
//! Given the Jacobian `J` (n × p) and residuals `r`, a step `δ` minimizes
//!
//! ```text
//! ‖J δ - r‖² + λ ‖D δ‖²,    D = diag(‖J_j‖)
//! ```
//!
//! Column-norm scaling keeps the damping invariant to parameter units.
//!
//! The problem is solved as ordinary least squares on the augmented system
//! `[J; √λ D] δ ≈ [r; 0]` with SVD, which copes with tall matrices and with
//! near-collinear columns (e.g. a phase parameter when the amplitude is ~0).

use nalgebra::{DMatrix, DVector};

/// Scale floor for columns whose Jacobian is numerically zero.
const MIN_COLUMN_SCALE: f64 = 1e-12;

/// Solve the Marquardt-damped step for `jac`, `residuals` and damping `lambda`.
///
/// `lambda = 0` gives the Gauss–Newton step. Returns `None` when the shapes
/// disagree or the system cannot be solved to a finite vector.
pub fn solve_damped(jac: &DMatrix<f64>, residuals: &[f64], lambda: f64) -> Option<DVector<f64>> {
    let (n, p) = jac.shape();
    if residuals.len() != n || p == 0 || lambda.is_nan() || lambda < 0.0 {
        return None;
    }

    let mut a = DMatrix::<f64>::zeros(n + p, p);
    a.rows_mut(0, n).copy_from(jac);
    let mut b = DVector::<f64>::zeros(n + p);
    b.rows_mut(0, n).copy_from_slice(residuals);

    let sqrt_lambda = lambda.sqrt();
    for j in 0..p {
        a[(n + j, j)] = sqrt_lambda * jac.column(j).norm().max(MIN_COLUMN_SCALE);
    }

    svd_solve(a, &b)
}

fn svd_solve(a: DMatrix<f64>, b: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = a.svd(true, true);
    [1e-12, 1e-10, 1e-8]
        .into_iter()
        .filter_map(|eps| svd.solve(b, eps).ok())
        .find(|delta| delta.iter().all(|v| v.is_finite()))
}

#[cfg(test)]
mod tests {
    use super::*;

    // y = 2 + 3x on x = [0, 1, 2], starting from zero parameters.
    fn line_problem() -> (DMatrix<f64>, Vec<f64>) {
        let jac = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        (jac, vec![2.0, 5.0, 8.0])
    }

    #[test]
    fn undamped_step_is_gauss_newton() {
        let (jac, r) = line_problem();
        let delta = solve_damped(&jac, &r, 0.0).unwrap();
        assert!((delta[0] - 2.0).abs() < 1e-10);
        assert!((delta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn damping_shrinks_the_step() {
        let (jac, r) = line_problem();
        let free = solve_damped(&jac, &r, 0.0).unwrap().norm();
        let mild = solve_damped(&jac, &r, 1.0).unwrap().norm();
        let heavy = solve_damped(&jac, &r, 1e6).unwrap().norm();
        assert!(heavy < mild && mild < free, "{heavy} {mild} {free}");
        assert!(heavy < 1e-4);
    }

    #[test]
    fn rank_deficient_jacobian_still_gives_finite_step() {
        // Second column is identically zero (parameter has no effect).
        let jac = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 0.0, 1.0, 0.0]);
        let delta = solve_damped(&jac, &[1.0, 2.0, 3.0], 0.0).unwrap();
        assert!((delta[0] - 2.0).abs() < 1e-10);
        assert!(delta[1].abs() < 1e-10);
    }

    #[test]
    fn mismatched_shapes_are_rejected() {
        let (jac, _) = line_problem();
        assert!(solve_damped(&jac, &[1.0, 2.0], 0.0).is_none());
        assert!(solve_damped(&jac, &[1.0, 2.0, 3.0], -1.0).is_none());
    }
}
