//! One-dimensional interpolants over sorted knots.
//!
//! - piecewise linear, clamped to the end values outside the knot range
//! - FMM cubic spline (Forsythe, Malcolm & Moler): end conditions match the
//!   third derivative of the cubic through the first/last four knots, so cubic
//!   data is reproduced exactly

/// Piecewise-linear interpolation with flat extrapolation.
///
/// `xs` must be sorted ascending and the same length as `ys`. Returns NaN for
/// empty input.
pub fn linear_interpolate(xs: &[f64], ys: &[f64], x: f64) -> f64 {
    let n = xs.len().min(ys.len());
    if n == 0 {
        return f64::NAN;
    }
    if x <= xs[0] {
        return ys[0];
    }
    if x >= xs[n - 1] {
        return ys[n - 1];
    }

    // First knot strictly greater than x; guaranteed 1..n by the clamps above.
    let hi = xs[..n].partition_point(|&k| k <= x);
    let lo = hi - 1;
    let (x0, y0, x1, y1) = (xs[lo], ys[lo], xs[hi], ys[hi]);
    if (x1 - x0).abs() < 1e-12 {
        return y0;
    }
    let u = (x - x0) / (x1 - x0);
    y0 + u * (y1 - y0)
}

/// A fitted FMM cubic spline.
#[derive(Debug, Clone)]
pub struct CubicSpline {
    x: Vec<f64>,
    y: Vec<f64>,
    b: Vec<f64>,
    c: Vec<f64>,
    d: Vec<f64>,
}

impl CubicSpline {
    /// Fit a spline through `(xs[i], ys[i])`.
    ///
    /// Knots must be strictly increasing. Returns `None` for fewer than two knots
    /// or mismatched lengths. Two knots give a straight line.
    pub fn fmm(xs: &[f64], ys: &[f64]) -> Option<Self> {
        let n = xs.len();
        if n < 2 || ys.len() != n {
            return None;
        }
        if xs.windows(2).any(|w| !(w[1] > w[0])) {
            return None;
        }

        let x = xs.to_vec();
        let y = ys.to_vec();
        let mut b = vec![0.0; n];
        let mut c = vec![0.0; n];
        let mut d = vec![0.0; n];

        if n == 2 {
            let slope = (y[1] - y[0]) / (x[1] - x[0]);
            b[0] = slope;
            b[1] = slope;
            return Some(Self { x, y, b, c, d });
        }

        // Tridiagonal system: b = diagonal, d = off-diagonal, c = right-hand side.
        d[0] = x[1] - x[0];
        c[1] = (y[1] - y[0]) / d[0];
        for k in 1..n - 1 {
            d[k] = x[k + 1] - x[k];
            b[k] = 2.0 * (d[k - 1] + d[k]);
            c[k + 1] = (y[k + 1] - y[k]) / d[k];
            c[k] = c[k + 1] - c[k];
        }

        // End conditions from divided differences.
        b[0] = -d[0];
        b[n - 1] = -d[n - 2];
        c[0] = 0.0;
        c[n - 1] = 0.0;
        if n > 3 {
            c[0] = c[2] / (x[3] - x[1]) - c[1] / (x[2] - x[0]);
            c[n - 1] = c[n - 2] / (x[n - 1] - x[n - 3]) - c[n - 3] / (x[n - 2] - x[n - 4]);
            c[0] = c[0] * d[0] * d[0] / (x[3] - x[0]);
            c[n - 1] = -c[n - 1] * d[n - 2] * d[n - 2] / (x[n - 1] - x[n - 4]);
        }

        // Forward elimination.
        for k in 1..n {
            let t = d[k - 1] / b[k - 1];
            b[k] -= t * d[k - 1];
            c[k] -= t * c[k - 1];
        }

        // Back substitution.
        c[n - 1] /= b[n - 1];
        for k in (0..n - 1).rev() {
            c[k] = (c[k] - d[k] * c[k + 1]) / b[k];
        }

        // Polynomial coefficients per interval.
        b[n - 1] = (y[n - 1] - y[n - 2]) / d[n - 2] + d[n - 2] * (c[n - 2] + 2.0 * c[n - 1]);
        for k in 0..n - 1 {
            b[k] = (y[k + 1] - y[k]) / d[k] - d[k] * (c[k + 1] + 2.0 * c[k]);
            d[k] = (c[k + 1] - c[k]) / d[k];
            c[k] *= 3.0;
        }
        c[n - 1] *= 3.0;
        d[n - 1] = d[n - 2];

        if b.iter().chain(&c).chain(&d).any(|v| !v.is_finite()) {
            return None;
        }
        Some(Self { x, y, b, c, d })
    }

    /// Evaluate the spline. Outside the knot range the end cubics are extended.
    pub fn eval(&self, u: f64) -> f64 {
        let n = self.x.len();
        let i = self.x.partition_point(|&k| k <= u).saturating_sub(1).min(n - 1);
        let dx = u - self.x[i];
        self.y[i] + dx * (self.b[i] + dx * (self.c[i] + dx * self.d[i]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_interpolates_and_clamps() {
        let xs = [1.0, 2.0, 4.0];
        let ys = [10.0, 20.0, 0.0];
        assert_eq!(linear_interpolate(&xs, &ys, 1.5), 15.0);
        assert_eq!(linear_interpolate(&xs, &ys, 3.0), 10.0);
        assert_eq!(linear_interpolate(&xs, &ys, 2.0), 20.0);
        assert_eq!(linear_interpolate(&xs, &ys, -5.0), 10.0);
        assert_eq!(linear_interpolate(&xs, &ys, 99.0), 0.0);
        assert!(linear_interpolate(&[], &[], 1.0).is_nan());
    }

    #[test]
    fn spline_passes_through_knots() {
        let xs = [0.0, 1.0, 3.0, 4.0, 7.0];
        let ys = [1.0, -2.0, 0.5, 4.0, 3.0];
        let s = CubicSpline::fmm(&xs, &ys).unwrap();
        for (x, y) in xs.iter().zip(ys) {
            assert!((s.eval(*x) - y).abs() < 1e-10, "knot {x}");
        }
    }

    #[test]
    fn spline_reproduces_cubic() {
        let f = |x: f64| x * x * x - 2.0 * x + 1.0;
        let xs: Vec<f64> = [0.0, 1.0, 2.0, 4.0, 5.0, 6.0].to_vec();
        let ys: Vec<f64> = xs.iter().map(|&x| f(x)).collect();
        let s = CubicSpline::fmm(&xs, &ys).unwrap();
        for u in [0.5, 2.5, 3.0, 3.7, 5.5] {
            assert!((s.eval(u) - f(u)).abs() < 1e-8, "u={u}: {} vs {}", s.eval(u), f(u));
        }
    }

    #[test]
    fn spline_with_two_knots_is_linear() {
        let s = CubicSpline::fmm(&[0.0, 2.0], &[1.0, 5.0]).unwrap();
        assert!((s.eval(1.0) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn spline_rejects_bad_knots() {
        assert!(CubicSpline::fmm(&[0.0], &[1.0]).is_none());
        assert!(CubicSpline::fmm(&[0.0, 0.0, 1.0], &[1.0, 2.0, 3.0]).is_none());
    }
}
