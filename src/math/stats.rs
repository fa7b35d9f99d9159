//! Gridded probability densities and their overlap.
//!
//! Distances are compared as densities sampled on a shared uniform grid:
//!
//! - `gaussian_on_grid` / `asymmetric_gaussian_on_grid` build the samples and
//!   normalize them numerically (so truncation at the grid edge is handled)
//! - `bhattacharyya` integrates `sqrt(p·q)` with the trapezoid rule

use std::f64::consts::PI;

/// `n` evenly spaced samples from `start` to `stop` inclusive.
pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n as f64 - 1.0);
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}

/// Trapezoid integral of `y` sampled at `x`.
pub fn trapezoid(x: &[f64], y: &[f64]) -> f64 {
    x.windows(2)
        .zip(y.windows(2))
        .map(|(xs, ys)| 0.5 * (xs[1] - xs[0]) * (ys[0] + ys[1]))
        .sum()
}

/// Normal density at `x`.
pub fn gaussian_pdf(x: f64, mean: f64, sigma: f64) -> f64 {
    let z = (x - mean) / sigma;
    (-0.5 * z * z).exp() / (sigma * (2.0 * PI).sqrt())
}

/// Scale `values` so they integrate to one over `grid`.
///
/// Returns `None` when the mass on the grid is zero or non-finite (e.g. the
/// distribution lies entirely outside the grid).
fn normalize(grid: &[f64], mut values: Vec<f64>) -> Option<Vec<f64>> {
    let mass = trapezoid(grid, &values);
    if !(mass.is_finite() && mass > 0.0) {
        return None;
    }
    for v in &mut values {
        *v /= mass;
    }
    Some(values)
}

/// Gaussian density sampled on `grid`, normalized over the grid.
pub fn gaussian_on_grid(grid: &[f64], mean: f64, sigma: f64) -> Option<Vec<f64>> {
    if !(mean.is_finite() && sigma.is_finite() && sigma > 0.0) {
        return None;
    }
    let values = grid.iter().map(|&x| gaussian_pdf(x, mean, sigma)).collect();
    normalize(grid, values)
}

/// Two-piece Gaussian: width `sigma_left` below `mode`, `sigma_right` above,
/// normalized over `grid`.
pub fn asymmetric_gaussian_on_grid(
    grid: &[f64],
    mode: f64,
    sigma_left: f64,
    sigma_right: f64,
) -> Option<Vec<f64>> {
    if !(mode.is_finite() && sigma_left > 0.0 && sigma_right > 0.0) {
        return None;
    }
    let values = grid
        .iter()
        .map(|&x| {
            let sigma = if x < mode { sigma_left } else { sigma_right };
            let z = (x - mode) / sigma;
            (-0.5 * z * z).exp()
        })
        .collect();
    normalize(grid, values)
}

/// Bhattacharyya coefficient of two densities sampled on the same grid.
///
/// Symmetric in its arguments, 1 for identical densities and 0 for densities
/// with disjoint support. Clamped to `[0, 1]` to absorb quadrature error.
pub fn bhattacharyya(grid: &[f64], p: &[f64], q: &[f64]) -> f64 {
    let root: Vec<f64> = p
        .iter()
        .zip(q.iter())
        .map(|(&a, &b)| (a * b).max(0.0).sqrt())
        .collect();
    trapezoid(grid, &root).clamp(0.0, 1.0)
}
