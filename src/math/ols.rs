//! Least-squares solves on small dense systems.
//!
//! Two consumers:
//!
//! - the single power law, which is linear in its parameters and is solved
//!   directly (`solve_least_squares`)
//! - each Levenberg–Marquardt step of the broken power law, solved as the
//!   augmented system `[J; sqrt(λ)·D] δ = [r; 0]` (`solve_damped_step`)
//!
//! Both go through an SVD so tall and near-singular systems are handled
//! without panicking. Nalgebra's `QR::solve` only supports square systems.

use nalgebra::{DMatrix, DVector};

/// Solve `min ||X β − y||²` with an SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    if x.nrows() != y.len() || x.nrows() == 0 || x.ncols() == 0 {
        return None;
    }
    let svd = x.clone().svd(true, true);

    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Solve one damped Gauss–Newton step.
///
/// `jacobian` is `n × k`, `residuals` has length `n`, and `scale` holds the
/// per-parameter damping scale (typically `sqrt(diag(JᵀJ))`). Returns the
/// parameter increment `δ` minimizing `||J δ − r||² + λ ||D δ||²`.
pub fn solve_damped_step(
    jacobian: &DMatrix<f64>,
    residuals: &DVector<f64>,
    scale: &[f64],
    lambda: f64,
) -> Option<DVector<f64>> {
    let n = jacobian.nrows();
    let k = jacobian.ncols();
    if scale.len() != k || residuals.len() != n {
        return None;
    }

    let mut a = DMatrix::<f64>::zeros(n + k, k);
    let mut b = DVector::<f64>::zeros(n + k);
    a.view_mut((0, 0), (n, k)).copy_from(jacobian);
    b.rows_mut(0, n).copy_from(residuals);

    let sl = lambda.max(0.0).sqrt();
    for j in 0..k {
        a[(n + j, j)] = sl * scale[j].max(1e-12);
    }

    solve_least_squares(&a, &b)
}
