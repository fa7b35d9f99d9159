//! Starting-point grids for the broken power law.
//!
//! The broken power law is fitted by local least squares from every point of
//! a deterministic grid; the best converged start wins. The grid spans the
//! break time log-uniformly across the observed window and pairs it with a
//! few early/late indices of either sign convention.

use crate::error::AppError;

/// Early (rising) indices tried at each break time. Must be negative.
const A1_STARTS: [f64; 3] = [-0.5, -1.5, -3.0];
/// Late (fading) indices tried at each break time. Must be positive.
const A2_STARTS: [f64; 3] = [0.5, 1.5, 3.0];

/// Generate `steps` log-spaced points between `min` and `max` (inclusive).
pub fn log_space(min: f64, max: f64, steps: usize) -> Result<Vec<f64>, AppError> {
    if !(min.is_finite() && max.is_finite() && min > 0.0 && max > 0.0 && max > min) {
        return Err(AppError::config(format!(
            "Invalid grid range: min={min}, max={max} (must be finite, >0, and max>min)."
        )));
    }
    if steps < 2 {
        return Err(AppError::config("Grid steps must be >= 2."));
    }

    let ln_min = min.ln();
    let ln_max = max.ln();
    let step = (ln_max - ln_min) / (steps as f64 - 1.0);

    let mut out = Vec::with_capacity(steps);
    for i in 0..steps {
        out.push((ln_min + step * i as f64).exp());
    }
    Ok(out)
}

/// Broken power law starts: `[y0, t0, a1, a2]`.
///
/// `y0` is chosen so the model passes through `mean_mag` at the break
/// (`y0 = mean + log10 2`).
pub fn broken_power_law_starts(
    min_t: f64,
    max_t: f64,
    mean_mag: f64,
    steps: usize,
) -> Result<Vec<Vec<f64>>, AppError> {
    let lo = min_t.max(max_t * 0.02);
    let hi = max_t * 0.98;
    let breaks = if hi > lo {
        log_space(lo, hi, steps)?
    } else {
        vec![0.5 * max_t]
    };
    let y0 = mean_mag + 2f64.log10();

    let mut out = Vec::with_capacity(breaks.len() * A1_STARTS.len() * A2_STARTS.len());
    for &t0 in &breaks {
        for &a1 in &A1_STARTS {
            for &a2 in &A2_STARTS {
                out.push(vec![y0, t0, a1, a2]);
            }
        }
    }
    Ok(out)
}
