//! Model selection (single vs broken power law) using AICc with guardrails.
//!
//! The tool fits each eligible model and computes:
//! - SSE / RMSE
//! - AICc = n·ln(SSE/n) + 2k + 2k(k+1)/(n−k−1)
//!
//! Selection rules:
//! 1. The broken power law is only attempted with `n >= k + MIN_N_BUFFER`
//! 2. A model that fails to converge is skipped; if every model fails the
//!    photometric pass fails
//! 3. Choose the model with minimum AICc; ties go to the simpler model

use tracing::{debug, warn};

use crate::domain::{CurveModel, FitQuality, FitResult, ModelKind};
use crate::error::{AppError, ErrorKind};
use crate::fit::fitter::{fit_model, FitOptions, LightCurveSample, ModelFit};
use crate::fit::start_grid::broken_power_law_starts;
use crate::models::predict;

/// Minimum number of extra observations beyond parameter count for the
/// broken power law (`n > k + 2`).
const MIN_N_BUFFER: usize = 3;

/// Break-time steps in the broken power law start grid.
const START_STEPS: usize = 6;

/// Output of fitting + selection.
#[derive(Debug, Clone)]
pub struct FitSelection {
    pub best: FitResult,
    /// Fits for all converged models.
    pub fits: Vec<FitResult>,
    /// Any models that were skipped or failed, and why (for diagnostics).
    pub skipped: Vec<(ModelKind, String)>,
}

/// Fit every eligible model and select the best.
pub fn fit_and_select(
    samples: &[LightCurveSample],
    opts: &FitOptions,
) -> Result<FitSelection, AppError> {
    let n = samples.len();
    let mut fits = Vec::new();
    let mut skipped = Vec::new();

    for kind in [ModelKind::SinglePowerLaw, ModelKind::BrokenPowerLaw] {
        let k = kind.param_count();
        let starts = match kind {
            ModelKind::SinglePowerLaw => Vec::new(),
            ModelKind::BrokenPowerLaw => {
                if n < k + MIN_N_BUFFER {
                    skipped.push((
                        kind,
                        format!("Underdetermined: n={n} < k+{MIN_N_BUFFER}={}", k + MIN_N_BUFFER),
                    ));
                    continue;
                }
                let min_t = samples.iter().map(|s| s.t).fold(f64::INFINITY, f64::min);
                let max_t = samples.iter().map(|s| s.t).fold(f64::NEG_INFINITY, f64::max);
                let mean = samples.iter().map(|s| s.mag).sum::<f64>() / n as f64;
                match broken_power_law_starts(min_t, max_t, mean, START_STEPS) {
                    Ok(starts) => starts,
                    Err(e) => {
                        warn!(model = kind.label(), error = %e, "cannot build start grid");
                        skipped.push((kind, e.to_string()));
                        continue;
                    }
                }
            }
        };

        match fit_model(kind, samples, &starts, opts) {
            Ok(fit) => {
                let result = to_fit_result(fit, n, k);
                debug!(
                    model = kind.label(),
                    sse = result.quality.sse,
                    aicc = result.quality.aicc,
                    "model fitted"
                );
                fits.push(result);
            }
            Err(e) if e.kind() == ErrorKind::FitFailed => {
                warn!(model = kind.label(), error = %e, "model did not converge");
                skipped.push((kind, e.to_string()));
            }
            Err(e) => return Err(e),
        }
    }

    if fits.is_empty() {
        return Err(AppError::new(
            ErrorKind::FitFailed,
            "No light-curve model could be fit.",
        ));
    }

    let best = select_by_aicc(&fits);
    Ok(FitSelection {
        best,
        fits,
        skipped,
    })
}

fn to_fit_result(fit: ModelFit, n: usize, k: usize) -> FitResult {
    let aicc = aicc(n, fit.sse, k);

    FitResult {
        model: CurveModel {
            name: fit.model,
            display_name: fit.model.display_name().to_string(),
            params: fit.params,
        },
        quality: FitQuality {
            sse: fit.sse,
            rmse: fit.rmse,
            aicc,
            n,
        },
    }
}

/// Small-sample corrected AIC. The correction is dropped when `n ≤ k + 1`,
/// where it is undefined.
pub fn aicc(n: usize, sse: f64, k: usize) -> f64 {
    let n_f = n as f64;
    let k_f = k as f64;
    let sse_per = (sse / n_f).max(1e-12);
    let aic = n_f * sse_per.ln() + 2.0 * k_f;
    if n > k + 1 {
        aic + 2.0 * k_f * (k_f + 1.0) / (n_f - k_f - 1.0)
    } else {
        aic
    }
}

fn select_by_aicc(fits: &[FitResult]) -> FitResult {
    // Iterate in order of increasing complexity; a later model must be
    // strictly better to win.
    let mut best = &fits[0];
    for f in &fits[1..] {
        let simpler = f.model.name.param_count() < best.model.name.param_count();
        if f.quality.aicc < best.quality.aicc || (f.quality.aicc == best.quality.aicc && simpler) {
            best = f;
        }
    }
    best.clone()
}

/// Evaluate a fitted model on a grid of times.
pub fn fitted_grid(fit: &CurveModel, times: &[f64]) -> Vec<f64> {
    times
        .iter()
        .map(|&t| predict(fit.name, t, &fit.params))
        .collect()
}
