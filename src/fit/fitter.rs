//! Low-level fitting routines for a single model kind.
//!
//! Given:
//! - times `t_i` (days since the event, all `> 0`)
//! - observed magnitudes `m_i`
//! - a list of starting parameter vectors
//!
//! the single power law is solved directly by linear least squares (it is
//! linear in `[y0, a]`), and the broken power law is refined from every start
//! with a bounded Levenberg–Marquardt iteration. The best (lowest SSE)
//! candidate is returned.

use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;

use crate::domain::ModelKind;
use crate::error::{AppError, ErrorKind};
use crate::math::{solve_damped_step, solve_least_squares};
use crate::models::{fill_jacobian_row, predict, ParamBounds};

/// One light-curve sample used for fitting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightCurveSample {
    /// Days since the event.
    pub t: f64,
    pub mag: f64,
}

/// Iteration controls for the non-linear fit.
#[derive(Debug, Clone)]
pub struct FitOptions {
    pub max_iterations: usize,
    /// Stop once the relative SSE improvement of an accepted step drops below this.
    pub tolerance: f64,
    /// Initial damping.
    pub lambda0: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            tolerance: 1e-10,
            lambda0: 1e-3,
        }
    }
}

/// Best fit for a single model kind.
#[derive(Debug, Clone)]
pub struct ModelFit {
    pub model: ModelKind,
    pub params: Vec<f64>,
    pub sse: f64,
    pub rmse: f64,
}

#[derive(Debug, Clone)]
struct Candidate {
    idx: usize,
    params: Vec<f64>,
    sse: f64,
}

const LAMBDA_MAX: f64 = 1e12;
const LAMBDA_MIN: f64 = 1e-12;

/// Fit a single model kind.
///
/// `starts` is ignored for the single power law.
pub fn fit_model(
    model: ModelKind,
    samples: &[LightCurveSample],
    starts: &[Vec<f64>],
    opts: &FitOptions,
) -> Result<ModelFit, AppError> {
    if samples.is_empty() {
        return Err(fit_failed(model, "no data points to fit"));
    }
    if samples
        .iter()
        .any(|s| !(s.t.is_finite() && s.t > 0.0 && s.mag.is_finite()))
    {
        return Err(AppError::input(
            "Light-curve samples must have finite magnitudes and t > 0.",
        ));
    }

    let n = samples.len();
    let max_mag = samples.iter().map(|s| s.mag).fold(f64::NEG_INFINITY, f64::max);
    let max_t = samples.iter().map(|s| s.t).fold(f64::NEG_INFINITY, f64::max);
    let bounds = ParamBounds::for_model(model, max_mag, max_t);

    let best = match model {
        ModelKind::SinglePowerLaw => fit_linear(model, samples)
            .ok_or_else(|| fit_failed(model, "least-squares solve failed"))?,
        ModelKind::BrokenPowerLaw => {
            if starts.is_empty() {
                return Err(fit_failed(model, "start grid is empty"));
            }
            fit_from_starts(model, samples, starts, &bounds, opts)?
        }
    };

    let rmse = (best.sse / n as f64).sqrt();
    Ok(ModelFit {
        model,
        params: best.params,
        sse: best.sse,
        rmse,
    })
}

fn fit_failed(model: ModelKind, why: &str) -> AppError {
    AppError::new(
        ErrorKind::FitFailed,
        format!("{} fit failed: {why}.", model.display_name()),
    )
}

fn fit_linear(model: ModelKind, samples: &[LightCurveSample]) -> Option<Candidate> {
    let k = model.param_count();
    let n = samples.len();
    let mut x = DMatrix::<f64>::zeros(n, k);
    let mut y = DVector::<f64>::zeros(n);
    let mut row = vec![0.0; k];
    let zeros = vec![0.0; k];

    for (i, s) in samples.iter().enumerate() {
        fill_jacobian_row(model, s.t, &zeros, &mut row);
        for j in 0..k {
            x[(i, j)] = row[j];
        }
        y[i] = s.mag;
    }

    let beta = solve_least_squares(&x, &y)?;
    let params: Vec<f64> = beta.iter().copied().collect();
    let sse = sse(model, samples, &params)?;
    Some(Candidate { idx: 0, params, sse })
}

fn fit_from_starts(
    model: ModelKind,
    samples: &[LightCurveSample],
    starts: &[Vec<f64>],
    bounds: &ParamBounds,
    opts: &FitOptions,
) -> Result<Candidate, AppError> {
    // Refine each start independently (parallel).
    let candidates: Vec<Candidate> = starts
        .par_iter()
        .enumerate()
        .filter_map(|(idx, start)| {
            levenberg_marquardt(model, samples, start, bounds, opts)
                .map(|(params, sse)| Candidate { idx, params, sse })
        })
        .collect();

    if candidates.is_empty() {
        return Err(fit_failed(model, "no start converged to a finite solution"));
    }

    // Deterministic selection: pick the minimum SSE; break ties by original grid index.
    let mut best = &candidates[0];
    for c in &candidates[1..] {
        if c.sse < best.sse || (c.sse == best.sse && c.idx < best.idx) {
            best = c;
        }
    }

    Ok(best.clone())
}

/// Bounded Levenberg–Marquardt from one start.
///
/// Every trial point is projected onto the box before it is evaluated, so the
/// iterate never leaves the feasible region.
fn levenberg_marquardt(
    model: ModelKind,
    samples: &[LightCurveSample],
    start: &[f64],
    bounds: &ParamBounds,
    opts: &FitOptions,
) -> Option<(Vec<f64>, f64)> {
    let k = model.param_count();
    if start.len() != k {
        return None;
    }
    let n = samples.len();

    let mut params = start.to_vec();
    bounds.project(&mut params);
    let mut current = sse(model, samples, &params)?;
    let mut lambda = opts.lambda0;

    let mut jac = DMatrix::<f64>::zeros(n, k);
    let mut resid = DVector::<f64>::zeros(n);
    let mut row = vec![0.0; k];

    for _ in 0..opts.max_iterations {
        for (i, s) in samples.iter().enumerate() {
            fill_jacobian_row(model, s.t, &params, &mut row);
            for j in 0..k {
                jac[(i, j)] = row[j];
            }
            resid[i] = s.mag - predict(model, s.t, &params);
        }
        if jac.iter().any(|v| !v.is_finite()) {
            break;
        }
        let scale: Vec<f64> = (0..k).map(|j| jac.column(j).norm()).collect();

        let mut accepted = None;
        while lambda <= LAMBDA_MAX {
            let Some(delta) = solve_damped_step(&jac, &resid, &scale, lambda) else {
                lambda *= 10.0;
                continue;
            };
            let mut trial: Vec<f64> = params.iter().zip(delta.iter()).map(|(p, d)| p + d).collect();
            bounds.project(&mut trial);
            match sse(model, samples, &trial) {
                Some(s) if s < current => {
                    accepted = Some((trial, s));
                    lambda = (lambda / 10.0).max(LAMBDA_MIN);
                    break;
                }
                _ => lambda *= 10.0,
            }
        }

        let Some((trial, s)) = accepted else {
            break;
        };
        let improvement = (current - s) / current.max(f64::MIN_POSITIVE);
        params = trial;
        current = s;
        if improvement < opts.tolerance {
            break;
        }
    }

    Some((params, current))
}

/// Sum of squared residuals; `None` if the model is not finite on the data.
fn sse(model: ModelKind, samples: &[LightCurveSample], params: &[f64]) -> Option<f64> {
    let mut acc = 0.0;
    for s in samples {
        let r = s.mag - predict(model, s.t, params);
        acc += r * r;
    }
    acc.is_finite().then_some(acc)
}
