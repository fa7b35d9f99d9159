//! Model evaluation for the single and broken power laws.
//!
//! The fitter relies on three primitive operations:
//! - predict `mag(t)` given parameters (for residuals and plots)
//! - fill the Jacobian row `∂mag/∂θ` at a given time (for least squares)
//! - project a parameter vector onto the model's box constraints
//!
//! Parameter layouts:
//! - single power law: `[y0, a]`
//! - broken power law: `[y0, t0, a1, a2]`
//!
//! The broken power law is evaluated in log space (log-sum-exp) so that large
//! exponents do not overflow.

use std::f64::consts::LN_10;

use crate::domain::ModelKind;

/// Distance kept from open bounds when projecting parameters.
const BOUND_MARGIN: f64 = 1e-6;

/// Predict the magnitude at `t` (days since the event, `t > 0`).
pub fn predict(model: ModelKind, t: f64, params: &[f64]) -> f64 {
    match model {
        ModelKind::SinglePowerLaw => params[0] - params[1] * t.log10(),
        ModelKind::BrokenPowerLaw => {
            let (ln_sum, _, _) = broken_terms(t, params[1], params[2], params[3]);
            params[0] - ln_sum / LN_10
        }
    }
}

/// Fill `out` with the partial derivatives of `predict` w.r.t. each parameter.
///
/// For the single power law this is also the (parameter-independent) design
/// row of the linear regression.
///
/// # Panics
/// Panics if `out` or `params` is shorter than `model.param_count()`.
pub fn fill_jacobian_row(model: ModelKind, t: f64, params: &[f64], out: &mut [f64]) {
    match model {
        ModelKind::SinglePowerLaw => {
            out[0] = 1.0;
            out[1] = -t.log10();
        }
        ModelKind::BrokenPowerLaw => {
            let (t0, a1, a2) = (params[1], params[2], params[3]);
            let (_, wa, wb) = broken_terms(t, t0, a1, a2);
            let ln_u = (t / t0).ln();
            out[0] = 1.0;
            out[1] = -(a1 * wa + a2 * wb) / (t0 * LN_10);
            out[2] = ln_u * wa / LN_10;
            out[3] = ln_u * wb / LN_10;
        }
    }
}

/// `(ln S, A/S, B/S)` for `S = A + B`, `A = (t/t0)^-a1`, `B = (t/t0)^-a2`.
fn broken_terms(t: f64, t0: f64, a1: f64, a2: f64) -> (f64, f64, f64) {
    let ln_u = (t / t0).ln();
    let ln_a = -a1 * ln_u;
    let ln_b = -a2 * ln_u;
    let m = ln_a.max(ln_b);
    let ea = (ln_a - m).exp();
    let eb = (ln_b - m).exp();
    let total = ea + eb;
    (m + total.ln(), ea / total, eb / total)
}

/// Box constraints on a parameter vector. Bounds are open; infinite entries
/// leave the parameter unconstrained on that side.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamBounds {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl ParamBounds {
    /// Bounds for `model` given the data's brightest-to-faintest magnitude
    /// and latest time.
    pub fn for_model(model: ModelKind, max_mag: f64, max_t: f64) -> Self {
        match model {
            ModelKind::SinglePowerLaw => Self {
                lower: vec![f64::NEG_INFINITY; 2],
                upper: vec![f64::INFINITY; 2],
            },
            ModelKind::BrokenPowerLaw => Self {
                lower: vec![0.0, 0.0, f64::NEG_INFINITY, 0.0],
                upper: vec![2.0 * max_mag, max_t, 0.0, f64::INFINITY],
            },
        }
    }

    /// Clamp `params` strictly inside the box.
    pub fn project(&self, params: &mut [f64]) {
        for (j, p) in params.iter_mut().enumerate() {
            let lo = self.lower[j];
            let hi = self.upper[j];
            if lo.is_finite() && *p <= lo + BOUND_MARGIN {
                *p = lo + BOUND_MARGIN;
            }
            if hi.is_finite() && *p >= hi - BOUND_MARGIN {
                *p = hi - BOUND_MARGIN;
            }
        }
    }

    pub fn contains(&self, params: &[f64]) -> bool {
        params
            .iter()
            .enumerate()
            .all(|(j, &p)| p.is_finite() && p > self.lower[j] && p < self.upper[j])
    }
}
