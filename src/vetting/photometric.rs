//! Photometric analysis of the post-discovery light curve.
//!
//! Steps:
//! 1. keep post-discovery photometry in whitelisted filters and pick the
//!    analysis band (most detections, ties by filter priority)
//! 2. peak luminosity `nu L_nu` of the brightest detection at the GW distance
//! 3. light-curve fit (single vs broken power law) and shape extraction:
//!    time of maximum and post-peak decay rate
//!
//! Each quantity outside its expected kilonova range multiplies the score by
//! the configured penalty.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::domain::{days_between, CurveModel, LightCurveFit, PhotometryPoint, VetConfig};
use crate::error::AppError;
use crate::fit::{fit_and_select, fitted_grid, FitOptions, LightCurveSample};
use crate::math::linspace;
use crate::math::photometry::{ab_mag_to_flux, effective_frequency, flux_error, spectral_luminosity};

/// Output of the photometric pass.
#[derive(Debug, Clone, Default)]
pub struct PhotometricOutcome {
    pub score: f64,
    /// Analysis band, if any detection survived the filters.
    pub band: Option<String>,
    pub n_detections: usize,
    /// Peak `nu L_nu` (erg/s), when a GW distance was available.
    pub peak_luminosity: Option<f64>,
    pub fit: Option<LightCurveFit>,
    /// Band detections used for the fit (days since event, magnitude).
    pub samples: Vec<LightCurveSample>,
}

/// Detections used by the analysis: post-discovery, whitelisted, in the
/// chosen band. Returns `(band, detections)`.
pub fn select_band<'a>(
    photometry: &'a [PhotometryPoint],
    event_time: &DateTime<Utc>,
    config: &VetConfig,
) -> Option<(String, Vec<&'a PhotometryPoint>)> {
    let post: Vec<&PhotometryPoint> = photometry
        .iter()
        .filter(|p| p.timestamp >= *event_time && p.is_detection())
        .filter(|p| config.filter_rank(&p.filter).is_some())
        .collect();

    let band = config
        .filter_priority
        .iter()
        .map(|f| (f, post.iter().filter(|p| &p.filter == f).count()))
        .filter(|(_, n)| *n > 0)
        // Stable max: earlier filters win ties.
        .fold(None::<(&String, usize)>, |best, (f, n)| match best {
            Some((_, bn)) if bn >= n => best,
            _ => Some((f, n)),
        })?
        .0
        .clone();

    let detections = post.into_iter().filter(|p| p.filter == band).collect();
    Some((band, detections))
}

/// `nu L_nu` of the brightest detection, optionally inflated by 3σ.
pub fn peak_luminosity(
    detections: &[&PhotometryPoint],
    band: &str,
    distance_mpc: f64,
    inflate: bool,
) -> Option<f64> {
    let nu = effective_frequency(band)?;
    let peak_flux = detections
        .iter()
        .filter_map(|p| p.magnitude())
        .map(|(mag, err)| {
            let f = ab_mag_to_flux(mag);
            if inflate {
                f + 3.0 * flux_error(f, err)
            } else {
                f
            }
        })
        .fold(None::<f64>, |best, f| Some(best.map_or(f, |b| b.max(f))))?;
    Some(nu * spectral_luminosity(peak_flux, distance_mpc))
}

/// `(peak_time, decay_rate)` of a fitted model over `[t_min, t_max]`.
///
/// The peak is the brightest (minimum magnitude) grid point; the decay rate is
/// the least-squares slope (mag/day) after it, positive when fading. A peak at
/// the last grid point has no decay interval and a decay rate of 0.
pub fn shape_from_fit(
    fit: &CurveModel,
    t_min: f64,
    t_max: f64,
    points: usize,
) -> (f64, f64) {
    let times = linspace(t_min, t_max, points.max(2));
    let mags = fitted_grid(fit, &times);

    let (peak_idx, _) = mags
        .iter()
        .enumerate()
        .fold((0usize, f64::INFINITY), |(bi, bm), (i, &m)| {
            if m < bm { (i, m) } else { (bi, bm) }
        });
    let peak_time = times[peak_idx];

    let decay_rate = slope(&times[peak_idx..], &mags[peak_idx..]).unwrap_or(0.0);
    (peak_time, decay_rate)
}

fn slope(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() < 2 {
        return None;
    }
    let n = x.len() as f64;
    let mx = x.iter().sum::<f64>() / n;
    let my = y.iter().sum::<f64>() / n;
    let (mut cov, mut var) = (0.0, 0.0);
    for (&xi, &yi) in x.iter().zip(y) {
        cov += (xi - mx) * (yi - my);
        var += (xi - mx) * (xi - mx);
    }
    (var > 0.0 && cov.is_finite()).then(|| cov / var)
}

/// Run the photometric pass.
///
/// `gw_distance` is the posterior mean luminosity distance (Mpc); without it
/// the luminosity check is skipped. Fails only when every light-curve model
/// fails.
pub fn analyze(
    photometry: &[PhotometryPoint],
    event_time: &DateTime<Utc>,
    gw_distance: Option<f64>,
    config: &VetConfig,
) -> Result<PhotometricOutcome, AppError> {
    let Some((band, detections)) = select_band(photometry, event_time, config) else {
        info!("no post-discovery detections; photometric score neutral");
        return Ok(PhotometricOutcome {
            score: 1.0,
            ..PhotometricOutcome::default()
        });
    };

    let mut score: f64 = 1.0;
    let mut outcome = PhotometricOutcome {
        band: Some(band.clone()),
        n_detections: detections.len(),
        ..PhotometricOutcome::default()
    };

    match gw_distance.filter(|d| d.is_finite() && *d > 0.0) {
        Some(d) => match peak_luminosity(&detections, &band, d, config.inflate_peak_flux) {
            Some(lum) => {
                let in_range = (config.luminosity_min..=config.luminosity_max).contains(&lum);
                debug!(band = %band, luminosity = lum, in_range, "peak luminosity");
                if !in_range {
                    score *= config.penalty;
                }
                outcome.peak_luminosity = Some(lum);
            }
            None => warn!(band = %band, "no effective frequency for filter; luminosity skipped"),
        },
        None => debug!("no GW distance; luminosity check skipped"),
    }

    outcome.samples = detections
        .iter()
        .filter_map(|p| {
            let (mag, _) = p.magnitude()?;
            let t = days_between(event_time, &p.timestamp);
            (t > 0.0).then_some(LightCurveSample { t, mag })
        })
        .collect();

    if outcome.samples.len() >= 2 {
        let selection = fit_and_select(&outcome.samples, &FitOptions::default())?;
        let t_min = outcome.samples.iter().map(|s| s.t).fold(f64::INFINITY, f64::min);
        let t_max = outcome.samples.iter().map(|s| s.t).fold(f64::NEG_INFINITY, f64::max);
        let (peak_time, decay_rate) =
            shape_from_fit(&selection.best.model, t_min, t_max, config.shape_grid_points);

        if !(config.peak_time_min..=config.peak_time_max).contains(&peak_time) {
            score *= config.penalty;
        }
        if decay_rate < config.min_decay_rate {
            score *= config.penalty;
        }
        info!(
            model = selection.best.model.name.label(),
            peak_time,
            decay_rate,
            "light-curve fit"
        );
        outcome.fit = Some(LightCurveFit {
            best: selection.best,
            peak_time,
            decay_rate,
        });
    } else {
        debug!(n = outcome.samples.len(), "too few detections for a light-curve fit");
    }

    outcome.score = score.clamp(0.0, 1.0);
    Ok(outcome)
}
