//! Pre-discovery detection screening.
//!
//! A real counterpart cannot be detected before the merger. Repeated
//! significant detections clustered in time before the event point to an
//! unrelated variable.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::domain::{days_between, PhotometryPoint, VetConfig};
use crate::math::photometry::snr_from_mag_err;

#[derive(Debug, Clone, PartialEq)]
pub struct PredetectionOutcome {
    pub score: f64,
    /// Largest number of detections inside one window.
    pub max_detections: usize,
    /// Observations (detections and limits) inside that window.
    pub observations_in_window: usize,
    pub n_points: usize,
}

fn is_significant(point: &PhotometryPoint, snr_threshold: f64) -> bool {
    point
        .magnitude()
        .is_some_and(|(_, err)| snr_from_mag_err(err) > snr_threshold)
}

/// Slide a `±window_days` window over every pre-discovery epoch and count
/// significant detections inside it.
pub fn screen(
    photometry: &[PhotometryPoint],
    event_time: &DateTime<Utc>,
    config: &VetConfig,
) -> PredetectionOutcome {
    let mut pre: Vec<(f64, bool)> = photometry
        .iter()
        .filter(|p| p.timestamp < *event_time)
        .map(|p| {
            (
                days_between(event_time, &p.timestamp),
                is_significant(p, config.predetection_snr),
            )
        })
        .collect();
    pre.sort_by(|a, b| a.0.total_cmp(&b.0));

    if pre.is_empty() {
        debug!("no pre-discovery photometry; predetection score neutral");
        return PredetectionOutcome {
            score: 1.0,
            max_detections: 0,
            observations_in_window: 0,
            n_points: 0,
        };
    }

    let window = config.predetection_window_days;
    let (mut max_detections, mut observations_in_window) = (0usize, 0usize);
    for &(center, _) in &pre {
        let inside = pre.iter().filter(|(t, _)| (t - center).abs() <= window);
        let (n_obs, n_det) = inside.fold((0usize, 0usize), |(o, d), (_, sig)| {
            (o + 1, d + usize::from(*sig))
        });
        if n_det > max_detections {
            max_detections = n_det;
            observations_in_window = n_obs;
        }
    }

    let score = if max_detections >= config.predetection_max_detections {
        config.penalty
    } else {
        1.0
    };
    info!(
        points = pre.len(),
        max_detections,
        observations = observations_in_window,
        score,
        "pre-discovery screen"
    );

    PredetectionOutcome {
        score,
        max_detections,
        observations_in_window,
        n_points: pre.len(),
    }
}
