//! Vetting configuration.
//!
//! Every threshold the pipeline uses lives here and is passed explicitly to
//! each stage at construction. The `vet` binary builds a `VetConfig` from CLI
//! flags; library users start from `VetConfig::default()`.

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::math::cosmology::Cosmology;

/// Filters used for photometric analysis, most preferred first.
pub const DEFAULT_FILTER_PRIORITY: [&str; 12] = [
    "r", "g", "i", "o", "c", "V", "R", "B", "I", "z", "w", "G",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VetConfig {
    /// Skymap scores below this end the run with priority 0.
    pub skymap_threshold: f64,
    /// Sub-score multiplier applied for each piece of evidence against.
    pub penalty: f64,

    pub point_source_radius_arcsec: f64,

    pub host_search_radius_arcmin: f64,
    /// Configured PCC ceiling (relaxed to the minimum PCC present).
    pub pcc_threshold: f64,
    /// Host rows with redshift below this are discarded.
    pub min_host_redshift: f64,

    /// Upper edge of the distance grid (Mpc).
    pub distance_grid_max: f64,
    /// Number of samples on the distance grid.
    pub distance_grid_points: usize,

    /// Photometric filters considered, most preferred first.
    pub filter_priority: Vec<String>,
    /// Inflate the peak flux by 3 sigma before converting to luminosity.
    pub inflate_peak_flux: bool,
    /// Allowed `nu L_nu` range (erg/s).
    pub luminosity_min: f64,
    pub luminosity_max: f64,
    /// Allowed time of maximum (days since the event).
    pub peak_time_min: f64,
    pub peak_time_max: f64,
    /// Minimum post-peak fade rate (mag/day).
    pub min_decay_rate: f64,
    /// Samples used to evaluate the fitted model for peak/decay extraction.
    pub shape_grid_points: usize,

    /// Detection threshold for pre-discovery photometry.
    pub predetection_snr: f64,
    /// Half-width of the pre-discovery sliding window (days).
    pub predetection_window_days: f64,
    /// Detections inside one window at or above this count are penalized.
    pub predetection_max_detections: usize,

    /// Minor-planet match radius (arcsec).
    pub minor_planet_radius_arcsec: f64,

    pub cosmology: Cosmology,
}

impl Default for VetConfig {
    fn default() -> Self {
        Self {
            skymap_threshold: 0.01,
            penalty: 0.1,
            point_source_radius_arcsec: 2.0,
            host_search_radius_arcmin: 5.0,
            pcc_threshold: 0.1,
            min_host_redshift: 0.02,
            distance_grid_max: 10_000.0,
            distance_grid_points: 100_001,
            filter_priority: DEFAULT_FILTER_PRIORITY
                .iter()
                .map(|s| s.to_string())
                .collect(),
            inflate_peak_flux: true,
            luminosity_min: 0.0,
            luminosity_max: 1e43,
            peak_time_min: 0.0,
            peak_time_max: 4.0,
            min_decay_rate: 0.3,
            shape_grid_points: 1000,
            predetection_snr: 5.0,
            predetection_window_days: 10.0,
            predetection_max_detections: 3,
            minor_planet_radius_arcsec: 30.0,
            cosmology: Cosmology::default(),
        }
    }
}

impl VetConfig {
    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), AppError> {
        if !(self.penalty.is_finite() && self.penalty >= 0.0 && self.penalty < 1.0) {
            return Err(AppError::config("penalty must be in [0, 1)."));
        }
        if !(self.skymap_threshold.is_finite() && (0.0..=1.0).contains(&self.skymap_threshold)) {
            return Err(AppError::config("skymap threshold must be in [0, 1]."));
        }
        if !(self.point_source_radius_arcsec > 0.0 && self.host_search_radius_arcmin > 0.0) {
            return Err(AppError::config("search radii must be > 0."));
        }
        if !(self.pcc_threshold.is_finite() && (0.0..=1.0).contains(&self.pcc_threshold)) {
            return Err(AppError::config("PCC threshold must be in [0, 1]."));
        }
        if !(self.distance_grid_max > 0.0) || self.distance_grid_points < 3 {
            return Err(AppError::config(
                "distance grid needs a positive extent and at least 3 points.",
            ));
        }
        if self.filter_priority.is_empty() {
            return Err(AppError::config("filter priority list is empty."));
        }
        if !(self.luminosity_max > self.luminosity_min) {
            return Err(AppError::config("luminosity range is empty."));
        }
        if !(self.peak_time_max > self.peak_time_min) {
            return Err(AppError::config("peak time window is empty."));
        }
        if self.shape_grid_points < 10 {
            return Err(AppError::config("shape grid needs at least 10 points."));
        }
        if !(self.predetection_window_days > 0.0) || self.predetection_max_detections == 0 {
            return Err(AppError::config(
                "pre-discovery window and ceiling must be > 0.",
            ));
        }
        self.cosmology.validate()?;
        Ok(())
    }

    pub fn host_search_radius_arcsec(&self) -> f64 {
        self.host_search_radius_arcmin * 60.0
    }

    /// Position of `filter` in the priority list (`None` if not whitelisted).
    pub fn filter_rank(&self, filter: &str) -> Option<usize> {
        self.filter_priority.iter().position(|f| f == filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        VetConfig::default().validate().unwrap();
    }

    #[test]
    fn penalty_of_one_is_rejected() {
        let config = VetConfig {
            penalty: 1.0,
            ..VetConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn filter_rank_follows_priority() {
        let config = VetConfig::default();
        assert_eq!(config.filter_rank("r"), Some(0));
        assert_eq!(config.filter_rank("g"), Some(1));
        assert_eq!(config.filter_rank("Clear"), None);
    }
}
