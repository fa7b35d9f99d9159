//! Distance consistency between host candidates and the GW posterior.

use tracing::{debug, info};

use crate::domain::{HostGalaxyCandidate, VetConfig};
use crate::math::{asymmetric_gaussian_on_grid, bhattacharyya, gaussian_on_grid, linspace};

/// Uniform distance grid shared by every density in one scoring pass.
#[derive(Debug, Clone)]
pub struct DistanceGrid {
    values: Vec<f64>,
    step: f64,
}

impl DistanceGrid {
    pub fn new(max_mpc: f64, points: usize) -> Self {
        let values = linspace(0.0, max_mpc, points);
        let step = if points > 1 {
            max_mpc / (points as f64 - 1.0)
        } else {
            max_mpc
        };
        Self { values, step }
    }

    pub fn from_config(config: &VetConfig) -> Self {
        Self::new(config.distance_grid_max, config.distance_grid_points)
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn step(&self) -> f64 {
        self.step
    }
}

/// Bhattacharyya overlap between one host and the GW distance density.
///
/// Host widths are floored at the grid step so hosts without a quoted error
/// still resolve on the grid.
pub fn host_overlap(grid: &DistanceGrid, gw: &[f64], host: &HostGalaxyCandidate) -> Option<f64> {
    let left = host.distance_err.neg.max(grid.step());
    let right = host.distance_err.pos.max(grid.step());
    let q = asymmetric_gaussian_on_grid(grid.values(), host.distance, left, right)?;
    Some(bhattacharyya(grid.values(), gw, &q))
}

/// Best overlap over all hosts. No hosts, or no usable GW distance, is
/// neutral (1).
pub fn host_distance_score(
    hosts: &[HostGalaxyCandidate],
    gw_mean: f64,
    gw_std: f64,
    grid: &DistanceGrid,
) -> f64 {
    if hosts.is_empty() {
        debug!("no host candidates; distance score neutral");
        return 1.0;
    }
    let Some(gw) = gaussian_on_grid(grid.values(), gw_mean, gw_std) else {
        debug!(gw_mean, gw_std, "no usable GW distance; distance score neutral");
        return 1.0;
    };

    let best = hosts
        .iter()
        .filter_map(|h| {
            let bc = host_overlap(grid, &gw, h);
            debug!(host = %h.name, distance = h.distance, overlap = ?bc, "host distance overlap");
            bc
        })
        .fold(0.0_f64, f64::max);
    info!(hosts = hosts.len(), score = best, "distance consistency");
    best.clamp(0.0, 1.0)
}
