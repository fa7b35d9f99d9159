//! Flat ΛCDM distances.
//!
//! Only the luminosity distance is needed: redshift-only host catalogs are
//! placed on the same distance axis as the GW posterior.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Speed of light (km/s).
const C_KM_S: f64 = 299_792.458;

/// Simpson intervals for the comoving-distance integral (even).
const SIMPSON_STEPS: usize = 512;

/// Flat ΛCDM parameters (radiation neglected).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cosmology {
    /// Hubble constant (km/s/Mpc).
    pub h0: f64,
    /// Matter density parameter; dark energy is `1 - omega_m`.
    pub omega_m: f64,
}

impl Default for Cosmology {
    /// Planck 2018 (TT,TE,EE+lowE+lensing+BAO).
    fn default() -> Self {
        Self {
            h0: 67.66,
            omega_m: 0.30966,
        }
    }
}

impl Cosmology {
    pub fn validate(&self) -> Result<(), AppError> {
        if !(self.h0.is_finite() && self.h0 > 0.0) {
            return Err(AppError::config("H0 must be > 0."));
        }
        if !(self.omega_m.is_finite() && (0.0..=1.0).contains(&self.omega_m)) {
            return Err(AppError::config("Omega_m must be in [0, 1]."));
        }
        Ok(())
    }

    fn hubble_distance(&self) -> f64 {
        C_KM_S / self.h0
    }

    fn inv_e(&self, z: f64) -> f64 {
        let zp1 = 1.0 + z;
        1.0 / (self.omega_m * zp1 * zp1 * zp1 + (1.0 - self.omega_m)).sqrt()
    }

    /// Line-of-sight comoving distance (Mpc).
    pub fn comoving_distance(&self, z: f64) -> f64 {
        if z <= 0.0 {
            return 0.0;
        }
        let h = z / SIMPSON_STEPS as f64;
        let mut acc = self.inv_e(0.0) + self.inv_e(z);
        for i in 1..SIMPSON_STEPS {
            let w = if i % 2 == 1 { 4.0 } else { 2.0 };
            acc += w * self.inv_e(h * i as f64);
        }
        self.hubble_distance() * acc * h / 3.0
    }

    /// Luminosity distance (Mpc).
    pub fn luminosity_distance(&self, z: f64) -> f64 {
        (1.0 + z) * self.comoving_distance(z)
    }

    /// Redshift whose luminosity distance is `distance_mpc`, by bisection.
    pub fn redshift_at_distance(&self, distance_mpc: f64) -> Option<f64> {
        if !(distance_mpc.is_finite() && distance_mpc >= 0.0) {
            return None;
        }
        let (mut lo, mut hi) = (0.0_f64, 20.0_f64);
        if self.luminosity_distance(hi) < distance_mpc {
            return None;
        }
        for _ in 0..100 {
            let mid = 0.5 * (lo + hi);
            if self.luminosity_distance(mid) < distance_mpc {
                lo = mid;
            } else {
                hi = mid;
            }
            if hi - lo < 1e-10 {
                break;
            }
        }
        Some(0.5 * (lo + hi))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_redshift_follows_hubble_law() {
        let c = Cosmology::default();
        let z = 0.001;
        let d = c.luminosity_distance(z);
        let hubble = C_KM_S * z / c.h0;
        assert!((d - hubble).abs() / hubble < 2e-3, "d={d}, hubble={hubble}");
    }

    #[test]
    fn distance_at_z_0_1_is_reasonable() {
        // Planck18 gives ~475 Mpc at z = 0.1.
        let d = Cosmology::default().luminosity_distance(0.1);
        assert!(d > 460.0 && d < 490.0, "d={d}");
    }

    #[test]
    fn inverse_matches_forward() {
        let c = Cosmology::default();
        for &z in &[0.02, 0.05, 0.3, 1.2] {
            let d = c.luminosity_distance(z);
            let back = c.redshift_at_distance(d).unwrap();
            assert!((back - z).abs() < 1e-8, "z={z}, back={back}");
        }
    }
}
