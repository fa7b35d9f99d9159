//! Synthetic photometry: AB magnitudes to flux density and luminosity.
//!
//! Conventions:
//! - magnitudes are AB, so `f_nu = 10^(-0.4 (m + 48.6))` erg/s/cm²/Hz
//! - a filter is reduced to its effective wavelength; `nu L_nu` uses
//!   `nu = c / lambda_eff`

use std::f64::consts::{LN_10, PI};

/// Speed of light (Å/s).
const C_ANGSTROM_S: f64 = 2.997_924_58e18;

/// One megaparsec in centimetres.
pub const MPC_CM: f64 = 3.085_677_581_491_367e24;

/// Effective wavelengths (Å) of common optical/NIR filters.
const FILTER_WAVELENGTHS: [(&str, f64); 22] = [
    ("u", 3608.0),
    ("g", 4672.0),
    ("r", 6141.0),
    ("i", 7458.0),
    ("z", 8923.0),
    ("y", 9620.0),
    ("U", 3656.0),
    ("B", 4353.0),
    ("V", 5477.0),
    ("R", 6349.0),
    ("I", 8797.0),
    ("c", 5330.0),
    ("o", 6780.0),
    ("w", 6080.0),
    ("G", 6218.0),
    ("J", 12350.0),
    ("H", 16620.0),
    ("K", 21590.0),
    ("Ks", 21590.0),
    ("BP", 5110.0),
    ("RP", 7769.0),
    ("L", 6400.0),
];

/// Effective wavelength of `filter` in Å.
pub fn effective_wavelength(filter: &str) -> Option<f64> {
    FILTER_WAVELENGTHS
        .iter()
        .find(|(name, _)| *name == filter)
        .map(|(_, wl)| *wl)
}

/// Effective frequency of `filter` in Hz.
pub fn effective_frequency(filter: &str) -> Option<f64> {
    effective_wavelength(filter).map(|wl| C_ANGSTROM_S / wl)
}

/// AB magnitude to flux density (erg/s/cm²/Hz).
pub fn ab_mag_to_flux(mag: f64) -> f64 {
    10f64.powf(-0.4 * (mag + 48.6))
}

/// Propagate a magnitude error to a flux-density error.
pub fn flux_error(flux: f64, mag_err: f64) -> f64 {
    flux * mag_err * LN_10 / 2.5
}

/// Signal-to-noise implied by a magnitude error.
pub fn snr_from_mag_err(mag_err: f64) -> f64 {
    if mag_err > 0.0 {
        2.5 / LN_10 / mag_err
    } else {
        f64::INFINITY
    }
}

/// Spectral luminosity `L_nu` (erg/s/Hz) of a flux density at `distance_mpc`.
pub fn spectral_luminosity(flux: f64, distance_mpc: f64) -> f64 {
    let d = distance_mpc * MPC_CM;
    4.0 * PI * d * d * flux
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_point_is_3631_jy() {
        let f = ab_mag_to_flux(0.0);
        assert!((f / 3.631e-20 - 1.0).abs() < 1e-3, "f={f}");
    }

    #[test]
    fn brighter_means_more_flux() {
        assert!(ab_mag_to_flux(18.0) > ab_mag_to_flux(19.0));
        assert!((ab_mag_to_flux(18.0) / ab_mag_to_flux(20.5) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn snr_of_tenth_mag_error() {
        assert!((snr_from_mag_err(0.1) - 10.857).abs() < 1e-3);
    }

    #[test]
    fn unknown_filter_has_no_frequency() {
        assert!(effective_frequency("r").is_some());
        assert!(effective_frequency("Clear").is_none());
    }

    #[test]
    fn kilonova_luminosity_scale() {
        // An r = 17.5 source at 40 Mpc (AT2017gfo-like) sits near 1e41-1e42 erg/s.
        let f = ab_mag_to_flux(17.5);
        let nu = effective_frequency("r").unwrap();
        let nu_l = nu * spectral_luminosity(f, 40.0);
        assert!(nu_l > 1e41 && nu_l < 1e42, "nuL={nu_l:e}");
    }
}
