//! Minor-planet ephemeris matching.

use serde::{Deserialize, Serialize};

use crate::catalog::CatalogError;
use crate::sky::separation_arcsec;

/// The closest known solar-system object to a position at an epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinorPlanetMatch {
    pub name: String,
    pub separation_arcsec: f64,
    /// Epoch of the ephemeris position (MJD).
    pub mjd: f64,
}

/// Finds known minor planets near a position.
pub trait EphemerisMatcher: Send + Sync {
    /// Nearest object within `radius_arcsec` of (ra, dec) at `mjd`.
    fn nearest(
        &self,
        ra: f64,
        dec: f64,
        mjd: f64,
        radius_arcsec: f64,
    ) -> Result<Option<MinorPlanetMatch>, CatalogError>;
}

/// One tabulated ephemeris position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EphemerisEntry {
    pub name: String,
    pub mjd: f64,
    pub ra: f64,
    pub dec: f64,
}

/// Matcher over a fixed table of ephemeris positions.
///
/// An entry is eligible when its epoch is within `time_tolerance_days` of the
/// requested epoch.
#[derive(Debug, Clone)]
pub struct StaticEphemeris {
    entries: Vec<EphemerisEntry>,
    time_tolerance_days: f64,
}

impl StaticEphemeris {
    pub fn new(entries: Vec<EphemerisEntry>, time_tolerance_days: f64) -> Self {
        Self {
            entries,
            time_tolerance_days,
        }
    }
}

impl EphemerisMatcher for StaticEphemeris {
    fn nearest(
        &self,
        ra: f64,
        dec: f64,
        mjd: f64,
        radius_arcsec: f64,
    ) -> Result<Option<MinorPlanetMatch>, CatalogError> {
        let best = self
            .entries
            .iter()
            .filter(|e| (e.mjd - mjd).abs() <= self.time_tolerance_days)
            .map(|e| (e, separation_arcsec(ra, dec, e.ra, e.dec)))
            .filter(|(_, sep)| *sep <= radius_arcsec)
            .min_by(|a, b| a.1.total_cmp(&b.1));

        Ok(best.map(|(e, sep)| MinorPlanetMatch {
            name: e.name.clone(),
            separation_arcsec: sep,
            mjd: e.mjd,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, mjd: f64, dec_offset_arcsec: f64) -> EphemerisEntry {
        EphemerisEntry {
            name: name.to_string(),
            mjd,
            ra: 150.0,
            dec: 10.0 + dec_offset_arcsec / 3600.0,
        }
    }

    #[test]
    fn picks_nearest_within_radius_and_epoch() {
        let eph = StaticEphemeris::new(
            vec![
                entry("(433) Eros", 60000.0, 12.0),
                entry("(4) Vesta", 60000.2, 4.0),
                entry("(1) Ceres", 60010.0, 1.0),
            ],
            0.5,
        );
        let m = eph.nearest(150.0, 10.0, 60000.1, 30.0).unwrap().unwrap();
        assert_eq!(m.name, "(4) Vesta");
        assert!((m.separation_arcsec - 4.0).abs() < 1e-6);
    }

    #[test]
    fn nothing_outside_radius() {
        let eph = StaticEphemeris::new(vec![entry("(433) Eros", 60000.0, 40.0)], 0.5);
        assert!(eph.nearest(150.0, 10.0, 60000.0, 30.0).unwrap().is_none());
    }
}
