//! Minor-planet screening.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::catalog::{EphemerisMatcher, MinorPlanetMatch};
use crate::domain::{to_mjd, PhotometryPoint};

/// A known solar-system object found at the candidate position.
#[derive(Debug, Clone, PartialEq)]
pub struct MinorPlanetHit {
    pub object: MinorPlanetMatch,
    /// Epoch (MJD) of the detection the ephemeris was queried at.
    pub detection_mjd: f64,
}

/// Epoch (MJD) of the earliest detection at or after `event_time`, if any.
pub fn first_detection_mjd(
    photometry: &[PhotometryPoint],
    event_time: &DateTime<Utc>,
) -> Option<f64> {
    photometry
        .iter()
        .filter(|p| p.is_detection() && p.timestamp >= *event_time)
        .map(|p| p.timestamp)
        .min()
        .map(|ts| to_mjd(&ts))
}

/// Look for a known solar-system object at the candidate position at the
/// epoch of its first post-discovery detection.
///
/// Without detections (or without a matcher) the check is skipped. A failing
/// matcher is logged and treated as "no match".
pub fn screen(
    matcher: Option<&dyn EphemerisMatcher>,
    ra: f64,
    dec: f64,
    photometry: &[PhotometryPoint],
    event_time: &DateTime<Utc>,
    radius_arcsec: f64,
) -> Option<MinorPlanetHit> {
    let Some(matcher) = matcher else {
        debug!("no ephemeris matcher configured; minor-planet check skipped");
        return None;
    };
    let Some(mjd) = first_detection_mjd(photometry, event_time) else {
        debug!("no post-discovery detections; minor-planet check skipped");
        return None;
    };

    match matcher.nearest(ra, dec, mjd, radius_arcsec) {
        Ok(Some(m)) => {
            info!(
                object = %m.name,
                separation = m.separation_arcsec,
                mjd,
                "minor-planet match"
            );
            Some(MinorPlanetHit {
                object: m,
                detection_mjd: mjd,
            })
        }
        Ok(None) => None,
        Err(e) => {
            warn!(error = %e, "ephemeris lookup failed; treating as no match");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogError, EphemerisEntry, StaticEphemeris};
    use crate::domain::Measurement;
    use chrono::TimeZone;

    struct Broken;

    impl EphemerisMatcher for Broken {
        fn nearest(
            &self,
            _ra: f64,
            _dec: f64,
            _mjd: f64,
            _radius: f64,
        ) -> Result<Option<MinorPlanetMatch>, CatalogError> {
            Err(CatalogError::Network("connection reset".to_string()))
        }
    }

    fn obs(day: u32, detection: bool) -> PhotometryPoint {
        PhotometryPoint {
            timestamp: Utc.with_ymd_and_hms(2024, 3, day, 0, 0, 0).unwrap(),
            filter: "r".to_string(),
            measurement: if detection {
                Measurement::Magnitude {
                    mag: 19.0,
                    error: 0.1,
                }
            } else {
                Measurement::Limit { mag: 21.0 }
            },
            telescope: None,
        }
    }

    fn event_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn mjd_of(day: u32) -> f64 {
        to_mjd(&Utc.with_ymd_and_hms(2024, 3, day, 0, 0, 0).unwrap())
    }

    fn phaethon_at(mjd: f64) -> StaticEphemeris {
        StaticEphemeris::new(
            vec![EphemerisEntry {
                name: "(3200) Phaethon".to_string(),
                mjd,
                ra: 80.0,
                dec: 20.0 + 5.0 / 3600.0,
            }],
            0.5,
        )
    }

    #[test]
    fn epoch_is_earliest_detection_not_earliest_limit() {
        let phot = vec![obs(5, true), obs(2, false), obs(3, true)];
        let mjd = first_detection_mjd(&phot, &event_time()).unwrap();
        assert!((mjd - mjd_of(3)).abs() < 1e-9);
    }

    #[test]
    fn epoch_ignores_prediscovery_detections() {
        let early = PhotometryPoint {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            ..obs(1, true)
        };
        let phot = vec![early, obs(4, true)];
        let mjd = first_detection_mjd(&phot, &event_time()).unwrap();
        assert!((mjd - mjd_of(4)).abs() < 1e-9);

        let hit = screen(Some(&phaethon_at(mjd_of(4))), 80.0, 20.0, &phot, &event_time(), 30.0);
        assert_eq!(hit.unwrap().object.name, "(3200) Phaethon");
    }

    #[test]
    fn hit_carries_the_detection_epoch() {
        // Ephemeris row 0.4 d after the detection, inside the 0.5 d tolerance.
        let eph = phaethon_at(mjd_of(3) + 0.4);
        let hit = screen(Some(&eph), 80.0, 20.0, &[obs(3, true)], &event_time(), 30.0).unwrap();
        assert!((hit.detection_mjd - mjd_of(3)).abs() < 1e-9);
        assert!((hit.object.mjd - (mjd_of(3) + 0.4)).abs() < 1e-9);
    }

    #[test]
    fn skipped_without_detections() {
        let eph = StaticEphemeris::new(vec![], 0.5);
        assert!(screen(Some(&eph), 80.0, 20.0, &[obs(2, false)], &event_time(), 30.0).is_none());
    }

    #[test]
    fn matcher_failure_is_not_a_match() {
        assert!(screen(Some(&Broken), 80.0, 20.0, &[obs(3, true)], &event_time(), 30.0).is_none());
    }
}
