//! The candidate-vetting pipeline.
//!
//! Stages run in a fixed order for one candidate:
//!
//! 1. skymap association (fatal without a localization)
//! 2. point-source screen
//! 3. minor-planet screen
//! 4. host-galaxy match
//! 5. distance consistency
//! 6. photometric analysis (fatal only when no light-curve model fits)
//! 7. pre-discovery screen
//! 8. aggregation into the integer priority
//!
//! Stages 1–3 can end the run early with priority 0. A run starts by clearing
//! the candidate's earlier results. Every factor computed along the way is
//! then written to the sink (and mirrored on the `Candidate`) as soon as it is
//! known, so a fatal error leaves that run's earlier factors in place.

pub mod aggregate;
pub mod distance;
pub mod host_galaxy;
pub mod minor_planet;
pub mod photometric;
pub mod point_source;
pub mod predetection;
pub mod skymap;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use rayon::ThreadPool;
use tracing::{info, info_span, warn};

use crate::catalog::{EphemerisMatcher, Queryable};
use crate::domain::{
    dedup_photometry, keys, Candidate, FactorValue, HostGalaxyCandidate, VetConfig,
};
use crate::error::{AppError, ErrorKind};
use crate::store::{PhotometryStore, ScoreSink, SkymapStore};

pub use aggregate::{combine, priority_from_factors, EarlyExit, SubScores};
pub use distance::DistanceGrid;
pub use minor_planet::MinorPlanetHit;
pub use photometric::PhotometricOutcome;
pub use point_source::PointSourceMatch;
pub use predetection::PredetectionOutcome;
pub use skymap::SkymapAssociation;

/// External collaborators used by a `Vetter`.
pub struct Collaborators<'a> {
    pub skymaps: &'a dyn SkymapStore,
    pub photometry: &'a dyn PhotometryStore,
    pub sink: &'a dyn ScoreSink,
    /// Queried in order; the first match wins.
    pub point_source_catalogs: &'a [Box<dyn Queryable>],
    pub galaxy_catalogs: &'a [Box<dyn Queryable>],
    pub ephemeris: Option<&'a dyn EphemerisMatcher>,
}

/// Everything one run produced, for reports and export.
#[derive(Debug, Clone)]
pub struct VetReport {
    pub target_name: String,
    pub event_id: String,
    pub priority: u8,
    pub scores: SubScores,
    pub early_exit: Option<EarlyExit>,
    pub skymap: SkymapAssociation,
    pub point_source_match: Option<PointSourceMatch>,
    pub minor_planet_match: Option<MinorPlanetHit>,
    pub hosts: Vec<HostGalaxyCandidate>,
    pub photometric: Option<PhotometricOutcome>,
    pub predetection: Option<PredetectionOutcome>,
}

/// Runs the pipeline with a fixed configuration and set of collaborators.
pub struct Vetter<'a> {
    config: VetConfig,
    collab: Collaborators<'a>,
    grid: DistanceGrid,
    catalog_pool: Option<ThreadPool>,
}

impl<'a> Vetter<'a> {
    pub fn new(config: VetConfig, collab: Collaborators<'a>) -> Result<Self, AppError> {
        config.validate()?;
        let grid = DistanceGrid::from_config(&config);
        let catalog_pool = host_galaxy::catalog_pool(collab.galaxy_catalogs.len());
        Ok(Self {
            config,
            collab,
            grid,
            catalog_pool,
        })
    }

    pub fn config(&self) -> &VetConfig {
        &self.config
    }

    fn record(
        &self,
        candidate: &mut Candidate,
        key: &str,
        value: impl Into<FactorValue>,
    ) -> Result<(), AppError> {
        let value = value.into();
        self.collab
            .sink
            .upsert_factor(&candidate.key(), key, value.clone())?;
        candidate.upsert_factor(key, value);
        Ok(())
    }

    fn finish(&self, candidate: &mut Candidate, priority: u8) -> Result<(), AppError> {
        self.collab.sink.set_priority(&candidate.key(), priority)?;
        candidate.priority = Some(priority);
        Ok(())
    }

    /// Vet one candidate. `cutoff` limits which localization is authoritative.
    pub fn vet(
        &self,
        candidate: &mut Candidate,
        cutoff: Option<DateTime<Utc>>,
    ) -> Result<VetReport, AppError> {
        let span = info_span!(
            "vet",
            candidate = %candidate.target.name,
            event = %candidate.event_id
        );
        let _guard = span.enter();

        let config = &self.config;
        let (ra, dec) = (candidate.target.ra, candidate.target.dec);
        let event_id = candidate.event_id.clone();

        self.collab.sink.clear_results(&candidate.key())?;
        candidate.reset();

        let event = self.collab.skymaps.event(&event_id)?.ok_or_else(|| {
            AppError::new(
                ErrorKind::LocalizationNotFound,
                format!("Unknown event {event_id}."),
            )
        })?;

        // 1. Skymap.
        let skymap = skymap::associate(self.collab.skymaps, &event_id, ra, dec, cutoff)?;
        let mut scores = SubScores {
            skymap: skymap.score,
            ..SubScores::default()
        };
        self.record(candidate, keys::SKYMAP_SCORE, skymap.score)?;

        let mut report = VetReport {
            target_name: candidate.target.name.clone(),
            event_id: event_id.clone(),
            priority: 0,
            scores,
            early_exit: None,
            skymap,
            point_source_match: None,
            minor_planet_match: None,
            hosts: Vec::new(),
            photometric: None,
            predetection: None,
        };

        if scores.skymap < config.skymap_threshold {
            return self.exit_early(candidate, report, EarlyExit::SkymapBelowThreshold);
        }

        // 2. Point sources.
        let ps = point_source::screen(
            self.collab.point_source_catalogs,
            ra,
            dec,
            config.point_source_radius_arcsec,
        );
        scores.point_source = ps.score;
        report.scores = scores;
        self.record(candidate, keys::PS_SCORE, ps.score)?;
        if let Some(m) = ps.matched {
            self.record(candidate, keys::PS_MATCH_CATALOG, m.catalog.as_str())?;
            self.record(candidate, keys::PS_MATCH_NAME, m.name.as_str())?;
            report.point_source_match = Some(m);
            return self.exit_early(candidate, report, EarlyExit::PointSourceMatch);
        }

        // 3. Minor planets.
        let photometry = dedup_photometry(self.collab.photometry.photometry(candidate.target.id)?);
        if let Some(hit) = minor_planet::screen(
            self.collab.ephemeris,
            ra,
            dec,
            &photometry,
            &event.event_time,
            config.minor_planet_radius_arcsec,
        ) {
            self.record(candidate, keys::MPC_MATCH_NAME, hit.object.name.as_str())?;
            self.record(candidate, keys::MPC_MATCH_SEP, hit.object.separation_arcsec)?;
            self.record(candidate, keys::MPC_MATCH_DATE, hit.detection_mjd)?;
            scores.minor_planet = 0.0;
            report.scores = scores;
            report.minor_planet_match = Some(hit);
            return self.exit_early(candidate, report, EarlyExit::MinorPlanetMatch);
        }

        // 4-5. Hosts and distance.
        let hosts = host_galaxy::match_hosts(
            self.collab.galaxy_catalogs,
            self.catalog_pool.as_ref(),
            ra,
            dec,
            config,
        );
        self.collab.sink.attach_target_extra(
            candidate.target.id,
            keys::HOST_GALAXIES_EXTRA,
            host_galaxy::host_summary(&hosts),
        )?;
        scores.host_distance = distance::host_distance_score(
            &hosts,
            report.skymap.distance_mean,
            report.skymap.distance_std,
            &self.grid,
        );
        report.hosts = hosts;
        report.scores = scores;
        self.record(candidate, keys::HOST_DISTANCE_SCORE, scores.host_distance)?;

        // 6. Photometry.
        let gw_distance = Some(report.skymap.distance_mean);
        let phot = photometric::analyze(&photometry, &event.event_time, gw_distance, config)?;
        if let Some(lum) = phot.peak_luminosity {
            self.record(candidate, keys::PHOT_PEAK_LUM, lum)?;
        }
        if let Some(fit) = &phot.fit {
            self.record(candidate, keys::PHOT_PEAK_TIME, fit.peak_time)?;
            self.record(candidate, keys::PHOT_DECAY_RATE, fit.decay_rate)?;
            self.record(candidate, keys::PHOT_MODEL, fit.best.model.name.label())?;
        }
        self.record(candidate, keys::PHOT_SCORE, phot.score)?;
        scores.photometric = phot.score;
        report.photometric = Some(phot);

        // 7. Pre-discovery history.
        let pre = predetection::screen(&photometry, &event.event_time, config);
        self.record(candidate, keys::PREDETECTION_SCORE, pre.score)?;
        self.record(
            candidate,
            keys::PREDETECTION_MAX_DETECTIONS,
            pre.max_detections as f64,
        )?;
        scores.predetection = pre.score;
        report.predetection = Some(pre);

        // 8. Aggregate.
        let priority = combine(&scores, None);
        self.finish(candidate, priority)?;
        report.scores = scores;
        report.priority = priority;
        info!(priority, score = scores.product(), "vetting complete");
        Ok(report)
    }

    fn exit_early(
        &self,
        candidate: &mut Candidate,
        mut report: VetReport,
        exit: EarlyExit,
    ) -> Result<VetReport, AppError> {
        info!(reason = exit.describe(), "early exit");
        let priority = combine(&report.scores, Some(exit));
        self.finish(candidate, priority)?;
        report.priority = priority;
        report.early_exit = Some(exit);
        Ok(report)
    }

    /// Vet many candidates in parallel. Each run is isolated; one failure does
    /// not affect the others. Results keep the input order.
    pub fn vet_batch(
        &self,
        candidates: Vec<Candidate>,
        cutoff: Option<DateTime<Utc>>,
    ) -> Vec<(Candidate, Result<VetReport, AppError>)> {
        candidates
            .into_par_iter()
            .map(|mut candidate| {
                let result = self.vet(&mut candidate, cutoff);
                if let Err(e) = &result {
                    warn!(candidate = %candidate.target.name, error = %e, "vetting failed");
                }
                (candidate, result)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogRow, EphemerisEntry, StaticCatalog, StaticEphemeris};
    use crate::domain::{
        to_mjd, Localization, Measurement, NonLocalizedEvent, PhotometryPoint, SkymapTile, Target,
        TILE_ORDER,
    };
    use crate::sky::healpix::{pixel_area, radec_to_nested};
    use crate::store::MemoryStore;
    use chrono::{Duration, TimeZone};

    const EVENT: &str = "S230518h";
    const RA: f64 = 150.0;
    const DEC: f64 = 10.0;
    const WIDTH: u64 = 1 << 40;

    fn event_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 5, 18, 12, 0, 0).unwrap()
    }

    /// A skymap on which the candidate at (RA, DEC) scores exactly `score`:
    /// its own tile holds `1 − score` and a diffuse, less dense tile holds
    /// the rest.
    fn localization(score: f64, distance: f64) -> Localization {
        let idx = radec_to_nested(RA, DEC, TILE_ORDER);
        let area = WIDTH as f64 * pixel_area(TILE_ORDER);
        Localization {
            id: 1,
            event_id: EVENT.to_string(),
            date: event_time(),
            distance_mean: distance,
            distance_std: distance * 0.2,
            tiles: vec![
                SkymapTile {
                    start: idx,
                    end: idx + WIDTH,
                    prob_density: (1.0 - score) / area,
                },
                SkymapTile {
                    start: 0,
                    end: 8 * WIDTH,
                    prob_density: score / (8.0 * area),
                },
            ],
        }
    }

    fn det(days: f64, mag: f64, error: f64) -> PhotometryPoint {
        PhotometryPoint {
            timestamp: event_time() + Duration::milliseconds((days * 86_400_000.0) as i64),
            filter: "r".to_string(),
            measurement: Measurement::Magnitude { mag, error },
            telescope: Some("ZTF".to_string()),
        }
    }

    fn target(id: i64) -> Target {
        Target {
            id,
            name: format!("AT2023x{id}"),
            ra: RA,
            dec: DEC,
        }
    }

    struct Fixture {
        store: MemoryStore,
        point_sources: Vec<Box<dyn Queryable>>,
        galaxies: Vec<Box<dyn Queryable>>,
        ephemeris: Option<StaticEphemeris>,
    }

    impl Fixture {
        fn new(skymap_score: f64) -> Self {
            let store = MemoryStore::new();
            store
                .insert_event(NonLocalizedEvent {
                    event_id: EVENT.to_string(),
                    event_time: event_time(),
                })
                .unwrap();
            store
                .insert_localization(localization(skymap_score, 40.0))
                .unwrap();
            Self {
                store,
                point_sources: Vec::new(),
                galaxies: Vec::new(),
                ephemeris: None,
            }
        }

        fn vetter(&self) -> Vetter<'_> {
            Vetter::new(
                VetConfig::default(),
                Collaborators {
                    skymaps: &self.store,
                    photometry: &self.store,
                    sink: &self.store,
                    point_source_catalogs: &self.point_sources,
                    galaxy_catalogs: &self.galaxies,
                    ephemeris: self.ephemeris.as_ref().map(|e| e as &dyn EphemerisMatcher),
                },
            )
            .unwrap()
        }

        fn run(&self, id: i64) -> (Candidate, Result<VetReport, AppError>) {
            let mut candidate = Candidate::new(target(id), EVENT);
            let result = self.vetter().vet(&mut candidate, None);
            (candidate, result)
        }
    }

    fn kilonova_photometry() -> Vec<PhotometryPoint> {
        vec![det(2.0, 17.5, 0.05), det(3.0, 18.0, 0.05), det(4.0, 18.5, 0.05)]
    }

    #[test]
    fn low_skymap_score_exits_with_only_skymap_factor() {
        let fx = Fixture::new(0.005);
        let (candidate, result) = fx.run(1);
        let report = result.unwrap();

        assert_eq!(report.priority, 0);
        assert_eq!(report.early_exit, Some(EarlyExit::SkymapBelowThreshold));
        assert_eq!(candidate.priority, Some(0));
        let stored = fx.store.factors(&candidate.key()).unwrap();
        assert_eq!(stored.keys().collect::<Vec<_>>(), [keys::SKYMAP_SCORE]);
        assert!((candidate.factor(keys::SKYMAP_SCORE).unwrap() - 0.005).abs() < 1e-9);
    }

    #[test]
    fn coincident_star_exits_with_point_source_factors() {
        let mut fx = Fixture::new(0.8);
        fx.point_sources.push(Box::new(StaticCatalog::new(
            "gaia_dr3",
            vec![CatalogRow {
                name: "Gaia 123".to_string(),
                ra: Some(RA),
                dec: Some(DEC + 1.0 / 3600.0),
                ..CatalogRow::default()
            }],
        )));
        let (candidate, result) = fx.run(1);
        let report = result.unwrap();

        assert_eq!(report.priority, 0);
        assert_eq!(candidate.factor(keys::PS_SCORE), Some(0.0));
        assert_eq!(
            candidate.factors.get(keys::PS_MATCH_NAME),
            Some(&FactorValue::Text("Gaia 123".to_string()))
        );
        assert!(candidate.factors.get(keys::HOST_DISTANCE_SCORE).is_none());
        assert_eq!(fx.store.priority(&candidate.key()).unwrap(), Some(0));
    }

    fn pallas_at(mjd: f64) -> StaticEphemeris {
        StaticEphemeris::new(
            vec![EphemerisEntry {
                name: "(2) Pallas".to_string(),
                mjd,
                ra: RA,
                dec: DEC + 3.0 / 3600.0,
            }],
            0.5,
        )
    }

    #[test]
    fn minor_planet_match_forces_zero_and_records_details() {
        let mut fx = Fixture::new(0.8);
        fx.store.insert_photometry(1, kilonova_photometry()).unwrap();
        let detected = to_mjd(&(event_time() + Duration::days(2)));
        // The tabulated position is 0.4 d later than the detection.
        fx.ephemeris = Some(pallas_at(detected + 0.4));
        let (candidate, result) = fx.run(1);

        assert_eq!(result.unwrap().priority, 0);
        assert!((candidate.factor(keys::MPC_MATCH_SEP).unwrap() - 3.0).abs() < 1e-6);
        assert!((candidate.factor(keys::MPC_MATCH_DATE).unwrap() - detected).abs() < 1e-9);
        assert_eq!(priority_from_factors(&candidate.factors, &VetConfig::default()), 0);
    }

    #[test]
    fn minor_planet_epoch_skips_old_detections() {
        let mut fx = Fixture::new(0.8);
        let mut phot = kilonova_photometry();
        phot.push(det(-60.0, 19.0, 0.05));
        fx.store.insert_photometry(1, phot).unwrap();
        fx.ephemeris = Some(pallas_at(to_mjd(&(event_time() + Duration::days(2)))));
        let (candidate, result) = fx.run(1);

        assert_eq!(result.unwrap().early_exit, Some(EarlyExit::MinorPlanetMatch));
        assert_eq!(candidate.priority, Some(0));
    }

    #[test]
    fn rerun_replaces_factors_from_an_earlier_match() {
        let mut fx = Fixture::new(0.8);
        fx.store.insert_photometry(1, kilonova_photometry()).unwrap();
        fx.ephemeris = Some(pallas_at(to_mjd(&(event_time() + Duration::days(2)))));
        let mut candidate = Candidate::new(target(1), EVENT);
        fx.vetter().vet(&mut candidate, None).unwrap();
        assert_eq!(candidate.priority, Some(0));

        fx.ephemeris = None;
        let report = fx.vetter().vet(&mut candidate, None).unwrap();
        assert_eq!(report.priority, 80);

        let stored = fx.store.factors(&candidate.key()).unwrap();
        assert!(!stored.contains_key(keys::MPC_MATCH_NAME));
        assert_eq!(stored, candidate.factors);
        assert_eq!(
            Some(priority_from_factors(&stored, &VetConfig::default())),
            fx.store.priority(&candidate.key()).unwrap()
        );
    }

    #[test]
    fn kilonova_without_hosts_keeps_skymap_priority() {
        let fx = Fixture::new(0.8);
        fx.store.insert_photometry(1, kilonova_photometry()).unwrap();
        let (candidate, result) = fx.run(1);
        let report = result.unwrap();

        assert_eq!(candidate.factor(keys::PHOT_SCORE), Some(1.0));
        assert_eq!(candidate.factor(keys::HOST_DISTANCE_SCORE), Some(1.0));
        assert_eq!(candidate.factor(keys::PREDETECTION_SCORE), Some(1.0));
        assert_eq!(
            candidate.factors.get(keys::PHOT_MODEL),
            Some(&FactorValue::Text("spl".to_string()))
        );
        assert_eq!(report.priority, 80);
        assert_eq!(
            priority_from_factors(&candidate.factors, &VetConfig::default()),
            report.priority
        );
        let summary = fx.store.target_extra(1, keys::HOST_GALAXIES_EXTRA).unwrap();
        assert_eq!(summary, Some(serde_json::json!([])));
    }

    #[test]
    fn clustered_predetections_are_penalized() {
        let fx = Fixture::new(0.8);
        fx.store
            .insert_photometry(
                1,
                vec![
                    det(-30.0, 18.0, 0.05),
                    det(-28.0, 18.1, 0.05),
                    det(-26.0, 18.0, 0.05),
                    det(-25.0, 17.9, 0.05),
                ],
            )
            .unwrap();
        let (candidate, result) = fx.run(1);
        let report = result.unwrap();

        assert_eq!(candidate.factor(keys::PREDETECTION_MAX_DETECTIONS), Some(4.0));
        assert_eq!(candidate.factor(keys::PREDETECTION_SCORE), Some(0.1));
        assert_eq!(report.priority, 8);
    }

    #[test]
    fn consistent_host_keeps_distance_score_high() {
        let mut fx = Fixture::new(0.8);
        fx.galaxies.push(Box::new(StaticCatalog::new(
            "glade+",
            vec![CatalogRow {
                name: "NGC 4993".to_string(),
                ra: Some(RA),
                dec: Some(DEC + 10.0 / 3600.0),
                magnitude: Some(12.5),
                magnitude_band: Some("B".to_string()),
                distance: Some(40.0),
                distance_err: Some(crate::domain::AsymmetricError::symmetric(8.0)),
                ..CatalogRow::default()
            }],
        )));
        let (candidate, result) = fx.run(1);
        let report = result.unwrap();

        assert_eq!(report.hosts.len(), 1);
        assert!(candidate.factor(keys::HOST_DISTANCE_SCORE).unwrap() > 0.99);
        let summary = fx.store.target_extra(1, keys::HOST_GALAXIES_EXTRA).unwrap().unwrap();
        assert_eq!(summary[0]["DistErr"], serde_json::json!([8.0, 8.0]));
        assert_eq!(summary[0]["Source"], serde_json::json!("glade+"));
    }

    #[test]
    fn missing_localization_is_fatal_and_records_nothing() {
        let fx = Fixture::new(0.8);
        let mut candidate = Candidate::new(target(1), "S000000x");
        let err = fx.vetter().vet(&mut candidate, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LocalizationNotFound);
        assert!(candidate.factors.is_empty());
        assert!(candidate.priority.is_none());
    }

    #[test]
    fn reruns_are_idempotent() {
        let fx = Fixture::new(0.6);
        fx.store.insert_photometry(1, kilonova_photometry()).unwrap();
        let (first, _) = fx.run(1);
        let (second, _) = fx.run(1);
        assert_eq!(first.factors, second.factors);
        assert_eq!(first.priority, second.priority);
        assert_eq!(fx.store.factors(&first.key()).unwrap(), second.factors);
    }

    #[test]
    fn batch_isolates_failures_and_keeps_order() {
        let fx = Fixture::new(0.8);
        let vetter = fx.vetter();
        let candidates = vec![
            Candidate::new(target(1), EVENT),
            Candidate::new(target(2), "S000000x"),
            Candidate::new(target(3), EVENT),
        ];
        let results = vetter.vet_batch(candidates, None);

        let ids: Vec<i64> = results.iter().map(|(c, _)| c.target.id).collect();
        assert_eq!(ids, [1, 2, 3]);
        assert!(results[0].1.is_ok());
        assert!(results[1].1.is_err());
        assert_eq!(results[2].0.priority, Some(80));
    }
}
