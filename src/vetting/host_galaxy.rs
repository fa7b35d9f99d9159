//! Host-galaxy cross-matching.
//!
//! Every galaxy catalog is cone-searched around the candidate. Rows are
//! normalized onto a common distance axis, ranked by the probability of
//! chance coincidence (PCC, Bloom et al. 2002) and filtered:
//!
//! ```text
//! sigma(m) = 1 / (0.33 ln 10) · 10^(0.33 (m − 24) − 2.44)   [arcsec⁻²]
//! PCC      = 1 − exp(−π r² sigma(m))
//! ```

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::catalog::{CatalogRow, Queryable};
use crate::domain::{AsymmetricError, HostGalaxyCandidate, VetConfig};
use crate::math::cosmology::Cosmology;
use crate::sky::separation_arcsec;

/// Surface density of galaxies brighter than `mag` (arcsec⁻²).
pub fn galaxy_surface_density(mag: f64) -> f64 {
    10f64.powf(0.33 * (mag - 24.0) - 2.44) / (0.33 * std::f64::consts::LN_10)
}

/// Probability that a galaxy of magnitude `mag` lies within `offset_arcsec`
/// by chance.
pub fn pcc(offset_arcsec: f64, mag: f64) -> f64 {
    let sigma = galaxy_surface_density(mag);
    1.0 - (-std::f64::consts::PI * offset_arcsec * offset_arcsec * sigma).exp()
}

/// Thread pool for the catalog fan-out, sized to the catalog count. `None`
/// without catalogs, or when the pool cannot be built (queries then run
/// sequentially).
pub fn catalog_pool(n_catalogs: usize) -> Option<ThreadPool> {
    if n_catalogs == 0 {
        return None;
    }
    match ThreadPoolBuilder::new().num_threads(n_catalogs).build() {
        Ok(pool) => Some(pool),
        Err(e) => {
            warn!(error = %e, "catalog pool unavailable; catalogs will be queried sequentially");
            None
        }
    }
}

/// Run the cone search on every catalog (concurrently on `pool` when given),
/// preserving catalog order in the output. Failing catalogs are logged and
/// dropped.
pub fn query_catalogs(
    catalogs: &[Box<dyn Queryable>],
    pool: Option<&ThreadPool>,
    ra: f64,
    dec: f64,
    radius_arcsec: f64,
) -> Vec<(String, Vec<CatalogRow>)> {
    let run = |catalog: &Box<dyn Queryable>| match catalog.query(ra, dec, radius_arcsec) {
        Ok(rows) => {
            debug!(catalog = catalog.name(), rows = rows.len(), "galaxy cone search");
            Some((catalog.name().to_string(), rows))
        }
        Err(e) => {
            warn!(catalog = catalog.name(), error = %e, "galaxy catalog skipped");
            None
        }
    };

    let results: Vec<Option<(String, Vec<CatalogRow>)>> = match pool {
        Some(pool) => pool.install(|| catalogs.par_iter().map(run).collect()),
        None => catalogs.iter().map(run).collect(),
    };

    results.into_iter().flatten().collect()
}

/// Turn a raw row into a host candidate, or `None` if it is unusable.
///
/// Redshift-only rows get a luminosity distance (and its asymmetric error)
/// from `cosmology`. Rows without magnitude, position or distance are
/// dropped, as are rows with a known redshift below `min_redshift`.
pub fn normalize_row(
    row: &CatalogRow,
    catalog: &str,
    ra: f64,
    dec: f64,
    cosmology: &Cosmology,
    min_redshift: f64,
) -> Option<HostGalaxyCandidate> {
    let (g_ra, g_dec) = row.position()?;
    let magnitude = row.magnitude.filter(|m| m.is_finite())?;
    let redshift = row.redshift.filter(|z| z.is_finite());
    if let Some(z) = redshift {
        if z < min_redshift {
            return None;
        }
    }

    let (distance, distance_err) = match row.distance.filter(|d| d.is_finite() && *d > 0.0) {
        Some(d) => (d, row.distance_err.unwrap_or(AsymmetricError::symmetric(0.0))),
        None => {
            let z = redshift?;
            let d = cosmology.luminosity_distance(z);
            let err = row
                .redshift_err
                .map(|e| {
                    let lo = cosmology.luminosity_distance((z - e.neg).max(0.0));
                    let hi = cosmology.luminosity_distance(z + e.pos);
                    AsymmetricError {
                        neg: d - lo,
                        pos: hi - d,
                    }
                })
                .unwrap_or(AsymmetricError::symmetric(0.0));
            (d, err)
        }
    };

    let offset = separation_arcsec(ra, dec, g_ra, g_dec);
    Some(HostGalaxyCandidate {
        name: row.name.clone(),
        ra: g_ra,
        dec: g_dec,
        offset_arcsec: offset,
        magnitude,
        magnitude_band: row.magnitude_band.clone(),
        redshift,
        redshift_err: row.redshift_err,
        distance,
        distance_err,
        catalog: catalog.to_string(),
        pcc: pcc(offset, magnitude),
    })
}

/// Keep hosts with `PCC <= max(threshold, min PCC)` sorted by ascending PCC
/// (ties by offset, then name).
pub fn filter_by_pcc(
    mut hosts: Vec<HostGalaxyCandidate>,
    threshold: f64,
) -> Vec<HostGalaxyCandidate> {
    let min_pcc = hosts.iter().map(|h| h.pcc).fold(f64::INFINITY, f64::min);
    let effective = threshold.max(if min_pcc.is_finite() { min_pcc } else { threshold });
    hosts.retain(|h| h.pcc <= effective);
    hosts.sort_by(|a, b| {
        a.pcc
            .total_cmp(&b.pcc)
            .then(a.offset_arcsec.total_cmp(&b.offset_arcsec))
            .then_with(|| a.name.cmp(&b.name))
    });
    hosts
}

/// Cone-search, normalize and PCC-filter host galaxies around (ra, dec).
pub fn match_hosts(
    catalogs: &[Box<dyn Queryable>],
    pool: Option<&ThreadPool>,
    ra: f64,
    dec: f64,
    config: &VetConfig,
) -> Vec<HostGalaxyCandidate> {
    let radius = config.host_search_radius_arcsec();
    let mut hosts = Vec::new();
    let mut n_rows = 0usize;
    for (catalog, rows) in query_catalogs(catalogs, pool, ra, dec, radius) {
        n_rows += rows.len();
        hosts.extend(rows.iter().filter_map(|row| {
            normalize_row(row, &catalog, ra, dec, &config.cosmology, config.min_host_redshift)
        }));
    }
    let usable = hosts.len();
    let hosts = filter_by_pcc(hosts, config.pcc_threshold);
    info!(rows = n_rows, usable, kept = hosts.len(), "host-galaxy match");
    hosts
}

/// JSON summary persisted on the target. Distance and redshift errors are
/// always `[neg, pos]` pairs.
pub fn host_summary(hosts: &[HostGalaxyCandidate]) -> serde_json::Value {
    let entries: Vec<serde_json::Value> = hosts
        .iter()
        .map(|h| {
            let mut mags = serde_json::Map::new();
            let band = h.magnitude_band.clone().unwrap_or_else(|| "mag".to_string());
            mags.insert(band, json!(h.magnitude));
            json!({
                "ID": h.name,
                "PCC": h.pcc,
                "Offset": h.offset_arcsec,
                "RA": h.ra,
                "Dec": h.dec,
                "Dist": h.distance,
                "DistErr": h.distance_err,
                "z": h.redshift,
                "zErr": h.redshift_err,
                "Mags": mags,
                "Source": h.catalog,
            })
        })
        .collect();
    serde_json::Value::Array(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StaticCatalog;

    fn host(name: &str, pcc: f64, offset: f64) -> HostGalaxyCandidate {
        HostGalaxyCandidate {
            name: name.to_string(),
            ra: 0.0,
            dec: 0.0,
            offset_arcsec: offset,
            magnitude: 18.0,
            magnitude_band: None,
            redshift: None,
            redshift_err: None,
            distance: 100.0,
            distance_err: AsymmetricError::symmetric(10.0),
            catalog: "glade".to_string(),
            pcc,
        }
    }

    fn galaxy(name: &str, dec_offset_arcsec: f64, mag: Option<f64>, z: Option<f64>) -> CatalogRow {
        CatalogRow {
            name: name.to_string(),
            ra: Some(200.0),
            dec: Some(-30.0 + dec_offset_arcsec / 3600.0),
            magnitude: mag,
            redshift: z,
            ..CatalogRow::default()
        }
    }

    #[test]
    fn pcc_grows_with_offset_and_faintness() {
        assert!(pcc(1.0, 18.0) < pcc(10.0, 18.0));
        assert!(pcc(5.0, 16.0) < pcc(5.0, 22.0));
        assert_eq!(pcc(0.0, 20.0), 0.0);
        assert!(pcc(1e4, 20.0) > 0.999);
    }

    #[test]
    fn threshold_relaxes_to_minimum_pcc() {
        let hosts = vec![host("a", 0.4, 10.0), host("b", 0.35, 12.0), host("c", 0.9, 5.0)];
        let kept = filter_by_pcc(hosts, 0.1);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].name, "b");
    }

    #[test]
    fn kept_hosts_are_sorted_with_ties_by_offset_then_name() {
        let hosts = vec![
            host("z", 0.05, 3.0),
            host("y", 0.05, 3.0),
            host("x", 0.05, 1.0),
            host("w", 0.01, 9.0),
        ];
        let kept = filter_by_pcc(hosts, 0.1);
        let names: Vec<&str> = kept.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, ["w", "x", "y", "z"]);
    }

    fn normalize(row: &CatalogRow) -> Option<HostGalaxyCandidate> {
        normalize_row(row, "glade", 200.0, -30.0, &Cosmology::default(), 0.02)
    }

    #[test]
    fn normalization_drops_unusable_rows() {
        // No magnitude.
        assert!(normalize(&galaxy("g1", 5.0, None, Some(0.05))).is_none());
        // Redshift below the cut.
        assert!(normalize(&galaxy("g2", 5.0, Some(17.0), Some(0.01))).is_none());
        // No distance and no redshift.
        assert!(normalize(&galaxy("g3", 5.0, Some(17.0), None)).is_none());

        let h = normalize(&galaxy("g4", 5.0, Some(17.0), Some(0.05))).unwrap();
        assert!((h.distance - Cosmology::default().luminosity_distance(0.05)).abs() < 1e-9);
        assert!((h.offset_arcsec - 5.0).abs() < 1e-6);
    }

    #[test]
    fn redshift_error_maps_to_asymmetric_distance_error() {
        let c = Cosmology::default();
        let mut row = galaxy("g", 2.0, Some(17.0), Some(0.1));
        row.redshift_err = Some(AsymmetricError::symmetric(0.01));
        let h = normalize_row(&row, "glade", 200.0, -30.0, &c, 0.02).unwrap();
        // D_L is convex in z, so the upper error is larger.
        assert!(h.distance_err.pos > h.distance_err.neg);
        assert!(h.distance_err.neg > 0.0);
    }

    fn three_catalogs() -> Vec<Box<dyn Queryable>> {
        vec![
            Box::new(StaticCatalog::new("first", vec![galaxy("a", 1.0, Some(17.0), Some(0.05))])),
            Box::new(StaticCatalog::unavailable("broken", "503")),
            Box::new(StaticCatalog::new("third", vec![galaxy("b", 1.0, Some(17.0), Some(0.05))])),
        ]
    }

    #[test]
    fn failing_catalog_is_skipped_and_order_is_preserved() {
        let catalogs = three_catalogs();
        let pool = catalog_pool(catalogs.len()).unwrap();
        assert_eq!(pool.current_num_threads(), 3);

        let parallel = query_catalogs(&catalogs, Some(&pool), 200.0, -30.0, 300.0);
        let names: Vec<&str> = parallel.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["first", "third"]);

        let sequential = query_catalogs(&catalogs, None, 200.0, -30.0, 300.0);
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn one_pool_serves_repeated_matches() {
        let catalogs = three_catalogs();
        let pool = catalog_pool(catalogs.len());
        let config = VetConfig::default();
        for _ in 0..3 {
            let hosts = match_hosts(&catalogs, pool.as_ref(), 200.0, -30.0, &config);
            assert_eq!(hosts.len(), 2);
        }
        assert!(catalog_pool(0).is_none());
    }

    #[test]
    fn summary_always_emits_error_pairs() {
        let mut h = host("g", 0.01, 1.0);
        h.redshift = Some(0.05);
        h.redshift_err = Some(AsymmetricError::symmetric(0.002));
        let summary = host_summary(&[h]);
        let entry = &summary[0];
        assert_eq!(entry["DistErr"], json!([10.0, 10.0]));
        assert_eq!(entry["zErr"], json!([0.002, 0.002]));
        assert_eq!(entry["ID"], json!("g"));
    }
}
