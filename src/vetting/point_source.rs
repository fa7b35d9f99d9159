//! Point-source screening: a stellar or variable source coincident with the
//! candidate disqualifies it.

use tracing::{info, warn};

use crate::catalog::Queryable;
use crate::sky::separation_arcsec;

/// A coincident point source.
#[derive(Debug, Clone, PartialEq)]
pub struct PointSourceMatch {
    pub catalog: String,
    pub name: String,
    pub separation_arcsec: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointSourceOutcome {
    /// 0 on a match, 1 otherwise.
    pub score: f64,
    pub matched: Option<PointSourceMatch>,
}

/// Query `catalogs` in order and stop at the first non-empty cone.
///
/// A failing catalog is logged and skipped.
pub fn screen(
    catalogs: &[Box<dyn Queryable>],
    ra: f64,
    dec: f64,
    radius_arcsec: f64,
) -> PointSourceOutcome {
    for catalog in catalogs {
        let rows = match catalog.query(ra, dec, radius_arcsec) {
            Ok(rows) => rows,
            Err(e) => {
                warn!(catalog = catalog.name(), error = %e, "point-source catalog skipped");
                continue;
            }
        };

        let closest = rows
            .iter()
            .map(|row| {
                let sep = row
                    .position()
                    .map(|(r, d)| separation_arcsec(ra, dec, r, d));
                (row, sep)
            })
            .min_by(|a, b| {
                a.1.unwrap_or(f64::INFINITY)
                    .total_cmp(&b.1.unwrap_or(f64::INFINITY))
            });

        if let Some((row, sep)) = closest {
            info!(
                catalog = catalog.name(),
                source = %row.name,
                separation = ?sep,
                "point-source match"
            );
            return PointSourceOutcome {
                score: 0.0,
                matched: Some(PointSourceMatch {
                    catalog: catalog.name().to_string(),
                    name: row.name.clone(),
                    separation_arcsec: sep,
                }),
            };
        }
    }

    PointSourceOutcome {
        score: 1.0,
        matched: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogError, CatalogRow, StaticCatalog};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counting {
        inner: StaticCatalog,
        calls: Arc<AtomicUsize>,
    }

    impl Queryable for Counting {
        fn name(&self) -> &str {
            self.inner.name()
        }

        fn query(&self, ra: f64, dec: f64, r: f64) -> Result<Vec<CatalogRow>, CatalogError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.query(ra, dec, r)
        }
    }

    fn star(name: &str, dec: f64) -> CatalogRow {
        CatalogRow {
            name: name.to_string(),
            ra: Some(40.0),
            dec: Some(dec),
            ..CatalogRow::default()
        }
    }

    #[test]
    fn match_at_one_arcsec_scores_zero_and_short_circuits() {
        let later_calls = Arc::new(AtomicUsize::new(0));
        let catalogs: Vec<Box<dyn Queryable>> = vec![
            Box::new(StaticCatalog::new("gaia", vec![star("star-1", -5.0 + 1.0 / 3600.0)])),
            Box::new(Counting {
                inner: StaticCatalog::new("ps1", vec![]),
                calls: later_calls.clone(),
            }),
        ];

        let out = screen(&catalogs, 40.0, -5.0, 2.0);
        assert_eq!(out.score, 0.0);
        let m = out.matched.unwrap();
        assert_eq!(m.catalog, "gaia");
        assert_eq!(m.name, "star-1");
        assert!((m.separation_arcsec.unwrap() - 1.0).abs() < 1e-6);
        assert_eq!(later_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn failing_catalog_is_skipped() {
        let catalogs: Vec<Box<dyn Queryable>> = vec![
            Box::new(StaticCatalog::unavailable("gaia", "timeout")),
            Box::new(StaticCatalog::new("ps1", vec![star("star-2", -5.0)])),
        ];
        let out = screen(&catalogs, 40.0, -5.0, 2.0);
        assert_eq!(out.score, 0.0);
        assert_eq!(out.matched.unwrap().catalog, "ps1");
    }

    #[test]
    fn empty_cones_score_one() {
        let catalogs: Vec<Box<dyn Queryable>> = vec![Box::new(StaticCatalog::new(
            "gaia",
            vec![star("far", -4.9)],
        ))];
        let out = screen(&catalogs, 40.0, -5.0, 2.0);
        assert_eq!(out.score, 1.0);
        assert!(out.matched.is_none());
    }
}
