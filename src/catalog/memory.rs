//! In-memory catalog backed by a fixed row list.

use crate::catalog::{CatalogError, CatalogRow, Queryable};
use crate::sky::separation_arcsec;

/// A catalog whose rows are held in memory. Used by scenario files, the demo
/// generator and tests.
#[derive(Debug, Clone)]
pub struct StaticCatalog {
    name: String,
    rows: Vec<CatalogRow>,
    outage: Option<String>,
}

impl StaticCatalog {
    pub fn new(name: impl Into<String>, rows: Vec<CatalogRow>) -> Self {
        Self {
            name: name.into(),
            rows,
            outage: None,
        }
    }

    /// A catalog that fails every query with `reason`.
    pub fn unavailable(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: Vec::new(),
            outage: Some(reason.into()),
        }
    }
}

impl Queryable for StaticCatalog {
    fn name(&self) -> &str {
        &self.name
    }

    fn query(
        &self,
        ra: f64,
        dec: f64,
        radius_arcsec: f64,
    ) -> Result<Vec<CatalogRow>, CatalogError> {
        if let Some(reason) = &self.outage {
            return Err(CatalogError::Unavailable(reason.clone()));
        }
        Ok(self
            .rows
            .iter()
            .filter(|row| match row.position() {
                Some((r, d)) => separation_arcsec(ra, dec, r, d) <= radius_arcsec,
                // Rows without a position cannot be placed; the cone still
                // returns them so the caller decides.
                None => true,
            })
            .cloned()
            .collect())
    }
}
