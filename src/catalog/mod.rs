//! Catalog collaborators.
//!
//! Every catalog (point-source or galaxy, local or remote) is reached through
//! the `Queryable` capability: a name plus a cone search with per-call
//! parameters. Rows come back materialized; the vetting stages normalize and
//! filter them.
//!
//! Minor-planet lookups go through `EphemerisMatcher`.

pub mod ephemeris;
pub mod http;
pub mod memory;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::AsymmetricError;

pub use ephemeris::{EphemerisEntry, EphemerisMatcher, MinorPlanetMatch, StaticEphemeris};
pub use http::HttpCatalog;
pub use memory::StaticCatalog;

/// Catalog client errors.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out after {0} attempts")]
    Timeout(usize),

    #[error("service returned status {0}")]
    Status(u16),

    #[error("failed to parse response: {0}")]
    Parse(String),

    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}

/// One raw catalog row. Fields a catalog does not provide are `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogRow {
    pub name: String,
    pub ra: Option<f64>,
    pub dec: Option<f64>,
    pub magnitude: Option<f64>,
    pub magnitude_band: Option<String>,
    pub redshift: Option<f64>,
    pub redshift_err: Option<AsymmetricError>,
    /// Luminosity distance (Mpc).
    pub distance: Option<f64>,
    pub distance_err: Option<AsymmetricError>,
}

impl CatalogRow {
    /// Position, if the row has a usable one.
    pub fn position(&self) -> Option<(f64, f64)> {
        match (self.ra, self.dec) {
            (Some(ra), Some(dec)) if ra.is_finite() && dec.is_finite() => Some((ra, dec)),
            _ => None,
        }
    }
}

/// A searchable catalog.
pub trait Queryable: Send + Sync {
    fn name(&self) -> &str;

    /// Rows within `radius_arcsec` of (ra, dec) in degrees.
    fn query(&self, ra: f64, dec: f64, radius_arcsec: f64) -> Result<Vec<CatalogRow>, CatalogError>;
}
