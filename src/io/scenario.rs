//! Scenario files.
//!
//! A scenario is a self-contained JSON bundle of everything one vetting run
//! needs: events, localizations, candidates, photometry, catalogs and
//! ephemerides. Loading one yields in-memory collaborators ready to hand to a
//! `Vetter`.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::catalog::{
    CatalogRow, EphemerisEntry, EphemerisMatcher, HttpCatalog, Queryable, StaticCatalog,
    StaticEphemeris,
};
use crate::domain::{Candidate, Localization, NonLocalizedEvent, PhotometryPoint, Target};
use crate::error::AppError;
use crate::store::MemoryStore;
use crate::vetting::Collaborators;

/// How a catalog in a scenario is backed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum CatalogSpec {
    /// Rows embedded in the scenario.
    Static {
        name: String,
        #[serde(default)]
        rows: Vec<CatalogRow>,
    },
    /// A catalog that always fails, for exercising degraded runs.
    Unavailable { name: String, reason: String },
    /// A remote cone-search service configured from `KNVET_*` variables.
    Http { name: String },
}

impl CatalogSpec {
    fn build(&self) -> Result<Box<dyn Queryable>, AppError> {
        Ok(match self {
            CatalogSpec::Static { name, rows } => Box::new(StaticCatalog::new(name, rows.clone())),
            CatalogSpec::Unavailable { name, reason } => {
                Box::new(StaticCatalog::unavailable(name, reason))
            }
            CatalogSpec::Http { name } => Box::new(HttpCatalog::from_env(name)?),
        })
    }
}

/// Tabulated minor-planet positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EphemerisSpec {
    #[serde(default = "default_time_tolerance")]
    pub time_tolerance_days: f64,
    pub entries: Vec<EphemerisEntry>,
}

fn default_time_tolerance() -> f64 {
    0.5
}

/// One target to vet against one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSpec {
    pub target: Target,
    pub event_id: String,
}

/// On-disk scenario schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    /// Localizations published after this are ignored.
    pub cutoff: Option<DateTime<Utc>>,
    pub events: Vec<NonLocalizedEvent>,
    pub localizations: Vec<Localization>,
    pub candidates: Vec<CandidateSpec>,
    /// Photometry keyed by target id.
    pub photometry: BTreeMap<i64, Vec<PhotometryPoint>>,
    pub point_source_catalogs: Vec<CatalogSpec>,
    pub galaxy_catalogs: Vec<CatalogSpec>,
    pub ephemeris: Option<EphemerisSpec>,
}

/// A scenario materialized into collaborators.
pub struct LoadedScenario {
    pub store: MemoryStore,
    pub candidates: Vec<Candidate>,
    pub point_source_catalogs: Vec<Box<dyn Queryable>>,
    pub galaxy_catalogs: Vec<Box<dyn Queryable>>,
    pub ephemeris: Option<StaticEphemeris>,
    pub cutoff: Option<DateTime<Utc>>,
}

impl LoadedScenario {
    /// Borrow the collaborators for a `Vetter`. The store serves as skymap
    /// source, photometry source and score sink.
    pub fn collaborators(&self) -> Collaborators<'_> {
        Collaborators {
            skymaps: &self.store,
            photometry: &self.store,
            sink: &self.store,
            point_source_catalogs: &self.point_source_catalogs,
            galaxy_catalogs: &self.galaxy_catalogs,
            ephemeris: self.ephemeris.as_ref().map(|e| e as &dyn EphemerisMatcher),
        }
    }

    /// Candidates for one target name, or all of them.
    pub fn select(&self, target: Option<&str>) -> Vec<Candidate> {
        self.candidates
            .iter()
            .filter(|c| target.is_none_or(|name| c.target.name == name))
            .cloned()
            .collect()
    }
}

impl Scenario {
    /// Build in-memory collaborators from this scenario.
    pub fn load(self) -> Result<LoadedScenario, AppError> {
        let store = MemoryStore::new();
        for event in self.events {
            store.insert_event(event)?;
        }
        for localization in self.localizations {
            store.insert_localization(localization)?;
        }
        for (target_id, points) in self.photometry {
            store.insert_photometry(target_id, points)?;
        }

        let point_source_catalogs = self
            .point_source_catalogs
            .iter()
            .map(CatalogSpec::build)
            .collect::<Result<Vec<_>, _>>()?;
        let galaxy_catalogs = self
            .galaxy_catalogs
            .iter()
            .map(CatalogSpec::build)
            .collect::<Result<Vec<_>, _>>()?;
        let ephemeris = self
            .ephemeris
            .map(|spec| StaticEphemeris::new(spec.entries, spec.time_tolerance_days));

        let candidates: Vec<Candidate> = self
            .candidates
            .into_iter()
            .map(|spec| Candidate::new(spec.target, spec.event_id))
            .collect();

        info!(
            candidates = candidates.len(),
            point_source_catalogs = point_source_catalogs.len(),
            galaxy_catalogs = galaxy_catalogs.len(),
            ephemeris = ephemeris.is_some(),
            "scenario loaded"
        );

        Ok(LoadedScenario {
            store,
            candidates,
            point_source_catalogs,
            galaxy_catalogs,
            ephemeris,
            cutoff: self.cutoff,
        })
    }
}

/// Parse a scenario from any reader.
pub fn read_scenario<R: Read>(input: R) -> Result<Scenario, AppError> {
    serde_json::from_reader(input)
        .map_err(|e| AppError::input(format!("Invalid scenario JSON: {e}")))
}

/// Read a scenario file from disk.
pub fn read_scenario_file(path: &Path) -> Result<Scenario, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::io(format!("Failed to open scenario '{}': {e}", path.display())))?;
    let scenario = read_scenario(BufReader::new(file))?;
    debug!(path = %path.display(), "read scenario");
    Ok(scenario)
}

/// Write a scenario file (pretty JSON).
pub fn write_scenario_file(path: &Path, scenario: &Scenario) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::io(format!("Failed to create scenario '{}': {e}", path.display())))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, scenario)
        .map_err(|e| AppError::io(format!("Failed to write scenario JSON: {e}")))?;
    writer
        .flush()
        .map_err(|e| AppError::io(format!("Failed to flush scenario '{}': {e}", path.display())))
}
