//! Shared domain types.
//!
//! These types are kept lightweight and serializable so they can be:
//!
//! - loaded from scenario files and stores
//! - passed between vetting stages
//! - exported to JSON/CSV for audit

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::sky::healpix;

/// MOC order at which skymap tile ranges are expressed.
pub const TILE_ORDER: u8 = 29;

/// Modified Julian Date of the Unix epoch.
const MJD_UNIX_EPOCH: f64 = 40_587.0;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Convert a UTC timestamp to a Modified Julian Date.
pub fn to_mjd(ts: &DateTime<Utc>) -> f64 {
    let secs = ts.timestamp() as f64 + f64::from(ts.timestamp_subsec_nanos()) * 1e-9;
    secs / SECONDS_PER_DAY + MJD_UNIX_EPOCH
}

/// Signed number of days from `origin` to `ts`.
pub fn days_between(origin: &DateTime<Utc>, ts: &DateTime<Utc>) -> f64 {
    (*ts - *origin).num_milliseconds() as f64 / (SECONDS_PER_DAY * 1000.0)
}

/// A transient being vetted (position in degrees).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub id: i64,
    pub name: String,
    pub ra: f64,
    pub dec: f64,
}

/// A gravitational-wave (or other poorly localized) event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NonLocalizedEvent {
    pub event_id: String,
    /// Discovery time of the event. Photometry before it is "pre-discovery".
    pub event_time: DateTime<Utc>,
}

/// One skymap tile: a half-open range of nested HEALPix indices at
/// [`TILE_ORDER`] sharing a single probability density (per steradian).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkymapTile {
    pub start: u64,
    pub end: u64,
    pub prob_density: f64,
}

impl SkymapTile {
    /// Solid angle covered by the tile in steradians.
    pub fn area(&self) -> f64 {
        self.end.saturating_sub(self.start) as f64 * healpix::pixel_area(TILE_ORDER)
    }

    pub fn contains(&self, index: u64) -> bool {
        index >= self.start && index < self.end
    }

    /// Probability enclosed by this tile.
    pub fn probability(&self) -> f64 {
        self.prob_density * self.area()
    }
}

/// One version of an event's skymap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Localization {
    pub id: i64,
    pub event_id: String,
    pub date: DateTime<Utc>,
    /// Posterior mean luminosity distance (Mpc).
    pub distance_mean: f64,
    /// Posterior standard deviation of the luminosity distance (Mpc).
    pub distance_std: f64,
    pub tiles: Vec<SkymapTile>,
}

/// A photometric measurement: either a detection or an upper limit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum Measurement {
    Magnitude { mag: f64, error: f64 },
    Limit { mag: f64 },
}

/// One photometry datum for a target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotometryPoint {
    pub timestamp: DateTime<Utc>,
    pub filter: String,
    pub measurement: Measurement,
    pub telescope: Option<String>,
}

impl PhotometryPoint {
    pub fn is_detection(&self) -> bool {
        matches!(self.measurement, Measurement::Magnitude { .. })
    }

    /// `(magnitude, error)` for detections.
    pub fn magnitude(&self) -> Option<(f64, f64)> {
        match self.measurement {
            Measurement::Magnitude { mag, error } => Some((mag, error)),
            Measurement::Limit { .. } => None,
        }
    }

    /// The numeric value stored for this point (magnitude or limit).
    pub fn value(&self) -> f64 {
        match self.measurement {
            Measurement::Magnitude { mag, .. } => mag,
            Measurement::Limit { mag } => mag,
        }
    }

    /// Identity used for deduplication: (timestamp, value, source).
    fn dedup_key(&self) -> (i64, u64, Option<&str>) {
        (
            self.timestamp.timestamp_millis(),
            self.value().to_bits(),
            self.telescope.as_deref(),
        )
    }
}

/// Drop repeated photometry (same timestamp, value and source), keeping the
/// first occurrence, and return the survivors sorted by time.
pub fn dedup_photometry(points: Vec<PhotometryPoint>) -> Vec<PhotometryPoint> {
    let mut seen = std::collections::HashSet::new();
    let mut out: Vec<PhotometryPoint> = Vec::with_capacity(points.len());
    for p in points {
        let key = p.dedup_key();
        let owned = (key.0, key.1, key.2.map(str::to_string));
        if seen.insert(owned) {
            out.push(p);
        }
    }
    out.sort_by_key(|p| p.timestamp);
    out
}

/// Asymmetric uncertainty `(-neg, +pos)`.
///
/// Always serialized as a two-element `[neg, pos]` array, including the
/// symmetric case, so downstream consumers see one shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AsymmetricError {
    pub neg: f64,
    pub pos: f64,
}

impl AsymmetricError {
    pub fn symmetric(value: f64) -> Self {
        Self {
            neg: value,
            pos: value,
        }
    }

    pub fn is_symmetric(&self) -> bool {
        (self.neg - self.pos).abs() <= f64::EPSILON * self.neg.abs().max(self.pos.abs()).max(1.0)
    }
}

impl Serialize for AsymmetricError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        [self.neg, self.pos].serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for AsymmetricError {
    /// Accepts either a scalar (symmetric) or a `[neg, pos]` pair, so older
    /// host summaries stay readable.
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Scalar(f64),
            Pair([f64; 2]),
        }
        Ok(match Repr::deserialize(deserializer)? {
            Repr::Scalar(v) => AsymmetricError::symmetric(v),
            Repr::Pair([neg, pos]) => AsymmetricError { neg, pos },
        })
    }
}

/// A galaxy that may host the candidate, after normalization and PCC scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct HostGalaxyCandidate {
    pub name: String,
    pub ra: f64,
    pub dec: f64,
    /// Separation from the candidate (arcsec).
    pub offset_arcsec: f64,
    /// Apparent magnitude used for the PCC weighting.
    pub magnitude: f64,
    pub magnitude_band: Option<String>,
    pub redshift: Option<f64>,
    pub redshift_err: Option<AsymmetricError>,
    /// Luminosity distance (Mpc).
    pub distance: f64,
    pub distance_err: AsymmetricError,
    pub catalog: String,
    /// Probability of chance coincidence.
    pub pcc: f64,
}

/// Light-curve model families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// `mag = y0 - a * log10(t)`
    SinglePowerLaw,
    /// `mag = y0 - log10((t/t0)^-a1 + (t/t0)^-a2)`
    BrokenPowerLaw,
}

impl ModelKind {
    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            ModelKind::SinglePowerLaw => "single power law",
            ModelKind::BrokenPowerLaw => "broken power law",
        }
    }

    /// Short label stored in score factors.
    pub fn label(self) -> &'static str {
        match self {
            ModelKind::SinglePowerLaw => "spl",
            ModelKind::BrokenPowerLaw => "bpl",
        }
    }

    /// Number of free parameters (used by the information criterion).
    pub fn param_count(self) -> usize {
        match self {
            ModelKind::SinglePowerLaw => 2,
            ModelKind::BrokenPowerLaw => 4,
        }
    }
}

/// Fit quality diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitQuality {
    pub sse: f64,
    pub rmse: f64,
    pub aicc: f64,
    pub n: usize,
}

/// Fitted model parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurveModel {
    pub name: ModelKind,
    pub display_name: String,
    pub params: Vec<f64>,
}

/// Fit output for a single model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitResult {
    pub model: CurveModel,
    pub quality: FitQuality,
}

/// The selected light-curve model plus the shape quantities derived from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightCurveFit {
    pub best: FitResult,
    /// Days since the event at which the model is brightest.
    pub peak_time: f64,
    /// Post-peak slope in mag/day; positive means fading.
    pub decay_rate: f64,
}

/// A recorded score factor value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FactorValue {
    Number(f64),
    Text(String),
}

impl FactorValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FactorValue::Number(v) => Some(*v),
            FactorValue::Text(s) => s.parse().ok(),
        }
    }
}

impl From<f64> for FactorValue {
    fn from(value: f64) -> Self {
        FactorValue::Number(value)
    }
}

impl From<&str> for FactorValue {
    fn from(value: &str) -> Self {
        FactorValue::Text(value.to_string())
    }
}

impl From<String> for FactorValue {
    fn from(value: String) -> Self {
        FactorValue::Text(value)
    }
}

impl std::fmt::Display for FactorValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FactorValue::Number(v) => write!(f, "{v}"),
            FactorValue::Text(s) => write!(f, "{s}"),
        }
    }
}

/// Identifies a candidate: one target associated with one event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CandidateKey {
    pub target_id: i64,
    pub event_id: String,
}

/// A target associated with an event, plus its vetting state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub target: Target,
    pub event_id: String,
    pub priority: Option<u8>,
    pub factors: BTreeMap<String, FactorValue>,
}

impl Candidate {
    pub fn new(target: Target, event_id: impl Into<String>) -> Self {
        Self {
            target,
            event_id: event_id.into(),
            priority: None,
            factors: BTreeMap::new(),
        }
    }

    pub fn key(&self) -> CandidateKey {
        CandidateKey {
            target_id: self.target.id,
            event_id: self.event_id.clone(),
        }
    }

    /// Forget the results of an earlier run.
    pub fn reset(&mut self) {
        self.priority = None;
        self.factors.clear();
    }

    /// Insert or replace a factor.
    pub fn upsert_factor(&mut self, key: &str, value: impl Into<FactorValue>) {
        self.factors.insert(key.to_string(), value.into());
    }

    pub fn factor(&self, key: &str) -> Option<f64> {
        self.factors.get(key).and_then(FactorValue::as_f64)
    }
}

/// Score factor keys written by the pipeline.
pub mod keys {
    pub const SKYMAP_SCORE: &str = "skymap_score";
    pub const PS_SCORE: &str = "ps_score";
    pub const PS_MATCH_CATALOG: &str = "ps_match_catalog";
    pub const PS_MATCH_NAME: &str = "ps_match_name";
    pub const MPC_MATCH_NAME: &str = "mpc_match_name";
    pub const MPC_MATCH_SEP: &str = "mpc_match_sep";
    pub const MPC_MATCH_DATE: &str = "mpc_match_date";
    pub const HOST_DISTANCE_SCORE: &str = "host_distance_score";
    pub const PHOT_PEAK_LUM: &str = "phot_peak_lum";
    pub const PHOT_PEAK_TIME: &str = "phot_peak_time";
    pub const PHOT_DECAY_RATE: &str = "phot_decay_rate";
    pub const PHOT_SCORE: &str = "phot_score";
    pub const PHOT_MODEL: &str = "phot_model";
    pub const PREDETECTION_SCORE: &str = "predetection_score";
    pub const PREDETECTION_MAX_DETECTIONS: &str = "predetection_max_detections";

    /// Name of the auxiliary target attribute holding the host summary.
    pub const HOST_GALAXIES_EXTRA: &str = "Host Galaxies";
}
