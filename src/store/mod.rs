//! Repository collaborators.
//!
//! The pipeline never touches a database directly. It reads materialized rows
//! through `SkymapStore` and `PhotometryStore` and writes results through
//! `ScoreSink`. `MemoryStore` implements all three for scenario files, the
//! demo and tests.

pub mod memory;

use thiserror::Error;

use crate::domain::{CandidateKey, FactorValue, Localization, NonLocalizedEvent, PhotometryPoint};

pub use memory::MemoryStore;

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("backend error: {0}")]
    Backend(String),

    #[error("store lock poisoned")]
    Poisoned,
}

/// Events and their localizations.
pub trait SkymapStore: Send + Sync {
    fn event(&self, event_id: &str) -> Result<Option<NonLocalizedEvent>, StoreError>;

    /// Every localization recorded for the event, in any order.
    fn localizations(&self, event_id: &str) -> Result<Vec<Localization>, StoreError>;
}

/// Photometry per target.
pub trait PhotometryStore: Send + Sync {
    fn photometry(&self, target_id: i64) -> Result<Vec<PhotometryPoint>, StoreError>;
}

/// Destination for vetting results. Every call is an upsert.
pub trait ScoreSink: Send + Sync {
    fn upsert_factor(
        &self,
        candidate: &CandidateKey,
        key: &str,
        value: FactorValue,
    ) -> Result<(), StoreError>;

    fn set_priority(&self, candidate: &CandidateKey, priority: u8) -> Result<(), StoreError>;

    /// Drop every factor and the priority recorded for a candidate. Called at
    /// the start of each run so the stored factors always describe one run.
    fn clear_results(&self, candidate: &CandidateKey) -> Result<(), StoreError>;

    /// Attach an auxiliary JSON attribute to a target.
    fn attach_target_extra(
        &self,
        target_id: i64,
        name: &str,
        value: serde_json::Value,
    ) -> Result<(), StoreError>;
}
