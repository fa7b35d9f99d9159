//! In-memory implementation of every store trait.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::domain::{
    dedup_photometry, CandidateKey, FactorValue, Localization, NonLocalizedEvent, PhotometryPoint,
};
use crate::store::{PhotometryStore, ScoreSink, SkymapStore, StoreError};

#[derive(Debug, Default)]
struct Inputs {
    events: HashMap<String, NonLocalizedEvent>,
    localizations: HashMap<String, Vec<Localization>>,
    photometry: HashMap<i64, Vec<PhotometryPoint>>,
}

#[derive(Debug, Default)]
struct Outputs {
    factors: BTreeMap<CandidateKey, BTreeMap<String, FactorValue>>,
    priorities: BTreeMap<CandidateKey, u8>,
    target_extras: BTreeMap<(i64, String), serde_json::Value>,
}

/// Thread-safe in-memory store; shared by reference across a parallel batch.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inputs: RwLock<Inputs>,
    outputs: RwLock<Outputs>,
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>, StoreError> {
    lock.read().map_err(|_| StoreError::Poisoned)
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>, StoreError> {
    lock.write().map_err(|_| StoreError::Poisoned)
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_event(&self, event: NonLocalizedEvent) -> Result<(), StoreError> {
        write(&self.inputs)?
            .events
            .insert(event.event_id.clone(), event);
        Ok(())
    }

    pub fn insert_localization(&self, localization: Localization) -> Result<(), StoreError> {
        write(&self.inputs)?
            .localizations
            .entry(localization.event_id.clone())
            .or_default()
            .push(localization);
        Ok(())
    }

    /// Add photometry for a target; duplicates are dropped.
    pub fn insert_photometry(
        &self,
        target_id: i64,
        points: Vec<PhotometryPoint>,
    ) -> Result<(), StoreError> {
        let mut inputs = write(&self.inputs)?;
        let entry = inputs.photometry.entry(target_id).or_default();
        let mut merged = std::mem::take(entry);
        merged.extend(points);
        *entry = dedup_photometry(merged);
        Ok(())
    }

    /// All factors recorded for a candidate.
    pub fn factors(
        &self,
        candidate: &CandidateKey,
    ) -> Result<BTreeMap<String, FactorValue>, StoreError> {
        Ok(read(&self.outputs)?
            .factors
            .get(candidate)
            .cloned()
            .unwrap_or_default())
    }

    pub fn priority(&self, candidate: &CandidateKey) -> Result<Option<u8>, StoreError> {
        Ok(read(&self.outputs)?.priorities.get(candidate).copied())
    }

    pub fn target_extra(
        &self,
        target_id: i64,
        name: &str,
    ) -> Result<Option<serde_json::Value>, StoreError> {
        Ok(read(&self.outputs)?
            .target_extras
            .get(&(target_id, name.to_string()))
            .cloned())
    }
}

impl SkymapStore for MemoryStore {
    fn event(&self, event_id: &str) -> Result<Option<NonLocalizedEvent>, StoreError> {
        Ok(read(&self.inputs)?.events.get(event_id).cloned())
    }

    fn localizations(&self, event_id: &str) -> Result<Vec<Localization>, StoreError> {
        Ok(read(&self.inputs)?
            .localizations
            .get(event_id)
            .cloned()
            .unwrap_or_default())
    }
}

impl PhotometryStore for MemoryStore {
    fn photometry(&self, target_id: i64) -> Result<Vec<PhotometryPoint>, StoreError> {
        Ok(read(&self.inputs)?
            .photometry
            .get(&target_id)
            .cloned()
            .unwrap_or_default())
    }
}

impl ScoreSink for MemoryStore {
    fn upsert_factor(
        &self,
        candidate: &CandidateKey,
        key: &str,
        value: FactorValue,
    ) -> Result<(), StoreError> {
        write(&self.outputs)?
            .factors
            .entry(candidate.clone())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    fn set_priority(&self, candidate: &CandidateKey, priority: u8) -> Result<(), StoreError> {
        write(&self.outputs)?
            .priorities
            .insert(candidate.clone(), priority);
        Ok(())
    }

    fn clear_results(&self, candidate: &CandidateKey) -> Result<(), StoreError> {
        let mut outputs = write(&self.outputs)?;
        outputs.factors.remove(candidate);
        outputs.priorities.remove(candidate);
        Ok(())
    }

    fn attach_target_extra(
        &self,
        target_id: i64,
        name: &str,
        value: serde_json::Value,
    ) -> Result<(), StoreError> {
        write(&self.outputs)?
            .target_extras
            .insert((target_id, name.to_string()), value);
        Ok(())
    }
}
