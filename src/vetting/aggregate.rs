//! Combining sub-scores into the integer priority.

use std::collections::BTreeMap;

use crate::domain::{keys, FactorValue, VetConfig};

/// Why a run stopped before every stage ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EarlyExit {
    SkymapBelowThreshold,
    PointSourceMatch,
    MinorPlanetMatch,
}

impl EarlyExit {
    pub fn describe(self) -> &'static str {
        match self {
            EarlyExit::SkymapBelowThreshold => "skymap score below threshold",
            EarlyExit::PointSourceMatch => "coincident point source",
            EarlyExit::MinorPlanetMatch => "known minor planet",
        }
    }
}

/// Every sub-score of one run. Stages that did not run stay neutral (1).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubScores {
    pub skymap: f64,
    pub point_source: f64,
    pub minor_planet: f64,
    pub host_distance: f64,
    pub photometric: f64,
    pub predetection: f64,
}

impl Default for SubScores {
    fn default() -> Self {
        Self {
            skymap: 1.0,
            point_source: 1.0,
            minor_planet: 1.0,
            host_distance: 1.0,
            photometric: 1.0,
            predetection: 1.0,
        }
    }
}

impl SubScores {
    /// Product of all sub-scores, clipped to `[0, 1]`.
    pub fn product(&self) -> f64 {
        (self.skymap
            * self.point_source
            * self.minor_planet
            * self.host_distance
            * self.photometric
            * self.predetection)
            .clamp(0.0, 1.0)
    }
}

/// `round(100 · score)` as an integer priority.
pub fn priority_from_score(score: f64) -> u8 {
    if !score.is_finite() {
        return 0;
    }
    (score.clamp(0.0, 1.0) * 100.0).round() as u8
}

/// Final priority for a set of sub-scores, honoring any early exit.
pub fn combine(scores: &SubScores, exit: Option<EarlyExit>) -> u8 {
    match exit {
        Some(_) => 0,
        None => priority_from_score(scores.product()),
    }
}

/// Early exit implied by a set of recorded factors, if any.
pub fn early_exit_from_factors(
    factors: &BTreeMap<String, FactorValue>,
    config: &VetConfig,
) -> Option<EarlyExit> {
    let number = |key: &str| factors.get(key).and_then(FactorValue::as_f64);

    if number(keys::SKYMAP_SCORE).is_some_and(|s| s < config.skymap_threshold) {
        return Some(EarlyExit::SkymapBelowThreshold);
    }
    if number(keys::PS_SCORE).is_some_and(|s| s <= 0.0)
        || factors.contains_key(keys::PS_MATCH_NAME)
    {
        return Some(EarlyExit::PointSourceMatch);
    }
    if factors.contains_key(keys::MPC_MATCH_NAME) {
        return Some(EarlyExit::MinorPlanetMatch);
    }
    None
}

/// Recompute the priority from stored factors.
///
/// Missing sub-scores are neutral; the early-exit rules apply exactly as in a
/// live run.
pub fn priority_from_factors(factors: &BTreeMap<String, FactorValue>, config: &VetConfig) -> u8 {
    let number = |key: &str| {
        factors
            .get(key)
            .and_then(FactorValue::as_f64)
            .unwrap_or(1.0)
    };
    let scores = SubScores {
        skymap: number(keys::SKYMAP_SCORE),
        point_source: number(keys::PS_SCORE),
        minor_planet: 1.0,
        host_distance: number(keys::HOST_DISTANCE_SCORE),
        photometric: number(keys::PHOT_SCORE),
        predetection: number(keys::PREDETECTION_SCORE),
    };
    combine(&scores, early_exit_from_factors(factors, config))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factors(pairs: &[(&str, FactorValue)]) -> BTreeMap<String, FactorValue> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn product_rounds_to_priority() {
        let scores = SubScores {
            skymap: 0.8,
            predetection: 0.5,
            ..SubScores::default()
        };
        assert_eq!(combine(&scores, None), 40);
        assert_eq!(combine(&SubScores::default(), None), 100);
    }

    #[test]
    fn early_exit_forces_zero() {
        assert_eq!(combine(&SubScores::default(), Some(EarlyExit::MinorPlanetMatch)), 0);
    }

    #[test]
    fn non_finite_score_is_zero_priority() {
        assert_eq!(priority_from_score(f64::NAN), 0);
        assert_eq!(priority_from_score(1.7), 100);
    }

    #[test]
    fn recompute_applies_skymap_exit() {
        // 0.009 would otherwise round to priority 1.
        let config = VetConfig::default();
        let f = factors(&[(keys::SKYMAP_SCORE, FactorValue::Number(0.009))]);
        assert_eq!(priority_from_factors(&f, &config), 0);
    }

    #[test]
    fn recompute_applies_minor_planet_exit() {
        let config = VetConfig::default();
        let f = factors(&[
            (keys::SKYMAP_SCORE, FactorValue::Number(0.9)),
            (keys::MPC_MATCH_NAME, FactorValue::Text("(1) Ceres".to_string())),
        ]);
        assert_eq!(priority_from_factors(&f, &config), 0);
    }

    #[test]
    fn recompute_matches_product() {
        let config = VetConfig::default();
        let f = factors(&[
            (keys::SKYMAP_SCORE, FactorValue::Number(0.5)),
            (keys::PS_SCORE, FactorValue::Number(1.0)),
            (keys::HOST_DISTANCE_SCORE, FactorValue::Number(0.6)),
            (keys::PHOT_SCORE, FactorValue::Number(1.0)),
            (keys::PREDETECTION_SCORE, FactorValue::Number(1.0)),
            (keys::PHOT_MODEL, FactorValue::Text("spl".to_string())),
        ]);
        assert_eq!(priority_from_factors(&f, &config), 30);
    }
}
