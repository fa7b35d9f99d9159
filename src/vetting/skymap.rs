//! Skymap association.
//!
//! The score is the probability mass of the localization that is *less*
//! dense than the candidate's own tile: `1 − p`, where `p` is the probability
//! enclosed by every tile at least as dense as the candidate's. A candidate on
//! the peak of the skymap scores close to 1; one on the fringe (or outside
//! every tile) scores close to 0.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::domain::{Localization, SkymapTile, TILE_ORDER};
use crate::error::{AppError, ErrorKind};
use crate::sky::healpix::radec_to_nested;
use crate::store::SkymapStore;

/// Result of associating a candidate with an event's localization.
#[derive(Debug, Clone, PartialEq)]
pub struct SkymapAssociation {
    pub localization_id: i64,
    /// Order-29 nested index of the candidate.
    pub tile_index: u64,
    /// Density of the tile containing the candidate (0 outside the map).
    pub candidate_density: f64,
    /// Probability enclosed at or above the candidate's density.
    pub enclosed_probability: f64,
    pub score: f64,
    pub distance_mean: f64,
    pub distance_std: f64,
}

/// Pick the authoritative localization: the latest with `date <= cutoff`
/// (the latest overall without a cutoff). Equal dates go to the higher id.
pub fn select_localization(
    localizations: Vec<Localization>,
    cutoff: Option<DateTime<Utc>>,
) -> Option<Localization> {
    localizations
        .into_iter()
        .filter(|loc| cutoff.is_none_or(|c| loc.date <= c))
        .max_by(|a, b| a.date.cmp(&b.date).then(a.id.cmp(&b.id)))
}

/// `Σ density × area`, which is ≈ 1 for a complete skymap.
pub fn localization_integral(tiles: &[SkymapTile]) -> f64 {
    tiles.iter().map(SkymapTile::probability).sum()
}

/// Density of the tile containing `index`, if any.
pub fn density_at(tiles: &[SkymapTile], index: u64) -> Option<f64> {
    tiles
        .iter()
        .find(|tile| tile.contains(index))
        .map(|tile| tile.prob_density)
}

/// `(score, candidate_density, enclosed_probability)` for the candidate at
/// `index`.
pub fn skymap_score(tiles: &[SkymapTile], index: u64) -> (f64, f64, f64) {
    let density = density_at(tiles, index).unwrap_or(0.0);

    let mut sorted: Vec<&SkymapTile> = tiles.iter().collect();
    sorted.sort_by(|a, b| b.prob_density.total_cmp(&a.prob_density));

    let enclosed: f64 = sorted
        .iter()
        .take_while(|tile| tile.prob_density >= density)
        .map(|tile| tile.probability())
        .sum();
    let enclosed = enclosed.clamp(0.0, 1.0);

    ((1.0 - enclosed).clamp(0.0, 1.0), density, enclosed)
}

/// Associate a candidate position with the event's authoritative localization.
///
/// A missing localization is fatal for the run.
pub fn associate(
    store: &dyn SkymapStore,
    event_id: &str,
    ra: f64,
    dec: f64,
    cutoff: Option<DateTime<Utc>>,
) -> Result<SkymapAssociation, AppError> {
    let localizations = store.localizations(event_id)?;
    let n_versions = localizations.len();
    let localization = select_localization(localizations, cutoff).ok_or_else(|| {
        AppError::new(
            ErrorKind::LocalizationNotFound,
            format!("No localization for event {event_id} at or before the cutoff."),
        )
    })?;
    debug!(
        event = event_id,
        localization = localization.id,
        versions = n_versions,
        integral = localization_integral(&localization.tiles),
        "selected localization"
    );

    let tile_index = radec_to_nested(ra, dec, TILE_ORDER);
    let (score, candidate_density, enclosed_probability) =
        skymap_score(&localization.tiles, tile_index);
    info!(
        event = event_id,
        score,
        density = candidate_density,
        enclosed = enclosed_probability,
        "skymap association"
    );

    Ok(SkymapAssociation {
        localization_id: localization.id,
        tile_index,
        candidate_density,
        enclosed_probability,
        score,
        distance_mean: localization.distance_mean,
        distance_std: localization.distance_std,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sky::healpix::pixel_area;
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    /// Tiles of `width` order-29 pixels each carrying probability `probs[i]`.
    fn tiles(probs: &[f64], width: u64) -> Vec<SkymapTile> {
        let area = width as f64 * pixel_area(TILE_ORDER);
        probs
            .iter()
            .enumerate()
            .map(|(i, &p)| SkymapTile {
                start: i as u64 * width,
                end: (i as u64 + 1) * width,
                prob_density: p / area,
            })
            .collect()
    }

    fn localization(id: i64, day: u32, tiles: Vec<SkymapTile>) -> Localization {
        Localization {
            id,
            event_id: "S1".to_string(),
            date: Utc.with_ymd_and_hms(2023, 5, day, 0, 0, 0).unwrap(),
            distance_mean: 200.0,
            distance_std: 40.0,
            tiles,
        }
    }

    #[test]
    fn integral_of_complete_map_is_one() {
        let t = tiles(&[0.5, 0.3, 0.2], 1 << 40);
        assert!((localization_integral(&t) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn peak_candidate_scores_high_and_fringe_scores_low() {
        let width = 1u64 << 40;
        let t = tiles(&[0.5, 0.3, 0.2], width);

        let (peak, _, p_peak) = skymap_score(&t, 10);
        assert!((p_peak - 0.5).abs() < 1e-12);
        assert!((peak - 0.5).abs() < 1e-12);

        let (mid, _, _) = skymap_score(&t, width + 5);
        assert!((mid - 0.2).abs() < 1e-12);

        let (fringe, _, _) = skymap_score(&t, 2 * width + 5);
        assert!(fringe.abs() < 1e-12);
    }

    #[test]
    fn candidate_outside_map_scores_zero() {
        let t = tiles(&[0.6, 0.4], 1 << 40);
        let (score, density, _) = skymap_score(&t, 10 * (1 << 40));
        assert_eq!(density, 0.0);
        assert!(score.abs() < 1e-12);
    }

    #[test]
    fn latest_localization_before_cutoff_wins() {
        let t = tiles(&[1.0], 1 << 40);
        let locs = vec![
            localization(1, 1, t.clone()),
            localization(2, 3, t.clone()),
            localization(3, 9, t),
        ];
        let cutoff = Utc.with_ymd_and_hms(2023, 5, 5, 0, 0, 0).unwrap();
        assert_eq!(select_localization(locs.clone(), Some(cutoff)).unwrap().id, 2);
        assert_eq!(select_localization(locs, None).unwrap().id, 3);
    }

    #[test]
    fn missing_localization_is_fatal() {
        let store = MemoryStore::new();
        let err = associate(&store, "S1", 10.0, 10.0, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LocalizationNotFound);
        assert!(err.is_fatal_pipeline_error());
    }

    #[test]
    fn cutoff_before_first_localization_is_fatal() {
        let store = MemoryStore::new();
        store
            .insert_localization(localization(1, 10, tiles(&[1.0], 1 << 40)))
            .unwrap();
        let cutoff = Utc.with_ymd_and_hms(2023, 5, 1, 0, 0, 0).unwrap();
        let err = associate(&store, "S1", 10.0, 10.0, Some(cutoff)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LocalizationNotFound);
    }
}
