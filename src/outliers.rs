//! GPS-jump detection.
//!
//! A jump is a point that sits far away from both of its neighbours while
//! those neighbours are close to each other: the track spikes out and comes
//! straight back.

use log::debug;

use crate::collection::TrajectoryCollection;
use crate::error::{ensure_finite, Result};
use crate::features::neighbour_distances;
use crate::IdColumn;

/// Flags outlier points of a collection.
///
/// Flags are only meaningful for the rows as they are when `detect` runs;
/// they go stale as soon as any row is removed.
pub trait OutlierDetector {
    /// One flag per row, `true` for outliers.
    fn detect(
        &self,
        data: &TrajectoryCollection,
        id_column: IdColumn,
        jump_coefficient: f64,
        threshold: f64,
    ) -> Result<Vec<bool>>;
}

/// Neighbourhood jump test.
///
/// A point is flagged when its distances to the previous point, to the next
/// point and between those two neighbours all exceed `threshold`, and both
/// neighbour distances exceed `jump_coefficient` times the
/// previous-to-next distance. Trajectory endpoints are never flagged.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeighbourJumpDetector;

impl OutlierDetector for NeighbourJumpDetector {
    fn detect(
        &self,
        data: &TrajectoryCollection,
        id_column: IdColumn,
        jump_coefficient: f64,
        threshold: f64,
    ) -> Result<Vec<bool>> {
        ensure_finite("jump_coefficient", jump_coefficient)?;
        ensure_finite("threshold", threshold)?;

        let flags: Vec<bool> = neighbour_distances(data.points(), id_column)?
            .iter()
            .map(|d| {
                let bridge = jump_coefficient * d.dist_prev_to_next;
                d.dist_to_next > threshold
                    && d.dist_to_prev > threshold
                    && d.dist_prev_to_next > threshold
                    && bridge < d.dist_to_next
                    && bridge < d.dist_to_prev
            })
            .collect();

        debug!(
            "[Outliers] {} of {} points flagged (jump_coefficient={}, threshold={})",
            flags.iter().filter(|f| **f).count(),
            flags.len(),
            jump_coefficient,
            threshold
        );

        Ok(flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TrackPoint;

    fn spiky_track() -> TrajectoryCollection {
        TrajectoryCollection::from_points(vec![
            TrackPoint::new("a", 0.0, 0.0000, 0),
            TrackPoint::new("a", 0.0, 0.0001, 1),
            TrackPoint::new("a", 0.1, 0.0002, 2),
            TrackPoint::new("a", 0.0, 0.0003, 3),
            TrackPoint::new("a", 0.0, 0.0004, 4),
        ])
    }

    #[test]
    fn test_spike_is_flagged() {
        let flags = NeighbourJumpDetector
            .detect(&spiky_track(), IdColumn::TrajectoryId, 3.0, 1.0)
            .unwrap();
        assert_eq!(flags, vec![false, false, true, false, false]);
    }

    #[test]
    fn test_straight_track_has_no_outliers() {
        let data: TrajectoryCollection = (0..6)
            .map(|i| TrackPoint::new("a", 0.0, i as f64 * 0.001, i))
            .collect();
        let flags = NeighbourJumpDetector
            .detect(&data, IdColumn::TrajectoryId, 3.0, 1.0)
            .unwrap();
        assert!(flags.iter().all(|f| !f));
    }

    #[test]
    fn test_large_threshold_suppresses_flags() {
        let flags = NeighbourJumpDetector
            .detect(&spiky_track(), IdColumn::TrajectoryId, 3.0, 50_000.0)
            .unwrap();
        assert!(flags.iter().all(|f| !f));
    }
}
