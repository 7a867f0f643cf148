//! # Convergence Cleaning
//!
//! Point-level cleaning is a fixed-point loop: evaluate a drop predicate,
//! remove the violating rows, bring the motion features of the rows that
//! followed them up to date, and repeat until nothing is dropped. Removing a
//! point changes the neighbourhood of the next one, so a single pass is not
//! enough.
//!
//! Every operation comes in two ownership flavours:
//! - [`clean`] mutates a collection the caller holds exclusively;
//! - [`cleaned`] works on a private copy and returns it, leaving the input
//!   untouched (also on error).
//!
//! In-place operations that fail part-way keep the rows removed before the
//! error.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::collection::TrajectoryCollection;
use crate::error::Result;
use crate::features::Feature;
use crate::filters::{self, DuplicateColumn, Keep};
use crate::outliers::{NeighbourJumpDetector, OutlierDetector};
use crate::predicates::Predicate;
use crate::trajectory_filters;
use crate::{BoundingBox, CleaningConfig, IdColumn};

/// Outcome of a cleaning operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleaningReport {
    pub rows_before: usize,
    pub rows_after: usize,
    pub rows_dropped: usize,
    /// Iterations that dropped at least one row (1 for single-pass filters
    /// that dropped anything)
    pub iterations: usize,
    /// Whole groups removed (trajectory-level filters only)
    pub groups_dropped: usize,
}

impl CleaningReport {
    pub(crate) fn single_pass(rows_before: usize, rows_after: usize, groups_dropped: usize) -> Self {
        let rows_dropped = rows_before - rows_after;
        Self {
            rows_before,
            rows_after,
            rows_dropped,
            iterations: usize::from(rows_dropped > 0),
            groups_dropped,
        }
    }
}

/// Run `predicate` to a fixed point.
///
/// Motion features for `id_column` are computed first if they are not
/// cached; afterwards they are consistent with the remaining rows. Each
/// iteration drops at least one row, so the loop terminates.
pub fn clean_until_converged(
    data: &mut TrajectoryCollection,
    id_column: IdColumn,
    predicate: &Predicate,
    detector: &dyn OutlierDetector,
) -> Result<CleaningReport> {
    predicate.validate()?;
    data.ensure_features(id_column)?;

    let rows_before = data.len();
    let mut iterations = 0;

    loop {
        let rows = predicate.rows_to_drop(data, id_column, detector)?;
        if rows.is_empty() {
            break;
        }

        let shape_before = data.len();
        debug!("[Cleaning] Dropping {} rows of gps points", rows.len());
        data.drop_rows(&rows);
        iterations += 1;
        debug!(
            "[Cleaning] Rows before: {}, rows after: {}, sum drop: {}",
            shape_before,
            data.len(),
            rows_before - data.len()
        );
    }

    let report = CleaningReport {
        rows_before,
        rows_after: data.len(),
        rows_dropped: rows_before - data.len(),
        iterations,
        groups_dropped: 0,
    };
    info!(
        "[Cleaning] {} GPS points were dropped in {} iterations",
        report.rows_dropped, report.iterations
    );
    Ok(report)
}

// ============================================================================
// Operations
// ============================================================================

/// A cleaning or filtering operation with its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum CleaningOp {
    /// Remove GPS jumps until none remain
    GpsJumpsByDistance {
        id_column: IdColumn,
        jump_coefficient: f64,
        threshold: f64,
    },
    /// Remove points within `radius_area` meters of their predecessor
    NearbyPointsByDistance { id_column: IdColumn, radius_area: f64 },
    /// Remove points at most `speed_radius` m/s from their predecessor
    NearbyPointsBySpeed { id_column: IdColumn, speed_radius: f64 },
    /// Remove points on either end of an edge faster than `speed_max`
    SpeedMaxRadius { id_column: IdColumn, speed_max: f64 },
    /// Remove trajectories with fewer than `min_points` points
    TrajectoriesWithFewPoints { id_column: IdColumn, min_points: usize },
    /// Remove trajectories with few points, then those shorter than
    /// `min_trajectory_distance`
    TrajectoriesShortAndFewPoints {
        id_column: IdColumn,
        min_trajectory_distance: f64,
        min_points: usize,
    },
    /// Remove trajectories whose summed `time_to_prev` is below `time_max`
    IdByTimeMax { id_column: IdColumn, time_max: f64 },
    /// Keep points inside (or outside, with `filter_out`) a bounding box
    ByBbox { bbox: BoundingBox, filter_out: bool },
    /// Keep points within an inclusive time range
    ByDatetime {
        start: Option<i64>,
        end: Option<i64>,
        filter_out: bool,
    },
    /// Keep points of one trajectory
    ById { id: String, filter_out: bool },
    /// Keep points of one segment
    BySegmentId { id: String, filter_out: bool },
    /// Remove rows equal to their neighbour on `subset` (all columns if empty)
    ConsecutiveDuplicates { subset: Vec<DuplicateColumn>, keep: Keep },
}

impl CleaningOp {
    /// The standard cleaning pipeline for a configuration: jumps, nearby
    /// points, speed, then trajectory-level filters.
    pub fn pipeline(config: &CleaningConfig) -> Vec<CleaningOp> {
        let id_column = config.id_column;
        vec![
            CleaningOp::GpsJumpsByDistance {
                id_column,
                jump_coefficient: config.jump_coefficient,
                threshold: config.jump_threshold,
            },
            CleaningOp::NearbyPointsByDistance {
                id_column,
                radius_area: config.radius_area,
            },
            CleaningOp::SpeedMaxRadius {
                id_column,
                speed_max: config.speed_max,
            },
            CleaningOp::TrajectoriesShortAndFewPoints {
                id_column,
                min_trajectory_distance: config.min_trajectory_distance,
                min_points: config.min_points_per_trajectory,
            },
        ]
    }

    /// Apply the operation in place with a custom outlier detector.
    pub fn apply_with(
        &self,
        data: &mut TrajectoryCollection,
        detector: &dyn OutlierDetector,
    ) -> Result<CleaningReport> {
        match self {
            CleaningOp::TrajectoriesWithFewPoints {
                id_column,
                min_points,
            } => trajectory_filters::clean_trajectories_with_few_points(
                data,
                *id_column,
                *min_points,
            ),
            CleaningOp::TrajectoriesShortAndFewPoints {
                id_column,
                min_trajectory_distance,
                min_points,
            } => trajectory_filters::clean_trajectories_short_and_few_points(
                data,
                *id_column,
                *min_trajectory_distance,
                *min_points,
            ),
            CleaningOp::IdByTimeMax {
                id_column,
                time_max,
            } => trajectory_filters::clean_id_by_time_max(data, *id_column, *time_max),
            CleaningOp::ByBbox { bbox, filter_out } => {
                filters::by_bbox(data, bbox, *filter_out)
            }
            CleaningOp::ByDatetime {
                start,
                end,
                filter_out,
            } => filters::by_datetime(data, *start, *end, *filter_out),
            CleaningOp::ById { id, filter_out } => {
                filters::by_id(data, id, IdColumn::TrajectoryId, *filter_out)
            }
            CleaningOp::BySegmentId { id, filter_out } => {
                filters::by_id(data, id, IdColumn::SegmentId, *filter_out)
            }
            CleaningOp::ConsecutiveDuplicates { subset, keep } => {
                filters::clean_consecutive_duplicates(data, subset, *keep)
            }
            CleaningOp::GpsJumpsByDistance {
                id_column,
                jump_coefficient,
                threshold,
            } => clean_until_converged(
                data,
                *id_column,
                &Predicate::Outlier {
                    jump_coefficient: *jump_coefficient,
                    threshold: *threshold,
                },
                detector,
            ),
            CleaningOp::NearbyPointsByDistance {
                id_column,
                radius_area,
            } => clean_until_converged(
                data,
                *id_column,
                &Predicate::Threshold {
                    feature: Feature::DistToPrev,
                    bound: *radius_area,
                },
                detector,
            ),
            CleaningOp::NearbyPointsBySpeed {
                id_column,
                speed_radius,
            } => clean_until_converged(
                data,
                *id_column,
                &Predicate::Threshold {
                    feature: Feature::SpeedToPrev,
                    bound: *speed_radius,
                },
                detector,
            ),
            CleaningOp::SpeedMaxRadius {
                id_column,
                speed_max,
            } => clean_until_converged(
                data,
                *id_column,
                &Predicate::SpeedMaxRadius {
                    speed_max: *speed_max,
                },
                detector,
            ),
        }
    }
}

/// Apply `op` to the caller's collection in place.
pub fn clean(data: &mut TrajectoryCollection, op: &CleaningOp) -> Result<CleaningReport> {
    op.apply_with(data, &NeighbourJumpDetector)
}

/// Apply `op` to a copy of `data` and return the copy.
pub fn cleaned(data: &TrajectoryCollection, op: &CleaningOp) -> Result<TrajectoryCollection> {
    let mut copy = data.clone();
    clean(&mut copy, op)?;
    Ok(copy)
}

/// Apply several operations in order, in place.
pub fn clean_all(data: &mut TrajectoryCollection, ops: &[CleaningOp]) -> Result<Vec<CleaningReport>> {
    ops.iter().map(|op| clean(data, op)).collect()
}

// ============================================================================
// Convenience wrappers (in place)
// ============================================================================

/// Remove GPS jumps, re-detecting after every removal.
pub fn clean_gps_jumps_by_distance(
    data: &mut TrajectoryCollection,
    config: &CleaningConfig,
) -> Result<CleaningReport> {
    debug!(
        "[Cleaning] Cleaning gps jumps by distance to jump_coefficient {}",
        config.jump_coefficient
    );
    clean(
        data,
        &CleaningOp::GpsJumpsByDistance {
            id_column: config.id_column,
            jump_coefficient: config.jump_coefficient,
            threshold: config.jump_threshold,
        },
    )
}

/// Remove points within `radius_area` meters of their predecessor.
pub fn clean_gps_nearby_points_by_distances(
    data: &mut TrajectoryCollection,
    config: &CleaningConfig,
) -> Result<CleaningReport> {
    debug!(
        "[Cleaning] Cleaning gps points from radius of {} meters",
        config.radius_area
    );
    clean(
        data,
        &CleaningOp::NearbyPointsByDistance {
            id_column: config.id_column,
            radius_area: config.radius_area,
        },
    )
}

/// Remove points at most `speed_radius` m/s from their predecessor.
pub fn clean_gps_nearby_points_by_speed(
    data: &mut TrajectoryCollection,
    config: &CleaningConfig,
) -> Result<CleaningReport> {
    debug!(
        "[Cleaning] Cleaning gps points using {} speed radius",
        config.speed_radius
    );
    clean(
        data,
        &CleaningOp::NearbyPointsBySpeed {
            id_column: config.id_column,
            speed_radius: config.speed_radius,
        },
    )
}

/// Remove points whose incoming or outgoing speed exceeds `speed_max`.
pub fn clean_gps_speed_max_radius(
    data: &mut TrajectoryCollection,
    config: &CleaningConfig,
) -> Result<CleaningReport> {
    debug!(
        "[Cleaning] Clean gps points with speed max > {} meters by seconds",
        config.speed_max
    );
    clean(
        data,
        &CleaningOp::SpeedMaxRadius {
            id_column: config.id_column,
            speed_max: config.speed_max,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{TraceFilterError, TrackPoint};

    fn with_duplicates() -> TrajectoryCollection {
        TrajectoryCollection::from_points(vec![
            TrackPoint::new("a", 0.0, 0.00000, 0),
            TrackPoint::new("a", 0.0, 0.00001, 10),
            TrackPoint::new("a", 0.0, 0.00002, 20),
            TrackPoint::new("a", 0.0, 0.00100, 30),
            TrackPoint::new("a", 0.0, 0.00101, 40),
        ])
    }

    #[test]
    fn test_nearby_points_converge() {
        let mut data = with_duplicates();
        let report = clean_gps_nearby_points_by_distances(&mut data, &CleaningConfig::default())
            .unwrap();

        assert_eq!(report.rows_before, 5);
        assert_eq!(report.rows_after, 2);
        assert_eq!(report.rows_dropped, 3);
        assert_eq!(
            data.points()
                .iter()
                .map(|p| p.timestamp)
                .collect::<Vec<_>>(),
            vec![0, 30]
        );
    }

    #[test]
    fn test_cleaned_leaves_input_untouched() {
        let data = with_duplicates();
        let op = CleaningOp::NearbyPointsByDistance {
            id_column: IdColumn::TrajectoryId,
            radius_area: 10.0,
        };
        let out = cleaned(&data, &op).unwrap();
        assert_eq!(data.len(), 5);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_rerun_is_a_no_op() {
        let mut data = with_duplicates();
        let op = CleaningOp::NearbyPointsByDistance {
            id_column: IdColumn::TrajectoryId,
            radius_area: 10.0,
        };
        clean(&mut data, &op).unwrap();
        let second = clean(&mut data, &op).unwrap();
        assert_eq!(second.rows_dropped, 0);
        assert_eq!(second.iterations, 0);
    }

    #[test]
    fn test_missing_column_in_copy_mode_has_no_effect() {
        let data = with_duplicates();
        let op = CleaningOp::SpeedMaxRadius {
            id_column: IdColumn::SegmentId,
            speed_max: 1.0,
        };
        let err = cleaned(&data, &op).unwrap_err();
        assert!(matches!(err, TraceFilterError::MissingColumn { .. }));
        assert_eq!(data.len(), 5);
    }

    #[test]
    fn test_pipeline_order() {
        let ops = CleaningOp::pipeline(&CleaningConfig::default());
        assert_eq!(ops.len(), 4);
        assert!(matches!(ops[0], CleaningOp::GpsJumpsByDistance { .. }));
        assert!(matches!(
            ops[3],
            CleaningOp::TrajectoriesShortAndFewPoints { .. }
        ));
    }

    #[test]
    fn test_op_json_roundtrip_tag() {
        let op: CleaningOp =
            serde_json::from_str(r#"{"op": "speed_max_radius", "id_column": "trajectory_id", "speed_max": 20.0}"#)
                .unwrap();
        assert_eq!(
            op,
            CleaningOp::SpeedMaxRadius {
                id_column: IdColumn::TrajectoryId,
                speed_max: 20.0
            }
        );
    }
}
