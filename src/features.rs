//! Motion features derived from consecutive points of a trajectory.
//!
//! For every point, distance, elapsed time and speed relative to the previous
//! point of the same trajectory. The first point of each trajectory has NaN
//! features.

use serde::{Deserialize, Serialize};

use crate::error::{OptionExt, Result};
use crate::geo_utils::haversine_distance;
use crate::{IdColumn, TrackPoint};

/// A feature column usable by threshold predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// Meters to the previous point
    DistToPrev,
    /// Seconds since the previous point
    TimeToPrev,
    /// Meters per second from the previous point
    SpeedToPrev,
}

impl Feature {
    pub fn name(&self) -> &'static str {
        match self {
            Feature::DistToPrev => "dist_to_prev",
            Feature::TimeToPrev => "time_to_prev",
            Feature::SpeedToPrev => "speed_to_prev",
        }
    }
}

/// Per-point motion features.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionFeatures {
    /// Distance to the previous point in meters
    pub dist_to_prev: f64,
    /// Time since the previous point in seconds
    pub time_to_prev: f64,
    /// `dist_to_prev / time_to_prev` in m/s
    pub speed_to_prev: f64,
}

impl MotionFeatures {
    /// Features of the first point of a trajectory.
    pub const FIRST: MotionFeatures = MotionFeatures {
        dist_to_prev: f64::NAN,
        time_to_prev: f64::NAN,
        speed_to_prev: f64::NAN,
    };

    /// Features of `curr` relative to `prev`.
    ///
    /// Equal timestamps give an infinite speed (or NaN when the points also
    /// coincide).
    pub fn between(prev: &TrackPoint, curr: &TrackPoint) -> Self {
        let dist_to_prev = haversine_distance(&prev.position(), &curr.position());
        let time_to_prev = curr.timestamp as f64 - prev.timestamp as f64;
        Self {
            dist_to_prev,
            time_to_prev,
            speed_to_prev: dist_to_prev / time_to_prev,
        }
    }

    /// Value of one feature column.
    pub fn get(&self, feature: Feature) -> f64 {
        match feature {
            Feature::DistToPrev => self.dist_to_prev,
            Feature::TimeToPrev => self.time_to_prev,
            Feature::SpeedToPrev => self.speed_to_prev,
        }
    }

    pub fn is_first(&self) -> bool {
        self.dist_to_prev.is_nan() && self.time_to_prev.is_nan()
    }
}

/// Compute motion features for every point, grouping by `id_column`.
///
/// Fails with `MissingColumn` if any point lacks the grouping key.
pub fn generate_motion_features(
    points: &[TrackPoint],
    id_column: IdColumn,
) -> Result<Vec<MotionFeatures>> {
    let mut features = Vec::with_capacity(points.len());
    let mut prev: Option<(&str, &TrackPoint)> = None;

    for point in points {
        let key = id_column.key(point).ok_or_missing_column(id_column.name())?;
        let f = match prev {
            Some((prev_key, prev_point)) if prev_key == key => {
                MotionFeatures::between(prev_point, point)
            }
            _ => MotionFeatures::FIRST,
        };
        features.push(f);
        prev = Some((key, point));
    }

    Ok(features)
}

/// Distances from a point to its neighbours within the same trajectory.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeighbourDistances {
    pub dist_to_prev: f64,
    pub dist_to_next: f64,
    /// Distance between the previous and the next point, skipping this one
    pub dist_prev_to_next: f64,
}

/// Previous/next neighbour distances for every point, grouping by
/// `id_column`. Missing neighbours give NaN.
pub fn neighbour_distances(
    points: &[TrackPoint],
    id_column: IdColumn,
) -> Result<Vec<NeighbourDistances>> {
    let keys = points
        .iter()
        .map(|p| id_column.key(p).ok_or_missing_column(id_column.name()))
        .collect::<Result<Vec<&str>>>()?;

    let neighbour = |i: usize, j: usize| {
        if keys[i] == keys[j] {
            Some(&points[j])
        } else {
            None
        }
    };
    let dist = |a: Option<&TrackPoint>, b: Option<&TrackPoint>| match (a, b) {
        (Some(a), Some(b)) => haversine_distance(&a.position(), &b.position()),
        _ => f64::NAN,
    };

    Ok((0..points.len())
        .map(|i| {
            let prev = if i > 0 { neighbour(i, i - 1) } else { None };
            let next = if i + 1 < points.len() {
                neighbour(i, i + 1)
            } else {
                None
            };
            let curr = Some(&points[i]);
            NeighbourDistances {
                dist_to_prev: dist(prev, curr),
                dist_to_next: dist(curr, next),
                dist_prev_to_next: dist(prev, next),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TraceFilterError;

    fn track() -> Vec<TrackPoint> {
        vec![
            TrackPoint::new("a", 0.0, 0.0, 0),
            TrackPoint::new("a", 0.0, 0.001, 10),
            TrackPoint::new("a", 0.0, 0.002, 20),
            TrackPoint::new("b", 1.0, 0.0, 0),
            TrackPoint::new("b", 1.0, 0.001, 5),
        ]
    }

    #[test]
    fn test_first_point_of_each_trajectory_is_nan() {
        let features = generate_motion_features(&track(), IdColumn::TrajectoryId).unwrap();
        assert!(features[0].is_first());
        assert!(features[3].is_first());
        assert!(!features[1].is_first());
    }

    #[test]
    fn test_speed_is_distance_over_time() {
        let features = generate_motion_features(&track(), IdColumn::TrajectoryId).unwrap();
        let f = features[1];
        assert!(f.dist_to_prev > 100.0 && f.dist_to_prev < 120.0);
        assert_eq!(f.time_to_prev, 10.0);
        assert!((f.speed_to_prev - f.dist_to_prev / 10.0).abs() < 1e-9);
        assert_eq!(features[4].time_to_prev, 5.0);
    }

    #[test]
    fn test_extreme_timestamps_do_not_overflow() {
        let points = vec![
            TrackPoint::new("a", 0.0, 0.0, i64::MIN),
            TrackPoint::new("a", 0.0, 0.001, i64::MAX),
        ];
        let features = generate_motion_features(&points, IdColumn::TrajectoryId).unwrap();
        assert!(features[1].time_to_prev > 1.8e19);
        assert!(features[1].speed_to_prev >= 0.0);
    }

    #[test]
    fn test_missing_segment_id_fails() {
        let err = generate_motion_features(&track(), IdColumn::SegmentId).unwrap_err();
        assert_eq!(
            err,
            TraceFilterError::MissingColumn {
                column: "segment_id".to_string()
            }
        );
    }

    #[test]
    fn test_neighbour_distances_respect_trajectory_boundaries() {
        let d = neighbour_distances(&track(), IdColumn::TrajectoryId).unwrap();
        assert!(d[0].dist_to_prev.is_nan());
        assert!(d[0].dist_prev_to_next.is_nan());
        assert!(d[1].dist_prev_to_next > d[1].dist_to_next);
        assert!(d[2].dist_to_next.is_nan());
        assert!(d[3].dist_to_prev.is_nan());
    }
}
