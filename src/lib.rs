//! # Trace Filter
//!
//! GPS trajectory cleaning and similarity queries.
//!
//! This library provides:
//! - Convergence cleaning: GPS jumps, nearby points, excessive speed
//! - Trajectory-level filters: few points, short trajectories, short durations
//! - Column filters: bounding box, time range, id, consecutive duplicates
//! - Range and k-nearest-neighbour queries using MEDP/MEDT distances
//!
//! ## Features
//!
//! - **`parallel`** - Compute query distances in parallel with rayon
//!
//! ## Quick Start
//!
//! ```rust
//! use tracefilter::{TrackPoint, TrajectoryCollection, CleaningConfig};
//! use tracefilter::cleaning::clean_gps_speed_max_radius;
//!
//! let mut data = TrajectoryCollection::from_points(vec![
//!     TrackPoint::new("car-1", 51.5074, -0.1278, 0),
//!     TrackPoint::new("car-1", 51.5075, -0.1278, 10),
//!     TrackPoint::new("car-1", 51.6000, -0.1278, 11), // ~10km in one second
//!     TrackPoint::new("car-1", 51.5077, -0.1278, 30),
//! ]);
//!
//! let report = clean_gps_speed_max_radius(&mut data, &CleaningConfig::default()).unwrap();
//! assert!(report.rows_dropped > 0);
//! ```

use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{OptionExt, Result, TraceFilterError};

// Geographic utilities (haversine distance, bounding boxes)
pub mod geo_utils;

// Point collection with cached motion features
pub mod collection;
pub use collection::TrajectoryCollection;

// Distance/time/speed to previous point
pub mod features;
pub use features::{Feature, MotionFeatures};

// Statistical GPS-jump detection
pub mod outliers;
pub use outliers::{NeighbourJumpDetector, OutlierDetector};

// Drop predicates evaluated by the convergence engine
pub mod predicates;
pub use predicates::Predicate;

// Convergence cleaning engine and cleaning operations
pub mod cleaning;
pub use cleaning::{clean, cleaned, clean_until_converged, CleaningOp, CleaningReport};

// Whole-trajectory filters (point count, distance, duration)
pub mod trajectory_filters;
pub use trajectory_filters::{
    clean_id_by_time_max, clean_trajectories_short_and_few_points,
    clean_trajectories_with_few_points,
};

// Single-pass column filters
pub mod filters;

// Trajectory-to-trajectory distance measures
pub mod distance;
pub use distance::{DistanceMeasure, TrajectoryDistance};

// Range and k-nearest-neighbour queries
pub mod query;
pub use query::{knn_neighbours, knn_query, range_query, Neighbour, TopKList};

// ============================================================================
// Core Types
// ============================================================================

/// A GPS coordinate with latitude and longitude.
///
/// # Example
/// ```
/// use tracefilter::GpsPoint;
/// let point = GpsPoint::new(51.5074, -0.1278); // London
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsPoint {
    /// Create a new GPS point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// A single timestamped sample of a trajectory.
///
/// Points of a collection are expected to be sorted by
/// `(trajectory_id, timestamp)`: the position of a point in the collection
/// carries its temporal order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    /// Identifier of the entity/trajectory this sample belongs to
    pub trajectory_id: String,
    /// Optional sub-trajectory (segment) identifier
    #[serde(default)]
    pub segment_id: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    /// Unix timestamp (seconds since epoch)
    pub timestamp: i64,
}

impl TrackPoint {
    /// Create a point without a segment id.
    pub fn new(trajectory_id: &str, latitude: f64, longitude: f64, timestamp: i64) -> Self {
        Self {
            trajectory_id: trajectory_id.to_string(),
            segment_id: None,
            latitude,
            longitude,
            timestamp,
        }
    }

    /// Attach a segment id.
    pub fn with_segment(mut self, segment_id: &str) -> Self {
        self.segment_id = Some(segment_id.to_string());
        self
    }

    /// The coordinate of this sample.
    pub fn position(&self) -> GpsPoint {
        GpsPoint::new(self.latitude, self.longitude)
    }
}

/// Which identifier groups points into trajectories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdColumn {
    /// Group by `trajectory_id` (always present)
    #[default]
    TrajectoryId,
    /// Group by `segment_id` (optional per point)
    SegmentId,
}

impl IdColumn {
    /// Column name used in error messages and logs.
    pub fn name(&self) -> &'static str {
        match self {
            IdColumn::TrajectoryId => "trajectory_id",
            IdColumn::SegmentId => "segment_id",
        }
    }

    /// Grouping key of a point, or `None` if the point lacks the column.
    pub fn key<'a>(&self, point: &'a TrackPoint) -> Option<&'a str> {
        match self {
            IdColumn::TrajectoryId => Some(point.trajectory_id.as_str()),
            IdColumn::SegmentId => point.segment_id.as_deref(),
        }
    }
}

/// Axis-aligned bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub min_lng: f64,
    pub max_lat: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    /// Create a bounding box from its corners.
    pub fn new(min_lat: f64, min_lng: f64, max_lat: f64, max_lng: f64) -> Self {
        Self {
            min_lat,
            min_lng,
            max_lat,
            max_lng,
        }
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Parameters for the cleaning operations.
///
/// Missing fields take their default value when loaded from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
    /// Identifier used to group points into trajectories.
    /// Default: `trajectory_id`
    pub id_column: IdColumn,

    /// Sensitivity of the GPS-jump test. A point is a jump when both of its
    /// neighbour distances exceed `jump_coefficient` times the distance
    /// between those neighbours.
    /// Default: 3.0
    pub jump_coefficient: f64,

    /// Minimum distance (meters) every involved segment must exceed for a
    /// point to be considered a jump.
    /// Default: 1.0
    pub jump_threshold: f64,

    /// Points at most this far (meters) from their predecessor are dropped.
    /// Default: 10.0
    pub radius_area: f64,

    /// Points at most this fast (m/s) from their predecessor are dropped.
    /// Default: 0.0
    pub speed_radius: f64,

    /// Maximum speed (m/s) on either edge adjacent to a point.
    /// Default: 50.0
    pub speed_max: f64,

    /// Trajectories with fewer points are dropped.
    /// Default: 2
    pub min_points_per_trajectory: usize,

    /// Trajectories shorter than this (meters) are dropped.
    /// Default: 100.0
    pub min_trajectory_distance: f64,

    /// Trajectories whose summed `time_to_prev` (seconds) is below this are
    /// dropped.
    /// Default: 3600.0
    pub time_max: f64,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            id_column: IdColumn::TrajectoryId,
            jump_coefficient: 3.0,
            jump_threshold: 1.0,
            radius_area: 10.0,
            speed_radius: 0.0,
            speed_max: 50.0,
            min_points_per_trajectory: 2,
            min_trajectory_distance: 100.0,
            time_max: 3600.0,
        }
    }
}

impl CleaningConfig {
    /// Load a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Parameters for range and KNN queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Range query threshold: candidates closer than this are returned.
    /// Default: 1000.0
    pub min_dist: f64,

    /// Number of neighbours kept by KNN queries.
    /// Default: 5
    pub k: usize,

    /// Trajectory distance measure.
    /// Default: MEDP
    pub measure: DistanceMeasure,

    /// Identifier used to group candidates (and to recognise the
    /// reference's own group in KNN queries).
    /// Default: `trajectory_id`
    pub id_column: IdColumn,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            min_dist: 1000.0,
            k: 5,
            measure: DistanceMeasure::Medp,
            id_column: IdColumn::TrajectoryId,
        }
    }
}

impl QueryConfig {
    /// Load a configuration from JSON.
    ///
    /// An unknown `measure` is reported as a configuration error.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

// ============================================================================
// Tests
// ============================================================================
