//! Single-pass column filters.
//!
//! Each filter builds a keep-mask from one or more columns and removes the
//! rest. `filter_out` inverts the mask.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::cleaning::CleaningReport;
use crate::collection::TrajectoryCollection;
use crate::error::Result;
use crate::geo_utils::bbox_contains;
use crate::{BoundingBox, IdColumn, TrackPoint};

/// Keep points inside `bbox` (or outside, with `filter_out`). Bounds are
/// inclusive.
pub fn by_bbox(
    data: &mut TrajectoryCollection,
    bbox: &BoundingBox,
    filter_out: bool,
) -> Result<CleaningReport> {
    apply_mask(data, "bbox", filter_out, |p| {
        bbox_contains(bbox, &p.position())
    })
}

/// Keep points with `start <= timestamp <= end`. Either bound may be
/// omitted; with neither, every point matches.
pub fn by_datetime(
    data: &mut TrajectoryCollection,
    start: Option<i64>,
    end: Option<i64>,
    filter_out: bool,
) -> Result<CleaningReport> {
    apply_mask(data, "datetime", filter_out, |p| {
        start.map_or(true, |s| p.timestamp >= s) && end.map_or(true, |e| p.timestamp <= e)
    })
}

/// Keep points whose `id_column` equals `id`. Points lacking the column
/// never match.
pub fn by_id(
    data: &mut TrajectoryCollection,
    id: &str,
    id_column: IdColumn,
    filter_out: bool,
) -> Result<CleaningReport> {
    apply_mask(data, id_column.name(), filter_out, |p| {
        id_column.key(p) == Some(id)
    })
}

/// Columns compared by [`clean_consecutive_duplicates`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateColumn {
    TrajectoryId,
    SegmentId,
    Latitude,
    Longitude,
    Timestamp,
}

impl DuplicateColumn {
    pub const ALL: [DuplicateColumn; 5] = [
        DuplicateColumn::TrajectoryId,
        DuplicateColumn::SegmentId,
        DuplicateColumn::Latitude,
        DuplicateColumn::Longitude,
        DuplicateColumn::Timestamp,
    ];

    /// Whether two points hold the same value in this column. NaN
    /// coordinates never compare equal.
    fn same(&self, a: &TrackPoint, b: &TrackPoint) -> bool {
        match self {
            DuplicateColumn::TrajectoryId => a.trajectory_id == b.trajectory_id,
            DuplicateColumn::SegmentId => a.segment_id == b.segment_id,
            DuplicateColumn::Latitude => a.latitude == b.latitude,
            DuplicateColumn::Longitude => a.longitude == b.longitude,
            DuplicateColumn::Timestamp => a.timestamp == b.timestamp,
        }
    }
}

/// Which row of a run of consecutive duplicates survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Keep {
    #[default]
    First,
    Last,
}

/// Remove rows equal to their predecessor (`Keep::First`) or successor
/// (`Keep::Last`) on every column of `subset`. An empty subset compares all
/// columns.
pub fn clean_consecutive_duplicates(
    data: &mut TrajectoryCollection,
    subset: &[DuplicateColumn],
    keep: Keep,
) -> Result<CleaningReport> {
    let columns = if subset.is_empty() {
        &DuplicateColumn::ALL[..]
    } else {
        subset
    };
    let points = data.points();
    let duplicate = |i: usize, j: usize| columns.iter().all(|c| c.same(&points[i], &points[j]));

    let mask: Vec<bool> = (0..points.len())
        .map(|i| match keep {
            Keep::First => i == 0 || !duplicate(i, i - 1),
            Keep::Last => i + 1 == points.len() || !duplicate(i, i + 1),
        })
        .collect();

    retain_logged(data, "consecutive duplicates", &mask)
}

fn apply_mask<F>(
    data: &mut TrajectoryCollection,
    label: &str,
    filter_out: bool,
    matches: F,
) -> Result<CleaningReport>
where
    F: Fn(&TrackPoint) -> bool,
{
    let mask: Vec<bool> = data
        .points()
        .iter()
        .map(|p| matches(p) != filter_out)
        .collect();
    retain_logged(data, label, &mask)
}

fn retain_logged(
    data: &mut TrajectoryCollection,
    label: &str,
    mask: &[bool],
) -> Result<CleaningReport> {
    let rows_before = data.len();
    let dropped = data.retain_mask(mask);
    debug!("[Filters] Filter by {} dropped {} rows", label, dropped);
    Ok(CleaningReport::single_pass(rows_before, data.len(), 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo_utils::bbox_by_radius;
    use crate::GpsPoint;

    fn sample() -> TrajectoryCollection {
        TrajectoryCollection::from_points(vec![
            TrackPoint::new("a", 0.0, 0.0, 100).with_segment("a1"),
            TrackPoint::new("a", 0.0, 0.0, 100).with_segment("a1"),
            TrackPoint::new("a", 0.5, 0.5, 200).with_segment("a2"),
            TrackPoint::new("b", 5.0, 5.0, 300).with_segment("b1"),
            TrackPoint::new("b", 5.0, 5.0, 400).with_segment("b1"),
        ])
    }

    #[test]
    fn test_by_bbox_and_filter_out() {
        let bbox = BoundingBox::new(-1.0, -1.0, 1.0, 1.0);

        let mut inside = sample();
        by_bbox(&mut inside, &bbox, false).unwrap();
        assert_eq!(inside.len(), 3);

        let mut outside = sample();
        by_bbox(&mut outside, &bbox, true).unwrap();
        assert_eq!(outside.len(), 2);
    }

    #[test]
    fn test_by_bbox_by_radius() {
        let mut data = sample();
        let bbox = bbox_by_radius(&GpsPoint::new(5.0, 5.0), 1000.0);
        by_bbox(&mut data, &bbox, false).unwrap();
        assert!(data.points().iter().all(|p| p.trajectory_id == "b"));
    }

    #[test]
    fn test_by_datetime_bounds() {
        let mut data = sample();
        let report = by_datetime(&mut data, Some(200), Some(300), false).unwrap();
        assert_eq!(report.rows_after, 2);

        let mut data = sample();
        by_datetime(&mut data, None, Some(100), false).unwrap();
        assert_eq!(data.len(), 2);

        let mut data = sample();
        by_datetime(&mut data, Some(300), None, true).unwrap();
        assert_eq!(data.len(), 3);
    }

    #[test]
    fn test_by_id_and_segment() {
        let mut data = sample();
        by_id(&mut data, "b", IdColumn::TrajectoryId, false).unwrap();
        assert_eq!(data.len(), 2);

        let mut data = sample();
        by_id(&mut data, "a1", IdColumn::SegmentId, true).unwrap();
        assert_eq!(data.len(), 3);
    }

    #[test]
    fn test_consecutive_duplicates_all_columns() {
        let mut data = sample();
        let report = clean_consecutive_duplicates(&mut data, &[], Keep::First).unwrap();
        assert_eq!(report.rows_dropped, 1);
    }

    #[test]
    fn test_consecutive_duplicates_subset_keep_last() {
        let mut data = sample();
        clean_consecutive_duplicates(
            &mut data,
            &[DuplicateColumn::Latitude, DuplicateColumn::Longitude],
            Keep::Last,
        )
        .unwrap();
        let stamps: Vec<i64> = data.points().iter().map(|p| p.timestamp).collect();
        assert_eq!(stamps, vec![100, 200, 400]);
    }
}
