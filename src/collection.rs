//! # Trajectory Collection
//!
//! Owns the points being cleaned or queried, in `(trajectory, time)` order,
//! together with their cached motion features.
//!
//! Row positions are the index: removing rows shifts later rows down, so
//! there is never a stale or foreign index to reset before filtering.
//!
//! Features are computed on demand for one grouping (`IdColumn`) and kept
//! consistent with the rows afterwards: when a row is removed, the features
//! of the row that followed it are recomputed against its new predecessor.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{OptionExt, Result};
use crate::features::{generate_motion_features, MotionFeatures};
use crate::{IdColumn, TrackPoint};

/// Cached motion features and the grouping they were computed for.
#[derive(Debug, Clone, PartialEq)]
struct FeatureCache {
    id_column: IdColumn,
    rows: Vec<MotionFeatures>,
}

/// An ordered collection of track points from any number of trajectories.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrajectoryCollection {
    points: Vec<TrackPoint>,
    features: Option<FeatureCache>,
}

impl TrajectoryCollection {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a collection from points already sorted by trajectory and time.
    pub fn from_points(points: Vec<TrackPoint>) -> Self {
        Self {
            points,
            features: None,
        }
    }

    /// Append a point. Cached features are discarded.
    pub fn push(&mut self, point: TrackPoint) {
        self.points.push(point);
        self.features = None;
    }

    /// Append all points of another collection (or iterator), in order.
    pub fn extend<I: IntoIterator<Item = TrackPoint>>(&mut self, points: I) {
        self.points.extend(points);
        self.features = None;
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[TrackPoint] {
        &self.points
    }

    pub fn into_points(self) -> Vec<TrackPoint> {
        self.points
    }

    // ========================================================================
    // Motion Features
    // ========================================================================

    /// Cached features, if computed for `id_column`.
    pub fn features_for(&self, id_column: IdColumn) -> Option<&[MotionFeatures]> {
        self.features
            .as_ref()
            .filter(|cache| cache.id_column == id_column)
            .map(|cache| cache.rows.as_slice())
    }

    /// Cached features for `id_column`, or a `MissingColumn` error naming
    /// `column` when they have not been computed.
    pub fn require_features(
        &self,
        id_column: IdColumn,
        column: &str,
    ) -> Result<&[MotionFeatures]> {
        self.features_for(id_column).ok_or_missing_column(column)
    }

    /// Compute features for `id_column` unless already cached.
    pub fn ensure_features(&mut self, id_column: IdColumn) -> Result<&[MotionFeatures]> {
        if self.features_for(id_column).is_none() {
            self.refresh_features(id_column)?;
        }
        self.require_features(id_column, "motion features")
    }

    /// Recompute features for `id_column` from scratch.
    pub fn refresh_features(&mut self, id_column: IdColumn) -> Result<()> {
        let rows = generate_motion_features(&self.points, id_column)?;
        self.features = Some(FeatureCache { id_column, rows });
        Ok(())
    }

    // ========================================================================
    // Grouping
    // ========================================================================

    /// Grouping key of every row, failing if any point lacks it.
    pub fn group_keys(&self, id_column: IdColumn) -> Result<Vec<&str>> {
        self.points
            .iter()
            .map(|p| id_column.key(p).ok_or_missing_column(id_column.name()))
            .collect()
    }

    /// Distinct keys in first-seen order.
    pub fn unique_ids(&self, id_column: IdColumn) -> Result<Vec<&str>> {
        let mut seen = HashSet::new();
        Ok(self
            .group_keys(id_column)?
            .into_iter()
            .filter(|key| seen.insert(*key))
            .collect())
    }

    /// Number of rows per key, in first-seen order.
    pub fn group_sizes(&self, id_column: IdColumn) -> Result<Vec<(String, usize)>> {
        let mut order: Vec<(String, usize)> = Vec::new();
        let mut slots: HashMap<&str, usize> = HashMap::new();

        for key in self.group_keys(id_column)? {
            let slot = *slots.entry(key).or_insert_with(|| {
                order.push((key.to_string(), 0));
                order.len() - 1
            });
            order[slot].1 += 1;
        }

        Ok(order)
    }

    /// Sum of `value(row, point)` per key, in first-seen order. NaN values
    /// are skipped.
    pub fn group_sums<F>(&self, id_column: IdColumn, value: F) -> Result<Vec<(String, f64)>>
    where
        F: Fn(usize, &TrackPoint) -> f64,
    {
        let mut order: Vec<(String, f64)> = Vec::new();
        let mut slots: HashMap<&str, usize> = HashMap::new();

        for (row, (key, point)) in self
            .group_keys(id_column)?
            .into_iter()
            .zip(&self.points)
            .enumerate()
        {
            let slot = *slots.entry(key).or_insert_with(|| {
                order.push((key.to_string(), 0.0));
                order.len() - 1
            });
            let v = value(row, point);
            if !v.is_nan() {
                order[slot].1 += v;
            }
        }

        Ok(order)
    }

    /// Points whose `id_column` equals `id`, in order. Points lacking the
    /// column never match.
    pub fn group(&self, id_column: IdColumn, id: &str) -> Vec<TrackPoint> {
        self.points
            .iter()
            .filter(|p| id_column.key(p) == Some(id))
            .cloned()
            .collect()
    }

    /// Points grouped by `id_column`, groups in first-seen order.
    pub fn groups(&self, id_column: IdColumn) -> Result<Vec<(String, Vec<TrackPoint>)>> {
        let mut order: Vec<(String, Vec<TrackPoint>)> = Vec::new();
        let mut slots: HashMap<&str, usize> = HashMap::new();

        for (key, point) in self.group_keys(id_column)?.into_iter().zip(&self.points) {
            let slot = *slots.entry(key).or_insert_with(|| {
                order.push((key.to_string(), Vec::new()));
                order.len() - 1
            });
            order[slot].1.push(point.clone());
        }

        Ok(order)
    }

    // ========================================================================
    // Row Removal
    // ========================================================================

    /// Keep only rows whose mask entry is `true`; returns the number of rows
    /// removed. A mask shorter than the collection keeps the remaining rows.
    ///
    /// If features are cached, every kept row that lost its predecessor gets
    /// its features recomputed (NaN if it now starts its trajectory).
    pub fn retain_mask(&mut self, keep: &[bool]) -> usize {
        let before = self.points.len();
        let points = std::mem::take(&mut self.points);
        let cache = self.features.take();

        let mut kept: Vec<TrackPoint> = Vec::with_capacity(before);
        let mut kept_features: Vec<MotionFeatures> = Vec::new();
        let mut predecessor_removed = false;

        for (row, point) in points.into_iter().enumerate() {
            if !keep.get(row).copied().unwrap_or(true) {
                predecessor_removed = true;
                continue;
            }

            if let Some(cache) = cache.as_ref() {
                let features = if predecessor_removed {
                    match kept.last() {
                        Some(prev)
                            if cache.id_column.key(prev) == cache.id_column.key(&point) =>
                        {
                            MotionFeatures::between(prev, &point)
                        }
                        _ => MotionFeatures::FIRST,
                    }
                } else {
                    cache.rows[row]
                };
                kept_features.push(features);
            }

            kept.push(point);
            predecessor_removed = false;
        }

        self.points = kept;
        if let Some(mut cache) = cache {
            cache.rows = kept_features;
            self.features = Some(cache);
        }

        before - self.points.len()
    }

    /// Remove rows by position; returns the number of rows removed.
    /// Out-of-range and repeated positions are ignored.
    pub fn drop_rows(&mut self, rows: &[usize]) -> usize {
        if rows.is_empty() {
            return 0;
        }
        let mut keep = vec![true; self.points.len()];
        for &row in rows {
            if let Some(slot) = keep.get_mut(row) {
                *slot = false;
            }
        }
        self.retain_mask(&keep)
    }

    /// Remove every row whose key is in `ids`; returns the number of rows
    /// removed.
    pub fn drop_groups(&mut self, id_column: IdColumn, ids: &HashSet<String>) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let keep: Vec<bool> = self
            .group_keys(id_column)?
            .into_iter()
            .map(|key| !ids.contains(key))
            .collect();
        Ok(self.retain_mask(&keep))
    }
}

impl From<Vec<TrackPoint>> for TrajectoryCollection {
    fn from(points: Vec<TrackPoint>) -> Self {
        Self::from_points(points)
    }
}

impl FromIterator<TrackPoint> for TrajectoryCollection {
    fn from_iter<I: IntoIterator<Item = TrackPoint>>(iter: I) -> Self {
        Self::from_points(iter.into_iter().collect())
    }
}

impl Serialize for TrajectoryCollection {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.points.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TrajectoryCollection {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Vec::<TrackPoint>::deserialize(deserializer).map(Self::from_points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TraceFilterError;

    fn sample() -> TrajectoryCollection {
        TrajectoryCollection::from_points(vec![
            TrackPoint::new("a", 0.0, 0.000, 0),
            TrackPoint::new("a", 0.0, 0.001, 10),
            TrackPoint::new("a", 0.0, 0.002, 20),
            TrackPoint::new("b", 1.0, 0.000, 0),
            TrackPoint::new("b", 1.0, 0.001, 10),
            TrackPoint::new("c", 2.0, 0.000, 0),
        ])
    }

    #[test]
    fn test_group_sizes_first_seen_order() {
        let sizes = sample().group_sizes(IdColumn::TrajectoryId).unwrap();
        assert_eq!(
            sizes,
            vec![
                ("a".to_string(), 3),
                ("b".to_string(), 2),
                ("c".to_string(), 1)
            ]
        );
    }

    #[test]
    fn test_group_sums_skip_nan() {
        let mut data = sample();
        data.ensure_features(IdColumn::TrajectoryId).unwrap();
        let features = data.features_for(IdColumn::TrajectoryId).unwrap().to_vec();
        let sums = data
            .group_sums(IdColumn::TrajectoryId, |row, _| features[row].time_to_prev)
            .unwrap();
        assert_eq!(sums[0], ("a".to_string(), 20.0));
        assert_eq!(sums[2], ("c".to_string(), 0.0));
    }

    #[test]
    fn test_drop_rows_recomputes_successor() {
        let mut data = sample();
        data.ensure_features(IdColumn::TrajectoryId).unwrap();

        assert_eq!(data.drop_rows(&[1]), 1);

        let features = data.features_for(IdColumn::TrajectoryId).unwrap();
        assert_eq!(data.len(), 5);
        assert_eq!(features.len(), 5);
        assert_eq!(features[1].time_to_prev, 20.0);
        assert!(features[1].dist_to_prev > 200.0);
    }

    #[test]
    fn test_dropping_first_point_makes_successor_first() {
        let mut data = sample();
        data.ensure_features(IdColumn::TrajectoryId).unwrap();
        data.drop_rows(&[3]);

        let features = data.features_for(IdColumn::TrajectoryId).unwrap();
        assert_eq!(data.points()[3].trajectory_id, "b");
        assert!(features[3].is_first());
    }

    #[test]
    fn test_features_after_removal_match_fresh_computation() {
        let mut data = sample();
        data.ensure_features(IdColumn::TrajectoryId).unwrap();
        data.drop_rows(&[0, 2, 4]);

        let cached = data.features_for(IdColumn::TrajectoryId).unwrap().to_vec();
        let fresh = generate_motion_features(data.points(), IdColumn::TrajectoryId).unwrap();
        for (a, b) in cached.iter().zip(&fresh) {
            assert_eq!(a.is_first(), b.is_first());
            if !a.is_first() {
                assert_eq!(a, b);
            }
        }
    }

    #[test]
    fn test_drop_groups() {
        let mut data = sample();
        let ids: HashSet<String> = ["a".to_string(), "c".to_string()].into();
        assert_eq!(data.drop_groups(IdColumn::TrajectoryId, &ids).unwrap(), 4);
        assert_eq!(data.unique_ids(IdColumn::TrajectoryId).unwrap(), vec!["b"]);
    }

    #[test]
    fn test_missing_grouping_column() {
        let data = sample();
        assert!(matches!(
            data.group_sizes(IdColumn::SegmentId),
            Err(TraceFilterError::MissingColumn { .. })
        ));
    }

    #[test]
    fn test_push_invalidates_features() {
        let mut data = sample();
        data.ensure_features(IdColumn::TrajectoryId).unwrap();
        data.push(TrackPoint::new("c", 2.0, 0.001, 10));
        assert!(data.features_for(IdColumn::TrajectoryId).is_none());
    }

    #[test]
    fn test_groups_first_seen_order() {
        let groups = sample().groups(IdColumn::TrajectoryId).unwrap();
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].0, "a");
        assert_eq!(groups[0].1.len(), 3);
        assert_eq!(sample().group(IdColumn::TrajectoryId, "b").len(), 2);
    }

    #[test]
    fn test_groups_by_segment() {
        let data = TrajectoryCollection::from_points(vec![
            TrackPoint::new("a", 0.0, 0.000, 0).with_segment("s2"),
            TrackPoint::new("a", 0.0, 0.001, 10).with_segment("s1"),
            TrackPoint::new("a", 0.0, 0.002, 20).with_segment("s2"),
        ]);
        let groups = data.groups(IdColumn::SegmentId).unwrap();
        assert_eq!(groups[0].0, "s2");
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(data.group(IdColumn::SegmentId, "s1").len(), 1);
        assert!(matches!(
            sample().groups(IdColumn::SegmentId),
            Err(TraceFilterError::MissingColumn { .. })
        ));
    }
}
