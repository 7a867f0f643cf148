//! # Similarity Queries
//!
//! Range and k-nearest-neighbour queries of a reference trajectory against a
//! candidate collection, under a [`TrajectoryDistance`].
//!
//! Candidates are grouped by an [`IdColumn`] and visited in first-seen order.
//! With the `parallel` feature the per-candidate distances are computed with
//! rayon; selection still runs sequentially in visiting order, so results do
//! not depend on the feature.

use log::{debug, info};
use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::collection::TrajectoryCollection;
use crate::distance::{DistanceMeasure, TrajectoryDistance};
use crate::error::{ensure_finite, OptionExt, Result};
use crate::{IdColumn, QueryConfig, TrackPoint};

/// A trajectory kept by a KNN query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neighbour {
    /// Value of the grouping column the query ran with
    pub id: String,
    pub distance: f64,
}

/// Fixed-size list of the best candidates seen so far.
///
/// Starts with `k` empty slots at infinite distance. A candidate overwrites
/// the *first* slot whose distance is strictly greater than its own and the
/// scan stops there; earlier slots are never touched and nothing is shifted.
/// The slots are therefore not kept sorted, and which trajectory survives a
/// near-tie depends on visiting order.
#[derive(Debug, Clone, PartialEq)]
pub struct TopKList {
    slots: Vec<(f64, Option<String>)>,
}

impl TopKList {
    /// `k` empty slots.
    pub fn new(k: usize) -> Self {
        Self {
            slots: vec![(f64::INFINITY, None); k],
        }
    }

    /// Offer a candidate; returns the slot it was written to, if any.
    pub fn offer(&mut self, distance: f64, id: &str) -> Option<usize> {
        let slot = self.slots.iter().position(|(d, _)| distance < *d)?;
        self.slots[slot] = (distance, Some(id.to_string()));
        Some(slot)
    }

    /// Filled slots in slot order; empty slots are skipped.
    pub fn neighbours(&self) -> Vec<Neighbour> {
        self.slots
            .iter()
            .filter_map(|(distance, id)| {
                id.as_ref().map(|id| Neighbour {
                    id: id.clone(),
                    distance: *distance,
                })
            })
            .collect()
    }
}

/// Distance from `reference` to every candidate group, in first-seen order.
fn candidate_distances<M>(
    reference: &[TrackPoint],
    candidates: &TrajectoryCollection,
    id_column: IdColumn,
    measure: &M,
) -> Result<Vec<(String, Vec<TrackPoint>, f64)>>
where
    M: TrajectoryDistance + Sync,
{
    let groups = candidates.groups(id_column)?;

    #[cfg(feature = "parallel")]
    let iter = groups.into_par_iter();
    #[cfg(not(feature = "parallel"))]
    let iter = groups.into_iter();

    Ok(iter
        .map(|(id, points)| {
            let d = measure.distance(reference, &points);
            (id, points, d)
        })
        .collect())
}

/// Every candidate group closer than `min_dist` to `reference`.
///
/// Candidates are grouped by `id_column`; matching groups are concatenated
/// in first-seen order. The reference's own id is not excluded.
pub fn range_query<M>(
    reference: &[TrackPoint],
    candidates: &TrajectoryCollection,
    id_column: IdColumn,
    min_dist: f64,
    measure: &M,
) -> Result<TrajectoryCollection>
where
    M: TrajectoryDistance + Sync,
{
    ensure_finite("min_dist", min_dist)?;

    let mut result = TrajectoryCollection::new();
    let mut matched = 0;
    for (id, points, d) in candidate_distances(reference, candidates, id_column, measure)? {
        if d < min_dist {
            debug!("[Query] {} within range ({:.1} < {})", id, d, min_dist);
            result.extend(points);
            matched += 1;
        }
    }

    info!(
        "[Query] Range query matched {} groups by {} ({} points)",
        matched,
        id_column.name(),
        result.len()
    );
    Ok(result)
}

/// The final Top-K List of a KNN query, see [`TopKList`].
///
/// Candidates are grouped by `id_column`. The group sharing the id of the
/// reference's first point is skipped; a reference lacking the column fails
/// with `MissingColumn`.
pub fn knn_neighbours<M>(
    reference: &[TrackPoint],
    candidates: &TrajectoryCollection,
    id_column: IdColumn,
    k: usize,
    measure: &M,
) -> Result<Vec<Neighbour>>
where
    M: TrajectoryDistance + Sync,
{
    let reference_id = reference
        .first()
        .map(|p| id_column.key(p).ok_or_missing_column(id_column.name()))
        .transpose()?;
    let mut top = TopKList::new(k);

    for (id, _, d) in candidate_distances(reference, candidates, id_column, measure)? {
        if Some(id.as_str()) == reference_id {
            continue;
        }
        if let Some(slot) = top.offer(d, &id) {
            debug!("[Query] {} ({:.1}) written to slot {}", id, d, slot);
        }
    }

    Ok(top.neighbours())
}

/// Points of the `k` nearest groups, concatenated in slot order.
pub fn knn_query<M>(
    reference: &[TrackPoint],
    candidates: &TrajectoryCollection,
    id_column: IdColumn,
    k: usize,
    measure: &M,
) -> Result<TrajectoryCollection>
where
    M: TrajectoryDistance + Sync,
{
    let neighbours = knn_neighbours(reference, candidates, id_column, k, measure)?;

    let mut result = TrajectoryCollection::new();
    for n in &neighbours {
        result.extend(candidates.group(id_column, &n.id));
    }

    info!(
        "[Query] KNN query kept {} of {} slots ({} points)",
        neighbours.len(),
        k,
        result.len()
    );
    Ok(result)
}

/// [`range_query`] with the measure selected by name (`MEDP`/`MEDT`).
///
/// An unknown name fails before any candidate is visited.
pub fn range_query_by_name(
    reference: &[TrackPoint],
    candidates: &TrajectoryCollection,
    id_column: IdColumn,
    min_dist: f64,
    measure: &str,
) -> Result<TrajectoryCollection> {
    let measure: DistanceMeasure = measure.parse()?;
    range_query(reference, candidates, id_column, min_dist, &measure)
}

/// [`knn_query`] with the measure selected by name (`MEDP`/`MEDT`).
pub fn knn_query_by_name(
    reference: &[TrackPoint],
    candidates: &TrajectoryCollection,
    id_column: IdColumn,
    k: usize,
    measure: &str,
) -> Result<TrajectoryCollection> {
    let measure: DistanceMeasure = measure.parse()?;
    knn_query(reference, candidates, id_column, k, &measure)
}

/// Run a range query with the settings of `config`.
pub fn range_query_with_config(
    reference: &[TrackPoint],
    candidates: &TrajectoryCollection,
    config: &QueryConfig,
) -> Result<TrajectoryCollection> {
    range_query(
        reference,
        candidates,
        config.id_column,
        config.min_dist,
        &config.measure,
    )
}

/// Run a KNN query with the settings of `config`.
pub fn knn_query_with_config(
    reference: &[TrackPoint],
    candidates: &TrajectoryCollection,
    config: &QueryConfig,
) -> Result<TrajectoryCollection> {
    knn_query(
        reference,
        candidates,
        config.id_column,
        config.k,
        &config.measure,
    )
}
