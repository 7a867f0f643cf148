//! Whole-trajectory filters.
//!
//! Single pass: group rows by trajectory, aggregate, and drop every row of
//! the groups that fail. Partial groups are never removed.

use std::collections::HashSet;

use log::debug;

use crate::cleaning::CleaningReport;
use crate::collection::TrajectoryCollection;
use crate::error::{ensure_finite, Result};
use crate::features::Feature;
use crate::IdColumn;

/// Drop trajectories with fewer than `min_points` points.
///
/// Fails with `MissingColumn` before touching any row if a point lacks the
/// grouping key.
pub fn clean_trajectories_with_few_points(
    data: &mut TrajectoryCollection,
    id_column: IdColumn,
    min_points: usize,
) -> Result<CleaningReport> {
    debug!(
        "[Filters] Cleaning gps points from trajectories of fewer than {} points",
        min_points
    );
    let rows_before = data.len();

    let few: HashSet<String> = data
        .group_sizes(id_column)?
        .into_iter()
        .filter(|(_, size)| *size < min_points)
        .map(|(id, _)| id)
        .collect();

    if !few.is_empty() {
        debug!("[Filters] There are {} ids with few points", few.len());
        data.drop_groups(id_column, &few)?;
        debug!(
            "[Filters] Rows - before drop: {} - after drop: {}",
            rows_before,
            data.len()
        );
    }

    Ok(CleaningReport::single_pass(rows_before, data.len(), few.len()))
}

/// Drop trajectories with few points, then trajectories whose summed
/// `dist_to_prev` is below `min_trajectory_distance` meters.
///
/// The point-count filter runs first so that removed trajectories do not
/// take part in the distance aggregation.
pub fn clean_trajectories_short_and_few_points(
    data: &mut TrajectoryCollection,
    id_column: IdColumn,
    min_trajectory_distance: f64,
    min_points: usize,
) -> Result<CleaningReport> {
    ensure_finite("min_trajectory_distance", min_trajectory_distance)?;
    debug!("[Filters] Remove short trajectories...");

    let rows_before = data.len();
    let few = clean_trajectories_with_few_points(data, id_column, min_points)?;
    let short = drop_groups_by_feature_sum(
        data,
        id_column,
        Feature::DistToPrev,
        min_trajectory_distance,
    )?;

    Ok(CleaningReport::single_pass(
        rows_before,
        data.len(),
        few.groups_dropped + short,
    ))
}

/// Drop trajectories whose summed `time_to_prev` is below `time_max`
/// seconds.
///
/// Despite the name, `time_max` is a lower bound on the total duration:
/// trajectories covering *less* time are removed.
pub fn clean_id_by_time_max(
    data: &mut TrajectoryCollection,
    id_column: IdColumn,
    time_max: f64,
) -> Result<CleaningReport> {
    ensure_finite("time_max", time_max)?;
    debug!(
        "[Filters] Clean gps points with time max by id < {} seconds",
        time_max
    );

    let rows_before = data.len();
    let dropped = drop_groups_by_feature_sum(data, id_column, Feature::TimeToPrev, time_max)?;
    Ok(CleaningReport::single_pass(rows_before, data.len(), dropped))
}

/// Drop groups whose summed `feature` is below `minimum`; returns the number
/// of groups dropped.
fn drop_groups_by_feature_sum(
    data: &mut TrajectoryCollection,
    id_column: IdColumn,
    feature: Feature,
    minimum: f64,
) -> Result<usize> {
    let features = data.ensure_features(id_column)?.to_vec();
    let sums = data.group_sums(id_column, |row, _| features[row].get(feature))?;
    let total_ids = sums.len();

    let to_drop: HashSet<String> = sums
        .into_iter()
        .filter(|(_, sum)| *sum < minimum)
        .map(|(id, _)| id)
        .collect();

    debug!(
        "[Filters] Ids total: {}, ids to drop: {} ({} < {})",
        total_ids,
        to_drop.len(),
        feature.name(),
        minimum
    );

    data.drop_groups(id_column, &to_drop)?;
    Ok(to_drop.len())
}
