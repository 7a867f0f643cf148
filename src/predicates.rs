//! Drop predicates for the convergence engine.
//!
//! Each predicate looks at the collection as it currently is (features
//! already consistent with the rows) and returns the row positions that
//! violate it.

use serde::{Deserialize, Serialize};

use crate::collection::TrajectoryCollection;
use crate::error::{ensure_finite, Result};
use crate::features::Feature;
use crate::outliers::OutlierDetector;
use crate::IdColumn;

/// A constraint whose violating rows are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Predicate {
    /// Drop rows with `feature <= bound`. NaN never matches, so the first
    /// point of a trajectory is never dropped.
    Threshold { feature: Feature, bound: f64 },
    /// Drop rows whose own `speed_to_prev`, or the next row's
    /// `speed_to_prev`, exceeds `speed_max`. NaN reads as zero.
    SpeedMaxRadius { speed_max: f64 },
    /// Drop rows flagged by the outlier detector.
    Outlier { jump_coefficient: f64, threshold: f64 },
}

impl Predicate {
    /// Motion feature this predicate reads, if any.
    pub fn feature(&self) -> Option<Feature> {
        match self {
            Predicate::Threshold { feature, .. } => Some(*feature),
            Predicate::SpeedMaxRadius { .. } => Some(Feature::SpeedToPrev),
            Predicate::Outlier { .. } => None,
        }
    }

    /// Check the predicate's parameters.
    pub fn validate(&self) -> Result<()> {
        match self {
            Predicate::Threshold { bound, .. } => ensure_finite("bound", *bound),
            Predicate::SpeedMaxRadius { speed_max } => ensure_finite("speed_max", *speed_max),
            Predicate::Outlier {
                jump_coefficient,
                threshold,
            } => {
                ensure_finite("jump_coefficient", *jump_coefficient)?;
                ensure_finite("threshold", *threshold)
            }
        }
    }

    /// Row positions violating the predicate, ascending.
    ///
    /// Feature-based predicates require features cached for `id_column`.
    pub fn rows_to_drop(
        &self,
        data: &TrajectoryCollection,
        id_column: IdColumn,
        detector: &dyn OutlierDetector,
    ) -> Result<Vec<usize>> {
        match *self {
            Predicate::Threshold { feature, bound } => {
                let features = data.require_features(id_column, feature.name())?;
                Ok(features
                    .iter()
                    .enumerate()
                    .filter(|(_, f)| f.get(feature) <= bound)
                    .map(|(row, _)| row)
                    .collect())
            }
            Predicate::SpeedMaxRadius { speed_max } => {
                let features = data.require_features(id_column, Feature::SpeedToPrev.name())?;
                let speed = |row: usize| {
                    features
                        .get(row)
                        .map(|f| nan_to_zero(f.speed_to_prev))
                        .unwrap_or(0.0)
                };
                Ok((0..features.len())
                    .filter(|&row| speed(row) > speed_max || speed(row + 1) > speed_max)
                    .collect())
            }
            Predicate::Outlier {
                jump_coefficient,
                threshold,
            } => Ok(detector
                .detect(data, id_column, jump_coefficient, threshold)?
                .into_iter()
                .enumerate()
                .filter(|(_, flagged)| *flagged)
                .map(|(row, _)| row)
                .collect()),
        }
    }
}

fn nan_to_zero(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value
    }
}
