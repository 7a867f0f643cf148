//! Trajectory-to-trajectory distance measures.
//!
//! Both measures pair points by position and truncate to the shorter
//! trajectory, so they are not metrics when lengths differ.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TraceFilterError};
use crate::geo_utils::haversine_distance;
use crate::TrackPoint;

/// A scalar distance between two trajectories.
pub trait TrajectoryDistance {
    fn distance(&self, a: &[TrackPoint], b: &[TrackPoint]) -> f64;
}

/// Supported trajectory distance measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DistanceMeasure {
    /// Mean haversine distance between index-paired points
    #[default]
    #[serde(rename = "MEDP")]
    Medp,
    /// MEDP plus the absolute timestamp difference (seconds) of each pair
    #[serde(rename = "MEDT")]
    Medt,
}

impl DistanceMeasure {
    pub fn name(&self) -> &'static str {
        match self {
            DistanceMeasure::Medp => "MEDP",
            DistanceMeasure::Medt => "MEDT",
        }
    }
}

impl fmt::Display for DistanceMeasure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DistanceMeasure {
    type Err = TraceFilterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "MEDP" => Ok(DistanceMeasure::Medp),
            "MEDT" => Ok(DistanceMeasure::Medt),
            _ => Err(TraceFilterError::InvalidMeasure {
                name: s.to_string(),
            }),
        }
    }
}

impl TrajectoryDistance for DistanceMeasure {
    fn distance(&self, a: &[TrackPoint], b: &[TrackPoint]) -> f64 {
        match self {
            DistanceMeasure::Medp => medp(a, b),
            DistanceMeasure::Medt => medt(a, b),
        }
    }
}

/// Mean haversine distance (meters) between points paired by index, up to
/// the shorter length. Infinite if either trajectory is empty.
pub fn medp(a: &[TrackPoint], b: &[TrackPoint]) -> f64 {
    mean_paired(a, b, |p, q| haversine_distance(&p.position(), &q.position()))
}

/// As [`medp`], with each pair's absolute timestamp difference (seconds)
/// added to its spatial distance.
pub fn medt(a: &[TrackPoint], b: &[TrackPoint]) -> f64 {
    mean_paired(a, b, |p, q| {
        haversine_distance(&p.position(), &q.position()) + p.timestamp.abs_diff(q.timestamp) as f64
    })
}

fn mean_paired<F>(a: &[TrackPoint], b: &[TrackPoint], pair_distance: F) -> f64
where
    F: Fn(&TrackPoint, &TrackPoint) -> f64,
{
    let n = a.len().min(b.len());
    if n == 0 {
        return f64::INFINITY;
    }
    let total: f64 = a.iter().zip(b).map(|(p, q)| pair_distance(p, q)).sum();
    total / n as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(id: &str, lat: f64, t0: i64) -> Vec<TrackPoint> {
        (0..4)
            .map(|i| TrackPoint::new(id, lat, i as f64 * 0.001, t0 + i * 10))
            .collect()
    }

    #[test]
    fn test_identical_is_zero() {
        let a = line("a", 0.0, 0);
        assert_eq!(medp(&a, &a), 0.0);
        assert_eq!(medt(&a, &a), 0.0);
    }

    #[test]
    fn test_symmetric() {
        let a = line("a", 0.0, 0);
        let b = line("b", 0.001, 5);
        assert!((medp(&a, &b) - medp(&b, &a)).abs() < 1e-9);
        assert!((medt(&a, &b) - medt(&b, &a)).abs() < 1e-9);
    }

    #[test]
    fn test_parallel_offset() {
        let a = line("a", 0.0, 0);
        let b = line("b", 0.001, 5);
        let d = medp(&a, &b);
        assert!(d > 110.0 && d < 112.0);
        assert!((medt(&a, &b) - (d + 5.0)).abs() < 1e-6);
    }

    #[test]
    fn test_truncates_to_shorter() {
        let a = line("a", 0.0, 0);
        let mut b = a.clone();
        b.push(TrackPoint::new("a", 45.0, 45.0, 1000));
        assert_eq!(medp(&a, &b), 0.0);
    }

    #[test]
    fn test_empty_is_infinite() {
        assert_eq!(medp(&[], &line("a", 0.0, 0)), f64::INFINITY);
    }

    #[test]
    fn test_extreme_timestamps() {
        let a = vec![TrackPoint::new("a", 0.0, 0.0, i64::MIN)];
        let b = vec![TrackPoint::new("b", 0.0, 0.0, 1)];
        let d = medt(&a, &b);
        assert!(d.is_finite());
        assert!((d - 2f64.powi(63)).abs() / d < 1e-12);
    }

    #[test]
    fn test_parse_measure() {
        assert_eq!("MEDP".parse::<DistanceMeasure>().unwrap(), DistanceMeasure::Medp);
        assert_eq!("medt".parse::<DistanceMeasure>().unwrap(), DistanceMeasure::Medt);
        assert_eq!(
            "DTW".parse::<DistanceMeasure>().unwrap_err(),
            TraceFilterError::InvalidMeasure {
                name: "DTW".to_string()
            }
        );
    }
}
