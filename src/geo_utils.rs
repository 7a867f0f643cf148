//! Geographic utilities: great-circle distance and bounding boxes.

use geo::{Distance, Haversine, Point};
use rstar::{Envelope, AABB};

use crate::{BoundingBox, GpsPoint};

/// Mean earth radius in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Calculate haversine distance between two GPS points in meters.
pub fn haversine_distance(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    let point1 = Point::new(p1.longitude, p1.latitude);
    let point2 = Point::new(p2.longitude, p2.latitude);
    Haversine::distance(point1, point2)
}

/// Bounding box enclosing a circle of `radius` meters around a point.
///
/// Longitude extent is widened by `asin(sin(r) / cos(lat))`, so the box
/// stays conservative away from the equator.
pub fn bbox_by_radius(center: &GpsPoint, radius: f64) -> BoundingBox {
    let r = radius / EARTH_RADIUS_METERS;
    let lat = center.latitude.to_radians();
    let lon = center.longitude.to_radians();

    let delta_lon = (r.sin() / lat.cos()).asin();

    BoundingBox::new(
        (lat - r).to_degrees(),
        (lon - delta_lon).to_degrees(),
        (lat + r).to_degrees(),
        (lon + delta_lon).to_degrees(),
    )
}

/// R-tree envelope of a bounding box, as `[lng, lat]` corners.
pub fn envelope(bounds: &BoundingBox) -> AABB<[f64; 2]> {
    AABB::from_corners(
        [bounds.min_lng, bounds.min_lat],
        [bounds.max_lng, bounds.max_lat],
    )
}

/// Inclusive containment test.
pub fn bbox_contains(bounds: &BoundingBox, point: &GpsPoint) -> bool {
    envelope(bounds).contains_point(&[point.longitude, point.latitude])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_same_point() {
        let p = GpsPoint::new(51.5074, -0.1278);
        assert_eq!(haversine_distance(&p, &p), 0.0);
    }

    #[test]
    fn test_bbox_by_radius_contains_center() {
        let center = GpsPoint::new(-3.7319, -38.5267);
        let bbox = bbox_by_radius(&center, 1000.0);
        assert!(bbox.min_lat < center.latitude && center.latitude < bbox.max_lat);
        assert!(bbox.min_lng < center.longitude && center.longitude < bbox.max_lng);
        assert!(bbox_contains(&bbox, &center));
    }

    #[test]
    fn test_bbox_contains_is_inclusive() {
        let bbox = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        assert!(bbox_contains(&bbox, &GpsPoint::new(1.0, 1.0)));
        assert!(!bbox_contains(&bbox, &GpsPoint::new(1.0, 1.0001)));
    }
}
