//! Approximate areas of geographic shapes on a spherical earth.

use geo_types::{Coord, LineString, Rect};

/// Earth radius at the equator in meters.
pub const EARTH_RADIUS_EQUATOR: f64 = 6_378_137.0;

/// Approximate area of a closed WGS84 ring in square meters.
///
/// Uses the spherical excess approximation from Chamberlain & Duquette,
/// "Some algorithms for polygons on a sphere" (2007).
pub fn area_linearring(ring: &LineString<f64>) -> f64 {
    ring.0
        .windows(2)
        .map(|coords| {
            (coords[1].x - coords[0].x).to_radians()
                * (2.0 + coords[0].y.to_radians().sin() + coords[1].y.to_radians().sin())
        })
        .sum::<f64>()
        .abs()
        * EARTH_RADIUS_EQUATOR.powi(2)
        / 2.0
}

/// Approximate area of a WGS84 rectangle in square meters.
pub fn area_rect(bounds: &Rect<f64>) -> f64 {
    let (min, max) = (bounds.min(), bounds.max());
    let ring = LineString::from(vec![
        Coord { x: min.x, y: min.y },
        Coord { x: min.x, y: max.y },
        Coord { x: max.x, y: max.y },
        Coord { x: max.x, y: min.y },
        Coord { x: min.x, y: min.y },
    ]);
    area_linearring(&ring)
}
