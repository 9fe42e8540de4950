//! Common test fixtures for conversion tests.
//!
//! This module provides pre-defined coordinates, transforms and encoded
//! geometries that represent common scenarios.

/// Well-known locations as `(lon, lat)`.
pub mod places {
    pub const BERLIN: (f64, f64) = (13.405, 52.52);
    pub const KARLSRUHE: (f64, f64) = (8.4037, 49.0069);
    pub const NEW_YORK: (f64, f64) = (-73.9857, 40.7484);
    pub const SYDNEY: (f64, f64) = (151.2093, -33.8688);
    pub const BUENOS_AIRES: (f64, f64) = (-58.3816, -34.6037);

    /// Near the antimeridian in the Pacific.
    pub const FIJI: (f64, f64) = (179.9, -17.8);
}

/// Geotransforms in GDAL coefficient order (`c, a, b, f, d, e`).
pub mod transforms {
    /// The 2000x2000 WGS84 raster `r.tiff` with its origin near Karlsruhe.
    pub const R_TIFF_GDAL: [f64; 6] = [
        8.11377,
        0.0011965049999999992,
        0.0,
        49.40792,
        0.0,
        -0.001215135,
    ];

    /// The same raster in affine/rasterio order (`a, b, c, d, e, f`).
    pub const R_TIFF_AFFINE: [f64; 6] = [
        0.0011965049999999992,
        0.0,
        8.11377,
        0.0,
        -0.001215135,
        49.40792,
    ];

    /// 0.01 degree pixels with the origin at 10E 50N.
    pub const CENTIDEGREE_GDAL: [f64; 6] = [10.0, 0.01, 0.0, 50.0, 0.0, -0.01];
}

/// Geometries encoded as little-endian WKB.
pub mod wkb {
    use geo_types::{Coord, Geometry, LineString, MultiPolygon, Point, Polygon, Rect};

    fn encode(geometry: Geometry<f64>) -> Vec<u8> {
        ::wkb::geom_to_wkb(&geometry).expect("geometry encodes as WKB")
    }

    /// A point at `(lon, lat)`.
    pub fn point(lon: f64, lat: f64) -> Vec<u8> {
        encode(Geometry::Point(Point::new(lon, lat)))
    }

    /// A polygon from an exterior ring of `(lon, lat)` vertices. The ring is
    /// closed automatically.
    pub fn polygon(exterior: &[(f64, f64)]) -> Vec<u8> {
        let ring = LineString::from(exterior.to_vec());
        encode(Geometry::Polygon(Polygon::new(ring, vec![])))
    }

    /// An axis-aligned rectangle.
    pub fn rect(min: (f64, f64), max: (f64, f64)) -> Vec<u8> {
        let rect = Rect::new(Coord::from(min), Coord::from(max));
        encode(Geometry::Polygon(rect.to_polygon()))
    }

    /// Several polygons from exterior rings, in one multi polygon.
    pub fn multi_polygon(exteriors: &[&[(f64, f64)]]) -> Vec<u8> {
        let polygons: Vec<Polygon<f64>> = exteriors
            .iter()
            .map(|exterior| Polygon::new(LineString::from(exterior.to_vec()), vec![]))
            .collect();
        encode(Geometry::MultiPolygon(MultiPolygon(polygons)))
    }

    /// A multi point in the standard layout, each member with its own
    /// byte order and type header.
    pub fn multi_point(points: &[(f64, f64)]) -> Vec<u8> {
        let mut bytes = vec![1];
        bytes.extend_from_slice(&4u32.to_le_bytes());
        bytes.extend_from_slice(&(points.len() as u32).to_le_bytes());
        for (lon, lat) in points {
            bytes.extend_from_slice(&point(*lon, *lat));
        }
        bytes
    }

    /// A square of `half_size` degrees around `center`.
    pub fn square_around(center: (f64, f64), half_size: f64) -> Vec<u8> {
        rect(
            (center.0 - half_size, center.1 - half_size),
            (center.0 + half_size, center.1 + half_size),
        )
    }
}
