//! Checked WKB decoding.
//!
//! Input is first walked and rewritten as little-endian WKB in the layout
//! `wkb::wkb_to_geom` reads (multi points as a bare coordinate list). The
//! walk rejects anything the decoder cannot handle, so decoding never sees
//! an unknown byte order, an unknown geometry type, a count larger than the
//! remaining input or a polygon without rings. Empty geometries are dropped
//! from their parents; an input that is empty as a whole decodes to `None`.

use std::io::Cursor;

use cell_common::{ConversionError, Result};
use geo_types::Geometry;

const POINT: u32 = 1;
const LINESTRING: u32 = 2;
const POLYGON: u32 = 3;
const MULTIPOINT: u32 = 4;
const MULTILINESTRING: u32 = 5;
const MULTIPOLYGON: u32 = 6;
const GEOMETRYCOLLECTION: u32 = 7;

/// Nesting limit for geometry collections.
const MAX_DEPTH: usize = 32;

/// Smallest encoding of a geometry: byte order, type and one count.
const MIN_GEOMETRY_BYTES: usize = 9;
const COORD_BYTES: usize = 16;

/// Decode a WKB buffer in either byte order.
///
/// Returns `None` for empty geometries (`POINT EMPTY`, polygons without
/// rings, collections without non-empty members).
pub fn decode_wkb(id: u64, bytes: &[u8]) -> Result<Option<Geometry<f64>>> {
    let normalized = normalize(bytes).map_err(|message| {
        ConversionError::invalid_geometry(id, format!("malformed WKB: {}", message))
    })?;
    match normalized {
        Some(buf) => wkb::wkb_to_geom(&mut Cursor::new(buf))
            .map(Some)
            .map_err(|err| ConversionError::invalid_geometry(id, format!("malformed WKB: {:?}", err))),
        None => Ok(None),
    }
}

/// Little-endian rewrite of `bytes`, or `None` when the geometry is empty.
fn normalize(bytes: &[u8]) -> std::result::Result<Option<Vec<u8>>, String> {
    let mut reader = WkbWalker { bytes, pos: 0 };
    let mut out = Vec::with_capacity(bytes.len());
    let kind = reader.geometry(&mut out, 0)?;
    if reader.pos != bytes.len() {
        return Err(format!("{} trailing bytes", bytes.len() - reader.pos));
    }
    Ok(kind.map(|_| out))
}

#[derive(Debug, Clone, Copy)]
enum ByteOrder {
    Big,
    Little,
}

struct WkbWalker<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl WkbWalker<'_> {
    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take<const N: usize>(&mut self) -> std::result::Result<[u8; N], String> {
        if self.remaining() < N {
            return Err(format!("truncated at byte {}", self.pos));
        }
        let mut raw = [0u8; N];
        raw.copy_from_slice(&self.bytes[self.pos..self.pos + N]);
        self.pos += N;
        Ok(raw)
    }

    fn byte_order(&mut self) -> std::result::Result<ByteOrder, String> {
        let at = self.pos;
        match self.take::<1>()?[0] {
            0 => Ok(ByteOrder::Big),
            1 => Ok(ByteOrder::Little),
            other => Err(format!("invalid byte order marker {:#04x} at byte {}", other, at)),
        }
    }

    fn u32(&mut self, order: ByteOrder) -> std::result::Result<u32, String> {
        let raw = self.take::<4>()?;
        Ok(match order {
            ByteOrder::Big => u32::from_be_bytes(raw),
            ByteOrder::Little => u32::from_le_bytes(raw),
        })
    }

    fn f64(&mut self, order: ByteOrder) -> std::result::Result<f64, String> {
        let raw = self.take::<8>()?;
        Ok(match order {
            ByteOrder::Big => f64::from_be_bytes(raw),
            ByteOrder::Little => f64::from_le_bytes(raw),
        })
    }

    /// A count of items of at least `item_bytes` each.
    fn count(&mut self, order: ByteOrder, item_bytes: usize) -> std::result::Result<usize, String> {
        let at = self.pos;
        let count = self.u32(order)? as usize;
        if count.saturating_mul(item_bytes) > self.remaining() {
            return Err(format!("count {} at byte {} exceeds the input", count, at));
        }
        Ok(count)
    }

    fn coord(&mut self, order: ByteOrder) -> std::result::Result<[f64; 2], String> {
        Ok([self.f64(order)?, self.f64(order)?])
    }

    fn coords(&mut self, order: ByteOrder, out: &mut Vec<u8>) -> std::result::Result<usize, String> {
        let count = self.count(order, COORD_BYTES)?;
        put_u32(out, count);
        for _ in 0..count {
            put_coord(out, self.coord(order)?);
        }
        Ok(count)
    }

    /// Rewrite one geometry into `out`. Returns its type, or `None` (with
    /// nothing written) when it is empty.
    fn geometry(&mut self, out: &mut Vec<u8>, depth: usize) -> std::result::Result<Option<u32>, String> {
        if depth > MAX_DEPTH {
            return Err(format!("geometries nested deeper than {}", MAX_DEPTH));
        }
        let start = out.len();
        let order = self.byte_order()?;
        let at = self.pos;
        let kind = self.u32(order)?;
        out.push(1);
        put_u32(out, kind as usize);

        let written = match kind {
            POINT => {
                let coord = self.coord(order)?;
                put_coord(out, coord);
                !(coord[0].is_nan() && coord[1].is_nan())
            }
            LINESTRING => self.coords(order, out)? > 0,
            POLYGON => {
                let rings = self.count(order, 4)?;
                put_u32(out, rings);
                for _ in 0..rings {
                    self.coords(order, out)?;
                }
                rings > 0
            }
            MULTIPOINT => {
                let count = self.count(order, MIN_GEOMETRY_BYTES + COORD_BYTES - 4)?;
                let count_at = out.len();
                put_u32(out, 0);
                let mut points = 0;
                for _ in 0..count {
                    let order = self.byte_order()?;
                    let member = self.u32(order)?;
                    if member != POINT {
                        return Err(format!("multi point member of type {}", member));
                    }
                    let coord = self.coord(order)?;
                    if !(coord[0].is_nan() && coord[1].is_nan()) {
                        put_coord(out, coord);
                        points += 1;
                    }
                }
                patch_u32(out, count_at, points);
                points > 0
            }
            MULTILINESTRING | MULTIPOLYGON | GEOMETRYCOLLECTION => {
                let count = self.count(order, MIN_GEOMETRY_BYTES)?;
                let count_at = out.len();
                put_u32(out, 0);
                let mut members = 0;
                for _ in 0..count {
                    let member_at = self.pos;
                    match self.geometry(out, depth + 1)? {
                        Some(member) if kind == MULTILINESTRING && member != LINESTRING => {
                            return Err(format!("multi line string member of type {} at byte {}", member, member_at));
                        }
                        Some(member) if kind == MULTIPOLYGON && member != POLYGON => {
                            return Err(format!("multi polygon member of type {} at byte {}", member, member_at));
                        }
                        Some(_) => members += 1,
                        None => {}
                    }
                }
                patch_u32(out, count_at, members);
                members > 0
            }
            other => return Err(format!("unsupported geometry type {} at byte {}", other, at)),
        };

        if written {
            Ok(Some(kind))
        } else {
            out.truncate(start);
            Ok(None)
        }
    }
}

fn put_u32(out: &mut Vec<u8>, value: usize) {
    out.extend_from_slice(&(value as u32).to_le_bytes());
}

fn patch_u32(out: &mut [u8], at: usize, value: usize) {
    out[at..at + 4].copy_from_slice(&(value as u32).to_le_bytes());
}

fn put_coord(out: &mut Vec<u8>, coord: [f64; 2]) {
    out.extend_from_slice(&coord[0].to_le_bytes());
    out.extend_from_slice(&coord[1].to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{MultiPoint, Point};
    use test_utils::fixtures::{places, wkb as fixtures};

    fn big_endian_point(lon: f64, lat: f64) -> Vec<u8> {
        let mut bytes = vec![0];
        bytes.extend_from_slice(&POINT.to_be_bytes());
        bytes.extend_from_slice(&lon.to_be_bytes());
        bytes.extend_from_slice(&lat.to_be_bytes());
        bytes
    }

    fn message(err: ConversionError) -> String {
        match err {
            ConversionError::InvalidGeometry { message, .. } => message,
            other => panic!("unexpected error {}", other),
        }
    }

    #[test]
    fn test_little_endian_roundtrip() {
        let polygon = fixtures::square_around(places::KARLSRUHE, 0.1);
        let geometry = decode_wkb(1, &polygon).unwrap().unwrap();
        assert!(matches!(geometry, Geometry::Polygon(_)));
    }

    #[test]
    fn test_big_endian_point() {
        let (lon, lat) = places::BERLIN;
        let geometry = decode_wkb(1, &big_endian_point(lon, lat)).unwrap().unwrap();
        assert_eq!(geometry, Geometry::Point(Point::new(lon, lat)));
    }

    #[test]
    fn test_standard_multi_point() {
        let bytes = fixtures::multi_point(&[places::BERLIN, places::SYDNEY, places::BERLIN]);
        let geometry = decode_wkb(1, &bytes).unwrap().unwrap();
        let expected: MultiPoint<f64> = vec![places::BERLIN, places::SYDNEY, places::BERLIN].into();
        assert_eq!(geometry, Geometry::MultiPoint(expected));
    }

    #[test]
    fn test_bad_byte_order_marker() {
        let err = decode_wkb(7, &[0xff]).unwrap_err();
        assert!(message(err).contains("byte order"));

        let mut bytes = fixtures::point(1.0, 2.0);
        bytes[0] = 2;
        assert!(decode_wkb(7, &bytes).is_err());
    }

    #[test]
    fn test_polygon_without_rings_is_empty() {
        let mut bytes = vec![1];
        bytes.extend_from_slice(&POLYGON.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        assert_eq!(decode_wkb(1, &bytes).unwrap(), None);
    }

    #[test]
    fn test_empty_members_are_dropped() {
        let mut empty_polygon = vec![1];
        empty_polygon.extend_from_slice(&POLYGON.to_le_bytes());
        empty_polygon.extend_from_slice(&0u32.to_le_bytes());
        let square = fixtures::square_around(places::SYDNEY, 0.1);

        let mut bytes = vec![1];
        bytes.extend_from_slice(&MULTIPOLYGON.to_le_bytes());
        bytes.extend_from_slice(&2u32.to_le_bytes());
        bytes.extend_from_slice(&empty_polygon);
        bytes.extend_from_slice(&square);

        match decode_wkb(1, &bytes).unwrap().unwrap() {
            Geometry::MultiPolygon(polygons) => assert_eq!(polygons.0.len(), 1),
            other => panic!("unexpected geometry {:?}", other),
        }
    }

    #[test]
    fn test_nan_point_is_empty() {
        assert_eq!(decode_wkb(1, &fixtures::point(f64::NAN, f64::NAN)).unwrap(), None);
    }

    #[test]
    fn test_oversized_count() {
        let mut bytes = vec![1];
        bytes.extend_from_slice(&LINESTRING.to_le_bytes());
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        assert!(message(decode_wkb(1, &bytes).unwrap_err()).contains("exceeds"));
    }

    #[test]
    fn test_unsupported_type_and_trailing_bytes() {
        let mut bytes = vec![1];
        bytes.extend_from_slice(&1001u32.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 24]);
        assert!(message(decode_wkb(1, &bytes).unwrap_err()).contains("unsupported geometry type 1001"));

        let mut bytes = fixtures::point(1.0, 2.0);
        bytes.push(0);
        assert!(message(decode_wkb(1, &bytes).unwrap_err()).contains("trailing"));
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let mut bytes = Vec::new();
        for _ in 0..=MAX_DEPTH + 1 {
            bytes.push(1);
            bytes.extend_from_slice(&GEOMETRYCOLLECTION.to_le_bytes());
            bytes.extend_from_slice(&1u32.to_le_bytes());
        }
        bytes.extend_from_slice(&fixtures::point(1.0, 2.0));
        assert!(message(decode_wkb(1, &bytes).unwrap_err()).contains("nested"));
    }
}
