//! Grid indexing engine.
//!
//! The conversion pipelines never encode or decode cell identifiers
//! themselves. Everything they need from the hexagonal grid goes through the
//! [`GridEngine`] trait:
//!
//! - `point_to_cell`: locate the cell containing a coordinate
//! - `compact` / `uncompact`: lossless set simplification across resolutions
//! - `mean_cell_area`: used to pick a resolution matching a pixel size
//! - `dissolve`: outline a set of cells as polygons
//!
//! [`H3Engine`] implements the trait on top of the `h3o` crate.

use geo_types::{LineString, MultiPolygon, Polygon};
use h3o::geom::ToGeo;
use h3o::{CellIndex, LatLng};
use rayon::prelude::*;

use crate::cell::{to_resolution, CellSet, GridCellId, MAX_RESOLUTION};
use crate::error::{ConversionError, Result};

/// Primitives of a hierarchical hexagonal grid.
pub trait GridEngine: Send + Sync {
    /// Cell at `resolution` containing the coordinate (degrees).
    fn point_to_cell(&self, lon: f64, lat: f64, resolution: u8) -> Result<GridCellId>;

    /// Resolution of a cell.
    fn cell_resolution(&self, cell: GridCellId) -> Result<u8>;

    /// Boundary ring of a cell as `(lon, lat)` coordinates.
    fn cell_to_boundary(&self, cell: GridCellId) -> Result<Polygon<f64>>;

    /// Replace complete sets of siblings by their parent, recursively.
    fn compact(&self, cells: &CellSet) -> Result<CellSet>;

    /// Expand every cell to its descendants at `resolution`.
    ///
    /// Fails with `InvalidResolution` when `resolution` is coarser than any
    /// cell in the input.
    fn uncompact(&self, cells: &CellSet, resolution: u8) -> Result<CellSet>;

    /// Average area of a cell at `resolution` in square meters.
    fn mean_cell_area(&self, resolution: u8) -> Result<f64>;

    /// Outlines of the area covered by `cells`, with shared edges removed.
    /// Coordinates are `(lon, lat)` degrees.
    fn dissolve(&self, cells: &CellSet) -> Result<MultiPolygon<f64>>;
}

/// [`GridEngine`] backed by the H3 grid as implemented by `h3o`.
#[derive(Debug, Clone, Copy, Default)]
pub struct H3Engine;

impl H3Engine {
    pub fn new() -> Self {
        Self
    }

    fn cell_indexes(cells: &CellSet) -> Result<Vec<CellIndex>> {
        cells.iter().map(|cell| cell.to_cell_index()).collect()
    }
}

impl GridEngine for H3Engine {
    fn point_to_cell(&self, lon: f64, lat: f64, resolution: u8) -> Result<GridCellId> {
        let resolution = to_resolution(resolution)?;
        let coord = LatLng::new(lat, lon).map_err(|err| ConversionError::InvalidCoordinate {
            lon,
            lat,
            message: err.to_string(),
        })?;
        Ok(coord.to_cell(resolution).into())
    }

    fn cell_resolution(&self, cell: GridCellId) -> Result<u8> {
        cell.resolution()
    }

    fn cell_to_boundary(&self, cell: GridCellId) -> Result<Polygon<f64>> {
        let boundary = cell.to_cell_index()?.boundary();
        let ring: Vec<(f64, f64)> = boundary.iter().map(|ll| (ll.lng(), ll.lat())).collect();
        Ok(Polygon::new(LineString::from(ring), vec![]))
    }

    fn compact(&self, cells: &CellSet) -> Result<CellSet> {
        // h3o only compacts homogeneous input, so work one resolution at a
        // time from the finest. Parents produced at one level join the
        // level of their own resolution.
        let mut levels: Vec<Vec<CellIndex>> = vec![Vec::new(); MAX_RESOLUTION as usize + 1];
        for index in Self::cell_indexes(cells)? {
            levels[usize::from(u8::from(index.resolution()))].push(index);
        }

        let mut compacted = CellSet::new();
        for resolution in (0..levels.len()).rev() {
            let mut level = std::mem::take(&mut levels[resolution]);
            if level.is_empty() {
                continue;
            }
            level.sort_unstable();
            level.dedup();
            for index in CellIndex::compact(level)? {
                let index_resolution = usize::from(u8::from(index.resolution()));
                if index_resolution == resolution {
                    compacted.insert(index.into());
                } else {
                    levels[index_resolution].push(index);
                }
            }
        }
        Ok(compacted)
    }

    fn uncompact(&self, cells: &CellSet, resolution: u8) -> Result<CellSet> {
        let target = to_resolution(resolution)?;
        let indexes = Self::cell_indexes(cells)?;
        if let Some(finer) = indexes.iter().find(|cell| cell.resolution() > target) {
            return Err(ConversionError::invalid_resolution(format!(
                "cannot uncompact to resolution {} (input contains cell {} at resolution {})",
                resolution,
                GridCellId::from(*finer),
                u8::from(finer.resolution())
            )));
        }
        Ok(CellIndex::uncompact(indexes, target)
            .map(GridCellId::from)
            .collect())
    }

    fn mean_cell_area(&self, resolution: u8) -> Result<f64> {
        Ok(to_resolution(resolution)?.area_m2())
    }

    fn dissolve(&self, cells: &CellSet) -> Result<MultiPolygon<f64>> {
        let mut indexes = Self::cell_indexes(cells)?;
        let Some(finest) = indexes.iter().map(|cell| cell.resolution()).max() else {
            return Ok(MultiPolygon(Vec::new()));
        };
        // the outliner needs cells of a single resolution
        if indexes.iter().any(|cell| cell.resolution() != finest) {
            indexes = CellIndex::uncompact(indexes, finest).collect();
            indexes.sort_unstable();
            indexes.dedup();
        }
        Ok(indexes.to_geom(true)?)
    }
}

/// Attach the boundary polygon of each row's cell.
pub fn cells_with_boundaries<E, V>(
    engine: &E,
    rows: &[(V, GridCellId)],
) -> Result<Vec<(V, GridCellId, Polygon<f64>)>>
where
    E: GridEngine + ?Sized,
    V: Clone + Send + Sync,
{
    rows.par_iter()
        .map(|(value, cell)| Ok((value.clone(), *cell, engine.cell_to_boundary(*cell)?)))
        .collect()
}

/// Dissolved outlines of a cell set. Compacted sets are expanded to their
/// finest resolution first, so the outline equals that of the leaf set.
pub fn cells_to_polygons<E>(engine: &E, cells: &CellSet) -> Result<MultiPolygon<f64>>
where
    E: GridEngine + ?Sized,
{
    engine.dissolve(cells)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{MAX_RESOLUTION, MIN_RESOLUTION};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const ENGINE: H3Engine = H3Engine;

    #[test]
    fn test_point_to_cell() {
        let cell = ENGINE.point_to_cell(8.4, 49.0, 9).unwrap();
        assert_eq!(ENGINE.cell_resolution(cell).unwrap(), 9);

        // the same coordinate always maps to the same cell
        assert_eq!(cell, ENGINE.point_to_cell(8.4, 49.0, 9).unwrap());
    }

    #[test]
    fn test_point_to_cell_rejects_bad_input() {
        assert!(matches!(
            ENGINE.point_to_cell(f64::NAN, 10.0, 5),
            Err(ConversionError::InvalidCoordinate { .. })
        ));
        assert!(matches!(
            ENGINE.point_to_cell(10.0, 10.0, 16),
            Err(ConversionError::InvalidResolution(_))
        ));
    }

    #[test]
    fn test_cell_to_boundary_surrounds_center() {
        let cell = ENGINE.point_to_cell(13.4, 52.5, 6).unwrap();
        let boundary = ENGINE.cell_to_boundary(cell).unwrap();
        // at least six vertices plus the closing coordinate
        assert!(boundary.exterior().0.len() >= 7);
        for coord in boundary.exterior().coords() {
            assert!((coord.x - 13.4).abs() < 1.0);
            assert!((coord.y - 52.5).abs() < 1.0);
        }
    }

    #[test]
    fn test_single_cell_roundtrip_all_resolutions() {
        for resolution in MIN_RESOLUTION..=MAX_RESOLUTION {
            let cell = ENGINE.point_to_cell(-73.98, 40.75, resolution).unwrap();
            let set: CellSet = [cell].into_iter().collect();
            let compacted = ENGINE.compact(&set).unwrap();
            assert_eq!(compacted, set);
            let expanded = ENGINE.uncompact(&compacted, resolution).unwrap();
            assert_eq!(expanded, set, "roundtrip failed at resolution {}", resolution);
        }
    }

    #[test]
    fn test_compact_full_children_to_parent() {
        let parent = ENGINE.point_to_cell(2.35, 48.86, 6).unwrap();
        let parent_set: CellSet = [parent].into_iter().collect();
        let children = ENGINE.uncompact(&parent_set, 8).unwrap();
        assert_eq!(children.len(), 49);

        let compacted = ENGINE.compact(&children).unwrap();
        assert_eq!(compacted, parent_set);
    }

    #[test]
    fn test_compact_mixed_resolutions() {
        let parent = ENGINE.point_to_cell(2.35, 48.86, 6).unwrap();
        let parent_set: CellSet = [parent].into_iter().collect();
        let mut mixed = ENGINE.uncompact(&parent_set, 7).unwrap();
        let first_child = *mixed.iter().next().unwrap();
        let single: CellSet = [first_child].into_iter().collect();
        // replace one child by its own children
        let grandchildren = ENGINE.uncompact(&single, 8).unwrap();
        mixed = mixed.into_iter().filter(|c| *c != first_child).collect();
        mixed.extend(grandchildren);

        assert_eq!(ENGINE.compact(&mixed).unwrap(), parent_set);
    }

    #[test]
    fn test_compact_far_apart_resolutions() {
        // expanding the base cell to resolution 15 would take ~10^12 cells
        let base = ENGINE.point_to_cell(0.0, 0.0, 0).unwrap();
        let leaf = ENGINE.point_to_cell(151.21, -33.87, 15).unwrap();
        let set: CellSet = [base, leaf].into_iter().collect();
        assert_eq!(ENGINE.compact(&set).unwrap(), set);
    }

    #[test]
    fn test_compact_cascades_through_levels() {
        let parent = ENGINE.point_to_cell(-58.4, -34.6, 5).unwrap();
        let parent_set: CellSet = [parent].into_iter().collect();
        let leaves = ENGINE.uncompact(&parent_set, 8).unwrap();
        let mut mixed = leaves.clone();
        mixed.insert(parent);
        assert_eq!(ENGINE.compact(&leaves).unwrap(), parent_set);
        assert_eq!(ENGINE.compact(&mixed).unwrap(), parent_set);
    }

    #[test]
    fn test_uncompact_rejects_coarser_target() {
        let cell = ENGINE.point_to_cell(2.35, 48.86, 8).unwrap();
        let set: CellSet = [cell].into_iter().collect();
        assert!(matches!(
            ENGINE.uncompact(&set, 7),
            Err(ConversionError::InvalidResolution(_))
        ));
    }

    #[test]
    fn test_random_subtree_roundtrip() {
        let mut rng = StdRng::seed_from_u64(7);
        let parent = ENGINE.point_to_cell(-122.4, 37.8, 5).unwrap();
        let parent_set: CellSet = [parent].into_iter().collect();
        let leaves = ENGINE.uncompact(&parent_set, 8).unwrap();

        for _ in 0..10 {
            let subset: CellSet = leaves.iter().copied().filter(|_| rng.gen_bool(0.7)).collect();
            let compacted = ENGINE.compact(&subset).unwrap();
            assert!(compacted.len() <= subset.len());
            assert_eq!(ENGINE.uncompact(&compacted, 8).unwrap(), subset);
        }
    }

    #[test]
    fn test_cells_with_boundaries() {
        let rows = vec![
            ("a", ENGINE.point_to_cell(13.4, 52.5, 7).unwrap()),
            ("b", ENGINE.point_to_cell(-58.4, -34.6, 7).unwrap()),
        ];
        let with_boundaries = cells_with_boundaries(&ENGINE, &rows).unwrap();
        assert_eq!(with_boundaries.len(), 2);
        assert_eq!(with_boundaries[0].0, "a");
        assert_eq!(with_boundaries[1].1, rows[1].1);
        assert!(with_boundaries[1].2.exterior().0.len() >= 7);
    }

    #[test]
    fn test_dissolve_siblings_into_one_polygon() {
        let parent = ENGINE.point_to_cell(2.35, 48.86, 6).unwrap();
        let parent_set: CellSet = [parent].into_iter().collect();
        let children = ENGINE.uncompact(&parent_set, 7).unwrap();
        assert_eq!(children.len(), 7);

        let outline = cells_to_polygons(&ENGINE, &children).unwrap();
        assert_eq!(outline.0.len(), 1);
        assert!(outline.0[0].interiors().is_empty());
        let (lon, lat) = outline.0[0].exterior().0[0].x_y();
        assert!((lon - 2.35).abs() < 1.0 && (lat - 48.86).abs() < 1.0);
    }

    #[test]
    fn test_dissolve_disjoint_and_mixed_sets() {
        let parent = ENGINE.point_to_cell(2.35, 48.86, 6).unwrap();
        let far = ENGINE.point_to_cell(-74.0, 40.7, 8).unwrap();
        let cells: CellSet = [parent, far].into_iter().collect();
        assert_eq!(cells_to_polygons(&ENGINE, &cells).unwrap().0.len(), 2);

        assert!(cells_to_polygons(&ENGINE, &CellSet::new()).unwrap().0.is_empty());
    }

    #[test]
    fn test_mean_cell_area_decreases() {
        let mut previous = f64::INFINITY;
        for resolution in MIN_RESOLUTION..=MAX_RESOLUTION {
            let area = ENGINE.mean_cell_area(resolution).unwrap();
            assert!(area < previous);
            previous = area;
        }
        assert!(ENGINE.mean_cell_area(16).is_err());
    }
}
