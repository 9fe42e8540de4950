//! Conversion of single serialized geometries to grid cells.

use cell_common::{validate_resolution, CellSet, ConversionError, GridCellId, GridEngine, H3Engine, Result};
use geo_types::Geometry;
use h3o::geom::{PolyfillConfig, ToCells};
use h3o::Resolution;

use crate::wkb_reader::decode_wkb;

/// Converts one serialized geometry to the grid cells it covers.
///
/// Implementations must be pure functions of their inputs so that chunks
/// can be indexed concurrently.
pub trait GeometryIndexer: Send + Sync {
    /// Cells covering `geometry` at `resolution`, free of duplicates and in
    /// ascending order. With `do_compact`, the geometry's own cell set is
    /// compacted first.
    fn convert(&self, id: u64, geometry: &[u8], resolution: u8, do_compact: bool) -> Result<Vec<GridCellId>>;
}

/// [`GeometryIndexer`] for WKB-encoded geometries.
///
/// Points map to the cell containing them; polygonal geometries to the
/// cells whose centers they contain.
#[derive(Debug, Clone, Default)]
pub struct WkbIndexer<E: GridEngine = H3Engine> {
    engine: E,
}

impl WkbIndexer<H3Engine> {
    pub fn new() -> Self {
        Self {
            engine: H3Engine::new(),
        }
    }
}

impl<E: GridEngine> WkbIndexer<E> {
    /// Use `engine` for compaction.
    pub fn with_engine(engine: E) -> Self {
        Self { engine }
    }
}

impl<E: GridEngine> GeometryIndexer for WkbIndexer<E> {
    fn convert(&self, id: u64, geometry: &[u8], resolution: u8, do_compact: bool) -> Result<Vec<GridCellId>> {
        validate_resolution(resolution)?;
        let Some(geometry) = decode_wkb(id, geometry)? else {
            return Ok(Vec::new());
        };
        let cells = polyfill(id, geometry, Resolution::try_from(resolution)?)?;
        let cells = if do_compact {
            self.engine.compact(&cells)?
        } else {
            cells
        };
        Ok(cells.to_sorted_vec())
    }
}

/// Deduplicated cells of `geometry` at `resolution`.
fn polyfill(id: u64, geometry: Geometry<f64>, resolution: Resolution) -> Result<CellSet> {
    let geometry = h3o::geom::Geometry::from_degrees(geometry)
        .map_err(|err| ConversionError::invalid_geometry(id, err.to_string()))?;
    Ok(geometry
        .to_cells(PolyfillConfig::new(resolution))
        .map(GridCellId::from)
        .collect())
}
