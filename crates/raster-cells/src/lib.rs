//! Raster to Hexagonal Grid Conversion
//!
//! This crate converts geo-referenced two-dimensional numeric arrays into
//! hexagonal grid cells. Every pixel that is not nodata is mapped through the
//! affine transform to the geographic coordinate of its center, resolved to
//! the grid cell containing that coordinate, and collected into a set of
//! cells per pixel value.
//!
//! # Architecture
//!
//! ```text
//! RasterArray (any element type)
//!      │
//!      ▼
//! RasterConverter::raster_to_cells
//!      │
//!      ├─► Dispatch to the generic scan for the element type
//!      │
//!      ├─► Split rows into bands, scan bands on the worker pool
//!      │         │
//!      │         └─► per band: skip nodata, pixel center → cell, group by value
//!      │
//!      ├─► Merge band results by per-value set union
//!      │
//!      ├─► Optionally compact each value's cells
//!      │
//!      └─► Flatten into sorted (value, cell) rows
//! ```
//!
//! # Example
//!
//! ```ignore
//! use raster_cells::{nearest_resolution, raster_to_cells, RasterArray, ResolutionSearchMode};
//! use cell_common::AxisOrder;
//! use geotransform::Transform;
//!
//! let transform = Transform::from_gdal(&geotransform)?;
//! let resolution = nearest_resolution(
//!     [array.nrows(), array.ncols()],
//!     &transform,
//!     AxisOrder::YX,
//!     ResolutionSearchMode::MinDiff,
//! )?;
//! let rows = raster_to_cells(
//!     RasterArray::from(array.view()),
//!     &transform,
//!     resolution,
//!     Some(0u8.into()),
//!     AxisOrder::YX,
//!     true,
//! )?;
//! ```

pub mod config;
pub mod converter;
pub mod element;
pub mod resolution;
pub mod scanner;

// Re-export commonly used types at crate root
pub use config::RasterConfig;
pub use converter::RasterConverter;
pub use element::{ElementType, RasterArray, RasterData, RasterElement, RasterValue};
pub use resolution::{pixel_area, select_resolution, ResolutionSearchMode};
pub use scanner::{RasterScanner, ValueCells};

use cell_common::{AxisOrder, GridCellId, H3Engine, Result};
use geotransform::Transform;

/// Resolution matching the pixel size of a raster on the H3 grid.
pub fn nearest_resolution(
    shape: [usize; 2],
    transform: &Transform,
    axis_order: AxisOrder,
    search_mode: ResolutionSearchMode,
) -> Result<u8> {
    resolution::nearest_resolution(&H3Engine::new(), shape, transform, axis_order, search_mode)
}

/// Convert a raster to `(value, cell)` rows on the H3 grid.
///
/// Uses [`RasterConfig::from_env`]. Construct a [`RasterConverter`] to
/// reuse a worker pool across calls.
pub fn raster_to_cells(
    array: RasterArray<'_>,
    transform: &Transform,
    resolution: u8,
    nodata: Option<RasterValue>,
    axis_order: AxisOrder,
    compacted: bool,
) -> Result<Vec<(RasterValue, GridCellId)>> {
    RasterConverter::new(RasterConfig::from_env())?.raster_to_cells(
        array,
        transform,
        resolution,
        nodata,
        axis_order,
        compacted,
    )
}
