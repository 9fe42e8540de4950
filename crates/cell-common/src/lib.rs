//! Common types and utilities shared by the raster and vector conversion crates.

pub mod axis;
pub mod cell;
pub mod engine;
pub mod error;
pub mod pool;

pub use axis::AxisOrder;
pub use cell::{validate_resolution, CellSet, GridCellId, MAX_RESOLUTION, MIN_RESOLUTION};
pub use engine::{cells_to_polygons, cells_with_boundaries, GridEngine, H3Engine};
pub use error::{ConversionError, Result};
pub use pool::WorkerPool;
