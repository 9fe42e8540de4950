//! Dynamic entry point for raster conversion.

use std::collections::HashMap;

use cell_common::{
    AxisOrder, ConversionError, GridCellId, GridEngine, H3Engine, Result, WorkerPool,
};
use geotransform::Transform;
use ndarray::ArrayView2;
use tracing::info;

use crate::config::RasterConfig;
use crate::element::{each_variant, RasterArray, RasterElement, RasterValue};
use crate::resolution::{self, ResolutionSearchMode};
use crate::scanner::{RasterScanner, ValueCells};

/// Converts rasters to grid cells with a fixed engine, configuration and
/// worker pool. Calls share no mutable state and may run concurrently.
#[derive(Debug)]
pub struct RasterConverter<E: GridEngine = H3Engine> {
    engine: E,
    config: RasterConfig,
    pool: WorkerPool,
}

impl RasterConverter<H3Engine> {
    pub fn new(config: RasterConfig) -> Result<Self> {
        Self::with_engine(H3Engine::new(), config)
    }
}

impl<E: GridEngine> RasterConverter<E> {
    pub fn with_engine(engine: E, config: RasterConfig) -> Result<Self> {
        config.validate().map_err(ConversionError::Config)?;
        let pool = WorkerPool::new(config.num_threads)?;
        Ok(Self {
            engine,
            config,
            pool,
        })
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn config(&self) -> &RasterConfig {
        &self.config
    }

    fn scanner(&self) -> RasterScanner<'_, E> {
        RasterScanner::new(&self.engine, &self.pool, &self.config)
    }

    /// See [`resolution::nearest_resolution`].
    pub fn nearest_resolution(
        &self,
        shape: [usize; 2],
        transform: &Transform,
        axis_order: AxisOrder,
        search_mode: ResolutionSearchMode,
    ) -> Result<u8> {
        resolution::nearest_resolution(&self.engine, shape, transform, axis_order, search_mode)
    }

    /// Cells per value for a typed raster, optionally compacted.
    pub fn cells_by_value<T: RasterElement>(
        &self,
        array: ArrayView2<'_, T>,
        transform: &Transform,
        resolution: u8,
        nodata: Option<T>,
        axis_order: AxisOrder,
        compacted: bool,
    ) -> Result<ValueCells<T::Key>> {
        let scanner = self.scanner();
        let groups = scanner.scan(array, transform, resolution, nodata, axis_order)?;
        if compacted {
            scanner.compact(groups)
        } else {
            Ok(groups)
        }
    }

    /// Cells per value for a raster of any supported element type.
    ///
    /// `nodata` must be representable in the raster's element type.
    pub fn value_cells(
        &self,
        array: RasterArray<'_>,
        transform: &Transform,
        resolution: u8,
        nodata: Option<RasterValue>,
        axis_order: AxisOrder,
        compacted: bool,
    ) -> Result<ValueCells<RasterValue>> {
        each_variant!(array, RasterArray, view => {
            self.typed_value_cells(view, transform, resolution, nodata, axis_order, compacted)
        })
    }

    fn typed_value_cells<T: RasterElement>(
        &self,
        array: ArrayView2<'_, T>,
        transform: &Transform,
        resolution: u8,
        nodata: Option<RasterValue>,
        axis_order: AxisOrder,
        compacted: bool,
    ) -> Result<ValueCells<RasterValue>> {
        let nodata = typed_nodata::<T>(nodata)?;
        let groups = self.cells_by_value(array, transform, resolution, nodata, axis_order, compacted)?;
        Ok(into_raster_values::<T>(groups))
    }

    /// Flattened `(value, cell)` rows, ordered by value and then by cell.
    pub fn raster_to_cells(
        &self,
        array: RasterArray<'_>,
        transform: &Transform,
        resolution: u8,
        nodata: Option<RasterValue>,
        axis_order: AxisOrder,
        compacted: bool,
    ) -> Result<Vec<(RasterValue, GridCellId)>> {
        let element_type = array.element_type();
        let groups = self.value_cells(array, transform, resolution, nodata, axis_order, compacted)?;
        let rows = flatten(groups);
        info!(
            element_type = %element_type,
            resolution,
            compacted,
            rows = rows.len(),
            "Converted raster to cells"
        );
        Ok(rows)
    }
}

fn typed_nodata<T: RasterElement>(nodata: Option<RasterValue>) -> Result<Option<T>> {
    nodata
        .map(|value| {
            T::from_value(value).ok_or_else(|| ConversionError::InvalidNodata {
                value: value.to_string(),
                element_type: T::ELEMENT_TYPE.to_string(),
            })
        })
        .transpose()
}

fn into_raster_values<T: RasterElement>(groups: ValueCells<T::Key>) -> ValueCells<RasterValue> {
    groups
        .into_iter()
        .map(|(key, cells)| (T::into_value(key), cells))
        .collect::<HashMap<_, _>>()
}

/// One row per `(value, cell)` pair, sorted for stable output.
pub fn flatten(groups: ValueCells<RasterValue>) -> Vec<(RasterValue, GridCellId)> {
    let mut values: Vec<_> = groups.into_iter().collect();
    values.sort_unstable_by_key(|(value, _)| *value);
    values
        .into_iter()
        .flat_map(|(value, cells)| {
            cells
                .to_sorted_vec()
                .into_iter()
                .map(move |cell| (value, cell))
        })
        .collect()
}
