//! Parallel scan of raster pixels into per-value cell sets.
//!
//! The raster is split into bands of consecutive rows. Each band is scanned
//! on a worker into its own `value -> cells` map, and the partial maps are
//! merged by per-value set union. Union is associative and commutative, so
//! the result does not depend on how bands are scheduled.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::hash::Hash;
use std::ops::Range;
use std::time::Instant;

use cell_common::{validate_resolution, AxisOrder, CellSet, GridEngine, Result, WorkerPool};
use geotransform::Transform;
use ndarray::ArrayView2;
use rayon::prelude::*;
use tracing::debug;

use crate::config::RasterConfig;
use crate::element::RasterElement;

/// Deduplicated cells per raster value.
pub type ValueCells<K> = HashMap<K, CellSet>;

/// Scans typed rasters using a grid engine and a worker pool.
pub struct RasterScanner<'a, E: GridEngine + ?Sized> {
    engine: &'a E,
    pool: &'a WorkerPool,
    config: &'a RasterConfig,
}

/// Per-call scan parameters shared by all bands.
struct BandScan<'s, T: RasterElement> {
    array: ArrayView2<'s, T>,
    transform: Transform,
    axis_order: AxisOrder,
    cols: usize,
    resolution: u8,
    nodata: Option<T>,
    tolerance: f64,
}

impl<T: RasterElement> BandScan<'_, T> {
    fn scan_rows<E: GridEngine + ?Sized>(&self, engine: &E, rows: Range<usize>) -> Result<ValueCells<T::Key>> {
        let mut groups: ValueCells<T::Key> = HashMap::new();
        for row in rows {
            for col in 0..self.cols {
                let value = self.array[self.axis_order.index(col, row)];
                if let Some(nodata) = self.nodata {
                    if value.matches_nodata(nodata, self.tolerance) {
                        continue;
                    }
                }
                let (lon, lat) = self.transform.map_to_geo(col, row);
                let cell = engine.point_to_cell(lon, lat, self.resolution)?;
                groups.entry(value.key()).or_default().insert(cell);
            }
        }
        Ok(groups)
    }
}

impl<'a, E: GridEngine + ?Sized> RasterScanner<'a, E> {
    pub fn new(engine: &'a E, pool: &'a WorkerPool, config: &'a RasterConfig) -> Self {
        Self {
            engine,
            pool,
            config,
        }
    }

    /// Map every non-nodata pixel to its cell at `resolution`, grouped by
    /// pixel value.
    ///
    /// An empty raster yields an empty map. The first failing pixel aborts
    /// the whole scan.
    pub fn scan<T: RasterElement>(
        &self,
        array: ArrayView2<'_, T>,
        transform: &Transform,
        resolution: u8,
        nodata: Option<T>,
        axis_order: AxisOrder,
    ) -> Result<ValueCells<T::Key>> {
        validate_resolution(resolution)?;
        let (dim0, dim1) = array.dim();
        let (cols, rows) = axis_order.cols_rows([dim0, dim1]);
        if cols == 0 || rows == 0 {
            debug!(dim0, dim1, "Raster is empty, nothing to scan");
            return Ok(HashMap::new());
        }

        let band_rows = self.config.band_rows_for(rows, self.pool.current_num_threads());
        let bands = rows.div_ceil(band_rows);
        debug!(
            cols,
            rows,
            bands,
            band_rows,
            resolution,
            element_type = %T::ELEMENT_TYPE,
            "Scanning raster"
        );

        let start = Instant::now();
        let scan = BandScan {
            array,
            transform: *transform,
            axis_order,
            cols,
            resolution,
            nodata,
            tolerance: self.config.float_nodata_tolerance,
        };
        let groups = self.pool.install(|| {
            (0..bands)
                .into_par_iter()
                .map(|band| {
                    let first = band * band_rows;
                    scan.scan_rows(self.engine, first..(first + band_rows).min(rows))
                })
                .try_reduce(HashMap::new, |mut merged, partial| {
                    merge_value_cells(&mut merged, partial);
                    Ok(merged)
                })
        })?;

        debug!(
            values = groups.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Raster scan complete"
        );
        Ok(groups)
    }

    /// Compact each value's cell set independently.
    pub fn compact<K>(&self, groups: ValueCells<K>) -> Result<ValueCells<K>>
    where
        K: Eq + Hash + Send,
    {
        let start = Instant::now();
        let compacted = self.pool.install(|| {
            groups
                .into_par_iter()
                .map(|(key, cells)| -> Result<(K, CellSet)> { Ok((key, self.engine.compact(&cells)?)) })
                .collect::<Result<ValueCells<K>>>()
        })?;
        debug!(
            values = compacted.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Compacted value cells"
        );
        Ok(compacted)
    }
}

/// Union `partial` into `merged`, value by value.
pub fn merge_value_cells<K: Eq + Hash>(merged: &mut ValueCells<K>, mut partial: ValueCells<K>) {
    if merged.len() < partial.len() {
        std::mem::swap(merged, &mut partial);
    }
    for (key, cells) in partial {
        match merged.entry(key) {
            Entry::Occupied(mut entry) => entry.get_mut().union_with(cells),
            Entry::Vacant(entry) => {
                entry.insert(cells);
            }
        }
    }
}
