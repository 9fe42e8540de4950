//! Configuration for raster conversion.

use serde::{Deserialize, Serialize};

/// Upper bound on automatically sized row bands.
const MAX_AUTO_BAND_ROWS: usize = 256;

/// Bands per worker when sizing automatically, so that uneven bands
/// (e.g. mostly nodata) still balance out.
const BANDS_PER_WORKER: usize = 4;

/// Configuration for the raster scanner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterConfig {
    /// Rows per parallel work unit. 0 sizes bands from the raster height
    /// and the number of workers.
    pub band_rows: usize,

    /// Worker threads. 0 uses one worker per CPU core.
    pub num_threads: usize,

    /// Absolute tolerance for matching float pixels against nodata.
    /// 0.0 requires exact equality (NaN matches NaN).
    pub float_nodata_tolerance: f64,
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            band_rows: 0,
            num_threads: 0,
            float_nodata_tolerance: 0.0,
        }
    }
}

impl RasterConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("RASTER_BAND_ROWS") {
            if let Ok(rows) = val.parse() {
                config.band_rows = rows;
            }
        }

        if let Ok(val) = std::env::var("RASTER_NUM_THREADS") {
            if let Ok(threads) = val.parse() {
                config.num_threads = threads;
            }
        }

        if let Ok(val) = std::env::var("RASTER_NODATA_TOLERANCE") {
            if let Ok(tolerance) = val.parse() {
                config.float_nodata_tolerance = tolerance;
            }
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !self.float_nodata_tolerance.is_finite() || self.float_nodata_tolerance < 0.0 {
            return Err(format!(
                "float_nodata_tolerance must be finite and >= 0 (got {})",
                self.float_nodata_tolerance
            ));
        }

        Ok(())
    }

    /// Rows per band for a raster of `rows` rows scanned by `workers` threads.
    pub fn band_rows_for(&self, rows: usize, workers: usize) -> usize {
        if self.band_rows > 0 {
            return self.band_rows;
        }
        let bands = workers.max(1) * BANDS_PER_WORKER;
        rows.div_ceil(bands).clamp(1, MAX_AUTO_BAND_ROWS)
    }
}
