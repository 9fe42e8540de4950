//! Choosing a grid resolution that matches the raster's pixel size.

use std::str::FromStr;

use cell_common::{AxisOrder, ConversionError, GridEngine, Result, MAX_RESOLUTION, MIN_RESOLUTION};
use geotransform::{area_rect, Transform};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How a resolution is matched against the pixel area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSearchMode {
    /// Resolution whose mean cell area is closest to the pixel area.
    #[default]
    MinDiff,
    /// Coarsest resolution whose mean cell area does not exceed the pixel
    /// area.
    SmallerThanPixel,
}

impl ResolutionSearchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MinDiff => "min_diff",
            Self::SmallerThanPixel => "smaller_than_pixel",
        }
    }
}

impl FromStr for ResolutionSearchMode {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "min_diff" | "min-diff" => Ok(Self::MinDiff),
            "smaller_than_pixel" | "smaller-than-pixel" => Ok(Self::SmallerThanPixel),
            other => Err(ConversionError::UnsupportedSearchMode(other.to_string())),
        }
    }
}

impl std::fmt::Display for ResolutionSearchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Area of the pixel at the center of the raster in square meters.
pub fn pixel_area(shape: [usize; 2], transform: &Transform, axis_order: AxisOrder) -> Result<f64> {
    let (cols, rows) = axis_order.cols_rows(shape);
    if cols == 0 || rows == 0 {
        return Err(ConversionError::empty_input(format!(
            "cannot derive a pixel size from shape {:?}",
            shape
        )));
    }
    Ok(area_rect(&transform.pixel_bounds(cols / 2, rows / 2)))
}

/// Resolution whose cells best match the pixel size of a raster.
pub fn nearest_resolution<E: GridEngine + ?Sized>(
    engine: &E,
    shape: [usize; 2],
    transform: &Transform,
    axis_order: AxisOrder,
    search_mode: ResolutionSearchMode,
) -> Result<u8> {
    let area = pixel_area(shape, transform, axis_order)?;
    let resolution = select_resolution(engine, area, search_mode)?;
    debug!(
        pixel_area_m2 = area,
        search_mode = %search_mode,
        resolution,
        "Selected resolution"
    );
    Ok(resolution)
}

/// Resolution for a pixel of `pixel_area` square meters.
pub fn select_resolution<E: GridEngine + ?Sized>(
    engine: &E,
    pixel_area: f64,
    search_mode: ResolutionSearchMode,
) -> Result<u8> {
    match search_mode {
        ResolutionSearchMode::MinDiff => {
            let mut best = MIN_RESOLUTION;
            let mut best_diff = f64::INFINITY;
            for resolution in MIN_RESOLUTION..=MAX_RESOLUTION {
                let diff = (engine.mean_cell_area(resolution)? - pixel_area).abs();
                // ties go to the coarser resolution
                if diff < best_diff {
                    best = resolution;
                    best_diff = diff;
                }
            }
            Ok(best)
        }
        ResolutionSearchMode::SmallerThanPixel => {
            for resolution in MIN_RESOLUTION..=MAX_RESOLUTION {
                if engine.mean_cell_area(resolution)? <= pixel_area {
                    return Ok(resolution);
                }
            }
            Ok(MAX_RESOLUTION)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cell_common::H3Engine;

    // 2000x2000 WGS84 raster around Karlsruhe
    const R_TIFF_GDAL: [f64; 6] = [8.11377, 0.0011965049999999992, 0.0, 49.40792, 0.0, -0.001215135];

    fn r_tiff() -> Transform {
        Transform::from_gdal(&R_TIFF_GDAL).unwrap()
    }

    #[test]
    fn test_search_mode_from_str() {
        assert_eq!(
            "min_diff".parse::<ResolutionSearchMode>().unwrap(),
            ResolutionSearchMode::MinDiff
        );
        assert_eq!(
            "smaller-than-pixel".parse::<ResolutionSearchMode>().unwrap(),
            ResolutionSearchMode::SmallerThanPixel
        );
        let err = "nearest".parse::<ResolutionSearchMode>().unwrap_err();
        assert!(matches!(err, ConversionError::UnsupportedSearchMode(_)));
    }

    #[test]
    fn test_nearest_resolution_min_diff() {
        let resolution = nearest_resolution(
            &H3Engine,
            [2000, 2000],
            &r_tiff(),
            AxisOrder::YX,
            ResolutionSearchMode::MinDiff,
        )
        .unwrap();
        assert_eq!(resolution, 10);
    }

    #[test]
    fn test_nearest_resolution_smaller_than_pixel() {
        let resolution = nearest_resolution(
            &H3Engine,
            [2000, 2000],
            &r_tiff(),
            AxisOrder::YX,
            ResolutionSearchMode::SmallerThanPixel,
        )
        .unwrap();
        assert_eq!(resolution, 11);
    }

    #[test]
    fn test_empty_shape() {
        let err = nearest_resolution(
            &H3Engine,
            [0, 10],
            &r_tiff(),
            AxisOrder::XY,
            ResolutionSearchMode::MinDiff,
        )
        .unwrap_err();
        assert!(matches!(err, ConversionError::EmptyInput(_)));
    }

    #[test]
    fn test_smaller_than_pixel_bounds() {
        let engine = H3Engine;
        // larger than a resolution 0 cell
        assert_eq!(
            select_resolution(&engine, 1e14, ResolutionSearchMode::SmallerThanPixel).unwrap(),
            0
        );
        // smaller than a resolution 15 cell
        assert_eq!(
            select_resolution(&engine, 1e-3, ResolutionSearchMode::SmallerThanPixel).unwrap(),
            15
        );
        assert_eq!(select_resolution(&engine, 1e-3, ResolutionSearchMode::MinDiff).unwrap(), 15);
    }

    #[test]
    fn test_smaller_than_pixel_monotonic() {
        let engine = H3Engine;
        let mut area = 1e14;
        let mut previous = MIN_RESOLUTION;
        while area > 1e-3 {
            let resolution =
                select_resolution(&engine, area, ResolutionSearchMode::SmallerThanPixel).unwrap();
            assert!(resolution >= previous, "resolution decreased at area {}", area);
            assert!(engine.mean_cell_area(resolution).unwrap() <= area || resolution == MAX_RESOLUTION);
            previous = resolution;
            area /= 2.0;
        }
        assert_eq!(previous, MAX_RESOLUTION);
    }

    #[test]
    fn test_min_diff_exact_match() {
        let engine = H3Engine;
        for resolution in MIN_RESOLUTION..=MAX_RESOLUTION {
            let area = engine.mean_cell_area(resolution).unwrap();
            assert_eq!(
                select_resolution(&engine, area, ResolutionSearchMode::MinDiff).unwrap(),
                resolution
            );
            assert_eq!(
                select_resolution(&engine, area, ResolutionSearchMode::SmallerThanPixel).unwrap(),
                resolution
            );
        }
    }
}
