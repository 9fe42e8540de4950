//! Test data generators for rasters and point sets.
//!
//! These generators create predictable, verifiable patterns that can be used
//! across the test suite.

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A raster of `rows x cols` pixels all set to `value`.
///
/// # Example
///
/// ```
/// use test_utils::uniform_raster;
///
/// let raster = uniform_raster(8, 8, 5u8);
/// assert_eq!(raster.len(), 64);
/// assert!(raster.iter().all(|v| *v == 5));
/// ```
pub fn uniform_raster<T: Clone>(rows: usize, cols: usize, value: T) -> Array2<T> {
    Array2::from_elem((rows, cols), value)
}

/// A uniform raster with `nodata` written at each `(row, col)` in `holes`.
pub fn raster_with_holes<T: Clone>(
    rows: usize,
    cols: usize,
    value: T,
    nodata: T,
    holes: &[(usize, usize)],
) -> Array2<T> {
    let mut raster = uniform_raster(rows, cols, value);
    for &(row, col) in holes {
        raster[[row, col]] = nodata.clone();
    }
    raster
}

/// A raster whose pixel at `(row, col)` has class `(row + col) % classes`.
///
/// Produces diagonal stripes, so every class touches many rows and bands.
///
/// # Example
///
/// ```
/// use test_utils::striped_raster;
///
/// let raster = striped_raster(4, 4, 3);
/// assert_eq!(raster[[0, 0]], 0);
/// assert_eq!(raster[[1, 2]], 0);
/// assert_eq!(raster[[3, 3]], 0);
/// assert_eq!(raster[[0, 1]], 1);
/// ```
pub fn striped_raster(rows: usize, cols: usize, classes: u8) -> Array2<u8> {
    let classes = classes.max(1) as usize;
    Array2::from_shape_fn((rows, cols), |(row, col)| ((row + col) % classes) as u8)
}

/// A raster where each pixel is `nodata` with probability `nodata_ratio`,
/// else a value in `0..classes`. Deterministic for a given `seed`.
pub fn random_raster(
    rows: usize,
    cols: usize,
    classes: u16,
    nodata: u16,
    nodata_ratio: f64,
    seed: u64,
) -> Array2<u16> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array2::from_shape_simple_fn((rows, cols), || {
        if rng.gen_bool(nodata_ratio) {
            nodata
        } else {
            rng.gen_range(0..classes.max(1))
        }
    })
}

/// `count` random `(lon, lat)` points inside the given bounds.
pub fn random_points(
    count: usize,
    (min_lon, min_lat): (f64, f64),
    (max_lon, max_lat): (f64, f64),
    seed: u64,
) -> Vec<(f64, f64)> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            (
                rng.gen_range(min_lon..max_lon),
                rng.gen_range(min_lat..max_lat),
            )
        })
        .collect()
}
