//! Affine geotransform.
//!
//! The six coefficients `a`..`f` form the augmented matrix
//!
//! ```text
//!   | x |   | a  b  c | | col |
//!   | y | = | d  e  f | | row |
//!   | 1 |   | 0  0  1 | |  1  |
//! ```
//!
//! Two serialized orderings are in common use:
//! - **Affine** (`a, b, c, d, e, f`): the row-major form used by the affine
//!   library and rasterio.
//! - **GDAL** (`c, a, b, f, d, e`): the geotransform returned by
//!   `GDALGetGeoTransform`, with the origin terms first.
//!
//! Both normalize to the same [`Transform`].

use std::ops::Mul;
use std::str::FromStr;

use cell_common::{ConversionError, Result};
use geo_types::{Coord, Rect};
use serde::{Deserialize, Serialize};

const COEFFICIENT_NAMES: [&str; 6] = ["a", "b", "c", "d", "e", "f"];

/// Ordering of six serialized transform coefficients.
///
/// Callers state which convention their coefficients follow; nothing is
/// inferred from the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformConvention {
    /// `a, b, c, d, e, f` (affine library, rasterio).
    Affine,
    /// `c, a, b, f, d, e` (GDAL geotransform).
    #[default]
    Gdal,
}

impl FromStr for TransformConvention {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "affine" | "rasterio" => Ok(Self::Affine),
            "gdal" => Ok(Self::Gdal),
            other => Err(ConversionError::invalid_transform(format!(
                "unknown coefficient convention '{}'",
                other
            ))),
        }
    }
}

/// Immutable affine transform from pixel space `(col, row)` to geographic
/// space `(x, y)`.
///
/// All coefficients are finite and the determinant is non-zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    a: f64,
    b: f64,
    c: f64,
    d: f64,
    e: f64,
    f: f64,
}

impl Transform {
    #![allow(clippy::many_single_char_names)]

    /// Create a transform from coefficients in affine order.
    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Result<Self> {
        let coefficients = [a, b, c, d, e, f];
        for (name, value) in COEFFICIENT_NAMES.iter().zip(coefficients) {
            if !value.is_finite() {
                return Err(ConversionError::invalid_transform(format!(
                    "coefficient '{}' is not finite ({})",
                    name, value
                )));
            }
        }
        let transform = Self { a, b, c, d, e, f };
        if transform.is_degenerate() {
            return Err(ConversionError::invalid_transform(format!(
                "pixel area is zero (a={}, b={}, d={}, e={})",
                a, b, d, e
            )));
        }
        Ok(transform)
    }

    /// Create from coefficients in the affine/rasterio order.
    pub fn from_affine(coefficients: &[f64; 6]) -> Result<Self> {
        let [a, b, c, d, e, f] = *coefficients;
        Self::new(a, b, c, d, e, f)
    }

    /// Create from a GDAL geotransform.
    pub fn from_gdal(geotransform: &[f64; 6]) -> Result<Self> {
        let [c, a, b, f, d, e] = *geotransform;
        Self::new(a, b, c, d, e, f)
    }

    /// Create from a slice of coefficients in the given convention.
    pub fn from_coefficients(coefficients: &[f64], convention: TransformConvention) -> Result<Self> {
        let array: [f64; 6] = coefficients.try_into().map_err(|_| {
            ConversionError::invalid_transform(format!(
                "expected 6 coefficients, got {}",
                coefficients.len()
            ))
        })?;
        match convention {
            TransformConvention::Affine => Self::from_affine(&array),
            TransformConvention::Gdal => Self::from_gdal(&array),
        }
    }

    /// Coefficients in affine order.
    pub fn to_affine(&self) -> [f64; 6] {
        [self.a, self.b, self.c, self.d, self.e, self.f]
    }

    /// Coefficients in GDAL order.
    pub fn to_gdal(&self) -> [f64; 6] {
        [self.c, self.a, self.b, self.f, self.d, self.e]
    }

    /// The determinant of the linear part; the signed area of one pixel.
    pub fn determinant(&self) -> f64 {
        self.a * self.e - self.b * self.d
    }

    /// True if the transform collapses pixels to zero area.
    pub fn is_degenerate(&self) -> bool {
        self.determinant() == 0.0
    }

    /// Apply the transform to raw pixel-space coordinates.
    #[inline]
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            x * self.a + y * self.b + self.c,
            x * self.d + y * self.e + self.f,
        )
    }

    /// Geographic coordinate of the center of pixel `(col, row)`.
    #[inline]
    pub fn map_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        self.apply(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// Upper-left and lower-right corners of pixel `(col, row)` in
    /// geographic coordinates.
    pub fn pixel_corners(&self, col: usize, row: usize) -> (Coord<f64>, Coord<f64>) {
        let ul = self * Coord::from((col as f64, row as f64));
        let lr = self * Coord::from((col as f64 + 1.0, row as f64 + 1.0));
        (ul, lr)
    }

    /// Axis-aligned bounds of pixel `(col, row)`.
    pub fn pixel_bounds(&self, col: usize, row: usize) -> Rect<f64> {
        let (ul, lr) = self.pixel_corners(col, row);
        Rect::new(ul, lr)
    }

    /// The inverse transform, mapping geographic coordinates back to pixels.
    pub fn invert(&self) -> Result<Self> {
        if self.is_degenerate() {
            return Err(ConversionError::invalid_transform("transform is not invertible"));
        }
        let idet = 1.0 / self.determinant();
        let ra = self.e * idet;
        let rb = -self.b * idet;
        let rd = -self.d * idet;
        let re = self.a * idet;
        Self::new(
            ra,
            rb,
            -self.c * ra - self.f * rb,
            rd,
            re,
            -self.c * rd - self.f * re,
        )
    }
}

impl Mul<Coord<f64>> for &Transform {
    type Output = Coord<f64>;

    fn mul(self, rhs: Coord<f64>) -> Self::Output {
        let (x, y) = self.apply(rhs.x, rhs.y);
        Coord { x, y }
    }
}

impl Mul<&Rect<f64>> for &Transform {
    type Output = Rect<f64>;

    fn mul(self, rhs: &Rect<f64>) -> Self::Output {
        Rect::new(self * rhs.min(), self * rhs.max())
    }
}
