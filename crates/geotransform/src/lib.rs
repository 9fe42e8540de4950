//! Geo-referencing of two-dimensional arrays.
//!
//! Maps pixel positions to geographic coordinates through an affine
//! transform and estimates pixel footprints on a spherical earth.

pub mod sphere;
pub mod transform;

pub use sphere::{area_linearring, area_rect};
pub use transform::{Transform, TransformConvention};
