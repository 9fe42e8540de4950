//! Axis order of two-dimensional arrays.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConversionError;

/// How the two dimensions of an array shape map to columns and rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisOrder {
    /// `X,Y` ordering: the first dimension indexes columns.
    XY,
    /// `Y,X` ordering: the first dimension indexes rows. This is the layout
    /// of arrays read through GDAL and rasterio.
    #[default]
    YX,
}

impl AxisOrder {
    /// Index of the x (column) axis in the shape.
    pub const fn x_axis(&self) -> usize {
        match self {
            Self::XY => 0,
            Self::YX => 1,
        }
    }

    /// Index of the y (row) axis in the shape.
    pub const fn y_axis(&self) -> usize {
        match self {
            Self::XY => 1,
            Self::YX => 0,
        }
    }

    /// Split a shape into `(columns, rows)`.
    pub const fn cols_rows(&self, shape: [usize; 2]) -> (usize, usize) {
        (shape[self.x_axis()], shape[self.y_axis()])
    }

    /// Array index of the element at `(col, row)`.
    pub const fn index(&self, col: usize, row: usize) -> [usize; 2] {
        match self {
            Self::XY => [col, row],
            Self::YX => [row, col],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::XY => "xy",
            Self::YX => "yx",
        }
    }
}

impl FromStr for AxisOrder {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "yx" | "YX" => Ok(Self::YX),
            "xy" | "XY" => Ok(Self::XY),
            other => Err(ConversionError::UnsupportedAxisOrder(other.to_string())),
        }
    }
}

impl std::fmt::Display for AxisOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
