//! Raster element types.
//!
//! Scanning is written once against [`RasterElement`]. The closed set of
//! supported numeric types is enumerated by [`ElementType`], and arrays of
//! any of them travel through the dynamic API as [`RasterArray`] (borrowed)
//! or [`RasterData`] (owned).

use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

use bytemuck::Pod;
use cell_common::{ConversionError, Result};
use ndarray::{Array2, ArrayView2};
use num_traits::NumCast;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// Numeric element types a raster can be scanned with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
}

impl ElementType {
    /// numpy-style dtype name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::UInt8 => "uint8",
            Self::UInt16 => "uint16",
            Self::UInt32 => "uint32",
            Self::UInt64 => "uint64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
        }
    }

    /// Width of one element in bytes.
    pub fn size_bytes(&self) -> usize {
        match self {
            Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::UInt16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float32 => 4,
            Self::Int64 | Self::UInt64 | Self::Float64 => 8,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }
}

impl FromStr for ElementType {
    type Err = ConversionError;

    /// Accepts numpy dtype names (`"uint8"`, `"float32"`) and Rust
    /// primitive names (`"u8"`, `"f32"`).
    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "int8" | "i8" => Ok(Self::Int8),
            "int16" | "i16" => Ok(Self::Int16),
            "int32" | "i32" => Ok(Self::Int32),
            "int64" | "i64" => Ok(Self::Int64),
            "uint8" | "u8" => Ok(Self::UInt8),
            "uint16" | "u16" => Ok(Self::UInt16),
            "uint32" | "u32" => Ok(Self::UInt32),
            "uint64" | "u64" => Ok(Self::UInt64),
            "float32" | "f32" => Ok(Self::Float32),
            "float64" | "f64" => Ok(Self::Float64),
            _ => Err(ConversionError::UnsupportedElementType(s.to_string())),
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single raster value of any supported element type.
///
/// Floats are wrapped in [`OrderedFloat`] so values can be grouped and
/// sorted; all NaNs compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RasterValue {
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float32(OrderedFloat<f32>),
    Float64(OrderedFloat<f64>),
}

impl RasterValue {
    pub fn element_type(&self) -> ElementType {
        match self {
            Self::Int8(_) => ElementType::Int8,
            Self::Int16(_) => ElementType::Int16,
            Self::Int32(_) => ElementType::Int32,
            Self::Int64(_) => ElementType::Int64,
            Self::UInt8(_) => ElementType::UInt8,
            Self::UInt16(_) => ElementType::UInt16,
            Self::UInt32(_) => ElementType::UInt32,
            Self::UInt64(_) => ElementType::UInt64,
            Self::Float32(_) => ElementType::Float32,
            Self::Float64(_) => ElementType::Float64,
        }
    }

    /// Numeric cast to `T`, `None` when the value is out of range.
    pub fn cast<T: NumCast>(self) -> Option<T> {
        match self {
            Self::Int8(v) => T::from(v),
            Self::Int16(v) => T::from(v),
            Self::Int32(v) => T::from(v),
            Self::Int64(v) => T::from(v),
            Self::UInt8(v) => T::from(v),
            Self::UInt16(v) => T::from(v),
            Self::UInt32(v) => T::from(v),
            Self::UInt64(v) => T::from(v),
            Self::Float32(v) => T::from(v.into_inner()),
            Self::Float64(v) => T::from(v.into_inner()),
        }
    }

    /// The value as `f64`. Large 64-bit integers lose precision.
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Int8(v) => v as f64,
            Self::Int16(v) => v as f64,
            Self::Int32(v) => v as f64,
            Self::Int64(v) => v as f64,
            Self::UInt8(v) => v as f64,
            Self::UInt16(v) => v as f64,
            Self::UInt32(v) => v as f64,
            Self::UInt64(v) => v as f64,
            Self::Float32(v) => v.into_inner() as f64,
            Self::Float64(v) => v.into_inner(),
        }
    }
}

impl fmt::Display for RasterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int8(v) => write!(f, "{}", v),
            Self::Int16(v) => write!(f, "{}", v),
            Self::Int32(v) => write!(f, "{}", v),
            Self::Int64(v) => write!(f, "{}", v),
            Self::UInt8(v) => write!(f, "{}", v),
            Self::UInt16(v) => write!(f, "{}", v),
            Self::UInt32(v) => write!(f, "{}", v),
            Self::UInt64(v) => write!(f, "{}", v),
            Self::Float32(v) => write!(f, "{}", v),
            Self::Float64(v) => write!(f, "{}", v),
        }
    }
}

/// A numeric type raster pixels can be stored as.
pub trait RasterElement: Pod + NumCast + PartialEq + Send + Sync + fmt::Debug {
    const ELEMENT_TYPE: ElementType;

    /// Hashable grouping key for pixel values.
    type Key: Copy + Eq + Ord + Hash + Send + Sync + fmt::Debug;

    fn key(self) -> Self::Key;

    fn into_value(key: Self::Key) -> RasterValue;

    /// Whether this pixel equals `nodata`. Floats treat NaN as equal to NaN
    /// and accept differences up to `tolerance`; integers compare exactly.
    fn matches_nodata(self, nodata: Self, tolerance: f64) -> bool;

    /// Convert a dynamically typed value, rejecting values the element type
    /// cannot represent (out of range, or fractional for integers).
    fn from_value(value: RasterValue) -> Option<Self> {
        let cast = value.cast::<Self>()?;
        if !Self::ELEMENT_TYPE.is_float()
            && value.element_type().is_float()
            && value.as_f64().fract() != 0.0
        {
            return None;
        }
        Some(cast)
    }
}

macro_rules! integer_element {
    ($($ty:ty => $variant:ident),* $(,)?) => {$(
        impl RasterElement for $ty {
            const ELEMENT_TYPE: ElementType = ElementType::$variant;
            type Key = $ty;

            #[inline]
            fn key(self) -> $ty {
                self
            }

            fn into_value(key: $ty) -> RasterValue {
                RasterValue::$variant(key)
            }

            #[inline]
            fn matches_nodata(self, nodata: $ty, _tolerance: f64) -> bool {
                self == nodata
            }
        }

        impl From<$ty> for RasterValue {
            fn from(value: $ty) -> Self {
                RasterValue::$variant(value)
            }
        }

        impl<'a> From<ArrayView2<'a, $ty>> for RasterArray<'a> {
            fn from(view: ArrayView2<'a, $ty>) -> Self {
                RasterArray::$variant(view)
            }
        }

        impl From<Array2<$ty>> for RasterData {
            fn from(array: Array2<$ty>) -> Self {
                RasterData::$variant(array)
            }
        }
    )*};
}

macro_rules! float_element {
    ($($ty:ty => $variant:ident),* $(,)?) => {$(
        impl RasterElement for $ty {
            const ELEMENT_TYPE: ElementType = ElementType::$variant;
            type Key = OrderedFloat<$ty>;

            #[inline]
            fn key(self) -> OrderedFloat<$ty> {
                OrderedFloat(self)
            }

            fn into_value(key: OrderedFloat<$ty>) -> RasterValue {
                RasterValue::$variant(key)
            }

            #[inline]
            fn matches_nodata(self, nodata: $ty, tolerance: f64) -> bool {
                if nodata.is_nan() {
                    return self.is_nan();
                }
                self == nodata || (tolerance > 0.0 && ((self - nodata).abs() as f64) <= tolerance)
            }
        }

        impl From<$ty> for RasterValue {
            fn from(value: $ty) -> Self {
                RasterValue::$variant(OrderedFloat(value))
            }
        }

        impl<'a> From<ArrayView2<'a, $ty>> for RasterArray<'a> {
            fn from(view: ArrayView2<'a, $ty>) -> Self {
                RasterArray::$variant(view)
            }
        }

        impl From<Array2<$ty>> for RasterData {
            fn from(array: Array2<$ty>) -> Self {
                RasterData::$variant(array)
            }
        }
    )*};
}

integer_element!(
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
);

float_element!(f32 => Float32, f64 => Float64);

/// Expand `$body` once per variant of a raster array enum, binding the
/// inner array to `$array`.
macro_rules! each_variant {
    ($value:expr, $enum:ident, $array:ident => $body:expr) => {
        match $value {
            $enum::Int8($array) => $body,
            $enum::Int16($array) => $body,
            $enum::Int32($array) => $body,
            $enum::Int64($array) => $body,
            $enum::UInt8($array) => $body,
            $enum::UInt16($array) => $body,
            $enum::UInt32($array) => $body,
            $enum::UInt64($array) => $body,
            $enum::Float32($array) => $body,
            $enum::Float64($array) => $body,
        }
    };
}

pub(crate) use each_variant;

/// Borrowed two-dimensional raster of any supported element type.
#[derive(Debug, Clone)]
pub enum RasterArray<'a> {
    Int8(ArrayView2<'a, i8>),
    Int16(ArrayView2<'a, i16>),
    Int32(ArrayView2<'a, i32>),
    Int64(ArrayView2<'a, i64>),
    UInt8(ArrayView2<'a, u8>),
    UInt16(ArrayView2<'a, u16>),
    UInt32(ArrayView2<'a, u32>),
    UInt64(ArrayView2<'a, u64>),
    Float32(ArrayView2<'a, f32>),
    Float64(ArrayView2<'a, f64>),
}

impl RasterArray<'_> {
    pub fn element_type(&self) -> ElementType {
        match self {
            Self::Int8(_) => ElementType::Int8,
            Self::Int16(_) => ElementType::Int16,
            Self::Int32(_) => ElementType::Int32,
            Self::Int64(_) => ElementType::Int64,
            Self::UInt8(_) => ElementType::UInt8,
            Self::UInt16(_) => ElementType::UInt16,
            Self::UInt32(_) => ElementType::UInt32,
            Self::UInt64(_) => ElementType::UInt64,
            Self::Float32(_) => ElementType::Float32,
            Self::Float64(_) => ElementType::Float64,
        }
    }

    /// Array shape as `[dim0, dim1]`.
    pub fn shape(&self) -> [usize; 2] {
        each_variant!(self, RasterArray, view => {
            let (dim0, dim1) = view.dim();
            [dim0, dim1]
        })
    }

    pub fn is_empty(&self) -> bool {
        let [dim0, dim1] = self.shape();
        dim0 == 0 || dim1 == 0
    }
}

/// Owned two-dimensional raster of any supported element type.
#[derive(Debug, Clone, PartialEq)]
pub enum RasterData {
    Int8(Array2<i8>),
    Int16(Array2<i16>),
    Int32(Array2<i32>),
    Int64(Array2<i64>),
    UInt8(Array2<u8>),
    UInt16(Array2<u16>),
    UInt32(Array2<u32>),
    UInt64(Array2<u64>),
    Float32(Array2<f32>),
    Float64(Array2<f64>),
}

impl RasterData {
    /// Build an array from a raw native-endian buffer in row-major order,
    /// as exported by numpy's `tobytes()`.
    pub fn from_bytes(element_type: &str, shape: [usize; 2], bytes: &[u8]) -> Result<Self> {
        let element_type: ElementType = element_type.parse()?;
        let expected = shape[0]
            .checked_mul(shape[1])
            .and_then(|n| n.checked_mul(element_type.size_bytes()))
            .ok_or_else(|| {
                ConversionError::InvalidBuffer(format!("shape {:?} overflows", shape))
            })?;
        if bytes.len() != expected {
            return Err(ConversionError::InvalidBuffer(format!(
                "expected {} bytes for a {}x{} {} array, got {}",
                expected,
                shape[0],
                shape[1],
                element_type,
                bytes.len()
            )));
        }

        Ok(match element_type {
            ElementType::Int8 => typed_array::<i8>(shape, bytes)?.into(),
            ElementType::Int16 => typed_array::<i16>(shape, bytes)?.into(),
            ElementType::Int32 => typed_array::<i32>(shape, bytes)?.into(),
            ElementType::Int64 => typed_array::<i64>(shape, bytes)?.into(),
            ElementType::UInt8 => typed_array::<u8>(shape, bytes)?.into(),
            ElementType::UInt16 => typed_array::<u16>(shape, bytes)?.into(),
            ElementType::UInt32 => typed_array::<u32>(shape, bytes)?.into(),
            ElementType::UInt64 => typed_array::<u64>(shape, bytes)?.into(),
            ElementType::Float32 => typed_array::<f32>(shape, bytes)?.into(),
            ElementType::Float64 => typed_array::<f64>(shape, bytes)?.into(),
        })
    }

    pub fn view(&self) -> RasterArray<'_> {
        each_variant!(self, RasterData, array => array.view().into())
    }

    pub fn element_type(&self) -> ElementType {
        self.view().element_type()
    }
}

fn typed_array<T: Pod>(shape: [usize; 2], bytes: &[u8]) -> Result<Array2<T>> {
    // the buffer may not be aligned for T
    let values: Vec<T> = bytes
        .chunks_exact(std::mem::size_of::<T>())
        .map(bytemuck::pod_read_unaligned)
        .collect();
    Array2::from_shape_vec((shape[0], shape[1]), values)
        .map_err(|err| ConversionError::InvalidBuffer(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_element_type_from_str() {
        assert_eq!("uint8".parse::<ElementType>().unwrap(), ElementType::UInt8);
        assert_eq!("Float32".parse::<ElementType>().unwrap(), ElementType::Float32);
        assert_eq!("i64".parse::<ElementType>().unwrap(), ElementType::Int64);

        let err = "complex64".parse::<ElementType>().unwrap_err();
        assert!(matches!(err, ConversionError::UnsupportedElementType(_)));
        assert!(err.to_string().contains("complex64"));
    }

    #[test]
    fn test_integer_nodata_is_exact() {
        assert!(0u8.matches_nodata(0, 0.5));
        assert!(!1u8.matches_nodata(0, 5.0));
        assert!((-3i32).matches_nodata(-3, 0.0));
    }

    #[test]
    fn test_float_nodata_nan_aware() {
        assert!(f32::NAN.matches_nodata(f32::NAN, 0.0));
        assert!(!1.0f32.matches_nodata(f32::NAN, 0.0));
        assert!(!f64::NAN.matches_nodata(-9999.0, 0.0));
        assert!((-9999.0f64).matches_nodata(-9999.0, 0.0));
        assert!(f64::INFINITY.matches_nodata(f64::INFINITY, 1e-6));
    }

    #[test]
    fn test_float_nodata_tolerance() {
        assert!(!(-9999.0001f64).matches_nodata(-9999.0, 0.0));
        assert!((-9999.0001f64).matches_nodata(-9999.0, 1e-3));
        assert!(!(-9998.0f64).matches_nodata(-9999.0, 1e-3));
    }

    #[test]
    fn test_float_keys_group_nan() {
        assert_eq!(f64::NAN.key(), (-f64::NAN).key());
        assert_ne!(1.0f32.key(), 2.0f32.key());
    }

    #[test]
    fn test_from_value() {
        assert_eq!(u8::from_value(RasterValue::Int64(200)), Some(200));
        assert_eq!(u8::from_value(RasterValue::Int64(300)), None);
        assert_eq!(u8::from_value(RasterValue::Int32(-1)), None);
        assert_eq!(i16::from_value(RasterValue::from(7.0f64)), Some(7));
        assert_eq!(i16::from_value(RasterValue::from(7.5f64)), None);
        assert_eq!(i16::from_value(RasterValue::from(f64::NAN)), None);

        let nan = f32::from_value(RasterValue::from(f64::NAN)).unwrap();
        assert!(nan.is_nan());
        assert_eq!(f64::from_value(RasterValue::UInt8(3)), Some(3.0));
    }

    #[test]
    fn test_raster_value_ordering_and_display() {
        let mut values = vec![
            RasterValue::from(3.5f64),
            RasterValue::from(-1.0f64),
            RasterValue::from(2.0f64),
        ];
        values.sort();
        assert_eq!(values[0], RasterValue::from(-1.0f64));
        assert_eq!(values[2].to_string(), "3.5");
        assert_eq!(RasterValue::UInt16(12).to_string(), "12");
        assert_eq!(RasterValue::UInt16(12).element_type(), ElementType::UInt16);
    }

    #[test]
    fn test_raster_value_serde() {
        let json = serde_json::to_string(&RasterValue::UInt8(5)).unwrap();
        assert_eq!(json, r#"{"uint8":5}"#);
        let back: RasterValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, RasterValue::UInt8(5));
    }

    #[test]
    fn test_raster_array_shape() {
        let data = array![[1u16, 2, 3], [4, 5, 6]];
        let raster = RasterArray::from(data.view());
        assert_eq!(raster.shape(), [2, 3]);
        assert_eq!(raster.element_type(), ElementType::UInt16);
        assert!(!raster.is_empty());

        let empty = ndarray::Array2::<f32>::zeros((0, 4));
        assert!(RasterArray::from(empty.view()).is_empty());
    }

    #[test]
    fn test_from_bytes() {
        let values: [u16; 6] = [1, 2, 3, 4, 5, 6];
        let bytes: &[u8] = bytemuck::cast_slice(&values);
        let data = RasterData::from_bytes("uint16", [2, 3], bytes).unwrap();
        assert_eq!(data, RasterData::UInt16(array![[1, 2, 3], [4, 5, 6]]));
        assert_eq!(data.element_type(), ElementType::UInt16);

        let floats: [f64; 2] = [0.5, f64::NAN];
        let data = RasterData::from_bytes("float64", [1, 2], bytemuck::cast_slice(&floats)).unwrap();
        match data {
            RasterData::Float64(array) => {
                assert_eq!(array[[0, 0]], 0.5);
                assert!(array[[0, 1]].is_nan());
            }
            other => panic!("unexpected element type {}", other.element_type()),
        }
    }

    #[test]
    fn test_from_bytes_unaligned() {
        let values: [u32; 2] = [7, 9];
        let mut bytes = vec![0u8];
        bytes.extend_from_slice(bytemuck::cast_slice(&values));
        let data = RasterData::from_bytes("u32", [2, 1], &bytes[1..]).unwrap();
        assert_eq!(data, RasterData::UInt32(array![[7], [9]]));
    }

    #[test]
    fn test_from_bytes_rejects_bad_input() {
        let err = RasterData::from_bytes("uint16", [2, 3], &[0u8; 11]).unwrap_err();
        assert!(matches!(err, ConversionError::InvalidBuffer(_)));
        assert!(err.to_string().contains("got 11"));

        let err = RasterData::from_bytes("bool", [1, 1], &[0u8]).unwrap_err();
        assert!(matches!(err, ConversionError::UnsupportedElementType(_)));
    }
}
