//! Error types for hexgrid conversion.

use thiserror::Error;

/// Result type alias using ConversionError.
pub type Result<T> = std::result::Result<T, ConversionError>;

/// Primary error type for raster and vector conversion.
#[derive(Debug, Error)]
pub enum ConversionError {
    // === Input Errors ===
    #[error("Invalid transform: {0}")]
    InvalidTransform(String),

    #[error("Unsupported axis order '{0}' (expected \"xy\" or \"yx\")")]
    UnsupportedAxisOrder(String),

    #[error("Unsupported resolution search mode '{0}' (expected \"min_diff\" or \"smaller_than_pixel\")")]
    UnsupportedSearchMode(String),

    #[error("Unsupported array element type: {0}")]
    UnsupportedElementType(String),

    #[error("Invalid resolution: {0}")]
    InvalidResolution(String),

    #[error("Invalid nodata value {value} for element type {element_type}")]
    InvalidNodata { value: String, element_type: String },

    #[error("Invalid raster buffer: {0}")]
    InvalidBuffer(String),

    #[error("Empty input: {0}")]
    EmptyInput(String),

    // === Vector Errors ===
    #[error("Duplicate surrogate id {0} in batch")]
    DuplicateSurrogateId(u64),

    #[error("Input ids and geometries must be of the same length (got {ids} ids, {geometries} geometries)")]
    LengthMismatch { ids: usize, geometries: usize },

    #[error("Invalid geometry for id {id}: {message}")]
    InvalidGeometry { id: u64, message: String },

    #[error("Invalid chunk size: {0} (must be positive)")]
    InvalidChunkSize(usize),

    // === Grid Engine Errors ===
    #[error("Invalid coordinate ({lon}, {lat}): {message}")]
    InvalidCoordinate { lon: f64, lat: f64, message: String },

    #[error("Invalid cell index {0:#x}")]
    InvalidCell(u64),

    #[error("Compaction failed: {0}")]
    Compaction(String),

    #[error("Failed to outline cells: {0}")]
    Outline(String),

    // === Infrastructure Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to build worker pool: {0}")]
    ThreadPool(String),
}

impl ConversionError {
    /// Create an InvalidTransform error.
    pub fn invalid_transform(msg: impl Into<String>) -> Self {
        Self::InvalidTransform(msg.into())
    }

    /// Create an InvalidResolution error.
    pub fn invalid_resolution(msg: impl Into<String>) -> Self {
        Self::InvalidResolution(msg.into())
    }

    /// Create an EmptyInput error.
    pub fn empty_input(msg: impl Into<String>) -> Self {
        Self::EmptyInput(msg.into())
    }

    /// Create an InvalidGeometry error for the record with the given id.
    pub fn invalid_geometry(id: u64, msg: impl Into<String>) -> Self {
        Self::InvalidGeometry {
            id,
            message: msg.into(),
        }
    }

    /// Whether the error was caused by caller input rather than the engine
    /// or the runtime.
    pub fn is_input_error(&self) -> bool {
        !matches!(
            self,
            ConversionError::Compaction(_)
                | ConversionError::Outline(_)
                | ConversionError::ThreadPool(_)
        )
    }
}

impl From<h3o::error::InvalidResolution> for ConversionError {
    fn from(err: h3o::error::InvalidResolution) -> Self {
        ConversionError::InvalidResolution(err.to_string())
    }
}

impl From<h3o::error::CompactionError> for ConversionError {
    fn from(err: h3o::error::CompactionError) -> Self {
        ConversionError::Compaction(err.to_string())
    }
}

impl From<h3o::error::OutlinerError> for ConversionError {
    fn from(err: h3o::error::OutlinerError) -> Self {
        ConversionError::Outline(err.to_string())
    }
}

impl From<rayon::ThreadPoolBuildError> for ConversionError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        ConversionError::ThreadPool(err.to_string())
    }
}
