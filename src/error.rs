// src/error.rs
//
// Unified error handling for thumbkit
// Uses thiserror for simple, type-safe error handling
//
// Error Taxonomy:
// - Decode: source bytes could not be parsed as an image
// - Geometry: a transform step received or produced impossible pixel geometry
// - Encode: serialization failed after the fallback retry
// - ResourceLimit: decompression-bomb limits
// - Internal: codec panics and other library bugs

use std::borrow::Cow;
use thiserror::Error;

/// Error class used for retry/recovery decisions.
///
/// Metadata-read failures never appear here: they are recovered to the
/// identity orientation inside the resolver and are not representable as
/// errors at this boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Source bytes cannot be parsed as an image
    Decode,
    /// Impossible crop/scale/pad geometry supplied by the caller
    Geometry,
    /// Encoder failure that survived the single fallback retry
    Encode,
    /// Dimension/pixel-count limits
    ResourceLimit,
    /// Library bugs (should not happen)
    Internal,
}

/// thumbkit error types
///
/// All errors are type-safe and provide clear, actionable messages.
#[derive(Debug, Clone, Error)]
pub enum ThumbkitError {
    // Decode errors
    #[error("Unsupported image format: {format}")]
    UnsupportedFormat { format: Cow<'static, str> },

    #[error("Failed to decode image: {message}")]
    DecodeFailed { message: Cow<'static, str> },

    #[error("Corrupted image data")]
    CorruptedImage,

    // Size limit errors
    #[error("Image dimension {dimension} exceeds maximum {max}")]
    DimensionExceedsLimit { dimension: u32, max: u32 },

    #[error("Image pixel count {pixels} exceeds maximum {max}")]
    PixelCountExceedsLimit { pixels: u64, max: u64 },

    // Geometry errors
    #[error("Crop bounds ({x}+{width}, {y}+{height}) exceed image dimensions ({img_width}x{img_height})")]
    InvalidCropBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        img_width: u32,
        img_height: u32,
    },

    #[error("Invalid crop dimensions: width={width}, height={height}")]
    InvalidCropDimensions { width: u32, height: u32 },

    #[error("Invalid target geometry: width={width}, height={height}")]
    InvalidGeometry { width: u32, height: u32 },

    // Encode errors
    #[error("Failed to encode as {format}: {message}")]
    EncodeFailed {
        format: Cow<'static, str>,
        message: Cow<'static, str>,
    },

    // Internal errors
    #[error("Internal error: {message}")]
    InternalPanic { message: Cow<'static, str> },
}

// Constructor helpers
impl ThumbkitError {
    pub fn unsupported_format(format: impl Into<Cow<'static, str>>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
        }
    }

    pub fn decode_failed(message: impl Into<Cow<'static, str>>) -> Self {
        Self::DecodeFailed {
            message: message.into(),
        }
    }

    pub fn corrupted_image() -> Self {
        Self::CorruptedImage
    }

    pub fn dimension_exceeds_limit(dimension: u32, max: u32) -> Self {
        Self::DimensionExceedsLimit { dimension, max }
    }

    pub fn pixel_count_exceeds_limit(pixels: u64, max: u64) -> Self {
        Self::PixelCountExceedsLimit { pixels, max }
    }

    pub fn invalid_crop_bounds(
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        img_width: u32,
        img_height: u32,
    ) -> Self {
        Self::InvalidCropBounds {
            x,
            y,
            width,
            height,
            img_width,
            img_height,
        }
    }

    pub fn invalid_crop_dimensions(width: u32, height: u32) -> Self {
        Self::InvalidCropDimensions { width, height }
    }

    pub fn invalid_geometry(width: u32, height: u32) -> Self {
        Self::InvalidGeometry { width, height }
    }

    pub fn encode_failed(
        format: impl Into<Cow<'static, str>>,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::EncodeFailed {
            format: format.into(),
            message: message.into(),
        }
    }

    pub fn internal_panic(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InternalPanic {
            message: message.into(),
        }
    }

    /// Get the error class for this error
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::UnsupportedFormat { .. } | Self::DecodeFailed { .. } | Self::CorruptedImage => {
                ErrorClass::Decode
            }

            Self::InvalidCropBounds { .. }
            | Self::InvalidCropDimensions { .. }
            | Self::InvalidGeometry { .. } => ErrorClass::Geometry,

            Self::EncodeFailed { .. } => ErrorClass::Encode,

            Self::DimensionExceedsLimit { .. } | Self::PixelCountExceedsLimit { .. } => {
                ErrorClass::ResourceLimit
            }

            Self::InternalPanic { .. } => ErrorClass::Internal,
        }
    }
}

// Result type alias
pub type Result<T> = std::result::Result<T, ThumbkitError>;
