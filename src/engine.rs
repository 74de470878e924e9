// src/engine.rs
//
// The core of thumbkit: decode, orient, transform, mask, blur, encode.
// This file is a facade over the decomposed modules in engine/.

// =============================================================================
// SECURITY LIMITS
// =============================================================================

/// Maximum allowed image dimension (width or height).
/// Images larger than 32768x32768 are rejected to prevent decompression bombs.
/// This is the same limit used by libvips/sharp.
pub const MAX_DIMENSION: u32 = 32768;

/// Maximum allowed total pixels (width * height).
/// 100 megapixels = 400MB uncompressed RGBA. Beyond this is likely malicious.
pub const MAX_PIXELS: u64 = 100_000_000;

// =============================================================================
// MODULE DECOMPOSITION
// =============================================================================

pub mod api;
pub mod blur;
mod common;
pub mod decoder;
pub mod encoder;
pub mod handle;
pub mod mask;
pub mod orientation;
pub mod pipeline;
pub mod transform;

// Re-export commonly used types and functions
pub use api::{
    create_thumbnail, create_thumbnail_from_handle, CropRegion, PadSpec, ThumbnailOptions,
    ThumbnailOutput,
};
pub use decoder::{
    check_dimensions, get_image, get_image_from_bytes, get_image_info, get_image_size,
    is_valid_image,
};
pub use encoder::{current_scratch_floor, encode, encode_with, EncodeParams};
pub use handle::{ColorMode, Geometry, ImageHandle, ImageInfo};
pub use orientation::{resolve, ORIENTATION_TABLE};
pub use pipeline::apply_ops;
