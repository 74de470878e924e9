// lib.rs
//
// thumbkit: a thumbnail transformation engine
//
// Design goals:
// - Bytes in, encoded bytes out; no storage or caching concerns
// - EXIF orientation resolved before any geometry
// - Graceful encode degradation instead of hard failure
// - Codec panics contained, never crossing the public API

pub mod engine;
pub mod error;
pub mod ops;

pub use engine::{
    create_thumbnail, is_valid_image, ColorMode, ImageHandle, ThumbnailOptions, ThumbnailOutput,
};
pub use error::{ErrorClass, Result, ThumbkitError};
pub use ops::{Colorspace, Operation, OutputFormat};
