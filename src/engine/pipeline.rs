// src/engine/pipeline.rs
//
// Sequential operation application over an ImageHandle.

use crate::engine::{blur, mask, transform};
use crate::engine::handle::ImageHandle;
use crate::error::ThumbkitError;
use crate::ops::Operation;

type PipelineResult<T> = std::result::Result<T, ThumbkitError>;

/// Apply operations in order, each consuming the previous result.
///
/// The first failure aborts the run; partial results are discarded.
pub fn apply_ops(mut handle: ImageHandle, ops: &[Operation]) -> PipelineResult<ImageHandle> {
    for op in ops {
        tracing::debug!(?op, size = ?handle.size(), "applying operation");
        handle = match *op {
            Operation::Scale { width, height } => transform::scale(handle, width, height)?,
            Operation::Crop {
                width,
                height,
                x_offset,
                y_offset,
            } => transform::crop(handle, width, height, x_offset, y_offset)?,
            Operation::Pad {
                width,
                height,
                color,
            } => transform::pad(handle, (width, height), color)?,
            Operation::Colorspace { target } => transform::colorspace(handle, target),
            Operation::Rounded { radius } => mask::apply_rounded(handle, radius),
            Operation::Blur { radius } => blur::blur(handle, radius),
        };
    }
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::handle::ColorMode;
    use crate::ops::Colorspace;
    use image::{DynamicImage, Rgb, RgbImage};

    fn handle(width: u32, height: u32) -> ImageHandle {
        ImageHandle::from_image(DynamicImage::ImageRgb8(RgbImage::from_pixel(
            width,
            height,
            Rgb([120, 130, 140]),
        )))
    }

    #[test]
    fn test_empty_ops_is_identity() {
        let out = apply_ops(handle(10, 10), &[]).unwrap();
        assert_eq!(out.size(), (10, 10));
    }

    #[test]
    fn test_ops_apply_in_order() {
        let ops = [
            Operation::Scale {
                width: 40,
                height: 30,
            },
            Operation::Crop {
                width: 20,
                height: 20,
                x_offset: 10,
                y_offset: 5,
            },
            Operation::Pad {
                width: 24,
                height: 24,
                color: Some([255, 255, 255, 255]),
            },
            Operation::Colorspace {
                target: Colorspace::Gray,
            },
        ];
        let out = apply_ops(handle(80, 60), &ops).unwrap();
        assert_eq!(out.size(), (24, 24));
        assert_eq!(out.mode(), ColorMode::Gray);
    }

    #[test]
    fn test_failure_aborts_run() {
        let ops = [
            Operation::Crop {
                width: 100,
                height: 100,
                x_offset: 0,
                y_offset: 0,
            },
            Operation::Scale {
                width: 10,
                height: 10,
            },
        ];
        assert!(matches!(
            apply_ops(handle(10, 10), &ops),
            Err(ThumbkitError::InvalidCropBounds { .. })
        ));
    }

    #[test]
    fn test_rounded_then_blur_keeps_rgba() {
        let ops = [
            Operation::Rounded { radius: 4 },
            Operation::Blur { radius: 1.5 },
        ];
        let out = apply_ops(handle(16, 16), &ops).unwrap();
        assert_eq!(out.mode(), ColorMode::Rgba);
        assert_eq!(out.size(), (16, 16));
    }
}
