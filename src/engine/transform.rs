// src/engine/transform.rs
//
// Geometric transform engine: scale, crop, pad, colorspace. Each operation
// is a pure function over an ImageHandle; callers supply final pixel
// geometry and get a new handle back.

use crate::engine::handle::{ColorMode, Geometry, ImageHandle};
use crate::error::ThumbkitError;
use crate::ops::Colorspace;
use fast_image_resize as fir;
use fir::{PixelType, ResizeAlg, ResizeOptions};
use image::{imageops, DynamicImage, Luma, LumaA, Rgb, Rgba, RgbaImage, RgbImage};

type TransformResult<T> = std::result::Result<T, ThumbkitError>;

/// Resample to exact target dimensions with Lanczos3.
///
/// No aspect-ratio enforcement: the caller has already computed
/// aspect-correct geometry. Zero target dimensions are a geometry error.
pub fn scale(handle: ImageHandle, width: u32, height: u32) -> TransformResult<ImageHandle> {
    if width == 0 || height == 0 {
        return Err(ThumbkitError::invalid_geometry(width, height));
    }
    if handle.size() == (width, height) {
        return Ok(handle);
    }
    let image = fast_resize(handle.as_image().clone(), width, height)?;
    Ok(handle.with_image(image))
}

/// Resize an owned image via fast_image_resize (Lanczos3 convolution).
///
/// RGB8/RGBA8 buffers transfer ownership straight into fir; everything
/// else is normalized to RGBA first. RGBA goes through alpha
/// premultiplication around the convolution so transparent pixels do not
/// bleed color.
fn fast_resize(img: DynamicImage, dst_width: u32, dst_height: u32) -> TransformResult<DynamicImage> {
    let src_width = img.width();
    let src_height = img.height();

    let (pixel_type, src_pixels): (PixelType, Vec<u8>) = match img {
        DynamicImage::ImageRgb8(rgb) => (PixelType::U8x3, rgb.into_raw()),
        DynamicImage::ImageRgba8(rgba) => (PixelType::U8x4, rgba.into_raw()),
        other => (PixelType::U8x4, other.to_rgba8().into_raw()),
    };

    let resize_err = |message: String| {
        ThumbkitError::internal_panic(format!(
            "resize {src_width}x{src_height} -> {dst_width}x{dst_height} failed: {message}"
        ))
    };

    let mut src_image =
        fir::images::Image::from_vec_u8(src_width, src_height, src_pixels, pixel_type)
            .map_err(|e| resize_err(format!("fir source image error: {e:?}")))?;
    let mut dst_image = fir::images::Image::new(dst_width, dst_height, pixel_type);

    let needs_premultiply = pixel_type == PixelType::U8x4;
    let mul_div = fir::MulDiv::default();
    if needs_premultiply {
        mul_div
            .multiply_alpha_inplace(&mut src_image)
            .map_err(|e| resize_err(format!("failed to premultiply alpha: {e}")))?;
    }

    let options = ResizeOptions::new().resize_alg(ResizeAlg::Convolution(fir::FilterType::Lanczos3));
    let mut resizer = fir::Resizer::new();
    resizer
        .resize(&src_image, &mut dst_image, &options)
        .map_err(|e| resize_err(format!("fir resize error: {e:?}")))?;

    if needs_premultiply {
        mul_div
            .divide_alpha_inplace(&mut dst_image)
            .map_err(|e| resize_err(format!("failed to unpremultiply alpha: {e}")))?;
    }

    let dst_pixels = dst_image.into_vec();
    match pixel_type {
        PixelType::U8x3 => RgbImage::from_raw(dst_width, dst_height, dst_pixels)
            .map(DynamicImage::ImageRgb8)
            .ok_or_else(|| resize_err("failed to rebuild rgb image".to_string())),
        _ => RgbaImage::from_raw(dst_width, dst_height, dst_pixels)
            .map(DynamicImage::ImageRgba8)
            .ok_or_else(|| resize_err("failed to rebuild rgba image".to_string())),
    }
}

/// Extract the rectangle `[x_offset, x_offset+width] x [y_offset, y_offset+height]`.
pub fn crop(
    handle: ImageHandle,
    width: u32,
    height: u32,
    x_offset: u32,
    y_offset: u32,
) -> TransformResult<ImageHandle> {
    if width == 0 || height == 0 {
        return Err(ThumbkitError::invalid_crop_dimensions(width, height));
    }
    let (img_w, img_h) = handle.size();
    if x_offset.checked_add(width).map_or(true, |end| end > img_w)
        || y_offset.checked_add(height).map_or(true, |end| end > img_h)
    {
        return Err(ThumbkitError::invalid_crop_bounds(
            x_offset, y_offset, width, height, img_w, img_h,
        ));
    }
    let image = handle.as_image().crop_imm(x_offset, y_offset, width, height);
    Ok(handle.with_image(image))
}

/// Center the image on a new canvas of `geometry`.
///
/// The canvas is created in the source's pixel representation and filled
/// with the padding color (zero fill when absent). Centering offsets are
/// integer-truncated; a source larger than the target yields negative
/// offsets and a clipped, partially off-canvas paste.
pub fn pad(
    handle: ImageHandle,
    geometry: Geometry,
    color: Option<[u8; 4]>,
) -> TransformResult<ImageHandle> {
    let (target_w, target_h) = geometry;
    if target_w == 0 || target_h == 0 {
        return Err(ThumbkitError::invalid_geometry(target_w, target_h));
    }

    let (src_w, src_h) = handle.size();
    let left = (target_w as i64 - src_w as i64) / 2;
    let top = (target_h as i64 - src_h as i64) / 2;

    let fill = color.unwrap_or([0, 0, 0, 0]);
    let image = match handle.as_image() {
        DynamicImage::ImageRgba8(src) => {
            let mut canvas = RgbaImage::from_pixel(target_w, target_h, Rgba(fill));
            imageops::replace(&mut canvas, src, left, top);
            DynamicImage::ImageRgba8(canvas)
        }
        DynamicImage::ImageLuma8(src) => {
            let mut canvas =
                image::GrayImage::from_pixel(target_w, target_h, Luma([fill[0]]));
            imageops::replace(&mut canvas, src, left, top);
            DynamicImage::ImageLuma8(canvas)
        }
        DynamicImage::ImageLumaA8(src) => {
            let mut canvas =
                image::GrayAlphaImage::from_pixel(target_w, target_h, LumaA([fill[0], fill[3]]));
            imageops::replace(&mut canvas, src, left, top);
            DynamicImage::ImageLumaA8(canvas)
        }
        other => {
            let src = other.to_rgb8();
            let mut canvas =
                RgbImage::from_pixel(target_w, target_h, Rgb([fill[0], fill[1], fill[2]]));
            imageops::replace(&mut canvas, &src, left, top);
            DynamicImage::ImageRgb8(canvas)
        }
    };
    Ok(handle.with_image(image))
}

/// Normalize the pixel representation.
///
/// RGB target: an RGBA source passes through unchanged (named "RGB", keeps
/// alpha); a palette source with a transparency entry is promoted to RGBA
/// so the transparency survives; everything else converts to true RGB.
/// GRAY target: single-channel luminance.
pub fn colorspace(handle: ImageHandle, target: Colorspace) -> ImageHandle {
    match target {
        Colorspace::Rgb => match handle.mode() {
            ColorMode::Rgba => handle,
            ColorMode::Palette { transparency: true } => {
                let image = DynamicImage::ImageRgba8(handle.as_image().to_rgba8());
                handle.with_image_and_mode(image, ColorMode::Rgba)
            }
            _ => {
                let image = DynamicImage::ImageRgb8(handle.as_image().to_rgb8());
                handle.with_image_and_mode(image, ColorMode::Rgb)
            }
        },
        Colorspace::Gray => {
            let image = DynamicImage::ImageLuma8(handle.as_image().to_luma8());
            handle.with_image_and_mode(image, ColorMode::Gray)
        }
    }
}
