// src/engine/api.rs
//
// One-call thumbnail driver: bytes in, encoded bytes plus output metadata
// out. Wires decode, orientation, geometry, mask, blur, and encode into
// the fixed pipeline order.

use crate::engine::handle::{ColorMode, ImageHandle};
use crate::engine::{decoder, encoder, orientation, pipeline};
use crate::error::ThumbkitError;
use crate::ops::{Colorspace, Operation, OutputFormat};
use image::ImageFormat;
use std::io::Read;

type ApiResult<T> = std::result::Result<T, ThumbkitError>;

/// Crop rectangle in output-space pixels.
#[derive(Debug, Clone, Copy)]
pub struct CropRegion {
    pub width: u32,
    pub height: u32,
    pub x_offset: u32,
    pub y_offset: u32,
}

/// Padding canvas: final geometry plus an optional RGBA fill.
#[derive(Debug, Clone, Copy)]
pub struct PadSpec {
    pub width: u32,
    pub height: u32,
    pub color: Option<[u8; 4]>,
}

/// Everything one thumbnail run needs. Every transform step is optional;
/// the pipeline order is fixed regardless of which steps are present.
#[derive(Debug, Clone)]
pub struct ThumbnailOptions {
    /// Target geometry, computed against the upright (orientation-resolved)
    /// image. When the EXIF orientation swaps dimensions, this geometry is
    /// swapped to follow.
    pub scale: Option<(u32, u32)>,
    pub crop: Option<CropRegion>,
    pub pad: Option<PadSpec>,
    pub colorspace: Option<Colorspace>,
    /// Corner radius for the rounded alpha mask
    pub rounded: Option<u32>,
    /// Gaussian blur radius
    pub blur: Option<f32>,
    /// Output format; defaults to the source format when encodable,
    /// otherwise JPEG
    pub format: Option<OutputFormat>,
    pub quality: u8,
    pub optimize: bool,
    pub progressive: bool,
}

impl Default for ThumbnailOptions {
    fn default() -> Self {
        Self {
            scale: None,
            crop: None,
            pad: None,
            colorspace: Some(Colorspace::Rgb),
            rounded: None,
            blur: None,
            format: None,
            quality: 95,
            optimize: true,
            progressive: false,
        }
    }
}

/// Result of a thumbnail run.
#[derive(Debug, Clone)]
pub struct ThumbnailOutput {
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
    pub size: (u32, u32),
    pub mode: ColorMode,
}

fn output_format(options: &ThumbnailOptions, handle: &ImageHandle) -> OutputFormat {
    if let Some(format) = options.format {
        return format;
    }
    match handle.info().source_format {
        Some(ImageFormat::Png) => OutputFormat::Png,
        Some(ImageFormat::WebP) => OutputFormat::WebP,
        Some(ImageFormat::Jpeg) => OutputFormat::Jpeg,
        // Anything we decode but do not write comes back as JPEG
        _ => OutputFormat::Jpeg,
    }
}

fn build_ops(options: &ThumbnailOptions, swapped: bool) -> Vec<Operation> {
    let mut ops = Vec::new();
    if let Some((w, h)) = options.scale {
        let (width, height) = if swapped { (h, w) } else { (w, h) };
        ops.push(Operation::Scale { width, height });
    }
    if let Some(region) = options.crop {
        ops.push(Operation::Crop {
            width: region.width,
            height: region.height,
            x_offset: region.x_offset,
            y_offset: region.y_offset,
        });
    }
    if let Some(pad) = options.pad {
        ops.push(Operation::Pad {
            width: pad.width,
            height: pad.height,
            color: pad.color,
        });
    }
    if let Some(target) = options.colorspace {
        ops.push(Operation::Colorspace { target });
    }
    if let Some(radius) = options.rounded {
        ops.push(Operation::Rounded { radius });
    }
    if let Some(radius) = options.blur {
        ops.push(Operation::Blur { radius });
    }
    ops
}

/// Run the whole pipeline over an encoded byte stream.
pub fn create_thumbnail<R: Read>(reader: R, options: &ThumbnailOptions) -> ApiResult<ThumbnailOutput> {
    let handle = decoder::get_image(reader)?;
    create_thumbnail_from_handle(handle, options)
}

/// Run the whole pipeline over an already-decoded handle.
pub fn create_thumbnail_from_handle(
    handle: ImageHandle,
    options: &ThumbnailOptions,
) -> ApiResult<ThumbnailOutput> {
    let (handle, swapped) = orientation::resolve(handle);
    let ops = build_ops(options, swapped);
    let handle = pipeline::apply_ops(handle, &ops)?;

    let format = output_format(options, &handle);
    let params = encoder::EncodeParams::assemble(
        format,
        options.quality,
        options.optimize,
        options.progressive,
        handle.info(),
    );
    let bytes = encoder::encode(&handle, &params)?;

    Ok(ThumbnailOutput {
        bytes,
        format,
        size: handle.size(),
        mode: handle.mode(),
    })
}
