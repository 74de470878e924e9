// src/engine/encoder.rs
//
// Encoder operations: JPEG (mozjpeg), PNG (image + oxipng), WebP, with an
// optimize-dropping retry and ICC profile embedding.

use crate::engine::common::run_with_panic_policy;
use crate::engine::handle::{ImageHandle, ImageInfo};
use crate::engine::MAX_DIMENSION;
use crate::error::ThumbkitError;
use crate::ops::OutputFormat;
use image::{DynamicImage, ImageFormat};
use img_parts::{jpeg::Jpeg, png::Png, ImageICC};
use mozjpeg::{ColorSpace, Compress, ScanMode};
use std::io::Cursor;
use std::sync::atomic::{AtomicU64, Ordering};

type EncoderResult<T> = std::result::Result<T, ThumbkitError>;

/// Lower bound on encode scratch-buffer capacity, in bytes.
///
/// Raised monotonically to the pixel area of the largest frame encoded so
/// far, process-wide; it never shrinks, so a burst of large frames keeps
/// later encodes from re-growing their buffers row by row.
static SCRATCH_FLOOR: AtomicU64 = AtomicU64::new(0);

const SCRATCH_MIN: u64 = 4096;
const SCRATCH_MAX: u64 = 64 << 20;

fn scratch_capacity(width: u32, height: u32) -> usize {
    let area = u64::from(width) * u64::from(height);
    SCRATCH_FLOOR.fetch_max(area, Ordering::Relaxed);
    let floor = SCRATCH_FLOOR.load(Ordering::Relaxed);
    floor.clamp(SCRATCH_MIN, SCRATCH_MAX) as usize
}

/// Current scratch floor, in bytes. Monotone within a process.
pub fn current_scratch_floor() -> u64 {
    SCRATCH_FLOOR.load(Ordering::Relaxed)
}

/// Fully-resolved encode settings for one output frame.
#[derive(Debug, Clone)]
pub struct EncodeParams {
    pub format: OutputFormat,
    pub quality: u8,
    pub optimize: bool,
    pub progressive: bool,
    pub icc_profile: Option<Vec<u8>>,
}

impl EncodeParams {
    /// Combine caller settings with what the decoder carried over.
    ///
    /// The ICC profile rides along from the source when present. Orientation
    /// metadata is deliberately absent: it was consumed when the pixels were
    /// rotated, and writing it again would double-rotate in viewers.
    pub fn assemble(
        format: OutputFormat,
        quality: u8,
        optimize: bool,
        progressive: bool,
        info: &ImageInfo,
    ) -> Self {
        Self {
            format,
            quality: quality.min(100),
            optimize,
            // Progressive rendering is a JPEG concept only
            progressive: progressive && format == OutputFormat::Jpeg,
            icc_profile: info.icc_profile.clone(),
        }
    }

    fn without_optimize(&self) -> Self {
        let mut params = self.clone();
        params.optimize = false;
        params
    }
}

/// Encode a frame, retrying once without optimization on encoder failure.
///
/// Some optimizer paths reject frames a plain encode handles fine; when the
/// optimized attempt fails with an encode error the frame is re-encoded with
/// `optimize` off before the error is surfaced. Decode-class and geometry
/// errors are not retried.
pub fn encode(handle: &ImageHandle, params: &EncodeParams) -> EncoderResult<Vec<u8>> {
    encode_with(handle, params, encode_once)
}

/// Retry-policy core with an injectable single-attempt encoder.
pub fn encode_with<F>(handle: &ImageHandle, params: &EncodeParams, attempt: F) -> EncoderResult<Vec<u8>>
where
    F: Fn(&ImageHandle, &EncodeParams) -> EncoderResult<Vec<u8>>,
{
    match attempt(handle, params) {
        Ok(bytes) => Ok(bytes),
        Err(err @ ThumbkitError::EncodeFailed { .. }) if params.optimize => {
            tracing::warn!(
                format = params.format.as_str(),
                error = %err,
                "optimized encode failed, retrying without optimization"
            );
            attempt(handle, &params.without_optimize())
        }
        Err(err) => Err(err),
    }
}

fn encode_once(handle: &ImageHandle, params: &EncodeParams) -> EncoderResult<Vec<u8>> {
    let icc = params.icc_profile.as_deref();
    match params.format {
        OutputFormat::Jpeg => encode_jpeg(handle.as_image(), params, icc),
        OutputFormat::Png => encode_png(handle.as_image(), params.optimize, icc),
        OutputFormat::WebP => encode_webp(handle.as_image(), params, icc),
    }
}

/// Encode to JPEG using mozjpeg. Alpha is discarded.
fn encode_jpeg(img: &DynamicImage, params: &EncodeParams, icc: Option<&[u8]>) -> EncoderResult<Vec<u8>> {
    run_with_panic_policy("encode:jpeg", || {
        use std::borrow::Cow;

        // Zero-copy when the buffer is already RGB8
        let rgb: Cow<'_, image::RgbImage> = match img {
            DynamicImage::ImageRgb8(rgb_img) => Cow::Borrowed(rgb_img),
            _ => Cow::Owned(img.to_rgb8()),
        };
        let (w, h) = rgb.dimensions();
        let pixels: &[u8] = rgb.as_raw();

        if w == 0 || h == 0 {
            return Err(ThumbkitError::encode_failed(
                "jpeg",
                "cannot encode empty frame",
            ));
        }
        if w > MAX_DIMENSION || h > MAX_DIMENSION {
            return Err(ThumbkitError::dimension_exceeds_limit(
                w.max(h),
                MAX_DIMENSION,
            ));
        }
        let expected_len = (w as usize) * (h as usize) * 3;
        if pixels.len() != expected_len {
            return Err(ThumbkitError::corrupted_image());
        }

        let mut comp = Compress::new(ColorSpace::JCS_RGB);
        comp.set_size(w as usize, h as usize);
        comp.set_color_space(ColorSpace::JCS_YCbCr);
        comp.set_quality(f32::from(params.quality));

        if params.progressive {
            comp.set_progressive_mode();
        }
        if params.optimize {
            comp.set_optimize_coding(true);
            comp.set_optimize_scans(true);
            comp.set_scan_optimization_mode(ScanMode::AllComponentsTogether);
        } else {
            comp.set_optimize_coding(false);
            comp.set_optimize_scans(false);
        }

        let mut output = Vec::with_capacity(scratch_capacity(w, h));

        let encoded = {
            let mut writer = comp.start_compress(&mut output).map_err(|e| {
                ThumbkitError::encode_failed(
                    "jpeg",
                    format!("mozjpeg: failed to start compress: {e:?}"),
                )
            })?;

            let stride = w as usize * 3;
            for row in pixels.chunks(stride) {
                writer.write_scanlines(row).map_err(|e| {
                    ThumbkitError::encode_failed(
                        "jpeg",
                        format!("mozjpeg: failed to write scanlines: {e:?}"),
                    )
                })?;
            }

            writer.finish().map_err(|e| {
                ThumbkitError::encode_failed("jpeg", format!("mozjpeg: failed to finish: {e:?}"))
            })?;

            output
        };

        if let Some(icc_data) = icc {
            embed_icc_jpeg(encoded, icc_data)
        } else {
            Ok(encoded)
        }
    })
}

/// Embed ICC profile into JPEG using img-parts
fn embed_icc_jpeg(jpeg_data: Vec<u8>, icc: &[u8]) -> EncoderResult<Vec<u8>> {
    run_with_panic_policy("encode:jpeg:embed_icc", || {
        use img_parts::jpeg::{markers::APP2, JpegSegment};
        use img_parts::Bytes;

        let mut jpeg = Jpeg::from_bytes(Bytes::from(jpeg_data)).map_err(|e| {
            ThumbkitError::encode_failed("jpeg", format!("failed to parse JPEG for ICC: {e}"))
        })?;

        let mut marker_data = Vec::with_capacity(14 + icc.len());
        marker_data.extend_from_slice(b"ICC_PROFILE\0");
        marker_data.push(1);
        marker_data.push(1);
        marker_data.extend_from_slice(icc);

        let segment = JpegSegment::new_with_contents(APP2, Bytes::from(marker_data));
        jpeg.segments_mut().insert(0, segment);

        let mut output = Vec::new();
        jpeg.encoder().write_to(&mut output).map_err(|e| {
            ThumbkitError::encode_failed("jpeg", format!("failed to write JPEG with ICC: {e}"))
        })?;

        Ok(output)
    })
}

/// Encode to PNG; when `optimize` is set the stream is recompressed
/// losslessly with oxipng.
fn encode_png(img: &DynamicImage, optimize: bool, icc: Option<&[u8]>) -> EncoderResult<Vec<u8>> {
    run_with_panic_policy("encode:png", || {
        let (w, h) = (img.width(), img.height());
        let mut buf = Vec::with_capacity(scratch_capacity(w, h));
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .map_err(|e| ThumbkitError::encode_failed("png", format!("PNG encode failed: {e}")))?;

        let encoded = if optimize {
            let mut options = oxipng::Options::from_preset(4);
            // Keep metadata chunks so an embedded ICC survives
            options.strip = oxipng::StripChunks::None;
            oxipng::optimize_from_memory(&buf, &options).map_err(|e| {
                ThumbkitError::encode_failed("png", format!("oxipng optimization failed: {e}"))
            })?
        } else {
            buf
        };

        if let Some(icc_data) = icc {
            embed_icc_png(encoded, icc_data)
        } else {
            Ok(encoded)
        }
    })
}

/// Embed ICC profile into PNG using img-parts
fn embed_icc_png(png_data: Vec<u8>, icc: &[u8]) -> EncoderResult<Vec<u8>> {
    run_with_panic_policy("encode:png:embed_icc", || {
        use img_parts::Bytes;

        let mut png = Png::from_bytes(Bytes::from(png_data)).map_err(|e| {
            ThumbkitError::encode_failed("png", format!("failed to parse PNG for ICC: {e}"))
        })?;

        png.set_icc_profile(Some(Bytes::from(icc.to_vec())));

        let mut output = Vec::new();
        png.encoder().write_to(&mut output).map_err(|e| {
            ThumbkitError::encode_failed("png", format!("failed to write PNG with ICC: {e}"))
        })?;

        Ok(output)
    })
}

/// Encode to WebP. Alpha is preserved when the frame carries it; optimize
/// selects the slower, smaller method 6 over the balanced method 4.
fn encode_webp(img: &DynamicImage, params: &EncodeParams, icc: Option<&[u8]>) -> EncoderResult<Vec<u8>> {
    run_with_panic_policy("encode:webp", || {
        use std::borrow::Cow;

        let has_alpha = img.color().has_alpha();
        let rgba: Cow<'_, image::RgbaImage>;
        let rgb: Cow<'_, image::RgbImage>;
        let encoder = if has_alpha {
            rgba = match img {
                DynamicImage::ImageRgba8(rgba_img) => Cow::Borrowed(rgba_img),
                _ => Cow::Owned(img.to_rgba8()),
            };
            let (w, h) = rgba.dimensions();
            webp::Encoder::from_rgba(&rgba, w, h)
        } else {
            rgb = match img {
                DynamicImage::ImageRgb8(rgb_img) => Cow::Borrowed(rgb_img),
                _ => Cow::Owned(img.to_rgb8()),
            };
            let (w, h) = rgb.dimensions();
            webp::Encoder::from_rgb(&rgb, w, h)
        };

        let mut config = webp::WebPConfig::new()
            .map_err(|_| ThumbkitError::encode_failed("webp", "failed to create WebPConfig"))?;
        config.quality = f32::from(params.quality);
        config.method = if params.optimize { 6 } else { 4 };
        config.pass = 1;
        config.autofilter = 1;

        let mem = encoder.encode_advanced(&config).map_err(|e| {
            ThumbkitError::encode_failed("webp", format!("WebP encode failed: {e:?}"))
        })?;

        let encoded = mem.to_vec();

        if let Some(icc_data) = icc {
            embed_icc_webp(encoded, icc_data)
        } else {
            Ok(encoded)
        }
    })
}

/// Embed ICC profile into WebP using img-parts
fn embed_icc_webp(webp_data: Vec<u8>, icc: &[u8]) -> EncoderResult<Vec<u8>> {
    run_with_panic_policy("encode:webp:embed_icc", || {
        use img_parts::webp::WebP;
        use img_parts::Bytes;

        let mut webp = WebP::from_bytes(Bytes::from(webp_data)).map_err(|e| {
            ThumbkitError::encode_failed("webp", format!("failed to parse WebP for ICC: {e}"))
        })?;

        webp.set_icc_profile(Some(Bytes::from(icc.to_vec())));

        let mut output = Vec::new();
        webp.encoder().write_to(&mut output).map_err(|e| {
            ThumbkitError::encode_failed("webp", format!("failed to write WebP with ICC: {e}"))
        })?;

        Ok(output)
    })
}
