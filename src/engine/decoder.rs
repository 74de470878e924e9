// src/engine/decoder.rs
//
// Decoder operations: format routing (JPEG via mozjpeg, PNG via zune-png,
// WebP via libwebp), metadata capture, and the validity probe.

use crate::engine::common::run_with_panic_policy;
use crate::engine::handle::{ColorMode, Geometry, ImageHandle, ImageInfo};
use crate::engine::{MAX_DIMENSION, MAX_PIXELS};
use crate::error::ThumbkitError;
use image::{
    DynamicImage, GrayAlphaImage, GrayImage, ImageFormat, RgbImage, RgbaImage,
};
use img_parts::{jpeg::Jpeg, png::Png, webp::WebP, ImageICC};
use mozjpeg::Decompress;
use std::io::{Cursor, Read};
use webp::{BitstreamFeatures, Decoder as WebPDecoder};
use zune_core::colorspace::ColorSpace;
use zune_core::options::DecoderOptions;
use zune_png::PngDecoder;

type DecoderResult<T> = std::result::Result<T, ThumbkitError>;

/// Decode JPEG using mozjpeg (backed by libjpeg-turbo)
pub fn decode_jpeg_mozjpeg(data: &[u8]) -> DecoderResult<DynamicImage> {
    run_with_panic_policy("decode:mozjpeg", || {
        if !data.windows(2).any(|pair| pair == [0xFF, 0xD9]) {
            return Err(ThumbkitError::decode_failed(
                "mozjpeg: missing JPEG EOI marker",
            ));
        }

        let decompress = Decompress::new_mem(data).map_err(|e| {
            ThumbkitError::decode_failed(format!("mozjpeg decompress init failed: {e:?}"))
        })?;

        let mut decompress = decompress.rgb().map_err(|e| {
            ThumbkitError::decode_failed(format!("mozjpeg rgb conversion failed: {e:?}"))
        })?;

        let width = decompress.width();
        let height = decompress.height();

        if width > MAX_DIMENSION as usize || height > MAX_DIMENSION as usize {
            return Err(ThumbkitError::dimension_exceeds_limit(
                width.max(height) as u32,
                MAX_DIMENSION,
            ));
        }
        let width_u32 = width as u32;
        let height_u32 = height as u32;
        check_dimensions(width_u32, height_u32)?;

        let pixels: Vec<[u8; 3]> = decompress.read_scanlines().map_err(|e| {
            ThumbkitError::decode_failed(format!("mozjpeg: failed to read scanlines: {e:?}"))
        })?;

        let flat_pixels: Vec<u8> = pixels.into_iter().flatten().collect();

        let rgb_image = RgbImage::from_raw(width_u32, height_u32, flat_pixels).ok_or_else(|| {
            ThumbkitError::decode_failed("mozjpeg: failed to create image from raw data")
        })?;

        Ok(DynamicImage::ImageRgb8(rgb_image))
    })
}

/// Decode non-JPEG formats using the image crate under the global panic policy.
pub fn decode_with_image_crate(data: &[u8]) -> DecoderResult<DynamicImage> {
    run_with_panic_policy("decode:image", || {
        image::load_from_memory(data)
            .map_err(|e| ThumbkitError::decode_failed(format!("decode failed: {e}")))
    })
}

/// Decode PNG using zune-png. 16bit input is downsampled to 8bit.
pub fn decode_png_zune(data: &[u8]) -> DecoderResult<DynamicImage> {
    run_with_panic_policy("decode:png", || {
        let options = DecoderOptions::default().png_set_strip_to_8bit(true);
        let mut decoder = PngDecoder::new_with_options(data, options);
        let pixels = decoder
            .decode()
            .map_err(|e| ThumbkitError::decode_failed(format!("png: decode failed: {e}")))?;

        let info = decoder
            .get_info()
            .ok_or_else(|| ThumbkitError::decode_failed("png: missing header info"))?;

        let width = info.width as u32;
        let height = info.height as u32;
        check_dimensions(width, height)?;

        let buf = match pixels {
            zune_core::result::DecodingResult::U8(v) => v,
            _ => {
                return Err(ThumbkitError::decode_failed(
                    "png: unexpected non-U8 pixel buffer",
                ))
            }
        };

        let colorspace = decoder
            .get_colorspace()
            .ok_or_else(|| ThumbkitError::decode_failed("png: missing colorspace"))?;

        let img = match colorspace {
            ColorSpace::RGB => RgbImage::from_raw(width, height, buf)
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(|| ThumbkitError::decode_failed("png: failed to build RGB image"))?,
            ColorSpace::RGBA | ColorSpace::YCbCr | ColorSpace::BGRA | ColorSpace::ARGB => {
                RgbaImage::from_raw(width, height, buf)
                    .map(DynamicImage::ImageRgba8)
                    .ok_or_else(|| {
                        ThumbkitError::decode_failed("png: failed to build RGBA image")
                    })?
            }
            ColorSpace::Luma => GrayImage::from_raw(width, height, buf)
                .map(DynamicImage::ImageLuma8)
                .ok_or_else(|| ThumbkitError::decode_failed("png: failed to build Luma image"))?,
            ColorSpace::LumaA => GrayAlphaImage::from_raw(width, height, buf)
                .map(DynamicImage::ImageLumaA8)
                .ok_or_else(|| ThumbkitError::decode_failed("png: failed to build LumaA image"))?,
            other => {
                return Err(ThumbkitError::decode_failed(format!(
                    "png: unsupported colorspace {:?}",
                    other
                )))
            }
        };

        Ok(img)
    })
}

/// Decode WebP using libwebp (via webp crate). Falls back to image crate for animated WebP.
pub fn decode_webp_libwebp(data: &[u8]) -> DecoderResult<DynamicImage> {
    run_with_panic_policy("decode:webp", || {
        // Parse header first to avoid allocating huge buffers on malformed files
        let features = BitstreamFeatures::new(data).ok_or_else(|| {
            ThumbkitError::decode_failed("webp: failed to read bitstream features")
        })?;

        if features.has_animation() {
            // libwebp simple decoder does not support animation
            return image::load_from_memory(data).map_err(|e| {
                ThumbkitError::decode_failed(format!("webp (animated) decode failed: {e}"))
            });
        }

        let width = features.width();
        let height = features.height();
        check_dimensions(width, height)?;

        let decoder = WebPDecoder::new(data);
        let decoded = decoder
            .decode()
            .ok_or_else(|| ThumbkitError::decode_failed("webp: decode failed"))?;

        check_dimensions(decoded.width(), decoded.height())?;

        Ok(decoded.to_image())
    })
}

/// Detect input format using magic bytes. Returns None if unknown.
pub fn detect_format(bytes: &[u8]) -> Option<ImageFormat> {
    image::guess_format(bytes).ok()
}

/// Unified decode entrypoint:
/// - Detect format once (magic bytes)
/// - Route JPEG to mozjpeg, PNG to zune-png, WebP to libwebp, others to image crate
pub fn decode_image(bytes: &[u8]) -> DecoderResult<(DynamicImage, Option<ImageFormat>)> {
    let detected = detect_format(bytes);
    tracing::debug!(format = ?detected, len = bytes.len(), "decoding source");
    let img = match detected {
        Some(ImageFormat::Jpeg) => decode_jpeg_mozjpeg(bytes)?,
        Some(ImageFormat::Png) => decode_png_zune(bytes)?,
        Some(ImageFormat::WebP) => decode_webp_libwebp(bytes)?,
        _ => decode_with_image_crate(bytes)?,
    };
    Ok((img, detected))
}

/// Check if image dimensions are within safe limits.
/// Returns an error if the image is too large (potential decompression bomb).
pub fn check_dimensions(width: u32, height: u32) -> DecoderResult<()> {
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(ThumbkitError::dimension_exceeds_limit(
            width.max(height),
            MAX_DIMENSION,
        ));
    }
    let pixels = width as u64 * height as u64;
    if pixels > MAX_PIXELS {
        return Err(ThumbkitError::pixel_count_exceeds_limit(pixels, MAX_PIXELS));
    }
    Ok(())
}

/// Extract EXIF Orientation tag (1-8). Returns None if missing or invalid.
///
/// Absent or malformed EXIF is never an error: the resolver treats None as
/// the identity transform.
pub fn detect_exif_orientation(bytes: &[u8]) -> Option<u16> {
    let mut cursor = Cursor::new(bytes);
    let exif_reader = exif::Reader::new();
    let exif = exif_reader.read_from_container(&mut cursor).ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    // exif crate can represent as Short/Long; use get_uint for safety
    let value = field.value.get_uint(0)?;
    let orientation = value as u16;
    if (1..=8).contains(&orientation) {
        Some(orientation)
    } else {
        None
    }
}

/// Extract ICC profile from image data.
/// Supports JPEG (APP2 marker), PNG (iCCP chunk), and WebP (ICCP chunk).
pub fn extract_icc_profile(data: &[u8]) -> Option<Vec<u8>> {
    if data.len() < 12 {
        return None;
    }

    if data[0] == 0xFF && data[1] == 0xD8 {
        let jpeg = Jpeg::from_bytes(data.to_vec().into()).ok()?;
        jpeg.icc_profile().map(|icc| icc.to_vec())
    } else if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        let png = Png::from_bytes(data.to_vec().into()).ok()?;
        png.icc_profile().map(|icc| icc.to_vec())
    } else if &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        let webp = WebP::from_bytes(data.to_vec().into()).ok()?;
        webp.icc_profile().map(|icc| icc.to_vec())
    } else {
        None
    }
}

/// Inspect PNG header bytes for palette color type (3) and a tRNS chunk.
///
/// zune-png expands palette pixels during decode; this keeps the original
/// mode observable so the colorspace step can apply the palette
/// transparency rule. Returns None for non-palette or non-PNG input.
pub fn png_palette_info(data: &[u8]) -> Option<PaletteInfo> {
    const PNG_SIG: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
    if data.len() < 33 || data[0..8] != PNG_SIG {
        return None;
    }
    // IHDR layout: 8 sig + 4 len + 4 "IHDR" + 4 width + 4 height + depth + color type
    if &data[12..16] != b"IHDR" {
        return None;
    }
    let color_type = data[25];
    if color_type != 3 {
        return None;
    }

    // Chunk walk up to the first IDAT looking for tRNS
    let mut pos = 8usize;
    let mut transparency = false;
    while pos + 8 <= data.len() {
        let len = u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]])
            as usize;
        let chunk_type = &data[pos + 4..pos + 8];
        match chunk_type {
            b"tRNS" => {
                transparency = true;
                break;
            }
            b"IDAT" | b"IEND" => break,
            _ => {}
        }
        pos = pos.checked_add(12 + len)?;
    }
    Some(PaletteInfo { transparency })
}

/// Palette-mode facts recovered from the PNG container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaletteInfo {
    pub transparency: bool,
}

/// Decode a source byte buffer into an ImageHandle, capturing orientation,
/// ICC profile, source format, and palette mode alongside the pixels.
pub fn get_image_from_bytes(bytes: &[u8]) -> DecoderResult<ImageHandle> {
    let (image, format) = decode_image(bytes)?;

    let mode = match png_palette_info(bytes) {
        Some(palette) => ColorMode::Palette {
            transparency: palette.transparency,
        },
        None => ColorMode::from_image(&image),
    };

    let info = ImageInfo {
        orientation: detect_exif_orientation(bytes),
        icc_profile: extract_icc_profile(bytes),
        source_format: format,
    };

    Ok(ImageHandle::new(image, mode, info))
}

/// Decode an image from a readable byte stream.
///
/// The stream is drained to EOF before decoding; the format is detected
/// from magic bytes, never from a file name.
pub fn get_image<R: Read>(mut source: R) -> DecoderResult<ImageHandle> {
    let mut bytes = Vec::new();
    source
        .read_to_end(&mut bytes)
        .map_err(|e| ThumbkitError::decode_failed(format!("failed to read source stream: {e}")))?;
    get_image_from_bytes(&bytes)
}

/// Pixel dimensions of a decoded image
pub fn get_image_size(handle: &ImageHandle) -> Geometry {
    handle.size()
}

/// Format-specific metadata captured at decode time
pub fn get_image_info(handle: &ImageHandle) -> &ImageInfo {
    handle.info()
}

/// Structural validity probe.
///
/// Attempts a full decode pass over the raw bytes and collapses every
/// failure of that pass (decode errors, limit violations, codec panics) to
/// `false`. The probe's only contract is "does a decode pass succeed"; it
/// deliberately does not distinguish corrupt input from internal codec
/// failure.
pub fn is_valid_image(raw_data: &[u8]) -> bool {
    run_with_panic_policy("probe", || decode_image(raw_data)).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::png::PngEncoder;
    use image::{ExtendedColorType, GenericImageView, ImageEncoder, Rgb};

    fn encode_png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |_, _| Rgb([0, 0, 0]));
        let mut buffer = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();
        buffer
    }

    fn encode_jpeg(width: u32, height: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([9, 8, 7])))
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)
            .unwrap();
        buf
    }

    fn encode_webp(width: u32, height: u32) -> Vec<u8> {
        let rgb: Vec<u8> = std::iter::repeat([10u8, 20u8, 30u8])
            .take((width * height) as usize)
            .flatten()
            .collect();
        let encoder = webp::Encoder::from_rgb(&rgb, width, height);
        encoder.encode_lossless().to_vec()
    }

    // Minimal 1x1 palette PNG built through the image crate's L8 path won't
    // produce color type 3, so write the palette container by hand.
    fn palette_png(with_trns: bool) -> Vec<u8> {
        fn chunk(out: &mut Vec<u8>, kind: &[u8; 4], data: &[u8]) {
            out.extend_from_slice(&(data.len() as u32).to_be_bytes());
            out.extend_from_slice(kind);
            out.extend_from_slice(data);
            let mut crc_input = Vec::with_capacity(4 + data.len());
            crc_input.extend_from_slice(kind);
            crc_input.extend_from_slice(data);
            out.extend_from_slice(&crc32(&crc_input).to_be_bytes());
        }
        fn crc32(data: &[u8]) -> u32 {
            let mut crc = 0xFFFF_FFFFu32;
            for &byte in data {
                crc ^= byte as u32;
                for _ in 0..8 {
                    let mask = (crc & 1).wrapping_neg();
                    crc = (crc >> 1) ^ (0xEDB8_8320 & mask);
                }
            }
            !crc
        }

        let mut out = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        // 1x1, bit depth 8, color type 3 (palette)
        let ihdr = [0, 0, 0, 1, 0, 0, 0, 1, 8, 3, 0, 0, 0];
        chunk(&mut out, b"IHDR", &ihdr);
        chunk(&mut out, b"PLTE", &[255, 0, 0]);
        if with_trns {
            chunk(&mut out, b"tRNS", &[128]);
        }
        // Single zlib-stored scanline: filter byte 0 + index 0
        let idat = [
            0x78, 0x01, 0x01, 0x02, 0x00, 0xFD, 0xFF, 0x00, 0x00, 0x00, 0x02, 0x00, 0x01,
        ];
        chunk(&mut out, b"IDAT", &idat);
        chunk(&mut out, b"IEND", &[]);
        out
    }

    #[test]
    fn test_detect_format_jpeg_and_png() {
        assert_eq!(detect_format(&encode_png(2, 2)), Some(ImageFormat::Png));
        assert_eq!(detect_format(&encode_jpeg(2, 2)), Some(ImageFormat::Jpeg));
    }

    #[test]
    fn test_decode_image_routes_png_to_zune() {
        let png = encode_png(3, 1);
        let (img, fmt) = decode_image(&png).unwrap();
        assert_eq!(fmt, Some(ImageFormat::Png));
        let rgb = img.to_rgb8();
        assert_eq!(rgb.get_pixel(0, 0).0, [0, 0, 0]);
    }

    #[test]
    fn test_decode_image_routes_jpeg_to_mozjpeg() {
        let (img, fmt) = decode_image(&encode_jpeg(2, 2)).unwrap();
        assert_eq!(fmt, Some(ImageFormat::Jpeg));
        assert_eq!(img.dimensions(), (2, 2));
    }

    #[test]
    fn test_decode_image_routes_webp_to_libwebp() {
        let webp = encode_webp(3, 2);
        let (img, fmt) = decode_image(&webp).unwrap();
        assert_eq!(fmt, Some(ImageFormat::WebP));
        assert_eq!(img.dimensions(), (3, 2));
        assert_eq!(img.to_rgb8().get_pixel(0, 0).0, [10, 20, 30]);
    }

    #[test]
    fn test_get_image_captures_size_and_format() {
        let handle = get_image_from_bytes(&encode_png(5, 7)).unwrap();
        assert_eq!(get_image_size(&handle), (5, 7));
        assert_eq!(
            get_image_info(&handle).source_format,
            Some(ImageFormat::Png)
        );
        assert_eq!(get_image_info(&handle).orientation, None);
    }

    #[test]
    fn test_get_image_reads_from_stream() {
        let bytes = encode_png(4, 4);
        let handle = get_image(Cursor::new(bytes)).unwrap();
        assert_eq!(handle.size(), (4, 4));
    }

    #[test]
    fn test_png_palette_info() {
        assert_eq!(
            png_palette_info(&palette_png(true)),
            Some(PaletteInfo { transparency: true })
        );
        assert_eq!(
            png_palette_info(&palette_png(false)),
            Some(PaletteInfo {
                transparency: false
            })
        );
        // RGB PNG has color type 2, not palette
        assert_eq!(png_palette_info(&encode_png(2, 2)), None);
        assert_eq!(png_palette_info(&encode_jpeg(2, 2)), None);
    }

    #[test]
    fn test_palette_png_decodes_with_palette_mode() {
        let handle = get_image_from_bytes(&palette_png(true)).unwrap();
        assert_eq!(handle.mode(), ColorMode::Palette { transparency: true });
        let handle = get_image_from_bytes(&palette_png(false)).unwrap();
        assert_eq!(
            handle.mode(),
            ColorMode::Palette {
                transparency: false
            }
        );
    }

    #[test]
    fn test_is_valid_image_accepts_minimal_images() {
        assert!(is_valid_image(&encode_png(1, 1)));
        assert!(is_valid_image(&encode_jpeg(1, 1)));
        assert!(is_valid_image(&encode_webp(1, 1)));
    }

    #[test]
    fn test_is_valid_image_rejects_garbage() {
        assert!(!is_valid_image(b""));
        assert!(!is_valid_image(b"not an image at all"));
        // Truncated PNG: valid magic, missing everything else
        assert!(!is_valid_image(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A]));
        // Truncated JPEG: SOI marker only
        assert!(!is_valid_image(&[0xFF, 0xD8]));
        let mut truncated = encode_png(16, 16);
        truncated.truncate(truncated.len() / 2);
        assert!(!is_valid_image(&truncated));
    }

    #[test]
    fn test_check_dimensions_rejects_bombs() {
        assert!(check_dimensions(64, 64).is_ok());
        assert!(matches!(
            check_dimensions(MAX_DIMENSION + 1, 1),
            Err(ThumbkitError::DimensionExceedsLimit { .. })
        ));
        assert!(matches!(
            check_dimensions(20_000, 20_000),
            Err(ThumbkitError::PixelCountExceedsLimit { .. })
        ));
    }

    #[test]
    fn test_decode_rejects_jpeg_without_eoi() {
        let mut jpeg = encode_jpeg(4, 4);
        // Strip the EOI marker; mozjpeg path must refuse the torso
        while jpeg.len() >= 2 && jpeg[jpeg.len() - 2..] == [0xFF, 0xD9] {
            jpeg.truncate(jpeg.len() - 2);
        }
        jpeg.truncate(jpeg.len().saturating_sub(1));
        assert!(decode_jpeg_mozjpeg(&jpeg).is_err());
    }

    #[test]
    fn test_gray_png_keeps_luma_mode() {
        let gray = GrayImage::from_pixel(3, 3, image::Luma([120]));
        let mut buf = Vec::new();
        PngEncoder::new(&mut buf)
            .write_image(gray.as_raw(), 3, 3, ExtendedColorType::L8)
            .unwrap();
        let handle = get_image_from_bytes(&buf).unwrap();
        assert_eq!(handle.mode(), ColorMode::Gray);
    }
}
