// src/engine/mask.rs
//
// Rounded-corner alpha masks. A mask is a single-channel image, 255 =
// opaque, 0 = transparent; callers install it as the alpha channel of an
// RGBA image.

use crate::engine::handle::{ColorMode, ImageHandle};
use image::{imageops, DynamicImage, GrayImage, Luma};

const OPAQUE: u8 = 255;

/// Build one `radius` x `radius` corner tile.
///
/// The quarter-disc cut-out faces the top-right: a pixel is opaque iff its
/// center-of-curvature distance satisfies `x^2 + (radius - y)^2 <= radius^2`,
/// with the disc centered at the bottom-left of the tile. Rotating this tile
/// counter-clockwise by 0/90/180/270 degrees produces the top-right,
/// top-left, bottom-left, and bottom-right corners.
pub fn round_corner(radius: u32, fill: u8) -> GrayImage {
    // Distances are measured from pixel centers, doubled to stay in
    // integers. This keeps the four rotated tiles exact mirror images of
    // each other.
    let r2 = 2 * i64::from(radius);
    GrayImage::from_fn(radius, radius, |x, y| {
        let dx = 2 * i64::from(x) + 1;
        let dy = r2 - (2 * i64::from(y) + 1);
        if dx * dx + dy * dy <= r2 * r2 {
            Luma([fill])
        } else {
            Luma([0])
        }
    })
}

/// Full opaque rectangle with four rounded corners.
///
/// Radius zero (or a degenerate size) degrades to a plain opaque mask.
/// When `radius` exceeds half the smaller dimension the corner tiles
/// overlap; corners are pasted top-right, top-left, bottom-left,
/// bottom-right in that order, so overlapping regions take the
/// bottom-right tile's values.
pub fn round_rectangle(width: u32, height: u32, radius: u32, fill: u8) -> GrayImage {
    let mut mask = GrayImage::from_pixel(width, height, Luma([fill]));
    if radius == 0 || width == 0 || height == 0 {
        return mask;
    }
    let radius = radius.min(width).min(height);
    let corner = round_corner(radius, fill);

    // (counter-clockwise quarter turns, paste anchor)
    let placements: [(u32, (i64, i64)); 4] = [
        (0, (i64::from(width) - i64::from(radius), 0)),
        (1, (0, 0)),
        (2, (0, i64::from(height) - i64::from(radius))),
        (
            3,
            (
                i64::from(width) - i64::from(radius),
                i64::from(height) - i64::from(radius),
            ),
        ),
    ];
    for (quarter_turns, (x, y)) in placements {
        let tile = rotate_ccw(&corner, quarter_turns);
        imageops::replace(&mut mask, &tile, x, y);
    }
    mask
}

fn rotate_ccw(tile: &GrayImage, quarter_turns: u32) -> GrayImage {
    match quarter_turns % 4 {
        0 => tile.clone(),
        1 => imageops::rotate270(tile),
        2 => imageops::rotate180(tile),
        _ => imageops::rotate90(tile),
    }
}

/// Install a mask as the image's alpha channel.
///
/// The result is always RGBA; existing alpha is replaced, not combined.
/// The mask must match the image's dimensions.
pub fn apply_alpha(handle: ImageHandle, mask: &GrayImage) -> ImageHandle {
    let mut rgba = handle.as_image().to_rgba8();
    for (pixel, mask_pixel) in rgba.pixels_mut().zip(mask.pixels()) {
        pixel.0[3] = mask_pixel.0[0];
    }
    handle.with_image_and_mode(DynamicImage::ImageRgba8(rgba), ColorMode::Rgba)
}

/// Round the image's corners by building a full-size mask and installing
/// it as the alpha channel.
pub fn apply_rounded(handle: ImageHandle, radius: u32) -> ImageHandle {
    let (width, height) = handle.size();
    let mask = round_rectangle(width, height, radius, OPAQUE);
    apply_alpha(handle, &mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_zero_radius_is_fully_opaque() {
        let mask = round_rectangle(8, 6, 0, OPAQUE);
        assert!(mask.pixels().all(|p| p.0[0] == OPAQUE));
    }

    #[test]
    fn test_corner_tile_cut_faces_top_right() {
        let corner = round_corner(4, OPAQUE);
        // Bottom-left is on the disc, top-right is outside it
        assert_eq!(corner.get_pixel(0, 3).0, [OPAQUE]);
        assert_eq!(corner.get_pixel(3, 0).0, [0]);
    }

    #[test]
    fn test_extreme_corners_are_transparent() {
        let mask = round_rectangle(20, 20, 5, OPAQUE);
        assert_eq!(mask.get_pixel(0, 0).0, [0]);
        assert_eq!(mask.get_pixel(19, 0).0, [0]);
        assert_eq!(mask.get_pixel(0, 19).0, [0]);
        assert_eq!(mask.get_pixel(19, 19).0, [0]);
        // Center and edge midpoints stay opaque
        assert_eq!(mask.get_pixel(10, 10).0, [OPAQUE]);
        assert_eq!(mask.get_pixel(10, 0).0, [OPAQUE]);
        assert_eq!(mask.get_pixel(0, 10).0, [OPAQUE]);
    }

    #[test]
    fn test_large_radius_clamps_and_bottom_right_wins() {
        // Radius larger than both dimensions clamps to min(w, h); the
        // bottom-right tile is pasted last and owns the overlap.
        let mask = round_rectangle(6, 6, 100, OPAQUE);
        let expected_br = rotate_ccw(&round_corner(6, OPAQUE), 3);
        for y in 0..6 {
            for x in 0..6 {
                assert_eq!(mask.get_pixel(x, y), expected_br.get_pixel(x, y));
            }
        }
    }

    #[test]
    fn test_mask_is_vertically_symmetric_for_even_sizes() {
        let mask = round_rectangle(16, 16, 4, OPAQUE);
        for y in 0..16 {
            for x in 0..16 {
                assert_eq!(
                    mask.get_pixel(x, y).0,
                    mask.get_pixel(15 - x, y).0,
                    "asymmetry at ({x},{y})"
                );
            }
        }
    }

    #[test]
    fn test_apply_rounded_yields_rgba_with_mask_alpha() {
        let handle = ImageHandle::from_image(DynamicImage::ImageRgb8(RgbImage::from_pixel(
            10,
            10,
            Rgb([1, 2, 3]),
        )));
        let out = apply_rounded(handle, 3);
        assert_eq!(out.mode(), ColorMode::Rgba);
        let rgba = out.as_image().to_rgba8();
        assert_eq!(rgba.get_pixel(0, 0).0, [1, 2, 3, 0]);
        assert_eq!(rgba.get_pixel(5, 5).0, [1, 2, 3, 255]);
    }

    #[test]
    fn test_apply_rounded_replaces_existing_alpha() {
        let handle = ImageHandle::from_image(DynamicImage::ImageRgba8(
            image::RgbaImage::from_pixel(10, 10, image::Rgba([1, 2, 3, 7])),
        ));
        let out = apply_rounded(handle, 0);
        assert_eq!(out.as_image().to_rgba8().get_pixel(0, 0).0[3], 255);
    }
}
