// src/engine/orientation.rs
//
// EXIF orientation resolver: bakes the orientation tag into pixel data and
// reports whether the transform swapped width and height.

use crate::engine::handle::ImageHandle;
use image::DynamicImage;

/// One row of the orientation dispatch table
pub struct OrientationEntry {
    pub tag: u16,
    /// True exactly for the transposing tags 5-8
    pub swaps_dimensions: bool,
    apply: fn(DynamicImage) -> DynamicImage,
}

/// Fixed tag -> transform dispatch table for EXIF orientations 1-8.
///
/// Indexed as `ORIENTATION_TABLE[tag - 1]`; a table rather than a
/// conditional chain so the 8-way exhaustiveness is directly testable.
pub const ORIENTATION_TABLE: [OrientationEntry; 8] = [
    OrientationEntry {
        tag: 1,
        swaps_dimensions: false,
        apply: |img| img,
    },
    OrientationEntry {
        tag: 2,
        swaps_dimensions: false,
        apply: |img| img.fliph(),
    },
    OrientationEntry {
        tag: 3,
        swaps_dimensions: false,
        apply: |img| img.rotate180(),
    },
    OrientationEntry {
        tag: 4,
        swaps_dimensions: false,
        apply: |img| img.flipv(),
    },
    OrientationEntry {
        tag: 5,
        swaps_dimensions: true,
        apply: |img| img.rotate90().fliph(), // transpose
    },
    OrientationEntry {
        tag: 6,
        swaps_dimensions: true,
        apply: |img| img.rotate90(),
    },
    OrientationEntry {
        tag: 7,
        swaps_dimensions: true,
        apply: |img| img.rotate270().fliph(), // transverse
    },
    OrientationEntry {
        tag: 8,
        swaps_dimensions: true,
        apply: |img| img.rotate270(),
    },
];

fn lookup(tag: u16) -> Option<&'static OrientationEntry> {
    if (1..=8).contains(&tag) {
        Some(&ORIENTATION_TABLE[(tag - 1) as usize])
    } else {
        None
    }
}

/// Whether the given tag's transform swaps width and height.
///
/// Callers use this to swap requested target dimensions before computing
/// scale/crop geometry. Missing or out-of-range tags report false.
pub fn swaps_dimensions(tag: Option<u16>) -> bool {
    tag.and_then(lookup).map_or(false, |e| e.swaps_dimensions)
}

/// Apply the orientation transform recorded in the handle's metadata.
///
/// Unknown, missing, or unreadable orientation means identity; this never
/// fails. The tag is consumed so the rotation cannot be applied twice and
/// never reaches the encoder.
pub fn resolve(handle: ImageHandle) -> (ImageHandle, bool) {
    let tag = handle.info().orientation;
    let Some(entry) = tag.and_then(lookup) else {
        return (handle, false);
    };

    let swaps = entry.swaps_dimensions;
    if entry.tag != 1 {
        tracing::debug!(tag = entry.tag, swaps, "applying EXIF orientation");
    }

    let mode = handle.mode();
    let info = handle.info().clone();
    let image = (entry.apply)(handle.into_image());

    let mut resolved = ImageHandle::new(image, mode, info);
    resolved.info_mut().orientation = None;
    (resolved, swaps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::handle::{ColorMode, ImageInfo};
    use image::{Rgb, RgbImage};

    // 2x1 image: red pixel left, blue pixel right
    fn two_pixel_handle(tag: Option<u16>) -> ImageHandle {
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(0, 0, Rgb([255, 0, 0]));
        img.put_pixel(1, 0, Rgb([0, 0, 255]));
        let info = ImageInfo {
            orientation: tag,
            ..ImageInfo::default()
        };
        ImageHandle::new(DynamicImage::ImageRgb8(img), ColorMode::Rgb, info)
    }

    #[test]
    fn test_table_covers_all_eight_tags() {
        for (idx, entry) in ORIENTATION_TABLE.iter().enumerate() {
            assert_eq!(entry.tag as usize, idx + 1);
        }
    }

    #[test]
    fn test_swaps_dimensions_for_transposing_tags() {
        for tag in 1..=4u16 {
            assert!(!swaps_dimensions(Some(tag)), "tag {tag}");
        }
        for tag in 5..=8u16 {
            assert!(swaps_dimensions(Some(tag)), "tag {tag}");
        }
        assert!(!swaps_dimensions(None));
        assert!(!swaps_dimensions(Some(0)));
        assert!(!swaps_dimensions(Some(9)));
    }

    #[test]
    fn test_resolve_identity_for_missing_tag() {
        let (resolved, swaps) = resolve(two_pixel_handle(None));
        assert!(!swaps);
        assert_eq!(resolved.size(), (2, 1));
        assert_eq!(resolved.as_image().to_rgb8().get_pixel(0, 0).0, [255, 0, 0]);
    }

    #[test]
    fn test_resolve_tag_2_mirrors_horizontally() {
        let (resolved, swaps) = resolve(two_pixel_handle(Some(2)));
        assert!(!swaps);
        let rgb = resolved.as_image().to_rgb8();
        assert_eq!(rgb.get_pixel(0, 0).0, [0, 0, 255]);
        assert_eq!(rgb.get_pixel(1, 0).0, [255, 0, 0]);
    }

    #[test]
    fn test_resolve_tag_3_rotates_180() {
        let (resolved, _) = resolve(two_pixel_handle(Some(3)));
        let rgb = resolved.as_image().to_rgb8();
        assert_eq!(rgb.get_pixel(0, 0).0, [0, 0, 255]);
    }

    #[test]
    fn test_resolve_tag_6_swaps_dimensions() {
        // Source 600x800 portrait from a rotated sensor: tag 6 uprights it to 800x600
        let img = DynamicImage::ImageRgb8(RgbImage::new(600, 800));
        let info = ImageInfo {
            orientation: Some(6),
            ..ImageInfo::default()
        };
        let handle = ImageHandle::new(img, ColorMode::Rgb, info);
        let (resolved, swaps) = resolve(handle);
        assert!(swaps);
        assert_eq!(resolved.size(), (800, 600));
    }

    #[test]
    fn test_resolve_all_tags_produce_expected_size() {
        for tag in 1..=8u16 {
            let img = DynamicImage::ImageRgb8(RgbImage::new(4, 2));
            let info = ImageInfo {
                orientation: Some(tag),
                ..ImageInfo::default()
            };
            let handle = ImageHandle::new(img, ColorMode::Rgb, info);
            let (resolved, swaps) = resolve(handle);
            let expected = if swaps { (2, 4) } else { (4, 2) };
            assert_eq!(resolved.size(), expected, "tag {tag}");
            assert_eq!(swaps, (5..=8).contains(&tag), "tag {tag}");
        }
    }

    #[test]
    fn test_resolve_consumes_the_tag() {
        let (resolved, _) = resolve(two_pixel_handle(Some(6)));
        assert_eq!(resolved.info().orientation, None);
    }
}
