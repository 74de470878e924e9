// src/engine/handle.rs
//
// ImageHandle: a decoded raster plus the metadata captured at decode time.
// Handles are exclusively owned by the pipeline run that created them.

use image::{DynamicImage, ImageFormat};

/// Target pixel width/height pair
pub type Geometry = (u32, u32);

/// Color mode of a decoded image.
///
/// `Palette` survives decoding even though the pixel buffer is already
/// expanded to RGB/RGBA: the colorspace step needs to know whether the
/// source carried a palette transparency entry to decide between RGB and
/// RGBA output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    Rgb,
    Rgba,
    Gray,
    GrayAlpha,
    Palette { transparency: bool },
}

impl ColorMode {
    /// Derive the mode from the pixel buffer representation
    pub fn from_image(image: &DynamicImage) -> Self {
        match image {
            DynamicImage::ImageRgba8(_) | DynamicImage::ImageRgba16(_) => Self::Rgba,
            DynamicImage::ImageLuma8(_) | DynamicImage::ImageLuma16(_) => Self::Gray,
            DynamicImage::ImageLumaA8(_) | DynamicImage::ImageLumaA16(_) => Self::GrayAlpha,
            _ => Self::Rgb,
        }
    }

    pub fn has_alpha(&self) -> bool {
        matches!(
            self,
            Self::Rgba | Self::GrayAlpha | Self::Palette { transparency: true }
        )
    }
}

/// Format-specific metadata captured from the source container.
///
/// The orientation tag is consumed (set to None) once it has been baked
/// into pixel data; the ICC profile rides along to the encoder.
#[derive(Debug, Clone, Default)]
pub struct ImageInfo {
    /// EXIF orientation tag 1-8; None when absent or unreadable
    pub orientation: Option<u16>,
    /// Embedded ICC profile bytes, preserved through re-encode
    pub icc_profile: Option<Vec<u8>>,
    /// Container format detected from magic bytes
    pub source_format: Option<ImageFormat>,
}

/// Opaque in-memory decoded raster.
///
/// All transform steps are handle-in/handle-out; nothing mutates a handle
/// another caller can still see.
#[derive(Debug, Clone)]
pub struct ImageHandle {
    image: DynamicImage,
    mode: ColorMode,
    info: ImageInfo,
}

impl ImageHandle {
    pub fn new(image: DynamicImage, mode: ColorMode, info: ImageInfo) -> Self {
        Self { image, mode, info }
    }

    /// Wrap a raw image with mode derived from its pixel representation
    pub fn from_image(image: DynamicImage) -> Self {
        let mode = ColorMode::from_image(&image);
        Self {
            image,
            mode,
            info: ImageInfo::default(),
        }
    }

    pub fn size(&self) -> Geometry {
        (self.image.width(), self.image.height())
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn mode(&self) -> ColorMode {
        self.mode
    }

    pub fn info(&self) -> &ImageInfo {
        &self.info
    }

    pub fn info_mut(&mut self) -> &mut ImageInfo {
        &mut self.info
    }

    pub fn as_image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn into_image(self) -> DynamicImage {
        self.image
    }

    /// Replace the pixel buffer, keeping metadata.
    ///
    /// The palette mode is sticky: geometric transforms on an expanded
    /// palette image keep reporting `Palette` until an explicit colorspace
    /// conversion rewrites the mode. Everything else re-derives from the
    /// new buffer representation.
    pub(crate) fn with_image(self, image: DynamicImage) -> Self {
        let mode = match self.mode {
            ColorMode::Palette { transparency } => ColorMode::Palette { transparency },
            _ => ColorMode::from_image(&image),
        };
        Self {
            image,
            mode,
            info: self.info,
        }
    }

    /// Replace both pixels and mode (used by colorspace and mask steps)
    pub(crate) fn with_image_and_mode(self, image: DynamicImage, mode: ColorMode) -> Self {
        Self {
            image,
            mode,
            info: self.info,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, RgbImage, RgbaImage};

    #[test]
    fn test_mode_derivation() {
        let rgb = DynamicImage::ImageRgb8(RgbImage::new(2, 2));
        assert_eq!(ColorMode::from_image(&rgb), ColorMode::Rgb);
        let rgba = DynamicImage::ImageRgba8(RgbaImage::new(2, 2));
        assert_eq!(ColorMode::from_image(&rgba), ColorMode::Rgba);
        let gray = DynamicImage::ImageLuma8(GrayImage::new(2, 2));
        assert_eq!(ColorMode::from_image(&gray), ColorMode::Gray);
    }

    #[test]
    fn test_palette_mode_is_sticky_through_with_image() {
        let img = DynamicImage::ImageRgba8(RgbaImage::new(4, 4));
        let handle = ImageHandle::new(
            img,
            ColorMode::Palette { transparency: true },
            ImageInfo::default(),
        );
        let replaced = handle.with_image(DynamicImage::ImageRgba8(RgbaImage::new(2, 2)));
        assert_eq!(replaced.mode(), ColorMode::Palette { transparency: true });
        assert_eq!(replaced.size(), (2, 2));
    }

    #[test]
    fn test_has_alpha() {
        assert!(ColorMode::Rgba.has_alpha());
        assert!(ColorMode::Palette { transparency: true }.has_alpha());
        assert!(!ColorMode::Palette {
            transparency: false
        }
        .has_alpha());
        assert!(!ColorMode::Rgb.has_alpha());
        assert!(!ColorMode::Gray.has_alpha());
    }
}
