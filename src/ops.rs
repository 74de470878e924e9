// src/ops.rs
//
// Pipeline operations.
// These are cheap to create and store - the expensive work happens in apply_ops().

use crate::error::ThumbkitError;

/// Transform steps that can be queued against a decoded image.
///
/// Design principle: each operation is self-contained and stateless.
/// The caller supplies final pixel geometry; no aspect-ratio math happens here.
#[derive(Clone, Debug, PartialEq)]
pub enum Operation {
    /// Resample to exact target dimensions (Lanczos3, no aspect enforcement)
    Scale { width: u32, height: u32 },

    /// Extract the rectangle [x, x+width] x [y, y+height]
    Crop {
        width: u32,
        height: u32,
        x_offset: u32,
        y_offset: u32,
    },

    /// Center the image on a new canvas of the given geometry
    Pad {
        width: u32,
        height: u32,
        /// RGBA padding color; None uses the mode's zero fill
        color: Option<[u8; 4]>,
    },

    /// Normalize the pixel representation
    Colorspace { target: Colorspace },

    /// Cut rounded corners by installing an alpha mask
    Rounded { radius: u32 },

    /// Gaussian blur with the given radius
    Blur { radius: f32 },
}

/// Colorspace normalization targets.
///
/// Any option string outside this set means "leave the image alone", so
/// parsing returns None rather than an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Colorspace {
    /// True RGB, with two documented exceptions: RGBA passes through
    /// unchanged, and palette images with a transparency entry are promoted
    /// to RGBA instead.
    Rgb,
    /// Single-channel luminance
    Gray,
}

impl Colorspace {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "RGB" => Some(Self::Rgb),
            "GRAY" => Some(Self::Gray),
            _ => None,
        }
    }
}

/// Output format for encoding
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    Png,
    WebP,
}

impl OutputFormat {
    pub fn from_str(format: &str) -> Result<Self, ThumbkitError> {
        match format.to_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            "webp" => Ok(Self::WebP),
            other => Err(ThumbkitError::unsupported_format(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::WebP => "webp",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_from_str() {
        assert_eq!(OutputFormat::from_str("jpeg").unwrap(), OutputFormat::Jpeg);
        assert_eq!(OutputFormat::from_str("JPG").unwrap(), OutputFormat::Jpeg);
        assert_eq!(OutputFormat::from_str("png").unwrap(), OutputFormat::Png);
        assert_eq!(OutputFormat::from_str("webp").unwrap(), OutputFormat::WebP);
        assert!(OutputFormat::from_str("tiff").is_err());
    }

    #[test]
    fn test_colorspace_parse_is_lenient() {
        assert_eq!(Colorspace::parse("RGB"), Some(Colorspace::Rgb));
        assert_eq!(Colorspace::parse("GRAY"), Some(Colorspace::Gray));
        // Unknown targets mean passthrough, never an error
        assert_eq!(Colorspace::parse("CMYK"), None);
        assert_eq!(Colorspace::parse("rgb"), None);
    }
}
