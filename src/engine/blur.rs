// src/engine/blur.rs
//
// Gaussian blur over the full frame.

use crate::engine::handle::ImageHandle;

/// Blur with the given standard-deviation-like radius.
///
/// Non-positive radii are passed through to the convolution unchanged;
/// they produce an identity (or near-identity) result rather than an
/// error. Pixel representation and dimensions are preserved.
pub fn blur(handle: ImageHandle, radius: f32) -> ImageHandle {
    let image = handle.as_image().blur(radius);
    handle.with_image(image)
}
