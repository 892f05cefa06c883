//! Pixel range conversions for GAN training
//!
//! The generator ends in `tanh`, so training images live in [-1, 1].
//! Display code works in [0, 1].

use tch::{Kind, Tensor};

/// Raw 8-bit pixel maximum
pub const PIXEL_MAX_U8: f64 = 255.0;

/// Map pixels from [0, pixel_max] to [-1, 1]
///
/// Formula: x_norm = x / (pixel_max / 2) - 1
///
/// # Arguments
///
/// * `images` - Tensor of any shape with values in [0, pixel_max]
/// * `pixel_max` - 255 for raw bytes, 1 for images already scaled to [0, 1]
pub fn normalize_images(images: &Tensor, pixel_max: f64) -> Tensor {
    images.to_kind(Kind::Float) / (pixel_max / 2.0) - 1.0
}

/// Map generator output from [-1, 1] to [0, 1], clamping stragglers
pub fn to_display_range(images: &Tensor) -> Tensor {
    ((images.to_kind(Kind::Float) + 1.0) * 0.5).clamp(0.0, 1.0)
}

/// Convert a display value in [0, 1] to an 8-bit channel value
pub fn to_u8(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * PIXEL_MAX_U8 as f32).round() as u8
}
