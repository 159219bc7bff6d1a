//! Fixed-point conversion between pixel intensities and engine tensors.

use crate::pixels::PixelImage;

/// Per-tensor affine quantization parameters: `real = (q - zero_point) * scale`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantizationParams {
    pub scale: f32,
    pub zero_point: i32,
}

impl QuantizationParams {
    pub fn new(scale: f32, zero_point: i32) -> Self {
        Self { scale, zero_point }
    }

    /// Scale is finite and strictly positive.
    pub fn is_valid(&self) -> bool {
        self.scale.is_finite() && self.scale > 0.0
    }
}

/// Map one pixel byte onto the engine's signed 8-bit input domain.
pub fn quantize_pixel(pixel: u8, params: QuantizationParams) -> i8 {
    let normalized = f32::from(pixel) / 255.0;
    let quantized = ((normalized / params.scale).round() as i32).saturating_add(params.zero_point);
    quantized.clamp(i32::from(i8::MIN), i32::from(i8::MAX)) as i8
}

/// Quantize a whole image into `out`, pixel by pixel.
///
/// `out` must have room for every pixel; extra slots are left untouched.
pub fn quantize_image(image: &PixelImage, params: QuantizationParams, out: &mut [i8]) {
    for (slot, &pixel) in out.iter_mut().zip(image.as_slice()) {
        *slot = quantize_pixel(pixel, params);
    }
}

/// Turn a raw output score back into a real value.
///
/// This is a dequantized score, not a probability.
pub fn dequantize(score: i8, params: QuantizationParams) -> f32 {
    (f32::from(score) - params.zero_point as f32) * params.scale
}
