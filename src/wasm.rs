//! WebAssembly exports for the Sobel filter.
//!
//! These functions are exposed to JavaScript via wasm-bindgen. Pixel data
//! is interleaved, row major, with an explicit channel count (1, 3, or 4;
//! canvas `ImageData` is 4).

use ndarray::Array3;
use wasm_bindgen::prelude::*;

use crate::error::SobelError;
use crate::filters::normalize::NormalizationRange;
use crate::filters::sobel::{SobelFilter, SobelOptions};
use crate::io::PixelBuffer;

fn to_js(err: SobelError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn build_filter(
    kernel_size: u32,
    output_format: &str,
    grayscale: bool,
    normalize_output_for_display: bool,
) -> Result<SobelFilter, JsValue> {
    let options = SobelOptions {
        kernel_size,
        output_format: output_format.to_string(),
        grayscale,
        normalization_range: NormalizationRange::new(0.0, 255.0),
        normalize_output_for_display,
    };
    SobelFilter::new(&options).map_err(to_js)
}

// ============================================================================
// Sobel Filter - u8 (8-bit)
// ============================================================================

/// Sobel edge detection on 8-bit pixels.
///
/// # Arguments
/// * `data` - Flat pixel bytes (length = width * height * channels)
/// * `width` - Image width in pixels
/// * `height` - Image height in pixels
/// * `channels` - 1, 3, or 4
/// * `kernel_size` - 3, 5, or 7
/// * `output_format` - "x", "y", "magnitude", "direction" or "normalized"
/// * `grayscale` - Reduce color to luma before convolving
/// * `normalize_output_for_display` - Stretch the result to 0-255
///
/// # Returns
/// Flat pixel bytes in the input layout, alpha preserved
#[wasm_bindgen]
#[allow(clippy::too_many_arguments)]
pub fn sobel_wasm(
    data: &[u8],
    width: usize,
    height: usize,
    channels: usize,
    kernel_size: u32,
    output_format: &str,
    grayscale: bool,
    normalize_output_for_display: bool,
) -> Result<Vec<u8>, JsValue> {
    let filter = build_filter(kernel_size, output_format, grayscale, normalize_output_for_display)?;
    let pixels = PixelBuffer::new(data.to_vec(), width, height, channels).map_err(to_js)?;
    let out = filter.apply_to_pixels(&pixels).map_err(to_js)?;
    Ok(out.into_data())
}

// ============================================================================
// Sobel Filter - f32 (float)
// ============================================================================

/// Sobel edge detection on float samples.
///
/// # Returns
/// Flat f32 result with 1 channel when `grayscale`, else the color channels
#[wasm_bindgen]
#[allow(clippy::too_many_arguments)]
pub fn sobel_f32_wasm(
    data: &[f32],
    width: usize,
    height: usize,
    channels: usize,
    kernel_size: u32,
    output_format: &str,
    grayscale: bool,
    normalize_output_for_display: bool,
) -> Result<Vec<f32>, JsValue> {
    let filter = build_filter(kernel_size, output_format, grayscale, normalize_output_for_display)?;
    let input = Array3::from_shape_vec((height, width, channels), data.to_vec())
        .map_err(|e| to_js(SobelError::Shape(e.to_string())))?;
    let result = filter.apply(input.view()).map_err(to_js)?;
    Ok(result.iter().copied().collect())
}
