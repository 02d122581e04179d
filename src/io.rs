//! Pixel buffer adapters.
//!
//! Converts interleaved 8-bit pixel data (canvas/video-frame style, row
//! major, top to bottom) to and from `(height, width, channels)` f32
//! rasters. Rasters keep the 0-255 scale; nothing is divided by 255.

use ndarray::{s, Array3, ArrayView3};

use crate::error::{Result, SobelError};
use crate::filters::channels::ChannelLayout;
use crate::filters::normalize::{normalize_in_place, NormalizationRange};

/// Interleaved 8-bit pixels with an explicit layout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelBuffer {
    data: Vec<u8>,
    width: usize,
    height: usize,
    channels: usize,
}

impl PixelBuffer {
    /// Wrap `data`, checking it matches `width * height * channels`.
    pub fn new(data: Vec<u8>, width: usize, height: usize, channels: usize) -> Result<Self> {
        check_layout(data.len(), width, height, channels)?;
        Ok(Self {
            data,
            width,
            height,
            channels,
        })
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Convert to a raster (see [`pixels_to_raster`]).
    pub fn to_raster(&self) -> Result<Array3<f32>> {
        pixels_to_raster(&self.data, self.width, self.height, self.channels)
    }
}

fn check_layout(len: usize, width: usize, height: usize, channels: usize) -> Result<ChannelLayout> {
    let layout = ChannelLayout::from_channels(channels)?;
    if width == 0 || height == 0 {
        return Err(SobelError::Shape(format!(
            "pixel buffer must be non-empty, got {width}x{height}"
        )));
    }
    let expected = width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(channels))
        .ok_or_else(|| SobelError::Shape(format!("{width}x{height}x{channels} overflows")))?;
    if len != expected {
        return Err(SobelError::Shape(format!(
            "pixel buffer holds {len} bytes, expected {expected} for {width}x{height}x{channels}"
        )));
    }
    Ok(layout)
}

/// Convert interleaved bytes to a `(height, width, channels)` raster.
pub fn pixels_to_raster(data: &[u8], width: usize, height: usize, channels: usize) -> Result<Array3<f32>> {
    check_layout(data.len(), width, height, channels)?;
    let values = data.iter().map(|&v| v as f32).collect();
    Array3::from_shape_vec((height, width, channels), values)
        .map_err(|e| SobelError::Shape(e.to_string()))
}

/// Convert a raster back to bytes.
///
/// With `normalize` the color channels are first min-max scaled into
/// 0-255; alpha is never rescaled. Samples are then rounded and clamped.
pub fn raster_to_pixels(raster: ArrayView3<f32>, normalize_values: bool) -> Result<PixelBuffer> {
    let (height, width, channels) = raster.dim();
    let layout = check_layout(raster.len(), width, height, channels)?;

    let data = if normalize_values {
        let mut scaled = raster.to_owned();
        let color = if layout.has_alpha() { 3 } else { channels };
        normalize_in_place(&mut scaled.slice_mut(s![.., .., 0..color]), NormalizationRange::new(0.0, 255.0));
        scaled.iter().map(|&v| to_byte(v)).collect()
    } else {
        raster.iter().map(|&v| to_byte(v)).collect()
    };
    PixelBuffer::new(data, width, height, channels)
}

#[inline]
fn to_byte(v: f32) -> u8 {
    // NaN casts to 0
    v.round().clamp(0.0, 255.0) as u8
}

/// Write a filter result back into the layout of `source`.
///
/// A single-channel result is replicated into every color channel. When
/// `source` has alpha, its alpha is preserved.
pub fn compose_onto(result: ArrayView3<f32>, source: &PixelBuffer) -> Result<PixelBuffer> {
    let (height, width, result_channels) = result.dim();
    if height != source.height || width != source.width {
        return Err(SobelError::Shape(format!(
            "result is {width}x{height} but source is {}x{}",
            source.width, source.height
        )));
    }
    let layout = ChannelLayout::from_channels(source.channels)?;
    let color_channels = if layout.has_alpha() { 3 } else { layout.channels() };
    if result_channels != 1 && result_channels != color_channels {
        return Err(SobelError::Shape(format!(
            "cannot write a {result_channels}-channel result into {} channels",
            source.channels
        )));
    }

    let mut data = Vec::with_capacity(source.data.len());
    for y in 0..height {
        for x in 0..width {
            for c in 0..color_channels {
                let rc = if result_channels == 1 { 0 } else { c };
                data.push(to_byte(result[[y, x, rc]]));
            }
            if layout.has_alpha() {
                data.push(source.data[(y * width + x) * 4 + 3]);
            }
        }
    }
    PixelBuffer::new(data, width, height, source.channels)
}
