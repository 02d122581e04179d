//! Channel adapter: conditions a raster for depthwise convolution.
//!
//! ## Supported Formats
//!
//! | Input | grayscale = false | grayscale = true |
//! |-------|-------------------|------------------|
//! | (H, W, 1) | pass through | pass through |
//! | (H, W, 3) | pass through | BT.709 luma, 1 channel |
//! | (H, W, 4) | drop alpha (view) | drop alpha, then luma |
//!
//! Alpha is never convolved. Dropping it is a strided view, so only the
//! luma reduction allocates a new buffer; that buffer belongs to the
//! call scope.

use ndarray::{s, Array3, ArrayView3, Ix3};

use super::scope::{CallScope, ScopedBuffer};
use crate::error::{Result, SobelError};

/// ITU-R BT.709 luminosity coefficients
pub const LUMA_R: f32 = 0.2126;
pub const LUMA_G: f32 = 0.7152;
pub const LUMA_B: f32 = 0.0722;

/// Channel layout of an input raster.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelLayout {
    Gray,
    Rgb,
    Rgba,
}

impl ChannelLayout {
    pub fn from_channels(channels: usize) -> Result<Self> {
        match channels {
            1 => Ok(ChannelLayout::Gray),
            3 => Ok(ChannelLayout::Rgb),
            4 => Ok(ChannelLayout::Rgba),
            other => Err(SobelError::Shape(format!(
                "expected 1, 3 or 4 channels, got {other}"
            ))),
        }
    }

    pub fn channels(self) -> usize {
        match self {
            ChannelLayout::Gray => 1,
            ChannelLayout::Rgb => 3,
            ChannelLayout::Rgba => 4,
        }
    }

    pub fn has_alpha(self) -> bool {
        self == ChannelLayout::Rgba
    }
}

/// What the adapter does for one (layout, grayscale) pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Adaptation {
    PassThrough,
    DropAlpha,
    Luma,
    DropAlphaLuma,
}

impl Adaptation {
    pub fn plan(layout: ChannelLayout, grayscale: bool) -> Self {
        match (layout, grayscale) {
            (ChannelLayout::Gray, _) => Adaptation::PassThrough,
            (ChannelLayout::Rgb, false) => Adaptation::PassThrough,
            (ChannelLayout::Rgb, true) => Adaptation::Luma,
            (ChannelLayout::Rgba, false) => Adaptation::DropAlpha,
            (ChannelLayout::Rgba, true) => Adaptation::DropAlphaLuma,
        }
    }

    /// Channel count after adaptation.
    pub fn output_channels(self, layout: ChannelLayout) -> usize {
        match self {
            Adaptation::PassThrough => layout.channels(),
            Adaptation::DropAlpha => 3,
            Adaptation::Luma | Adaptation::DropAlphaLuma => 1,
        }
    }
}

/// Validate that `input` is a usable raster and return its layout.
pub fn check_raster(input: &ArrayView3<f32>) -> Result<ChannelLayout> {
    let (height, width, channels) = input.dim();
    if height == 0 || width == 0 {
        return Err(SobelError::Shape(format!(
            "raster must be non-empty, got {height}x{width}"
        )));
    }
    ChannelLayout::from_channels(channels)
}

/// Output of [`adapt`]: either a view into the caller's raster or a new
/// buffer registered with the call scope.
#[derive(Debug)]
pub enum Adapted<'a> {
    Borrowed(ArrayView3<'a, f32>),
    Owned(ScopedBuffer<Ix3>),
}

impl Adapted<'_> {
    pub fn view(&self) -> ArrayView3<'_, f32> {
        match self {
            Adapted::Borrowed(view) => view.view(),
            Adapted::Owned(buffer) => buffer.view(),
        }
    }

    /// Whether adaptation allocated a new buffer.
    pub fn allocated(&self) -> bool {
        matches!(self, Adapted::Owned(_))
    }

    pub fn channels(&self) -> usize {
        self.view().dim().2
    }
}

/// Adapt `input` for convolution.
///
/// Any buffer created here is tracked by `scope` and released with it.
pub fn adapt<'a>(input: ArrayView3<'a, f32>, grayscale: bool, scope: &CallScope) -> Result<Adapted<'a>> {
    let layout = check_raster(&input)?;
    let adapted = match Adaptation::plan(layout, grayscale) {
        Adaptation::PassThrough => Adapted::Borrowed(input),
        Adaptation::DropAlpha => Adapted::Borrowed(input.slice_move(s![.., .., 0..3])),
        Adaptation::Luma | Adaptation::DropAlphaLuma => Adapted::Owned(scope.track(luma(input))),
    };
    Ok(adapted)
}

/// BT.709 luma of the first three channels, as a single-channel raster.
pub fn luma(input: ArrayView3<f32>) -> Array3<f32> {
    let (height, width, _) = input.dim();
    Array3::from_shape_fn((height, width, 1), |(y, x, _)| {
        LUMA_R * input[[y, x, 0]] + LUMA_G * input[[y, x, 1]] + LUMA_B * input[[y, x, 2]]
    })
}
