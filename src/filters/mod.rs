//! Sobel filter pipeline.
//!
//! ## Supported Formats
//!
//! | Format | Shape | Convolved channels |
//! |--------|-------|--------------------|
//! | Grayscale | (H, W, 1) | 1 |
//! | RGB | (H, W, 3) | 3, or 1 with `grayscale` |
//! | RGBA | (H, W, 4) | 3 (alpha dropped), or 1 with `grayscale` |
//!
//! Samples are f32 on any scale (0-255 for rasters built from pixel
//! buffers). Every color channel is convolved on its own.
//!
//! ## Stages
//!
//! - **kernels** - static Sobel tables for 3×3, 5×5, 7×7
//! - **channels** - channel adapter (alpha drop, BT.709 luma)
//! - **backend** - depthwise "same" convolution (rayon on CPU)
//! - **gradient** - builds broadcast kernels, produces (Gx, Gy)
//! - **output** - x / y / magnitude / direction / normalized
//! - **normalize** - min-max rescale with degenerate-range guard
//! - **scope** - per-call buffer accounting
//! - **sobel** - the configurable filter tying it together

pub mod backend;
pub mod channels;
pub mod gradient;
pub mod kernels;
pub mod normalize;
pub mod output;
pub mod scope;
pub mod sobel;
