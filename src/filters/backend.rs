//! Convolution backends.
//!
//! The gradient stage only needs one primitive from its tensor engine: a
//! stride-1, zero-padded ("same") depthwise 2D correlation over a
//! `(batch, height, width, channels)` tensor. [`ConvolutionBackend`] is the
//! seam where another device can be plugged in; [`CpuBackend`] is the
//! default and splits output rows across the rayon thread pool.

use std::fmt;

use ndarray::{Array4, ArrayView3, ArrayView4};
use rayon::prelude::*;

use crate::error::{Result, SobelError};

/// A tensor engine capable of depthwise "same" convolution.
pub trait ConvolutionBackend: Send + Sync + fmt::Debug {
    /// Short identifier used in log messages.
    fn name(&self) -> &str;

    /// Correlate every channel of `input` with the matching channel of `kernel`.
    ///
    /// `input` is `(N, H, W, C)`, `kernel` is `(K, K, C)` with odd `K`.
    /// Output has the same shape as `input`; samples outside the raster
    /// read as zero.
    fn depthwise_conv2d(&self, input: ArrayView4<f32>, kernel: ArrayView3<f32>) -> Result<Array4<f32>>;
}

/// Shape checks shared by all backends.
pub fn check_depthwise_shapes(input: &ArrayView4<f32>, kernel: &ArrayView3<f32>) -> Result<()> {
    let (_, _, _, channels) = input.dim();
    let (kh, kw, kc) = kernel.dim();
    if kh != kw || kh % 2 == 0 {
        return Err(SobelError::Computation(format!(
            "depthwise kernel must be square with odd size, got {kh}x{kw}"
        )));
    }
    if kc != channels {
        return Err(SobelError::Computation(format!(
            "kernel has {kc} channels but input has {channels}"
        )));
    }
    Ok(())
}

/// Multi-threaded CPU implementation.
#[derive(Clone, Copy, Debug, Default)]
pub struct CpuBackend;

impl ConvolutionBackend for CpuBackend {
    fn name(&self) -> &str {
        "cpu"
    }

    fn depthwise_conv2d(&self, input: ArrayView4<f32>, kernel: ArrayView3<f32>) -> Result<Array4<f32>> {
        check_depthwise_shapes(&input, &kernel)?;

        let (batch, height, width, channels) = input.dim();
        let ksize = kernel.dim().0;
        let half = (ksize / 2) as isize;

        // One work item per output row; collect preserves row order.
        let data: Vec<f32> = (0..batch * height)
            .into_par_iter()
            .flat_map_iter(|row| {
                let n = row / height;
                let y = (row % height) as isize;
                let mut out = Vec::with_capacity(width * channels);

                for x in 0..width as isize {
                    for c in 0..channels {
                        let mut sum = 0.0f32;
                        for ky in 0..ksize {
                            let sy = y + ky as isize - half;
                            if sy < 0 || sy >= height as isize {
                                continue;
                            }
                            for kx in 0..ksize {
                                let sx = x + kx as isize - half;
                                if sx < 0 || sx >= width as isize {
                                    continue;
                                }
                                sum += input[[n, sy as usize, sx as usize, c]] * kernel[[ky, kx, c]];
                            }
                        }
                        out.push(sum);
                    }
                }
                out
            })
            .collect();

        Array4::from_shape_vec((batch, height, width, channels), data)
            .map_err(|e| SobelError::Computation(format!("cpu backend output: {e}")))
    }
}
