//! Gradient computation: produces the (Gx, Gy) pair for an adapted raster.

use ndarray::{Array3, Array4, ArrayView3, ArrayView4, Axis, Ix4};

use super::backend::ConvolutionBackend;
use super::kernels::{self, Kernel, KernelSize};
use super::scope::{CallScope, ScopedBuffer};
use crate::error::{Result, SobelError};

/// Horizontal and vertical gradients, each `(1, H, W, C)`.
#[derive(Debug)]
pub struct GradientPair {
    pub gx: ScopedBuffer<Ix4>,
    pub gy: ScopedBuffer<Ix4>,
}

/// Tile `kernel` across `channels` so each channel is convolved on its own.
///
/// Output shape is `(K, K, channels)`.
pub fn broadcast_kernel(kernel: Kernel, channels: usize) -> Array3<f32> {
    let n = kernel.size().get();
    Array3::from_shape_fn((n, n, channels), |(r, c, _)| kernel.at(r, c) as f32)
}

/// Convolve `input` (`(H, W, C)`) with both Sobel kernels of `size`.
///
/// The broadcast kernels are registered with `scope` and released when
/// this function returns. The returned pair stays registered until the
/// caller drops it.
pub fn compute_gradients(
    input: ArrayView3<f32>,
    size: KernelSize,
    backend: &dyn ConvolutionBackend,
    scope: &CallScope,
) -> Result<GradientPair> {
    let channels = input.dim().2;
    let batched = input.insert_axis(Axis(0));

    let kernel_x = scope.track(broadcast_kernel(kernels::kernel(kernels::Axis::Horizontal, size), channels));
    let gx = scope.track(checked(backend, batched.view(), kernel_x.view())?);

    let kernel_y = scope.track(broadcast_kernel(kernels::kernel(kernels::Axis::Vertical, size), channels));
    let gy = scope.track(checked(backend, batched, kernel_y.view())?);

    Ok(GradientPair { gx, gy })
}

/// Run the backend and make sure it kept the input shape.
fn checked(
    backend: &dyn ConvolutionBackend,
    input: ArrayView4<f32>,
    kernel: ArrayView3<f32>,
) -> Result<Array4<f32>> {
    let expected = input.dim();
    let out = backend.depthwise_conv2d(input, kernel)?;
    if out.dim() != expected {
        return Err(SobelError::Computation(format!(
            "{} backend returned {:?}, expected {:?}",
            backend.name(),
            out.dim(),
            expected
        )));
    }
    Ok(out)
}
