//! Sobel edge detection for rasters and video frames.
//!
//! Computes directional gradients with 3×3, 5×5 or 7×7 Sobel kernels and
//! returns one of several derived images, with Python bindings via PyO3
//! and WASM bindings for JavaScript.
//!
//! ## Image Format
//! Rasters are `(height, width, channels)` f32 arrays:
//! - **Grayscale**: (height, width, 1) - single channel
//! - **RGB**: (height, width, 3) - 3 color channels
//! - **RGBA**: (height, width, 4) - 3 color channels + alpha
//!
//! Alpha is never convolved. Pixel buffers (`u8`, interleaved) convert to
//! rasters on the 0-255 scale.
//!
//! ## Output Formats
//! - `x` / `y`: absolute horizontal / vertical gradient
//! - `magnitude`: `sqrt(Gx² + Gy²)`
//! - `direction`: `atan2(Gy, Gx)` in (−π, π]
//! - `normalized`: magnitude rescaled into the normalization range
//!
//! ```
//! use ndarray::Array3;
//! use sobel_rust::{SobelFilter, SobelOptions};
//!
//! let mut image = Array3::<f32>::zeros((8, 8, 3));
//! image[[4, 4, 0]] = 255.0;
//!
//! let filter = SobelFilter::new(&SobelOptions {
//!     kernel_size: 5,
//!     output_format: "normalized".into(),
//!     ..SobelOptions::default()
//! })?;
//! let edges = filter.apply(image.view())?;
//! assert_eq!(edges.dim(), (8, 8, 3));
//! # Ok::<(), sobel_rust::SobelError>(())
//! ```

pub mod error;
pub mod filters;
pub mod io;

#[cfg(feature = "wasm")]
pub mod wasm;

use ndarray::{Array3, ArrayView3};

pub use crate::error::{Result, SobelError};
pub use crate::filters::backend::{ConvolutionBackend, CpuBackend};
pub use crate::filters::kernels::{kernel, Axis, Kernel, KernelSize};
pub use crate::filters::normalize::{normalize, NormalizationRange};
pub use crate::filters::output::OutputFormat;
pub use crate::filters::scope::BufferStats;
pub use crate::filters::sobel::{SobelConfig, SobelFilter, SobelOptions, SobelOptionsUpdate};
pub use crate::io::{pixels_to_raster, raster_to_pixels, PixelBuffer};

// ============================================================================
// One-shot Helpers
// ============================================================================

/// Magnitude edges with a 3×3 kernel on every color channel.
pub fn detect_edges(input: ArrayView3<f32>) -> Result<Array3<f32>> {
    SobelFilter::default().apply(input)
}

/// Build a filter from `options` and apply it once.
pub fn detect_edges_with(input: ArrayView3<f32>, options: &SobelOptions) -> Result<Array3<f32>> {
    SobelFilter::new(options)?.apply(input)
}

/// Grayscale magnitude edges, display-normalized to 0-255, in the
/// layout of `pixels`.
pub fn detect_edges_in_pixels(pixels: &PixelBuffer) -> Result<PixelBuffer> {
    let config = SobelConfig {
        grayscale: true,
        normalize_output_for_display: true,
        ..SobelConfig::default()
    };
    SobelFilter::from_config(config).apply_to_pixels(pixels)
}

// Python bindings (only when python feature is enabled)
#[cfg(feature = "python")]
mod python {
    use ndarray::Array3;
    use numpy::{IntoPyArray, PyArray3, PyReadonlyArray3};
    use pyo3::exceptions::PyValueError;
    use pyo3::prelude::*;

    use crate::{NormalizationRange, PixelBuffer, SobelError, SobelFilter, SobelOptions};

    impl From<SobelError> for PyErr {
        fn from(err: SobelError) -> PyErr {
            PyValueError::new_err(err.to_string())
        }
    }

    fn build_filter(
        kernel_size: u32,
        output_format: &str,
        grayscale: bool,
        normalize_min: f32,
        normalize_max: f32,
        normalize_output_for_display: bool,
    ) -> PyResult<SobelFilter> {
        let options = SobelOptions {
            kernel_size,
            output_format: output_format.to_string(),
            grayscale,
            normalization_range: NormalizationRange::new(normalize_min, normalize_max),
            normalize_output_for_display,
        };
        Ok(SobelFilter::new(&options)?)
    }

    // ========================================================================
    // Sobel Filter
    // ========================================================================

    /// Sobel edge detection on a u8 image (1, 3, or 4 channels).
    ///
    /// Output has the input's layout; single-channel results are
    /// replicated into RGB and alpha is preserved.
    #[pyfunction]
    #[pyo3(signature = (image, kernel_size=3, output_format="magnitude", grayscale=false, normalize_min=0.0, normalize_max=255.0, normalize_output_for_display=false))]
    #[allow(clippy::too_many_arguments)]
    pub fn sobel<'py>(
        py: Python<'py>,
        image: PyReadonlyArray3<'py, u8>,
        kernel_size: u32,
        output_format: &str,
        grayscale: bool,
        normalize_min: f32,
        normalize_max: f32,
        normalize_output_for_display: bool,
    ) -> PyResult<Bound<'py, PyArray3<u8>>> {
        let filter = build_filter(
            kernel_size,
            output_format,
            grayscale,
            normalize_min,
            normalize_max,
            normalize_output_for_display,
        )?;
        let input = image.as_array();
        let (height, width, channels) = input.dim();
        let pixels = PixelBuffer::new(input.iter().copied().collect(), width, height, channels)?;

        let out = filter.apply_to_pixels(&pixels)?;
        let result = Array3::from_shape_vec((height, width, channels), out.into_data())
            .map_err(|e| PyValueError::new_err(e.to_string()))?;
        Ok(result.into_pyarray(py))
    }

    /// Sobel edge detection on an f32 image (1, 3, or 4 channels).
    ///
    /// Returns 1 channel with `grayscale`, otherwise the color channels.
    #[pyfunction]
    #[pyo3(signature = (image, kernel_size=3, output_format="magnitude", grayscale=false, normalize_min=0.0, normalize_max=255.0, normalize_output_for_display=false))]
    #[allow(clippy::too_many_arguments)]
    pub fn sobel_f32<'py>(
        py: Python<'py>,
        image: PyReadonlyArray3<'py, f32>,
        kernel_size: u32,
        output_format: &str,
        grayscale: bool,
        normalize_min: f32,
        normalize_max: f32,
        normalize_output_for_display: bool,
    ) -> PyResult<Bound<'py, PyArray3<f32>>> {
        let filter = build_filter(
            kernel_size,
            output_format,
            grayscale,
            normalize_min,
            normalize_max,
            normalize_output_for_display,
        )?;
        let result = filter.apply(image.as_array())?;
        Ok(result.into_pyarray(py))
    }

    /// Gradient magnitude and direction in one pass.
    #[pyfunction]
    #[pyo3(signature = (image, kernel_size=3, grayscale=false))]
    pub fn sobel_gradient_components<'py>(
        py: Python<'py>,
        image: PyReadonlyArray3<'py, f32>,
        kernel_size: u32,
        grayscale: bool,
    ) -> PyResult<(Bound<'py, PyArray3<f32>>, Bound<'py, PyArray3<f32>>)> {
        let filter = build_filter(kernel_size, "magnitude", grayscale, 0.0, 255.0, false)?;
        let (magnitude, direction) = filter.gradient_components(image.as_array())?;
        Ok((magnitude.into_pyarray(py), direction.into_pyarray(py)))
    }

    /// Sobel edge detection extension module
    #[pymodule]
    pub fn sobel_rust(m: &Bound<'_, PyModule>) -> PyResult<()> {
        m.add_function(wrap_pyfunction!(sobel, m)?)?;
        m.add_function(wrap_pyfunction!(sobel_f32, m)?)?;
        m.add_function(wrap_pyfunction!(sobel_gradient_components, m)?)?;
        Ok(())
    }
}

#[cfg(feature = "python")]
pub use python::sobel_rust;
