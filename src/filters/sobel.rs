//! Configurable Sobel edge filter.
//!
//! A [`SobelFilter`] owns a validated [`SobelConfig`] and runs the
//! pipeline for each call:
//!
//! 1. adapt channels (drop alpha, optional luma)
//! 2. convolve with both Sobel kernels
//! 3. reduce the gradient pair with the selected [`OutputFormat`]
//! 4. optionally normalize for display
//!
//! Every intermediate belongs to a per-call [`CallScope`]. If the
//! convolution backend fails, the call still succeeds with an all-zero
//! raster; the failure is logged and passed to the failure handler.
//!
//! `apply` takes `&self` and `reconfigure` takes `&mut self`, so a filter
//! cannot be reconfigured while a call on it is in flight.

use std::fmt;
use std::sync::Arc;

use log::{debug, error, warn};
use ndarray::{Array3, ArrayView3};
use serde::{Deserialize, Serialize};

use super::backend::{ConvolutionBackend, CpuBackend};
use super::channels::{adapt, check_raster, Adaptation};
use super::gradient::compute_gradients;
use super::kernels::KernelSize;
use super::normalize::{normalize_in_place, NormalizationRange};
use super::output::{direction, magnitude, OutputFormat};
use super::scope::{BufferLedger, BufferStats, CallScope};
use crate::error::{Result, SobelError};
use crate::io::{compose_onto, PixelBuffer};

// ============================================================================
// Configuration
// ============================================================================

/// Validated filter configuration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SobelConfig {
    pub kernel_size: KernelSize,
    pub output_format: OutputFormat,
    /// Reduce color input to BT.709 luma before convolving.
    pub grayscale: bool,
    /// Target range of the `normalized` format and of display normalization.
    pub normalization_range: NormalizationRange,
    /// Min-max rescale the final result into `normalization_range`.
    pub normalize_output_for_display: bool,
}

impl Default for SobelConfig {
    fn default() -> Self {
        Self {
            kernel_size: KernelSize::Three,
            output_format: OutputFormat::Magnitude,
            grayscale: false,
            normalization_range: NormalizationRange::default(),
            normalize_output_for_display: false,
        }
    }
}

impl SobelConfig {
    /// Both the `normalized` format and display normalization are on.
    pub fn normalizes_twice(&self) -> bool {
        self.output_format == OutputFormat::Normalized && self.normalize_output_for_display
    }

    /// Return a copy with every field of `update` validated and applied.
    pub fn updated(&self, update: &SobelOptionsUpdate) -> Result<Self> {
        let mut next = *self;
        if let Some(size) = update.kernel_size {
            next.kernel_size = KernelSize::try_from(size)?;
        }
        if let Some(format) = &update.output_format {
            next.output_format = format.parse()?;
        }
        if let Some(grayscale) = update.grayscale {
            next.grayscale = grayscale;
        }
        if let Some(range) = update.normalization_range {
            next.normalization_range = check_range(range)?;
        }
        if let Some(display) = update.normalize_output_for_display {
            next.normalize_output_for_display = display;
        }
        Ok(next)
    }
}

fn check_range(range: NormalizationRange) -> Result<NormalizationRange> {
    if range.is_finite() {
        Ok(range)
    } else {
        Err(SobelError::invalid(
            "normalization range",
            format!("[{}, {}]", range.min, range.max),
            "bounds must be finite",
        ))
    }
}

/// Unvalidated filter options, as handed in by callers and bindings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SobelOptions {
    #[serde(alias = "kernelSize")]
    pub kernel_size: u32,
    #[serde(alias = "outputFormat", alias = "output")]
    pub output_format: String,
    pub grayscale: bool,
    #[serde(alias = "normalizationRange")]
    pub normalization_range: NormalizationRange,
    #[serde(alias = "normalizeOutputForDisplay")]
    pub normalize_output_for_display: bool,
}

impl Default for SobelOptions {
    fn default() -> Self {
        SobelConfig::default().into()
    }
}

impl SobelOptions {
    /// Parse options from JSON; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| SobelError::Parse(e.to_string()))
    }

    pub fn validate(&self) -> Result<SobelConfig> {
        Ok(SobelConfig {
            kernel_size: KernelSize::try_from(self.kernel_size)?,
            output_format: self.output_format.parse()?,
            grayscale: self.grayscale,
            normalization_range: check_range(self.normalization_range)?,
            normalize_output_for_display: self.normalize_output_for_display,
        })
    }
}

impl From<SobelConfig> for SobelOptions {
    fn from(config: SobelConfig) -> Self {
        Self {
            kernel_size: config.kernel_size.get() as u32,
            output_format: config.output_format.as_str().to_string(),
            grayscale: config.grayscale,
            normalization_range: config.normalization_range,
            normalize_output_for_display: config.normalize_output_for_display,
        }
    }
}

/// Partial options for [`SobelFilter::reconfigure`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SobelOptionsUpdate {
    #[serde(alias = "kernelSize")]
    pub kernel_size: Option<u32>,
    #[serde(alias = "outputFormat", alias = "output")]
    pub output_format: Option<String>,
    pub grayscale: Option<bool>,
    #[serde(alias = "normalizationRange")]
    pub normalization_range: Option<NormalizationRange>,
    #[serde(alias = "normalizeOutputForDisplay")]
    pub normalize_output_for_display: Option<bool>,
}

// ============================================================================
// Filter
// ============================================================================

/// Receives computation failures that were replaced by a blank result.
pub type FailureHandler = Arc<dyn Fn(&SobelError) + Send + Sync>;

/// Sobel edge filter with a fixed, validated configuration.
#[derive(Clone)]
pub struct SobelFilter {
    config: SobelConfig,
    backend: Arc<dyn ConvolutionBackend>,
    ledger: Arc<BufferLedger>,
    on_failure: Option<FailureHandler>,
}

impl fmt::Debug for SobelFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SobelFilter")
            .field("config", &self.config)
            .field("backend", &self.backend.name())
            .field("buffers", &self.ledger.stats())
            .field("on_failure", &self.on_failure.is_some())
            .finish()
    }
}

impl Default for SobelFilter {
    fn default() -> Self {
        Self::from_config(SobelConfig::default())
    }
}

impl SobelFilter {
    /// Validate `options` and build a filter on the CPU backend.
    pub fn new(options: &SobelOptions) -> Result<Self> {
        Ok(Self::from_config(options.validate()?))
    }

    pub fn from_config(config: SobelConfig) -> Self {
        warn_if_redundant(&config);
        Self {
            config,
            backend: Arc::new(CpuBackend),
            ledger: BufferLedger::new(),
            on_failure: None,
        }
    }

    pub fn with_backend(mut self, backend: Arc<dyn ConvolutionBackend>) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_failure_handler(mut self, handler: FailureHandler) -> Self {
        self.on_failure = Some(handler);
        self
    }

    pub fn config(&self) -> SobelConfig {
        self.config
    }

    /// Allocation accounting for calls made through this filter.
    pub fn buffer_stats(&self) -> BufferStats {
        self.ledger.stats()
    }

    /// Apply `update` if every field in it is valid; otherwise keep the
    /// current configuration and return the first error.
    pub fn reconfigure(&mut self, update: &SobelOptionsUpdate) -> Result<()> {
        let next = self.config.updated(update)?;
        warn_if_redundant(&next);
        self.config = next;
        Ok(())
    }

    /// Run the filter on a `(H, W, C)` raster with `C` in {1, 3, 4}.
    ///
    /// The result has the input's height and width and the adapted channel
    /// count (1 for grayscale, 3 for color input).
    pub fn apply(&self, input: ArrayView3<f32>) -> Result<Array3<f32>> {
        let shape = self.output_shape(&input)?;
        debug!(
            "sobel: {:?} -> {:?} kernel={} format={} grayscale={}",
            input.dim(),
            shape,
            self.config.kernel_size,
            self.config.output_format,
            self.config.grayscale
        );

        let scope = CallScope::open("sobel", &self.ledger);
        match self.run(input, &scope) {
            Err(err @ SobelError::Computation(_)) => {
                self.report(&err);
                Ok(Array3::zeros(shape))
            }
            other => other,
        }
    }

    /// Compute magnitude and direction in one pass, bypassing the output format.
    pub fn gradient_components(&self, input: ArrayView3<f32>) -> Result<(Array3<f32>, Array3<f32>)> {
        let shape = self.output_shape(&input)?;

        let scope = CallScope::open("sobel-components", &self.ledger);
        let computed = adapt(input, self.config.grayscale, &scope).and_then(|adapted| {
            let pair = compute_gradients(adapted.view(), self.config.kernel_size, self.backend.as_ref(), &scope)?;
            let mag = scope.track(magnitude(pair.gx.view(), pair.gy.view()));
            let dir = scope.track(direction(pair.gx.view(), pair.gy.view()));
            Ok((squeeze(mag.into_inner(), shape)?, squeeze(dir.into_inner(), shape)?))
        });

        match computed {
            Ok(components) => Ok(components),
            Err(err @ SobelError::Computation(_)) => {
                self.report(&err);
                Ok((Array3::zeros(shape), Array3::zeros(shape)))
            }
            Err(err) => Err(err),
        }
    }

    /// Run the filter on 8-bit pixels and write the result back in the
    /// source layout (see [`compose_onto`]).
    pub fn apply_to_pixels(&self, pixels: &PixelBuffer) -> Result<PixelBuffer> {
        let raster = pixels.to_raster()?;
        let result = self.apply(raster.view())?;
        compose_onto(result.view(), pixels)
    }

    fn output_shape(&self, input: &ArrayView3<f32>) -> Result<(usize, usize, usize)> {
        let layout = check_raster(input)?;
        let (height, width, _) = input.dim();
        let channels = Adaptation::plan(layout, self.config.grayscale).output_channels(layout);
        Ok((height, width, channels))
    }

    fn run(&self, input: ArrayView3<f32>, scope: &CallScope) -> Result<Array3<f32>> {
        let config = &self.config;
        let adapted = adapt(input, config.grayscale, scope)?;
        let pair = compute_gradients(adapted.view(), config.kernel_size, self.backend.as_ref(), scope)?;

        let mut result = config.output_format.reduce(&pair, config.normalization_range, scope);
        if config.normalize_output_for_display {
            normalize_in_place(result.array_mut(), config.normalization_range);
        }
        Ok(result.into_inner())
    }

    fn report(&self, err: &SobelError) {
        error!("sobel: {} backend failed, returning blank result: {err}", self.backend.name());
        if let Some(handler) = &self.on_failure {
            handler(err);
        }
    }
}

fn squeeze(batched: ndarray::Array4<f32>, shape: (usize, usize, usize)) -> Result<Array3<f32>> {
    let squeezed = batched.index_axis_move(ndarray::Axis(0), 0);
    if squeezed.dim() != shape {
        return Err(SobelError::Computation(format!(
            "backend returned {:?}, expected {shape:?}",
            squeezed.dim()
        )));
    }
    Ok(squeezed)
}

fn warn_if_redundant(config: &SobelConfig) {
    if config.normalizes_twice() {
        warn!("sobel: `normalized` output with display normalization normalizes twice; the second pass is a no-op");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::backend::check_depthwise_shapes;
    use ndarray::{Array4, ArrayView4};
    use proptest::prelude::*;
    use std::f32::consts::PI;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn options(kernel_size: u32, format: &str, grayscale: bool) -> SobelOptions {
        SobelOptions {
            kernel_size,
            output_format: format.to_string(),
            grayscale,
            ..SobelOptions::default()
        }
    }

    /// 4x4 RGB, black except one bright pixel.
    fn bright_pixel() -> Array3<f32> {
        let mut img = Array3::<f32>::zeros((4, 4, 3));
        for c in 0..3 {
            img[[1, 1, c]] = 255.0;
        }
        img
    }

    #[derive(Debug)]
    struct FailingBackend;

    impl ConvolutionBackend for FailingBackend {
        fn name(&self) -> &str {
            "failing"
        }

        fn depthwise_conv2d(&self, input: ArrayView4<f32>, kernel: ndarray::ArrayView3<f32>) -> Result<Array4<f32>> {
            check_depthwise_shapes(&input, &kernel)?;
            Err(SobelError::Computation("device out of memory".into()))
        }
    }

    #[test]
    fn test_single_bright_pixel_gives_ring() {
        // Scenario A
        let filter = SobelFilter::new(&options(3, "magnitude", true)).unwrap();
        let out = filter.apply(bright_pixel().view()).unwrap();
        assert_eq!(out.dim(), (4, 4, 1));

        for y in 0..=2 {
            for x in 0..=2 {
                if (y, x) != (1, 1) {
                    assert!(out[[y, x, 0]] > 0.0, "no response at ({y},{x})");
                }
            }
        }
        // Symmetric neighborhood cancels out at the pixel itself.
        assert_eq!(out[[1, 1, 0]], 0.0);
        assert_eq!(out[[3, 3, 0]], 0.0);
        assert_eq!(out[[0, 3, 0]], 0.0);
        assert_eq!(out[[3, 0, 0]], 0.0);
    }

    #[test]
    fn test_kernel_size_four_rejected() {
        // Scenario B
        let err = SobelFilter::new(&options(4, "magnitude", false)).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("{3, 5, 7}"), "{err}");
    }

    #[test]
    fn test_unknown_output_format_rejected() {
        // Scenario C
        let err = SobelFilter::new(&options(3, "invalid", false)).unwrap_err();
        assert!(err.is_configuration());
        assert!(
            err.to_string().contains("{x, y, magnitude, direction, normalized}"),
            "{err}"
        );
    }

    #[test]
    fn test_black_image_normalized_is_zero() {
        // Scenario D
        let mut opts = options(3, "normalized", false);
        opts.normalization_range = NormalizationRange::new(0.0, 255.0);
        let filter = SobelFilter::new(&opts).unwrap();

        let out = filter.apply(Array3::<f32>::zeros((8, 8, 3)).view()).unwrap();
        assert_eq!(out.dim(), (8, 8, 3));
        assert!(out.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_components_match_axis_strategies() {
        // Scenario E
        let img = bright_pixel();
        let base = options(3, "x", true);
        let fx = SobelFilter::new(&base).unwrap();
        let fy = SobelFilter::new(&SobelOptions { output_format: "y".into(), ..base.clone() }).unwrap();

        let x = fx.apply(img.view()).unwrap();
        let y = fy.apply(img.view()).unwrap();
        let (mag, dir) = fx.gradient_components(img.view()).unwrap();

        assert_eq!(mag.dim(), x.dim());
        assert_eq!(dir.dim(), x.dim());
        for ((m, a), b) in mag.iter().zip(x.iter()).zip(y.iter()) {
            assert!((m - (a * a + b * b).sqrt()).abs() < 1e-3);
        }

        let fd = SobelFilter::new(&SobelOptions { output_format: "direction".into(), ..base }).unwrap();
        let d = fd.apply(img.view()).unwrap();
        for (c, s) in dir.iter().zip(d.iter()) {
            assert!((c - s).abs() < 1e-6, "{c} vs {s}");
        }
        assert!(dir.iter().any(|&a| a != 0.0));
    }

    #[test]
    fn test_reconfigure_is_atomic() {
        let mut filter = SobelFilter::default();
        let before = filter.config();

        let bad = SobelOptionsUpdate {
            kernel_size: Some(5),
            output_format: Some("sideways".into()),
            ..Default::default()
        };
        assert!(filter.reconfigure(&bad).is_err());
        assert_eq!(filter.config(), before);

        let good = SobelOptionsUpdate {
            kernel_size: Some(7),
            output_format: Some("direction".into()),
            grayscale: Some(true),
            ..Default::default()
        };
        filter.reconfigure(&good).unwrap();
        let config = filter.config();
        assert_eq!(config.kernel_size, KernelSize::Seven);
        assert_eq!(config.output_format, OutputFormat::Direction);
        assert!(config.grayscale);
        assert_eq!(config.normalization_range, before.normalization_range);
    }

    #[test]
    fn test_non_finite_range_rejected() {
        let mut opts = options(3, "normalized", false);
        opts.normalization_range = NormalizationRange::new(0.0, f32::INFINITY);
        assert!(SobelFilter::new(&opts).unwrap_err().is_configuration());
    }

    #[test]
    fn test_options_from_json() {
        let opts = SobelOptions::from_json_str(
            r#"{"kernelSize": 5, "outputFormat": "direction", "normalizationRange": {"min": -1, "max": 1}}"#,
        )
        .unwrap();
        let config = opts.validate().unwrap();
        assert_eq!(config.kernel_size, KernelSize::Five);
        assert_eq!(config.output_format, OutputFormat::Direction);
        assert!(!config.grayscale);
        assert_eq!(config.normalization_range, NormalizationRange::new(-1.0, 1.0));

        assert!(SobelOptions::from_json_str("{").unwrap_err().is_configuration());
    }

    #[test]
    fn test_invalid_channel_count_is_shape_error() {
        let filter = SobelFilter::default();
        let err = filter.apply(Array3::<f32>::zeros((4, 4, 2)).view()).unwrap_err();
        assert!(matches!(err, SobelError::Shape(_)));
    }

    #[test]
    fn test_backend_failure_falls_back_to_blank() {
        let failures = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&failures);
        let filter = SobelFilter::new(&options(5, "magnitude", false))
            .unwrap()
            .with_backend(Arc::new(FailingBackend))
            .with_failure_handler(Arc::new(move |err: &SobelError| {
                assert!(matches!(err, SobelError::Computation(_)));
                counter.fetch_add(1, Ordering::SeqCst);
            }));

        let out = filter.apply(bright_pixel().view()).unwrap();
        assert_eq!(out.dim(), (4, 4, 3));
        assert!(out.iter().all(|&v| v == 0.0));

        let (mag, dir) = filter.gradient_components(bright_pixel().view()).unwrap();
        assert!(mag.iter().chain(dir.iter()).all(|&v| v == 0.0));

        assert_eq!(failures.load(Ordering::SeqCst), 2);
        assert_eq!(filter.buffer_stats().live_buffers, 0);
    }

    #[test]
    fn test_no_buffers_outlive_calls() {
        let mut opts = options(7, "normalized", true);
        opts.normalize_output_for_display = true;
        let filter = SobelFilter::new(&opts).unwrap();
        let img = Array3::from_shape_fn((6, 9, 4), |(y, x, c)| ((y * 31 + x * 17 + c * 7) % 256) as f32);

        for _ in 0..3 {
            filter.apply(img.view()).unwrap();
            filter.gradient_components(img.view()).unwrap();
        }
        let stats = filter.buffer_stats();
        assert_eq!(stats.live_buffers, 0);
        assert_eq!(stats.live_bytes, 0);
        assert!(stats.total_allocations > 0);
        assert!(stats.peak_bytes > 0);
    }

    #[test]
    fn test_display_normalization_after_magnitude() {
        let mut opts = options(3, "magnitude", true);
        opts.normalize_output_for_display = true;
        opts.normalization_range = NormalizationRange::new(0.0, 1.0);
        let filter = SobelFilter::new(&opts).unwrap();

        let out = filter.apply(bright_pixel().view()).unwrap();
        let max = out.iter().cloned().fold(f32::MIN, f32::max);
        let min = out.iter().cloned().fold(f32::MAX, f32::min);
        assert!((max - 1.0).abs() < 1e-6);
        assert_eq!(min, 0.0);
    }

    #[test]
    fn test_double_normalization_is_fixed_point() {
        let img = bright_pixel();
        let once = SobelFilter::new(&options(3, "normalized", false)).unwrap();
        let mut twice_opts = options(3, "normalized", false);
        twice_opts.normalize_output_for_display = true;
        let twice = SobelFilter::new(&twice_opts).unwrap();
        assert!(twice.config().normalizes_twice());

        let a = once.apply(img.view()).unwrap();
        let b = twice.apply(img.view()).unwrap();
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < 1e-3);
        }
    }

    #[test]
    fn test_pixels_keep_layout_and_alpha() {
        let mut data = vec![0u8; 5 * 5 * 4];
        for px in data.chunks_mut(4) {
            px[3] = 200;
        }
        let center = (2 * 5 + 2) * 4;
        data[center..center + 3].copy_from_slice(&[255, 255, 255]);
        let pixels = PixelBuffer::new(data, 5, 5, 4).unwrap();

        let filter = SobelFilter::new(&options(3, "magnitude", true)).unwrap();
        let out = filter.apply_to_pixels(&pixels).unwrap();

        assert_eq!(out.channels(), 4);
        assert_eq!((out.width(), out.height()), (5, 5));
        assert!(out.data().chunks(4).all(|px| px[3] == 200));
        // Right neighbour of the bright pixel, replicated across RGB.
        let right = (2 * 5 + 3) * 4;
        assert_eq!(out.data()[right], 255);
        assert_eq!(out.data()[right + 1], out.data()[right]);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn prop_spatial_size_preserved(
            size in prop::sample::select(vec![3u32, 5, 7]),
            channels in prop::sample::select(vec![1usize, 3, 4]),
            grayscale in any::<bool>(),
            height in 1usize..10,
            width in 1usize..10,
        ) {
            let filter = SobelFilter::new(&options(size, "magnitude", grayscale)).unwrap();
            let img = Array3::from_shape_fn((height, width, channels), |(y, x, c)| ((y * 13 + x * 7 + c) % 255) as f32);
            let out = filter.apply(img.view()).unwrap();

            let expected_channels = if grayscale { 1 } else { channels.min(3) };
            prop_assert_eq!(out.dim(), (height, width, expected_channels));
            prop_assert!(out.iter().all(|&v| v >= 0.0));
        }

        #[test]
        fn prop_direction_in_half_open_range(
            values in prop::collection::vec(0.0f32..255.0, 36),
            size in prop::sample::select(vec![3u32, 5, 7]),
        ) {
            let filter = SobelFilter::new(&options(size, "direction", false)).unwrap();
            let img = Array3::from_shape_vec((6, 6, 1), values).unwrap();
            let out = filter.apply(img.view()).unwrap();
            prop_assert!(out.iter().all(|&a| a > -PI && a <= PI));
        }

        #[test]
        fn prop_component_direction_in_half_open_range(
            values in prop::collection::vec(0.0f32..255.0, 75),
            size in prop::sample::select(vec![3u32, 5, 7]),
            grayscale in any::<bool>(),
        ) {
            let filter = SobelFilter::new(&options(size, "magnitude", grayscale)).unwrap();
            let img = Array3::from_shape_vec((5, 5, 3), values).unwrap();
            let (_, dir) = filter.gradient_components(img.view()).unwrap();
            prop_assert!(dir.iter().all(|&a| a > -PI && a <= PI));
        }
    }
}
