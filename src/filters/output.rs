//! Output strategies: reduce a gradient pair to one result raster.
//!
//! | Format | Result |
//! |--------|--------|
//! | `x` | `abs(Gx)` |
//! | `y` | `abs(Gy)` |
//! | `magnitude` | `sqrt(Gx² + Gy²)` |
//! | `direction` | `atan2(Gy, Gx)` in (−π, π] |
//! | `normalized` | magnitude rescaled into the normalization range |
//!
//! All strategies are element-wise, so channels never mix. The only
//! reduction (min/max for `normalized`) spans the whole tensor.

use std::f32::consts::PI;
use std::fmt;
use std::str::FromStr;

use ndarray::{Array4, ArrayView4, Axis, Ix3, Zip};

use super::gradient::GradientPair;
use super::normalize::{normalize_in_place, NormalizationRange};
use super::scope::{CallScope, ScopedBuffer};
use crate::error::SobelError;

/// Which representation of the gradients a filter returns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum OutputFormat {
    X,
    Y,
    #[default]
    Magnitude,
    Direction,
    Normalized,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 5] = [
        OutputFormat::X,
        OutputFormat::Y,
        OutputFormat::Magnitude,
        OutputFormat::Direction,
        OutputFormat::Normalized,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            OutputFormat::X => "x",
            OutputFormat::Y => "y",
            OutputFormat::Magnitude => "magnitude",
            OutputFormat::Direction => "direction",
            OutputFormat::Normalized => "normalized",
        }
    }

    fn strategy(self) -> Strategy {
        match self {
            OutputFormat::X => abs_x,
            OutputFormat::Y => abs_y,
            OutputFormat::Magnitude => magnitude_strategy,
            OutputFormat::Direction => direction_strategy,
            OutputFormat::Normalized => normalized_strategy,
        }
    }

    /// Reduce `pair` to a `(H, W, C)` raster registered with `scope`.
    pub fn reduce(
        self,
        pair: &GradientPair,
        range: NormalizationRange,
        scope: &CallScope,
    ) -> ScopedBuffer<Ix3> {
        let batched = (self.strategy())(pair.gx.view(), pair.gy.view(), range);
        scope.track(batched.index_axis_move(Axis(0), 0))
    }
}

impl FromStr for OutputFormat {
    type Err = SobelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OutputFormat::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| {
                SobelError::configuration(
                    "output format",
                    s,
                    OutputFormat::ALL.iter().map(|f| f.as_str()),
                )
            })
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type Strategy = fn(ArrayView4<f32>, ArrayView4<f32>, NormalizationRange) -> Array4<f32>;

fn abs_x(gx: ArrayView4<f32>, _gy: ArrayView4<f32>, _range: NormalizationRange) -> Array4<f32> {
    gx.mapv(f32::abs)
}

fn abs_y(_gx: ArrayView4<f32>, gy: ArrayView4<f32>, _range: NormalizationRange) -> Array4<f32> {
    gy.mapv(f32::abs)
}

fn magnitude_strategy(gx: ArrayView4<f32>, gy: ArrayView4<f32>, _range: NormalizationRange) -> Array4<f32> {
    magnitude(gx, gy)
}

fn direction_strategy(gx: ArrayView4<f32>, gy: ArrayView4<f32>, _range: NormalizationRange) -> Array4<f32> {
    direction(gx, gy)
}

fn normalized_strategy(gx: ArrayView4<f32>, gy: ArrayView4<f32>, range: NormalizationRange) -> Array4<f32> {
    let mut mag = magnitude(gx, gy);
    normalize_in_place(&mut mag, range);
    mag
}

/// Per-element Euclidean norm of the gradient.
pub fn magnitude<D: ndarray::Dimension>(
    gx: ndarray::ArrayView<f32, D>,
    gy: ndarray::ArrayView<f32, D>,
) -> ndarray::Array<f32, D> {
    Zip::from(&gx).and(&gy).map_collect(|&x, &y| (x * x + y * y).sqrt())
}

/// Per-element gradient angle in (−π, π].
pub fn direction<D: ndarray::Dimension>(
    gx: ndarray::ArrayView<f32, D>,
    gy: ndarray::ArrayView<f32, D>,
) -> ndarray::Array<f32, D> {
    Zip::from(&gx).and(&gy).map_collect(|&x, &y| angle(y, x))
}

/// `atan2` folded so that −π (from a negative-zero `y`) reports as π.
#[inline]
pub fn angle(y: f32, x: f32) -> f32 {
    let a = y.atan2(x);
    if a <= -PI {
        PI
    } else {
        a
    }
}
