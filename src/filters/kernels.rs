//! Sobel derivative kernels for 3×3, 5×5 and 7×7 windows.
//!
//! Each horizontal kernel is the outer product of a binomial smoothing
//! vector (rows) and a binomial-smoothed central difference (columns):
//!
//! | Size | Smoothing | Derivative |
//! |------|-----------|------------|
//! | 3 | `1 2 1` | `-1 0 1` |
//! | 5 | `1 4 6 4 1` | `-1 -2 0 2 1` |
//! | 7 | `1 6 15 20 15 6 1` | `-1 -4 -5 0 5 4 1` |
//!
//! The vertical kernel is the transpose of the horizontal one. The tables
//! are plain statics, so they need no initialization and are safe to share
//! across threads.

use std::fmt;

use ndarray::Array2;

use crate::error::{Result, SobelError};

/// Gradient axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    /// Derivative along x (responds to vertical edges).
    Horizontal,
    /// Derivative along y (responds to horizontal edges).
    Vertical,
}

/// Supported kernel window sizes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum KernelSize {
    #[default]
    Three,
    Five,
    Seven,
}

impl KernelSize {
    pub const ALL: [KernelSize; 3] = [KernelSize::Three, KernelSize::Five, KernelSize::Seven];

    /// Window side length.
    pub const fn get(self) -> usize {
        match self {
            KernelSize::Three => 3,
            KernelSize::Five => 5,
            KernelSize::Seven => 7,
        }
    }

    /// Half window, i.e. the zero padding needed on each border.
    pub const fn radius(self) -> usize {
        self.get() / 2
    }
}

impl TryFrom<u32> for KernelSize {
    type Error = SobelError;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            3 => Ok(KernelSize::Three),
            5 => Ok(KernelSize::Five),
            7 => Ok(KernelSize::Seven),
            other => Err(SobelError::configuration(
                "kernel size",
                other,
                KernelSize::ALL.iter().map(|k| k.get()),
            )),
        }
    }
}

impl fmt::Display for KernelSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

// ============================================================================
// Coefficient Tables
// ============================================================================

#[rustfmt::skip]
static SOBEL_X_3: [i32; 9] = [
    -1, 0, 1,
    -2, 0, 2,
    -1, 0, 1,
];

#[rustfmt::skip]
static SOBEL_Y_3: [i32; 9] = [
    -1, -2, -1,
     0,  0,  0,
     1,  2,  1,
];

#[rustfmt::skip]
static SOBEL_X_5: [i32; 25] = [
    -1,  -2, 0,  2, 1,
    -4,  -8, 0,  8, 4,
    -6, -12, 0, 12, 6,
    -4,  -8, 0,  8, 4,
    -1,  -2, 0,  2, 1,
];

#[rustfmt::skip]
static SOBEL_Y_5: [i32; 25] = [
    -1, -4,  -6, -4, -1,
    -2, -8, -12, -8, -2,
     0,  0,   0,  0,  0,
     2,  8,  12,  8,  2,
     1,  4,   6,  4,  1,
];

#[rustfmt::skip]
static SOBEL_X_7: [i32; 49] = [
     -1,  -4,  -5, 0,   5,  4,  1,
     -6, -24, -30, 0,  30, 24,  6,
    -15, -60, -75, 0,  75, 60, 15,
    -20, -80,-100, 0, 100, 80, 20,
    -15, -60, -75, 0,  75, 60, 15,
     -6, -24, -30, 0,  30, 24,  6,
     -1,  -4,  -5, 0,   5,  4,  1,
];

#[rustfmt::skip]
static SOBEL_Y_7: [i32; 49] = [
    -1,  -6, -15,  -20, -15,  -6, -1,
    -4, -24, -60,  -80, -60, -24, -4,
    -5, -30, -75, -100, -75, -30, -5,
     0,   0,   0,    0,   0,   0,  0,
     5,  30,  75,  100,  75,  30,  5,
     4,  24,  60,   80,  60,  24,  4,
     1,   6,  15,   20,  15,   6,  1,
];

/// Read-only view of one catalog entry, stored row-major.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Kernel {
    size: KernelSize,
    coefficients: &'static [i32],
}

impl Kernel {
    pub fn size(&self) -> KernelSize {
        self.size
    }

    pub fn coefficients(&self) -> &'static [i32] {
        self.coefficients
    }

    #[inline]
    pub fn at(&self, row: usize, col: usize) -> i32 {
        self.coefficients[row * self.size.get() + col]
    }

    /// Copy the coefficients into a float matrix.
    pub fn to_array(&self) -> Array2<f32> {
        let n = self.size.get();
        Array2::from_shape_fn((n, n), |(r, c)| self.at(r, c) as f32)
    }
}

/// Look up the kernel for `axis` at `size`.
pub fn kernel(axis: Axis, size: KernelSize) -> Kernel {
    let coefficients: &'static [i32] = match (axis, size) {
        (Axis::Horizontal, KernelSize::Three) => &SOBEL_X_3,
        (Axis::Vertical, KernelSize::Three) => &SOBEL_Y_3,
        (Axis::Horizontal, KernelSize::Five) => &SOBEL_X_5,
        (Axis::Vertical, KernelSize::Five) => &SOBEL_Y_5,
        (Axis::Horizontal, KernelSize::Seven) => &SOBEL_X_7,
        (Axis::Vertical, KernelSize::Seven) => &SOBEL_Y_7,
    };
    Kernel { size, coefficients }
}
