//! Min-max normalization into a caller-selected range.
//!
//! `out = (v - lo) / max(hi - lo, MIN_DENOMINATOR) * (max - min) + min`
//! where `lo`/`hi` are the extrema of the whole tensor (all channels at
//! once, so multi-channel output stays consistent). A constant tensor
//! maps to `min` everywhere.

use ndarray::{Array, ArrayBase, Data, DataMut, Dimension};
use serde::{Deserialize, Serialize};

/// Smallest denominator used when the input range collapses.
pub const MIN_DENOMINATOR: f32 = 1e-6;

/// Target interval for normalized output.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NormalizationRange {
    pub min: f32,
    pub max: f32,
}

impl NormalizationRange {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn span(&self) -> f32 {
        self.max - self.min
    }

    pub fn is_finite(&self) -> bool {
        self.min.is_finite() && self.max.is_finite()
    }
}

impl Default for NormalizationRange {
    fn default() -> Self {
        Self::new(0.0, 255.0)
    }
}

/// Minimum and maximum over every finite element.
///
/// Returns `None` for an empty tensor or one with no finite values.
pub fn min_max<S, D>(tensor: &ArrayBase<S, D>) -> Option<(f32, f32)>
where
    S: Data<Elem = f32>,
    D: Dimension,
{
    tensor.iter().filter(|v| v.is_finite()).fold(None, |acc, &v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

/// Return a normalized copy of `tensor`.
pub fn normalize<S, D>(tensor: &ArrayBase<S, D>, range: NormalizationRange) -> Array<f32, D>
where
    S: Data<Elem = f32>,
    D: Dimension,
{
    let mut out = tensor.to_owned();
    normalize_in_place(&mut out, range);
    out
}

/// Normalize `tensor` without allocating.
pub fn normalize_in_place<S, D>(tensor: &mut ArrayBase<S, D>, range: NormalizationRange)
where
    S: DataMut<Elem = f32>,
    D: Dimension,
{
    let Some((lo, hi)) = min_max(tensor) else {
        return;
    };
    let denom = (hi - lo).max(MIN_DENOMINATOR);
    let scale = range.span() / denom;
    let (floor, ceil) = (range.min.min(range.max), range.min.max(range.max));
    // max/min rather than clamp: clamp panics on NaN bounds
    tensor.mapv_inplace(|v| ((v - lo) * scale + range.min).max(floor).min(ceil));
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array3};
    use proptest::prelude::*;

    #[test]
    fn test_maps_extrema_to_range() {
        let t = array![[-2.0f32, 0.0], [3.0, 8.0]];
        let n = normalize(&t, NormalizationRange::new(0.0, 255.0));
        assert_eq!(n[[0, 0]], 0.0);
        assert_eq!(n[[1, 1]], 255.0);
        assert!((n[[0, 1]] - 51.0).abs() < 1e-4);
    }

    #[test]
    fn test_constant_input_maps_to_min() {
        let t = Array3::<f32>::from_elem((4, 4, 3), 17.0);
        let n = normalize(&t, NormalizationRange::new(10.0, 20.0));
        assert!(n.iter().all(|&v| v == 10.0));
    }

    #[test]
    fn test_extrema_taken_across_channels() {
        let mut t = Array3::<f32>::zeros((1, 2, 2));
        t[[0, 0, 0]] = 1.0;
        t[[0, 1, 1]] = 4.0;
        let n = normalize(&t, NormalizationRange::new(0.0, 1.0));
        // Channel 0 max is 1.0 but the global max is 4.0.
        assert!((n[[0, 0, 0]] - 0.25).abs() < 1e-6);
        assert_eq!(n[[0, 1, 1]], 1.0);
    }

    #[test]
    fn test_all_nan_is_left_untouched() {
        let mut t = array![f32::NAN, f32::NAN];
        normalize_in_place(&mut t, NormalizationRange::default());
        assert!(t.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_infinite_samples_do_not_flatten_result() {
        let t = array![0.0f32, 50.0, 100.0, f32::INFINITY];
        let n = normalize(&t, NormalizationRange::new(0.0, 1.0));
        assert_eq!(min_max(&t), Some((0.0, 100.0)));
        assert_eq!(n[0], 0.0);
        assert!((n[1] - 0.5).abs() < 1e-6);
        assert_eq!(n[2], 1.0);
        assert_eq!(n[3], 1.0);
    }

    proptest! {
        #[test]
        fn prop_result_spans_range(values in prop::collection::vec(-1000.0f32..1000.0, 2..64)) {
            let t = ndarray::Array1::from(values);
            let (lo, hi) = min_max(&t).unwrap();
            prop_assume!(hi - lo > 1e-2);

            let n = normalize(&t, NormalizationRange::new(0.0, 255.0));
            let (nlo, nhi) = min_max(&n).unwrap();
            prop_assert!((nlo - 0.0).abs() < 1e-3);
            prop_assert!((nhi - 255.0).abs() < 1e-2);
        }

        #[test]
        fn prop_second_pass_is_fixed_point(values in prop::collection::vec(0.0f32..500.0, 1..64)) {
            let t = ndarray::Array1::from(values);
            let (lo, hi) = min_max(&t).unwrap();
            prop_assume!(hi == lo || hi - lo > 1e-3);
            let range = NormalizationRange::new(0.0, 255.0);
            let once = normalize(&t, range);
            let twice = normalize(&once, range);
            for (a, b) in once.iter().zip(twice.iter()) {
                prop_assert!((a - b).abs() < 1e-2, "{a} vs {b}");
            }
        }
    }
}
