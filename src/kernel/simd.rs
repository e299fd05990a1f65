//! SIMD-accelerated row updates using the `wide` crate.
//!
//! The shifted channel row is processed four values at a time with `f64x4`;
//! the tail falls back to scalar code.

use crate::kernel::CorrKernel;
use wide::f64x4;

const LANES: usize = 4;

/// Load 4 f64 values into f64x4.
#[inline]
fn load_f64x4(slice: &[f64]) -> f64x4 {
    f64x4::from([slice[0], slice[1], slice[2], slice[3]])
}

/// SIMD sparse correlation kernel.
pub struct SparseSimd;

impl CorrKernel for SparseSimd {
    #[inline]
    fn accumulate_row(src: &[f64], weight: f64, o2: &mut [f64], norm: &mut [f64]) {
        let len = src.len().min(o2.len()).min(norm.len());
        let simd_end = len / LANES * LANES;
        let w = f64x4::splat(weight);

        let mut i = 0;
        while i < simd_end {
            let x = load_f64x4(&src[i..]);
            let o = load_f64x4(&o2[i..]) + x * w;
            let n = load_f64x4(&norm[i..]) + x * x;
            o2[i..i + LANES].copy_from_slice(&o.to_array());
            norm[i..i + LANES].copy_from_slice(&n.to_array());
            i += LANES;
        }

        while i < len {
            let x = src[i];
            o2[i] += x * weight;
            norm[i] += x * x;
            i += 1;
        }
    }
}
