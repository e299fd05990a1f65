//! Scalar reference kernel.

use crate::kernel::CorrKernel;

/// Scalar sparse correlation kernel.
pub struct SparseScalar;

impl CorrKernel for SparseScalar {
    #[inline]
    fn accumulate_row(src: &[f64], weight: f64, o2: &mut [f64], norm: &mut [f64]) {
        for ((&x, o), n) in src.iter().zip(o2.iter_mut()).zip(norm.iter_mut()) {
            *o += x * weight;
            *n += x * x;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SparseScalar;
    use crate::feature::FeatureStack;
    use crate::kernel::{CorrKernel, CorrParams, CORR_EPS};
    use crate::template::{PatchPrototype, IGNORED};
    use crate::util::FloatMode;

    #[test]
    fn matches_dense_masked_evaluation() {
        let stack = FeatureStack::from_fn(7, 6, 2, |y, x, c| ((y * 5 + x * 3 + c * 7) % 11) as f64 * 0.1).unwrap();
        let size = 3;
        let mut weights = vec![IGNORED; size * size * 2];
        for (i, w) in [(0usize, 0.3), (4, 0.5), (8, 0.2), (10, 0.6), (13, 0.0)] {
            weights[i] = w;
        }
        let proto = PatchPrototype::from_weights(size, 2, weights).unwrap();
        let params = CorrParams {
            sigma: 0.01,
            mode: FloatMode::Trap,
        };
        let got = SparseScalar::correlate(&stack, &proto.plan(), params).unwrap();
        assert_eq!(got.len(), 5 * 4);

        for y in 0..5 {
            for x in 0..4 {
                let (mut o2, mut norm, mut pi) = (0.0, 0.0, 0.0);
                for c in 0..2 {
                    for i in 0..size {
                        for j in 0..size {
                            let w = proto.weight(i, j, c);
                            if w > 0.0 {
                                let v = stack.get(y + i, x + j, c).unwrap();
                                o2 += v * w;
                                norm += v * v;
                                pi += w * w;
                            }
                        }
                    }
                }
                let want = o2 / ((norm + CORR_EPS).sqrt() * (pi + CORR_EPS).sqrt() + 0.01);
                assert!((got[y * 4 + x] - want).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn degenerate_prototype_yields_zeros() {
        let stack = FeatureStack::from_fn(5, 5, 1, |_, _, _| 1.0).unwrap();
        let proto = PatchPrototype::from_weights(2, 1, vec![IGNORED; 4]).unwrap();
        let params = CorrParams {
            sigma: 0.0,
            mode: FloatMode::Trap,
        };
        let got = SparseScalar::correlate(&stack, &proto.plan(), params).unwrap();
        assert_eq!(got, vec![0.0; 16]);
    }
}
