//! Sparse normalized cross-correlation kernels (S2b matching).
//!
//! A prototype is matched against a feature stack by visiting only its kept
//! taps. Each tap adds the stack channel shifted by the tap offset into three
//! accumulators (`o2 += x * w`, `norm += x²`, `pi += w²`), and the response is
//! `o2 / (sqrt(norm + eps) * sqrt(pi + eps) + sigma)`. Since `pi` does not
//! depend on the position it comes precomputed from the plan.
//!
//! Implementations differ only in how a row update is vectorized.

use crate::config::Config;
use crate::feature::FeatureStack;
use crate::template::SparsePlan;
use crate::util::{FloatMode, VisearchError, VisearchResult};

/// Stabilizer added under both square roots of the denominator.
pub const CORR_EPS: f64 = 1e-9;

/// Parameters shared by all correlation kernels.
#[derive(Clone, Copy, Debug)]
pub struct CorrParams {
    /// Constant added to the denominator.
    pub sigma: f64,
    /// Handling of out-of-range or non-finite responses.
    pub mode: FloatMode,
}

impl CorrParams {
    /// Takes `sigma_s2b` and the float mode from the configuration.
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            sigma: cfg.sigma_s2b,
            mode: cfg.float_mode,
        }
    }
}

/// Kernel trait for sparse prototype correlation.
pub trait CorrKernel {
    /// Adds `src * weight` into `o2` and `src²` into `norm`, elementwise.
    fn accumulate_row(src: &[f64], weight: f64, o2: &mut [f64], norm: &mut [f64]);

    /// Correlates `plan` with every valid placement in `stack`.
    ///
    /// Returns a row-major map of `(H - rf + 1) x (W - rf + 1)` responses,
    /// each within `[-1, 1]`.
    fn correlate(
        stack: &FeatureStack,
        plan: &SparsePlan,
        params: CorrParams,
    ) -> VisearchResult<Vec<f64>> {
        let (out_h, out_w) = output_size(stack, plan)?;
        let len = out_h * out_w;
        if plan.is_degenerate() {
            return Ok(vec![0.0; len]);
        }

        let mut o2 = vec![0.0f64; len];
        let mut norm = vec![0.0f64; len];
        for tap in plan.taps() {
            let window = stack
                .channel_view(tap.channel)?
                .roi(tap.col, tap.row, out_w, out_h)?;
            for y in 0..out_h {
                let src = window.row(y).ok_or_else(|| {
                    VisearchError::shape("sparse_corr", format!("missing window row {y}"))
                })?;
                let span = y * out_w..(y + 1) * out_w;
                Self::accumulate_row(src, tap.weight, &mut o2[span.clone()], &mut norm[span]);
            }
        }

        finish(o2, &norm, plan.weight_sq_sum(), params)
    }
}

/// Size of the valid correlation map, or `InputShape` if the prototype does
/// not fit or its depth differs from the stack.
pub fn output_size(stack: &FeatureStack, plan: &SparsePlan) -> VisearchResult<(usize, usize)> {
    if plan.depth() != stack.depth() {
        return Err(VisearchError::shape(
            "sparse_corr",
            format!("prototype depth {} != stack depth {}", plan.depth(), stack.depth()),
        ));
    }
    let rf = plan.size();
    if rf == 0 || rf > stack.height() || rf > stack.width() {
        return Err(VisearchError::shape(
            "sparse_corr",
            format!(
                "prototype {rf}x{rf} does not fit a {}x{} map",
                stack.width(),
                stack.height()
            ),
        ));
    }
    Ok((stack.height() - rf + 1, stack.width() - rf + 1))
}

fn finish(
    mut o2: Vec<f64>,
    norm: &[f64],
    weight_sq_sum: f64,
    params: CorrParams,
) -> VisearchResult<Vec<f64>> {
    let pi_root = (weight_sq_sum + CORR_EPS).sqrt();
    for (out, &n) in o2.iter_mut().zip(norm) {
        let value = *out / ((n + CORR_EPS).sqrt() * pi_root + params.sigma);
        *out = params.mode.bound("sparse_corr", value, 1.0)?;
    }
    Ok(o2)
}

pub mod scalar;

#[cfg(feature = "simd")]
pub mod simd;

#[cfg(feature = "rayon")]
pub mod rayon;
