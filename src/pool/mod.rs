//! C-layer pooling: 2x decimation followed by a sliding maximum.
//!
//! Channels are pooled independently and scales are never merged, so the
//! output hierarchy has the same number of scales and channels as the input.
//! The same operation serves C1 and any higher C layer.

use crate::feature::{FeatureHierarchy, FeatureStack};
use crate::trace::{trace_event, trace_span};
use crate::util::{VisearchError, VisearchResult};

/// Pools every scale of `input` with a `pool_size` window.
pub fn c_layer(input: &FeatureHierarchy, pool_size: usize) -> VisearchResult<FeatureHierarchy> {
    let _span = trace_span!("c_layer", scales = input.len(), pool_size = pool_size).entered();
    let levels = input
        .levels()
        .iter()
        .map(|stack| max_pool(stack, pool_size))
        .collect::<VisearchResult<Vec<_>>>()?;
    trace_event!("c_layer_done", scales = levels.len());
    FeatureHierarchy::new(levels, input.rf_sizes().to_vec())
}

/// Keeps every other row and column, then applies a `pool_size` maximum
/// filter to each channel.
pub fn max_pool(stack: &FeatureStack, pool_size: usize) -> VisearchResult<FeatureStack> {
    if pool_size == 0 {
        return Err(VisearchError::shape("max_pool", "pool_size must be positive"));
    }
    let height = stack.height().div_ceil(2);
    let width = stack.width().div_ceil(2);
    let mut out = FeatureStack::zeros(height, width, stack.depth())?;

    let mut decimated = vec![0.0f64; height * width];
    for c in 0..stack.depth() {
        let src = stack.channel(c);
        for y in 0..height {
            for x in 0..width {
                decimated[y * width + x] = src[(2 * y) * stack.width() + 2 * x];
            }
        }
        max_filter(&decimated, height, width, pool_size, out.channel_mut(c));
    }
    Ok(out)
}

/// Separable sliding maximum with window offsets `[-(size / 2), size - 1 - size / 2]`
/// clipped to the map.
fn max_filter(src: &[f64], height: usize, width: usize, size: usize, dst: &mut [f64]) {
    let lo = size / 2;
    let hi = size - 1 - lo;

    let mut rows = vec![0.0f64; height * width];
    for y in 0..height {
        let line = &src[y * width..(y + 1) * width];
        for x in 0..width {
            let start = x.saturating_sub(lo);
            let end = (x + hi).min(width - 1);
            rows[y * width + x] = line[start..=end].iter().copied().fold(f64::NEG_INFINITY, f64::max);
        }
    }

    for x in 0..width {
        for y in 0..height {
            let start = y.saturating_sub(lo);
            let end = (y + hi).min(height - 1);
            dst[y * width + x] = (start..=end)
                .map(|yy| rows[yy * width + x])
                .fold(f64::NEG_INFINITY, f64::max);
        }
    }
}
