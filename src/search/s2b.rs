//! S2b layer: sparse prototype matching over every C1 scale, and the C2b
//! global maximum.

use crate::config::Config;
use crate::feature::{FeatureHierarchy, FeatureStack};
use crate::kernel::{CorrKernel, CorrParams};
use crate::template::SparsePlan;
use crate::trace::{trace_event, trace_span};
use crate::util::{VisearchError, VisearchResult};

#[cfg(feature = "rayon")]
use crate::kernel::rayon::correlate_all_par;

// Row updates use SIMD when available.
#[cfg(not(feature = "simd"))]
type ActiveKernel = crate::kernel::scalar::SparseScalar;
#[cfg(feature = "simd")]
type ActiveKernel = crate::kernel::simd::SparseSimd;

/// Matches every plan against every scale of a C1 hierarchy.
///
/// Channel `p` of each output stack holds the responses of plan `p`. A scale
/// smaller than the prototypes yields a `1 x 1 x n` all-zero stack.
pub fn s2b_layer(
    c1: &FeatureHierarchy,
    plans: &[SparsePlan],
    cfg: &Config,
) -> VisearchResult<FeatureHierarchy> {
    let _span = trace_span!("s2b_layer", scales = c1.len(), prototypes = plans.len()).entered();
    let first = plans
        .first()
        .ok_or_else(|| VisearchError::shape("s2b_layer", "no patch prototypes"))?;
    let rf = first.size();
    if plans.iter().any(|p| p.size() != rf) {
        return Err(VisearchError::shape("s2b_layer", "patch prototypes differ in size"));
    }

    let params = CorrParams::from_config(cfg);
    let mut levels = Vec::with_capacity(c1.len());
    for (scale_idx, stack) in c1.levels().iter().enumerate() {
        if stack.height() < rf || stack.width() < rf {
            trace_event!("s2b_scale_too_small", scale = scale_idx, height = stack.height());
            levels.push(FeatureStack::zeros(1, 1, plans.len())?);
            continue;
        }
        let maps = correlate_all(stack, plans, params, cfg.parallel)?;
        let out_h = stack.height() - rf + 1;
        let out_w = stack.width() - rf + 1;
        levels.push(FeatureStack::from_channels(out_h, out_w, maps)?);
    }

    FeatureHierarchy::new(levels, c1.rf_sizes().to_vec())
}

#[cfg(feature = "rayon")]
fn correlate_all(
    stack: &FeatureStack,
    plans: &[SparsePlan],
    params: CorrParams,
    parallel: bool,
) -> VisearchResult<Vec<Vec<f64>>> {
    if parallel {
        return correlate_all_par::<ActiveKernel>(stack, plans, params);
    }
    correlate_all_seq(stack, plans, params)
}

#[cfg(not(feature = "rayon"))]
fn correlate_all(
    stack: &FeatureStack,
    plans: &[SparsePlan],
    params: CorrParams,
    _parallel: bool,
) -> VisearchResult<Vec<Vec<f64>>> {
    correlate_all_seq(stack, plans, params)
}

fn correlate_all_seq(
    stack: &FeatureStack,
    plans: &[SparsePlan],
    params: CorrParams,
) -> VisearchResult<Vec<Vec<f64>>> {
    plans
        .iter()
        .map(|plan| <ActiveKernel as CorrKernel>::correlate(stack, plan, params))
        .collect()
}

/// Per-prototype global maximum over all positions and scales.
pub fn c2b_responses(s2b: &FeatureHierarchy) -> Vec<f64> {
    let depth = s2b.levels().first().map_or(0, FeatureStack::depth);
    let mut best = vec![f64::NEG_INFINITY; depth];
    for stack in s2b.levels() {
        for (b, m) in best.iter_mut().zip(stack.channel_max()) {
            *b = b.max(m);
        }
    }
    best
}
