//! Rayon-parallel prototype matching (feature-gated).
//!
//! Prototypes are independent, so each one is correlated on its own task and
//! the maps are collected in prototype order.

use crate::feature::FeatureStack;
use crate::kernel::{CorrKernel, CorrParams};
use crate::template::SparsePlan;
use crate::util::VisearchResult;
use rayon::prelude::*;

/// Correlates every plan against `stack` in parallel.
pub fn correlate_all_par<K: CorrKernel>(
    stack: &FeatureStack,
    plans: &[SparsePlan],
    params: CorrParams,
) -> VisearchResult<Vec<Vec<f64>>> {
    plans
        .par_iter()
        .map(|plan| K::correlate(stack, plan, params))
        .collect()
}
