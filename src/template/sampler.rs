//! Random prototype extraction from feature hierarchies.
//!
//! The random source is always passed in by the caller, so seeded runs are
//! reproducible. Degenerate draws are resampled up to
//! `Config::max_sampling_retries` times.

use crate::config::Config;
use crate::feature::FeatureHierarchy;
use crate::template::{PatchPrototype, VectorPrototype, IGNORED};
use crate::trace::trace_event;
use crate::util::math::l2_norm;
use crate::util::{VisearchError, VisearchResult};
use rand::seq::index;
use rand::Rng;

/// Number of coarsest scales vector prototypes and S3 similarity draw from.
pub const SIMILARITY_SCALES: usize = 2;

/// Cuts a sparse `size x size x depth` patch prototype from a random scale
/// and position of a C1 hierarchy.
///
/// `kept` cells are drawn uniformly over the whole cube and normalized by
/// their own L2 norm; all other cells are set to [`IGNORED`]. The chosen scale
/// must be strictly larger than `size` in both directions.
pub fn sample_patch<R: Rng + ?Sized>(
    c1: &FeatureHierarchy,
    size: usize,
    kept: usize,
    rng: &mut R,
    cfg: &Config,
) -> VisearchResult<PatchPrototype> {
    if size == 0 {
        return Err(VisearchError::shape("sample_patch", "prototype size must be positive"));
    }

    for attempt in 0..cfg.max_sampling_retries {
        let scale_idx = rng.random_range(0..c1.len());
        let stack = &c1.levels()[scale_idx];
        if stack.height() <= size || stack.width() <= size {
            return Err(VisearchError::shape(
                "sample_patch",
                format!(
                    "scale {scale_idx} is {}x{}, too small for a {size}x{size} prototype",
                    stack.width(),
                    stack.height()
                ),
            ));
        }
        let depth = stack.depth();
        let cells = size * size * depth;
        if kept == 0 || kept > cells {
            return Err(VisearchError::shape(
                "sample_patch",
                format!("cannot keep {kept} of {cells} cells"),
            ));
        }

        let top = rng.random_range(0..stack.height() - size);
        let left = rng.random_range(0..stack.width() - size);
        let mut cube = Vec::with_capacity(cells);
        for c in 0..depth {
            let channel = stack.channel(c);
            for row in 0..size {
                let start = (top + row) * stack.width() + left;
                cube.extend_from_slice(&channel[start..start + size]);
            }
        }

        let mut is_kept = vec![false; cells];
        for idx in index::sample(rng, cells, kept).iter() {
            is_kept[idx] = true;
        }
        let kept_values: Vec<f64> = cube
            .iter()
            .zip(&is_kept)
            .filter_map(|(&v, &k)| k.then_some(v))
            .collect();
        let norm = l2_norm(&kept_values);
        if !(norm > 0.0 && norm.is_finite()) {
            continue;
        }

        let weights = cube
            .into_iter()
            .zip(is_kept)
            .map(|(v, k)| if k { v / norm } else { IGNORED })
            .collect();
        trace_event!("patch_sampled", scale = scale_idx, attempts = attempt + 1);
        return PatchPrototype::from_weights(size, depth, weights);
    }

    Err(VisearchError::SamplingExhausted {
        attempts: cfg.max_sampling_retries,
        reason: "patch prototype kept cells have zero norm",
    })
}

/// Draws a dense vector prototype from one of the [`SIMILARITY_SCALES`]
/// coarsest scales of an S2b hierarchy.
///
/// Positions whose channel vector does not have a positive sum are rejected
/// and redrawn; the accepted vector is L2-normalized.
pub fn sample_vector<R: Rng + ?Sized>(
    s2b: &FeatureHierarchy,
    object_id: usize,
    rng: &mut R,
    cfg: &Config,
) -> VisearchResult<VectorPrototype> {
    let scales = s2b.coarsest(SIMILARITY_SCALES);
    let scale_idx = rng.random_range(scales);
    let stack = &s2b.levels()[scale_idx];
    for attempt in 0..cfg.max_sampling_retries {
        let y = rng.random_range(0..stack.height());
        let x = rng.random_range(0..stack.width());
        let vector = stack.vector_at(y, x);
        if vector.iter().sum::<f64>() <= 0.0 {
            continue;
        }
        let norm = l2_norm(&vector);
        let values = vector.into_iter().map(|v| v / norm).collect();
        trace_event!("vector_sampled", scale = scale_idx, attempts = attempt + 1);
        return Ok(VectorPrototype::new(object_id, scale_idx, values));
    }

    Err(VisearchError::SamplingExhausted {
        attempts: cfg.max_sampling_retries,
        reason: "no position with a positive channel sum",
    })
}

#[cfg(test)]
mod tests {
    use super::{sample_patch, sample_vector};
    use crate::config::Config;
    use crate::feature::{FeatureHierarchy, FeatureStack};
    use crate::template::IGNORED;
    use crate::VisearchError;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn ramp_hierarchy(size: usize) -> FeatureHierarchy {
        let stack = FeatureStack::from_fn(size, size, 4, |y, x, c| 1.0 + (y * 3 + x + c) as f64).unwrap();
        FeatureHierarchy::new(vec![stack], vec![7]).unwrap()
    }

    #[test]
    fn patch_has_unit_norm_over_kept_cells() {
        let mut rng = StdRng::seed_from_u64(7);
        let c1 = ramp_hierarchy(20);
        let proto = sample_patch(&c1, 5, 30, &mut rng, &Config::default()).unwrap();
        assert_eq!(proto.kept_count(), 30);
        let norm: f64 = proto
            .weights()
            .iter()
            .filter(|&&w| w != IGNORED)
            .map(|w| w * w)
            .sum::<f64>()
            .sqrt();
        assert!((norm - 1.0).abs() < 1e-12);
    }

    #[test]
    fn patch_rejects_small_scale() {
        let mut rng = StdRng::seed_from_u64(1);
        let c1 = ramp_hierarchy(9);
        let err = sample_patch(&c1, 9, 10, &mut rng, &Config::default()).unwrap_err();
        assert!(matches!(err, VisearchError::InputShape { .. }));
    }

    #[test]
    fn zero_maps_exhaust_sampling() {
        let mut rng = StdRng::seed_from_u64(3);
        let stack = FeatureStack::zeros(12, 12, 4).unwrap();
        let c1 = FeatureHierarchy::new(vec![stack], vec![7]).unwrap();
        let cfg = Config {
            max_sampling_retries: 5,
            ..Config::default()
        };
        let err = sample_patch(&c1, 3, 4, &mut rng, &cfg).unwrap_err();
        assert_eq!(
            err,
            VisearchError::SamplingExhausted {
                attempts: 5,
                reason: "patch prototype kept cells have zero norm",
            }
        );
        let s2b = FeatureHierarchy::new(vec![FeatureStack::zeros(4, 4, 3).unwrap()], vec![7]).unwrap();
        assert!(matches!(
            sample_vector(&s2b, 0, &mut rng, &cfg),
            Err(VisearchError::SamplingExhausted { attempts: 5, .. })
        ));
    }

    #[test]
    fn vector_is_normalized_and_tagged() {
        let mut rng = StdRng::seed_from_u64(11);
        let s2b = ramp_hierarchy(6);
        let proto = sample_vector(&s2b, 3, &mut rng, &Config::default()).unwrap();
        assert_eq!(proto.object_id(), 3);
        assert_eq!(proto.scale_idx(), 0);
        let norm: f64 = proto.values().iter().map(|v| v * v).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-12);
    }

    #[test]
    fn same_seed_gives_same_patch() {
        let c1 = ramp_hierarchy(16);
        let cfg = Config::default();
        let a = sample_patch(&c1, 4, 12, &mut StdRng::seed_from_u64(5), &cfg).unwrap();
        let b = sample_patch(&c1, 4, 12, &mut StdRng::seed_from_u64(5), &cfg).unwrap();
        assert_eq!(a, b);
    }
}
