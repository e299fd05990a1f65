//! S3 vector similarity and the C3 decision.
//!
//! Only the coarsest scales of the S2b hierarchy take part. Every position
//! vector is compared with each prototype of an object by Pearson
//! correlation; undefined comparisons (zero variance) are skipped and cells
//! without any defined comparison do not count towards the averages.

use crate::config::Config;
use crate::feature::FeatureHierarchy;
use crate::template::sampler::SIMILARITY_SCALES;
use crate::template::{ObjectPrototypeSet, VectorPrototype};
use crate::trace::{trace_event, trace_span};
use crate::util::math::{argmax, mean, pearson};
use crate::util::{VisearchError, VisearchResult};
#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Position vectors of one scale, already divided by the stack norm.
type ScaleVectors = Vec<Vec<f64>>;

/// Scores every object against an S2b hierarchy.
///
/// The score of an object is the mean over scales of the mean over positions
/// of the mean Pearson correlation with the object's prototypes. An object
/// with no defined comparison anywhere scores `0.0`.
pub fn s3_scores(
    s2b: &FeatureHierarchy,
    objects: &ObjectPrototypeSet,
    cfg: &Config,
) -> VisearchResult<Vec<f64>> {
    let _span = trace_span!("s3_scores", objects = objects.len()).entered();
    if objects.is_empty() {
        return Err(VisearchError::shape("s3_scores", "empty object prototype set"));
    }

    let mut scales: Vec<ScaleVectors> = Vec::new();
    for scale_idx in s2b.coarsest(SIMILARITY_SCALES) {
        let stack = &s2b.levels()[scale_idx];
        if stack.depth() != objects.dim() {
            return Err(VisearchError::shape(
                "s3_scores",
                format!(
                    "scale {scale_idx} has depth {} but prototypes have length {}",
                    stack.depth(),
                    objects.dim()
                ),
            ));
        }
        let norm = stack.l2_norm();
        let mut vectors = Vec::with_capacity(stack.height() * stack.width());
        for y in 0..stack.height() {
            for x in 0..stack.width() {
                let mut v = stack.vector_at(y, x);
                if norm > 0.0 {
                    v.iter_mut().for_each(|c| *c /= norm);
                }
                vectors.push(v);
            }
        }
        scales.push(vectors);
    }

    let scores = score_objects(&scales, objects, cfg.parallel);
    trace_event!("s3_done", objects = scores.len());
    Ok(scores)
}

#[cfg(feature = "rayon")]
fn score_objects(scales: &[ScaleVectors], objects: &ObjectPrototypeSet, parallel: bool) -> Vec<f64> {
    if parallel {
        let lists: Vec<&[VectorPrototype]> = objects.iter().collect();
        return lists
            .par_iter()
            .map(|protos| object_score(scales, protos))
            .collect();
    }
    objects.iter().map(|protos| object_score(scales, protos)).collect()
}

#[cfg(not(feature = "rayon"))]
fn score_objects(scales: &[ScaleVectors], objects: &ObjectPrototypeSet, _parallel: bool) -> Vec<f64> {
    objects.iter().map(|protos| object_score(scales, protos)).collect()
}

fn object_score(scales: &[ScaleVectors], protos: &[VectorPrototype]) -> f64 {
    let scale_means: Vec<f64> = scales
        .iter()
        .filter_map(|positions| {
            let cells: Vec<f64> = positions
                .iter()
                .filter_map(|v| {
                    let defined: Vec<f64> = protos
                        .iter()
                        .filter_map(|p| pearson(v, p.values()))
                        .collect();
                    mean(&defined)
                })
                .collect();
            mean(&cells)
        })
        .collect();
    mean(&scale_means).unwrap_or(0.0)
}

/// Index of the best-scoring object; the first occurrence wins ties.
pub fn c3_decision(scores: &[f64]) -> VisearchResult<usize> {
    argmax(scores).ok_or_else(|| VisearchError::shape("c3_decision", "no scores"))
}
