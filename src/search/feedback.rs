//! Target-conditioned feedback gain.
//!
//! The C2b response of the target object is divided by the average response
//! of all objects, then shifted and scaled into `[1, 2]`: prototypes the
//! target excites more than average get the largest gain.

use crate::config::Config;
use crate::trace::trace_warn;
use crate::util::{FloatMode, VisearchError, VisearchResult};

/// C2b table: one per-prototype response vector per object.
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectResponses {
    rows: Vec<Vec<f64>>,
}

impl ObjectResponses {
    /// Wraps per-object responses; every row must have the same length.
    pub fn new(rows: Vec<Vec<f64>>) -> VisearchResult<Self> {
        let dim = rows
            .first()
            .map(Vec::len)
            .ok_or_else(|| VisearchError::shape("object_responses", "no objects"))?;
        if dim == 0 {
            return Err(VisearchError::shape("object_responses", "empty response vectors"));
        }
        if let Some(bad) = rows.iter().position(|r| r.len() != dim) {
            return Err(VisearchError::shape(
                "object_responses",
                format!("object {bad} has {} responses, expected {dim}", rows[bad].len()),
            ));
        }
        Ok(Self { rows })
    }

    /// Number of objects.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the table has no objects.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of prototypes per row.
    pub fn dim(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    /// Responses of one object.
    pub fn object(&self, object_id: usize) -> Option<&[f64]> {
        self.rows.get(object_id).map(Vec::as_slice)
    }

    /// Per-prototype mean over all objects.
    pub fn average(&self) -> Vec<f64> {
        let mut avg = vec![0.0; self.dim()];
        for row in &self.rows {
            for (a, v) in avg.iter_mut().zip(row) {
                *a += v;
            }
        }
        let n = self.rows.len() as f64;
        avg.iter_mut().for_each(|a| *a /= n);
        avg
    }
}

/// Computes the per-prototype feedback gain for `target`.
///
/// The result lies in `[1, 2]`. A zero average or a constant ratio makes the
/// normalization undefined: `NumericDomain` in trap mode, a flat gain of 1
/// with a diagnostic in clamp mode.
pub fn feedback_gain(
    responses: &ObjectResponses,
    target: usize,
    cfg: &Config,
) -> VisearchResult<Vec<f64>> {
    let row = responses.object(target).ok_or_else(|| {
        VisearchError::shape(
            "feedback_gain",
            format!("target {target} out of range for {} objects", responses.len()),
        )
    })?;

    match normalized_gain(row, &responses.average()) {
        Ok(gain) => Ok(gain),
        Err(reason) => match cfg.float_mode {
            FloatMode::Trap => Err(VisearchError::numeric("feedback_gain", reason)),
            FloatMode::Clamp => {
                trace_warn!("feedback gain replaced with 1", stage = "feedback_gain", target = target);
                Ok(vec![1.0; row.len()])
            }
        },
    }
}

fn normalized_gain(row: &[f64], avg: &[f64]) -> Result<Vec<f64>, String> {
    let mut gain = Vec::with_capacity(row.len());
    for (idx, (&r, &a)) in row.iter().zip(avg).enumerate() {
        let ratio = r / a;
        if a == 0.0 || !ratio.is_finite() {
            return Err(format!("undefined ratio {r} / {a} at prototype {idx}"));
        }
        gain.push(ratio);
    }

    let min = gain.iter().copied().fold(f64::INFINITY, f64::min);
    gain.iter_mut().for_each(|g| *g -= min);
    let max = gain.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !(max > 0.0) {
        return Err("ratio is constant across prototypes".to_string());
    }
    gain.iter_mut().for_each(|g| *g = *g / max + 1.0);
    Ok(gain)
}

#[cfg(test)]
mod tests {
    use super::{feedback_gain, ObjectResponses};
    use crate::config::Config;
    use crate::VisearchError;

    #[test]
    fn gain_spans_one_to_two() {
        let table = ObjectResponses::new(vec![vec![0.2, 0.4, 0.9], vec![0.6, 0.4, 0.1]]).unwrap();
        let gain = feedback_gain(&table, 0, &Config::default()).unwrap();
        // ratios 0.5, 1.0, 1.8
        let expected = [1.0, 1.0 + 0.5 / 1.3, 2.0];
        for (g, e) in gain.iter().zip(expected) {
            assert!((g - e).abs() < 1e-12);
        }
    }

    #[test]
    fn constant_ratio_traps_or_clamps() {
        let table = ObjectResponses::new(vec![vec![0.3, 0.6], vec![0.3, 0.6]]).unwrap();
        let err = feedback_gain(&table, 1, &Config::default()).unwrap_err();
        assert!(matches!(err, VisearchError::NumericDomain { .. }));
        let gain = feedback_gain(&table, 1, &Config::production()).unwrap();
        assert_eq!(gain, vec![1.0, 1.0]);
    }

    #[test]
    fn target_out_of_range() {
        let table = ObjectResponses::new(vec![vec![0.3, 0.6]]).unwrap();
        assert!(matches!(
            feedback_gain(&table, 1, &Config::default()),
            Err(VisearchError::InputShape { .. })
        ));
    }

    #[test]
    fn ragged_table_is_rejected() {
        assert!(ObjectResponses::new(vec![vec![0.3, 0.6], vec![0.1]]).is_err());
    }
}
