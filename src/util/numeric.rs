//! Floating-point execution mode for the numeric layers.
//!
//! Every stage that can produce NaN, infinity or an undefined division routes
//! the value through a [`FloatMode`]. `Trap` turns the violation into
//! [`VisearchError::NumericDomain`]; `Clamp` substitutes a neutral value and
//! emits a warn-level diagnostic.

use crate::trace::trace_warn;
use crate::util::{VisearchError, VisearchResult};

/// How numeric violations are handled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FloatMode {
    /// Fail the current cycle with a `NumericDomain` error.
    #[default]
    Trap,
    /// Replace the offending value and log a diagnostic.
    Clamp,
}

impl FloatMode {
    /// Verifies that all values are finite, zeroing offenders in clamp mode.
    pub(crate) fn sanitize(self, stage: &'static str, values: &mut [f64]) -> VisearchResult<()> {
        let bad = values.iter().filter(|v| !v.is_finite()).count();
        if bad == 0 {
            return Ok(());
        }
        match self {
            FloatMode::Trap => Err(VisearchError::numeric(
                stage,
                format!("{bad} non-finite values"),
            )),
            FloatMode::Clamp => {
                trace_warn!("non-finite values replaced with zero", stage = stage, count = bad);
                for v in values.iter_mut().filter(|v| !v.is_finite()) {
                    *v = 0.0;
                }
                Ok(())
            }
        }
    }

    /// Divides `num` by `den`; `fallback` is returned in clamp mode when the
    /// quotient is undefined.
    pub(crate) fn divide(
        self,
        stage: &'static str,
        num: f64,
        den: f64,
        fallback: f64,
    ) -> VisearchResult<f64> {
        let value = num / den;
        if den != 0.0 && value.is_finite() {
            return Ok(value);
        }
        match self {
            FloatMode::Trap => Err(VisearchError::numeric(
                stage,
                format!("undefined division {num} / {den}"),
            )),
            FloatMode::Clamp => {
                trace_warn!("undefined division replaced", stage = stage, fallback = fallback);
                Ok(fallback)
            }
        }
    }

    /// Enforces `|value| <= limit` up to a relative slack of `1e-9`.
    pub(crate) fn bound(self, stage: &'static str, value: f64, limit: f64) -> VisearchResult<f64> {
        if value.abs() <= limit * (1.0 + 1e-9) {
            return Ok(value);
        }
        match self {
            FloatMode::Trap => Err(VisearchError::numeric(
                stage,
                format!("value {value} exceeds bound {limit}"),
            )),
            FloatMode::Clamp => {
                trace_warn!("out-of-range value clamped", stage = stage, value = value);
                if value.is_nan() {
                    Ok(0.0)
                } else {
                    Ok(value.clamp(-limit, limit))
                }
            }
        }
    }
}
