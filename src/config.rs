//! Model configuration shared by every layer.
//!
//! A `Config` is an immutable value built once and passed by reference into
//! each component; nothing reads process-wide state.

use crate::util::{FloatMode, VisearchError, VisearchResult};

/// Configuration for the feature hierarchy and the attention loop.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// S1 receptive-field sizes, one per scale, in increasing order.
    pub scale_sizes: Vec<usize>,
    /// Window of the C1 sliding maximum.
    pub pool_size: usize,
    /// Side length of sampled patch prototypes.
    pub prototype_size: usize,
    /// Number of kept (non-ignored) cells per patch prototype.
    pub num_kept_weights: usize,
    /// Number of patch prototypes sampled from natural images.
    pub num_patch_prototypes: usize,
    /// Number of vector prototypes sampled per object.
    pub num_vector_prototypes_per_object: usize,
    /// Floor added to the S1 local-energy normalizer.
    pub sigma_s1: f64,
    /// Constant added to the S2b correlation denominator.
    pub sigma_s2b: f64,
    /// Stabilizer added to the channel sum in LIP normalization.
    pub lip_norm: f64,
    /// Inhibition-of-return gain `k`; the map is scaled by `1 - k` at the fixation.
    pub inhibition_gain: f64,
    /// Inhibition-of-return Gaussian sigma in image pixels.
    pub inhibition_sigma: f64,
    /// Retry budget for degenerate random samples.
    pub max_sampling_retries: usize,
    /// Handling of NaN/Inf/undefined divisions.
    pub float_mode: FloatMode,
    /// Run data-independent stages on the rayon pool (requires the `rayon` feature).
    pub parallel: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scale_sizes: (0..12).map(|i| 7 + 2 * i).collect(),
            pool_size: 9,
            prototype_size: 9,
            num_kept_weights: 100,
            num_patch_prototypes: 600,
            num_vector_prototypes_per_object: 2,
            sigma_s1: 1e-2,
            sigma_s2b: 1e-3,
            lip_norm: 1.0,
            inhibition_gain: 0.2,
            inhibition_sigma: 16.667,
            max_sampling_retries: 1000,
            float_mode: FloatMode::Trap,
            parallel: false,
        }
    }
}

impl Config {
    /// Returns a copy of the defaults tuned for long-running use: numeric
    /// violations are clamped and logged instead of aborting.
    pub fn production() -> Self {
        Self {
            float_mode: FloatMode::Clamp,
            ..Self::default()
        }
    }

    /// Checks the configuration for malformed values.
    pub fn validate(&self) -> VisearchResult<()> {
        let fail = |reason: &str| Err(VisearchError::shape("config", reason));
        if self.scale_sizes.is_empty() {
            return fail("scale_sizes must not be empty");
        }
        if self.scale_sizes.iter().any(|&s| s == 0) {
            return fail("scale_sizes must be positive");
        }
        if self.pool_size == 0 {
            return fail("pool_size must be positive");
        }
        if self.prototype_size == 0 {
            return fail("prototype_size must be positive");
        }
        if self.num_kept_weights == 0 {
            return fail("num_kept_weights must be positive");
        }
        let floats = [
            ("sigma_s1", self.sigma_s1),
            ("sigma_s2b", self.sigma_s2b),
            ("lip_norm", self.lip_norm),
            ("inhibition_gain", self.inhibition_gain),
        ];
        for (name, value) in floats {
            if !value.is_finite() || value < 0.0 {
                return Err(VisearchError::shape(
                    "config",
                    format!("{name} must be finite and non-negative"),
                ));
            }
        }
        if !self.inhibition_sigma.is_finite() || self.inhibition_sigma <= 0.0 {
            return fail("inhibition_sigma must be finite and positive");
        }
        if self.max_sampling_retries == 0 {
            return fail("max_sampling_retries must be positive");
        }
        Ok(())
    }
}
