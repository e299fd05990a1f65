//! S1 filter bank: one set of oriented Gabor kernels per scale.
//!
//! The bank is built once from the configured receptive-field sizes and is
//! shared read-only by every convolution call.

mod gabor;

pub use gabor::{gabor_sigma, GaborKernel, ORIENTATIONS_DEG};

use crate::trace::{trace_event, trace_span};
use crate::util::{VisearchError, VisearchResult};

/// The kernels of one scale, one per orientation.
#[derive(Clone, Debug, PartialEq)]
pub struct ScaleFilters {
    rf_size: usize,
    kernels: [GaborKernel; 4],
}

impl ScaleFilters {
    /// Receptive-field size shared by all kernels of the scale.
    pub fn rf_size(&self) -> usize {
        self.rf_size
    }

    /// Kernels ordered as [`ORIENTATIONS_DEG`].
    pub fn kernels(&self) -> &[GaborKernel; 4] {
        &self.kernels
    }
}

/// Immutable set of S1 kernels, finest scale first.
#[derive(Clone, Debug, PartialEq)]
pub struct FilterBank {
    scales: Vec<ScaleFilters>,
}

impl FilterBank {
    /// Builds kernels for every receptive-field size and orientation.
    pub fn build(scale_sizes: &[usize]) -> VisearchResult<Self> {
        if scale_sizes.is_empty() {
            return Err(VisearchError::shape("filter_bank", "no scale sizes"));
        }
        let _span = trace_span!("filter_bank", scales = scale_sizes.len()).entered();

        let mut scales = Vec::with_capacity(scale_sizes.len());
        for (scale_idx, &rf_size) in scale_sizes.iter().enumerate() {
            let [a, b, c, d] = ORIENTATIONS_DEG;
            let kernels = [
                GaborKernel::new(rf_size, scale_idx, a)?,
                GaborKernel::new(rf_size, scale_idx, b)?,
                GaborKernel::new(rf_size, scale_idx, c)?,
                GaborKernel::new(rf_size, scale_idx, d)?,
            ];
            scales.push(ScaleFilters { rf_size, kernels });
        }

        trace_event!("filter_bank_built", kernels = scales.len() * 4);
        Ok(Self { scales })
    }

    /// Number of scales.
    pub fn len(&self) -> usize {
        self.scales.len()
    }

    /// Returns true if the bank has no scales.
    pub fn is_empty(&self) -> bool {
        self.scales.is_empty()
    }

    /// Per-scale kernel sets.
    pub fn scales(&self) -> &[ScaleFilters] {
        &self.scales
    }

    /// Receptive-field sizes in scale order.
    pub fn rf_sizes(&self) -> Vec<usize> {
        self.scales.iter().map(ScaleFilters::rf_size).collect()
    }
}
