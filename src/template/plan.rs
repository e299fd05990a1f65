//! Sparse tap lists compiled from patch prototypes.

use crate::template::PatchPrototype;

/// One kept prototype cell with a positive weight.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tap {
    /// Row offset inside the receptive field.
    pub row: usize,
    /// Column offset inside the receptive field.
    pub col: usize,
    /// Feature channel.
    pub channel: usize,
    /// Normalized weight, always `> 0`.
    pub weight: f64,
}

/// Precomputed taps and weight statistics for sparse cross-correlation.
///
/// Only cells with a strictly positive weight are kept: ignored cells hold
/// the negative sentinel and zero weights contribute nothing to the match.
#[derive(Clone, Debug, PartialEq)]
pub struct SparsePlan {
    size: usize,
    depth: usize,
    taps: Vec<Tap>,
    weight_sum: f64,
    weight_sq_sum: f64,
}

impl SparsePlan {
    pub(crate) fn from_prototype(proto: &PatchPrototype) -> Self {
        let size = proto.size();
        let depth = proto.depth();
        let mut taps = Vec::new();
        for channel in 0..depth {
            for row in 0..size {
                for col in 0..size {
                    let weight = proto.weight(row, col, channel);
                    if weight > 0.0 {
                        taps.push(Tap {
                            row,
                            col,
                            channel,
                            weight,
                        });
                    }
                }
            }
        }
        let weight_sum = taps.iter().map(|t| t.weight).sum();
        let weight_sq_sum = taps.iter().map(|t| t.weight * t.weight).sum();
        Self {
            size,
            depth,
            taps,
            weight_sum,
            weight_sq_sum,
        }
    }

    /// Receptive-field side length.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of channels.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Taps ordered by channel, then row, then column.
    pub fn taps(&self) -> &[Tap] {
        &self.taps
    }

    /// Sum of tap weights.
    pub fn weight_sum(&self) -> f64 {
        self.weight_sum
    }

    /// Sum of squared tap weights.
    pub fn weight_sq_sum(&self) -> f64 {
        self.weight_sq_sum
    }

    /// True when no tap carries weight and the prototype cannot match anything.
    pub fn is_degenerate(&self) -> bool {
        self.weight_sum < 1e-12
    }
}
