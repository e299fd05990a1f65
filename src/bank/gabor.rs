//! Oriented Gabor kernel construction.

use crate::util::{VisearchError, VisearchResult};

/// Orientations (degrees) built for every scale.
pub const ORIENTATIONS_DEG: [f64; 4] = [45.0, 90.0, 135.0, 180.0];

/// Aspect ratio of the Gaussian envelope.
const GAMMA: f64 = 0.3;

/// A square oriented band-pass kernel for one scale.
///
/// Cells outside the circular receptive field are exactly zero; the support
/// has zero mean and unit L2 norm.
#[derive(Clone, Debug, PartialEq)]
pub struct GaborKernel {
    size: usize,
    scale_idx: usize,
    orientation_deg: f64,
    weights: Vec<f64>,
}

impl GaborKernel {
    /// Builds the kernel for receptive field `size` at `orientation_deg`.
    pub fn new(size: usize, scale_idx: usize, orientation_deg: f64) -> VisearchResult<Self> {
        if size == 0 {
            return Err(VisearchError::shape(
                "filter_bank",
                "receptive field size must be positive",
            ));
        }

        let sigma = gabor_sigma(size);
        let lambda = sigma / 0.8;
        let (sin_t, cos_t) = orientation_deg.to_radians().sin_cos();
        let half = (size / 2) as isize;
        let radius = (size / 2) as f64;

        let mut weights = vec![0.0f64; size * size];
        let mut support = Vec::with_capacity(size * size);
        for row in 0..size {
            for col in 0..size {
                let x = (row as isize - half) as f64;
                let y = (col as isize - half) as f64;
                if (x * x + y * y).sqrt() > radius {
                    continue;
                }
                let xr = x * cos_t + y * sin_t;
                let yr = -x * sin_t + y * cos_t;
                let envelope = (-(xr * xr + GAMMA * GAMMA * yr * yr) / (2.0 * sigma * sigma)).exp();
                let idx = row * size + col;
                weights[idx] = envelope * (2.0 * std::f64::consts::PI * xr / lambda).cos();
                support.push(idx);
            }
        }

        let mean = support.iter().map(|&i| weights[i]).sum::<f64>() / support.len() as f64;
        for &i in &support {
            weights[i] -= mean;
        }
        let norm = support.iter().map(|&i| weights[i] * weights[i]).sum::<f64>().sqrt();
        if !(norm > 0.0 && norm.is_finite()) {
            return Err(VisearchError::numeric(
                "filter_bank",
                format!("kernel of size {size} has zero norm"),
            ));
        }
        for &i in &support {
            weights[i] /= norm;
        }

        Ok(Self {
            size,
            scale_idx,
            orientation_deg,
            weights,
        })
    }

    /// Side length in pixels.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Index of the scale this kernel belongs to.
    pub fn scale_idx(&self) -> usize {
        self.scale_idx
    }

    /// Orientation in degrees.
    pub fn orientation_deg(&self) -> f64 {
        self.orientation_deg
    }

    /// Row-major kernel weights.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }
}

/// Envelope width for a receptive field of `size` pixels.
pub fn gabor_sigma(size: usize) -> f64 {
    let rf = size as f64;
    0.0036 * rf * rf + 0.35 * rf + 0.18
}
