//! S1 layer: multi-scale oriented filtering with local-energy normalization.
//!
//! For each scale the image is circularly convolved with the four Gabor
//! kernels in the frequency domain, re-centred by `rf / 2`, divided by the
//! local energy of the image under an `rf x rf` window, rectified and
//! decimated with stride `round(rf / 4)`. The image spectrum is computed once
//! and shared across scales.

mod energy;
mod fft;

use crate::bank::{FilterBank, ScaleFilters};
use crate::config::Config;
use crate::feature::{FeatureHierarchy, FeatureStack};
use crate::image::{GrayImage, ImageView};
use crate::trace::{trace_event, trace_span};
use crate::util::math::round_half_even;
use crate::util::{FloatMode, VisearchError, VisearchResult};
use fft::Spectrum;
use rustfft::FftPlanner;
#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Decimation stride of the S1 output for a receptive field of `rf` pixels.
pub fn s1_stride(rf: usize) -> usize {
    round_half_even(rf as f64 / 4.0).max(1)
}

/// Runs the S1 layer over every scale of `bank`.
pub fn s1_layer(
    image: ImageView<'_, f64>,
    bank: &FilterBank,
    cfg: &Config,
) -> VisearchResult<FeatureHierarchy> {
    let height = image.height();
    let width = image.width();
    let _span = trace_span!("s1_layer", height = height, width = width, scales = bank.len()).entered();

    let mut pixels = GrayImage::from_view(image)?.data().to_vec();
    cfg.float_mode.sanitize("s1_input", &mut pixels)?;
    if let Some(rf) = bank.rf_sizes().into_iter().find(|&rf| rf > height || rf > width) {
        return Err(VisearchError::shape(
            "s1_layer",
            format!("receptive field {rf} exceeds image {width}x{height}"),
        ));
    }

    let mut planner = FftPlanner::new();
    let spectrum = Spectrum::forward(&mut planner, &pixels, height, width);
    let input = S1Input {
        pixels: &pixels,
        spectrum: &spectrum,
        height,
        width,
        sigma: cfg.sigma_s1,
        mode: cfg.float_mode,
    };

    let levels = run_scales(&input, bank, cfg.parallel)?;
    trace_event!("s1_done", scales = levels.len());
    FeatureHierarchy::new(levels, bank.rf_sizes())
}

struct S1Input<'a> {
    pixels: &'a [f64],
    spectrum: &'a Spectrum,
    height: usize,
    width: usize,
    sigma: f64,
    mode: FloatMode,
}

#[cfg(feature = "rayon")]
fn run_scales(
    input: &S1Input<'_>,
    bank: &FilterBank,
    parallel: bool,
) -> VisearchResult<Vec<FeatureStack>> {
    if parallel {
        return bank
            .scales()
            .par_iter()
            .map(|filters| {
                let mut planner = FftPlanner::new();
                s1_scale(input, filters, &mut planner)
            })
            .collect();
    }
    run_scales_seq(input, bank)
}

#[cfg(not(feature = "rayon"))]
fn run_scales(
    input: &S1Input<'_>,
    bank: &FilterBank,
    _parallel: bool,
) -> VisearchResult<Vec<FeatureStack>> {
    run_scales_seq(input, bank)
}

fn run_scales_seq(input: &S1Input<'_>, bank: &FilterBank) -> VisearchResult<Vec<FeatureStack>> {
    let mut planner = FftPlanner::new();
    bank.scales()
        .iter()
        .map(|filters| s1_scale(input, filters, &mut planner))
        .collect()
}

fn s1_scale(
    input: &S1Input<'_>,
    filters: &ScaleFilters,
    planner: &mut FftPlanner<f64>,
) -> VisearchResult<FeatureStack> {
    let (height, width) = (input.height, input.width);
    let rf = filters.rf_size();
    let shift = rf / 2;
    let stride = s1_stride(rf);

    let mut normalizer = energy::windowed_energy(input.pixels, height, width, rf);
    for v in normalizer.iter_mut() {
        *v = v.sqrt() + 1e-9 + input.sigma;
    }
    if normalizer.iter().any(|&v| !(v > 0.0)) {
        return Err(VisearchError::numeric("s1_normalizer", "normalizer is not strictly positive"));
    }

    let out_h = height.div_ceil(stride);
    let out_w = width.div_ceil(stride);
    let mut channels = Vec::with_capacity(4);
    for kernel in filters.kernels() {
        let kspec = Spectrum::of_padded_kernel(planner, kernel.weights(), rf, height, width);
        let conv = input.spectrum.convolve(planner, &kspec);

        let mut out = Vec::with_capacity(out_h * out_w);
        for y in (0..height).step_by(stride) {
            let src_y = (y + shift) % height;
            for x in (0..width).step_by(stride) {
                let src_x = (x + shift) % width;
                out.push((conv[src_y * width + src_x] / normalizer[y * width + x]).abs());
            }
        }
        input.mode.sanitize("s1_response", &mut out)?;
        channels.push(out);
    }

    FeatureStack::from_channels(out_h, out_w, channels)
}
