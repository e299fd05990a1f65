//! Frequency-domain 2D circular convolution.

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

/// Forward 2D spectrum of a real `height x width` map.
pub(crate) struct Spectrum {
    height: usize,
    width: usize,
    bins: Vec<Complex<f64>>,
}

impl Spectrum {
    /// Transforms a row-major real buffer.
    pub(crate) fn forward(
        planner: &mut FftPlanner<f64>,
        values: &[f64],
        height: usize,
        width: usize,
    ) -> Self {
        let mut bins: Vec<Complex<f64>> = values.iter().map(|&v| Complex::new(v, 0.0)).collect();
        transform_2d(planner, &mut bins, height, width, false);
        Self {
            height,
            width,
            bins,
        }
    }

    /// Zero-pads `kernel` (`size x size`, top-left aligned) to the spectrum
    /// shape and transforms it.
    pub(crate) fn of_padded_kernel(
        planner: &mut FftPlanner<f64>,
        kernel: &[f64],
        size: usize,
        height: usize,
        width: usize,
    ) -> Self {
        let mut padded = vec![0.0f64; height * width];
        for row in 0..size.min(height) {
            for col in 0..size.min(width) {
                padded[row * width + col] = kernel[row * size + col];
            }
        }
        Self::forward(planner, &padded, height, width)
    }

    /// Pointwise product with `other`, inverse-transformed to a real map.
    pub(crate) fn convolve(&self, planner: &mut FftPlanner<f64>, other: &Spectrum) -> Vec<f64> {
        debug_assert_eq!((self.height, self.width), (other.height, other.width));
        let mut bins: Vec<Complex<f64>> = self
            .bins
            .iter()
            .zip(&other.bins)
            .map(|(a, b)| a * b)
            .collect();
        transform_2d(planner, &mut bins, self.height, self.width, true);
        let scale = 1.0 / (self.height * self.width) as f64;
        bins.iter().map(|c| c.re * scale).collect()
    }
}

/// Row transforms followed by column transforms (through a transpose).
fn transform_2d(
    planner: &mut FftPlanner<f64>,
    bins: &mut [Complex<f64>],
    height: usize,
    width: usize,
    inverse: bool,
) {
    let row_fft = if inverse {
        planner.plan_fft_inverse(width)
    } else {
        planner.plan_fft_forward(width)
    };
    row_fft.process(bins);

    let mut transposed = vec![Complex::new(0.0, 0.0); height * width];
    for y in 0..height {
        for x in 0..width {
            transposed[x * height + y] = bins[y * width + x];
        }
    }
    let col_fft = if inverse {
        planner.plan_fft_inverse(height)
    } else {
        planner.plan_fft_forward(height)
    };
    col_fft.process(&mut transposed);
    for x in 0..width {
        for y in 0..height {
            bins[y * width + x] = transposed[x * height + y];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Spectrum;
    use rustfft::FftPlanner;

    fn circular_direct(img: &[f64], h: usize, w: usize, k: &[f64], size: usize) -> Vec<f64> {
        let mut out = vec![0.0; h * w];
        for i in 0..h {
            for j in 0..w {
                let mut acc = 0.0;
                for a in 0..size {
                    for b in 0..size {
                        let y = (i + h - a % h) % h;
                        let x = (j + w - b % w) % w;
                        acc += k[a * size + b] * img[y * w + x];
                    }
                }
                out[i * w + j] = acc;
            }
        }
        out
    }

    #[test]
    fn fft_convolution_matches_direct_circular_sum() {
        let (h, w, size) = (6, 5, 3);
        let img: Vec<f64> = (0..h * w).map(|i| ((i * 7) % 11) as f64 - 3.0).collect();
        let k: Vec<f64> = (0..size * size).map(|i| (i as f64) * 0.5 - 1.0).collect();

        let mut planner = FftPlanner::new();
        let si = Spectrum::forward(&mut planner, &img, h, w);
        let sk = Spectrum::of_padded_kernel(&mut planner, &k, size, h, w);
        let got = si.convolve(&mut planner, &sk);
        let want = circular_direct(&img, h, w, &k, size);
        for (g, e) in got.iter().zip(&want) {
            assert!((g - e).abs() < 1e-9, "{g} vs {e}");
        }
    }
}
