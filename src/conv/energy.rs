//! Local-energy normalizer for S1 responses.

use crate::util::math::reflect_index;

/// Box sum of `values²` over a `size x size` window with reflect boundary.
///
/// Window offsets along each axis are `[-(size / 2), size - 1 - size / 2]`.
/// Negative round-off is floored to zero.
pub(crate) fn windowed_energy(values: &[f64], height: usize, width: usize, size: usize) -> Vec<f64> {
    let squared: Vec<f64> = values.iter().map(|v| v * v).collect();
    let lo = (size / 2) as isize;
    let hi = size as isize - 1 - lo;

    let mut rows = vec![0.0f64; height * width];
    for y in 0..height {
        let line = &squared[y * width..(y + 1) * width];
        for x in 0..width {
            let mut acc = 0.0;
            for d in -lo..=hi {
                acc += line[reflect_index(x as isize + d, width)];
            }
            rows[y * width + x] = acc;
        }
    }

    let mut out = vec![0.0f64; height * width];
    for y in 0..height {
        for x in 0..width {
            let mut acc = 0.0;
            for d in -lo..=hi {
                acc += rows[reflect_index(y as isize + d, height) * width + x];
            }
            out[y * width + x] = acc.max(0.0);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::windowed_energy;
    use crate::util::math::reflect_index;

    #[test]
    fn separable_sum_matches_brute_force() {
        let (h, w, size) = (5, 7, 4);
        let img: Vec<f64> = (0..h * w).map(|i| (i % 5) as f64 - 1.5).collect();
        let got = windowed_energy(&img, h, w, size);
        for y in 0..h {
            for x in 0..w {
                let mut want = 0.0;
                for dy in -2isize..=1 {
                    for dx in -2isize..=1 {
                        let yy = reflect_index(y as isize + dy, h);
                        let xx = reflect_index(x as isize + dx, w);
                        want += img[yy * w + xx].powi(2);
                    }
                }
                assert!((got[y * w + x] - want).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn constant_image_energy_is_window_area() {
        let img = vec![2.0; 36];
        let got = windowed_energy(&img, 6, 6, 3);
        assert!(got.iter().all(|&v| (v - 36.0).abs() < 1e-12));
    }
}
