//! Mathematical helpers shared by the feature layers.

/// Rounds half to even and converts to an index, as numpy's `round` does.
pub(crate) fn round_half_even(value: f64) -> usize {
    let rounded = value.round_ties_even();
    if rounded <= 0.0 {
        0
    } else {
        rounded as usize
    }
}

/// Maps a possibly out-of-range index onto `[0, n)` with half-sample
/// symmetric reflection (`d c b a | a b c d | d c b a`).
pub(crate) fn reflect_index(index: isize, n: usize) -> usize {
    let n = n as isize;
    let period = 2 * n;
    let m = index.rem_euclid(period);
    if m < n {
        m as usize
    } else {
        (period - 1 - m) as usize
    }
}

/// Euclidean norm of a slice.
pub(crate) fn l2_norm(values: &[f64]) -> f64 {
    values.iter().map(|v| v * v).sum::<f64>().sqrt()
}

/// Arithmetic mean, `None` for an empty slice.
pub(crate) fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Pearson correlation coefficient.
///
/// Returns `None` when either input has zero variance, where the coefficient
/// is undefined.
pub(crate) fn pearson(a: &[f64], b: &[f64]) -> Option<f64> {
    debug_assert_eq!(a.len(), b.len());
    let mean_a = mean(a)?;
    let mean_b = mean(b)?;
    let mut cov = 0.0f64;
    let mut var_a = 0.0f64;
    let mut var_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }
    if var_a <= 0.0 || var_b <= 0.0 {
        return None;
    }
    let r = cov / (var_a.sqrt() * var_b.sqrt());
    if r.is_finite() {
        Some(r.clamp(-1.0, 1.0))
    } else {
        None
    }
}

/// Peak-normalized isotropic Gaussian: 1 at the centre.
pub(crate) fn gaussian_falloff(dx: f64, dy: f64, sigma: f64) -> f64 {
    (-(dx * dx + dy * dy) / (2.0 * sigma * sigma)).exp()
}

/// Index of the maximum value; the first occurrence wins ties.
pub(crate) fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, &v) in values.iter().enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((idx, v)),
        }
    }
    best.map(|(idx, _)| idx)
}

#[cfg(test)]
mod tests {
    use super::{argmax, gaussian_falloff, pearson, reflect_index, round_half_even};

    #[test]
    fn round_half_even_matches_numpy() {
        assert_eq!(round_half_even(1.75), 2);
        assert_eq!(round_half_even(2.25), 2);
        assert_eq!(round_half_even(2.5), 2);
        assert_eq!(round_half_even(3.5), 4);
        assert_eq!(round_half_even(-1.0), 0);
    }

    #[test]
    fn reflect_index_mirrors_edges() {
        assert_eq!(reflect_index(-1, 4), 0);
        assert_eq!(reflect_index(-2, 4), 1);
        assert_eq!(reflect_index(4, 4), 3);
        assert_eq!(reflect_index(5, 4), 2);
        assert_eq!(reflect_index(9, 4), 1);
        assert_eq!(reflect_index(2, 4), 2);
    }

    #[test]
    fn pearson_is_scale_invariant_and_undefined_for_constants() {
        let a = [1.0, 2.0, 4.0, 8.0];
        let b = [3.0, 6.0, 12.0, 24.0];
        assert!((pearson(&a, &b).unwrap() - 1.0).abs() < 1e-12);
        let c = [-1.0, -2.0, -4.0, -8.0];
        assert!((pearson(&a, &c).unwrap() + 1.0).abs() < 1e-12);
        assert!(pearson(&a, &[5.0; 4]).is_none());
    }

    #[test]
    fn argmax_prefers_first_occurrence() {
        assert_eq!(argmax(&[0.1, 0.5, 0.5, 0.2]), Some(1));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn gaussian_is_one_at_centre() {
        assert_eq!(gaussian_falloff(0.0, 0.0, 3.0), 1.0);
        assert!(gaussian_falloff(3.0, 0.0, 3.0) < 1.0);
    }
}
