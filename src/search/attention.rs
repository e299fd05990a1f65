//! Attention map: top-down modulation, image-space priority and inhibition
//! of return.

use crate::config::Config;
use crate::feature::{FeatureHierarchy, FeatureStack};
use crate::image::ImageView;
use crate::trace::{trace_event, trace_span};
use crate::util::math::{argmax, gaussian_falloff, round_half_even};
use crate::util::{VisearchError, VisearchResult};
#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// A fixation in image coordinates: `x` is the column, `y` the row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fixation {
    pub x: usize,
    pub y: usize,
}

/// Image-resolution priority map, row-major.
///
/// Pixels that no scale cell projects onto hold `0.0`.
#[derive(Clone, Debug, PartialEq)]
pub struct PriorityMap {
    width: usize,
    height: usize,
    data: Vec<f64>,
}

impl PriorityMap {
    /// Wraps row-major values.
    pub fn from_vec(width: usize, height: usize, data: Vec<f64>) -> VisearchResult<Self> {
        let needed = width
            .checked_mul(height)
            .filter(|&n| n > 0)
            .ok_or(VisearchError::InvalidDimensions { width, height })?;
        if data.len() != needed {
            return Err(VisearchError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Returns the map width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the map height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Priority at column `x`, row `y`.
    pub fn get(&self, x: usize, y: usize) -> Option<f64> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data.get(y * self.width + x).copied()
    }

    /// Row-major values.
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Borrowed view of the map.
    pub fn view(&self) -> VisearchResult<ImageView<'_, f64>> {
        ImageView::from_slice(&self.data, self.width, self.height)
    }

    /// Copy divided by the largest absolute value; all-zero maps are returned
    /// unchanged.
    pub fn scaled_to_peak(&self) -> PriorityMap {
        let peak = self.data.iter().fold(0.0f64, |m, v| m.max(v.abs()));
        let mut out = self.clone();
        if peak > 0.0 {
            out.data.iter_mut().for_each(|v| *v /= peak);
        }
        out
    }

    /// Location of the maximum; the first in row-major order wins ties.
    pub fn peak(&self) -> Option<Fixation> {
        argmax(&self.data).map(|idx| Fixation {
            x: idx % self.width,
            y: idx / self.width,
        })
    }
}

/// Applies the feedback gain to every S2b scale and normalizes by the
/// channel sum: `lip = s2b * gain[c] / (sum_c s2b + lip_norm)`.
pub fn top_down_modulation(
    s2b: &FeatureHierarchy,
    gain: &[f64],
    cfg: &Config,
) -> VisearchResult<FeatureHierarchy> {
    let mut levels = Vec::with_capacity(s2b.len());
    for stack in s2b.levels() {
        if stack.depth() != gain.len() {
            return Err(VisearchError::shape(
                "top_down_modulation",
                format!("gain has {} entries for depth {}", gain.len(), stack.depth()),
            ));
        }
        let denom: Vec<f64> = stack
            .channel_sum()
            .into_iter()
            .map(|s| s + cfg.lip_norm)
            .collect();
        let mut lip = stack.clone();
        for (c, &g) in gain.iter().enumerate() {
            for (v, &d) in lip.channel_mut(c).iter_mut().zip(&denom) {
                *v = cfg.float_mode.divide("lip_map", *v * g, d, 0.0)?;
            }
        }
        levels.push(lip);
    }
    FeatureHierarchy::new(levels, s2b.rf_sizes().to_vec())
}

/// Distance between the image blocks of neighbouring cells of a scale with
/// receptive field `rf`.
pub fn projection_step(rf: usize) -> usize {
    round_half_even(0.75 * rf as f64).max(1)
}

struct Contribution {
    sum: Vec<f64>,
    count: Vec<u32>,
}

/// Projects a LIP hierarchy back into a `width x height` priority map.
///
/// Each cell's channel sum is spread over an `rf x rf` block of the image and
/// every pixel ends up as the mean of the values that reached it.
pub fn priority_map(
    lip: &FeatureHierarchy,
    width: usize,
    height: usize,
    cfg: &Config,
) -> VisearchResult<PriorityMap> {
    let _span = trace_span!("priority_map", width = width, height = height).entered();
    if width == 0 || height == 0 {
        return Err(VisearchError::InvalidDimensions { width, height });
    }

    let mut sum = vec![0.0f64; width * height];
    let mut count = vec![0u32; width * height];
    // Scale order is fixed so parallel and sequential sums agree.
    for part in scale_contributions(lip, width, height, cfg.parallel) {
        for (s, p) in sum.iter_mut().zip(&part.sum) {
            *s += p;
        }
        for (c, p) in count.iter_mut().zip(&part.count) {
            *c += p;
        }
    }

    let mut data: Vec<f64> = sum
        .iter()
        .zip(&count)
        .map(|(&s, &n)| if n == 0 { 0.0 } else { s / f64::from(n) })
        .collect();
    cfg.float_mode.sanitize("priority_map", &mut data)?;
    let covered = count.iter().filter(|&&n| n > 0).count();
    trace_event!("priority_map_done", covered = covered);
    PriorityMap::from_vec(width, height, data)
}

#[cfg(feature = "rayon")]
fn scale_contributions(
    lip: &FeatureHierarchy,
    width: usize,
    height: usize,
    parallel: bool,
) -> Vec<Contribution> {
    let scales: Vec<(usize, &FeatureStack)> = lip.iter().collect();
    if parallel {
        return scales
            .par_iter()
            .map(|&(rf, stack)| scale_contribution(stack, rf, width, height))
            .collect();
    }
    scales
        .into_iter()
        .map(|(rf, stack)| scale_contribution(stack, rf, width, height))
        .collect()
}

#[cfg(not(feature = "rayon"))]
fn scale_contributions(
    lip: &FeatureHierarchy,
    width: usize,
    height: usize,
    _parallel: bool,
) -> Vec<Contribution> {
    lip.iter()
        .map(|(rf, stack)| scale_contribution(stack, rf, width, height))
        .collect()
}

fn scale_contribution(stack: &FeatureStack, rf: usize, width: usize, height: usize) -> Contribution {
    let mut part = Contribution {
        sum: vec![0.0; width * height],
        count: vec![0; width * height],
    };
    let step = projection_step(rf);
    let cells = stack.channel_sum();
    for i in 0..stack.height() {
        let top = i * step;
        if top >= height {
            break;
        }
        for j in 0..stack.width() {
            let left = j * step;
            if left >= width {
                break;
            }
            let value = cells[i * stack.width() + j];
            for y in top..(top + rf).min(height) {
                let row = y * width;
                for x in left..(left + rf).min(width) {
                    part.sum[row + x] += value;
                    part.count[row + x] += 1;
                }
            }
        }
    }
    part
}

/// Picks the fixation at the map maximum and suppresses its surroundings.
///
/// The map is multiplied by `1 - k * exp(-d² / (2 sigma²))`, so the factor at
/// the fixation itself is exactly `1 - k`.
pub fn inhibition_of_return(map: &mut PriorityMap, k: f64, sigma: f64) -> VisearchResult<Fixation> {
    let fixation = map
        .peak()
        .ok_or_else(|| VisearchError::shape("inhibition_of_return", "empty priority map"))?;
    let (fx, fy) = (fixation.x as f64, fixation.y as f64);
    let width = map.width;
    for (idx, v) in map.data.iter_mut().enumerate() {
        let dx = (idx % width) as f64 - fx;
        let dy = (idx / width) as f64 - fy;
        *v *= 1.0 - k * gaussian_falloff(dx, dy, sigma);
    }
    Ok(fixation)
}

/// Resamples the priority map to every scale and multiplies each channel by
/// it, carrying the current suppression into the next cycle.
pub fn modulate_by_priority(
    s2b: &FeatureHierarchy,
    map: &PriorityMap,
) -> VisearchResult<FeatureHierarchy> {
    let mut levels = Vec::with_capacity(s2b.len());
    for stack in s2b.levels() {
        let weights = resize_bilinear(map, stack.width(), stack.height());
        let mut out = stack.clone();
        for c in 0..out.depth() {
            for (v, w) in out.channel_mut(c).iter_mut().zip(&weights) {
                *v *= w;
            }
        }
        levels.push(out);
    }
    FeatureHierarchy::new(levels, s2b.rf_sizes().to_vec())
}

/// Bilinear resampling with pixel-centre alignment and edge clamping.
fn resize_bilinear(map: &PriorityMap, out_w: usize, out_h: usize) -> Vec<f64> {
    let axis = |out: usize, len: usize| -> Vec<(usize, usize, f64)> {
        let scale = len as f64 / out as f64;
        (0..out)
            .map(|o| {
                let pos = ((o as f64 + 0.5) * scale - 0.5).clamp(0.0, (len - 1) as f64);
                let lo = pos.floor() as usize;
                let hi = (lo + 1).min(len - 1);
                (lo, hi, pos - lo as f64)
            })
            .collect()
    };
    let rows = axis(out_h, map.height);
    let cols = axis(out_w, map.width);
    let at = |x: usize, y: usize| map.data[y * map.width + x];

    let mut out = Vec::with_capacity(out_w * out_h);
    for &(y0, y1, ty) in &rows {
        for &(x0, x1, tx) in &cols {
            let top = at(x0, y0) * (1.0 - tx) + at(x1, y0) * tx;
            let bottom = at(x0, y1) * (1.0 - tx) + at(x1, y1) * tx;
            out.push(top * (1.0 - ty) + bottom * ty);
        }
    }
    out
}

/// Mean over scales of the per-prototype responses at the fixation mapped
/// into each scale's grid.
pub fn responses_at_fixation(
    s2b: &FeatureHierarchy,
    fixation: Fixation,
    width: usize,
    height: usize,
) -> VisearchResult<Vec<f64>> {
    if fixation.x >= width || fixation.y >= height {
        return Err(VisearchError::shape(
            "responses_at_fixation",
            format!("fixation ({}, {}) outside {width}x{height}", fixation.x, fixation.y),
        ));
    }
    let depth = s2b.levels().first().map_or(0, FeatureStack::depth);
    let mut mean = vec![0.0; depth];
    for stack in s2b.levels() {
        let y = (fixation.y * stack.height() / height).min(stack.height() - 1);
        let x = (fixation.x * stack.width() / width).min(stack.width() - 1);
        for (m, v) in mean.iter_mut().zip(stack.vector_at(y, x)) {
            *m += v;
        }
    }
    let n = s2b.len() as f64;
    mean.iter_mut().for_each(|m| *m /= n);
    Ok(mean)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projection_step_rounds_half_even() {
        assert_eq!(projection_step(7), 5);
        assert_eq!(projection_step(10), 8);
        assert_eq!(projection_step(2), 2);
        assert_eq!(projection_step(1), 1);
    }

    #[test]
    fn lip_divides_by_channel_sum() {
        let stack = FeatureStack::from_channels(1, 1, vec![vec![1.0], vec![3.0]]).unwrap();
        let s2b = FeatureHierarchy::new(vec![stack], vec![7]).unwrap();
        let lip = top_down_modulation(&s2b, &[2.0, 1.0], &Config::default()).unwrap();
        let level = lip.level(0).unwrap();
        assert!((level.get(0, 0, 0).unwrap() - 0.4).abs() < 1e-12);
        assert!((level.get(0, 0, 1).unwrap() - 0.6).abs() < 1e-12);
        assert!(top_down_modulation(&s2b, &[1.0], &Config::default()).is_err());
    }

    #[test]
    fn priority_averages_overlapping_blocks() {
        // rf 4 -> step 3: cell blocks overlap on column 3.
        let stack = FeatureStack::from_channels(1, 2, vec![vec![1.0, 3.0]]).unwrap();
        let lip = FeatureHierarchy::new(vec![stack], vec![4]).unwrap();
        let map = priority_map(&lip, 8, 5, &Config::default()).unwrap();
        assert_eq!(map.get(0, 0), Some(1.0));
        assert_eq!(map.get(3, 2), Some(2.0));
        assert_eq!(map.get(6, 3), Some(3.0));
        // Row 4 and column 7 are never covered.
        assert_eq!(map.get(0, 4), Some(0.0));
        assert_eq!(map.get(7, 0), Some(0.0));
    }

    #[test]
    fn inhibition_scales_fixation_by_one_minus_k() {
        let mut data = vec![0.5; 20 * 10];
        data[3 * 20 + 7] = 2.0;
        let mut map = PriorityMap::from_vec(20, 10, data).unwrap();
        let fixation = inhibition_of_return(&mut map, 0.2, 3.0).unwrap();
        assert_eq!(fixation, Fixation { x: 7, y: 3 });
        assert_eq!(map.get(7, 3), Some(2.0 * (1.0 - 0.2)));
        assert!(map.get(0, 9).unwrap() < 0.5);
        assert!(map.get(0, 9).unwrap() > 0.49);
    }

    #[test]
    fn resize_keeps_constant_maps_constant() {
        let map = PriorityMap::from_vec(6, 4, vec![0.25; 24]).unwrap();
        let out = resize_bilinear(&map, 3, 5);
        assert_eq!(out.len(), 15);
        assert!(out.iter().all(|&v| (v - 0.25).abs() < 1e-15));
    }

    #[test]
    fn fixation_maps_into_each_scale() {
        let fine = FeatureStack::from_fn(4, 4, 1, |y, x, _| (y * 4 + x) as f64).unwrap();
        let coarse = FeatureStack::from_fn(2, 2, 1, |y, x, _| (10 * (y * 2 + x)) as f64).unwrap();
        let s2b = FeatureHierarchy::new(vec![fine, coarse], vec![7, 9]).unwrap();
        let got = responses_at_fixation(&s2b, Fixation { x: 5, y: 2 }, 8, 8).unwrap();
        // fine cell (1, 2) = 6, coarse cell (0, 1) = 10
        assert_eq!(got, vec![8.0]);
    }
}
