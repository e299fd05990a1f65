//! Multi-channel feature maps and per-scale hierarchies.
//!
//! Storage is channel-planar: channel `c` occupies one contiguous
//! `height * width` row-major block, so every channel can be handed to the
//! kernels as a plain [`ImageView`].

use crate::image::ImageView;
use crate::util::math::l2_norm;
use crate::util::{VisearchError, VisearchResult};

/// A `height x width x depth` real-valued feature stack for one scale.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureStack {
    height: usize,
    width: usize,
    depth: usize,
    data: Vec<f64>,
}

impl FeatureStack {
    /// Creates an all-zero stack.
    pub fn zeros(height: usize, width: usize, depth: usize) -> VisearchResult<Self> {
        let len = plane_len(height, width)?
            .checked_mul(depth)
            .filter(|&n| n > 0)
            .ok_or(VisearchError::InvalidDimensions { width, height })?;
        Ok(Self {
            height,
            width,
            depth,
            data: vec![0.0; len],
        })
    }

    /// Stacks equally sized row-major maps depth-wise.
    pub fn from_channels(height: usize, width: usize, channels: Vec<Vec<f64>>) -> VisearchResult<Self> {
        let plane = plane_len(height, width)?;
        if channels.is_empty() {
            return Err(VisearchError::shape("feature_stack", "no channels"));
        }
        let depth = channels.len();
        let mut data = Vec::with_capacity(plane * depth);
        for (c, channel) in channels.into_iter().enumerate() {
            if channel.len() != plane {
                return Err(VisearchError::shape(
                    "feature_stack",
                    format!("channel {c} has {} values, expected {plane}", channel.len()),
                ));
            }
            data.extend(channel);
        }
        Ok(Self {
            height,
            width,
            depth,
            data,
        })
    }

    /// Builds a stack by evaluating `f(y, x, c)` at every cell.
    pub fn from_fn(
        height: usize,
        width: usize,
        depth: usize,
        mut f: impl FnMut(usize, usize, usize) -> f64,
    ) -> VisearchResult<Self> {
        let mut stack = Self::zeros(height, width, depth)?;
        for c in 0..depth {
            let channel = stack.channel_mut(c);
            for y in 0..height {
                for x in 0..width {
                    channel[y * width + x] = f(y, x, c);
                }
            }
        }
        Ok(stack)
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of channels.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Value at row `y`, column `x`, channel `c`.
    pub fn get(&self, y: usize, x: usize, c: usize) -> Option<f64> {
        if y >= self.height || x >= self.width || c >= self.depth {
            return None;
        }
        self.data.get(self.index(y, x, c)).copied()
    }

    /// Row-major values of channel `c`.
    ///
    /// # Panics
    /// Panics if `c >= depth`.
    pub fn channel(&self, c: usize) -> &[f64] {
        let plane = self.height * self.width;
        &self.data[c * plane..(c + 1) * plane]
    }

    pub(crate) fn channel_mut(&mut self, c: usize) -> &mut [f64] {
        let plane = self.height * self.width;
        &mut self.data[c * plane..(c + 1) * plane]
    }

    /// Borrowed 2D view of channel `c`.
    pub fn channel_view(&self, c: usize) -> VisearchResult<ImageView<'_, f64>> {
        if c >= self.depth {
            return Err(VisearchError::shape(
                "feature_stack",
                format!("channel {c} out of range for depth {}", self.depth),
            ));
        }
        ImageView::from_slice(self.channel(c), self.width, self.height)
    }

    /// Channel vector at row `y`, column `x`.
    pub fn vector_at(&self, y: usize, x: usize) -> Vec<f64> {
        (0..self.depth).map(|c| self.data[self.index(y, x, c)]).collect()
    }

    /// Per-position sum over channels, row-major.
    pub fn channel_sum(&self) -> Vec<f64> {
        let plane = self.height * self.width;
        let mut sum = vec![0.0; plane];
        for c in 0..self.depth {
            for (acc, v) in sum.iter_mut().zip(self.channel(c)) {
                *acc += v;
            }
        }
        sum
    }

    /// Euclidean norm over all cells.
    pub fn l2_norm(&self) -> f64 {
        l2_norm(&self.data)
    }

    /// Maximum per channel over all positions.
    pub fn channel_max(&self) -> Vec<f64> {
        (0..self.depth)
            .map(|c| {
                self.channel(c)
                    .iter()
                    .copied()
                    .fold(f64::NEG_INFINITY, f64::max)
            })
            .collect()
    }

    /// All cells, channel-planar.
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    fn index(&self, y: usize, x: usize, c: usize) -> usize {
        (c * self.height + y) * self.width + x
    }
}

fn plane_len(height: usize, width: usize) -> VisearchResult<usize> {
    height
        .checked_mul(width)
        .filter(|&n| n > 0)
        .ok_or(VisearchError::InvalidDimensions { width, height })
}

/// Ordered per-scale feature stacks, finest receptive field first.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureHierarchy {
    levels: Vec<FeatureStack>,
    rf_sizes: Vec<usize>,
}

impl FeatureHierarchy {
    /// Pairs each stack with the S1 receptive-field size of its scale.
    pub fn new(levels: Vec<FeatureStack>, rf_sizes: Vec<usize>) -> VisearchResult<Self> {
        if levels.is_empty() {
            return Err(VisearchError::shape("feature_hierarchy", "no scales"));
        }
        if levels.len() != rf_sizes.len() {
            return Err(VisearchError::shape(
                "feature_hierarchy",
                format!("{} stacks but {} rf sizes", levels.len(), rf_sizes.len()),
            ));
        }
        Ok(Self { levels, rf_sizes })
    }

    /// Number of scales.
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Returns true if the hierarchy has no scales.
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Stacks in scale order.
    pub fn levels(&self) -> &[FeatureStack] {
        &self.levels
    }

    /// Stack for a single scale.
    pub fn level(&self, index: usize) -> Option<&FeatureStack> {
        self.levels.get(index)
    }

    /// S1 receptive-field size of each scale.
    pub fn rf_sizes(&self) -> &[usize] {
        &self.rf_sizes
    }

    /// Indices of the `count` coarsest (largest receptive field) scales, or of
    /// every scale when there are fewer.
    pub fn coarsest(&self, count: usize) -> std::ops::Range<usize> {
        self.levels.len().saturating_sub(count)..self.levels.len()
    }

    /// Iterates `(rf_size, stack)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &FeatureStack)> {
        self.rf_sizes.iter().copied().zip(self.levels.iter())
    }
}
