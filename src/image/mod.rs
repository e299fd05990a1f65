//! Image views and owned grayscale buffers.
//!
//! `ImageView` is a borrowed 2D view into a 1D buffer with an explicit stride.
//! The stride counts elements between the starts of consecutive rows, so a
//! stride larger than the width represents padded rows. ROI slices are
//! zero-copy views into the same backing slice and retain the original stride;
//! the S2b matcher uses them to address a feature channel shifted by a
//! prototype tap offset.

use crate::util::{VisearchError, VisearchResult};

#[cfg(feature = "image-io")]
pub mod io;

/// Borrowed 2D image view with an explicit stride.
#[derive(Copy, Clone, Debug)]
pub struct ImageView<'a, T> {
    data: &'a [T],
    width: usize,
    height: usize,
    stride: usize,
}

impl<'a, T> ImageView<'a, T> {
    /// Creates a contiguous view with `stride == width`.
    pub fn from_slice(data: &'a [T], width: usize, height: usize) -> VisearchResult<Self> {
        Self::new(data, width, height, width)
    }

    /// Creates a view with an explicit stride.
    pub fn new(data: &'a [T], width: usize, height: usize, stride: usize) -> VisearchResult<Self> {
        let needed = required_len(width, height, stride)?;
        if data.len() < needed {
            return Err(VisearchError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            stride,
        })
    }

    /// Returns the image width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the image height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the stride in elements between row starts.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Returns the element at `(x, y)` if it is within bounds.
    pub fn get(&self, x: usize, y: usize) -> Option<&'a T> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data.get(y * self.stride + x)
    }

    /// Returns a contiguous slice for row `y` with length `width`.
    pub fn row(&self, y: usize) -> Option<&'a [T]> {
        if y >= self.height {
            return None;
        }
        let start = y * self.stride;
        self.data.get(start..start + self.width)
    }

    /// Returns a zero-copy ROI view into the same backing buffer.
    pub fn roi(
        &self,
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    ) -> VisearchResult<ImageView<'a, T>> {
        if width == 0 || height == 0 {
            return Err(VisearchError::InvalidDimensions { width, height });
        }
        let out_of_bounds = VisearchError::RoiOutOfBounds {
            x,
            y,
            width,
            height,
            img_width: self.width,
            img_height: self.height,
        };
        let fits_x = x.checked_add(width).is_some_and(|end| end <= self.width);
        let fits_y = y.checked_add(height).is_some_and(|end| end <= self.height);
        if !fits_x || !fits_y {
            return Err(out_of_bounds);
        }
        let start = y * self.stride + x;
        let data = self.data.get(start..).ok_or(out_of_bounds)?;
        ImageView::new(data, width, height, self.stride)
    }
}

fn required_len(width: usize, height: usize, stride: usize) -> VisearchResult<usize> {
    if width == 0 || height == 0 {
        return Err(VisearchError::InvalidDimensions { width, height });
    }
    if stride < width {
        return Err(VisearchError::InvalidStride { width, stride });
    }
    (height - 1)
        .checked_mul(stride)
        .and_then(|v| v.checked_add(width))
        .ok_or(VisearchError::InvalidDimensions { width, height })
}

/// Owned contiguous grayscale image with `f64` intensities.
#[derive(Clone, Debug, PartialEq)]
pub struct GrayImage {
    data: Vec<f64>,
    width: usize,
    height: usize,
}

impl GrayImage {
    /// Wraps a row-major buffer of exactly `width * height` values.
    pub fn new(data: Vec<f64>, width: usize, height: usize) -> VisearchResult<Self> {
        let needed = width
            .checked_mul(height)
            .filter(|&n| n > 0)
            .ok_or(VisearchError::InvalidDimensions { width, height })?;
        if data.len() < needed {
            return Err(VisearchError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        if data.len() > needed {
            return Err(VisearchError::InvalidDimensions { width, height });
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Converts an 8-bit grayscale buffer.
    pub fn from_u8(data: &[u8], width: usize, height: usize) -> VisearchResult<Self> {
        Self::new(data.iter().map(|&v| f64::from(v)).collect(), width, height)
    }

    /// Copies a strided view into a contiguous image.
    pub fn from_view(view: ImageView<'_, f64>) -> VisearchResult<Self> {
        let mut data = Vec::with_capacity(view.width() * view.height());
        for y in 0..view.height() {
            let row = view.row(y).ok_or(VisearchError::BufferTooSmall {
                needed: (y + 1) * view.stride(),
                got: y * view.stride(),
            })?;
            data.extend_from_slice(row);
        }
        Self::new(data, view.width(), view.height())
    }

    /// Builds an image by evaluating `f(x, y)` at every pixel.
    pub fn from_fn(
        width: usize,
        height: usize,
        mut f: impl FnMut(usize, usize) -> f64,
    ) -> VisearchResult<Self> {
        let mut data = Vec::with_capacity(width.saturating_mul(height));
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self::new(data, width, height)
    }

    /// Returns the image width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the image height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the row-major pixel buffer.
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Returns a borrowed view of the image.
    pub fn view(&self) -> ImageView<'_, f64> {
        ImageView {
            data: &self.data,
            width: self.width,
            height: self.height,
            stride: self.width,
        }
    }
}
