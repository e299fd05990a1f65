//! Convenience helpers for loading images via the `image` crate.
//!
//! Available when the `image-io` feature is enabled.

use crate::image::GrayImage;
use crate::util::{VisearchError, VisearchResult};
use std::path::Path;

/// Converts an 8-bit grayscale image buffer.
pub fn gray_from_luma8(img: &image::GrayImage) -> VisearchResult<GrayImage> {
    GrayImage::from_u8(img.as_raw(), img.width() as usize, img.height() as usize)
}

/// Converts a dynamic image to grayscale.
pub fn gray_from_dynamic_image(img: &image::DynamicImage) -> VisearchResult<GrayImage> {
    gray_from_luma8(&img.to_luma8())
}

/// Loads an image from disk and converts it to grayscale.
pub fn load_gray_image<P: AsRef<Path>>(path: P) -> VisearchResult<GrayImage> {
    let img = image::open(path).map_err(|err| VisearchError::ImageIo {
        reason: err.to_string(),
    })?;
    gray_from_dynamic_image(&img)
}
