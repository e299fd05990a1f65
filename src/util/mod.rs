//! Shared utility helpers.

pub mod error;
pub(crate) mod math;
pub mod numeric;

pub use error::{VisearchError, VisearchResult};
pub use numeric::FloatMode;
