//! Visearch is a CPU-first biologically inspired visual search library.
//!
//! An image is turned into a multi-scale feature hierarchy (Gabor S1, max
//! pooled C1, sparse prototype S2b), recognized by vector similarity (S3/C3)
//! and searched for a target by a feedback-driven attention loop with
//! inhibition of return. Optional `rayon` and `simd` features accelerate the
//! data-independent stages; `tracing` emits structured diagnostics.

mod trace;

pub mod bank;
pub mod config;
pub mod conv;
pub mod feature;
pub mod image;
pub mod kernel;
pub mod pool;
pub mod search;
pub mod template;
pub mod util;

pub use bank::{FilterBank, GaborKernel};
pub use config::Config;
pub use conv::s1_layer;
pub use feature::{FeatureHierarchy, FeatureStack};
pub use image::{GrayImage, ImageView};
pub use kernel::{CorrKernel, CorrParams};
pub use pool::c_layer;
pub use search::attention::{Fixation, PriorityMap};
pub use search::feedback::ObjectResponses;
pub use search::{
    build_object_responses, build_patch_prototypes, build_vector_prototypes, Decision,
    FocusState, Model, SearchEpisode, SearchStep,
};
pub use template::{ObjectPrototypeSet, PatchPrototype, SparsePlan, VectorPrototype};
pub use util::{FloatMode, VisearchError, VisearchResult};
