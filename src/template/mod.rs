//! Prototype templates matched against feature maps.
//!
//! Patch prototypes are sparse `size x size x depth` cubes cut from C1 maps;
//! vector prototypes are dense channel vectors cut from S2b maps and grouped
//! per object.

mod plan;
pub mod sampler;

pub use plan::{SparsePlan, Tap};

use crate::util::{VisearchError, VisearchResult};

/// Sentinel stored in ignored prototype cells.
pub const IGNORED: f64 = -1.0;

/// Sparse patch prototype.
///
/// Weights are channel-planar (`c * size * size + row * size + col`). Kept
/// cells carry normalized weights whose L2 norm is 1; every other cell holds
/// [`IGNORED`].
#[derive(Clone, Debug, PartialEq)]
pub struct PatchPrototype {
    size: usize,
    depth: usize,
    weights: Vec<f64>,
}

impl PatchPrototype {
    /// Wraps raw weights, validating the cube shape.
    pub fn from_weights(size: usize, depth: usize, weights: Vec<f64>) -> VisearchResult<Self> {
        let expected = size
            .checked_mul(size)
            .and_then(|v| v.checked_mul(depth))
            .filter(|&n| n > 0)
            .ok_or_else(|| VisearchError::shape("patch_prototype", "empty prototype cube"))?;
        if weights.len() != expected {
            return Err(VisearchError::shape(
                "patch_prototype",
                format!("{} weights for a {size}x{size}x{depth} cube", weights.len()),
            ));
        }
        Ok(Self {
            size,
            depth,
            weights,
        })
    }

    /// Side length of the receptive field.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of channels.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Channel-planar weights including ignored cells.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Weight at `(row, col, channel)`.
    pub fn weight(&self, row: usize, col: usize, channel: usize) -> f64 {
        self.weights[(channel * self.size + row) * self.size + col]
    }

    /// Number of cells not marked as ignored.
    pub fn kept_count(&self) -> usize {
        self.weights.iter().filter(|&&w| w != IGNORED).count()
    }

    /// Compiles the kept positive taps for matching.
    pub fn plan(&self) -> SparsePlan {
        SparsePlan::from_prototype(self)
    }
}

/// Dense L2-normalized prototype vector tagged with its source object and scale.
#[derive(Clone, Debug, PartialEq)]
pub struct VectorPrototype {
    object_id: usize,
    scale_idx: usize,
    values: Vec<f64>,
}

impl VectorPrototype {
    /// Wraps an already normalized vector.
    pub fn new(object_id: usize, scale_idx: usize, values: Vec<f64>) -> Self {
        Self {
            object_id,
            scale_idx,
            values,
        }
    }

    /// Object the prototype was sampled from.
    pub fn object_id(&self) -> usize {
        self.object_id
    }

    /// Scale the prototype was sampled from.
    pub fn scale_idx(&self) -> usize {
        self.scale_idx
    }

    /// Vector components.
    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

/// Vector prototypes per object, indexed by object id.
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectPrototypeSet {
    objects: Vec<Vec<VectorPrototype>>,
    dim: usize,
}

impl ObjectPrototypeSet {
    /// Builds the set; every object needs at least one prototype and all
    /// vectors must share one dimension.
    pub fn new(objects: Vec<Vec<VectorPrototype>>) -> VisearchResult<Self> {
        if objects.is_empty() {
            return Err(VisearchError::shape("object_prototypes", "no objects"));
        }
        let dim = objects
            .iter()
            .flatten()
            .next()
            .map(|p| p.values().len())
            .unwrap_or(0);
        for (object_id, protos) in objects.iter().enumerate() {
            if protos.is_empty() {
                return Err(VisearchError::shape(
                    "object_prototypes",
                    format!("object {object_id} has no prototypes"),
                ));
            }
            if protos.iter().any(|p| p.values().len() != dim) {
                return Err(VisearchError::shape(
                    "object_prototypes",
                    format!("object {object_id} has prototypes of mismatched length"),
                ));
            }
        }
        Ok(Self { objects, dim })
    }

    /// Number of objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns true if there are no objects.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Prototype vector length.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Prototypes of one object.
    pub fn object(&self, object_id: usize) -> Option<&[VectorPrototype]> {
        self.objects.get(object_id).map(Vec::as_slice)
    }

    /// Iterates prototype lists in object-id order.
    pub fn iter(&self) -> impl Iterator<Item = &[VectorPrototype]> {
        self.objects.iter().map(Vec::as_slice)
    }
}
