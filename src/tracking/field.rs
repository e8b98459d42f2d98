//! Tensor volume and trackable mask.
//!
//! Both volumes use the same linear layout: x changes fastest, z slowest.
//! Tensors are stored as `f64` regardless of the caller's component type;
//! conversion happens once in the constructors.

use nalgebra::{Matrix3, Point3, Vector3};

use crate::error::{Result, TrackingError};

/// Symmetric 3x3 diffusion tensor at one voxel.
pub type Tensor = Matrix3<f64>;

/// Number of stored components per voxel in the upper-triangular layout
/// `(xx, xy, xz, yy, yz, zz)`.
pub const TENSOR_COMPONENTS: usize = 6;

/// Read-only regular grid of tensors with physical spacing.
#[derive(Clone, Debug)]
pub struct TensorField {
    extent: [usize; 3],
    spacing: [f64; 3],
    origin: [f64; 3],
    tensors: Vec<Tensor>,
}

/// Build a symmetric tensor from its six upper-triangular components.
#[inline]
pub fn tensor_from_components(c: &[f64]) -> Tensor {
    Matrix3::new(c[0], c[1], c[2], c[1], c[3], c[4], c[2], c[4], c[5])
}

/// Number of voxels in a grid of the given extent.
///
/// Only for extents already accepted by a constructor; use
/// [`checked_voxel_count`] on untrusted input.
#[inline]
pub fn voxel_count(extent: [usize; 3]) -> usize {
    extent[0] * extent[1] * extent[2]
}

/// Voxel count, or `None` if it does not fit in `usize`.
#[inline]
pub fn checked_voxel_count(extent: [usize; 3]) -> Option<usize> {
    extent[0].checked_mul(extent[1])?.checked_mul(extent[2])
}

fn expected_voxels(extent: [usize; 3]) -> Result<usize> {
    checked_voxel_count(extent).ok_or(TrackingError::ExtentTooLarge { extent })
}

impl TensorField {
    pub fn new(extent: [usize; 3], spacing: [f64; 3], tensors: Vec<Tensor>) -> Result<Self> {
        for (axis, &value) in spacing.iter().enumerate() {
            if !value.is_finite() || value <= 0.0 {
                return Err(TrackingError::InvalidSpacing { axis, value });
            }
        }

        let expected = expected_voxels(extent)?;
        if tensors.len() != expected {
            return Err(TrackingError::FieldSizeMismatch {
                extent,
                expected,
                actual: tensors.len(),
            });
        }

        Ok(Self {
            extent,
            spacing,
            origin: [0.0; 3],
            tensors,
        })
    }

    /// Build a field from packed `(xx, xy, xz, yy, yz, zz)` components.
    pub fn from_components(
        extent: [usize; 3],
        spacing: [f64; 3],
        components: &[f64],
    ) -> Result<Self> {
        let expected = expected_voxels(extent)?;
        if Some(components.len()) != expected.checked_mul(TENSOR_COMPONENTS) {
            return Err(TrackingError::FieldSizeMismatch {
                extent,
                expected,
                actual: components.len() / TENSOR_COMPONENTS,
            });
        }

        let tensors = components
            .chunks_exact(TENSOR_COMPONENTS)
            .map(tensor_from_components)
            .collect();
        Self::new(extent, spacing, tensors)
    }

    /// Same as `from_components` for single-precision input.
    pub fn from_components_f32(
        extent: [usize; 3],
        spacing: [f64; 3],
        components: &[f32],
    ) -> Result<Self> {
        let widened: Vec<f64> = components.iter().map(|&c| c as f64).collect();
        Self::from_components(extent, spacing, &widened)
    }

    /// Place voxel (0, 0, 0) at `origin` in physical space.
    pub fn with_origin(mut self, origin: [f64; 3]) -> Self {
        self.origin = origin;
        self
    }

    pub fn extent(&self) -> [usize; 3] {
        self.extent
    }

    pub fn spacing(&self) -> [f64; 3] {
        self.spacing
    }

    pub fn origin(&self) -> [f64; 3] {
        self.origin
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    /// Calculate the linear index for an in-bounds voxel.
    #[inline]
    pub fn index_of(&self, x: usize, y: usize, z: usize) -> usize {
        z * self.extent[1] * self.extent[0] + y * self.extent[0] + x
    }

    /// Inverse of `index_of`.
    #[inline]
    pub fn coords_of(&self, index: usize) -> [usize; 3] {
        let plane = self.extent[0] * self.extent[1];
        let z = index / plane;
        let rem = index % plane;
        [rem % self.extent[0], rem / self.extent[0], z]
    }

    /// Linear index of a signed voxel coordinate, or `None` outside the volume.
    #[inline]
    pub fn checked_index(&self, idx: [i64; 3]) -> Option<usize> {
        let inside = idx
            .iter()
            .zip(self.extent.iter())
            .all(|(&i, &n)| i >= 0 && (i as u64) < n as u64);
        if inside {
            Some(self.index_of(idx[0] as usize, idx[1] as usize, idx[2] as usize))
        } else {
            None
        }
    }

    #[inline]
    pub fn tensor(&self, index: usize) -> &Tensor {
        &self.tensors[index]
    }

    /// Convert a continuous index-space position to physical coordinates.
    #[inline]
    pub fn to_physical(&self, pos: &Vector3<f64>) -> Point3<f64> {
        Point3::new(
            self.origin[0] + pos.x * self.spacing[0],
            self.origin[1] + pos.y * self.spacing[1],
            self.origin[2] + pos.z * self.spacing[2],
        )
    }
}

/// Boolean volume marking voxels that may be seeded and traversed.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackableMask {
    extent: [usize; 3],
    cells: Vec<bool>,
}

impl TrackableMask {
    pub fn new(extent: [usize; 3], cells: Vec<bool>) -> Result<Self> {
        let expected = expected_voxels(extent)?;
        if cells.len() != expected {
            return Err(TrackingError::MaskSizeMismatch {
                extent,
                expected,
                actual: cells.len(),
            });
        }
        Ok(Self { extent, cells })
    }

    /// Mask with every voxel trackable.
    pub fn all(extent: [usize; 3]) -> Self {
        Self {
            extent,
            cells: vec![true; voxel_count(extent)],
        }
    }

    /// Non-zero bytes are trackable.
    pub fn from_u8(extent: [usize; 3], values: &[u8]) -> Result<Self> {
        Self::new(extent, values.iter().map(|&v| v != 0).collect())
    }

    pub fn extent(&self) -> [usize; 3] {
        self.extent
    }

    #[inline]
    pub fn get(&self, index: usize) -> bool {
        self.cells[index]
    }

    pub fn set(&mut self, index: usize, value: bool) {
        if let Some(cell) = self.cells.get_mut(index) {
            *cell = value;
        }
    }

    pub fn count(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }
}
