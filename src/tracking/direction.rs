//! Eigen-analysis of a single diffusion tensor.

use nalgebra::{SymmetricEigen, Vector3};

use super::field::Tensor;

const EIGEN_EPS: f64 = 1e-12;
const EIGEN_MAX_ITERATIONS: usize = 200;

/// Scalar and directional summary of one tensor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TensorAnalysis {
    /// Eigenvalues sorted so that λ1 ≥ λ2 ≥ λ3.
    pub eigenvalues: [f64; 3],
    pub trace: f64,
    /// Fractional anisotropy in [0, 1].
    pub fa: f64,
    /// Unit eigenvector of λ1. Its sign is arbitrary.
    pub principal: Vector3<f64>,
}

/// True when every component is a finite number.
#[inline]
pub fn is_valid_tensor(tensor: &Tensor) -> bool {
    tensor.iter().all(|c| c.is_finite())
}

/// Fractional anisotropy of a set of eigenvalues.
pub fn fractional_anisotropy(eigenvalues: &[f64; 3]) -> f64 {
    let mean = eigenvalues.iter().sum::<f64>() / 3.0;
    let deviation: f64 = eigenvalues.iter().map(|l| (l - mean) * (l - mean)).sum();
    let magnitude: f64 = eigenvalues.iter().map(|l| l * l).sum();
    if magnitude <= 0.0 {
        return 0.0;
    }
    let fa = (1.5f64).sqrt() * deviation.sqrt() / magnitude.sqrt();
    fa.clamp(0.0, 1.0)
}

/// Decompose a tensor into eigenvalues, FA and principal direction.
///
/// The tensor must be finite with a non-zero trace; callers reject the voxel
/// otherwise. Returns `None` if the eigensolver does not converge or produces
/// a degenerate eigenvector.
pub fn analyze(tensor: &Tensor) -> Option<TensorAnalysis> {
    let eig = SymmetricEigen::try_new(*tensor, EIGEN_EPS, EIGEN_MAX_ITERATIONS)?;

    let mut order = [0usize, 1, 2];
    order.sort_by(|&a, &b| eig.eigenvalues[b].total_cmp(&eig.eigenvalues[a]));
    let eigenvalues = order.map(|i| eig.eigenvalues[i]);
    if eigenvalues.iter().any(|l| !l.is_finite()) {
        return None;
    }

    let principal: Vector3<f64> = eig.eigenvectors.column(order[0]).into_owned();
    let norm = principal.norm();
    if !norm.is_finite() || norm < 1e-12 {
        return None;
    }

    Some(TensorAnalysis {
        eigenvalues,
        trace: eigenvalues.iter().sum(),
        fa: fractional_anisotropy(&eigenvalues),
        principal: principal / norm,
    })
}
