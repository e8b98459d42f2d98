//! Single-step advance along the smoothed principal direction.
//!
//! Positions are continuous voxel-index coordinates. The tensor is sampled at
//! the nearest voxel; there is no interpolation between neighbours.

use nalgebra::{Point3, Vector3};

use super::direction::{analyze, is_valid_tensor};
use super::field::{TensorField, TrackableMask};
use crate::params::TrackingParams;

/// Which end of the streamline is being grown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pass {
    Forward,
    Backward,
}

/// Why a pass ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    OutOfBounds,
    Masked,
    InvalidTensor,
    EmptyTensor,
    LowAnisotropy,
    Numerical,
    Curvature,
    BudgetExhausted,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Step {
    /// `point` is the physical position of `pos` before moving.
    Continue {
        point: Point3<f64>,
        next_pos: Vector3<f64>,
        dir: Vector3<f64>,
    },
    Stop(StopReason),
}

/// Per-run step settings, resolved once from `TrackingParams` and the field.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepConfig {
    pub fa_threshold: f64,
    pub angular_threshold: f64,
    pub f: f64,
    pub g: f64,
    /// Physical step length after auto-derivation.
    pub step_size: f64,
    pub max_length: usize,
    /// Index-space displacement per unit of physical direction.
    pub step_scale: Vector3<f64>,
}

impl StepConfig {
    pub fn resolve(params: &TrackingParams, spacing: [f64; 3]) -> Self {
        let step_size = params.effective_step_size(spacing);
        Self {
            fa_threshold: params.fa_threshold,
            angular_threshold: params.angular_threshold,
            f: params.f,
            g: params.g,
            step_size,
            max_length: params.max_length,
            step_scale: Vector3::new(
                step_size / spacing[0],
                step_size / spacing[1],
                step_size / spacing[2],
            ),
        }
    }
}

/// Round half away from zero: 2.5 -> 3, -2.5 -> -3.
#[inline]
pub fn round_half_away(x: f64) -> i64 {
    if x > 0.0 {
        (x + 0.5).floor() as i64
    } else {
        (x - 0.5).ceil() as i64
    }
}

/// Nearest voxel of a continuous index position.
#[inline]
pub fn nearest_voxel(pos: &Vector3<f64>) -> [i64; 3] {
    [
        round_half_away(pos.x),
        round_half_away(pos.y),
        round_half_away(pos.z),
    ]
}

/// Advance one step from `pos`.
///
/// `prev_dir` is zero on the first step of a pass and a unit vector afterwards.
pub fn advance(
    field: &TensorField,
    mask: &TrackableMask,
    pos: &Vector3<f64>,
    prev_dir: &Vector3<f64>,
    pass: Pass,
    cfg: &StepConfig,
) -> Step {
    let index = match field.checked_index(nearest_voxel(pos)) {
        Some(index) => index,
        None => return Step::Stop(StopReason::OutOfBounds),
    };
    if !mask.get(index) {
        return Step::Stop(StopReason::Masked);
    }

    let tensor = field.tensor(index);
    if !is_valid_tensor(tensor) {
        return Step::Stop(StopReason::InvalidTensor);
    }
    if tensor.trace() == 0.0 {
        return Step::Stop(StopReason::EmptyTensor);
    }

    let analysis = match analyze(tensor) {
        Some(analysis) => analysis,
        None => return Step::Stop(StopReason::Numerical),
    };
    if analysis.fa <= cfg.fa_threshold {
        return Step::Stop(StopReason::LowAnisotropy);
    }

    let mut dir = match pass {
        Pass::Forward => analysis.principal,
        Pass::Backward => -analysis.principal,
    };

    if *prev_dir != Vector3::zeros() {
        let deflected = tensor * prev_dir;
        let blended =
            dir * cfg.f + (prev_dir * (1.0 - cfg.g) + deflected * cfg.g) * (1.0 - cfg.f);
        let norm = blended.norm();
        if !norm.is_finite() || norm == 0.0 {
            return Step::Stop(StopReason::Numerical);
        }
        dir = blended / norm;

        if prev_dir.dot(&dir) < 0.0 {
            dir = -dir;
        }

        let cos_angle = prev_dir.dot(&dir).abs();
        if cos_angle < cfg.angular_threshold {
            return Step::Stop(StopReason::Curvature);
        }
    }

    Step::Continue {
        point: field.to_physical(pos),
        next_pos: pos + dir.component_mul(&cfg.step_scale),
        dir,
    }
}
