//! Seeding and two-pass streamline construction.

use nalgebra::{Point3, Vector3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::field::{TensorField, TrackableMask};
use super::integrator::{advance, Pass, Step, StepConfig, StopReason};

/// Largest jitter offset applied per axis when several seeds share a voxel.
pub const SEED_JITTER: f64 = 0.49;

/// Starting point of one streamline in continuous index space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Seed {
    pub pos: Vector3<f64>,
    /// Zero until the first step picks a direction.
    pub dir: Vector3<f64>,
}

impl Seed {
    pub fn at(pos: Vector3<f64>) -> Self {
        Self {
            pos,
            dir: Vector3::zeros(),
        }
    }
}

/// One traced polyline in physical coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct Streamline {
    pub points: Vec<Point3<f64>>,
    pub forward_stop: StopReason,
    pub backward_stop: StopReason,
}

impl Streamline {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn length(&self) -> f64 {
        polyline_length(&self.points)
    }
}

/// Sum of segment lengths.
pub fn polyline_length(points: &[Point3<f64>]) -> f64 {
    points.windows(2).map(|w| (w[1] - w[0]).norm()).sum()
}

/// Append the seeds of one voxel to `out`.
///
/// A single seed sits on the voxel centre. With more than one, each seed is
/// jittered uniformly in [-0.49, 0.49] per axis. The generator is keyed on
/// the voxel's linear index so the seeds do not depend on which partition
/// visits the voxel.
pub fn voxel_seeds(
    coords: [usize; 3],
    linear_index: usize,
    seeds_per_voxel: usize,
    rng_seed: u64,
    out: &mut Vec<Seed>,
) {
    let center = Vector3::new(coords[0] as f64, coords[1] as f64, coords[2] as f64);
    if seeds_per_voxel <= 1 {
        out.push(Seed::at(center));
        return;
    }

    let mut rng = ChaCha8Rng::seed_from_u64(rng_seed ^ (linear_index as u64).rotate_left(17));
    for _ in 0..seeds_per_voxel {
        let jitter = Vector3::new(
            rng.gen_range(-SEED_JITTER..=SEED_JITTER),
            rng.gen_range(-SEED_JITTER..=SEED_JITTER),
            rng.gen_range(-SEED_JITTER..=SEED_JITTER),
        );
        out.push(Seed::at(center + jitter));
    }
}

/// Grow one pass from the seed, drawing from the shared step budget.
///
/// When `emit_seed` is false the seed voxel is still validated and sets the
/// starting direction, but its point is left to the other pass.
fn trace_pass(
    field: &TensorField,
    mask: &TrackableMask,
    seed: &Seed,
    pass: Pass,
    cfg: &StepConfig,
    steps: &mut usize,
    emit_seed: bool,
) -> (Vec<Point3<f64>>, StopReason) {
    let mut points = Vec::new();
    let mut pos = seed.pos;
    let mut dir = seed.dir;
    let mut at_seed = true;

    loop {
        if *steps >= cfg.max_length {
            return (points, StopReason::BudgetExhausted);
        }

        match advance(field, mask, &pos, &dir, pass, cfg) {
            Step::Stop(reason) => return (points, reason),
            Step::Continue {
                point,
                next_pos,
                dir: next_dir,
            } => {
                if emit_seed || !at_seed {
                    points.push(point);
                    *steps += 1;
                }
                at_seed = false;
                pos = next_pos;
                dir = next_dir;
            }
        }
    }
}

/// Trace forward then backward from `seed` and join the passes.
///
/// The forward points are reversed so the polyline runs from the forward tip
/// through the seed to the backward tip. The result is empty when the seed
/// voxel itself is rejected.
pub fn build_streamline(
    field: &TensorField,
    mask: &TrackableMask,
    seed: &Seed,
    cfg: &StepConfig,
) -> Streamline {
    let mut steps = 0usize;

    let (mut points, forward_stop) =
        trace_pass(field, mask, seed, Pass::Forward, cfg, &mut steps, true);
    if points.is_empty() {
        return Streamline {
            points,
            forward_stop,
            backward_stop: forward_stop,
        };
    }

    let (backward, backward_stop) =
        trace_pass(field, mask, seed, Pass::Backward, cfg, &mut steps, false);

    points.reverse();
    points.extend(backward);

    Streamline {
        points,
        forward_stop,
        backward_stop,
    }
}
