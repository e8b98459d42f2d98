//! Volume partitioning and the per-partition scan.
//!
//! Each worker owns its buffers outright; the only shared state is the
//! read-only field, masks and config, plus the atomic control flags.

use std::ops::Range;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use log::debug;
use nalgebra::Point3;

use super::field::{TensorField, TrackableMask};
use super::integrator::StepConfig;
use super::streamline::{build_streamline, voxel_seeds, Seed};

/// A contiguous run of linear voxel indices assigned to one worker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Partition {
    pub index: usize,
    pub voxels: Range<usize>,
}

/// Split `0..voxel_count` into `workers` contiguous partitions.
///
/// Earlier partitions take the remainder, so sizes differ by at most one.
/// Partitions may be empty when there are more workers than voxels.
pub fn split_partitions(voxel_count: usize, workers: usize) -> Vec<Partition> {
    let workers = workers.max(1);
    let base = voxel_count / workers;
    let extra = voxel_count % workers;

    let mut start = 0;
    (0..workers)
        .map(|index| {
            let len = base + usize::from(index < extra);
            let voxels = start..start + len;
            start += len;
            Partition { index, voxels }
        })
        .collect()
}

/// Cooperative cancellation and progress for a running tracker.
#[derive(Debug, Default)]
pub struct TrackerControl {
    cancelled: AtomicBool,
    voxels_done: AtomicUsize,
}

impl TrackerControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask all workers to stop before their next voxel.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Voxels visited so far in the current run.
    pub fn progress(&self) -> usize {
        self.voxels_done.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::Relaxed);
        self.voxels_done.store(0, Ordering::Relaxed);
    }

    fn record_voxel(&self) {
        self.voxels_done.fetch_add(1, Ordering::Relaxed);
    }
}

/// Read-only inputs shared by all workers of one run.
#[derive(Clone, Copy, Debug)]
pub struct TrackingContext<'a> {
    pub field: &'a TensorField,
    pub mask: &'a TrackableMask,
    /// Restricts seeding only; traversal follows `mask`.
    pub seed_mask: Option<&'a TrackableMask>,
    pub step: StepConfig,
    pub seeds_per_voxel: usize,
    pub rng_seed: u64,
    pub min_tract_length: f64,
}

impl TrackingContext<'_> {
    #[inline]
    fn is_seed_voxel(&self, index: usize) -> bool {
        self.mask.get(index) && self.seed_mask.map_or(true, |m| m.get(index))
    }
}

/// Streamlines traced by one worker, with point indices local to it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PartitionResult {
    pub partition: usize,
    pub points: Vec<Point3<f64>>,
    pub lines: Vec<Vec<usize>>,
    pub seeds: usize,
    pub discarded_short: usize,
    pub cancelled: bool,
}

/// Scan one partition: seed every trackable voxel and keep non-empty streamlines.
pub fn run_partition(
    ctx: &TrackingContext<'_>,
    partition: &Partition,
    control: &TrackerControl,
) -> PartitionResult {
    let mut result = PartitionResult {
        partition: partition.index,
        ..Default::default()
    };
    let mut seeds: Vec<Seed> = Vec::with_capacity(ctx.seeds_per_voxel);

    for index in partition.voxels.clone() {
        if control.is_cancelled() {
            result.cancelled = true;
            break;
        }
        control.record_voxel();

        if !ctx.is_seed_voxel(index) {
            continue;
        }

        seeds.clear();
        voxel_seeds(
            ctx.field.coords_of(index),
            index,
            ctx.seeds_per_voxel,
            ctx.rng_seed,
            &mut seeds,
        );

        for seed in &seeds {
            result.seeds += 1;
            let streamline = build_streamline(ctx.field, ctx.mask, seed, &ctx.step);
            if streamline.is_empty() {
                continue;
            }
            if streamline.length() < ctx.min_tract_length {
                result.discarded_short += 1;
                continue;
            }

            let start = result.points.len();
            result.points.extend(streamline.points);
            result.lines.push((start..result.points.len()).collect());
        }
    }

    debug!(
        "partition {} voxels {:?}: {} seeds, {} streamlines, {} points",
        partition.index,
        partition.voxels,
        result.seeds,
        result.lines.len(),
        result.points.len()
    );

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::TrackingParams;
    use crate::tracking::field::{voxel_count, Tensor};
    use nalgebra::{Matrix3, Vector3};

    fn uniform_field(extent: [usize; 3], tensor: Tensor) -> TensorField {
        TensorField::new(extent, [1.0; 3], vec![tensor; voxel_count(extent)]).unwrap()
    }

    fn context<'a>(
        field: &'a TensorField,
        mask: &'a TrackableMask,
        params: &TrackingParams,
    ) -> TrackingContext<'a> {
        TrackingContext {
            field,
            mask,
            seed_mask: None,
            step: StepConfig::resolve(params, field.spacing()),
            seeds_per_voxel: params.seeds_per_voxel,
            rng_seed: params.rng_seed,
            min_tract_length: params.min_tract_length,
        }
    }

    #[test]
    fn test_split_covers_range_contiguously() {
        for (count, workers) in [(10, 3), (27, 4), (5, 8), (0, 2), (64, 1)] {
            let parts = split_partitions(count, workers);
            assert_eq!(parts.len(), workers);

            let mut next = 0;
            for (i, p) in parts.iter().enumerate() {
                assert_eq!(p.index, i);
                assert_eq!(p.voxels.start, next, "gap before partition {}", i);
                next = p.voxels.end;
            }
            assert_eq!(next, count);

            let sizes: Vec<usize> = parts.iter().map(|p| p.voxels.len()).collect();
            let max = sizes.iter().max().copied().unwrap_or(0);
            let min = sizes.iter().min().copied().unwrap_or(0);
            assert!(max - min <= 1, "unbalanced split {:?}", sizes);
        }
    }

    #[test]
    fn test_zero_workers_means_one_partition() {
        let parts = split_partitions(9, 0);
        assert_eq!(parts, vec![Partition { index: 0, voxels: 0..9 }]);
    }

    #[test]
    fn test_lines_use_local_contiguous_indices() {
        let field = uniform_field([4, 3, 3], Matrix3::from_diagonal(&Vector3::new(1.0, 0.1, 0.1)));
        let mask = TrackableMask::all(field.extent());
        let params = TrackingParams::default();
        let ctx = context(&field, &mask, &params);
        let control = TrackerControl::new();

        let part = Partition {
            index: 0,
            voxels: 0..field.len(),
        };
        let result = run_partition(&ctx, &part, &control);

        assert_eq!(result.seeds, 36);
        assert_eq!(result.lines.len(), 36);
        // Every x-row is 4 voxels long, so every line has 4 points.
        assert!(result.lines.iter().all(|l| l.len() == 4));

        let mut expected = 0;
        for line in &result.lines {
            for &idx in line {
                assert_eq!(idx, expected);
                expected += 1;
            }
        }
        assert_eq!(expected, result.points.len());
        assert_eq!(control.progress(), 36);
    }

    #[test]
    fn test_masked_voxels_are_not_seeded() {
        let field = uniform_field([4, 4, 4], Matrix3::from_diagonal(&Vector3::new(1.0, 0.1, 0.1)));
        let mut mask = TrackableMask::all(field.extent());
        for i in 0..field.len() / 2 {
            mask.set(i, false);
        }
        let params = TrackingParams::default();
        let ctx = context(&field, &mask, &params);

        let part = Partition {
            index: 0,
            voxels: 0..field.len(),
        };
        let result = run_partition(&ctx, &part, &TrackerControl::new());
        assert_eq!(result.seeds, 32);
    }

    #[test]
    fn test_seed_mask_restricts_seeding_only() {
        let field = uniform_field([5, 1, 1], Matrix3::from_diagonal(&Vector3::new(1.0, 0.1, 0.1)));
        let mask = TrackableMask::all(field.extent());
        let seed_mask = TrackableMask::new([5, 1, 1], vec![false, false, true, false, false]).unwrap();
        let params = TrackingParams::default();
        let mut ctx = context(&field, &mask, &params);
        ctx.seed_mask = Some(&seed_mask);

        let part = Partition {
            index: 0,
            voxels: 0..field.len(),
        };
        let result = run_partition(&ctx, &part, &TrackerControl::new());

        assert_eq!(result.seeds, 1);
        assert_eq!(result.lines.len(), 1);
        // The one streamline still runs through unseeded voxels.
        assert_eq!(result.points.len(), 5);
    }

    #[test]
    fn test_short_tracts_are_discarded() {
        let field = uniform_field([3, 1, 1], Matrix3::from_diagonal(&Vector3::new(1.0, 0.1, 0.1)));
        let mask = TrackableMask::all(field.extent());
        let params = TrackingParams {
            min_tract_length: 2.5,
            ..Default::default()
        };
        let ctx = context(&field, &mask, &params);

        let part = Partition {
            index: 0,
            voxels: 0..field.len(),
        };
        let result = run_partition(&ctx, &part, &TrackerControl::new());

        // Each streamline spans the 3-voxel row: length 2.0 < 2.5.
        assert_eq!(result.seeds, 3);
        assert_eq!(result.discarded_short, 3);
        assert!(result.lines.is_empty());
        assert!(result.points.is_empty());
    }

    #[test]
    fn test_cancelled_before_start_does_nothing() {
        let field = uniform_field([3, 3, 3], Matrix3::from_diagonal(&Vector3::new(1.0, 0.1, 0.1)));
        let mask = TrackableMask::all(field.extent());
        let params = TrackingParams::default();
        let ctx = context(&field, &mask, &params);
        let control = TrackerControl::new();
        control.cancel();

        let part = Partition {
            index: 2,
            voxels: 0..field.len(),
        };
        let result = run_partition(&ctx, &part, &control);

        assert!(result.cancelled);
        assert_eq!(result.partition, 2);
        assert_eq!(result.seeds, 0);
        assert_eq!(control.progress(), 0);

        control.reset();
        assert!(!control.is_cancelled());
    }
}
