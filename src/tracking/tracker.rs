//! Run orchestration: validate, partition, scan in parallel, join, merge.

use std::time::Instant;

use log::{info, warn};
use rayon::prelude::*;

use super::field::{TensorField, TrackableMask};
use super::integrator::StepConfig;
use super::merge::{merge_results, PolylineTopology};
use super::partition::{run_partition, split_partitions, TrackerControl, TrackingContext};
use crate::error::{Result, TrackingError};
use crate::params::TrackingParams;

/// Counters gathered over one run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TrackingStats {
    pub partitions: usize,
    pub seeds: usize,
    pub streamlines: usize,
    pub discarded_short: usize,
    pub points: usize,
    pub cancelled: bool,
}

/// Merged topology of a run and its counters.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrackingOutput {
    pub topology: PolylineTopology,
    pub stats: TrackingStats,
    /// Physical step length actually used.
    pub step_size: f64,
}

/// Deterministic streamline tracker with a fixed worker pool.
pub struct TensorTracker {
    params: TrackingParams,
    thread_pool: rayon::ThreadPool,
}

impl TensorTracker {
    /// Validate `params` and build a pool of `params.worker_count()` threads.
    pub fn new(params: TrackingParams) -> Result<Self> {
        params.validate()?;
        let thread_pool = rayon::ThreadPoolBuilder::new()
            .num_threads(params.worker_count())
            .build()?;

        Ok(TensorTracker {
            params,
            thread_pool,
        })
    }

    pub fn params(&self) -> &TrackingParams {
        &self.params
    }

    /// Track the whole field. A missing mask means every voxel is trackable.
    pub fn track(
        &self,
        field: &TensorField,
        mask: Option<&TrackableMask>,
    ) -> Result<TrackingOutput> {
        self.track_with_control(field, mask, None, &TrackerControl::new())
    }

    /// Track with an optional seed mask and caller-owned cancellation control.
    ///
    /// The control is reset at the start of the run, so cancellation must be
    /// requested while the run is in progress.
    pub fn track_with_control(
        &self,
        field: &TensorField,
        mask: Option<&TrackableMask>,
        seed_mask: Option<&TrackableMask>,
        control: &TrackerControl,
    ) -> Result<TrackingOutput> {
        let extent = field.extent();
        if let Some(m) = mask {
            if m.extent() != extent {
                return Err(TrackingError::MaskExtentMismatch {
                    mask: m.extent(),
                    field: extent,
                });
            }
        }
        if let Some(m) = seed_mask {
            if m.extent() != extent {
                return Err(TrackingError::SeedMaskExtentMismatch {
                    mask: m.extent(),
                    field: extent,
                });
            }
        }

        let synthesized;
        let mask = match mask {
            Some(m) => m,
            None => {
                synthesized = TrackableMask::all(extent);
                &synthesized
            }
        };

        let step = StepConfig::resolve(&self.params, field.spacing());
        let ctx = TrackingContext {
            field,
            mask,
            seed_mask,
            step,
            seeds_per_voxel: self.params.seeds_per_voxel,
            rng_seed: self.params.rng_seed,
            min_tract_length: self.params.min_tract_length,
        };

        let partitions = split_partitions(field.len(), self.params.worker_count());
        info!(
            "tracking {:?} volume: {} partitions, step {:.4}, fa > {}, cos angle >= {}",
            extent,
            partitions.len(),
            step.step_size,
            step.fa_threshold,
            step.angular_threshold
        );

        control.reset();
        let start = Instant::now();

        let results: Vec<_> = self.thread_pool.install(|| {
            partitions
                .par_iter()
                .map(|partition| run_partition(&ctx, partition, control))
                .collect()
        });

        let mut stats = TrackingStats {
            partitions: partitions.len(),
            ..Default::default()
        };
        for r in &results {
            stats.seeds += r.seeds;
            stats.streamlines += r.lines.len();
            stats.discarded_short += r.discarded_short;
            stats.points += r.points.len();
            stats.cancelled |= r.cancelled;
        }

        let topology = merge_results(results);

        if stats.cancelled {
            warn!(
                "tracking cancelled after {} voxels; returning {} partial streamlines",
                control.progress(),
                stats.streamlines
            );
        }
        info!(
            "traced {} streamlines ({} points) from {} seeds in {} ms",
            stats.streamlines,
            stats.points,
            stats.seeds,
            start.elapsed().as_millis()
        );

        Ok(TrackingOutput {
            topology,
            stats,
            step_size: step.step_size,
        })
    }
}
