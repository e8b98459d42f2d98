//! Tracking configuration.
//!
//! `TrackingParams` is read once at the start of a run and never mutated while
//! partitions are being scanned. Every field has a default, so a JSON config
//! only needs to name the options it changes.

use std::fs;
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackingError};

/// Configured step sizes below this are replaced by `0.1 * min(spacing)`.
pub const MIN_CONFIGURED_STEP: f64 = 0.005;

/// Seed used for voxel jitter when none is configured.
pub const DEFAULT_RNG_SEED: u64 = 0x5EED_D71_5EED;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingParams {
    /// Voxels with FA at or below this value stop a streamline.
    pub fa_threshold: f64,
    /// Physical step length. Values below 0.005 are auto-derived from spacing.
    pub step_size: f64,
    /// Step budget shared by the forward and backward pass of one streamline.
    pub max_length: usize,
    pub seeds_per_voxel: usize,
    /// Cosine of the largest allowed turn between consecutive steps.
    pub angular_threshold: f64,
    /// Weight of the local principal direction in the deflection blend.
    pub f: f64,
    /// Weight of the tensor-deflected previous direction.
    pub g: f64,
    /// Worker count; 0 runs a single worker.
    pub num_threads: usize,
    /// Streamlines shorter than this physical length are discarded.
    pub min_tract_length: f64,
    pub rng_seed: u64,
}

impl Default for TrackingParams {
    fn default() -> Self {
        Self {
            fa_threshold: 0.2,
            step_size: 1.0,
            max_length: 10_000,
            seeds_per_voxel: 1,
            angular_threshold: 0.7,
            f: 1.0,
            g: 0.0,
            num_threads: 0,
            min_tract_length: 0.0,
            rng_seed: DEFAULT_RNG_SEED,
        }
    }
}

impl TrackingParams {
    pub fn validate(&self) -> Result<()> {
        require_finite("fa_threshold", self.fa_threshold)?;
        require_finite("angular_threshold", self.angular_threshold)?;
        require_finite("step_size", self.step_size)?;
        require_unit_interval("f", self.f)?;
        require_unit_interval("g", self.g)?;

        if self.max_length == 0 {
            return Err(invalid("max_length", "must be at least 1".into()));
        }
        if self.seeds_per_voxel == 0 {
            return Err(invalid("seeds_per_voxel", "must be at least 1".into()));
        }
        if !self.min_tract_length.is_finite() || self.min_tract_length < 0.0 {
            return Err(invalid(
                "min_tract_length",
                format!("{} is not a non-negative length", self.min_tract_length),
            ));
        }
        Ok(())
    }

    /// Step length actually used for a volume with the given spacing.
    pub fn effective_step_size(&self, spacing: [f64; 3]) -> f64 {
        if self.step_size < MIN_CONFIGURED_STEP {
            let min_spacing = spacing.iter().copied().fold(f64::INFINITY, f64::min);
            let derived = 0.1 * min_spacing;
            debug!(
                "step_size {} below {}, using 0.1 * min spacing = {}",
                self.step_size, MIN_CONFIGURED_STEP, derived
            );
            derived
        } else {
            self.step_size
        }
    }

    /// Number of partitions (and workers) a run is split into.
    pub fn worker_count(&self) -> usize {
        self.num_threads.max(1)
    }
}

fn invalid(name: &'static str, reason: String) -> TrackingError {
    TrackingError::InvalidParameter { name, reason }
}

fn require_finite(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(invalid(name, format!("{value} is not finite")))
    }
}

fn require_unit_interval(name: &'static str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(name, format!("{value} is outside [0, 1]")))
    }
}

/// Load parameters from a JSON file. Missing keys take their defaults.
pub fn load_params(path: &Path) -> Result<TrackingParams> {
    let data = fs::read_to_string(path)?;
    parse_params(&data)
}

pub fn parse_params(json: &str) -> Result<TrackingParams> {
    let params: TrackingParams = serde_json::from_str(json)?;
    Ok(params)
}
