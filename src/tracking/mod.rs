//! Core tracking logic.
//!
//! This module contains the tensor volume, the per-step integrator, streamline
//! construction, the partitioned parallel scan and the final merge.
//! The FFI layer in `ffi/` calls into `tracker`.

pub mod direction;
pub mod field;
pub mod integrator;
pub mod merge;
pub mod partition;
pub mod streamline;
pub mod tracker;

pub use direction::{analyze, fractional_anisotropy, TensorAnalysis};
pub use field::{Tensor, TensorField, TrackableMask};
pub use integrator::{advance, round_half_away, Pass, Step, StepConfig, StopReason};
pub use merge::{merge_results, PolylineTopology};
pub use partition::{run_partition, split_partitions, Partition, PartitionResult, TrackerControl};
pub use streamline::{build_streamline, polyline_length, Seed, Streamline};
pub use tracker::{TensorTracker, TrackingOutput, TrackingStats};
