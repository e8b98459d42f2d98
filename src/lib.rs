//! DTI Tracker - deterministic diffusion-tensor streamline tractography
//!
//! Follows the principal diffusion direction through a 3D tensor volume and
//! returns the traced fibers as an indexed polyline topology. The volume is
//! split into contiguous partitions scanned in parallel; results are merged
//! in partition order, so a run is reproducible for a given input.
//!
//! Rust callers use [`TensorTracker`] directly. The `ffi` module exposes the
//! same run through a C ABI for host applications.

pub mod error;
pub mod ffi;
pub mod params;
pub mod tracking;


pub use error::{Result, TrackingError};
pub use params::{load_params, parse_params, TrackingParams};
pub use tracking::{
    PolylineTopology, TensorField, TensorTracker, TrackableMask, TrackerControl, TrackingOutput,
    TrackingStats,
};
