//! C FFI layer for host applications.
//!
//! This module exports C ABI functions so a non-Rust host can hand over a
//! tensor volume, run the tracker and read back the polyline topology.
//! All functions are marked with `#[no_mangle]` and use `extern "C"`.
//!
//! The actual logic is in the `tracking` module. These functions are thin wrappers
//! that handle null checks, pointer safety, and C-to-Rust conversions.

pub mod lifecycle;
pub mod results;
pub mod volume;

pub use lifecycle::{dt_tracker_create, dt_tracker_destroy, TrackerHandle};
pub use results::{
    dt_tracker_cancel, dt_tracker_copy_line, dt_tracker_copy_points, dt_tracker_line_count,
    dt_tracker_line_length, dt_tracker_point_count, dt_tracker_run,
};
pub use volume::{dt_tracker_set_field, dt_tracker_set_mask};
