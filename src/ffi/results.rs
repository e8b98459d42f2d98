//! Running the tracker and reading back its topology.

use log::warn;

use super::lifecycle::TrackerHandle;

/// Runs the tracker on the current field and mask and stores the result.
///
/// # Safety
/// - `ptr` must be a valid tracker pointer, or null
///
/// # Returns
/// 0 on success, 1 on null pointer or missing field, 2 on a configuration error.
#[no_mangle]
pub unsafe extern "C" fn dt_tracker_run(ptr: *const TrackerHandle) -> i32 {
    if ptr.is_null() {
        return 1;
    }

    let handle = &*ptr;
    let field = match &handle.field {
        Some(field) => field,
        None => return 1,
    };

    let result = handle
        .tracker
        .track_with_control(field, handle.mask.as_ref(), None, &handle.control);
    let output = match result {
        Ok(output) => output,
        Err(e) => {
            warn!("dt_tracker_run: {e}");
            return 2;
        }
    };

    match handle.output.lock() {
        Ok(mut slot) => {
            *slot = Some(output);
            0
        }
        Err(_) => 2,
    }
}

/// Requests cancellation of a run in progress on another thread.
///
/// `dt_tracker_run` clears the request when it starts, so a cancel sent
/// before the run begins scanning has no effect.
///
/// # Safety
/// - `ptr` must be a valid tracker pointer, or null
#[no_mangle]
pub unsafe extern "C" fn dt_tracker_cancel(ptr: *const TrackerHandle) {
    if ptr.is_null() {
        return;
    }
    (*ptr).control.cancel();
}

/// Number of points in the last result, or 0 if there is none.
///
/// # Safety
/// - `ptr` must be a valid tracker pointer, or null
#[no_mangle]
pub unsafe extern "C" fn dt_tracker_point_count(ptr: *const TrackerHandle) -> u64 {
    with_output(ptr, |out| out.topology.num_points() as u64).unwrap_or(0)
}

/// Number of lines in the last result, or 0 if there is none.
///
/// # Safety
/// - `ptr` must be a valid tracker pointer, or null
#[no_mangle]
pub unsafe extern "C" fn dt_tracker_line_count(ptr: *const TrackerHandle) -> u64 {
    with_output(ptr, |out| out.topology.num_lines() as u64).unwrap_or(0)
}

/// Copies all points as packed `x, y, z` doubles.
///
/// # Safety
/// - `ptr` must be a valid tracker pointer, or null
/// - `out_xyz` must point to at least `3 * dt_tracker_point_count()` doubles
///
/// # Returns
/// Number of points written.
#[no_mangle]
pub unsafe extern "C" fn dt_tracker_copy_points(
    ptr: *const TrackerHandle,
    out_xyz: *mut f64,
) -> u64 {
    if out_xyz.is_null() {
        return 0;
    }

    with_output(ptr, |out| {
        let points = &out.topology.points;
        let buf = std::slice::from_raw_parts_mut(out_xyz, points.len() * 3);
        for (dst, p) in buf.chunks_exact_mut(3).zip(points) {
            dst.copy_from_slice(&[p.x, p.y, p.z]);
        }
        points.len() as u64
    })
    .unwrap_or(0)
}

/// Number of point indices in line `line`, or 0 if it does not exist.
///
/// # Safety
/// - `ptr` must be a valid tracker pointer, or null
#[no_mangle]
pub unsafe extern "C" fn dt_tracker_line_length(ptr: *const TrackerHandle, line: u64) -> u64 {
    with_output(ptr, |out| {
        out.topology
            .lines
            .get(line as usize)
            .map_or(0, |l| l.len() as u64)
    })
    .unwrap_or(0)
}

/// Copies the point indices of line `line`.
///
/// # Safety
/// - `ptr` must be a valid tracker pointer, or null
/// - `out_idx` must point to at least `dt_tracker_line_length(line)` integers
///
/// # Returns
/// Number of indices written, or 0 if the line does not exist.
#[no_mangle]
pub unsafe extern "C" fn dt_tracker_copy_line(
    ptr: *const TrackerHandle,
    line: u64,
    out_idx: *mut u64,
) -> u64 {
    if out_idx.is_null() {
        return 0;
    }

    with_output(ptr, |out| match out.topology.lines.get(line as usize) {
        Some(indices) => {
            let buf = std::slice::from_raw_parts_mut(out_idx, indices.len());
            for (dst, &idx) in buf.iter_mut().zip(indices) {
                *dst = idx as u64;
            }
            indices.len() as u64
        }
        None => 0,
    })
    .unwrap_or(0)
}

unsafe fn with_output<T>(
    ptr: *const TrackerHandle,
    f: impl FnOnce(&crate::tracking::TrackingOutput) -> T,
) -> Option<T> {
    if ptr.is_null() {
        return None;
    }
    let slot = (*ptr).output.lock().ok()?;
    slot.as_ref().map(f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ffi::lifecycle::{dt_tracker_create, dt_tracker_destroy};
    use crate::ffi::volume::{dt_tracker_set_field, dt_tracker_set_mask};
    use std::ptr;

    /// 4x1x1 volume of x-aligned tensors.
    fn x_row_components() -> Vec<f32> {
        [1.0f32, 0.0, 0.0, 0.1, 0.0, 0.1].repeat(4)
    }

    #[test]
    fn test_run_and_read_back() {
        let components = x_row_components();
        unsafe {
            let handle = dt_tracker_create(ptr::null());
            assert_eq!(dt_tracker_run(handle), 1, "run without a field must fail");

            dt_tracker_set_field(handle, 4, 1, 1, 1.0, 1.0, 1.0, components.as_ptr());
            assert_eq!(dt_tracker_run(handle), 0);

            // One streamline per voxel, each spanning the whole row.
            assert_eq!(dt_tracker_line_count(handle), 4);
            assert_eq!(dt_tracker_point_count(handle), 16);

            let mut xyz = vec![0.0f64; 16 * 3];
            assert_eq!(dt_tracker_copy_points(handle, xyz.as_mut_ptr()), 16);
            assert!(xyz.chunks(3).all(|p| p[1] == 0.0 && p[2] == 0.0));
            assert!(xyz.chunks(3).all(|p| [0.0, 1.0, 2.0, 3.0].contains(&p[0])));

            assert_eq!(dt_tracker_line_length(handle, 1), 4);
            let mut idx = vec![0u64; 4];
            assert_eq!(dt_tracker_copy_line(handle, 1, idx.as_mut_ptr()), 4);
            assert_eq!(idx, vec![4, 5, 6, 7]);

            assert_eq!(dt_tracker_line_length(handle, 99), 0);
            assert_eq!(dt_tracker_copy_line(handle, 99, idx.as_mut_ptr()), 0);

            dt_tracker_destroy(handle);
        }
    }

    #[test]
    fn test_mask_limits_run() {
        let components = x_row_components();
        let mask = [1u8, 1, 0, 0];
        unsafe {
            let handle = dt_tracker_create(ptr::null());
            dt_tracker_set_field(handle, 4, 1, 1, 1.0, 1.0, 1.0, components.as_ptr());
            dt_tracker_set_mask(handle, mask.as_ptr());
            assert_eq!(dt_tracker_run(handle), 0);

            assert_eq!(dt_tracker_line_count(handle), 2);
            assert_eq!(dt_tracker_point_count(handle), 4);
            dt_tracker_destroy(handle);
        }
    }

    #[test]
    fn test_cancel_before_run_is_cleared() {
        let components = x_row_components();
        unsafe {
            let handle = dt_tracker_create(ptr::null());
            dt_tracker_set_field(handle, 4, 1, 1, 1.0, 1.0, 1.0, components.as_ptr());

            dt_tracker_cancel(handle);
            assert_eq!(dt_tracker_run(handle), 0);

            assert_eq!(dt_tracker_line_count(handle), 4);
            let cancelled = with_output(handle, |out| out.stats.cancelled);
            assert_eq!(cancelled, Some(false));
            dt_tracker_destroy(handle);
        }
    }

    #[test]
    fn test_null_pointer_handling() {
        let mut xyz = [0.0f64; 3];
        let mut idx = [0u64; 1];
        unsafe {
            assert_eq!(dt_tracker_run(ptr::null()), 1);
            dt_tracker_cancel(ptr::null());
            assert_eq!(dt_tracker_point_count(ptr::null()), 0);
            assert_eq!(dt_tracker_line_count(ptr::null()), 0);
            assert_eq!(dt_tracker_copy_points(ptr::null(), xyz.as_mut_ptr()), 0);
            assert_eq!(dt_tracker_line_length(ptr::null(), 0), 0);
            assert_eq!(dt_tracker_copy_line(ptr::null(), 0, idx.as_mut_ptr()), 0);

            // A live handle with no result yet reads as empty.
            let handle = dt_tracker_create(ptr::null());
            assert_eq!(dt_tracker_point_count(handle), 0);
            assert_eq!(dt_tracker_copy_points(handle, ptr::null_mut()), 0);
            dt_tracker_destroy(handle);
        }
    }
}
