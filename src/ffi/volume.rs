//! Tensor field and mask upload.

use log::warn;

use super::lifecycle::TrackerHandle;
use crate::tracking::field::{checked_voxel_count, voxel_count, TENSOR_COMPONENTS};
use crate::tracking::{TensorField, TrackableMask};

/// Copies a tensor volume into the tracker, replacing any previous field and mask.
///
/// # Layout
/// `components` holds six floats per voxel `(xx, xy, xz, yy, yz, zz)`, voxels in
/// z,y,x order (z changes slowest, x changes fastest).
///
/// # Safety
/// - `ptr` must be a valid tracker pointer, or null
/// - `components` must point to at least `nx * ny * nz * 6` floats
///
/// # Returns
/// 0 on success, 1 on null pointer, 2 if the extent or spacing is invalid
/// (including an extent whose component count overflows).
#[no_mangle]
pub unsafe extern "C" fn dt_tracker_set_field(
    ptr: *mut TrackerHandle,
    nx: u32,
    ny: u32,
    nz: u32,
    sx: f64,
    sy: f64,
    sz: f64,
    components: *const f32,
) -> i32 {
    if ptr.is_null() || components.is_null() {
        return 1;
    }

    let handle = &mut *ptr;
    let extent = [nx as usize, ny as usize, nz as usize];
    let len = match checked_voxel_count(extent).and_then(|n| n.checked_mul(TENSOR_COMPONENTS)) {
        Some(len) => len,
        None => {
            warn!("dt_tracker_set_field: extent {extent:?} is too large");
            return 2;
        }
    };
    let data = std::slice::from_raw_parts(components, len);

    match TensorField::from_components_f32(extent, [sx, sy, sz], data) {
        Ok(field) => {
            handle.field = Some(field);
            handle.mask = None;
            0
        }
        Err(e) => {
            warn!("dt_tracker_set_field: {e}");
            2
        }
    }
}

/// Sets the trackable mask for the current field. Non-zero bytes are trackable.
///
/// # Safety
/// - `ptr` must be a valid tracker pointer with a field set, or null
/// - `mask` must point to one byte per voxel of the current field
///
/// # Returns
/// 0 on success, 1 on null pointer or missing field.
#[no_mangle]
pub unsafe extern "C" fn dt_tracker_set_mask(ptr: *mut TrackerHandle, mask: *const u8) -> i32 {
    if ptr.is_null() || mask.is_null() {
        return 1;
    }

    let handle = &mut *ptr;
    let extent = match &handle.field {
        Some(field) => field.extent(),
        None => return 1,
    };

    let values = std::slice::from_raw_parts(mask, voxel_count(extent));
    match TrackableMask::from_u8(extent, values) {
        Ok(m) => {
            handle.mask = Some(m);
            0
        }
        Err(e) => {
            warn!("dt_tracker_set_mask: {e}");
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ffi::lifecycle::{dt_tracker_create, dt_tracker_destroy};
    use std::ptr;

    #[test]
    fn test_set_field_and_mask() {
        let components = vec![0.0f32; 2 * 2 * 2 * 6];
        let mask = vec![1u8; 8];
        unsafe {
            let handle = dt_tracker_create(ptr::null());

            // Mask before field is refused
            assert_eq!(dt_tracker_set_mask(handle, mask.as_ptr()), 1);

            assert_eq!(
                dt_tracker_set_field(handle, 2, 2, 2, 1.0, 1.0, 1.0, components.as_ptr()),
                0
            );
            assert_eq!((*handle).field.as_ref().unwrap().extent(), [2, 2, 2]);

            assert_eq!(dt_tracker_set_mask(handle, mask.as_ptr()), 0);
            assert_eq!((*handle).mask.as_ref().unwrap().count(), 8);

            dt_tracker_destroy(handle);
        }
    }

    #[test]
    fn test_zero_spacing_rejected() {
        let components = vec![0.0f32; 6];
        unsafe {
            let handle = dt_tracker_create(ptr::null());
            assert_eq!(
                dt_tracker_set_field(handle, 1, 1, 1, 1.0, 0.0, 1.0, components.as_ptr()),
                2
            );
            assert!((*handle).field.is_none());
            dt_tracker_destroy(handle);
        }
    }

    #[test]
    fn test_oversized_extent_rejected() {
        let components = vec![0.0f32; 6];
        unsafe {
            let handle = dt_tracker_create(ptr::null());
            // Never dereferenced: the size check fails before the slice is built.
            assert_eq!(
                dt_tracker_set_field(
                    handle,
                    u32::MAX,
                    u32::MAX,
                    u32::MAX,
                    1.0,
                    1.0,
                    1.0,
                    components.as_ptr()
                ),
                2
            );
            assert!((*handle).field.is_none());
            dt_tracker_destroy(handle);
        }
    }

    #[test]
    fn test_null_pointer_handling() {
        let components = vec![0.0f32; 6];
        unsafe {
            assert_eq!(
                dt_tracker_set_field(ptr::null_mut(), 1, 1, 1, 1.0, 1.0, 1.0, components.as_ptr()),
                1
            );
            assert_eq!(dt_tracker_set_mask(ptr::null_mut(), ptr::null()), 1);
        }
    }
}
