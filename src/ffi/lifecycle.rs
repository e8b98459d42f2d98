//! Tracker handle creation and destruction.

use std::ffi::{c_char, CStr};
use std::sync::Mutex;

use log::warn;

use crate::params::{parse_params, TrackingParams};
use crate::tracking::{TensorField, TensorTracker, TrackableMask, TrackerControl, TrackingOutput};

/// Opaque state behind a C tracker pointer.
pub struct TrackerHandle {
    pub(crate) tracker: TensorTracker,
    pub(crate) field: Option<TensorField>,
    pub(crate) mask: Option<TrackableMask>,
    pub(crate) control: TrackerControl,
    pub(crate) output: Mutex<Option<TrackingOutput>>,
}

/// Creates a tracker from a JSON parameter string.
///
/// # Returns
/// A pointer to a new tracker, or null if the parameters do not parse or validate.
/// A null `params_json` selects the default parameters.
///
/// # Safety
/// - `params_json` must be null or a valid NUL-terminated string
/// - The returned pointer must eventually be freed with `dt_tracker_destroy()`.
#[no_mangle]
pub unsafe extern "C" fn dt_tracker_create(params_json: *const c_char) -> *mut TrackerHandle {
    let params = if params_json.is_null() {
        TrackingParams::default()
    } else {
        let parsed = CStr::from_ptr(params_json)
            .to_str()
            .map_err(|e| e.to_string())
            .and_then(|json| parse_params(json).map_err(|e| e.to_string()));
        match parsed {
            Ok(params) => params,
            Err(e) => {
                warn!("dt_tracker_create: {e}");
                return std::ptr::null_mut();
            }
        }
    };

    match TensorTracker::new(params) {
        Ok(tracker) => Box::into_raw(Box::new(TrackerHandle {
            tracker,
            field: None,
            mask: None,
            control: TrackerControl::new(),
            output: Mutex::new(None),
        })),
        Err(e) => {
            warn!("dt_tracker_create: {e}");
            std::ptr::null_mut()
        }
    }
}

/// Destroys a tracker and frees its memory.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by `dt_tracker_create()`, or null
/// - `ptr` must not be used after this call
#[no_mangle]
pub unsafe extern "C" fn dt_tracker_destroy(ptr: *mut TrackerHandle) {
    if !ptr.is_null() {
        drop(Box::from_raw(ptr));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;
    use std::ptr;

    #[test]
    fn test_create_and_destroy() {
        unsafe {
            let handle = dt_tracker_create(ptr::null());
            assert!(!handle.is_null());
            assert_eq!((*handle).tracker.params(), &TrackingParams::default());

            // Should not crash
            dt_tracker_destroy(handle);
        }
    }

    #[test]
    fn test_create_with_json() {
        let json = CString::new(r#"{ "fa_threshold": 0.3, "num_threads": 2 }"#).unwrap();
        unsafe {
            let handle = dt_tracker_create(json.as_ptr());
            assert!(!handle.is_null());
            assert_eq!((*handle).tracker.params().fa_threshold, 0.3);
            dt_tracker_destroy(handle);
        }
    }

    #[test]
    fn test_create_rejects_bad_params() {
        let malformed = CString::new("{ not json").unwrap();
        let invalid = CString::new(r#"{ "seeds_per_voxel": 0 }"#).unwrap();
        unsafe {
            assert!(dt_tracker_create(malformed.as_ptr()).is_null());
            assert!(dt_tracker_create(invalid.as_ptr()).is_null());
        }
    }

    #[test]
    fn test_destroy_null() {
        unsafe {
            // Should not crash
            dt_tracker_destroy(ptr::null_mut());
        }
    }
}
