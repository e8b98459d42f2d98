//! Errors reported to the caller before any tracking work starts.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrackingError {
    #[error("Invalid spacing on axis {axis}: {value} (must be finite and > 0)")]
    InvalidSpacing { axis: usize, value: f64 },

    #[error("Field extent {extent:?} needs {expected} tensors, got {actual}")]
    FieldSizeMismatch {
        extent: [usize; 3],
        expected: usize,
        actual: usize,
    },

    #[error("Extent {extent:?} has more voxels than fit in memory")]
    ExtentTooLarge { extent: [usize; 3] },

    #[error("Mask extent {extent:?} needs {expected} voxels, got {actual}")]
    MaskSizeMismatch {
        extent: [usize; 3],
        expected: usize,
        actual: usize,
    },

    #[error("Mask extent {mask:?} does not match field extent {field:?}")]
    MaskExtentMismatch { mask: [usize; 3], field: [usize; 3] },

    #[error("Seed mask extent {mask:?} does not match field extent {field:?}")]
    SeedMaskExtentMismatch { mask: [usize; 3], field: [usize; 3] },

    #[error("Invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TrackingError>;
