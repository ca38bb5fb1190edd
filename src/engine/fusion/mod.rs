//! Skeleton fusion engine.
//!
//! Composes registration and temporal filtering into the per-cycle
//! pipeline, and owns the session-lifetime state: one filter per joint,
//! per-sensor fallback transforms, and the scale-calibration state.

mod calibration;
mod joint_filter;
mod pipeline;

pub use calibration::{CalibrationError, ReferenceAnchors, ScaleCalibration};
pub use joint_filter::{JointFilter, JointFilterConfig};
pub use pipeline::{AlignmentStrategy, FusedSkeleton, FusionConfig, FusionEngine};
