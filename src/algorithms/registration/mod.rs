//! Rigid registration between point sets.
//!
//! # Algorithms
//!
//! - [`Icp`]: iterative closest point with a point-to-plane metric
//! - [`absolute_orientation::solve`]: closed-form rigid(+scale) alignment
//!   for small labelled correspondence sets
//!
//! The ICP loop composes the pieces in this module: nearest-neighbor
//! [`correspondence`] search, [`outlier`] weighting, and the
//! [`point_to_plane`] incremental minimizer.

pub mod absolute_orientation;
pub mod correspondence;
pub mod outlier;
pub mod point_to_plane;

mod icp;

pub use absolute_orientation::AbsoluteOrientation;
pub use correspondence::{MatchedPairs, Matches};
pub use icp::{Icp, IcpConfig, IcpResult};
pub use outlier::{OutlierFilter, WeightMatrix};

use thiserror::Error;

/// Errors from registration operations.
///
/// Shape and normals variants are caller contract violations; the
/// degenerate and insufficient variants are per-run recoverable, and the
/// caller falls back rather than applying a bad correction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("correspondence matrix has {actual} columns, expected {expected} (one per reading point)")]
    MatchColumnMismatch { expected: usize, actual: usize },

    #[error("weight matrix is {rows}x{cols}, expected {expected_rows}x{expected_cols} to match the correspondences")]
    WeightShapeMismatch {
        rows: usize,
        cols: usize,
        expected_rows: usize,
        expected_cols: usize,
    },

    #[error("correspondence index {index} is out of range for a reference set of {len} points")]
    MatchIndexOutOfRange { index: usize, len: usize },

    #[error("reference points carry no normals; run a surface-normal filter on the reference set")]
    MissingNormals,

    #[error("point sets differ in length: {from} vs {to}")]
    LengthMismatch { from: usize, to: usize },

    #[error("need at least {required} weighted correspondences, got {actual}")]
    InsufficientCorrespondences { required: usize, actual: usize },

    #[error("degenerate correspondence geometry: the normal equations are not positive-definite")]
    DegenerateGeometry,
}
