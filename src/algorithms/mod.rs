//! Algorithm layer.
//!
//! Depends on core and sensors. Registration (correspondence search,
//! outlier weighting, point-to-plane ICP, closed-form alignment) lives
//! here; the fusion engine composes it per cycle.

pub mod registration;
