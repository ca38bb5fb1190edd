//! Point-set preprocessing filters.
//!
//! The registration pipeline treats these as pluggable
//! `(PointCloud) -> PointCloud` strategies. The set is closed and
//! dispatched by match; extending it means adding a variant here.

mod random_sampling;
mod surface_normal;

pub use random_sampling::{RandomSampling, RandomSamplingConfig};
pub use surface_normal::{SurfaceNormalConfig, SurfaceNormalSampling};

use crate::core::types::PointCloud;

/// A point-set sampling strategy.
#[derive(Debug, Clone, Copy, Default)]
pub enum SamplingFilter {
    /// Pass the cloud through unchanged.
    #[default]
    Identity,
    /// Keep a random fraction of the points.
    Random(RandomSamplingConfig),
    /// Keep a random fraction and attach estimated surface normals.
    SurfaceNormal(SurfaceNormalConfig),
}

impl SamplingFilter {
    /// Apply the strategy to a cloud.
    pub fn apply(&self, cloud: &PointCloud) -> PointCloud {
        match self {
            SamplingFilter::Identity => cloud.clone(),
            SamplingFilter::Random(config) => RandomSampling::new(*config).apply(cloud),
            SamplingFilter::SurfaceNormal(config) => {
                SurfaceNormalSampling::new(*config).apply(cloud)
            }
        }
    }
}
