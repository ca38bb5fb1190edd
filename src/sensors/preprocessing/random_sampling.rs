//! Random subsampling of point clouds.

use crate::core::types::PointCloud;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Configuration for random subsampling.
#[derive(Debug, Clone, Copy)]
pub struct RandomSamplingConfig {
    /// Probability of keeping each point, in [0, 1].
    ///
    /// Default: 0.5
    pub keep_ratio: f32,

    /// RNG seed. Sampling must be reproducible across runs with identical
    /// inputs, so the generator is seeded rather than entropy-based.
    ///
    /// Default: 0
    pub seed: u64,
}

impl Default for RandomSamplingConfig {
    fn default() -> Self {
        Self {
            keep_ratio: 0.5,
            seed: 0,
        }
    }
}

/// Random subsampler: keeps each point independently with `keep_ratio`
/// probability, carrying its normal along when present.
#[derive(Debug, Clone)]
pub struct RandomSampling {
    config: RandomSamplingConfig,
}

impl RandomSampling {
    /// Create a new subsampler.
    pub fn new(config: RandomSamplingConfig) -> Self {
        Self { config }
    }

    /// Get the current configuration.
    pub fn config(&self) -> &RandomSamplingConfig {
        &self.config
    }

    /// Apply the filter, producing a reduced cloud.
    pub fn apply(&self, cloud: &PointCloud) -> PointCloud {
        if self.config.keep_ratio >= 1.0 {
            return cloud.clone();
        }

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut out = PointCloud::with_capacity(
            (cloud.len() as f32 * self.config.keep_ratio).ceil() as usize,
        );
        for i in 0..cloud.len() {
            if rng.gen::<f32>() >= self.config.keep_ratio {
                continue;
            }
            match cloud.normal_at(i) {
                Some(normal) => out.push_with_normal(cloud.point_at(i), normal),
                None => out.push(cloud.point_at(i)),
            }
        }
        out
    }
}
