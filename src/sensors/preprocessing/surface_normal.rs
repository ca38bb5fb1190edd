//! Surface-normal-estimating resampler.
//!
//! Subsamples a cloud and attaches a unit normal per kept point, estimated
//! from the covariance of its nearest neighbors. The output feeds the
//! point-to-plane minimizer, which requires reference-side normals.

use crate::core::math::symmetric_eigen3;
use crate::core::types::{PointCloud, Vec3};
use kiddo::{KdTree, SquaredEuclidean};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Configuration for surface-normal resampling.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceNormalConfig {
    /// Probability of keeping each point, in [0, 1].
    ///
    /// Default: 1.0 (estimate a normal for every point)
    pub keep_ratio: f32,

    /// Number of neighbors used to fit the local plane.
    ///
    /// Points with fewer than 3 distinct neighbors are dropped; no plane
    /// can be fitted through them.
    /// Default: 5
    pub knn: usize,

    /// RNG seed for the subsampling step.
    pub seed: u64,
}

impl Default for SurfaceNormalConfig {
    fn default() -> Self {
        Self {
            keep_ratio: 1.0,
            knn: 5,
            seed: 0,
        }
    }
}

/// Resampler that estimates surface normals from neighborhood covariance.
///
/// The normal at a point is the eigenvector of the smallest eigenvalue of
/// its neighborhood's covariance matrix, oriented toward the sensor origin
/// so that normals on one surface agree in sign.
#[derive(Debug, Clone)]
pub struct SurfaceNormalSampling {
    config: SurfaceNormalConfig,
}

impl SurfaceNormalSampling {
    /// Create a new resampler.
    pub fn new(config: SurfaceNormalConfig) -> Self {
        Self { config }
    }

    /// Get the current configuration.
    pub fn config(&self) -> &SurfaceNormalConfig {
        &self.config
    }

    /// Apply the filter, producing a cloud that carries normals.
    pub fn apply(&self, cloud: &PointCloud) -> PointCloud {
        let knn = self.config.knn.max(3);
        if cloud.len() < knn {
            return PointCloud::new();
        }

        let mut tree: KdTree<f32, 3> = KdTree::new();
        for (i, p) in cloud.points().iter().enumerate() {
            tree.add(&p.to_array(), i as u64);
        }

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut out = PointCloud::with_capacity(cloud.len());

        for i in 0..cloud.len() {
            if self.config.keep_ratio < 1.0 && rng.gen::<f32>() >= self.config.keep_ratio {
                continue;
            }
            let point = cloud.point_at(i);
            // Query one extra neighbor; the nearest hit is the point itself.
            let neighbors = tree.nearest_n::<SquaredEuclidean>(&point.to_array(), knn + 1);
            let neighbor_points: Vec<Vec3> = neighbors
                .iter()
                .filter(|n| n.item as usize != i)
                .map(|n| cloud.point_at(n.item as usize))
                .collect();
            if neighbor_points.len() < 3 {
                continue;
            }

            if let Some(normal) = estimate_normal(point, &neighbor_points) {
                out.push_with_normal(point, normal);
            }
        }
        out
    }
}

/// Fit a plane through `point` and its neighbors; return its unit normal
/// oriented toward the origin (the sensor position in the local frame).
fn estimate_normal(point: Vec3, neighbors: &[Vec3]) -> Option<Vec3> {
    let mut mean = point;
    for n in neighbors {
        mean += *n;
    }
    let count = (neighbors.len() + 1) as f32;
    mean = mean * (1.0 / count);

    let mut cov = [[0.0f32; 3]; 3];
    let mut accumulate = |p: Vec3| {
        let d = p - mean;
        let d = [d.x, d.y, d.z];
        for r in 0..3 {
            for c in 0..3 {
                cov[r][c] += d[r] * d[c];
            }
        }
    };
    accumulate(point);
    for n in neighbors {
        accumulate(*n);
    }

    let (values, vectors) = symmetric_eigen3(&cov);
    let mut min_idx = 0;
    for j in 1..3 {
        if values[j] < values[min_idx] {
            min_idx = j;
        }
    }
    let normal = Vec3::new(vectors[0][min_idx], vectors[1][min_idx], vectors[2][min_idx])
        .normalized()?;

    // Orient toward the sensor: the view ray runs from the origin to the
    // point, and the surface faces back along it.
    if normal.dot(&point) > 0.0 {
        Some(-normal)
    } else {
        Some(normal)
    }
}
