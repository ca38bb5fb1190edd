//! Iterative closest point with a point-to-plane metric.

use log::debug;

use super::correspondence::{self, matched_pairs};
use super::outlier::OutlierFilter;
use super::point_to_plane;
use super::RegistrationError;
use crate::core::types::{PointCloud, RigidTransform};
use crate::sensors::preprocessing::{SamplingFilter, SurfaceNormalConfig};

/// Configuration for the ICP orchestrator.
#[derive(Debug, Clone, Copy)]
pub struct IcpConfig {
    /// Iteration cap. Hitting it terminates successfully with
    /// `converged = false`.
    ///
    /// Default: 40
    pub max_iterations: u32,

    /// Convergence threshold on the incremental rotation (radians).
    ///
    /// Default: 1e-4
    pub rotation_epsilon: f32,

    /// Convergence threshold on the incremental translation (meters).
    ///
    /// Default: 1e-4
    pub translation_epsilon: f32,

    /// Neighbors considered per reading point.
    ///
    /// Default: 1
    pub knn: usize,

    /// Filter applied to the (transformed) reading set each iteration.
    pub reading_filter: SamplingFilter,

    /// Filter applied to the reference set once at initialization. Must
    /// produce normals; the point-to-plane metric needs them.
    pub reference_filter: SamplingFilter,

    /// Outlier rejection strategy for candidate correspondences.
    pub outlier_filter: OutlierFilter,
}

impl Default for IcpConfig {
    fn default() -> Self {
        Self {
            max_iterations: 40,
            rotation_epsilon: 1e-4,
            translation_epsilon: 1e-4,
            knn: 1,
            reading_filter: SamplingFilter::Identity,
            reference_filter: SamplingFilter::SurfaceNormal(SurfaceNormalConfig::default()),
            outlier_filter: OutlierFilter::default(),
        }
    }
}

/// Outcome of a successful ICP run.
#[derive(Debug, Clone, Copy)]
pub struct IcpResult {
    /// Final reading→reference transform, including the initial guess.
    pub transform: RigidTransform,
    /// Iterations performed.
    pub iterations: u32,
    /// Whether the increment dropped below the epsilons (false means the
    /// iteration cap was reached).
    pub converged: bool,
    /// Mean absolute point-to-plane residual of the last iteration.
    pub mean_error: f32,
}

/// Point-to-plane ICP.
///
/// Each run: apply the initial transform, then iterate
/// filter → match → weight → minimize → compose until the increment is
/// below the epsilons or the iteration cap is reached. Degenerate
/// geometry aborts the run with an error; the caller decides its
/// fallback (typically the previous cycle's transform).
#[derive(Debug, Clone)]
pub struct Icp {
    config: IcpConfig,
}

impl Icp {
    /// Create a new matcher.
    pub fn new(config: IcpConfig) -> Self {
        Self { config }
    }

    /// Get the current configuration.
    pub fn config(&self) -> &IcpConfig {
        &self.config
    }

    /// Register `reading` onto `reference`, starting from `initial`.
    pub fn compute(
        &self,
        reading: &PointCloud,
        reference: &PointCloud,
        initial: &RigidTransform,
    ) -> Result<IcpResult, RegistrationError> {
        // The reference filter output is loop-invariant, so it runs once
        // and the k-d tree is built from it here.
        let filtered_reference = self.config.reference_filter.apply(reference);
        if !filtered_reference.has_normals() {
            return Err(RegistrationError::MissingNormals);
        }
        if filtered_reference.is_empty() {
            return Err(RegistrationError::InsufficientCorrespondences {
                required: 6,
                actual: 0,
            });
        }
        let reference_tree = correspondence::build_kdtree(&filtered_reference);

        let mut transform = *initial;
        let mut iterations = 0u32;
        let mut mean_error = f32::MAX;

        for iter in 0..self.config.max_iterations {
            iterations = iter + 1;

            let moved = transform.apply_cloud(reading);
            let filtered_reading = self.config.reading_filter.apply(&moved);
            if filtered_reading.is_empty() {
                return Err(RegistrationError::InsufficientCorrespondences {
                    required: 6,
                    actual: 0,
                });
            }

            let matches = correspondence::find_matches_with_tree(
                &filtered_reading,
                filtered_reference.len(),
                &reference_tree,
                self.config.knn,
            );
            let weights =
                self.config
                    .outlier_filter
                    .weights(&filtered_reading, &filtered_reference, &matches);
            let pairs = matched_pairs(&filtered_reading, &filtered_reference, &matches, &weights)?;

            let delta = point_to_plane::minimize(&pairs)?;
            transform = delta.compose(&transform);
            mean_error = mean_plane_residual(&pairs);

            let rotation_change = delta.rotation_angle();
            let translation_change = delta.translation_norm();
            if rotation_change < self.config.rotation_epsilon
                && translation_change < self.config.translation_epsilon
            {
                debug!(
                    "icp converged after {} iterations (residual {:.6})",
                    iterations, mean_error
                );
                return Ok(IcpResult {
                    transform,
                    iterations,
                    converged: true,
                    mean_error,
                });
            }
        }

        debug!(
            "icp hit iteration cap {} (residual {:.6})",
            self.config.max_iterations, mean_error
        );
        Ok(IcpResult {
            transform,
            iterations,
            converged: false,
            mean_error,
        })
    }
}

/// Mean absolute point-to-plane distance over matched pairs.
fn mean_plane_residual(pairs: &super::correspondence::MatchedPairs) -> f32 {
    let normals = match pairs.reference.normals() {
        Some(n) => n,
        None => return f32::MAX,
    };
    if pairs.is_empty() {
        return f32::MAX;
    }
    let mut sum = 0.0f32;
    for i in 0..pairs.len() {
        let delta = pairs.reading.point_at(i) - pairs.reference.point_at(i);
        sum += delta.dot(&normals[i]).abs();
    }
    sum / pairs.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Quaternion, Vec3};

    /// Two walls meeting at a corner, with slight jitter so the k-d tree
    /// never sees perfectly collinear buckets.
    fn corner_cloud(n: usize) -> PointCloud {
        let mut cloud = PointCloud::new();
        for i in 0..n {
            for j in 0..n {
                let u = i as f32 * 0.08;
                let v = j as f32 * 0.08;
                let jitter = (i * n + j) as f32 * 1e-5;
                cloud.push(Vec3::new(u, v, jitter));
                cloud.push(Vec3::new(u, jitter, v + 0.08));
                cloud.push(Vec3::new(jitter, u + 0.08, v + 0.08));
            }
        }
        cloud
    }

    fn test_config() -> IcpConfig {
        IcpConfig {
            reference_filter: SamplingFilter::SurfaceNormal(SurfaceNormalConfig {
                keep_ratio: 1.0,
                knn: 6,
                seed: 0,
            }),
            outlier_filter: OutlierFilter::None,
            ..IcpConfig::default()
        }
    }

    #[test]
    fn test_identity_alignment() {
        let cloud = corner_cloud(8);
        let icp = Icp::new(test_config());
        let result = icp
            .compute(&cloud, &cloud, &RigidTransform::identity())
            .unwrap();
        assert!(result.converged);
        assert!(result.transform.rotation_angle() < 1e-3);
        assert!(result.transform.translation_norm() < 1e-3);
    }

    #[test]
    fn test_recovers_known_offset() {
        let reading = corner_cloud(8);
        let truth = RigidTransform::new(
            Quaternion::from_axis_angle(Vec3::new(0.0, 0.0, 1.0), 0.05),
            Vec3::new(0.03, -0.02, 0.04),
        );
        let reference = truth.apply_cloud(&reading);

        let icp = Icp::new(test_config());
        let result = icp
            .compute(&reading, &reference, &RigidTransform::identity())
            .unwrap();
        assert!(result.converged, "no convergence, residual {}", result.mean_error);

        let error = result.transform.compose(&truth.inverse());
        assert!(error.rotation_angle() < 5e-3, "rotation error {}", error.rotation_angle());
        assert!(error.translation_norm() < 5e-3, "translation error {}", error.translation_norm());
    }

    #[test]
    fn test_idempotent_at_convergence() {
        let reading = corner_cloud(8);
        let truth = RigidTransform::new(
            Quaternion::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), 0.04),
            Vec3::new(0.02, 0.01, -0.03),
        );
        let reference = truth.apply_cloud(&reading);

        let icp = Icp::new(test_config());
        let first = icp
            .compute(&reading, &reference, &RigidTransform::identity())
            .unwrap();
        assert!(first.converged);

        // Re-running from the converged transform must not move it by more
        // than the convergence threshold.
        let second = icp.compute(&reading, &reference, &first.transform).unwrap();
        let drift = second.transform.compose(&first.transform.inverse());
        assert!(drift.rotation_angle() < 2.0 * icp.config().rotation_epsilon);
        assert!(drift.translation_norm() < 2.0 * icp.config().translation_epsilon);
    }

    #[test]
    fn test_degenerate_reference_reports_failure() {
        // A single line with parallel normals cannot constrain six
        // degrees of freedom: the normal equations are rank-deficient.
        let mut reading = PointCloud::new();
        let mut reference = PointCloud::new();
        for i in 0..40 {
            let p = Vec3::new(i as f32 * 0.05, i as f32 * 1e-5, 0.0);
            reading.push(p);
            reference.push_with_normal(p, Vec3::new(0.0, 0.0, 1.0));
        }

        let config = IcpConfig {
            reference_filter: SamplingFilter::Identity,
            ..test_config()
        };
        let icp = Icp::new(config);
        let result = icp.compute(&reading, &reference, &RigidTransform::identity());
        assert_eq!(result.unwrap_err(), RegistrationError::DegenerateGeometry);
    }

    #[test]
    fn test_missing_normals_when_reference_filter_is_identity() {
        let cloud = corner_cloud(4);
        let config = IcpConfig {
            reference_filter: SamplingFilter::Identity,
            ..test_config()
        };
        let icp = Icp::new(config);
        let result = icp.compute(&cloud, &cloud, &RigidTransform::identity());
        assert_eq!(result.unwrap_err(), RegistrationError::MissingNormals);
    }

    #[test]
    fn test_initial_guess_speeds_convergence() {
        let reading = corner_cloud(8);
        let truth = RigidTransform::new(
            Quaternion::from_axis_angle(Vec3::new(1.0, 0.0, 0.0), 0.06),
            Vec3::new(0.05, 0.0, 0.02),
        );
        let reference = truth.apply_cloud(&reading);

        let icp = Icp::new(test_config());
        let cold = icp
            .compute(&reading, &reference, &RigidTransform::identity())
            .unwrap();
        let warm = icp.compute(&reading, &reference, &truth).unwrap();
        assert!(warm.iterations <= cold.iterations);
    }
}
