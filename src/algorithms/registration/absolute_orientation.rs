//! Closed-form absolute orientation.
//!
//! One-shot least-squares rigid (optionally similarity) alignment of two
//! small labelled correspondence sets: the optimal rotation is recovered
//! from the cross-covariance of the centered sets via the quaternion
//! profile matrix, translation maps the centroids, and the optional
//! uniform scale is the RMS-deviation ratio.
//!
//! Used both to seed ICP and standalone for scale calibration.
//!
//! # References
//!
//! - Horn, B.K.P. "Closed-form solution of absolute orientation using
//!   unit quaternions"

use super::RegistrationError;
use crate::core::types::{Quaternion, RigidTransform, Vec3};

/// Fewest pairs that determine a rigid transform.
const MIN_PAIRS: usize = 3;

/// Result of a closed-form alignment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AbsoluteOrientation {
    /// Rigid part: rotation then translation.
    pub transform: RigidTransform,
    /// Uniform scale. 1.0 unless solved with scale.
    pub scale: f32,
}

impl AbsoluteOrientation {
    /// Apply the full similarity: `R p · s + t`.
    #[inline]
    pub fn apply(&self, point: Vec3) -> Vec3 {
        self.transform.rotation.rotate(point) * self.scale + self.transform.translation
    }
}

/// Solve for the transform mapping `from` onto `to`, minimizing total
/// squared distance between corresponding points.
///
/// Requires equal-length sets of at least three pairs (caller contract).
/// Coincident or non-finite geometry fails as degenerate.
pub fn solve(
    from: &[Vec3],
    to: &[Vec3],
    with_scale: bool,
) -> Result<AbsoluteOrientation, RegistrationError> {
    if from.len() != to.len() {
        return Err(RegistrationError::LengthMismatch {
            from: from.len(),
            to: to.len(),
        });
    }
    if from.len() < MIN_PAIRS {
        return Err(RegistrationError::InsufficientCorrespondences {
            required: MIN_PAIRS,
            actual: from.len(),
        });
    }
    if !from.iter().chain(to.iter()).all(Vec3::is_finite) {
        return Err(RegistrationError::DegenerateGeometry);
    }

    let inv_n = 1.0 / from.len() as f32;
    let mut centroid_from = Vec3::ZERO;
    let mut centroid_to = Vec3::ZERO;
    for (a, b) in from.iter().zip(to) {
        centroid_from += *a;
        centroid_to += *b;
    }
    centroid_from = centroid_from * inv_n;
    centroid_to = centroid_to * inv_n;

    // Cross-covariance of the centered sets, plus the spread terms the
    // scale estimate needs.
    let mut s = [[0.0f32; 3]; 3];
    let mut spread_from = 0.0f32;
    let mut spread_to = 0.0f32;
    for (a, b) in from.iter().zip(to) {
        let a = *a - centroid_from;
        let b = *b - centroid_to;
        let ac = [a.x, a.y, a.z];
        let bc = [b.x, b.y, b.z];
        for r in 0..3 {
            for c in 0..3 {
                s[r][c] += ac[r] * bc[c];
            }
        }
        spread_from += a.length_squared();
        spread_to += b.length_squared();
    }

    if spread_from <= 1e-12 || spread_to <= 1e-12 {
        return Err(RegistrationError::DegenerateGeometry);
    }

    // Quaternion profile matrix; its dominant eigenvector is the optimal
    // rotation (w, x, y, z).
    let n = [
        [
            s[0][0] + s[1][1] + s[2][2],
            s[1][2] - s[2][1],
            s[2][0] - s[0][2],
            s[0][1] - s[1][0],
        ],
        [
            s[1][2] - s[2][1],
            s[0][0] - s[1][1] - s[2][2],
            s[0][1] + s[1][0],
            s[2][0] + s[0][2],
        ],
        [
            s[2][0] - s[0][2],
            s[0][1] + s[1][0],
            s[1][1] - s[0][0] - s[2][2],
            s[1][2] + s[2][1],
        ],
        [
            s[0][1] - s[1][0],
            s[2][0] + s[0][2],
            s[1][2] + s[2][1],
            s[2][2] - s[0][0] - s[1][1],
        ],
    ];

    let q = dominant_eigenvector4(&n).ok_or(RegistrationError::DegenerateGeometry)?;
    let rotation = Quaternion::new(q[1], q[2], q[3], q[0]);

    let scale = if with_scale {
        (spread_to / spread_from).sqrt()
    } else {
        1.0
    };

    let translation = centroid_to - rotation.rotate(centroid_from) * scale;

    Ok(AbsoluteOrientation {
        transform: RigidTransform::new(rotation, translation),
        scale,
    })
}

/// Dominant eigenvector of a symmetric 4×4 matrix by shifted power
/// iteration.
///
/// The Gershgorin shift makes the dominant eigenvalue positive so the
/// iteration converges to the most-positive eigenvalue of the input.
fn dominant_eigenvector4(m: &[[f32; 4]; 4]) -> Option<[f32; 4]> {
    let mut shift = 0.0f32;
    for row in m {
        let sum: f32 = row.iter().map(|v| v.abs()).sum();
        shift = shift.max(sum);
    }

    let mut shifted = *m;
    for i in 0..4 {
        shifted[i][i] += shift;
    }

    let mut v = [0.5f32; 4];
    let mut previous = v;
    for iter in 0..256 {
        let mut next = [0.0f32; 4];
        for r in 0..4 {
            for c in 0..4 {
                next[r] += shifted[r][c] * v[c];
            }
        }
        let norm = next.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm < 1e-12 || !norm.is_finite() {
            return None;
        }
        let inv = 1.0 / norm;
        for x in &mut next {
            *x *= inv;
        }
        v = next;

        if iter % 8 == 7 {
            // Sign-aligned fixed-point check.
            let dot: f32 = v.iter().zip(&previous).map(|(a, b)| a * b).sum();
            if (1.0 - dot.abs()) < 1e-12 {
                break;
            }
            previous = v;
        }
    }
    Some(v)
}
