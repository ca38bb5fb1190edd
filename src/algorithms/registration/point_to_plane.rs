//! Point-to-plane error minimization.
//!
//! Solves for the small rigid correction that minimizes the projection of
//! each reading-to-reference displacement onto the reference normal. One
//! call produces one ICP increment.

use super::correspondence::MatchedPairs;
use super::RegistrationError;
use crate::core::types::{Quaternion, RigidTransform, Vec3};

/// Fewest pairs that can constrain the 6-parameter solve.
const MIN_PAIRS: usize = 6;

/// Solve for the incremental transform minimizing weighted point-to-plane
/// error over the matched pairs.
///
/// The reference side must carry normals (caller contract). Degenerate
/// geometry (too few pairs, or pairs whose constraints do not span all
/// six degrees of freedom) fails recoverably; the ICP run for the cycle
/// aborts and the caller falls back.
///
/// Per pair `i`: `F_i = [reading_i × normal_i ; normal_i]`, and with the
/// residual `d_i = dot(reading_i − reference_i, normal_i)` the normal
/// equations are `(Σ w_i F_i F_iᵀ) x = −Σ w_i F_i d_i`. The first three
/// components of `x` are an axis-angle rotation, the last three the
/// translation.
pub fn minimize(pairs: &MatchedPairs) -> Result<RigidTransform, RegistrationError> {
    let normals = pairs
        .reference
        .normals()
        .ok_or(RegistrationError::MissingNormals)?;

    if pairs.len() < MIN_PAIRS {
        return Err(RegistrationError::InsufficientCorrespondences {
            required: MIN_PAIRS,
            actual: pairs.len(),
        });
    }

    let mut a = [[0.0f32; 6]; 6];
    let mut b = [0.0f32; 6];

    for i in 0..pairs.len() {
        let reading = pairs.reading.point_at(i);
        let reference = pairs.reference.point_at(i);
        let normal = normals[i];
        let weight = pairs.weights[i];

        let cross = reading.cross(&normal);
        let f = [cross.x, cross.y, cross.z, normal.x, normal.y, normal.z];
        let residual = (reading - reference).dot(&normal);

        for r in 0..6 {
            let wf_r = weight * f[r];
            for c in 0..6 {
                a[r][c] += wf_r * f[c];
            }
            b[r] -= wf_r * residual;
        }
    }

    let x = cholesky_solve6(&a, &b).ok_or(RegistrationError::DegenerateGeometry)?;

    let axis = Vec3::new(x[0], x[1], x[2]);
    let angle = axis.length();
    let rotation = if angle > 0.0 {
        Quaternion::from_axis_angle(axis * (1.0 / angle), angle)
    } else {
        Quaternion::IDENTITY
    };

    Ok(RigidTransform::new(rotation, Vec3::new(x[3], x[4], x[5])))
}

/// Solve the symmetric positive-definite system `A x = b` by Cholesky
/// factorization. Returns `None` when `A` is not positive-definite.
fn cholesky_solve6(a: &[[f32; 6]; 6], b: &[f32; 6]) -> Option<[f32; 6]> {
    // Factor A = L Lᵀ.
    let mut l = [[0.0f32; 6]; 6];
    for i in 0..6 {
        for j in 0..=i {
            let mut sum = a[i][j];
            for k in 0..j {
                sum -= l[i][k] * l[j][k];
            }
            if i == j {
                if sum <= 1e-10 || !sum.is_finite() {
                    return None;
                }
                l[i][i] = sum.sqrt();
            } else {
                l[i][j] = sum / l[j][j];
            }
        }
    }

    // Forward substitution: L y = b.
    let mut y = [0.0f32; 6];
    for i in 0..6 {
        let mut sum = b[i];
        for k in 0..i {
            sum -= l[i][k] * y[k];
        }
        y[i] = sum / l[i][i];
    }

    // Back substitution: Lᵀ x = y.
    let mut x = [0.0f32; 6];
    for i in (0..6).rev() {
        let mut sum = y[i];
        for k in (i + 1)..6 {
            sum -= l[k][i] * x[k];
        }
        x[i] = sum / l[i][i];
    }

    Some(x)
}
