//! Rigid transform types: unit quaternion rotation plus translation.

use super::point::{PointCloud, Vec3};
use serde::{Deserialize, Serialize};

/// A rotation as a quaternion (x, y, z, w).
///
/// Kept unit-length: every constructor and composition renormalizes, so
/// downstream math can assume |q| = 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Quaternion {
    /// The identity rotation.
    pub const IDENTITY: Quaternion = Quaternion {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };

    /// Create from raw components, normalizing.
    ///
    /// A zero quaternion normalizes to identity.
    #[inline]
    pub fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }.normalized()
    }

    /// Rotation of `angle` radians about the unit axis `axis`.
    ///
    /// A zero angle yields the identity regardless of axis.
    pub fn from_axis_angle(axis: Vec3, angle: f32) -> Self {
        if angle == 0.0 {
            return Self::IDENTITY;
        }
        let (sin_h, cos_h) = (angle * 0.5).sin_cos();
        Self {
            x: axis.x * sin_h,
            y: axis.y * sin_h,
            z: axis.z * sin_h,
            w: cos_h,
        }
        .normalized()
    }

    /// Shortest rotation taking the direction of `from` to the direction
    /// of `to`.
    ///
    /// Either input being zero yields the identity. Exactly opposed inputs
    /// rotate π about an arbitrary perpendicular axis.
    pub fn from_arc(from: Vec3, to: Vec3) -> Self {
        let cross = from.cross(&to);
        let w = (from.length_squared() * to.length_squared()).sqrt() + from.dot(&to);
        if cross.length_squared() == 0.0 && w <= 0.0 {
            // Opposed vectors: pick any axis perpendicular to `from`.
            let axis = from
                .cross(&Vec3::new(1.0, 0.0, 0.0))
                .normalized()
                .or_else(|| from.cross(&Vec3::new(0.0, 1.0, 0.0)).normalized())
                .unwrap_or(Vec3::new(0.0, 0.0, 1.0));
            return Self::from_axis_angle(axis, std::f32::consts::PI);
        }
        Self::new(cross.x, cross.y, cross.z, w)
    }

    /// Unit-length copy. A degenerate (zero or non-finite) quaternion
    /// collapses to identity.
    #[inline]
    pub fn normalized(&self) -> Self {
        let norm_sq = self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w;
        if norm_sq > 0.0 && norm_sq.is_finite() {
            let inv = norm_sq.sqrt().recip();
            Self {
                x: self.x * inv,
                y: self.y * inv,
                z: self.z * inv,
                w: self.w * inv,
            }
        } else {
            Self::IDENTITY
        }
    }

    /// Hamilton product: the rotation `other` followed by `self`.
    #[inline]
    pub fn mul(&self, other: &Quaternion) -> Quaternion {
        Quaternion {
            x: self.w * other.x + self.x * other.w + self.y * other.z - self.z * other.y,
            y: self.w * other.y - self.x * other.z + self.y * other.w + self.z * other.x,
            z: self.w * other.z + self.x * other.y - self.y * other.x + self.z * other.w,
            w: self.w * other.w - self.x * other.x - self.y * other.y - self.z * other.z,
        }
        .normalized()
    }

    /// Inverse rotation (conjugate, since unit-length).
    #[inline]
    pub fn conjugate(&self) -> Quaternion {
        Quaternion {
            x: -self.x,
            y: -self.y,
            z: -self.z,
            w: self.w,
        }
    }

    /// Rotate a vector.
    #[inline]
    pub fn rotate(&self, v: Vec3) -> Vec3 {
        // q v q* expanded as t = 2 (q_xyz × v); v' = v + w t + q_xyz × t
        let u = Vec3::new(self.x, self.y, self.z);
        let t = u.cross(&v) * 2.0;
        v + t * self.w + u.cross(&t)
    }

    /// Rotation angle in radians, in [0, π].
    #[inline]
    pub fn angle(&self) -> f32 {
        2.0 * self.w.abs().min(1.0).acos()
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// A rigid transform: rotate, then translate.
///
/// The rotation quaternion is normalized after every construction and
/// composition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RigidTransform {
    /// Rotation applied first.
    pub rotation: Quaternion,
    /// Translation applied after the rotation.
    pub translation: Vec3,
}

impl RigidTransform {
    /// The identity transform.
    #[inline]
    pub fn identity() -> Self {
        Self {
            rotation: Quaternion::IDENTITY,
            translation: Vec3::ZERO,
        }
    }

    /// Create from rotation and translation.
    #[inline]
    pub fn new(rotation: Quaternion, translation: Vec3) -> Self {
        Self {
            rotation: rotation.normalized(),
            translation,
        }
    }

    /// Pure translation.
    #[inline]
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            rotation: Quaternion::IDENTITY,
            translation,
        }
    }

    /// Apply to a point: `R p + t`.
    #[inline]
    pub fn apply(&self, point: Vec3) -> Vec3 {
        self.rotation.rotate(point) + self.translation
    }

    /// Apply to every point of a cloud; normals are rotated only.
    pub fn apply_cloud(&self, cloud: &PointCloud) -> PointCloud {
        let points = cloud.points().iter().map(|p| self.apply(*p)).collect();
        match cloud.normals() {
            Some(normals) => {
                let rotated = normals.iter().map(|n| self.rotation.rotate(*n)).collect();
                PointCloud::from_points_and_normals(points, rotated)
            }
            None => PointCloud::from_points(points),
        }
    }

    /// Compose: the transform that applies `other` first, then `self`.
    #[inline]
    pub fn compose(&self, other: &RigidTransform) -> RigidTransform {
        RigidTransform {
            rotation: self.rotation.mul(&other.rotation),
            translation: self.rotation.rotate(other.translation) + self.translation,
        }
    }

    /// Inverse transform.
    #[inline]
    pub fn inverse(&self) -> RigidTransform {
        let inv_rot = self.rotation.conjugate();
        RigidTransform {
            rotation: inv_rot,
            translation: inv_rot.rotate(-self.translation),
        }
    }

    /// Rotation magnitude in radians. Used for convergence checks.
    #[inline]
    pub fn rotation_angle(&self) -> f32 {
        self.rotation.angle()
    }

    /// Translation magnitude in meters. Used for convergence checks.
    #[inline]
    pub fn translation_norm(&self) -> f32 {
        self.translation.length()
    }
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::{FRAC_PI_2, PI};

    fn assert_vec_eq(a: Vec3, b: Vec3, eps: f32) {
        assert_relative_eq!(a.x, b.x, epsilon = eps);
        assert_relative_eq!(a.y, b.y, epsilon = eps);
        assert_relative_eq!(a.z, b.z, epsilon = eps);
    }

    #[test]
    fn test_axis_angle_rotation() {
        let q = Quaternion::from_axis_angle(Vec3::new(0.0, 0.0, 1.0), FRAC_PI_2);
        let rotated = q.rotate(Vec3::new(1.0, 0.0, 0.0));
        assert_vec_eq(rotated, Vec3::new(0.0, 1.0, 0.0), 1e-6);
        assert_relative_eq!(q.angle(), FRAC_PI_2, epsilon = 1e-6);
    }

    #[test]
    fn test_zero_angle_is_identity() {
        let q = Quaternion::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), 0.0);
        assert_eq!(q, Quaternion::IDENTITY);
    }

    #[test]
    fn test_from_arc() {
        let q = Quaternion::from_arc(Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 2.0, 0.0));
        let rotated = q.rotate(Vec3::new(1.0, 0.0, 0.0));
        assert_vec_eq(rotated, Vec3::new(0.0, 1.0, 0.0), 1e-6);
    }

    #[test]
    fn test_from_arc_opposed() {
        let q = Quaternion::from_arc(Vec3::new(1.0, 0.0, 0.0), Vec3::new(-1.0, 0.0, 0.0));
        let rotated = q.rotate(Vec3::new(1.0, 0.0, 0.0));
        assert_vec_eq(rotated, Vec3::new(-1.0, 0.0, 0.0), 1e-5);
    }

    #[test]
    fn test_transform_roundtrip() {
        let t = RigidTransform::new(
            Quaternion::from_axis_angle(
                Vec3::new(1.0, 1.0, 0.0).normalized().unwrap(),
                0.7,
            ),
            Vec3::new(0.3, -1.2, 2.5),
        );
        let p = Vec3::new(0.4, 0.8, -0.6);
        let back = t.inverse().apply(t.apply(p));
        assert_vec_eq(back, p, 1e-5);
    }

    #[test]
    fn test_compose_matches_sequential_apply() {
        let a = RigidTransform::new(
            Quaternion::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), 0.4),
            Vec3::new(1.0, 0.0, 0.0),
        );
        let b = RigidTransform::new(
            Quaternion::from_axis_angle(Vec3::new(1.0, 0.0, 0.0), -0.9),
            Vec3::new(0.0, 2.0, 0.5),
        );
        let p = Vec3::new(0.1, 0.2, 0.3);
        let composed = a.compose(&b).apply(p);
        let sequential = a.apply(b.apply(p));
        assert_vec_eq(composed, sequential, 1e-5);
    }

    #[test]
    fn test_cloud_roundtrip_with_normals() {
        let cloud = PointCloud::from_points_and_normals(
            vec![Vec3::new(1.0, 2.0, 3.0), Vec3::new(-1.0, 0.5, 0.0)],
            vec![Vec3::new(0.0, 0.0, 1.0), Vec3::new(1.0, 0.0, 0.0)],
        );
        let t = RigidTransform::new(
            Quaternion::from_axis_angle(Vec3::new(0.0, 0.0, 1.0), PI / 3.0),
            Vec3::new(5.0, -2.0, 1.0),
        );
        let back = t.inverse().apply_cloud(&t.apply_cloud(&cloud));
        for i in 0..cloud.len() {
            assert_vec_eq(back.point_at(i), cloud.point_at(i), 1e-5);
            assert_vec_eq(back.normal_at(i).unwrap(), cloud.normal_at(i).unwrap(), 1e-5);
        }
    }

    #[test]
    fn test_normalized_after_composition() {
        let mut q = Quaternion::from_axis_angle(Vec3::new(0.0, 0.0, 1.0), 0.01);
        for _ in 0..1000 {
            q = q.mul(&Quaternion::from_axis_angle(Vec3::new(0.0, 0.0, 1.0), 0.01));
        }
        let norm = (q.x * q.x + q.y * q.y + q.z * q.z + q.w * q.w).sqrt();
        assert_relative_eq!(norm, 1.0, epsilon = 1e-5);
    }
}
