//! Core data types for skeletal fusion.
//!
//! - [`Vec3`], [`PointCloud`]: 3D points and point sets (optional normals)
//! - [`Quaternion`], [`RigidTransform`]: rotations and rigid transforms
//! - [`JointId`], [`SkeletonBody`], [`SkeletonFrame`]: sensor-side skeleton data
//! - [`Timestamped`]: generic timestamp wrapper

mod point;
mod skeleton;
mod timestamped;
mod transform;

pub use point::{PointCloud, Vec3};
pub use skeleton::{
    BoneConnection, HandStates, JointId, SkeletonBody, SkeletonFrame, TrackingState, BONES,
    JOINT_COUNT, MAX_BODIES,
};
pub use timestamped::Timestamped;
pub use transform::{Quaternion, RigidTransform};
