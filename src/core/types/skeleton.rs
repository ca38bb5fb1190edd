//! Skeleton joint identifiers, tracking states, body slots and frames.
//!
//! The joint set and bone table mirror what the depth sensors report; the
//! topology is a fixed input to fusion, never inferred.

use super::point::Vec3;
use serde::{Deserialize, Serialize};

/// Number of joints each sensor reports per body.
pub const JOINT_COUNT: usize = 25;

/// Maximum body slots per sensor frame.
pub const MAX_BODIES: usize = 6;

/// Joint identifiers, in the wire order the sensors use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum JointId {
    SpineBase = 0,
    SpineMid = 1,
    Neck = 2,
    Head = 3,
    ShoulderLeft = 4,
    ElbowLeft = 5,
    WristLeft = 6,
    HandLeft = 7,
    ShoulderRight = 8,
    ElbowRight = 9,
    WristRight = 10,
    HandRight = 11,
    HipLeft = 12,
    KneeLeft = 13,
    AnkleLeft = 14,
    FootLeft = 15,
    HipRight = 16,
    KneeRight = 17,
    AnkleRight = 18,
    FootRight = 19,
    SpineShoulder = 20,
    HandTipLeft = 21,
    ThumbLeft = 22,
    HandTipRight = 23,
    ThumbRight = 24,
}

impl JointId {
    /// All joints in index order.
    pub const ALL: [JointId; JOINT_COUNT] = [
        JointId::SpineBase,
        JointId::SpineMid,
        JointId::Neck,
        JointId::Head,
        JointId::ShoulderLeft,
        JointId::ElbowLeft,
        JointId::WristLeft,
        JointId::HandLeft,
        JointId::ShoulderRight,
        JointId::ElbowRight,
        JointId::WristRight,
        JointId::HandRight,
        JointId::HipLeft,
        JointId::KneeLeft,
        JointId::AnkleLeft,
        JointId::FootLeft,
        JointId::HipRight,
        JointId::KneeRight,
        JointId::AnkleRight,
        JointId::FootRight,
        JointId::SpineShoulder,
        JointId::HandTipLeft,
        JointId::ThumbLeft,
        JointId::HandTipRight,
        JointId::ThumbRight,
    ];

    /// Array index of this joint.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Joint for an array index, validated.
    #[inline]
    pub fn from_index(index: usize) -> Option<JointId> {
        Self::ALL.get(index).copied()
    }
}

/// Per-joint tracking quality reported by a sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum TrackingState {
    /// The sensor has no estimate for this joint.
    #[default]
    NotTracked = 0,
    /// Position inferred from neighboring joints (low confidence).
    Inferred = 1,
    /// Position directly observed.
    Tracked = 2,
}

impl TrackingState {
    /// Decode the wire byte. Unknown values decode as `NotTracked`.
    #[inline]
    pub fn from_byte(byte: u8) -> TrackingState {
        match byte {
            1 => TrackingState::Inferred,
            2 => TrackingState::Tracked,
            _ => TrackingState::NotTracked,
        }
    }

    /// Whether the joint carries a usable position this frame.
    #[inline]
    pub fn is_tracked(self) -> bool {
        self != TrackingState::NotTracked
    }
}

/// A bone as a directed joint pair (parent → child).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoneConnection {
    pub from: JointId,
    pub to: JointId,
}

/// The fixed bone topology: 24 connections over the 25 joints.
pub const BONES: [BoneConnection; 24] = [
    // Torso
    bone(JointId::SpineBase, JointId::SpineMid),
    bone(JointId::SpineMid, JointId::SpineShoulder),
    bone(JointId::SpineShoulder, JointId::Neck),
    bone(JointId::Neck, JointId::Head),
    // Left arm
    bone(JointId::SpineShoulder, JointId::ShoulderLeft),
    bone(JointId::ShoulderLeft, JointId::ElbowLeft),
    bone(JointId::ElbowLeft, JointId::WristLeft),
    bone(JointId::WristLeft, JointId::HandLeft),
    bone(JointId::HandLeft, JointId::HandTipLeft),
    bone(JointId::WristLeft, JointId::ThumbLeft),
    // Right arm
    bone(JointId::SpineShoulder, JointId::ShoulderRight),
    bone(JointId::ShoulderRight, JointId::ElbowRight),
    bone(JointId::ElbowRight, JointId::WristRight),
    bone(JointId::WristRight, JointId::HandRight),
    bone(JointId::HandRight, JointId::HandTipRight),
    bone(JointId::WristRight, JointId::ThumbRight),
    // Left leg
    bone(JointId::SpineBase, JointId::HipLeft),
    bone(JointId::HipLeft, JointId::KneeLeft),
    bone(JointId::KneeLeft, JointId::AnkleLeft),
    bone(JointId::AnkleLeft, JointId::FootLeft),
    // Right leg
    bone(JointId::SpineBase, JointId::HipRight),
    bone(JointId::HipRight, JointId::KneeRight),
    bone(JointId::KneeRight, JointId::AnkleRight),
    bone(JointId::AnkleRight, JointId::FootRight),
];

const fn bone(from: JointId, to: JointId) -> BoneConnection {
    BoneConnection { from, to }
}

/// Hand open/closed state and confidence bytes, passed through as reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandStates {
    pub left_confidence: u8,
    pub left_state: u8,
    pub right_confidence: u8,
    pub right_state: u8,
}

/// One tracked body within a sensor frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkeletonBody {
    /// Sensor-assigned body identifier.
    pub id: u64,
    /// Joint positions in the sensor's local frame, indexed by [`JointId`].
    pub joint_positions: [Vec3; JOINT_COUNT],
    /// Per-joint tracking quality, indexed by [`JointId`].
    pub joint_states: [TrackingState; JOINT_COUNT],
    /// Hand state bytes.
    pub hands: HandStates,
}

impl SkeletonBody {
    /// A body with every joint at the origin and untracked.
    pub fn empty(id: u64) -> Self {
        Self {
            id,
            joint_positions: [Vec3::ZERO; JOINT_COUNT],
            joint_states: [TrackingState::NotTracked; JOINT_COUNT],
            hands: HandStates::default(),
        }
    }

    /// Position of a joint.
    #[inline]
    pub fn position(&self, joint: JointId) -> Vec3 {
        self.joint_positions[joint.index()]
    }

    /// Tracking state of a joint.
    #[inline]
    pub fn state(&self, joint: JointId) -> TrackingState {
        self.joint_states[joint.index()]
    }

    /// Number of joints with a usable position this frame.
    pub fn tracked_joint_count(&self) -> usize {
        self.joint_states.iter().filter(|s| s.is_tracked()).count()
    }
}

/// One complete snapshot from a single sensor.
///
/// Slots beyond the sensor's currently tracked bodies are `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkeletonFrame {
    /// Sensor timestamp in microseconds, monotonically increasing.
    pub timestamp_us: i64,
    /// Up to [`MAX_BODIES`] body slots.
    pub bodies: [Option<SkeletonBody>; MAX_BODIES],
    /// Gravity-referenced device acceleration.
    pub device_acceleration: Vec3,
}

impl SkeletonFrame {
    /// Body in slot `slot`, if valid.
    #[inline]
    pub fn body(&self, slot: usize) -> Option<&SkeletonBody> {
        self.bodies.get(slot).and_then(|b| b.as_ref())
    }

    /// Number of valid bodies.
    pub fn valid_body_count(&self) -> usize {
        self.bodies.iter().filter(|b| b.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_joint_index_roundtrip() {
        for (i, joint) in JointId::ALL.iter().enumerate() {
            assert_eq!(joint.index(), i);
            assert_eq!(JointId::from_index(i), Some(*joint));
        }
        assert_eq!(JointId::from_index(JOINT_COUNT), None);
    }

    #[test]
    fn test_tracking_state_decode() {
        assert_eq!(TrackingState::from_byte(0), TrackingState::NotTracked);
        assert_eq!(TrackingState::from_byte(1), TrackingState::Inferred);
        assert_eq!(TrackingState::from_byte(2), TrackingState::Tracked);
        assert_eq!(TrackingState::from_byte(99), TrackingState::NotTracked);
        assert!(!TrackingState::NotTracked.is_tracked());
        assert!(TrackingState::Inferred.is_tracked());
    }

    #[test]
    fn test_bone_table_covers_every_joint() {
        let mut seen = [false; JOINT_COUNT];
        for b in &BONES {
            seen[b.from.index()] = true;
            seen[b.to.index()] = true;
        }
        assert!(seen.iter().all(|s| *s), "every joint appears in a bone");
        // Each non-root joint has exactly one incoming bone.
        let mut incoming = [0usize; JOINT_COUNT];
        for b in &BONES {
            incoming[b.to.index()] += 1;
        }
        assert_eq!(incoming[JointId::SpineBase.index()], 0);
        for joint in JointId::ALL {
            if joint != JointId::SpineBase {
                assert_eq!(incoming[joint.index()], 1, "{joint:?}");
            }
        }
    }

    #[test]
    fn test_frame_body_slots() {
        let mut frame = SkeletonFrame::default();
        assert_eq!(frame.valid_body_count(), 0);
        assert!(frame.body(0).is_none());
        frame.bodies[2] = Some(SkeletonBody::empty(7));
        assert_eq!(frame.valid_body_count(), 1);
        assert_eq!(frame.body(2).unwrap().id, 7);
        assert!(frame.body(MAX_BODIES).is_none());
    }
}
