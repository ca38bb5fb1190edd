//! Per-cycle fusion of multiple sensor skeleton streams.
//!
//! Each cycle: read one snapshot per sensor, register every secondary
//! sensor's joints into the reference sensor's frame, then run the fused
//! joint positions through the per-joint temporal filters. Sensor 0 is
//! the reference frame; its joints are consumed unaligned.

use log::warn;

use super::calibration::{CalibrationError, ReferenceAnchors, ScaleCalibration};
use super::joint_filter::{JointFilter, JointFilterConfig};
use crate::algorithms::registration::{absolute_orientation, Icp, IcpConfig};
use crate::core::types::{
    BoneConnection, JointId, PointCloud, Quaternion, RigidTransform, SkeletonBody, SkeletonFrame,
    Vec3, BONES, JOINT_COUNT,
};

/// How a secondary sensor is registered onto the reference sensor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AlignmentStrategy {
    /// Closed-form alignment over the jointly tracked joints.
    ClosedForm,
    /// Point-to-plane ICP from the spine-base seed.
    #[default]
    Icp,
    /// Closed-form alignment as the ICP initial guess.
    IcpWithClosedFormInit,
}

/// Configuration for the fusion engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct FusionConfig {
    /// Registration strategy for secondary sensors.
    pub alignment: AlignmentStrategy,
    /// ICP parameters (used by the ICP strategies).
    pub icp: IcpConfig,
    /// Per-joint filter parameters.
    pub joint_filter: JointFilterConfig,
}

/// The fused output of one cycle: one position per joint plus the fixed
/// bone topology for downstream consumers.
#[derive(Debug, Clone)]
pub struct FusedSkeleton {
    /// Fused joint positions, indexed by [`JointId`].
    pub positions: [Vec3; JOINT_COUNT],
    /// The bone-connection topology (fixed external input).
    pub bones: &'static [BoneConnection],
}

/// Multi-sensor skeleton fusion engine.
///
/// Owns the per-joint filters for the session and the per-sensor fallback
/// transforms used when a cycle's registration fails.
#[derive(Debug)]
pub struct FusionEngine {
    config: FusionConfig,
    icp: Icp,
    filters: Vec<JointFilter>,
    /// Last successful reading→reference transform per sensor index.
    fallback: Vec<Option<RigidTransform>>,
    calibration: ScaleCalibration,
    /// Joints that received at least one measurement this cycle.
    measured: [bool; JOINT_COUNT],
}

impl FusionEngine {
    /// Create an engine for the given configuration.
    pub fn new(config: FusionConfig) -> Self {
        Self {
            config,
            icp: Icp::new(config.icp),
            filters: (0..JOINT_COUNT)
                .map(|_| JointFilter::new(config.joint_filter))
                .collect(),
            fallback: Vec::new(),
            calibration: ScaleCalibration::new(),
            measured: [false; JOINT_COUNT],
        }
    }

    /// Get the current configuration.
    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    /// The calibrated output scale (1.0 until calibration runs).
    pub fn scale(&self) -> f32 {
        self.calibration.scale()
    }

    /// Arm the one-shot scale calibration with the reference device's
    /// anchor positions. Re-triggering while pending is ignored.
    pub fn request_scale_calibration(
        &mut self,
        anchors: ReferenceAnchors,
    ) -> Result<(), CalibrationError> {
        self.calibration.request(anchors)
    }

    /// Run one fusion cycle over the sensors' current snapshots.
    ///
    /// `frames[0]` is the reference sensor. `dt` is the elapsed time since
    /// the previous cycle in seconds. Filter corrections are applied in
    /// ascending sensor order, so results are reproducible given identical
    /// inputs.
    pub fn fuse(&mut self, frames: &[&SkeletonFrame], dt: f32) -> FusedSkeleton {
        if self.fallback.len() < frames.len() {
            self.fallback.resize(frames.len(), None);
        }
        self.measured = [false; JOINT_COUNT];

        let reference_body = frames.first().and_then(|f| f.body(0));
        let scale = self.calibration.scale();

        // Every filter predicts exactly once per cycle, measured or not.
        for filter in &mut self.filters {
            filter.predict(dt);
        }

        for (sensor_idx, frame) in frames.iter().enumerate() {
            let Some(body) = frame.body(0) else {
                continue;
            };

            let transform = if sensor_idx == 0 {
                RigidTransform::identity()
            } else {
                match self.align_sensor(sensor_idx, body, reference_body) {
                    Some(transform) => transform,
                    None => continue,
                }
            };

            for joint in JointId::ALL {
                if !body.state(joint).is_tracked() {
                    continue;
                }
                let aligned = transform.apply(body.position(joint)) * scale;
                self.filters[joint.index()].update(aligned);
                self.measured[joint.index()] = true;
            }
        }

        let fused = self.snapshot();
        let anchors = self.body_anchors(&fused);
        self.calibration.try_complete(anchors);
        fused
    }

    /// Register one secondary sensor's body onto the reference body.
    ///
    /// Returns `None` when the sensor must be skipped this cycle (no
    /// reference body and no fallback).
    fn align_sensor(
        &mut self,
        sensor_idx: usize,
        body: &SkeletonBody,
        reference_body: Option<&SkeletonBody>,
    ) -> Option<RigidTransform> {
        let Some(reference) = reference_body else {
            return self.fallback[sensor_idx];
        };

        let seed = seed_transform(body, reference);
        let result = match self.config.alignment {
            AlignmentStrategy::ClosedForm => closed_form_transform(body, reference),
            AlignmentStrategy::Icp => self.icp_transform(body, reference, seed),
            AlignmentStrategy::IcpWithClosedFormInit => {
                let init = closed_form_transform(body, reference).unwrap_or(seed);
                self.icp_transform(body, reference, init)
            }
        };

        match result {
            Some(transform) => {
                self.fallback[sensor_idx] = Some(transform);
                Some(transform)
            }
            None => {
                // Recoverable per-cycle failure: reuse the previous
                // cycle's alignment, or the seed if there is none yet.
                warn!("sensor {sensor_idx} registration failed, using fallback");
                Some(self.fallback[sensor_idx].unwrap_or(seed))
            }
        }
    }

    fn icp_transform(
        &self,
        body: &SkeletonBody,
        reference: &SkeletonBody,
        initial: RigidTransform,
    ) -> Option<RigidTransform> {
        let reading = tracked_cloud(body);
        let target = tracked_cloud(reference);
        match self.icp.compute(&reading, &target, &initial) {
            Ok(result) => Some(result.transform),
            Err(err) => {
                warn!("icp failed: {err}");
                None
            }
        }
    }

    /// Current filter positions as a fused skeleton.
    fn snapshot(&self) -> FusedSkeleton {
        let mut positions = [Vec3::ZERO; JOINT_COUNT];
        for (i, filter) in self.filters.iter().enumerate() {
            positions[i] = filter.position();
        }
        FusedSkeleton {
            positions,
            bones: &BONES,
        }
    }

    /// The calibration body anchors (Head, HandRight, HandLeft), if all
    /// three were measured this cycle.
    fn body_anchors(&self, fused: &FusedSkeleton) -> Option<[Vec3; 3]> {
        let anchors = [JointId::Head, JointId::HandRight, JointId::HandLeft];
        if anchors.iter().any(|j| !self.measured[j.index()]) {
            return None;
        }
        Some(anchors.map(|j| fused.positions[j.index()]))
    }
}

/// Initial registration guess: spine-base translation delta plus the
/// shortest-arc rotation between the spine-base direction vectors. Falls
/// back to a centroid delta when either spine base is untracked.
fn seed_transform(body: &SkeletonBody, reference: &SkeletonBody) -> RigidTransform {
    let root = JointId::SpineBase;
    if body.state(root).is_tracked() && reference.state(root).is_tracked() {
        let from = body.position(root);
        let to = reference.position(root);
        RigidTransform::new(Quaternion::from_arc(from, to), to - from)
    } else {
        let from = tracked_cloud(body).centroid();
        let to = tracked_cloud(reference).centroid();
        RigidTransform::from_translation(to - from)
    }
}

/// Closed-form alignment over the joints tracked by both bodies.
fn closed_form_transform(body: &SkeletonBody, reference: &SkeletonBody) -> Option<RigidTransform> {
    let mut from = Vec::with_capacity(JOINT_COUNT);
    let mut to = Vec::with_capacity(JOINT_COUNT);
    for joint in JointId::ALL {
        if body.state(joint).is_tracked() && reference.state(joint).is_tracked() {
            from.push(body.position(joint));
            to.push(reference.position(joint));
        }
    }
    match absolute_orientation::solve(&from, &to, false) {
        Ok(solution) => Some(solution.transform),
        Err(err) => {
            warn!("closed-form alignment failed: {err}");
            None
        }
    }
}

/// Cloud of a body's tracked joint positions.
fn tracked_cloud(body: &SkeletonBody) -> PointCloud {
    let mut cloud = PointCloud::with_capacity(JOINT_COUNT);
    for joint in JointId::ALL {
        if body.state(joint).is_tracked() {
            cloud.push(body.position(joint));
        }
    }
    cloud
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::TrackingState;
    use approx::assert_relative_eq;

    /// A body with joints spread over a plausible standing pose.
    pub(crate) fn standing_body() -> SkeletonBody {
        let mut body = SkeletonBody::empty(1);
        for joint in JointId::ALL {
            let i = joint.index() as f32;
            // Deterministic non-degenerate spread around the torso.
            body.joint_positions[joint.index()] = Vec3::new(
                (i * 0.37).sin() * 0.4,
                1.0 + (i * 0.53).cos() * 0.5,
                (i * 0.71).sin() * 0.25,
            );
            body.joint_states[joint.index()] = TrackingState::Tracked;
        }
        body
    }

    fn frame_with(body: SkeletonBody, timestamp_us: i64) -> SkeletonFrame {
        let mut frame = SkeletonFrame {
            timestamp_us,
            ..SkeletonFrame::default()
        };
        frame.bodies[0] = Some(body);
        frame
    }

    fn transformed_body(body: &SkeletonBody, transform: &RigidTransform) -> SkeletonBody {
        let mut out = body.clone();
        for position in &mut out.joint_positions {
            *position = transform.apply(*position);
        }
        out
    }

    fn fusion_config() -> FusionConfig {
        FusionConfig {
            alignment: AlignmentStrategy::ClosedForm,
            joint_filter: JointFilterConfig {
                measurement_noise_position: 0.5,
                ..JointFilterConfig::default()
            },
            ..FusionConfig::default()
        }
    }

    #[test]
    fn test_single_sensor_converges_to_joints() {
        let body = standing_body();
        let frame = frame_with(body.clone(), 0);
        let mut engine = FusionEngine::new(fusion_config());

        let mut fused = engine.fuse(&[&frame], 1.0 / 30.0);
        for _ in 0..150 {
            fused = engine.fuse(&[&frame], 1.0 / 30.0);
        }

        let head = JointId::Head.index();
        assert_relative_eq!(
            fused.positions[head].x,
            body.joint_positions[head].x,
            epsilon = 1e-2
        );
        assert_eq!(fused.bones.len(), 24);
    }

    #[test]
    fn test_two_sensors_with_known_offset() {
        let body = standing_body();
        let offset = RigidTransform::new(
            Quaternion::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), 0.5),
            Vec3::new(2.0, 0.0, -1.0),
        );
        // Sensor 1 sees the same person from a different pose: its local
        // coordinates are the reference's mapped through offset⁻¹.
        let secondary = transformed_body(&body, &offset.inverse());

        let frame0 = frame_with(body.clone(), 0);
        let frame1 = frame_with(secondary, 0);

        let mut engine = FusionEngine::new(fusion_config());
        let mut fused = engine.fuse(&[&frame0, &frame1], 1.0 / 30.0);
        for _ in 0..200 {
            fused = engine.fuse(&[&frame0, &frame1], 1.0 / 30.0);
        }

        // Both streams agree after alignment, so the fused skeleton sits
        // on the reference sensor's joints.
        for joint in JointId::ALL {
            let expected = body.position(joint);
            let actual = fused.positions[joint.index()];
            assert!(
                actual.distance(&expected) < 2e-2,
                "{joint:?}: {actual:?} vs {expected:?}"
            );
        }
    }

    #[test]
    fn test_untracked_joint_relies_on_prediction() {
        let mut body = standing_body();
        body.joint_states[JointId::FootLeft.index()] = TrackingState::NotTracked;
        let frame = frame_with(body, 0);

        let mut engine = FusionEngine::new(fusion_config());
        for _ in 0..50 {
            engine.fuse(&[&frame], 1.0 / 30.0);
        }
        // The untracked joint never receives a measurement; its estimate
        // stays at the filter's initial state.
        let fused = engine.fuse(&[&frame], 1.0 / 30.0);
        assert_relative_eq!(fused.positions[JointId::FootLeft.index()].length(), 0.0);
    }

    #[test]
    fn test_invalid_reference_sensor_skips_secondary_without_fallback() {
        let empty_frame = SkeletonFrame::default();
        let frame1 = frame_with(standing_body(), 0);

        let mut engine = FusionEngine::new(fusion_config());
        let fused = engine.fuse(&[&empty_frame, &frame1], 1.0 / 30.0);
        // No reference and no fallback yet: nothing is measured.
        for position in &fused.positions {
            assert_relative_eq!(position.length(), 0.0);
        }
    }

    #[test]
    fn test_calibration_scales_output() {
        let body = standing_body();
        let frame = frame_with(body.clone(), 0);
        let mut engine = FusionEngine::new(fusion_config());

        for _ in 0..100 {
            engine.fuse(&[&frame], 1.0 / 30.0);
        }

        // Reference anchors are the fused anchors uniformly doubled.
        let fused = engine.fuse(&[&frame], 1.0 / 30.0);
        let anchors = ReferenceAnchors {
            head: fused.positions[JointId::Head.index()] * 2.0,
            right_hand: fused.positions[JointId::HandRight.index()] * 2.0,
            left_hand: fused.positions[JointId::HandLeft.index()] * 2.0,
        };
        engine.request_scale_calibration(anchors).unwrap();
        engine.fuse(&[&frame], 1.0 / 30.0);
        assert_relative_eq!(engine.scale(), 2.0, epsilon = 1e-3);
    }
}
