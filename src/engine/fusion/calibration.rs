//! One-shot scale calibration against a reference device.
//!
//! A fused skeleton lives in the reference sensor's frame; a VR-style
//! reference device reports the same person's head and hands in its own
//! scale. Triggered once from outside, the calibrator solves a 3-anchor
//! similarity alignment and the resulting uniform scale is applied to the
//! fused output from then on.

use log::{info, warn};
use thiserror::Error;

use crate::algorithms::registration::absolute_orientation;
use crate::core::types::Vec3;

/// Calibration failures surfaced to the configuration layer.
#[derive(Debug, Error, PartialEq)]
pub enum CalibrationError {
    #[error("reference anchor points must all be finite")]
    InvalidAnchors,

    #[error("body anchors are not currently tracked; calibration postponed past its trigger")]
    AnchorsUnavailable,
}

/// The three reference anchor positions, in the device's frame.
///
/// Ordered: head-mounted display, right controller, left controller,
/// matching the body anchors Head, HandRight, HandLeft.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceAnchors {
    pub head: Vec3,
    pub right_hand: Vec3,
    pub left_hand: Vec3,
}

impl ReferenceAnchors {
    fn to_array(self) -> [Vec3; 3] {
        [self.head, self.right_hand, self.left_hand]
    }

    fn is_finite(&self) -> bool {
        self.head.is_finite() && self.right_hand.is_finite() && self.left_hand.is_finite()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    Idle,
    /// Armed; the next cycle with all three body anchors tracked runs the solve.
    Pending(ReferenceAnchors),
    Done,
}

/// One-shot scale calibration state machine.
#[derive(Debug)]
pub struct ScaleCalibration {
    state: State,
    scale: f32,
}

impl Default for ScaleCalibration {
    fn default() -> Self {
        Self::new()
    }
}

impl ScaleCalibration {
    /// Create an idle calibrator with unit scale.
    pub fn new() -> Self {
        Self {
            state: State::Idle,
            scale: 1.0,
        }
    }

    /// The calibrated scale; 1.0 until a calibration completes.
    #[inline]
    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Whether a request is armed and waiting for tracked anchors.
    #[inline]
    pub fn is_pending(&self) -> bool {
        matches!(self.state, State::Pending(_))
    }

    /// Whether a calibration has completed.
    #[inline]
    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    /// Arm a calibration with the reference device's anchor positions.
    ///
    /// Re-triggering while one is pending (or after completion) is
    /// ignored, per the one-shot contract.
    pub fn request(&mut self, anchors: ReferenceAnchors) -> Result<(), CalibrationError> {
        if !anchors.is_finite() {
            return Err(CalibrationError::InvalidAnchors);
        }
        match self.state {
            State::Idle => {
                self.state = State::Pending(anchors);
                Ok(())
            }
            State::Pending(_) | State::Done => {
                warn!("scale calibration re-trigger ignored");
                Ok(())
            }
        }
    }

    /// Run the pending calibration against the fused body anchors
    /// (Head, HandRight, HandLeft), if one is armed.
    ///
    /// Called by the fusion engine each cycle; a `None` anchor set (some
    /// body anchor untracked) leaves the request pending for a later
    /// cycle.
    pub fn try_complete(&mut self, body_anchors: Option<[Vec3; 3]>) {
        let State::Pending(reference) = self.state else {
            return;
        };
        let Some(body) = body_anchors else {
            return;
        };

        match absolute_orientation::solve(&body, &reference.to_array(), true) {
            Ok(solution) => {
                self.scale = solution.scale;
                self.state = State::Done;
                info!("scale calibration complete: scale {:.4}", self.scale);
            }
            Err(err) => {
                // Degenerate anchor geometry this cycle (e.g. hands
                // together); stay pending and retry next cycle.
                warn!("scale calibration solve failed: {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn reference() -> ReferenceAnchors {
        ReferenceAnchors {
            head: Vec3::new(0.0, 1.8, 0.0),
            right_hand: Vec3::new(0.6, 1.2, 0.3),
            left_hand: Vec3::new(-0.6, 1.3, 0.2),
        }
    }

    fn scaled_body(scale: f32) -> [Vec3; 3] {
        let r = reference();
        [
            r.head * (1.0 / scale),
            r.right_hand * (1.0 / scale),
            r.left_hand * (1.0 / scale),
        ]
    }

    #[test]
    fn test_one_shot_lifecycle() {
        let mut cal = ScaleCalibration::new();
        assert_relative_eq!(cal.scale(), 1.0);
        assert!(!cal.is_pending());

        cal.request(reference()).unwrap();
        assert!(cal.is_pending());

        // No tracked anchors yet: stays pending.
        cal.try_complete(None);
        assert!(cal.is_pending());

        cal.try_complete(Some(scaled_body(2.0)));
        assert!(cal.is_done());
        assert_relative_eq!(cal.scale(), 2.0, epsilon = 1e-3);
    }

    #[test]
    fn test_retrigger_ignored() {
        let mut cal = ScaleCalibration::new();
        cal.request(reference()).unwrap();

        let mut other = reference();
        other.head.y = 99.0;
        cal.request(other).unwrap();

        // The first request's anchors are still in effect.
        cal.try_complete(Some(scaled_body(1.5)));
        assert_relative_eq!(cal.scale(), 1.5, epsilon = 1e-3);

        // Completed calibration is permanent.
        cal.request(reference()).unwrap();
        assert!(cal.is_done());
    }

    #[test]
    fn test_invalid_anchors_refused() {
        let mut cal = ScaleCalibration::new();
        let mut bad = reference();
        bad.left_hand.x = f32::NAN;
        assert_eq!(cal.request(bad), Err(CalibrationError::InvalidAnchors));
        assert!(!cal.is_pending());
    }

    #[test]
    fn test_degenerate_body_anchors_stay_pending() {
        let mut cal = ScaleCalibration::new();
        cal.request(reference()).unwrap();
        cal.try_complete(Some([Vec3::ZERO; 3]));
        assert!(cal.is_pending());
        assert_relative_eq!(cal.scale(), 1.0);
    }
}
