//! KayaFusion - Multi-sensor skeletal fusion engine
//!
//! Fuses independent, noisy 3D skeletal-joint streams (one per depth
//! sensor, each in its own local frame) into one temporally stable
//! skeleton in the reference sensor's frame.
//!
//! # Architecture
//!
//! The crate is organized into 5 logical layers:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                      io/                            │  ← Infrastructure
//! │        (skeleton_client, snapshot buffer)           │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                    engine/                          │  ← Orchestration
//! │        (fusion pipeline, joint filters,             │
//! │         scale calibration)                          │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                  algorithms/                        │  ← Core algorithms
//! │       (registration: correspondence, outlier        │
//! │        weighting, point-to-plane ICP,               │
//! │        absolute orientation)                        │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                   sensors/                          │  ← Sensor processing
//! │              (sampling filters)                     │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                     core/                           │  ← Foundation
//! │                 (types, math)                       │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Data Flow
//!
//! Per fusion cycle: raw per-sensor joint snapshots → (optional)
//! closed-form alignment for an initial guess → point-to-plane ICP
//! refinement into the reference sensor's frame → aligned joint positions
//! feed one Kalman-style filter per joint as successive noisy
//! measurements → fused skeleton with the fixed bone topology.
//!
//! The cycle is single-threaded and synchronous; receiver threads hand
//! off completed snapshots through a double buffer whose lock is held
//! only for the pointer swap.
//!
//! # Example
//!
//! ```ignore
//! use kaya_fusion::{FusionConfig, FusionEngine, SkeletonClient, SnapshotBuffer};
//! use kaya_fusion::io::spawn_receiver;
//! use std::sync::Arc;
//!
//! let buffer = Arc::new(SnapshotBuffer::new());
//! let client = SkeletonClient::connect("192.168.1.20:10005")?;
//! spawn_receiver(client, Arc::clone(&buffer));
//!
//! let mut engine = FusionEngine::new(FusionConfig::default());
//! let mut current = Box::new(kaya_fusion::SkeletonFrame::default());
//! loop {
//!     buffer.take_latest(&mut current);
//!     let fused = engine.fuse(&[&current], 1.0 / 30.0);
//!     // hand fused.positions + fused.bones to the renderer
//! }
//! ```

// ============================================================================
// Layer 1: Core foundation (no internal deps)
// ============================================================================
pub mod core;

// ============================================================================
// Layer 2: Sensor processing (depends on core)
// ============================================================================
pub mod sensors;

// ============================================================================
// Layer 3: Algorithms (depends on core, sensors)
// ============================================================================
pub mod algorithms;

// ============================================================================
// Layer 4: Fusion engine (depends on core, sensors, algorithms)
// ============================================================================
pub mod engine;

// ============================================================================
// Layer 5: I/O infrastructure (depends on all layers)
// ============================================================================
pub mod io;

// ============================================================================
// Convenience re-exports (flat namespace for common use)
// ============================================================================

// Core types
pub use crate::core::math;
pub use crate::core::types::{
    BoneConnection, HandStates, JointId, PointCloud, Quaternion, RigidTransform, SkeletonBody,
    SkeletonFrame, Timestamped, TrackingState, Vec3, BONES, JOINT_COUNT, MAX_BODIES,
};

// Sensors - Preprocessing
pub use sensors::preprocessing::{
    RandomSampling, RandomSamplingConfig, SamplingFilter, SurfaceNormalConfig,
    SurfaceNormalSampling,
};

// Algorithms - Registration
pub use algorithms::registration::{
    AbsoluteOrientation, Icp, IcpConfig, IcpResult, MatchedPairs, Matches, OutlierFilter,
    RegistrationError, WeightMatrix,
};

// Engine - Fusion
pub use engine::fusion::{
    AlignmentStrategy, CalibrationError, FusedSkeleton, FusionConfig, FusionEngine, JointFilter,
    JointFilterConfig, ReferenceAnchors, ScaleCalibration,
};

// I/O
pub use io::{ClientError, SkeletonClient, SnapshotBuffer};
