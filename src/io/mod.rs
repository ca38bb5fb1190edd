//! I/O infrastructure.
//!
//! Network receipt of sensor frames and the snapshot handoff into the
//! fusion cycle. Nothing here touches fusion state; the only cross-thread
//! seam is the buffer swap in [`snapshot`].

pub mod skeleton_client;
pub mod snapshot;

pub use skeleton_client::{decode_frame, spawn_receiver, ClientError, SkeletonClient};
pub use snapshot::SnapshotBuffer;
