//! Double-buffered snapshot handoff between a receiver thread and the
//! fusion cycle.
//!
//! The producer owns a pending frame it fills off-thread; the consumer
//! owns the current frame it reads for a whole cycle. The two exchange
//! boxes through one mutex-guarded slot, held only for the pointer swap:
//! no lock is held during network decode or fusion math, and no frame is
//! ever cloned.

use crate::core::types::SkeletonFrame;
use parking_lot::Mutex;

struct Slot {
    frame: Box<SkeletonFrame>,
    fresh: bool,
}

/// Single-producer single-consumer latest-frame buffer.
pub struct SnapshotBuffer {
    slot: Mutex<Slot>,
}

impl SnapshotBuffer {
    /// Create a buffer holding a default (empty) frame.
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                frame: Box::new(SkeletonFrame::default()),
                fresh: false,
            }),
        }
    }

    /// Producer side: swap a completed frame into the slot.
    ///
    /// On return, `pending` holds the slot's previous box for the producer
    /// to overwrite with the next frame; an unconsumed frame is simply
    /// superseded.
    pub fn publish(&self, pending: &mut Box<SkeletonFrame>) {
        let mut slot = self.slot.lock();
        std::mem::swap(&mut slot.frame, pending);
        slot.fresh = true;
    }

    /// Consumer side: swap the latest frame out, if a fresh one arrived.
    ///
    /// Returns true when `current` now holds a new frame; otherwise
    /// `current` is untouched and the cycle reuses its previous snapshot.
    pub fn take_latest(&self, current: &mut Box<SkeletonFrame>) -> bool {
        let mut slot = self.slot.lock();
        if !slot.fresh {
            return false;
        }
        std::mem::swap(&mut slot.frame, current);
        slot.fresh = false;
        true
    }
}

impl Default for SnapshotBuffer {
    fn default() -> Self {
        Self::new()
    }
}
