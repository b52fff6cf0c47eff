//! Shared latest-frame slot.
//!
//! `FrameSlot` is the single cell a pump thread refreshes and consumers
//! sample. The contract is intentionally weak: last-write-wins, no history,
//! no capacity, no blocking on either side. It provides freshness, not
//! ordering.
//!
//! Frames are stored as immutable `Arc<Frame>` snapshots replaced under a
//! short-lived mutex, so a reader always observes a complete frame (possibly
//! a stale one), never a torn mix of two writes.

use std::sync::{Arc, Mutex};

use crate::frame::Frame;

/// Single-cell, last-write-wins location holding the most recent frame.
///
/// Cloning is cheap and shares the underlying cell; one clone lives inside
/// the pump thread, the others with consumers.
#[derive(Clone, Default)]
pub struct FrameSlot {
    inner: Arc<Mutex<SlotState>>,
}

#[derive(Default)]
struct SlotState {
    /// False until the first successful write, and after a failed read.
    valid: bool,
    frame: Option<Arc<Frame>>,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current contents unconditionally.
    pub fn write(&self, frame: Frame) {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        state.frame = Some(Arc::new(frame));
        state.valid = true;
    }

    /// Record that the producer's last read failed. The stale frame is kept
    /// so consumers that only want pixels still get the most recent ones.
    pub fn write_failed(&self) {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        state.valid = false;
    }

    /// Non-blocking snapshot: the validity of the producer's last read plus
    /// the most recently written frame, if any.
    pub fn read(&self) -> (bool, Option<Arc<Frame>>) {
        let state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        (state.valid, state.frame.clone())
    }

    /// The most recently written frame, ignoring validity.
    pub fn latest(&self) -> Option<Arc<Frame>> {
        let state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        state.frame.clone()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
