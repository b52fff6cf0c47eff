//! Background pump machinery.
//!
//! Every source runs one pump thread that repeatedly performs a blocking
//! producer read and refreshes the shared [`FrameSlot`](crate::FrameSlot).
//! Cancellation is cooperative: `stop()` raises a flag the loop checks once
//! per iteration and never blocks, so cancellation latency equals one
//! in-flight read. Callers that need deterministic teardown join the thread
//! through the handle instead of relying on the flag alone.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::{Context, Result};

/// Lifecycle of a source. There is no `Stopped -> Running` transition; a new
/// source must be constructed to restart.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceState {
    Running,
    Stopped,
}

/// Handle to a running pump thread: the stop flag plus the join handle.
pub(crate) struct PumpHandle {
    stop: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl PumpHandle {
    /// Spawn a named pump thread. The closure receives the stop flag and is
    /// expected to poll it once per loop iteration.
    pub(crate) fn spawn<F>(name: &str, body: F) -> Result<Self>
    where
        F: FnOnce(Arc<AtomicBool>) + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let join = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || body(thread_stop))
            .with_context(|| format!("spawn pump thread '{}'", name))?;
        Ok(Self {
            stop,
            join: Some(join),
        })
    }

    /// Signal the pump to exit. Non-blocking and idempotent.
    pub(crate) fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub(crate) fn state(&self) -> SourceState {
        if self.stop.load(Ordering::Acquire) {
            SourceState::Stopped
        } else {
            SourceState::Running
        }
    }

    /// Wait for the pump thread to exit. `stop()` must have been called (or
    /// the pump must be about to exit on its own) or this blocks until the
    /// next flag check.
    pub(crate) fn join(&mut self) {
        if let Some(handle) = self.join.take() {
            if handle.join().is_err() {
                log::error!("pump thread panicked");
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
