//! Frame sources.
//!
//! This module provides the two source kinds:
//! - Local capture devices (`DeviceSource`, trait-seamed over `CaptureDevice`)
//! - Remotely transcoded live streams (`PipeSource`, external decoder process)
//!
//! Both follow the same shape: construct (opens the device or spawns the
//! decoder, populating the first frame), `start()` (spawns the pump thread),
//! opportunistic non-blocking `read()`, `stop()` (cooperative flag) or
//! `stop_wait()` (flag plus join). A stopped source cannot be restarted.

pub mod device;
pub mod pipe;
#[cfg(feature = "device-v4l2")]
pub(crate) mod v4l2;

pub use device::{CaptureDevice, DeviceConfig, DeviceSource, DeviceStats, SyntheticDevice};
pub use pipe::{PipeConfig, PipeSource, PipeStats};
