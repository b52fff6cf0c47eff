//! framefeed
//!
//! Latest-frame video sources: a uniform abstraction for continuously
//! pulling frames from a local capture device or a remotely transcoded live
//! stream, decoupling the rate frames arrive from the rate a consumer asks
//! for them.
//!
//! # Architecture
//!
//! Each source runs one background pump thread that refreshes a single
//! shared latest-frame slot:
//!
//! - **Producer side**: the pump performs one blocking read per iteration
//!   (device read or exact-size pipe read) and overwrites the slot,
//!   last-write-wins. No queue, no history.
//! - **Consumer side**: `read()` is a non-blocking snapshot of the slot.
//!   Staleness is tolerable; torn frames are not, so the slot hands out
//!   immutable `Arc<Frame>` snapshots.
//! - **Teardown**: `stop()` raises a cooperative flag and never blocks;
//!   `stop_wait()` additionally joins the pump. Stream sources own their
//!   decoder process and terminate it on stop. Stopped sources do not
//!   restart; construct a new one.
//!
//! # Module Structure
//!
//! - `frame`: the decoded RGB24 frame container
//! - `slot`: the shared last-write-wins frame slot
//! - `pump`: background pump thread machinery and source lifecycle
//! - `probe`: stream geometry discovery via an external inspector, with retry
//! - `source`: the device and transcoded-pipe sources
//! - `rate`: frames-per-second measurement
//! - `config`: layered daemon configuration

pub mod config;
pub mod frame;
pub mod probe;
pub mod pump;
pub mod rate;
pub mod slot;
pub mod source;

pub use config::{FeedConfig, SourceKind};
pub use frame::{frame_byte_len, Frame, CHANNELS};
pub use probe::{probe, ProbeConfig, StreamMetadata};
pub use pump::SourceState;
pub use rate::RateMeter;
pub use slot::FrameSlot;
pub use source::{
    CaptureDevice, DeviceConfig, DeviceSource, DeviceStats, PipeConfig, PipeSource, PipeStats,
    SyntheticDevice,
};
