//! Local capture device source.
//!
//! `DeviceSource` wraps a capture device handle and pumps its frames into a
//! shared [`FrameSlot`]. The source is responsible for:
//! - Opening the device by URI (or accepting a caller-provided handle)
//! - Reading one frame synchronously at construction
//! - Running the pump loop: one blocking device read per iteration, outcome
//!   written into the slot, failures absorbed
//! - Serving static geometry queries from values cached at construction
//!
//! A persistently failing device is not retried or backed off; the slot's
//! validity flag simply reflects the last read, and the caller decides when
//! a frozen source is terminal and stops it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use crate::frame::{frame_byte_len, Frame};
use crate::pump::{PumpHandle, SourceState};
use crate::slot::FrameSlot;

/// Configuration for a capture device source.
#[derive(Clone, Debug)]
pub struct DeviceConfig {
    /// Device URI: `stub://name` for the synthetic backend,
    /// `stub://name?frames=N` for a seekable synthetic, or a device node /
    /// numeric index for real backends.
    pub uri: String,
    /// Preferred frame width.
    pub width: u32,
    /// Preferred frame height.
    pub height: u32,
    /// Nominal frame rate reported by synthetic devices.
    pub frame_rate: f64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            uri: "stub://camera".to_string(),
            width: 640,
            height: 480,
            frame_rate: 30.0,
        }
    }
}

/// Blocking single-frame capture handle.
///
/// This is the seam between the pump and whatever actually produces pixels:
/// a webcam, a file-backed capture, or a synthetic test device. Seek
/// operations have defaults suiting live, non-seekable devices.
pub trait CaptureDevice: Send {
    /// Read the next frame, blocking until one is available. An error means
    /// the device produced nothing this iteration (end of stream,
    /// disconnect); the pump records it and keeps going.
    fn read_frame(&mut self) -> Result<Frame>;

    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn frame_rate(&self) -> f64;

    /// Index of the frame the next `read_frame` will return, for seekable
    /// backends.
    fn position(&self) -> Option<u64> {
        None
    }

    /// Seek to an absolute frame index.
    fn set_position(&mut self, _frame: u64) -> Result<()> {
        bail!("device is not seekable")
    }

    /// Total frames, for seekable backends.
    fn frame_count(&self) -> Option<u64> {
        None
    }
}

/// Statistics for a device source.
#[derive(Clone, Debug)]
pub struct DeviceStats {
    pub frames_pumped: u64,
    pub uri: String,
}

/// Capture device source with a background pump.
pub struct DeviceSource {
    uri: String,
    device: Option<Box<dyn CaptureDevice>>,
    slot: FrameSlot,
    pump: Option<PumpHandle>,
    frames_pumped: Arc<AtomicU64>,
    width: u32,
    height: u32,
    frame_rate: f64,
}

impl DeviceSource {
    /// Open a device by URI and read the first frame into the slot. A failed
    /// first read is not fatal; it leaves the slot invalid, exactly like a
    /// failed read mid-pump.
    pub fn open(config: DeviceConfig) -> Result<Self> {
        let device: Box<dyn CaptureDevice> = if config.uri.starts_with("stub://") {
            Box::new(SyntheticDevice::from_uri(&config)?)
        } else {
            #[cfg(feature = "device-v4l2")]
            {
                Box::new(super::v4l2::V4l2Device::open(&config)?)
            }
            #[cfg(not(feature = "device-v4l2"))]
            {
                bail!(
                    "unsupported device uri '{}' (real devices require the device-v4l2 feature)",
                    config.uri
                )
            }
        };
        Self::from_device(device, &config.uri)
    }

    /// Wrap a caller-provided device handle.
    pub fn from_device(mut device: Box<dyn CaptureDevice>, uri: &str) -> Result<Self> {
        let width = device.width();
        let height = device.height();
        let frame_rate = device.frame_rate();

        let slot = FrameSlot::new();
        match device.read_frame() {
            Ok(frame) => slot.write(frame),
            Err(err) => {
                log::warn!("DeviceSource: initial read from {} failed: {:#}", uri, err);
                slot.write_failed();
            }
        }

        log::info!(
            "DeviceSource: opened {} ({}x{} @ {:.1} fps)",
            uri,
            width,
            height,
            frame_rate
        );

        Ok(Self {
            uri: uri.to_string(),
            device: Some(device),
            slot,
            pump: None,
            frames_pumped: Arc::new(AtomicU64::new(0)),
            width,
            height,
            frame_rate,
        })
    }

    /// Spawn the pump thread and return immediately. The device handle moves
    /// into the pump; geometry queries keep working, seek queries stop.
    pub fn start(&mut self) -> Result<()> {
        if self.pump.is_some() {
            bail!("source already started");
        }
        let mut device = self
            .device
            .take()
            .context("source was stopped; construct a new one to restart")?;
        let slot = self.slot.clone();
        let frames_pumped = Arc::clone(&self.frames_pumped);
        let uri = self.uri.clone();

        let pump = PumpHandle::spawn("device-pump", move |stop| loop {
            if stop.load(Ordering::Acquire) {
                return;
            }
            match device.read_frame() {
                Ok(frame) => {
                    slot.write(frame);
                    frames_pumped.fetch_add(1, Ordering::Relaxed);
                }
                Err(err) => {
                    log::debug!("DeviceSource: read from {} failed: {:#}", uri, err);
                    slot.write_failed();
                }
            }
        })?;
        self.pump = Some(pump);
        Ok(())
    }

    /// Non-blocking snapshot: validity of the last device read plus the most
    /// recent frame.
    pub fn read(&self) -> (bool, Option<Arc<Frame>>) {
        self.slot.read()
    }

    /// Signal the pump to exit. Non-blocking, idempotent; the pump observes
    /// the flag on its next iteration.
    pub fn stop(&mut self) {
        if let Some(pump) = &self.pump {
            pump.stop();
        }
    }

    /// `stop()` plus a join on the pump thread, for deterministic teardown.
    pub fn stop_wait(&mut self) {
        self.stop();
        if let Some(pump) = &mut self.pump {
            pump.join();
        }
    }

    pub fn state(&self) -> SourceState {
        match &self.pump {
            Some(pump) => pump.state(),
            None => SourceState::Stopped,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    /// Seek to an absolute frame index. Delegates to the device; only valid
    /// while the pump does not own the handle.
    pub fn set_position(&mut self, frame: u64) -> Result<()> {
        self.seekable_device()?.set_position(frame)
    }

    pub fn position(&mut self) -> Result<Option<u64>> {
        Ok(self.seekable_device()?.position())
    }

    pub fn frame_count(&mut self) -> Result<Option<u64>> {
        Ok(self.seekable_device()?.frame_count())
    }

    pub fn stats(&self) -> DeviceStats {
        DeviceStats {
            frames_pumped: self.frames_pumped.load(Ordering::Relaxed),
            uri: self.uri.clone(),
        }
    }

    fn seekable_device(&mut self) -> Result<&mut Box<dyn CaptureDevice>> {
        self.device
            .as_mut()
            .context("device handle is owned by the running pump")
    }
}

// ----------------------------------------------------------------------------
// Synthetic device (stub://) for tests
// ----------------------------------------------------------------------------

/// In-process device producing deterministic patterned frames.
///
/// `stub://name` behaves like a live camera (not seekable, never ends);
/// `stub://name?frames=N` behaves like a file-backed capture with N frames,
/// exercising the seek surface and end-of-stream reads.
pub struct SyntheticDevice {
    width: u32,
    height: u32,
    frame_rate: f64,
    position: u64,
    total: Option<u64>,
}

impl SyntheticDevice {
    fn from_uri(config: &DeviceConfig) -> Result<Self> {
        Ok(Self {
            width: config.width,
            height: config.height,
            frame_rate: config.frame_rate,
            position: 0,
            total: parse_stub_frames(&config.uri)?,
        })
    }

    /// Live synthetic device.
    pub fn live(width: u32, height: u32, frame_rate: f64) -> Self {
        Self {
            width,
            height,
            frame_rate,
            position: 0,
            total: None,
        }
    }

    /// Seekable synthetic device with a fixed frame count.
    pub fn seekable(width: u32, height: u32, frame_rate: f64, frames: u64) -> Self {
        Self {
            width,
            height,
            frame_rate,
            position: 0,
            total: Some(frames),
        }
    }

    fn generate_pixels(&self) -> Vec<u8> {
        let mut pixels = vec![0u8; frame_byte_len(self.width, self.height)];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            // Mix frame index and position for variation between frames.
            *pixel = ((i as u64 + self.position) % 256) as u8;
        }
        pixels
    }
}

impl CaptureDevice for SyntheticDevice {
    fn read_frame(&mut self) -> Result<Frame> {
        if let Some(total) = self.total {
            if self.position >= total {
                bail!("end of stream at frame {}", total);
            }
        }
        let frame = Frame::from_raw(self.generate_pixels(), self.width, self.height)?;
        self.position += 1;
        Ok(frame)
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    fn position(&self) -> Option<u64> {
        self.total.map(|_| self.position)
    }

    fn set_position(&mut self, frame: u64) -> Result<()> {
        let Some(total) = self.total else {
            bail!("device is not seekable");
        };
        if frame > total {
            bail!("position {} is past the end ({} frames)", frame, total);
        }
        self.position = frame;
        Ok(())
    }

    fn frame_count(&self) -> Option<u64> {
        self.total
    }
}

fn parse_stub_frames(uri: &str) -> Result<Option<u64>> {
    let Some((_, query)) = uri.split_once('?') else {
        return Ok(None);
    };
    for pair in query.split('&') {
        if let Some(value) = pair.strip_prefix("frames=") {
            let frames: u64 = value
                .parse()
                .with_context(|| format!("invalid frames count in '{}'", uri))?;
            return Ok(Some(frames));
        }
    }
    Ok(None)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
