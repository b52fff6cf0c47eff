//! Transcoded live-stream source.
//!
//! `PipeSource` delegates decoding to an external process (ffmpeg by
//! default) configured to write an endless sequence of raw RGB24 frames to
//! its standard output. The protocol has no framing: the probed geometry's
//! `width*height*3` chunk size is the only thing partitioning the byte
//! stream, so a short read means the framing is lost and the source is done.
//!
//! Construction probes stream metadata, spawns the decoder, and reads the
//! first frame synchronously; `start()` spawns the pump that refreshes the
//! slot with one exact-size read per iteration. The source exclusively owns
//! the decoder process: `stop()` kills it (which unblocks an in-flight pipe
//! read), reaps it, and joins the pump, and dropping the source does the
//! same, so the child never outlives its owner.

use std::io::Read;
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use crate::frame::{frame_byte_len, Frame};
use crate::probe::{self, ProbeConfig, StreamMetadata};
use crate::pump::{PumpHandle, SourceState};
use crate::slot::FrameSlot;

const DEFAULT_DECODER_COMMAND: &str = "ffmpeg";

/// Configuration for a transcoded pipe source.
#[derive(Clone, Debug)]
pub struct PipeConfig {
    /// Stream URI (e.g. an HLS playlist URL).
    pub url: String,
    /// Decoder executable.
    pub decoder: String,
    /// Metadata probe policy.
    pub probe: ProbeConfig,
}

impl Default for PipeConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            decoder: DEFAULT_DECODER_COMMAND.to_string(),
            probe: ProbeConfig::default(),
        }
    }
}

/// Statistics for a pipe source.
#[derive(Clone, Debug)]
pub struct PipeStats {
    pub frames_pumped: u64,
    pub url: String,
}

/// Live-stream source backed by an external decoder process.
pub struct PipeSource {
    config: PipeConfig,
    metadata: StreamMetadata,
    slot: FrameSlot,
    child: Option<Child>,
    reader: Option<FrameReader<ChildStdout>>,
    pump: Option<PumpHandle>,
    frames_pumped: Arc<AtomicU64>,
}

impl PipeSource {
    /// Probe the stream's geometry, spawn the decoder, and read the first
    /// frame. Returns only once a full frame is in the slot, so the source
    /// is immediately readable before `start()`.
    pub fn open(config: PipeConfig) -> Result<Self> {
        let metadata = probe::probe(&config.url, &config.probe)?;

        let mut child = spawn_decoder(&config.decoder, &config.url)?;
        let stdout = child
            .stdout
            .take()
            .context("decoder has no stdout pipe")?;
        let mut reader = FrameReader::new(stdout, metadata);

        let slot = FrameSlot::new();
        let first = match reader.read_frame() {
            Ok(frame) => frame,
            Err(err) => {
                // Construction failed; don't leave the decoder running.
                let _ = child.kill();
                let _ = child.wait();
                return Err(err).context("read first frame from decoder");
            }
        };
        slot.write(first);

        log::info!(
            "PipeSource: decoding {} at {}x{} ({} bytes/frame)",
            config.url,
            metadata.width,
            metadata.height,
            frame_byte_len(metadata.width, metadata.height)
        );

        Ok(Self {
            config,
            metadata,
            slot,
            child: Some(child),
            reader: Some(reader),
            pump: None,
            frames_pumped: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Spawn the pump thread and return immediately. The pump reads exactly
    /// one frame-sized chunk per iteration; a short read is terminal, marks
    /// the slot invalid, and exits the pump.
    pub fn start(&mut self) -> Result<()> {
        if self.pump.is_some() {
            bail!("source already started");
        }
        let mut reader = self
            .reader
            .take()
            .context("source was stopped; construct a new one to restart")?;
        let slot = self.slot.clone();
        let frames_pumped = Arc::clone(&self.frames_pumped);
        let url = self.config.url.clone();

        let pump = PumpHandle::spawn("pipe-pump", move |stop| loop {
            if stop.load(Ordering::Acquire) {
                return;
            }
            match reader.read_frame() {
                Ok(frame) => {
                    slot.write(frame);
                    frames_pumped.fetch_add(1, Ordering::Relaxed);
                }
                Err(err) => {
                    log::warn!("PipeSource: {} stopped producing: {:#}", url, err);
                    slot.write_failed();
                    return;
                }
            }
        })?;
        self.pump = Some(pump);
        Ok(())
    }

    /// The most recently decoded frame. No validity flag at this layer; a
    /// frozen frame is the only visible symptom of a dead stream, which is
    /// why the pump also logs terminal read failures.
    pub fn read(&self) -> Option<Arc<Frame>> {
        self.slot.latest()
    }

    /// Signal the pump to exit and terminate the decoder process. Killing
    /// the child closes the pipe, unblocking any in-flight read, so the
    /// pump's next flag check or short read ends it. Non-blocking beyond
    /// process reaping; idempotent.
    pub fn stop(&mut self) {
        if let Some(pump) = &self.pump {
            pump.stop();
        }
        if let Some(mut child) = self.child.take() {
            if let Err(err) = child.kill() {
                log::debug!("PipeSource: decoder already exited: {}", err);
            }
            if let Err(err) = child.wait() {
                log::warn!("PipeSource: failed to reap decoder: {}", err);
            }
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

    pub fn metadata(&self) -> StreamMetadata {
        self.metadata
    }

    pub fn width(&self) -> u32 {
        self.metadata.width
    }

    pub fn height(&self) -> u32 {
        self.metadata.height
    }

    pub fn stats(&self) -> PipeStats {
        PipeStats {
            frames_pumped: self.frames_pumped.load(Ordering::Relaxed),
            url: self.config.url.clone(),
        }
    }
}

impl Drop for PipeSource {
    fn drop(&mut self) {
        self.stop_wait();
    }
}

fn spawn_decoder(command: &str, url: &str) -> Result<Child> {
    Command::new(command)
        .args([
            "-i", url, "-loglevel", "quiet", "-an", "-f", "image2pipe", "-pix_fmt", "rgb24",
            "-vcodec", "rawvideo", "-",
        ])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .with_context(|| format!("spawn decoder '{}' for {}", command, url))
}

// ----------------------------------------------------------------------------
// Exact-size frame reader
// ----------------------------------------------------------------------------

/// Reads fixed-size raw frames from a byte channel.
///
/// Generic over the reader so the chunking logic is testable against
/// in-memory buffers; production wraps the decoder's stdout.
struct FrameReader<R: Read> {
    reader: R,
    metadata: StreamMetadata,
    frame_len: usize,
}

impl<R: Read> FrameReader<R> {
    fn new(reader: R, metadata: StreamMetadata) -> Self {
        Self {
            reader,
            metadata,
            frame_len: frame_byte_len(metadata.width, metadata.height),
        }
    }

    /// Read exactly one frame-sized chunk, blocking until that many bytes
    /// are available. A short read (producer closed or stalled) is an
    /// explicit error, never a malformed frame.
    fn read_frame(&mut self) -> Result<Frame> {
        let mut buf = vec![0u8; self.frame_len];
        self.reader.read_exact(&mut buf).map_err(|err| {
            if err.kind() == std::io::ErrorKind::UnexpectedEof {
                anyhow::anyhow!("short read: decoder closed its output mid-frame or at EOF")
            } else {
                anyhow::Error::new(err).context("read raw frame from decoder pipe")
            }
        })?;
        Frame::from_raw(buf, self.metadata.width, self.metadata.height)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn meta() -> StreamMetadata {
        StreamMetadata {
            width: 4,
            height: 2,
        }
    }

    #[test]
    fn reads_k_frames_then_short_read() -> Result<()> {
        let frame_len = frame_byte_len(4, 2);
        // Exactly 3 full frames, then EOF.
        let mut bytes = Vec::new();
        for fill in 0..3u8 {
            bytes.extend(std::iter::repeat(fill).take(frame_len));
        }
        let mut reader = FrameReader::new(Cursor::new(bytes), meta());

        for fill in 0..3u8 {
            let frame = reader.read_frame()?;
            assert_eq!(frame.data()[0], fill);
            assert_eq!(frame.byte_len(), frame_len);
        }

        let err = reader.read_frame().unwrap_err();
        assert!(err.to_string().contains("short read"), "{}", err);
        Ok(())
    }

    #[test]
    fn partial_trailing_frame_is_a_short_read() {
        let frame_len = frame_byte_len(4, 2);
        let bytes = vec![1u8; frame_len + frame_len / 2];
        let mut reader = FrameReader::new(Cursor::new(bytes), meta());

        assert!(reader.read_frame().is_ok());
        let err = reader.read_frame().unwrap_err();
        assert!(err.to_string().contains("short read"));
    }

    #[test]
    fn empty_channel_is_a_short_read() {
        let mut reader = FrameReader::new(Cursor::new(Vec::new()), meta());
        assert!(reader.read_frame().is_err());
    }
}
