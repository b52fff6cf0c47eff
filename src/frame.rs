//! Decoded frame container.
//!
//! A `Frame` is one decoded image: an owned, immutable-once-written buffer of
//! raw RGB24 samples, row-major, three interleaved channels. Dimensions are
//! fixed for the lifetime of the source that produced the frame.

use anyhow::{bail, Result};

/// Interleaved channels per pixel (RGB24).
pub const CHANNELS: usize = 3;

/// Byte length of one raw frame of the given geometry.
pub fn frame_byte_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * CHANNELS
}

/// One decoded image buffer of fixed dimensions and pixel format.
///
/// Pixel data is written once by the producing source and never mutated
/// afterwards; consumers receive frames behind `Arc` and may hold them for as
/// long as they like without blocking the producer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl Frame {
    /// Wrap a raw RGB24 buffer. The buffer length must match the geometry
    /// exactly; a mismatch means the producer and consumer disagree on the
    /// frame framing and nothing downstream can be trusted.
    pub fn from_raw(data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = frame_byte_len(width, height);
        if data.len() != expected {
            bail!(
                "raw frame buffer is {} bytes, expected {} for {}x{} RGB24",
                data.len(),
                expected,
                width,
                height
            );
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw interleaved RGB24 samples, row-major.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// One row of pixels.
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        if y >= self.height {
            return None;
        }
        let row_bytes = self.width as usize * CHANNELS;
        let start = y as usize * row_bytes;
        Some(&self.data[start..start + row_bytes])
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_raw_accepts_exact_buffer() -> Result<()> {
        let frame = Frame::from_raw(vec![0u8; frame_byte_len(4, 2)], 4, 2)?;
        assert_eq!(frame.width(), 4);
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.byte_len(), 24);
        Ok(())
    }

    #[test]
    fn from_raw_rejects_short_buffer() {
        let err = Frame::from_raw(vec![0u8; 23], 4, 2).unwrap_err();
        assert!(err.to_string().contains("expected 24"));
    }

    #[test]
    fn rows_are_addressable() -> Result<()> {
        let mut data = vec![0u8; frame_byte_len(2, 2)];
        // Second row filled with 7s.
        for b in &mut data[6..] {
            *b = 7;
        }
        let frame = Frame::from_raw(data, 2, 2)?;
        assert_eq!(frame.row(0), Some(&[0u8; 6][..]));
        assert_eq!(frame.row(1), Some(&[7u8; 6][..]));
        assert_eq!(frame.row(2), None);
        Ok(())
    }
}
