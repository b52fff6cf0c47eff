//! V4L2 capture device backend.
//!
//! Real device handle for `DeviceSource`, gated behind the `device-v4l2`
//! feature. Opens a local device node (or numeric index), negotiates RGB24,
//! and serves blocking single-frame reads off a memory-mapped buffer stream.
//! Live devices are not seekable; the trait defaults apply.

use anyhow::{Context, Result};
use ouroboros::self_referencing;

use crate::frame::{frame_byte_len, Frame};
use crate::source::device::{CaptureDevice, DeviceConfig};

pub struct V4l2Device {
    state: V4l2State,
    width: u32,
    height: u32,
    frame_rate: f64,
}

#[self_referencing]
struct V4l2State {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl V4l2Device {
    pub fn open(config: &DeviceConfig) -> Result<Self> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let path = device_path(&config.uri);
        let mut device = v4l::Device::with_path(&path)
            .with_context(|| format!("open v4l2 device {}", path))?;

        let mut format = device.format().context("read v4l2 format")?;
        format.width = config.width;
        format.height = config.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");
        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!("V4l2Device: failed to set format on {}: {}", path, err);
                device
                    .format()
                    .context("read v4l2 format after set failure")?
            }
        };

        if config.frame_rate > 0.0 {
            let params =
                v4l::video::capture::Parameters::with_fps(config.frame_rate.round() as u32);
            if let Err(err) = device.set_params(&params) {
                log::warn!("V4l2Device: failed to set fps on {}: {}", path, err);
            }
        }

        let state = V4l2StateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()?;

        Ok(Self {
            state,
            width: format.width,
            height: format.height,
            frame_rate: config.frame_rate,
        })
    }
}

impl CaptureDevice for V4l2Device {
    fn read_frame(&mut self) -> Result<Frame> {
        use v4l::io::traits::CaptureStream;

        let frame_len = frame_byte_len(self.width, self.height);
        let (buf, _meta) = self
            .state
            .with_mut(|fields| fields.stream.next())
            .map_err(|err| anyhow::Error::new(err).context("capture v4l2 frame"))?;
        let pixels = buf
            .get(..frame_len)
            .with_context(|| {
                format!(
                    "v4l2 buffer is {} bytes, expected at least {}",
                    buf.len(),
                    frame_len
                )
            })?
            .to_vec();
        Frame::from_raw(pixels, self.width, self.height)
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
}

/// A bare numeric URI is a device index; anything else is a node path.
fn device_path(uri: &str) -> String {
    match uri.parse::<u32>() {
        Ok(index) => format!("/dev/video{}", index),
        Err(_) => uri.to_string(),
    }
}
