//! V4L2 frame source.
//!
//! Opens a local video device node (e.g. `/dev/video1`), negotiates YUYV or
//! RGB3 capture at the configured size and converts each buffer to RGB24.

use anyhow::{anyhow, Context, Result};
use ouroboros::self_referencing;

use super::normalize::{normalize_to_rgb, PixelFormat};
use super::FrameSource;
use crate::frame::Frame;

/// Configuration for a V4L2 source.
#[derive(Clone, Debug)]
pub struct V4l2Config {
    /// Device path (e.g., "/dev/video0")
    pub device: String,
    /// Requested frame rate; the driver may ignore it.
    pub target_fps: u32,
    /// Preferred frame width.
    pub width: u32,
    /// Preferred frame height.
    pub height: u32,
}

impl Default for V4l2Config {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            target_fps: 10,
            width: 640,
            height: 480,
        }
    }
}

#[self_referencing]
struct DeviceState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

pub struct V4l2Source {
    config: V4l2Config,
    state: Option<DeviceState>,
    format: PixelFormat,
    frame_count: u64,
    active_width: u32,
    active_height: u32,
}

impl V4l2Source {
    pub fn new(config: V4l2Config) -> Self {
        Self {
            active_width: config.width,
            active_height: config.height,
            config,
            state: None,
            format: PixelFormat::Yuyv,
            frame_count: 0,
        }
    }
}

fn pixel_format_for(fourcc: v4l::FourCC) -> Result<PixelFormat> {
    match &fourcc.repr {
        b"YUYV" => Ok(PixelFormat::Yuyv),
        b"RGB3" => Ok(PixelFormat::Rgb24),
        b"NV12" => Ok(PixelFormat::Nv12),
        other => Err(anyhow!(
            "unsupported v4l2 pixel format {}",
            String::from_utf8_lossy(other)
        )),
    }
}

impl FrameSource for V4l2Source {
    fn describe(&self) -> String {
        self.config.device.clone()
    }

    fn open(&mut self) -> Result<()> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let device = v4l::Device::with_path(&self.config.device)
            .with_context(|| format!("open v4l2 device {}", self.config.device))?;
        let mut format = device.format().context("read v4l2 format")?;
        format.width = self.config.width;
        format.height = self.config.height;
        format.fourcc = v4l::FourCC::new(b"YUYV");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!(
                    "V4l2Source: failed to set format on {}: {}",
                    self.config.device,
                    err
                );
                device
                    .format()
                    .context("read v4l2 format after set failure")?
            }
        };

        if self.config.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(self.config.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!(
                    "V4l2Source: failed to set fps on {}: {}",
                    self.config.device,
                    err
                );
            }
        }

        self.format = pixel_format_for(format.fourcc)?;
        self.active_width = format.width;
        self.active_height = format.height;

        let state = DeviceStateTryBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()?;
        self.state = Some(state);

        log::info!(
            "V4l2Source: connected to {} ({}x{} {:?})",
            self.config.device,
            self.active_width,
            self.active_height,
            self.format
        );
        Ok(())
    }

    fn read(&mut self) -> Result<Frame> {
        use v4l::io::traits::CaptureStream;

        let state = self.state.as_mut().context("v4l2 device not connected")?;
        let raw = state
            .with_mut(|fields| {
                fields
                    .stream
                    .next()
                    .map(|(buf, meta)| buf[..(meta.bytesused as usize).min(buf.len())].to_vec())
            })
            .context("capture v4l2 frame")?;

        let rgb = normalize_to_rgb(&raw, self.active_width, self.active_height, self.format)?;
        self.frame_count += 1;
        Frame::new(rgb, self.active_width, self.active_height, self.frame_count)
    }

    fn release(&mut self) {
        // dropping the stream unmaps buffers before the device handle closes
        self.state = None;
    }
}
