//! Frame sources.
//!
//! This module provides different sources for RGB frames:
//! - Synthetic frames (`stub://<name>[?frames=N]`), for demos and tests
//! - Image directories (replay of captured snapshots)
//! - USB/V4L2 devices (feature: ingest-v4l2)
//!
//! All sources produce `Frame` instances in packed RGB24. A source is opened
//! once, read until it fails or its consumer stops, and released exactly once.

pub mod directory;
pub mod normalize;
pub mod synthetic;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

use anyhow::{anyhow, Result};
use std::path::Path;

use crate::config::CameraSettings;
use crate::frame::Frame;

pub use directory::DirectorySource;
pub use synthetic::{SyntheticConfig, SyntheticSource};
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::{V4l2Config, V4l2Source};

/// A camera-like producer of frames.
pub trait FrameSource {
    /// Human-readable source description for logs.
    fn describe(&self) -> String;

    /// Acquire the underlying device. Fails when it is unavailable.
    fn open(&mut self) -> Result<()>;

    /// Read the next frame. An error means the source is unusable.
    fn read(&mut self) -> Result<Frame>;

    /// Release the device. Must be safe to call more than once.
    fn release(&mut self);
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    fn open(&mut self) -> Result<()> {
        (**self).open()
    }

    fn read(&mut self) -> Result<Frame> {
        (**self).read()
    }

    fn release(&mut self) {
        (**self).release()
    }
}

/// Releases the wrapped source when dropped, covering every exit path.
pub struct SourceGuard<'a, S: FrameSource + ?Sized> {
    source: &'a mut S,
}

impl<'a, S: FrameSource + ?Sized> SourceGuard<'a, S> {
    pub fn new(source: &'a mut S) -> Self {
        Self { source }
    }

    pub fn source(&mut self) -> &mut S {
        &mut *self.source
    }
}

impl<S: FrameSource + ?Sized> Drop for SourceGuard<'_, S> {
    fn drop(&mut self) {
        self.source.release();
        log::info!("released frame source {}", self.source.describe());
    }
}

/// Build a frame source from a source string.
///
/// - `stub://...` selects the synthetic source
/// - an existing directory replays its images
/// - anything else is treated as a V4L2 device path (or bare device index)
pub fn open_source(spec: &str, camera: &CameraSettings) -> Result<Box<dyn FrameSource>> {
    let spec = spec.trim();
    if spec.is_empty() {
        return Err(anyhow!("frame source must not be empty"));
    }
    if spec.starts_with("stub://") {
        let config = SyntheticConfig::parse(spec, camera.width, camera.height)?;
        return Ok(Box::new(SyntheticSource::new(config)));
    }
    if Path::new(spec).is_dir() {
        return Ok(Box::new(DirectorySource::new(spec)));
    }
    open_device(device_path(spec), camera)
}

fn device_path(spec: &str) -> String {
    if spec.chars().all(|c| c.is_ascii_digit()) {
        format!("/dev/video{spec}")
    } else {
        spec.to_string()
    }
}

#[cfg(feature = "ingest-v4l2")]
fn open_device(device: String, camera: &CameraSettings) -> Result<Box<dyn FrameSource>> {
    Ok(Box::new(V4l2Source::new(V4l2Config {
        device,
        target_fps: camera.target_fps,
        width: camera.width,
        height: camera.height,
    })))
}

#[cfg(not(feature = "ingest-v4l2"))]
fn open_device(device: String, _camera: &CameraSettings) -> Result<Box<dyn FrameSource>> {
    Err(anyhow!(
        "camera device {} requires the ingest-v4l2 feature",
        device
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MonitorConfig;

    #[test]
    fn bare_index_maps_to_device_node() {
        assert_eq!(device_path("1"), "/dev/video1");
        assert_eq!(device_path("/dev/video2"), "/dev/video2");
    }

    #[test]
    fn stub_spec_opens_synthetic_source() -> Result<()> {
        let camera = MonitorConfig::default().camera;
        let mut source = open_source("stub://bench", &camera)?;
        source.open()?;
        let frame = source.read()?;
        assert_eq!((frame.width, frame.height), (640, 480));
        source.release();
        Ok(())
    }

    #[test]
    fn empty_spec_is_rejected() {
        let camera = MonitorConfig::default().camera;
        assert!(open_source("  ", &camera).is_err());
    }
}
