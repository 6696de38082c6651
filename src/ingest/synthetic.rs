//! Synthetic frame source (`stub://`).
//!
//! Produces a moving gradient so consecutive frames differ. An optional
//! `frames=N` query makes every read after the N-th fail, which simulates a
//! camera dropping off the bus.

use anyhow::{anyhow, Result};

use super::FrameSource;
use crate::frame::Frame;

#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    /// Full `stub://` URL, kept for logging.
    pub url: String,
    pub width: u32,
    pub height: u32,
    /// Number of successful reads before the source starts failing.
    pub frame_limit: Option<u64>,
}

impl SyntheticConfig {
    pub fn parse(url: &str, width: u32, height: u32) -> Result<Self> {
        let rest = url
            .strip_prefix("stub://")
            .ok_or_else(|| anyhow!("synthetic source url must start with stub://"))?;
        let mut frame_limit = None;
        if let Some((_, query)) = rest.split_once('?') {
            for pair in query.split('&') {
                match pair.split_once('=') {
                    Some(("frames", value)) => {
                        frame_limit = Some(value.parse().map_err(|_| {
                            anyhow!("stub source frames must be an integer, got '{}'", value)
                        })?);
                    }
                    _ => return Err(anyhow!("unknown stub source option '{}'", pair)),
                }
            }
        }
        Ok(Self {
            url: url.to_string(),
            width,
            height,
            frame_limit,
        })
    }
}

pub struct SyntheticSource {
    config: SyntheticConfig,
    frame_count: u64,
    opened: bool,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Self {
        Self {
            config,
            frame_count: 0,
            opened: false,
        }
    }

    fn generate_pixels(&self) -> Vec<u8> {
        let width = self.config.width as usize;
        let pixel_count = width * self.config.height as usize;
        let shift = self.frame_count as usize;
        let mut pixels = Vec::with_capacity(pixel_count * 3);
        for i in 0..pixel_count {
            let x = i % width;
            let y = i / width;
            pixels.push(((x + shift) % 256) as u8);
            pixels.push(((y + shift) % 256) as u8);
            pixels.push(((x + y) % 256) as u8);
        }
        pixels
    }
}

impl FrameSource for SyntheticSource {
    fn describe(&self) -> String {
        self.config.url.clone()
    }

    fn open(&mut self) -> Result<()> {
        self.opened = true;
        log::info!(
            "SyntheticSource: connected to {} ({}x{})",
            self.config.url,
            self.config.width,
            self.config.height
        );
        Ok(())
    }

    fn read(&mut self) -> Result<Frame> {
        if !self.opened {
            return Err(anyhow!("synthetic source {} is not open", self.config.url));
        }
        if let Some(limit) = self.config.frame_limit {
            if self.frame_count >= limit {
                return Err(anyhow!(
                    "synthetic source {} exhausted after {} frames",
                    self.config.url,
                    limit
                ));
            }
        }
        self.frame_count += 1;
        let pixels = self.generate_pixels();
        Frame::new(
            pixels,
            self.config.width,
            self.config.height,
            self.frame_count,
        )
    }

    fn release(&mut self) {
        self.opened = false;
    }
}
