//! Image directory frame source.
//!
//! Replays the `.jpg`/`.jpeg`/`.png` files of a directory in file-name order,
//! for example a folder filled by `capture_images`. Reads fail once every
//! image has been returned.

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

use super::FrameSource;
use crate::frame::Frame;

pub struct DirectorySource {
    dir: PathBuf,
    queue: Vec<PathBuf>,
    cursor: usize,
    opened: bool,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            queue: Vec::new(),
            cursor: 0,
            opened: false,
        }
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "jpg" | "jpeg" | "png"))
        .unwrap_or(false)
}

impl FrameSource for DirectorySource {
    fn describe(&self) -> String {
        self.dir.display().to_string()
    }

    fn open(&mut self) -> Result<()> {
        let mut images = Vec::new();
        for entry in std::fs::read_dir(&self.dir)
            .with_context(|| format!("open image directory {}", self.dir.display()))?
        {
            let path = entry?.path();
            if path.is_file() && is_image(&path) {
                images.push(path);
            }
        }
        images.sort();
        if images.is_empty() {
            return Err(anyhow!("no images found in {}", self.dir.display()));
        }
        log::info!(
            "DirectorySource: {} images in {}",
            images.len(),
            self.dir.display()
        );
        self.queue = images;
        self.cursor = 0;
        self.opened = true;
        Ok(())
    }

    fn read(&mut self) -> Result<Frame> {
        if !self.opened {
            return Err(anyhow!("image directory {} is not open", self.dir.display()));
        }
        let path = self
            .queue
            .get(self.cursor)
            .ok_or_else(|| anyhow!("image directory {} exhausted", self.dir.display()))?;
        let image = image::open(path)
            .with_context(|| format!("decode {}", path.display()))?
            .into_rgb8();
        self.cursor += 1;
        Ok(Frame::from_image(image, self.cursor as u64))
    }

    fn release(&mut self) {
        self.opened = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn replays_images_in_name_order() -> Result<()> {
        let dir = tempfile::tempdir()?;
        RgbImage::new(4, 2).save(dir.path().join("b.png"))?;
        RgbImage::new(8, 6).save(dir.path().join("a.png"))?;
        std::fs::write(dir.path().join("notes.txt"), "ignored")?;

        let mut source = DirectorySource::new(dir.path());
        source.open()?;
        let first = source.read()?;
        assert_eq!((first.width, first.height), (8, 6));
        let second = source.read()?;
        assert_eq!((second.width, second.height), (4, 2));
        assert!(source.read().is_err());
        Ok(())
    }

    #[test]
    fn empty_directory_fails_to_open() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut source = DirectorySource::new(dir.path());
        assert!(source.open().is_err());
        Ok(())
    }
}
