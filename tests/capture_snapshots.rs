use anyhow::{anyhow, Result};
use std::time::Duration;

use shadowbox::capture::{capture_snapshots, snapshot_path, CapturePlan};
use shadowbox::ingest::{DirectorySource, SyntheticConfig, SyntheticSource};
use shadowbox::{CancelToken, Frame, FrameSource};

fn plan(dir: &std::path::Path, count: u32) -> CapturePlan {
    CapturePlan {
        dir: dir.join("shadowbox_images"),
        count,
        interval: Duration::ZERO,
    }
}

#[test]
fn saves_numbered_snapshots_from_synthetic_source() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let plan = plan(tmp.path(), 5);
    let mut source = SyntheticSource::new(SyntheticConfig::parse("stub://capture", 64, 48)?);

    let saved = capture_snapshots(&mut source, &plan, &CancelToken::new())?;

    assert_eq!(saved.len(), 5);
    for index in 0..5 {
        let path = snapshot_path(&plan.dir, index);
        assert!(path.ends_with(format!("shadowbox_{index}.jpg")));
        assert!(path.exists(), "missing {}", path.display());
    }
    Ok(())
}

#[test]
fn snapshots_replay_through_directory_source() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let plan = plan(tmp.path(), 2);
    let mut source = SyntheticSource::new(SyntheticConfig::parse("stub://capture", 32, 16)?);
    capture_snapshots(&mut source, &plan, &CancelToken::new())?;

    let mut replay = DirectorySource::new(&plan.dir);
    replay.open()?;
    let frame = replay.read()?;
    assert_eq!((frame.width, frame.height), (32, 16));
    replay.release();
    Ok(())
}

/// Fails every other read.
struct FlakySource {
    reads: u32,
    released: bool,
}

impl FrameSource for FlakySource {
    fn describe(&self) -> String {
        "flaky".to_string()
    }

    fn open(&mut self) -> Result<()> {
        Ok(())
    }

    fn read(&mut self) -> Result<Frame> {
        self.reads += 1;
        if self.reads % 2 == 0 {
            return Err(anyhow!("dropped frame"));
        }
        Frame::new(vec![200u8; 8 * 8 * 3], 8, 8, self.reads as u64)
    }

    fn release(&mut self) {
        self.released = true;
    }
}

#[test]
fn failed_reads_are_skipped_without_saving() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let plan = plan(tmp.path(), 4);
    let mut source = FlakySource {
        reads: 0,
        released: false,
    };

    let saved = capture_snapshots(&mut source, &plan, &CancelToken::new())?;

    assert_eq!(source.reads, 4);
    assert!(source.released);
    assert_eq!(
        saved,
        vec![snapshot_path(&plan.dir, 0), snapshot_path(&plan.dir, 2)]
    );
    assert!(!snapshot_path(&plan.dir, 1).exists());
    assert!(!snapshot_path(&plan.dir, 3).exists());
    Ok(())
}

#[test]
fn cancelled_capture_saves_nothing() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let plan = plan(tmp.path(), 3);
    let cancel = CancelToken::new();
    cancel.cancel();
    let mut source = SyntheticSource::new(SyntheticConfig::parse("stub://capture", 8, 8)?);

    let saved = capture_snapshots(&mut source, &plan, &cancel)?;
    assert!(saved.is_empty());
    assert!(plan.dir.is_dir());
    Ok(())
}

struct MissingCamera {
    released: u32,
}

impl FrameSource for MissingCamera {
    fn describe(&self) -> String {
        "/dev/video9".to_string()
    }

    fn open(&mut self) -> Result<()> {
        Err(anyhow!("no such device"))
    }

    fn read(&mut self) -> Result<Frame> {
        Err(anyhow!("not open"))
    }

    fn release(&mut self) {
        self.released += 1;
    }
}

#[test]
fn open_failure_releases_the_camera() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let plan = plan(tmp.path(), 2);
    let mut source = MissingCamera { released: 0 };

    let err = capture_snapshots(&mut source, &plan, &CancelToken::new())
        .expect_err("open failure must surface");

    assert!(format!("{err:#}").contains("failed to open camera /dev/video9"));
    assert_eq!(source.released, 1);
    assert!(!snapshot_path(&plan.dir, 0).exists());
    Ok(())
}
