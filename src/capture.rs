//! Snapshot capture for building a training set.
//!
//! Saves `count` frames as `shadowbox_<i>.jpg`, waiting `interval` after each
//! saved frame so the operator can rearrange the box between shots.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ingest::{FrameSource, SourceGuard};
use crate::monitor::CancelToken;

pub const SNAPSHOT_PREFIX: &str = "shadowbox_";

#[derive(Clone, Debug)]
pub struct CapturePlan {
    pub dir: PathBuf,
    pub count: u32,
    pub interval: Duration,
}

/// File name for snapshot `index`.
pub fn snapshot_path(dir: &Path, index: u32) -> PathBuf {
    dir.join(format!("{SNAPSHOT_PREFIX}{index}.jpg"))
}

/// Capture snapshots into `plan.dir`, creating it if needed.
///
/// A failed read skips that index without saving. Returns the saved paths.
/// The source is released before returning, including on error.
pub fn capture_snapshots<S: FrameSource + ?Sized>(
    source: &mut S,
    plan: &CapturePlan,
    cancel: &CancelToken,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(&plan.dir)
        .with_context(|| format!("create snapshot directory {}", plan.dir.display()))?;

    if let Err(err) = source.open() {
        source.release();
        return Err(err.context(format!("failed to open camera {}", source.describe())));
    }
    let mut guard = SourceGuard::new(source);

    let mut saved = Vec::new();
    for index in 0..plan.count {
        if cancel.is_cancelled() {
            log::info!("capture cancelled after {} snapshots", saved.len());
            break;
        }
        let frame = match guard.source().read() {
            Ok(frame) => frame,
            Err(err) => {
                log::warn!("snapshot {} skipped: {:#}", index, err);
                continue;
            }
        };
        let path = snapshot_path(&plan.dir, index);
        frame.save_jpeg(&path)?;
        log::info!("Saved {}", path.display());
        saved.push(path);
        if index + 1 < plan.count && !plan.interval.is_zero() {
            std::thread::sleep(plan.interval);
        }
    }
    Ok(saved)
}
