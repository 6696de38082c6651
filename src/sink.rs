//! Presentation sinks.
//!
//! The detection loop hands every annotated frame and every status update to
//! a `PresentationSink`. Sinks decide how (and whether) to render them.

use anyhow::{Context, Result};
use std::io::Write;
use std::path::PathBuf;

use crate::frame::Frame;
use crate::monitor::LoopSummary;
use crate::tools::{status_lines, ToolReport};

pub const MONITOR_TITLE: &str = "WASP Shadowbox Monitor";

pub trait PresentationSink {
    /// Render an annotated frame with one caption per detection box.
    fn show_frame(&mut self, frame: &Frame, captions: &[String]) -> Result<()>;

    /// Render the per-tool status for the current frame.
    fn show_status(&mut self, statuses: &[ToolReport]) -> Result<()>;

    /// Polled once per loop iteration; `true` ends the loop normally.
    fn quit_requested(&mut self) -> bool {
        false
    }

    /// Called once when the loop exits, whatever the reason.
    fn session_ended(&mut self, _summary: &LoopSummary) -> Result<()> {
        Ok(())
    }
}

impl<P: PresentationSink + ?Sized> PresentationSink for Box<P> {
    fn show_frame(&mut self, frame: &Frame, captions: &[String]) -> Result<()> {
        (**self).show_frame(frame, captions)
    }

    fn show_status(&mut self, statuses: &[ToolReport]) -> Result<()> {
        (**self).show_status(statuses)
    }

    fn quit_requested(&mut self) -> bool {
        (**self).quit_requested()
    }

    fn session_ended(&mut self, summary: &LoopSummary) -> Result<()> {
        (**self).session_ended(summary)
    }
}

/// Terminal sink.
///
/// Prints the status block whenever it changes and, when configured, keeps a
/// JPEG of the latest annotated frame on disk for an image viewer to watch.
pub struct ConsoleSink<W: Write> {
    out: W,
    snapshot_path: Option<PathBuf>,
    last_status: Option<Vec<ToolReport>>,
}

impl ConsoleSink<std::io::Stdout> {
    pub fn stdout(snapshot_path: Option<PathBuf>) -> Self {
        Self::new(std::io::stdout(), snapshot_path)
    }
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(out: W, snapshot_path: Option<PathBuf>) -> Self {
        Self {
            out,
            snapshot_path,
            last_status: None,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> PresentationSink for ConsoleSink<W> {
    fn show_frame(&mut self, frame: &Frame, captions: &[String]) -> Result<()> {
        if !captions.is_empty() {
            log::debug!("frame {}: {}", frame.sequence, captions.join(", "));
        }
        if let Some(path) = &self.snapshot_path {
            // write-then-rename so viewers never see a half-written file
            let tmp = path.with_extension("tmp.jpg");
            frame.save_jpeg(&tmp)?;
            std::fs::rename(&tmp, path)
                .with_context(|| format!("replace snapshot {}", path.display()))?;
        }
        Ok(())
    }

    fn show_status(&mut self, statuses: &[ToolReport]) -> Result<()> {
        if self.last_status.as_deref() == Some(statuses) {
            return Ok(());
        }
        writeln!(self.out, "{MONITOR_TITLE}")?;
        for line in status_lines(statuses) {
            writeln!(self.out, "  {line}")?;
        }
        self.out.flush()?;
        self.last_status = Some(statuses.to_vec());
        Ok(())
    }

    fn session_ended(&mut self, summary: &LoopSummary) -> Result<()> {
        writeln!(
            self.out,
            "Detection stopped ({}, {} frames).",
            summary.exit.describe(),
            summary.frames
        )?;
        self.out.flush()?;
        Ok(())
    }
}
