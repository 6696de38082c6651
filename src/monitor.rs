//! Live detection loop.
//!
//! One synchronous loop per session:
//! 1. Check for cancellation (token or sink quit request)
//! 2. Read a frame from the source
//! 3. Run the detector with the session thresholds
//! 4. Reconcile detected labels into per-tool status
//! 5. Annotate the frame and hand both to the sink
//! 6. Sleep the frame delay
//!
//! The source is released on every exit path, including errors.

use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::detect::{DetectParams, DetectorBackend};
use crate::frame::{annotate, caption};
use crate::ingest::{FrameSource, SourceGuard};
use crate::sink::PresentationSink;
use crate::tools::{reconcile, DetectionSet, ToolTable};

/// Delay used by the terminal viewer.
pub const VIEWER_FRAME_DELAY: Duration = Duration::from_millis(500);
/// Delay used by the dashboard worker.
pub const DASHBOARD_FRAME_DELAY: Duration = Duration::from_millis(250);

/// Cooperative stop flag shared between the loop and its controller.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Debug)]
pub struct MonitorSettings {
    pub detect: DetectParams,
    pub frame_delay: Duration,
    /// Stop normally after this many processed frames.
    pub max_frames: Option<u64>,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            detect: DetectParams::default(),
            frame_delay: VIEWER_FRAME_DELAY,
            max_frames: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopExit {
    /// Stop requested through the cancel token or the sink.
    Cancelled,
    /// The configured frame limit was reached.
    FrameLimit,
    /// A frame read failed; the session is over.
    FrameReadFailed,
    /// The source could not be opened; no frame was read.
    SourceUnavailable,
    /// The detector or sink returned an error.
    Error,
}

impl LoopExit {
    /// Whether the session ended because something went wrong.
    pub fn is_failure(self) -> bool {
        !matches!(self, LoopExit::Cancelled | LoopExit::FrameLimit)
    }

    pub fn describe(self) -> &'static str {
        match self {
            LoopExit::Cancelled => "stopped by user",
            LoopExit::FrameLimit => "frame limit reached",
            LoopExit::FrameReadFailed => "failed to read from camera",
            LoopExit::SourceUnavailable => "camera unavailable",
            LoopExit::Error => "detection error",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoopSummary {
    pub exit: LoopExit,
    pub frames: u64,
}

/// Run the detection loop until cancellation, frame limit or read failure.
///
/// Detector and sink errors end the loop with `Err` after the source has been
/// released; `session_ended` is still called on the sink.
pub fn run_detection_loop<S, D, P>(
    source: &mut S,
    detector: &mut D,
    sink: &mut P,
    tools: &ToolTable,
    settings: &MonitorSettings,
    cancel: &CancelToken,
) -> Result<LoopSummary>
where
    S: FrameSource + ?Sized,
    D: DetectorBackend + ?Sized,
    P: PresentationSink + ?Sized,
{
    let mut frames = 0u64;
    let outcome = run_session(
        source,
        detector,
        sink,
        tools,
        settings,
        cancel,
        &mut frames,
    );
    let summary = match &outcome {
        Ok(exit) => LoopSummary {
            exit: *exit,
            frames,
        },
        Err(_) => LoopSummary {
            exit: LoopExit::Error,
            frames,
        },
    };
    if let Err(err) = sink.session_ended(&summary) {
        log::warn!("sink failed to report session end: {:#}", err);
    }
    let exit = outcome?;
    log::info!(
        "detection loop finished: {} after {} frames",
        exit.describe(),
        frames
    );
    Ok(summary)
}

fn run_session<S, D, P>(
    source: &mut S,
    detector: &mut D,
    sink: &mut P,
    tools: &ToolTable,
    settings: &MonitorSettings,
    cancel: &CancelToken,
    frames: &mut u64,
) -> Result<LoopExit>
where
    S: FrameSource + ?Sized,
    D: DetectorBackend + ?Sized,
    P: PresentationSink + ?Sized,
{
    if let Err(err) = source.open() {
        log::warn!(
            "failed to open camera {}: {:#}. check your device/camera settings",
            source.describe(),
            err
        );
        source.release();
        return Ok(LoopExit::SourceUnavailable);
    }
    let mut guard = SourceGuard::new(source);

    loop {
        if cancel.is_cancelled() || sink.quit_requested() {
            return Ok(LoopExit::Cancelled);
        }
        if settings.max_frames.is_some_and(|max| *frames >= max) {
            return Ok(LoopExit::FrameLimit);
        }

        let frame = match guard.source().read() {
            Ok(frame) => frame,
            Err(err) => {
                log::warn!("failed to read from camera: {:#}", err);
                return Ok(LoopExit::FrameReadFailed);
            }
        };

        let detections = detector
            .detect(&frame, &settings.detect)
            .with_context(|| format!("detection failed on frame {}", frame.sequence))?;
        let detected = DetectionSet::from_detections(&detections);
        let statuses = reconcile(&detected, &tools.mapping);
        log::debug!(
            "frame {}: {} detections, labels [{}]",
            frame.sequence,
            detections.len(),
            detected.iter().collect::<Vec<_>>().join(", ")
        );

        let annotated = annotate(&frame, &detections, &tools.labels);
        let captions: Vec<String> = detections.iter().map(caption).collect();
        sink.show_frame(&annotated, &captions)?;
        sink.show_status(&statuses)?;
        *frames += 1;

        if !settings.frame_delay.is_zero() {
            std::thread::sleep(settings.frame_delay);
        }
    }
}
