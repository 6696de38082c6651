//! Dashboard detection sessions.
//!
//! The dashboard owns one detector for the whole process and runs at most one
//! detection loop at a time on a worker thread. The HTTP side only starts and
//! stops sessions and reads the shared snapshot.

use anyhow::{anyhow, Result};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;

use crate::detect::DetectorBackend;
use crate::frame::Frame;
use crate::ingest::FrameSource;
use crate::monitor::{run_detection_loop, CancelToken, LoopExit, LoopSummary, MonitorSettings};
use crate::sink::PresentationSink;
use crate::tools::{ToolReport, ToolTable};

pub const STOPPED_MESSAGE: &str = "Detection stopped.";

/// Builds a fresh frame source for each session, on the worker thread.
pub type SourceFactory = Arc<dyn Fn() -> Result<Box<dyn FrameSource>> + Send + Sync>;

/// Latest results of the running (or last) session.
#[derive(Debug, Default)]
pub struct DashboardState {
    pub running: bool,
    pub frames: u64,
    pub statuses: Vec<ToolReport>,
    pub captions: Vec<String>,
    pub latest_jpeg: Option<Vec<u8>>,
    pub message: Option<String>,
    pub last_exit: Option<LoopExit>,
}

pub type SharedState = Arc<Mutex<DashboardState>>;

fn lock_state(state: &SharedState) -> Result<MutexGuard<'_, DashboardState>> {
    state
        .lock()
        .map_err(|_| anyhow!("dashboard state lock poisoned"))
}

#[derive(Clone, Debug, Serialize)]
pub struct StatusEntry {
    pub tool: String,
    pub status: crate::tools::ToolStatus,
    pub display: String,
}

/// JSON body of `GET /status`.
#[derive(Clone, Debug, Serialize)]
pub struct DashboardSnapshot {
    pub running: bool,
    pub frames: u64,
    pub statuses: Vec<StatusEntry>,
    pub detections: Vec<String>,
    pub message: Option<String>,
    pub has_frame: bool,
}

/// Sink that publishes loop output into the shared dashboard state.
pub struct DashboardSink {
    state: SharedState,
}

impl DashboardSink {
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }
}

impl PresentationSink for DashboardSink {
    fn show_frame(&mut self, frame: &Frame, captions: &[String]) -> Result<()> {
        let jpeg = frame.encode_jpeg()?;
        let mut state = lock_state(&self.state)?;
        state.latest_jpeg = Some(jpeg);
        state.captions = captions.to_vec();
        Ok(())
    }

    fn show_status(&mut self, statuses: &[ToolReport]) -> Result<()> {
        let mut state = lock_state(&self.state)?;
        state.statuses = statuses.to_vec();
        state.frames += 1;
        Ok(())
    }

    fn session_ended(&mut self, summary: &LoopSummary) -> Result<()> {
        let mut state = lock_state(&self.state)?;
        state.running = false;
        state.latest_jpeg = None;
        state.captions.clear();
        state.statuses.clear();
        state.last_exit = Some(summary.exit);
        state.message = Some(if summary.exit.is_failure() {
            format!("{} ({})", STOPPED_MESSAGE, summary.exit.describe())
        } else {
            STOPPED_MESSAGE.to_string()
        });
        Ok(())
    }
}

struct ActiveSession {
    cancel: CancelToken,
    join: JoinHandle<()>,
}

pub struct SessionController {
    state: SharedState,
    detector: Arc<Mutex<Box<dyn DetectorBackend>>>,
    tools: Arc<ToolTable>,
    settings: MonitorSettings,
    source_factory: SourceFactory,
    active: Mutex<Option<ActiveSession>>,
}

impl SessionController {
    pub fn new(
        detector: Box<dyn DetectorBackend>,
        tools: ToolTable,
        settings: MonitorSettings,
        source_factory: SourceFactory,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(DashboardState::default())),
            detector: Arc::new(Mutex::new(detector)),
            tools: Arc::new(tools),
            settings,
            source_factory,
            active: Mutex::new(None),
        }
    }

    fn lock_active(&self) -> Result<MutexGuard<'_, Option<ActiveSession>>> {
        self.active
            .lock()
            .map_err(|_| anyhow!("session lock poisoned"))
    }

    /// Start a session. Returns `false` when one is already running.
    ///
    /// A session that was asked to stop but has not exited yet is joined
    /// first, so Start right after Stop always begins a new run.
    pub fn start(&self) -> Result<bool> {
        let mut active = self.lock_active()?;
        if let Some(session) = active.take() {
            if !session.join.is_finished() && !session.cancel.is_cancelled() {
                *active = Some(session);
                return Ok(false);
            }
            session
                .join
                .join()
                .map_err(|_| anyhow!("detection session thread panicked"))?;
        }

        {
            let mut state = lock_state(&self.state)?;
            state.running = true;
            state.frames = 0;
            state.statuses.clear();
            state.captions.clear();
            state.latest_jpeg = None;
            state.message = None;
            state.last_exit = None;
        }

        let cancel = CancelToken::new();
        let worker_cancel = cancel.clone();
        let state = self.state.clone();
        let detector = self.detector.clone();
        let tools = self.tools.clone();
        let settings = self.settings.clone();
        let factory = self.source_factory.clone();
        let join = std::thread::Builder::new()
            .name("detection-session".to_string())
            .spawn(move || {
                if let Err(err) =
                    run_worker(&state, &detector, &tools, &settings, &factory, &worker_cancel)
                {
                    log::error!("detection session failed: {:#}", err);
                    if let Ok(mut state) = state.lock() {
                        state.running = false;
                        state.latest_jpeg = None;
                        state.statuses.clear();
                        state.last_exit = Some(LoopExit::Error);
                        state.message = Some(format!("{} ({:#})", STOPPED_MESSAGE, err));
                    }
                }
            })?;
        *active = Some(ActiveSession { cancel, join });
        log::info!("detection session started");
        Ok(true)
    }

    /// Request the running session to stop. Returns `false` when none runs.
    pub fn stop(&self) -> Result<bool> {
        let active = self.lock_active()?;
        match active.as_ref() {
            Some(session) if !session.join.is_finished() => {
                session.cancel.cancel();
                log::info!("detection session stop requested");
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Block until the current session (if any) has exited.
    pub fn wait(&self) -> Result<()> {
        let session = self.lock_active()?.take();
        if let Some(session) = session {
            session
                .join
                .join()
                .map_err(|_| anyhow!("detection session thread panicked"))?;
        }
        Ok(())
    }

    pub fn snapshot(&self) -> Result<DashboardSnapshot> {
        let state = lock_state(&self.state)?;
        Ok(DashboardSnapshot {
            running: state.running,
            frames: state.frames,
            statuses: state
                .statuses
                .iter()
                .map(|report| StatusEntry {
                    tool: report.tool.clone(),
                    status: report.status,
                    display: report.display_line(),
                })
                .collect(),
            detections: state.captions.clone(),
            message: state.message.clone(),
            has_frame: state.latest_jpeg.is_some(),
        })
    }

    pub fn latest_jpeg(&self) -> Result<Option<Vec<u8>>> {
        Ok(lock_state(&self.state)?.latest_jpeg.clone())
    }
}

fn run_worker(
    state: &SharedState,
    detector: &Mutex<Box<dyn DetectorBackend>>,
    tools: &ToolTable,
    settings: &MonitorSettings,
    factory: &SourceFactory,
    cancel: &CancelToken,
) -> Result<()> {
    let mut sink = DashboardSink::new(state.clone());
    let mut source = match factory() {
        Ok(source) => source,
        Err(err) => {
            log::warn!("failed to create camera source: {:#}", err);
            sink.session_ended(&LoopSummary {
                exit: LoopExit::SourceUnavailable,
                frames: 0,
            })?;
            return Ok(());
        }
    };
    let mut detector = detector
        .lock()
        .map_err(|_| anyhow!("detector lock poisoned"))?;
    run_detection_loop(
        &mut source,
        &mut **detector,
        &mut sink,
        tools,
        settings,
        cancel,
    )?;
    Ok(())
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if let Ok(mut active) = self.active.lock() {
            if let Some(session) = active.take() {
                session.cancel.cancel();
                let _ = session.join.join();
            }
        }
    }
}
