use anyhow::{anyhow, Result};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use shadowbox::{
    run_detection_loop, BoundingBox, CancelToken, DetectParams, Detection, DetectorBackend,
    Frame, FrameSource, LoopExit, LoopSummary, MonitorSettings, PresentationSink, StubBackend,
    ToolMapping, ToolReport, ToolStatus, ToolTable,
};

#[derive(Default)]
struct SourceLog {
    opened: u32,
    reads: u32,
    released: u32,
}

struct ScriptedSource {
    frames_before_failure: Option<u32>,
    fail_open: bool,
    log: Arc<Mutex<SourceLog>>,
}

impl ScriptedSource {
    fn new(log: Arc<Mutex<SourceLog>>) -> Self {
        Self {
            frames_before_failure: None,
            fail_open: false,
            log,
        }
    }
}

impl FrameSource for ScriptedSource {
    fn describe(&self) -> String {
        "scripted".to_string()
    }

    fn open(&mut self) -> Result<()> {
        if self.fail_open {
            return Err(anyhow!("no such device"));
        }
        self.log.lock().unwrap().opened += 1;
        Ok(())
    }

    fn read(&mut self) -> Result<Frame> {
        let mut log = self.log.lock().unwrap();
        if self
            .frames_before_failure
            .is_some_and(|limit| log.reads >= limit)
        {
            return Err(anyhow!("camera unplugged"));
        }
        log.reads += 1;
        Frame::new(vec![0u8; 16 * 8 * 3], 16, 8, log.reads as u64)
    }

    fn release(&mut self) {
        self.log.lock().unwrap().released += 1;
    }
}

#[derive(Default)]
struct RecordingSink {
    frames: Vec<Vec<String>>,
    statuses: Vec<Vec<ToolReport>>,
    ended: Option<LoopSummary>,
    quit_after: Option<usize>,
    cancel_after: Option<(usize, CancelToken)>,
}

impl PresentationSink for RecordingSink {
    fn show_frame(&mut self, _frame: &Frame, captions: &[String]) -> Result<()> {
        self.frames.push(captions.to_vec());
        Ok(())
    }

    fn show_status(&mut self, statuses: &[ToolReport]) -> Result<()> {
        self.statuses.push(statuses.to_vec());
        if let Some((after, token)) = &self.cancel_after {
            if self.statuses.len() >= *after {
                token.cancel();
            }
        }
        Ok(())
    }

    fn quit_requested(&mut self) -> bool {
        self.quit_after
            .is_some_and(|after| self.statuses.len() >= after)
    }

    fn session_ended(&mut self, summary: &LoopSummary) -> Result<()> {
        self.ended = Some(*summary);
        Ok(())
    }
}

struct FailingDetector;

impl DetectorBackend for FailingDetector {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn class_names(&self) -> &[String] {
        &[]
    }

    fn detect(&mut self, _frame: &Frame, _params: &DetectParams) -> Result<Vec<Detection>> {
        Err(anyhow!("inference exploded"))
    }
}

struct FixedDetector(Vec<Detection>);

impl DetectorBackend for FixedDetector {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn class_names(&self) -> &[String] {
        &[]
    }

    fn detect(&mut self, _frame: &Frame, params: &DetectParams) -> Result<Vec<Detection>> {
        Ok(shadowbox::detect::postprocess::apply(self.0.clone(), params))
    }
}

fn settings(max_frames: Option<u64>) -> MonitorSettings {
    MonitorSettings {
        detect: DetectParams::default(),
        frame_delay: Duration::ZERO,
        max_frames,
    }
}

fn stub_detector(script: &[&[&str]]) -> StubBackend {
    let mapping = ToolMapping::shadowbox_default();
    StubBackend::new(
        script
            .iter()
            .map(|frame| frame.iter().map(|label| label.to_string()).collect())
            .collect(),
        mapping.class_names(),
    )
}

fn statuses_of(reports: &[ToolReport]) -> Vec<(&str, ToolStatus)> {
    reports.iter().map(|r| (r.tool.as_str(), r.status)).collect()
}

#[test]
fn reports_per_frame_status_until_frame_limit() -> Result<()> {
    let log = Arc::new(Mutex::new(SourceLog::default()));
    let mut source = ScriptedSource::new(log.clone());
    let mut detector = stub_detector(&[&["battery_in", "gpu_out"], &[]]);
    let mut sink = RecordingSink::default();
    let tools = ToolTable::new(ToolMapping::shadowbox_default());

    let summary = run_detection_loop(
        &mut source,
        &mut detector,
        &mut sink,
        &tools,
        &settings(Some(2)),
        &CancelToken::new(),
    )?;

    assert_eq!(summary.exit, LoopExit::FrameLimit);
    assert_eq!(summary.frames, 2);
    assert_eq!(sink.ended, Some(summary));
    assert_eq!(
        statuses_of(&sink.statuses[0]),
        vec![
            ("cable_a", ToolStatus::OutNotDetected),
            ("battery", ToolStatus::In),
            ("cable_b", ToolStatus::OutNotDetected),
            ("gpu", ToolStatus::Out),
        ]
    );
    assert!(sink.statuses[1]
        .iter()
        .all(|r| r.status == ToolStatus::OutNotDetected));
    assert_eq!(sink.frames[0], vec!["battery_in (0.90)", "gpu_out (0.90)"]);
    assert!(sink.frames[1].is_empty());

    let log = log.lock().unwrap();
    assert_eq!(log.opened, 1);
    assert_eq!(log.released, 1);
    Ok(())
}

#[test]
fn cancel_stops_before_next_read() -> Result<()> {
    let log = Arc::new(Mutex::new(SourceLog::default()));
    let mut source = ScriptedSource::new(log.clone());
    let mut detector = stub_detector(&[&["cable_a_in"]]);
    let cancel = CancelToken::new();
    let mut sink = RecordingSink {
        cancel_after: Some((3, cancel.clone())),
        ..Default::default()
    };
    let tools = ToolTable::new(ToolMapping::shadowbox_default());

    let summary = run_detection_loop(
        &mut source,
        &mut detector,
        &mut sink,
        &tools,
        &settings(None),
        &cancel,
    )?;

    assert_eq!(summary.exit, LoopExit::Cancelled);
    assert!(!summary.exit.is_failure());
    assert_eq!(summary.frames, 3);
    let log = log.lock().unwrap();
    assert_eq!(log.reads, 3);
    assert_eq!(log.released, 1);
    Ok(())
}

#[test]
fn sink_quit_request_ends_the_loop() -> Result<()> {
    let log = Arc::new(Mutex::new(SourceLog::default()));
    let mut source = ScriptedSource::new(log.clone());
    let mut detector = stub_detector(&[&[]]);
    let mut sink = RecordingSink {
        quit_after: Some(1),
        ..Default::default()
    };
    let tools = ToolTable::new(ToolMapping::shadowbox_default());

    let summary = run_detection_loop(
        &mut source,
        &mut detector,
        &mut sink,
        &tools,
        &settings(None),
        &CancelToken::new(),
    )?;

    assert_eq!(summary.exit, LoopExit::Cancelled);
    assert_eq!(summary.frames, 1);
    assert_eq!(log.lock().unwrap().released, 1);
    Ok(())
}

#[test]
fn read_failure_ends_the_session_and_releases() -> Result<()> {
    let log = Arc::new(Mutex::new(SourceLog::default()));
    let mut source = ScriptedSource::new(log.clone());
    source.frames_before_failure = Some(2);
    let mut detector = stub_detector(&[&["gpu_in"]]);
    let mut sink = RecordingSink::default();
    let tools = ToolTable::new(ToolMapping::shadowbox_default());

    let summary = run_detection_loop(
        &mut source,
        &mut detector,
        &mut sink,
        &tools,
        &settings(None),
        &CancelToken::new(),
    )?;

    assert_eq!(summary.exit, LoopExit::FrameReadFailed);
    assert!(summary.exit.is_failure());
    assert_eq!(summary.frames, 2);
    assert_eq!(sink.statuses.len(), 2);
    assert_eq!(log.lock().unwrap().released, 1);
    Ok(())
}

#[test]
fn unavailable_camera_never_reads() -> Result<()> {
    let log = Arc::new(Mutex::new(SourceLog::default()));
    let mut source = ScriptedSource::new(log.clone());
    source.fail_open = true;
    let mut detector = stub_detector(&[&["gpu_in"]]);
    let mut sink = RecordingSink::default();
    let tools = ToolTable::new(ToolMapping::shadowbox_default());

    let summary = run_detection_loop(
        &mut source,
        &mut detector,
        &mut sink,
        &tools,
        &settings(None),
        &CancelToken::new(),
    )?;

    assert_eq!(summary.exit, LoopExit::SourceUnavailable);
    assert_eq!(summary.frames, 0);
    assert!(sink.statuses.is_empty());
    assert_eq!(sink.ended, Some(summary));
    let log = log.lock().unwrap();
    assert_eq!(log.reads, 0);
    assert!(log.released >= 1);
    Ok(())
}

#[test]
fn detector_error_propagates_after_release() {
    let log = Arc::new(Mutex::new(SourceLog::default()));
    let mut source = ScriptedSource::new(log.clone());
    let mut sink = RecordingSink::default();
    let tools = ToolTable::new(ToolMapping::shadowbox_default());

    let result = run_detection_loop(
        &mut source,
        &mut FailingDetector,
        &mut sink,
        &tools,
        &settings(None),
        &CancelToken::new(),
    );

    let err = result.expect_err("detector failure must surface");
    assert!(format!("{err:#}").contains("inference exploded"));
    assert_eq!(
        sink.ended,
        Some(LoopSummary {
            exit: LoopExit::Error,
            frames: 0
        })
    );
    assert_eq!(log.lock().unwrap().released, 1);
}

#[test]
fn overlap_suppression_is_optional() -> Result<()> {
    let overlapping = vec![
        Detection::new("battery_in", BoundingBox::new(0.0, 0.0, 10.0, 10.0), 0.9),
        Detection::new("battery_in", BoundingBox::new(1.0, 1.0, 10.0, 10.0), 0.8),
        Detection::new("gpu_out", BoundingBox::new(0.0, 0.0, 10.0, 10.0), 0.7),
    ];
    let tools = ToolTable::new(ToolMapping::shadowbox_default());

    let run = |overlap: Option<f32>| -> Result<usize> {
        let log = Arc::new(Mutex::new(SourceLog::default()));
        let mut source = ScriptedSource::new(log);
        let mut sink = RecordingSink::default();
        let mut settings = settings(Some(1));
        settings.detect.overlap = overlap;
        run_detection_loop(
            &mut source,
            &mut FixedDetector(overlapping.clone()),
            &mut sink,
            &tools,
            &settings,
            &CancelToken::new(),
        )?;
        Ok(sink.frames[0].len())
    };

    assert_eq!(run(None)?, 3);
    assert_eq!(run(Some(0.5))?, 2);
    Ok(())
}

#[test]
fn synthetic_source_runs_through_open_source() -> Result<()> {
    let cfg = shadowbox::MonitorConfig::from_toml_str(
        r#"
        [camera]
        width = 32
        height = 24
        "#,
    )?;
    let mut source = shadowbox::open_source("stub://bench?frames=3", &cfg.camera)?;
    let mut detector = StubBackend::walkthrough(&cfg.tools);
    let mut sink = RecordingSink::default();
    let tools = ToolTable::new(cfg.tools.clone());

    let summary = run_detection_loop(
        &mut source,
        &mut detector,
        &mut sink,
        &tools,
        &settings(None),
        &CancelToken::new(),
    )?;

    assert_eq!(summary.exit, LoopExit::FrameReadFailed);
    assert_eq!(summary.frames, 3);
    assert!(sink.statuses[0].iter().all(|r| r.status == ToolStatus::In));
    assert_eq!(sink.statuses[1][0].status, ToolStatus::Out);
    Ok(())
}
