//! Shadowbox tool tracking.
//!
//! Watches a tool shadowbox through a camera, runs an object detector on every
//! frame and reports, per tool, whether it sits in its slot.
//!
//! # Module Structure
//!
//! - `tools`: tool table, per-frame status reconciliation, label classes
//! - `frame`: RGB frame container, box annotation, JPEG encoding
//! - `ingest`: frame sources (synthetic, image directory, V4L2)
//! - `detect`: detector backends (stub, tract/ONNX) and post-processing
//! - `monitor`: the detection loop and its cancel token
//! - `sink`: presentation sinks (terminal)
//! - `dashboard`: web dashboard with start/stop control
//! - `capture`: snapshot capture for dataset building
//! - `train`: external training driver
//! - `config`: TOML + environment configuration
//! - `ui`: CLI stage reporting

pub mod capture;
pub mod config;
pub mod dashboard;
pub mod detect;
pub mod frame;
pub mod ingest;
pub mod monitor;
pub mod sink;
pub mod tools;
pub mod train;
pub mod ui;

pub use config::MonitorConfig;
pub use detect::{BoundingBox, DetectParams, Detection, DetectorBackend, StubBackend};
pub use frame::Frame;
pub use ingest::{open_source, FrameSource};
pub use monitor::{run_detection_loop, CancelToken, LoopExit, LoopSummary, MonitorSettings};
pub use sink::{ConsoleSink, PresentationSink};
pub use tools::{
    reconcile, DetectionSet, LabelClass, LabelSets, ToolEntry, ToolMapping, ToolReport,
    ToolStatus, ToolTable,
};
