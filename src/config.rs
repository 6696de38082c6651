use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::tools::{ToolEntry, ToolMapping};

const DEFAULT_MODEL_PATH: &str = "runs/detect/train/weights/best.onnx";
const DEFAULT_INPUT_SIZE: u32 = 640;
const DEFAULT_CAMERA_INDEX: u32 = 1;
const DEFAULT_CAMERA_WIDTH: u32 = 640;
const DEFAULT_CAMERA_HEIGHT: u32 = 480;
const DEFAULT_CAMERA_FPS: u32 = 10;
const DEFAULT_CONFIDENCE: f32 = 0.50;
const DEFAULT_OVERLAP: f32 = 0.7;
const MAX_FRAME_DELAY_MS: u64 = 10_000;
const DEFAULT_DASHBOARD_ADDR: &str = "127.0.0.1:8501";
const DEFAULT_CAPTURE_DIR: &str = "shadowbox_images";
const DEFAULT_CAPTURE_COUNT: u32 = 5;
const DEFAULT_CAPTURE_INTERVAL_MS: u64 = 2_000;

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct MonitorConfigFile {
    model: Option<ModelConfigFile>,
    camera: Option<CameraConfigFile>,
    detection: Option<DetectionConfigFile>,
    dashboard: Option<DashboardConfigFile>,
    capture: Option<CaptureConfigFile>,
    tools: Option<Vec<ToolConfigFile>>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ModelConfigFile {
    backend: Option<String>,
    path: Option<PathBuf>,
    input_size: Option<u32>,
    class_names: Option<Vec<String>>,
    stub_script: Option<Vec<Vec<String>>>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct CameraConfigFile {
    index: Option<u32>,
    source: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    target_fps: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DetectionConfigFile {
    confidence: Option<f32>,
    overlap: Option<f32>,
    frame_delay_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DashboardConfigFile {
    addr: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct CaptureConfigFile {
    dir: Option<PathBuf>,
    count: Option<u32>,
    interval_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ToolConfigFile {
    name: String,
    in_label: Option<String>,
    out_label: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    Stub,
    Tract,
}

impl BackendKind {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "stub" => Ok(BackendKind::Stub),
            "tract" | "onnx" => Ok(BackendKind::Tract),
            other => Err(anyhow!("unknown detector backend '{}'", other)),
        }
    }

    /// `tract` when compiled in, otherwise `stub`.
    pub fn default_for_build() -> Self {
        if cfg!(feature = "backend-tract") {
            BackendKind::Tract
        } else {
            BackendKind::Stub
        }
    }
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub model: ModelSettings,
    pub camera: CameraSettings,
    pub detection: DetectionSettings,
    pub dashboard_addr: String,
    pub capture: CaptureSettings,
    pub tools: ToolMapping,
}

#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub backend: BackendKind,
    pub path: PathBuf,
    pub input_size: u32,
    /// Model class list; defaults to the tool table's labels.
    pub class_names: Vec<String>,
    /// Per-frame label lists replayed by the stub backend.
    pub stub_script: Option<Vec<Vec<String>>>,
}

#[derive(Debug, Clone)]
pub struct CameraSettings {
    pub index: u32,
    /// Explicit source (`stub://...`, an image directory, or a device path).
    pub source: Option<String>,
    pub width: u32,
    pub height: u32,
    pub target_fps: u32,
}

impl CameraSettings {
    /// Source string handed to `ingest::open_source`.
    pub fn source_spec(&self) -> String {
        self.source
            .clone()
            .unwrap_or_else(|| format!("/dev/video{}", self.index))
    }
}

#[derive(Debug, Clone)]
pub struct DetectionSettings {
    pub confidence: f32,
    pub overlap: f32,
    /// Per-iteration delay; binaries supply their own default when unset.
    pub frame_delay: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub dir: PathBuf,
    pub count: u32,
    pub interval: Duration,
}

impl MonitorConfig {
    /// Load defaults, then `SHADOWBOX_CONFIG` (TOML) if set, then env overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("SHADOWBOX_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse and validate a TOML document without consulting the environment.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let file: MonitorConfigFile =
            toml::from_str(raw).map_err(|e| anyhow!("invalid config: {}", e))?;
        let mut cfg = Self::from_file(file)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: MonitorConfigFile) -> Result<Self> {
        let tools = match file.tools {
            Some(entries) => ToolMapping::new(
                entries
                    .into_iter()
                    .map(|tool| {
                        let in_label = tool
                            .in_label
                            .unwrap_or_else(|| format!("{}_in", tool.name));
                        let out_label = tool
                            .out_label
                            .unwrap_or_else(|| format!("{}_out", tool.name));
                        ToolEntry::new(tool.name, in_label, out_label)
                    })
                    .collect(),
            )?,
            None => ToolMapping::shadowbox_default(),
        };

        let model_file = file.model.unwrap_or_default();
        let backend = match model_file.backend.as_deref() {
            Some(value) => BackendKind::parse(value)?,
            None => BackendKind::default_for_build(),
        };
        let model = ModelSettings {
            backend,
            path: model_file
                .path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH)),
            input_size: model_file.input_size.unwrap_or(DEFAULT_INPUT_SIZE),
            class_names: model_file
                .class_names
                .unwrap_or_else(|| tools.class_names()),
            stub_script: model_file.stub_script,
        };

        let camera_file = file.camera.unwrap_or_default();
        let camera = CameraSettings {
            index: camera_file.index.unwrap_or(DEFAULT_CAMERA_INDEX),
            source: camera_file.source,
            width: camera_file.width.unwrap_or(DEFAULT_CAMERA_WIDTH),
            height: camera_file.height.unwrap_or(DEFAULT_CAMERA_HEIGHT),
            target_fps: camera_file.target_fps.unwrap_or(DEFAULT_CAMERA_FPS),
        };

        let detection_file = file.detection.unwrap_or_default();
        let detection = DetectionSettings {
            confidence: detection_file.confidence.unwrap_or(DEFAULT_CONFIDENCE),
            overlap: detection_file.overlap.unwrap_or(DEFAULT_OVERLAP),
            frame_delay: detection_file.frame_delay_ms.map(Duration::from_millis),
        };

        let dashboard_addr = file
            .dashboard
            .and_then(|dashboard| dashboard.addr)
            .unwrap_or_else(|| DEFAULT_DASHBOARD_ADDR.to_string());

        let capture_file = file.capture.unwrap_or_default();
        let capture = CaptureSettings {
            dir: capture_file
                .dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CAPTURE_DIR)),
            count: capture_file.count.unwrap_or(DEFAULT_CAPTURE_COUNT),
            interval: Duration::from_millis(
                capture_file
                    .interval_ms
                    .unwrap_or(DEFAULT_CAPTURE_INTERVAL_MS),
            ),
        };

        Ok(Self {
            model,
            camera,
            detection,
            dashboard_addr,
            capture,
            tools,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("SHADOWBOX_MODEL_PATH") {
            if !path.trim().is_empty() {
                self.model.path = PathBuf::from(path);
            }
        }
        if let Ok(backend) = std::env::var("SHADOWBOX_BACKEND") {
            if !backend.trim().is_empty() {
                self.model.backend = BackendKind::parse(&backend)?;
            }
        }
        if let Ok(index) = std::env::var("SHADOWBOX_CAMERA_INDEX") {
            self.camera.index = index
                .trim()
                .parse()
                .map_err(|_| anyhow!("SHADOWBOX_CAMERA_INDEX must be a non-negative integer"))?;
        }
        if let Ok(source) = std::env::var("SHADOWBOX_CAMERA_SOURCE") {
            if !source.trim().is_empty() {
                self.camera.source = Some(source);
            }
        }
        if let Ok(confidence) = std::env::var("SHADOWBOX_CONFIDENCE") {
            self.detection.confidence = confidence
                .trim()
                .parse()
                .map_err(|_| anyhow!("SHADOWBOX_CONFIDENCE must be a number"))?;
        }
        if let Ok(addr) = std::env::var("SHADOWBOX_DASHBOARD_ADDR") {
            if !addr.trim().is_empty() {
                self.dashboard_addr = addr;
            }
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if !(self.detection.confidence > 0.0 && self.detection.confidence <= 1.0) {
            return Err(anyhow!(
                "confidence threshold must be in (0, 1], got {}",
                self.detection.confidence
            ));
        }
        if !(0.0..=1.0).contains(&self.detection.overlap) {
            return Err(anyhow!(
                "overlap threshold must be in [0, 1], got {}",
                self.detection.overlap
            ));
        }
        if let Some(delay) = self.detection.frame_delay {
            if delay.as_millis() > MAX_FRAME_DELAY_MS as u128 {
                return Err(anyhow!(
                    "frame_delay_ms must be at most {}",
                    MAX_FRAME_DELAY_MS
                ));
            }
        }
        if self.model.input_size == 0 || self.model.input_size % 32 != 0 {
            return Err(anyhow!(
                "model input_size must be a positive multiple of 32, got {}",
                self.model.input_size
            ));
        }
        if self.model.class_names.is_empty() {
            return Err(anyhow!("model class_names must not be empty"));
        }
        for entry in self.tools.entries() {
            for label in [&entry.in_label, &entry.out_label] {
                if !self.model.class_names.contains(label) {
                    log::warn!(
                        "tool '{}' label '{}' is not in the model class list",
                        entry.name,
                        label
                    );
                }
            }
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!("camera width and height must be non-zero"));
        }
        if self.capture.count == 0 {
            return Err(anyhow!("capture count must be at least 1"));
        }
        Ok(())
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        let tools = ToolMapping::shadowbox_default();
        Self {
            model: ModelSettings {
                backend: BackendKind::default_for_build(),
                path: PathBuf::from(DEFAULT_MODEL_PATH),
                input_size: DEFAULT_INPUT_SIZE,
                class_names: tools.class_names(),
                stub_script: None,
            },
            camera: CameraSettings {
                index: DEFAULT_CAMERA_INDEX,
                source: None,
                width: DEFAULT_CAMERA_WIDTH,
                height: DEFAULT_CAMERA_HEIGHT,
                target_fps: DEFAULT_CAMERA_FPS,
            },
            detection: DetectionSettings {
                confidence: DEFAULT_CONFIDENCE,
                overlap: DEFAULT_OVERLAP,
                frame_delay: None,
            },
            dashboard_addr: DEFAULT_DASHBOARD_ADDR.to_string(),
            capture: CaptureSettings {
                dir: PathBuf::from(DEFAULT_CAPTURE_DIR),
                count: DEFAULT_CAPTURE_COUNT,
                interval: Duration::from_millis(DEFAULT_CAPTURE_INTERVAL_MS),
            },
            tools,
        }
    }
}

fn read_config_file(path: &Path) -> Result<MonitorConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() -> Result<()> {
        let cfg = MonitorConfig::from_toml_str("")?;
        assert_eq!(cfg.camera.index, 1);
        assert_eq!(cfg.camera.source_spec(), "/dev/video1");
        assert_eq!(cfg.detection.confidence, 0.5);
        assert_eq!(cfg.tools, ToolMapping::shadowbox_default());
        assert_eq!(cfg.model.class_names, cfg.tools.class_names());
        assert_eq!(cfg.capture.dir, PathBuf::from("shadowbox_images"));
        Ok(())
    }

    #[test]
    fn tool_labels_default_to_convention() -> Result<()> {
        let cfg = MonitorConfig::from_toml_str(
            r#"
            [[tools]]
            name = "wrench"

            [[tools]]
            name = "probe"
            in_label = "probe_present"
            out_label = "probe_missing"
            "#,
        )?;
        let entries = cfg.tools.entries();
        assert_eq!(entries[0], ToolEntry::new("wrench", "wrench_in", "wrench_out"));
        assert_eq!(
            entries[1],
            ToolEntry::new("probe", "probe_present", "probe_missing")
        );
        Ok(())
    }

    #[test]
    fn rejects_out_of_range_confidence() {
        let err = MonitorConfig::from_toml_str("[detection]\nconfidence = 1.5\n");
        assert!(err.is_err());
        let err = MonitorConfig::from_toml_str("[detection]\nconfidence = 0.0\n");
        assert!(err.is_err());
    }

    #[test]
    fn frame_delay_is_bounded() -> Result<()> {
        let cfg = MonitorConfig::from_toml_str("[detection]\nframe_delay_ms = 0\n")?;
        assert_eq!(cfg.detection.frame_delay, Some(Duration::ZERO));
        let cfg = MonitorConfig::from_toml_str("[detection]\nframe_delay_ms = 10000\n")?;
        assert_eq!(cfg.detection.frame_delay, Some(Duration::from_secs(10)));
        assert!(MonitorConfig::from_toml_str("[detection]\nframe_delay_ms = 10001\n").is_err());
        Ok(())
    }

    #[test]
    fn rejects_unknown_backend_and_sections() {
        assert!(MonitorConfig::from_toml_str("[model]\nbackend = \"cuda\"\n").is_err());
        assert!(MonitorConfig::from_toml_str("[mystery]\nvalue = 1\n").is_err());
    }
}
