//! Training driver.
//!
//! Training itself is delegated to the external `yolo` CLI; this module only
//! builds and runs the invocation.

use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use std::process::{Command, ExitStatus};

pub const DEFAULT_TRAINER: &str = "yolo";

#[derive(Clone, Debug, PartialEq)]
pub struct TrainingPlan {
    /// Base weights to fine-tune.
    pub model: PathBuf,
    /// Dataset description (`data.yaml`).
    pub data: PathBuf,
    pub epochs: u32,
    pub imgsz: u32,
    /// Dataloader workers; 0 keeps loading on the main process.
    pub workers: u32,
    pub batch: u32,
    pub save_period: u32,
    pub patience: u32,
    pub cache: bool,
    pub amp: bool,
}

impl Default for TrainingPlan {
    fn default() -> Self {
        Self {
            model: PathBuf::from("yolo11n.pt"),
            data: PathBuf::from("data.yaml"),
            epochs: 200,
            imgsz: 640,
            workers: 0,
            batch: 4,
            save_period: 50,
            patience: 50,
            cache: false,
            amp: false,
        }
    }
}

impl TrainingPlan {
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(anyhow!("epochs must be at least 1"));
        }
        if self.batch == 0 {
            return Err(anyhow!("batch must be at least 1"));
        }
        if self.imgsz == 0 || self.imgsz % 32 != 0 {
            return Err(anyhow!("imgsz must be a positive multiple of 32"));
        }
        Ok(())
    }

    /// `key=value` arguments after `detect train`.
    pub fn args(&self) -> Vec<String> {
        vec![
            "detect".to_string(),
            "train".to_string(),
            format!("model={}", self.model.display()),
            format!("data={}", self.data.display()),
            format!("epochs={}", self.epochs),
            format!("imgsz={}", self.imgsz),
            format!("workers={}", self.workers),
            format!("batch={}", self.batch),
            format!("save_period={}", self.save_period),
            format!("patience={}", self.patience),
            format!("cache={}", py_bool(self.cache)),
            format!("amp={}", py_bool(self.amp)),
        ]
    }

    pub fn command(&self, program: &str) -> Command {
        let mut command = Command::new(program);
        command.args(self.args());
        command
    }

    /// Shell-style rendering for logs and `--dry-run`.
    pub fn render(&self, program: &str) -> String {
        std::iter::once(program.to_string())
            .chain(self.args())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run training to completion, inheriting stdio.
    pub fn run(&self, program: &str) -> Result<ExitStatus> {
        self.validate()?;
        if !self.data.exists() {
            log::warn!("dataset file {} does not exist", self.data.display());
        }
        log::info!("starting training: {}", self.render(program));
        let status = self
            .command(program)
            .status()
            .with_context(|| format!("failed to launch trainer '{}'", program))?;
        Ok(status)
    }
}

fn py_bool(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}
