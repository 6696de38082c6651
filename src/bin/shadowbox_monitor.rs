//! shadowbox_monitor - live terminal viewer
//!
//! Opens the configured camera, runs detection on every frame and prints the
//! per-tool status whenever it changes. Type `q` + Enter or press Ctrl-C to quit.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::io::BufRead;
use std::path::PathBuf;
use std::time::Duration;

use shadowbox::detect::{load_backend, DetectParams};
use shadowbox::monitor::VIEWER_FRAME_DELAY;
use shadowbox::ui::{Ui, UiMode};
use shadowbox::{
    open_source, run_detection_loop, CancelToken, ConsoleSink, MonitorConfig, MonitorSettings,
    ToolTable,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Frame source: device index, /dev/videoN, image directory or stub://name.
    #[arg(long)]
    source: Option<String>,
    /// Minimum detection confidence (0, 1].
    #[arg(long)]
    confidence: Option<f32>,
    /// Disable overlap suppression.
    #[arg(long)]
    no_nms: bool,
    /// Delay between frames in milliseconds (0 to 10000).
    #[arg(long, value_parser = clap::value_parser!(u64).range(0..=10_000))]
    frame_delay_ms: Option<u64>,
    /// Stop after this many frames.
    #[arg(long)]
    max_frames: Option<u64>,
    /// Keep a JPEG of the latest annotated frame at this path.
    #[arg(long)]
    snapshot: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t)]
    ui: UiMode,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let cfg = MonitorConfig::load()?;
    let ui = Ui::for_stderr(args.ui);

    let confidence = args.confidence.unwrap_or(cfg.detection.confidence);
    if !(confidence > 0.0 && confidence <= 1.0) {
        return Err(anyhow!("confidence must be in (0, 1], got {}", confidence));
    }
    let settings = MonitorSettings {
        detect: DetectParams {
            confidence,
            overlap: (!args.no_nms).then_some(cfg.detection.overlap),
        },
        frame_delay: args
            .frame_delay_ms
            .map(Duration::from_millis)
            .or(cfg.detection.frame_delay)
            .unwrap_or(VIEWER_FRAME_DELAY),
        max_frames: args.max_frames,
    };

    let mut stage = ui.stage("load detector");
    let mut detector = load_backend(&cfg.model, &cfg.tools).inspect_err(|_| stage.fail())?;
    drop(stage);
    let tools = ToolTable::new(cfg.tools.clone());

    let spec = args.source.unwrap_or_else(|| cfg.camera.source_spec());
    let mut source = open_source(&spec, &cfg.camera)
        .inspect_err(|err| log::warn!("failed to open camera {}: {:#}", spec, err))?;

    let cancel = CancelToken::new();
    let ctrlc_cancel = cancel.clone();
    ctrlc::set_handler(move || ctrlc_cancel.cancel()).context("error setting Ctrl-C handler")?;
    let key_cancel = cancel.clone();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) if line.trim().eq_ignore_ascii_case("q") => {
                    key_cancel.cancel();
                    break;
                }
                Ok(_) => continue,
                Err(_) => break,
            }
        }
    });

    log::info!(
        "monitoring {} with backend '{}' (conf={:.2}, nms={})",
        spec,
        detector.name(),
        settings.detect.confidence,
        settings
            .detect
            .overlap
            .map(|t| format!("{t:.2}"))
            .unwrap_or_else(|| "off".to_string())
    );
    eprintln!("Press 'q' then Enter (or Ctrl-C) to quit");

    let mut sink = ConsoleSink::stdout(args.snapshot);
    let summary = run_detection_loop(
        &mut source,
        detector.as_mut(),
        &mut sink,
        &tools,
        &settings,
        &cancel,
    )?;

    if summary.exit.is_failure() {
        return Err(anyhow!(
            "detection ended: {} after {} frames",
            summary.exit.describe(),
            summary.frames
        ));
    }
    Ok(())
}
