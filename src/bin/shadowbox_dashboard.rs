//! shadowbox_dashboard - web dashboard
//!
//! Loads the detector once, then serves a page with Start/Stop Detection
//! buttons, the latest annotated frame and the per-tool status.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::sync::{mpsc, Arc};
use std::time::Duration;

use shadowbox::dashboard::{DashboardConfig, DashboardServer, SessionController, SourceFactory};
use shadowbox::detect::{load_backend, DetectParams};
use shadowbox::monitor::DASHBOARD_FRAME_DELAY;
use shadowbox::ui::{Ui, UiMode};
use shadowbox::{open_source, MonitorConfig, MonitorSettings, ToolTable};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Listen address (defaults to the configured dashboard address).
    #[arg(long)]
    addr: Option<String>,
    /// Frame source: device index, /dev/videoN, image directory or stub://name.
    #[arg(long)]
    source: Option<String>,
    /// Minimum detection confidence (0, 1].
    #[arg(long)]
    confidence: Option<f32>,
    /// Enable overlap suppression with the configured threshold.
    #[arg(long)]
    nms: bool,
    /// Delay between frames in milliseconds (0 to 10000).
    #[arg(long, value_parser = clap::value_parser!(u64).range(0..=10_000))]
    frame_delay_ms: Option<u64>,
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
            overlap: args.nms.then_some(cfg.detection.overlap),
        },
        frame_delay: args
            .frame_delay_ms
            .map(Duration::from_millis)
            .or(cfg.detection.frame_delay)
            .unwrap_or(DASHBOARD_FRAME_DELAY),
        max_frames: None,
    };

    let mut stage = ui.stage("load detector");
    let detector = load_backend(&cfg.model, &cfg.tools).inspect_err(|_| stage.fail())?;
    drop(stage);

    let spec = args.source.unwrap_or_else(|| cfg.camera.source_spec());
    let camera = cfg.camera.clone();
    let factory: SourceFactory = Arc::new(move || open_source(&spec, &camera));
    let controller = Arc::new(SessionController::new(
        detector,
        ToolTable::new(cfg.tools.clone()),
        settings,
        factory,
    ));

    let dashboard_cfg = DashboardConfig {
        addr: args.addr.unwrap_or_else(|| cfg.dashboard_addr.clone()),
    };
    let handle = DashboardServer::new(dashboard_cfg, controller.clone()).spawn()?;
    log::info!("dashboard listening on http://{}", handle.addr);

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .context("error setting Ctrl-C handler")?;

    log::info!("shadowbox_dashboard waiting for shutdown signal (Ctrl-C)...");
    let _ = rx.recv();
    log::info!("shutdown signal received, stopping detection and dashboard...");
    controller.stop()?;
    controller.wait()?;
    handle.stop()?;
    Ok(())
}
