//! capture_images - save a handful of camera snapshots for labelling

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use shadowbox::capture::{capture_snapshots, CapturePlan};
use shadowbox::ui::{Ui, UiMode};
use shadowbox::{open_source, CancelToken, MonitorConfig};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Frame source: device index, /dev/videoN, image directory or stub://name.
    #[arg(long)]
    source: Option<String>,
    /// Output directory.
    #[arg(long)]
    out: Option<PathBuf>,
    /// Number of snapshots.
    #[arg(long)]
    count: Option<u32>,
    /// Pause after each saved snapshot, in milliseconds.
    #[arg(long)]
    interval_ms: Option<u64>,
    #[arg(long, value_enum, default_value_t)]
    ui: UiMode,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let cfg = MonitorConfig::load()?;
    let ui = Ui::for_stderr(args.ui);

    let plan = CapturePlan {
        dir: args.out.unwrap_or(cfg.capture.dir),
        count: args.count.unwrap_or(cfg.capture.count),
        interval: args
            .interval_ms
            .map(Duration::from_millis)
            .unwrap_or(cfg.capture.interval),
    };
    if plan.count == 0 {
        return Err(anyhow!("count must be at least 1"));
    }

    let cancel = CancelToken::new();
    let ctrlc_cancel = cancel.clone();
    ctrlc::set_handler(move || ctrlc_cancel.cancel()).context("error setting Ctrl-C handler")?;

    let spec = args.source.unwrap_or_else(|| cfg.camera.source_spec());
    let mut source = open_source(&spec, &cfg.camera)?;
    let mut stage = ui.stage(&format!("capture {} snapshots from {}", plan.count, spec));
    let saved = capture_snapshots(&mut source, &plan, &cancel).inspect_err(|_| stage.fail())?;
    drop(stage);

    println!("saved {} of {} snapshots to {}", saved.len(), plan.count, plan.dir.display());
    if saved.is_empty() {
        return Err(anyhow!("no snapshots were captured"));
    }
    Ok(())
}
