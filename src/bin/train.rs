//! train - fine-tune the shadowbox detector with the external yolo CLI

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;

use shadowbox::train::{TrainingPlan, DEFAULT_TRAINER};
use shadowbox::ui::{Ui, UiMode};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Base weights.
    #[arg(long, default_value = "yolo11n.pt")]
    model: PathBuf,
    /// Dataset description.
    #[arg(long, default_value = "data.yaml")]
    data: PathBuf,
    #[arg(long, default_value_t = 200)]
    epochs: u32,
    #[arg(long, default_value_t = 640)]
    imgsz: u32,
    #[arg(long, default_value_t = 0)]
    workers: u32,
    #[arg(long, default_value_t = 4)]
    batch: u32,
    /// Save a checkpoint every N epochs.
    #[arg(long, default_value_t = 50)]
    save_period: u32,
    /// Stop after N epochs without improvement.
    #[arg(long, default_value_t = 50)]
    patience: u32,
    #[arg(long)]
    cache: bool,
    #[arg(long)]
    amp: bool,
    /// Trainer executable.
    #[arg(long, env = "SHADOWBOX_TRAINER", default_value = DEFAULT_TRAINER)]
    trainer: String,
    /// Print the command instead of running it.
    #[arg(long)]
    dry_run: bool,
    #[arg(long, value_enum, default_value_t)]
    ui: UiMode,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let plan = TrainingPlan {
        model: args.model,
        data: args.data,
        epochs: args.epochs,
        imgsz: args.imgsz,
        workers: args.workers,
        batch: args.batch,
        save_period: args.save_period,
        patience: args.patience,
        cache: args.cache,
        amp: args.amp,
    };
    plan.validate()?;

    if args.dry_run {
        println!("{}", plan.render(&args.trainer));
        return Ok(());
    }

    let ui = Ui::for_stderr(args.ui);
    let status = {
        let mut stage = ui.stage(&format!("train {} for {} epochs", plan.model.display(), plan.epochs));
        let status = plan.run(&args.trainer).inspect_err(|_| stage.fail())?;
        if !status.success() {
            stage.fail();
        }
        status
    };
    if !status.success() {
        return Err(anyhow!("training exited with {}", status));
    }
    Ok(())
}
