mod animation;
mod app;
mod behavior;
mod color;
mod config;
mod error;
mod events;
mod input;
mod movement;
mod needs;
mod particles;
mod pet;
mod render;
mod runtime;
mod snapshot;
mod storage;

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

/// A small companion that lives in your terminal.
#[derive(Parser, Debug, Clone)]
#[command(name = "deskpet", version)]
pub(crate) struct Args {
    /// RNG seed (defaults to the one in settings.json)
    #[arg(long)]
    seed: Option<u64>,

    /// walking speed multiplier, 0.25 to 4.0
    #[arg(long)]
    speed: Option<f32>,

    /// keep the pet in one spot
    #[arg(long)]
    no_walk: bool,

    /// hide hearts, crumbs and the rest
    #[arg(long)]
    no_particles: bool,

    /// frame rate cap
    #[arg(long)]
    fps: Option<u32>,

    /// save file to use instead of the one in the data dir
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// forget the saved pet and start over
    #[arg(long)]
    reset: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let paths = config::project_paths()?;
    init_logging(&paths.log_path)?;
    app::run(args, paths)
}

/// The terminal is ours while running, so logs go to a file.
fn init_logging(path: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("could not open log file {}", path.display()))?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}
