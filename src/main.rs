//! couchette - headless host for the night-train cast
//!
//! Runs the demo scenario, resumes it from a save, or prints a save as JSON.

mod config;
mod headless;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use config::HostConfig;
use couchette_cast::{build_engine, start_scenario};
use couchette_scripting::{persist, Engine, HeadlessStage, World};
use couchette_testkit::{canonical_json, RunReport, WorldSnapshot};
use headless::Session;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Run couchette night-train scenarios headless", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true, default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the scenario in a fresh world
    Run {
        /// World seed (overrides the config file)
        #[arg(long)]
        seed: Option<u64>,
        #[command(flatten)]
        session: SessionArgs,
    },
    /// Continue from a save file
    Resume {
        /// Save file to load
        from: PathBuf,
        #[command(flatten)]
        session: SessionArgs,
    },
    /// Print a save file as canonical JSON
    Inspect {
        /// Save file to read
        save: PathBuf,
    },
}

#[derive(Args, Debug)]
struct SessionArgs {
    /// Number of ticks to run
    #[arg(long, default_value_t = 600)]
    ticks: u64,
    /// Write a save here when the run ends
    #[arg(long)]
    save: Option<PathBuf>,
    /// Write the dispatch journal here as JSON lines
    #[arg(long)]
    journal: Option<PathBuf>,
    /// Write a run report here as JSON
    #[arg(long)]
    report: Option<PathBuf>,
    /// Open chapter 2 when the clock reaches this tick
    #[arg(long)]
    chapter_two_at: Option<u64>,
    /// Game-time units per tick (overrides the config file)
    #[arg(long)]
    time_speed: Option<i32>,
}

impl SessionArgs {
    fn session(&self, name: &str) -> Session {
        Session {
            name: name.to_string(),
            ticks: self.ticks,
            save: self.save.clone(),
            journal: self.journal.clone(),
            report: self.report.clone(),
            chapter_two_at: self.chapter_two_at,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = HostConfig::read(&cli.config);
    // RUST_LOG wins, then the config file, then WARN.
    let fallback = loaded
        .as_ref()
        .ok()
        .and_then(|cfg| cfg.log_filter.clone())
        .unwrap_or_else(|| "warn".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)))
        .init();
    let mut config = HostConfig::or_defaults(loaded, &cli.config);

    info!("Starting couchette v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Run { seed, session } => {
            if let Some(speed) = session.time_speed {
                config.engine.time_speed = speed;
            }
            let engine = build_engine(config.engine.clone())?;
            let mut world = World::new(seed.unwrap_or(config.world_seed));
            let mut stage = HeadlessStage::default();
            start_scenario(&engine, &mut world, &mut stage).context("failed to spawn the cast")?;
            let run = headless::drive(&engine, &mut world, &mut stage, &session.session("run"))?;
            print_summary(&world, &run);
        }
        Command::Resume { from, session } => {
            if let Some(speed) = session.time_speed {
                config.engine.time_speed = speed;
            }
            let engine = build_engine(config.engine.clone())?;
            let mut world = load(&engine, &from)?;
            let mut stage = HeadlessStage::default();
            let run = headless::drive(&engine, &mut world, &mut stage, &session.session("resume"))?;
            print_summary(&world, &run);
        }
        Command::Inspect { save } => {
            let engine = build_engine(config.engine.clone())?;
            let world = load(&engine, &save)?;
            print!("{}", canonical_json(&Inspection::new(&engine, &world))?);
        }
    }
    Ok(())
}

fn load(engine: &Engine, path: &Path) -> Result<World> {
    let world = persist::load_from_path(path, engine.registry())
        .with_context(|| format!("failed to load {}", path.display()))?;
    info!(path = %path.display(), tick = world.tick().0, "save loaded");
    Ok(world)
}

fn print_summary(world: &World, run: &RunReport) {
    println!(
        "tick {} (game time {}): {} delivered, {} dropped, {} absorbed, {} recovered, {} halted, {} live actors",
        world.tick().0,
        world.game_time(),
        run.dispatch.delivered,
        run.dispatch.dropped,
        run.dispatch.absorbed,
        run.dispatch.recovered,
        run.dispatch.halted_ticks,
        run.dispatch.live_actors,
    );
    if let Some(save) = &run.persistence {
        println!("saved {} bytes to {}", save.bytes, save.path.display());
    }
}

/// A save as printed by `inspect`: the world plus names for the routines on its stacks.
#[derive(Serialize)]
struct Inspection {
    handlers: BTreeMap<u16, &'static str>,
    world: WorldSnapshot,
}

impl Inspection {
    fn new(engine: &Engine, world: &World) -> Self {
        let handlers = world
            .actors()
            .flat_map(|actor| actor.stack().frames().iter().map(|frame| frame.handler))
            .filter_map(|id| Some((id.0, engine.registry().name_of(id)?)))
            .collect();
        Self {
            handlers,
            world: WorldSnapshot::capture(world),
        }
    }
}
