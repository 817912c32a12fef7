//! Headless tick loop shared by `run` and `resume`.

use anyhow::{Context, Result};
use couchette_cast::{begin_chapter, chapter_of};
use couchette_scripting::{persist, Engine, Stage, World};
use couchette_testkit::{DispatchMetrics, JsonlSink, PersistenceMetrics, ReportSink, RunReport};
use std::fs;
use std::path::PathBuf;
use tracing::info;

/// What one headless session should do and where it writes.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub name: String,
    pub ticks: u64,
    pub save: Option<PathBuf>,
    pub journal: Option<PathBuf>,
    pub report: Option<PathBuf>,
    /// Open chapter 2 once the clock reaches this tick.
    pub chapter_two_at: Option<u64>,
}

pub fn drive(engine: &Engine, world: &mut World, stage: &mut dyn Stage, session: &Session) -> Result<RunReport> {
    let mut sink = match &session.journal {
        Some(path) => {
            world.enable_journal();
            Some(JsonlSink::create(path)?)
        }
        None => None,
    };

    let mut metrics = DispatchMetrics::default();
    for _ in 0..session.ticks {
        let report = engine.tick(world, stage);
        metrics.record(&report, world);

        if session.chapter_two_at == Some(report.tick.0) && chapter_of(world) < 2 {
            let reset = begin_chapter(engine, world, stage, 2).context("failed to open chapter 2")?;
            info!(tick = report.tick.0, reset, "chapter 2 opened");
        }
        if let (Some(sink), Some(journal)) = (sink.as_mut(), world.journal_mut()) {
            sink.write_journal(&journal.drain())?;
        }
    }
    if let Some(sink) = sink {
        info!(lines = sink.written(), "journal written");
        sink.finish()?;
    }

    let mut run = RunReport::new(session.name.clone(), world.seed(), metrics);
    if let Some(path) = &session.save {
        persist::save_to_path(world, engine.registry(), path)
            .with_context(|| format!("failed to save to {}", path.display()))?;
        let bytes = fs::metadata(path)?.len();
        run = run.with_persistence(PersistenceMetrics {
            path: path.clone(),
            bytes: usize::try_from(bytes).unwrap_or(usize::MAX),
            actors: world.actors().count(),
        });
    }
    if let Some(path) = &session.report {
        ReportSink::create(path)?.write(&run)?;
        info!(path = %path.display(), "wrote run report");
    }
    Ok(run)
}
