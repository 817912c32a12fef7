//! Tick-stepping harness for deterministic, snapshot-per-tick tests.
//!
//! A worldtest steps an engine over a world for a fixed number of ticks and
//! records a snapshot after every tick. Reports can be compared against each
//! other (determinism, save/resume) or against a golden JSON file.

use crate::snapshot::{assert_json_snapshot, WorldSnapshot};
use anyhow::Result;
use couchette_scripting::{Engine, Stage, TickReport, World};
use serde::Serialize;
use std::path::Path;

/// Snapshot captured after one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorldtestFrame<S> {
    /// Tick number.
    pub tick: u64,
    /// What the tick loop did.
    pub report: TickReport,
    /// Snapshot payload.
    pub snapshot: S,
}

/// Frames of a whole run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorldtestReport<S> {
    /// Human-readable name.
    pub name: String,
    /// Snapshot before the first tick.
    pub initial: S,
    /// One frame per tick.
    pub frames: Vec<WorldtestFrame<S>>,
}

impl<S> WorldtestReport<S> {
    /// Ticks during which a cut-scene held the cast back.
    pub fn halted_ticks(&self) -> usize {
        self.frames.iter().filter(|f| f.report.halted).count()
    }

    /// Faults recovered over the whole run.
    pub fn recovered(&self) -> usize {
        self.frames.iter().map(|f| f.report.recovered).sum()
    }
}

/// Step `ticks` times and capture `snapshot` before the first tick and after each.
pub fn run_worldtest<S, F>(
    name: impl Into<String>,
    engine: &Engine,
    world: &mut World,
    stage: &mut dyn Stage,
    ticks: u64,
    mut snapshot: F,
) -> WorldtestReport<S>
where
    F: FnMut(&World) -> S,
{
    let initial = snapshot(world);
    let mut frames = Vec::with_capacity(usize::try_from(ticks).unwrap_or(0));
    for _ in 0..ticks {
        let report = engine.tick(world, stage);
        frames.push(WorldtestFrame {
            tick: report.tick.0,
            report,
            snapshot: snapshot(world),
        });
    }
    WorldtestReport {
        name: name.into(),
        initial,
        frames,
    }
}

/// [`run_worldtest`] with full [`WorldSnapshot`]s.
pub fn record_world(
    name: impl Into<String>,
    engine: &Engine,
    world: &mut World,
    stage: &mut dyn Stage,
    ticks: u64,
) -> WorldtestReport<WorldSnapshot> {
    run_worldtest(name, engine, world, stage, ticks, WorldSnapshot::capture)
}

/// Run a worldtest and assert (or update) its golden file at `golden`.
pub fn assert_worldtest<S, F>(
    golden: impl AsRef<Path>,
    name: impl Into<String>,
    engine: &Engine,
    world: &mut World,
    stage: &mut dyn Stage,
    ticks: u64,
    snapshot: F,
) -> Result<()>
where
    S: Serialize,
    F: FnMut(&World) -> S,
{
    let report = run_worldtest(name, engine, world, stage, ticks, snapshot);
    assert_json_snapshot(golden, &report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use couchette_cast::{build_engine, flags, start_scenario};
    use couchette_scripting::{EngineConfig, HeadlessStage};

    #[test]
    fn frames_follow_the_clock() {
        let engine = build_engine(EngineConfig::default()).unwrap();
        let mut world = World::new(3);
        let mut stage = HeadlessStage::default();
        start_scenario(&engine, &mut world, &mut stage).unwrap();

        let report = run_worldtest("clock", &engine, &mut world, &mut stage, 5, |w| w.game_time());

        assert_eq!(report.initial, 0);
        let ticks: Vec<u64> = report.frames.iter().map(|f| f.tick).collect();
        assert_eq!(ticks, vec![1, 2, 3, 4, 5]);
        let times: Vec<i32> = report.frames.iter().map(|f| f.snapshot).collect();
        assert_eq!(times, vec![3, 6, 9, 12, 15]);
        assert_eq!(report.recovered(), 0);
    }

    #[test]
    fn dinner_is_served_within_the_first_hundred_ticks() {
        let engine = build_engine(EngineConfig::default()).unwrap();
        let mut world = World::new(3);
        let mut stage = HeadlessStage::default();
        start_scenario(&engine, &mut world, &mut stage).unwrap();

        let report = run_worldtest("dinner", &engine, &mut world, &mut stage, 100, |w| {
            w.story(flags::DINNER_SERVED)
        });

        let served_at = report.frames.iter().position(|f| f.snapshot == 1);
        assert!(served_at.is_some());
        assert!(report.frames[served_at.unwrap()..].iter().all(|f| f.snapshot == 1));
    }
}
