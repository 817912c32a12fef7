//! Canonical JSON views of a world and golden-file snapshot helpers.
//!
//! Snapshots are serialized as canonical pretty JSON with object keys sorted,
//! so two worlds in the same state always print the same text. Golden files are
//! compared on disk; rerun with `COUCHETTE_UPDATE_SNAPSHOTS=1` to rewrite them.

use anyhow::{Context, Result};
use couchette_scripting::{Actor, ActorStatus, Clock, Cutscene, Frame, Letter, Position, Subscription, World};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Environment variable that enables snapshot updates.
pub const UPDATE_SNAPSHOTS_ENV: &str = "COUCHETTE_UPDATE_SNAPSHOTS";

/// One actor as it appears in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActorSnapshot {
    /// Actor id.
    pub id: u16,
    /// Still receiving messages.
    pub live: bool,
    /// Hidden from the stage.
    pub hidden: bool,
    /// Position.
    pub position: Position,
    /// Carried token, 0 for none.
    pub token: u8,
    /// Memory slots.
    pub memory: Vec<i32>,
    /// Frames from depth 0 upward.
    pub frames: Vec<Frame>,
}

impl ActorSnapshot {
    /// Capture one actor.
    pub fn capture(actor: &Actor) -> Self {
        Self {
            id: actor.id().0,
            live: actor.is_live(),
            hidden: actor.status.contains(ActorStatus::HIDDEN),
            position: actor.position,
            token: actor.token.map_or(0, |token| token.get()),
            memory: actor.memory.words().to_vec(),
            frames: actor.stack().frames().to_vec(),
        }
    }
}

/// Everything observable about a world, in a serializable form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorldSnapshot {
    /// World seed.
    pub seed: u64,
    /// Simulation clock.
    pub clock: Clock,
    /// Non-zero story flags, ascending.
    pub story: Vec<(u16, i32)>,
    /// Letters waiting for the next tick.
    pub queue: Vec<Letter>,
    /// Auto-message subscriptions.
    pub subscriptions: Vec<Subscription>,
    /// Running cut-scene.
    pub cutscene: Option<Cutscene>,
    /// Actors, ascending id.
    pub actors: Vec<ActorSnapshot>,
}

impl WorldSnapshot {
    /// Capture a world.
    pub fn capture(world: &World) -> Self {
        Self {
            seed: world.seed(),
            clock: world.clock(),
            story: world.story_flags().map(|(flag, value)| (flag.0, value)).collect(),
            queue: world.queued().copied().collect(),
            subscriptions: world.subscriptions().to_vec(),
            cutscene: world.cutscene(),
            actors: world.actors().map(ActorSnapshot::capture).collect(),
        }
    }
}

/// Assert that `value` matches the JSON snapshot stored at `path`.
///
/// If `COUCHETTE_UPDATE_SNAPSHOTS=1` is set, the snapshot file is written
/// with the current value instead.
pub fn assert_json_snapshot<P: AsRef<Path>, T: Serialize>(path: P, value: &T) -> Result<()> {
    let path = path.as_ref();
    let actual = canonical_json(value)?;

    if should_update_snapshots() {
        write_snapshot(path, &actual)?;
        return Ok(());
    }

    let expected = fs::read_to_string(path).with_context(|| {
        format!(
            "snapshot missing at {} (run with {}=1 to create it)",
            path.display(),
            UPDATE_SNAPSHOTS_ENV
        )
    })?;

    if expected != actual {
        anyhow::bail!(
            "snapshot mismatch at {} (run with {}=1 to update)",
            path.display(),
            UPDATE_SNAPSHOTS_ENV
        );
    }
    Ok(())
}

/// Serialize `value` as pretty JSON with sorted object keys and a trailing newline.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String> {
    let value = serde_json::to_value(value).context("failed to serialize snapshot value")?;
    let value = canonicalize_value(value);
    let mut s = serde_json::to_string_pretty(&value).context("failed to format snapshot JSON")?;
    s.push('\n');
    Ok(s)
}

fn should_update_snapshots() -> bool {
    matches!(
        std::env::var(UPDATE_SNAPSHOTS_ENV).as_deref(),
        Ok("1") | Ok("true") | Ok("yes")
    )
}

fn write_snapshot(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create snapshot directory {}", parent.display()))?;
    }
    fs::write(path, contents).with_context(|| format!("failed to write snapshot {}", path.display()))
}

fn canonicalize_value(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, canonicalize_value(v)))
                    .collect(),
            )
        }
        Value::Array(values) => Value::Array(values.into_iter().map(canonicalize_value).collect()),
        other => other,
    }
}
