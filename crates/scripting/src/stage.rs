//! Collaborator seam: everything scripts ask of the world outside the engine.
//!
//! Presentation work (animation, dialog, walking, cut-scenes) is started by a
//! routine and polled on later ticks; the engine never blocks on it.

use crate::actor::Position;
use couchette_core::{ActorId, SimTick};
use std::collections::BTreeMap;

/// A save requested by a script at a story checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavePoint {
    /// Requesting actor.
    pub actor: ActorId,
    /// Checkpoint kind.
    pub kind: u16,
    /// Story event that triggered it.
    pub event: u16,
}

/// Operations scripts may request from the host.
pub trait Stage {
    /// Called once at the start of every tick, before any dispatch.
    fn on_tick(&mut self, _tick: SimTick) {}

    /// Start a positional animation sequence for `actor`.
    fn begin_animation(&mut self, actor: ActorId, sequence: u16);

    /// Whether `actor`'s last animation has finished (true when none runs).
    fn animation_finished(&self, actor: ActorId) -> bool;

    /// Start a dialog line spoken by `actor`.
    fn begin_dialog(&mut self, actor: ActorId, line: u16);

    /// Whether `actor`'s last dialog line has finished (true when none runs).
    fn dialog_finished(&self, actor: ActorId) -> bool;

    /// One step of a walk from `from` toward `target`. Returns the new position.
    fn advance_walk(&mut self, actor: ActorId, from: Position, target: Position) -> Position;

    /// Distance between two positions, `None` when they are not comparable
    /// (different cars or locations).
    fn distance(&self, a: Position, b: Position) -> Option<u32>;

    /// Ask the host to write a save at the end of this tick.
    fn request_save(&mut self, point: SavePoint);

    /// Start a blocking cut-scene.
    fn begin_cutscene(&mut self, cutscene: u16);

    /// Whether cut-scene `cutscene` has finished.
    fn cutscene_finished(&self, cutscene: u16) -> bool;
}

/// Something a [`HeadlessStage`] was asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageEvent {
    /// An animation started.
    Animation {
        /// Animated actor.
        actor: ActorId,
        /// Sequence id.
        sequence: u16,
    },
    /// A dialog line started.
    Dialog {
        /// Speaker.
        actor: ActorId,
        /// Line id.
        line: u16,
    },
    /// A save was requested.
    Save(SavePoint),
    /// A cut-scene started.
    Cutscene(u16),
}

/// Deterministic stage with fixed durations and no presentation at all.
///
/// Animations, dialog and cut-scenes finish after a fixed number of ticks;
/// walking moves a fixed stride along the car per step.
#[derive(Debug, Clone)]
pub struct HeadlessStage {
    animation_ticks: u32,
    dialog_ticks: u32,
    cutscene_ticks: u32,
    stride: u16,
    animations: BTreeMap<ActorId, u32>,
    dialogs: BTreeMap<ActorId, u32>,
    cutscenes: BTreeMap<u16, u32>,
    events: Vec<StageEvent>,
}

impl Default for HeadlessStage {
    fn default() -> Self {
        Self::new(2, 3, 4, 250)
    }
}

impl HeadlessStage {
    /// Stage with explicit durations (in ticks) and walking stride.
    pub fn new(animation_ticks: u32, dialog_ticks: u32, cutscene_ticks: u32, stride: u16) -> Self {
        Self {
            animation_ticks,
            dialog_ticks,
            cutscene_ticks,
            stride: stride.max(1),
            animations: BTreeMap::new(),
            dialogs: BTreeMap::new(),
            cutscenes: BTreeMap::new(),
            events: Vec::new(),
        }
    }

    /// Everything requested so far, in order.
    pub fn events(&self) -> &[StageEvent] {
        &self.events
    }

    /// Save requests, in order.
    pub fn save_requests(&self) -> impl Iterator<Item = SavePoint> + '_ {
        self.events.iter().filter_map(|event| match event {
            StageEvent::Save(point) => Some(*point),
            _ => None,
        })
    }

    fn count_down(timers: &mut BTreeMap<impl Ord + Copy, u32>) {
        for remaining in timers.values_mut() {
            *remaining = remaining.saturating_sub(1);
        }
        timers.retain(|_, remaining| *remaining > 0);
    }
}

impl Stage for HeadlessStage {
    fn on_tick(&mut self, _tick: SimTick) {
        Self::count_down(&mut self.animations);
        Self::count_down(&mut self.dialogs);
        Self::count_down(&mut self.cutscenes);
    }

    fn begin_animation(&mut self, actor: ActorId, sequence: u16) {
        self.animations.insert(actor, self.animation_ticks);
        self.events.push(StageEvent::Animation { actor, sequence });
    }

    fn animation_finished(&self, actor: ActorId) -> bool {
        !self.animations.contains_key(&actor)
    }

    fn begin_dialog(&mut self, actor: ActorId, line: u16) {
        self.dialogs.insert(actor, self.dialog_ticks);
        self.events.push(StageEvent::Dialog { actor, line });
    }

    fn dialog_finished(&self, actor: ActorId) -> bool {
        !self.dialogs.contains_key(&actor)
    }

    fn advance_walk(&mut self, _actor: ActorId, from: Position, target: Position) -> Position {
        if from.car != target.car {
            // Change cars through the vestibule at the near end.
            let car = if target.car > from.car {
                from.car + 1
            } else {
                from.car - 1
            };
            return Position::new(car, target.location, from.offset);
        }
        let offset = if from.offset < target.offset {
            from.offset.saturating_add(self.stride).min(target.offset)
        } else {
            from.offset.saturating_sub(self.stride).max(target.offset)
        };
        Position::new(from.car, target.location, offset)
    }

    fn distance(&self, a: Position, b: Position) -> Option<u32> {
        (a.car == b.car && a.location == b.location).then(|| u32::from(a.offset.abs_diff(b.offset)))
    }

    fn request_save(&mut self, point: SavePoint) {
        self.events.push(StageEvent::Save(point));
    }

    fn begin_cutscene(&mut self, cutscene: u16) {
        self.cutscenes.insert(cutscene, self.cutscene_ticks);
        self.events.push(StageEvent::Cutscene(cutscene));
    }

    fn cutscene_finished(&self, cutscene: u16) -> bool {
        !self.cutscenes.contains_key(&cutscene)
    }
}
