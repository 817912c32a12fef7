//! The single owned value holding everything the scripts can observe.

use crate::actor::Actor;
use crate::journal::Journal;
use couchette_core::{ActorId, Message, Signal, SimTick, MEMORY_SLOTS};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use tracing::warn;

/// Key of a global story flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StoryFlag(pub u16);

/// Tick counter plus in-game clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Clock {
    /// Ticks run since the scenario began.
    pub tick: SimTick,
    /// In-game time, advanced by the configured time speed every unblocked tick.
    pub game_time: i32,
}

/// A narrative message queued for delivery at the start of the next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Letter {
    /// Sending actor.
    pub sender: ActorId,
    /// Receiving actor.
    pub recipient: ActorId,
    /// Narrative signal.
    pub signal: Signal,
    /// Payload.
    pub param: i32,
}

impl Letter {
    /// Message this letter turns into when delivered.
    pub fn message(&self) -> Message {
        Message::new(self.sender, self.recipient, self.signal.into(), self.param)
    }
}

/// Queued `signal` letters to `recipient` set memory slot `slot` to 1 instead
/// of being delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Subscribed actor.
    pub recipient: ActorId,
    /// Signal being watched.
    pub signal: Signal,
    /// Memory slot raised when it arrives.
    pub slot: u8,
}

/// A blocking cut-scene in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cutscene {
    /// Stage-side cut-scene id.
    pub id: u16,
    /// Actor that started it and is told when it ends.
    pub owner: ActorId,
}

/// All script-visible state: actors, clock, story flags and the letter queue.
///
/// The engine holds no game state of its own; every dispatch receives the
/// world explicitly.
#[derive(Debug, Clone, Default)]
pub struct World {
    pub(crate) seed: u64,
    pub(crate) clock: Clock,
    pub(crate) actors: BTreeMap<ActorId, Actor>,
    pub(crate) story: BTreeMap<StoryFlag, i32>,
    pub(crate) queue: VecDeque<Letter>,
    pub(crate) subscriptions: Vec<Subscription>,
    pub(crate) cutscene: Option<Cutscene>,
    pub(crate) journal: Option<Journal>,
    /// Recipients of deliveries currently running, outermost first.
    pub(crate) in_flight: Vec<ActorId>,
}

impl World {
    /// Empty world whose scripted randomness derives from `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    /// Seed feeding per-actor randomness.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Current tick.
    pub fn tick(&self) -> SimTick {
        self.clock.tick
    }

    /// Current in-game time.
    pub fn game_time(&self) -> i32 {
        self.clock.game_time
    }

    /// Set the in-game time, e.g. when a chapter opens at a fixed hour.
    pub fn set_game_time(&mut self, game_time: i32) {
        self.clock.game_time = game_time;
    }

    /// Clock snapshot.
    pub fn clock(&self) -> Clock {
        self.clock
    }

    /// Actor by id.
    pub fn actor(&self, id: ActorId) -> Option<&Actor> {
        self.actors.get(&id)
    }

    /// Actor by id, mutably. Hosts use this for setup; scripts go through
    /// their context.
    pub fn actor_mut(&mut self, id: ActorId) -> Option<&mut Actor> {
        self.actors.get_mut(&id)
    }

    /// Actor by id, only if messages are still delivered to it.
    pub fn live_actor(&self, id: ActorId) -> Option<&Actor> {
        self.actors.get(&id).filter(|actor| actor.is_live())
    }

    /// All actors in tick order.
    pub fn actors(&self) -> impl Iterator<Item = &Actor> + '_ {
        self.actors.values()
    }

    /// Ids of every actor, ascending.
    pub fn actor_ids(&self) -> Vec<ActorId> {
        self.actors.keys().copied().collect()
    }

    /// Story flag value (0 when never set).
    pub fn story(&self, flag: StoryFlag) -> i32 {
        self.story.get(&flag).copied().unwrap_or(0)
    }

    /// Set a story flag. Setting 0 removes it.
    pub fn set_story(&mut self, flag: StoryFlag, value: i32) {
        if value == 0 {
            self.story.remove(&flag);
        } else {
            self.story.insert(flag, value);
        }
    }

    /// Non-zero story flags in key order.
    pub fn story_flags(&self) -> impl Iterator<Item = (StoryFlag, i32)> + '_ {
        self.story.iter().map(|(flag, value)| (*flag, *value))
    }

    /// Letters waiting for the next tick.
    pub fn queued(&self) -> impl Iterator<Item = &Letter> + '_ {
        self.queue.iter()
    }

    /// Active auto-message subscriptions.
    pub fn subscriptions(&self) -> &[Subscription] {
        &self.subscriptions
    }

    /// Running cut-scene, if any.
    pub fn cutscene(&self) -> Option<Cutscene> {
        self.cutscene
    }

    /// Start recording dispatches.
    pub fn enable_journal(&mut self) {
        self.journal.get_or_insert_with(Journal::new);
    }

    /// Recorded dispatches, when journaling is on.
    pub fn journal(&self) -> Option<&Journal> {
        self.journal.as_ref()
    }

    /// Recorded dispatches, mutably (e.g. to drain them).
    pub fn journal_mut(&mut self) -> Option<&mut Journal> {
        self.journal.as_mut()
    }

    /// Insert or replace an actor.
    pub(crate) fn insert_actor(&mut self, actor: Actor) -> Option<Actor> {
        self.actors.insert(actor.id(), actor)
    }

    /// Raise the subscribed memory slot if `letter` matches a subscription.
    /// Returns whether the letter was absorbed.
    pub(crate) fn absorb(&mut self, letter: &Letter) -> bool {
        let Some(sub) = self
            .subscriptions
            .iter()
            .find(|sub| sub.recipient == letter.recipient && sub.signal == letter.signal)
            .copied()
        else {
            return false;
        };
        match self.actors.get_mut(&letter.recipient) {
            Some(actor) if actor.is_live() => {
                actor.memory[usize::from(sub.slot)] = 1;
                true
            }
            _ => false,
        }
    }

    /// Add or replace the subscription for `(recipient, signal)`. Returns
    /// `false` (and subscribes nothing) when the slot is out of range.
    pub fn subscribe(&mut self, sub: Subscription) -> bool {
        if usize::from(sub.slot) >= MEMORY_SLOTS {
            warn!(recipient = %sub.recipient, slot = sub.slot, "subscription slot out of range; ignored");
            return false;
        }
        self.subscriptions
            .retain(|existing| !(existing.recipient == sub.recipient && existing.signal == sub.signal));
        self.subscriptions.push(sub);
        true
    }

    /// Remove the subscription for `(recipient, signal)`.
    pub fn unsubscribe(&mut self, recipient: ActorId, signal: Signal) {
        self.subscriptions
            .retain(|sub| !(sub.recipient == recipient && sub.signal == signal));
    }
}
