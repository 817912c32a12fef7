//! Actors: the unit the tick loop schedules.

use crate::frame::Frame;
use crate::stack::CallStack;
use couchette_core::{ActorId, HandlerId, Token, MEMORY_SLOTS};
use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

/// Where an actor stands. Opaque to the engine; only the stage interprets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    /// Train car.
    pub car: u16,
    /// Location within the car (corridor, compartment, ...).
    pub location: u16,
    /// Offset along the car.
    pub offset: u16,
}

impl Position {
    /// Build a position.
    pub const fn new(car: u16, location: u16, offset: u16) -> Self {
        Self {
            car,
            location,
            offset,
        }
    }
}

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    /// Engine-level status bits of an actor.
    pub struct ActorStatus: u8 {
        /// Reached its terminal disappear state; receives no more messages.
        const VANISHED = 0b0000_0001;
        /// Not drawn by the stage.
        const HIDDEN = 0b0000_0010;
        /// Owns the running blocking cut-scene.
        const IN_CUTSCENE = 0b0000_0100;
    }
}

impl Default for ActorStatus {
    fn default() -> Self {
        ActorStatus::empty()
    }
}

/// Persistent flag/timer words owned by an actor, independent of call depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Memory([i32; MEMORY_SLOTS]);

impl Memory {
    /// Wrap raw words (used by the save loader).
    pub fn from_words(words: [i32; MEMORY_SLOTS]) -> Self {
        Self(words)
    }

    /// Raw words.
    pub fn words(&self) -> &[i32; MEMORY_SLOTS] {
        &self.0
    }
}

impl Index<usize> for Memory {
    type Output = i32;

    fn index(&self, slot: usize) -> &i32 {
        &self.0[slot]
    }
}

impl IndexMut<usize> for Memory {
    fn index_mut(&mut self, slot: usize) -> &mut i32 {
        &mut self.0[slot]
    }
}

/// A scripted character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    id: ActorId,
    stack: CallStack,
    /// Where the actor stands.
    pub position: Position,
    /// Persistent flags and timers.
    pub memory: Memory,
    /// Item currently carried.
    pub token: Option<Token>,
    /// Engine status bits.
    pub status: ActorStatus,
}

impl Actor {
    /// Actor at its idle level running `idle`.
    pub fn new(id: ActorId, idle: HandlerId) -> Self {
        Self::with_stack(id, CallStack::new(Frame::idle(idle)))
    }

    /// Actor around an existing stack (used by the save loader).
    pub fn with_stack(id: ActorId, stack: CallStack) -> Self {
        Self {
            id,
            stack,
            position: Position::default(),
            memory: Memory::default(),
            token: None,
            status: ActorStatus::empty(),
        }
    }

    /// Identity.
    pub fn id(&self) -> ActorId {
        self.id
    }

    /// Whether messages are still delivered to this actor.
    pub fn is_live(&self) -> bool {
        !self.status.contains(ActorStatus::VANISHED)
    }

    /// Current call depth.
    pub fn depth(&self) -> u8 {
        self.stack.depth()
    }

    /// Routine currently registered as active.
    pub fn active_handler(&self) -> HandlerId {
        self.stack.top().handler
    }

    /// Call stack.
    pub fn stack(&self) -> &CallStack {
        &self.stack
    }

    /// Call stack, mutably. Only the engine primitives should reshape it.
    pub(crate) fn stack_mut(&mut self) -> &mut CallStack {
        &mut self.stack
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_actor_is_live_and_idle() {
        let actor = Actor::new(ActorId(2), HandlerId(10));
        assert!(actor.is_live());
        assert_eq!(actor.depth(), 0);
        assert_eq!(actor.active_handler(), HandlerId(10));
        assert_eq!(actor.token, None);
    }

    #[test]
    fn vanished_actor_is_not_live() {
        let mut actor = Actor::new(ActorId(2), HandlerId(10));
        actor.status.insert(ActorStatus::VANISHED);
        assert!(!actor.is_live());
    }

    #[test]
    fn memory_slots_are_indexable() {
        let mut memory = Memory::default();
        memory[3] = 42;
        assert_eq!(memory.words()[3], 42);
    }
}
