//! Cast lists: who exists at scenario start and what each actor runs in
//! every chapter.

use crate::actor::Position;
use crate::engine::Engine;
use crate::error::ScriptResult;
use crate::stage::Stage;
use crate::world::World;
use couchette_core::{ActorId, HandlerId};
use std::collections::BTreeMap;
use tracing::info;

/// One actor's casting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    /// Routine the actor is born into.
    pub birth: HandlerId,
    /// Where it is born.
    pub position: Position,
    /// Idle routine per chapter number.
    pub chapters: BTreeMap<u8, HandlerId>,
}

impl Role {
    /// Role born into `birth` at `position`, with no chapter routines yet.
    pub fn new(birth: impl Into<HandlerId>, position: Position) -> Self {
        Self {
            birth: birth.into(),
            position,
            chapters: BTreeMap::new(),
        }
    }

    /// Run `handler` at the idle level when `chapter` begins.
    pub fn in_chapter(mut self, chapter: u8, handler: impl Into<HandlerId>) -> Self {
        self.chapters.insert(chapter, handler.into());
        self
    }
}

/// Every scripted actor of a scenario, keyed (and therefore ordered) by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cast {
    roles: BTreeMap<ActorId, Role>,
}

impl Cast {
    /// Empty cast.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the role of `actor`.
    pub fn with(mut self, actor: ActorId, role: Role) -> Self {
        self.roles.insert(actor, role);
        self
    }

    /// Role of `actor`.
    pub fn role(&self, actor: ActorId) -> Option<&Role> {
        self.roles.get(&actor)
    }

    /// Roles in id order.
    pub fn roles(&self) -> impl Iterator<Item = (ActorId, &Role)> + '_ {
        self.roles.iter().map(|(actor, role)| (*actor, role))
    }

    /// Birth every cast member, in id order. Returns how many were spawned.
    pub fn spawn_cast(&self, engine: &Engine, world: &mut World, stage: &mut dyn Stage) -> ScriptResult<usize> {
        for (actor, role) in &self.roles {
            engine.spawn(world, stage, *actor, role.birth, role.position)?;
        }
        info!(actors = self.roles.len(), "cast spawned");
        Ok(self.roles.len())
    }

    /// Force-jump every member with a routine for `chapter` into it, in id
    /// order. Members without one keep running what they run. Returns how
    /// many actors were reset.
    pub fn begin_chapter(
        &self,
        engine: &Engine,
        world: &mut World,
        stage: &mut dyn Stage,
        chapter: u8,
    ) -> ScriptResult<usize> {
        let mut reset = 0;
        for (actor, role) in &self.roles {
            let Some(handler) = role.chapters.get(&chapter) else {
                continue;
            };
            if world.actor(*actor).is_none() {
                engine.spawn(world, stage, *actor, *handler, role.position)?;
            } else {
                engine.force_jump(world, stage, *actor, *handler)?;
            }
            reset += 1;
        }
        info!(chapter, actors = reset, "chapter started");
        Ok(reset)
    }
}
