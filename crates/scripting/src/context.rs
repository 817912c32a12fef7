//! Per-delivery handle through which a routine touches the world.

use crate::actor::{Actor, ActorStatus, Position};
use crate::engine::{Delivery, Engine};
use crate::error::{ScriptError, ScriptResult};
use crate::frame::{CallArgs, Locals, Params};
use crate::routine::{Effect, View};
use crate::stage::{SavePoint, Stage};
use crate::world::{Letter, StoryFlag, Subscription, World};
use couchette_core::{
    scoped_rng, ActorId, ContinuationTag, HandlerId, Message, Signal, SimTick, Token,
    MEMORY_SLOTS,
};
use rand::Rng;
use tracing::warn;

/// Context handed to [`Routine::handle`](crate::Routine::handle).
///
/// Frame parameters are only reachable until the routine hands control away
/// (call, return, transfer, jump, interrupt or synchronous signal). After that
/// the frame on top of the stack may belong to someone else, so parameter
/// access falls back to a scratch block whose writes are discarded.
pub struct Ctx<'a> {
    engine: &'a Engine,
    world: &'a mut World,
    stage: &'a mut dyn Stage,
    actor: ActorId,
    detached: bool,
    scratch: Params,
}

impl<'a> Ctx<'a> {
    pub(crate) fn new(engine: &'a Engine, world: &'a mut World, stage: &'a mut dyn Stage, actor: ActorId) -> Self {
        Self {
            engine,
            world,
            stage,
            actor,
            detached: false,
            scratch: Params::ZERO,
        }
    }

    /// Actor whose routine is running.
    pub fn actor_id(&self) -> ActorId {
        self.actor
    }

    /// The running actor, if it still exists.
    pub fn me(&self) -> Option<&Actor> {
        self.world.actors.get(&self.actor)
    }

    fn me_mut(&mut self) -> Option<&mut Actor> {
        self.world.actors.get_mut(&self.actor)
    }

    /// Current tick.
    pub fn tick(&self) -> SimTick {
        self.world.tick()
    }

    /// In-game time.
    pub fn now(&self) -> i32 {
        self.world.game_time()
    }

    /// The world, read-only.
    pub fn world(&self) -> &World {
        &*self.world
    }

    /// Read-only view for state-machine transitions.
    pub fn view(&self) -> ScriptResult<View<'_>> {
        let me = self
            .me()
            .ok_or(ScriptError::UnknownRecipient { actor: self.actor })?;
        Ok(View::new(&*self.world, me, &*self.stage))
    }

    /// Whether control has been handed away during this delivery.
    pub fn is_detached(&self) -> bool {
        self.detached
    }

    /// Parameter words of the running frame.
    pub fn params(&self) -> &Params {
        match self.me() {
            Some(actor) if !self.detached => &actor.stack().top().params,
            _ => &self.scratch,
        }
    }

    /// Parameter words of the running frame, mutably.
    pub fn params_mut(&mut self) -> &mut Params {
        if !self.detached {
            if let Some(actor) = self.world.actors.get_mut(&self.actor) {
                return &mut actor.stack_mut().top_mut().params;
            }
        }
        &mut self.scratch
    }

    /// Typed locals decoded from the running frame.
    pub fn locals<L: Locals>(&self) -> L {
        L::load(self.params())
    }

    /// Write typed locals back into the running frame.
    pub fn store_locals<L: Locals>(&mut self, locals: &L) {
        locals.store(self.params_mut());
    }

    /// Story flag value.
    pub fn story(&self, flag: StoryFlag) -> i32 {
        self.world.story(flag)
    }

    /// Set a story flag.
    pub fn set_story(&mut self, flag: StoryFlag, value: i32) {
        self.world.set_story(flag, value);
    }

    /// Memory word of the running actor.
    pub fn memory(&self, slot: u8) -> i32 {
        self.me()
            .and_then(|actor| actor.memory.words().get(usize::from(slot)).copied())
            .unwrap_or(0)
    }

    /// Set a memory word of the running actor.
    pub fn set_memory(&mut self, slot: u8, value: i32) {
        if usize::from(slot) >= MEMORY_SLOTS {
            warn!(actor = %self.actor, slot, "memory slot out of range; write ignored");
            return;
        }
        if let Some(actor) = self.me_mut() {
            actor.memory[usize::from(slot)] = value;
        }
    }

    /// Current position.
    pub fn position(&self) -> Position {
        self.me().map_or_else(Position::default, |actor| actor.position)
    }

    /// Teleport.
    pub fn set_position(&mut self, position: Position) {
        if let Some(actor) = self.me_mut() {
            actor.position = position;
        }
    }

    /// One walking step toward `target`. Returns whether the actor arrived.
    pub fn walk_toward(&mut self, target: Position) -> bool {
        let from = self.position();
        if from == target {
            return true;
        }
        let next = self.stage.advance_walk(self.actor, from, target);
        self.set_position(next);
        next == target
    }

    /// Carried token.
    pub fn token(&self) -> Option<Token> {
        self.me().and_then(|actor| actor.token)
    }

    /// Pick up or drop the carried token.
    pub fn set_token(&mut self, token: Option<Token>) {
        if let Some(actor) = self.me_mut() {
            actor.token = token;
        }
    }

    /// Show or hide the actor.
    pub fn set_hidden(&mut self, hidden: bool) {
        if let Some(actor) = self.me_mut() {
            actor.status.set(ActorStatus::HIDDEN, hidden);
        }
    }

    /// Start an animation sequence.
    pub fn animate(&mut self, sequence: u16) {
        self.stage.begin_animation(self.actor, sequence);
    }

    /// Start a dialog line.
    pub fn speak(&mut self, line: u16) {
        self.stage.begin_dialog(self.actor, line);
    }

    /// Ask the host for a save checkpoint.
    pub fn request_save(&mut self, kind: u16, event: u16) {
        self.stage.request_save(SavePoint {
            actor: self.actor,
            kind,
            event,
        });
    }

    /// Start a blocking cut-scene; TICK delivery halts until it ends.
    pub fn begin_cutscene(&mut self, cutscene: u16) {
        self.engine
            .begin_cutscene(self.world, &mut *self.stage, self.actor, cutscene);
    }

    /// Enter the terminal disappear state.
    pub fn vanish(&mut self) {
        self.engine.vanish(self.world, self.actor);
    }

    /// Deterministic draw in `0..bound` for this actor and tick.
    pub fn roll(&self, bound: u32) -> u32 {
        let mut rng = scoped_rng(self.world.seed(), self.actor, self.world.tick());
        rng.gen_range(0..bound.max(1))
    }

    /// Call `callee` with `args`; the matching resume carries `tag`.
    pub fn call(
        &mut self,
        tag: impl Into<ContinuationTag>,
        callee: impl Into<HandlerId>,
        args: impl Into<CallArgs>,
    ) -> ScriptResult<()> {
        self.detached = true;
        self.engine.call(
            self.world,
            &mut *self.stage,
            self.actor,
            tag.into(),
            callee.into(),
            args.into(),
        )
    }

    /// Return to the caller.
    pub fn ret(&mut self) -> ScriptResult<()> {
        self.detached = true;
        self.engine.ret(self.world, &mut *self.stage, self.actor)
    }

    /// Hand this level over to `handler`.
    pub fn transfer(&mut self, handler: impl Into<HandlerId>, args: impl Into<CallArgs>) -> ScriptResult<()> {
        self.detached = true;
        self.engine.transfer(
            self.world,
            &mut *self.stage,
            self.actor,
            handler.into(),
            args.into(),
        )
    }

    /// Push a priority interrupt onto `target`. Returns whether it was accepted.
    pub fn interrupt(
        &mut self,
        target: ActorId,
        handler: impl Into<HandlerId>,
        args: impl Into<CallArgs>,
    ) -> ScriptResult<bool> {
        self.detached = true;
        self.engine.interrupt(
            self.world,
            &mut *self.stage,
            target,
            handler.into(),
            args.into(),
        )
    }

    /// Reset `target` to its idle level under `handler`.
    pub fn force_jump(&mut self, target: ActorId, handler: impl Into<HandlerId>) -> ScriptResult<()> {
        self.detached = true;
        self.engine
            .force_jump(self.world, &mut *self.stage, target, handler.into())
    }

    /// Deliver a narrative signal synchronously; returns once the recipient
    /// (and everything it triggered) has finished.
    pub fn signal(&mut self, to: ActorId, signal: Signal, param: i32) -> ScriptResult<Delivery> {
        self.detached = true;
        let msg = Message::new(self.actor, to, signal.into(), param);
        self.engine.deliver(self.world, &mut *self.stage, msg)
    }

    /// Queue a narrative signal for the next tick. Returns whether it fit.
    pub fn send(&mut self, to: ActorId, signal: Signal, param: i32) -> bool {
        self.engine.send(
            self.world,
            Letter {
                sender: self.actor,
                recipient: to,
                signal,
                param,
            },
        )
    }

    /// Queue a narrative signal to every other live actor. Returns how many
    /// letters were queued.
    pub fn broadcast(&mut self, signal: Signal, param: i32) -> usize {
        self.engine.broadcast(self.world, self.actor, signal, param)
    }

    /// Absorb queued `signal` letters into memory slot `slot`.
    pub fn subscribe(&mut self, signal: Signal, slot: u8) -> bool {
        self.world.subscribe(Subscription {
            recipient: self.actor,
            signal,
            slot,
        })
    }

    /// Stop absorbing `signal`.
    pub fn unsubscribe(&mut self, signal: Signal) {
        self.world.unsubscribe(self.actor, signal);
    }

    /// Apply one state-machine effect.
    pub fn apply(&mut self, effect: Effect) -> ScriptResult<()> {
        match effect {
            Effect::Call { tag, callee, args } => self.call(tag, callee, args)?,
            Effect::Return => self.ret()?,
            Effect::Transfer { handler, args } => self.transfer(handler, args)?,
            Effect::Interrupt {
                target,
                handler,
                args,
            } => {
                self.interrupt(target, handler, args)?;
            }
            Effect::Signal { to, signal, param } => {
                self.signal(to, signal, param)?;
            }
            Effect::Send { to, signal, param } => {
                self.send(to, signal, param);
            }
            Effect::Broadcast { signal, param } => {
                self.broadcast(signal, param);
            }
            Effect::Subscribe { signal, slot } => {
                self.subscribe(signal, slot);
            }
            Effect::Unsubscribe(signal) => self.unsubscribe(signal),
            Effect::SetStory(flag, value) => self.set_story(flag, value),
            Effect::SetMemory(slot, value) => self.set_memory(slot, value),
            Effect::MoveTo(position) => self.set_position(position),
            Effect::WalkToward(target) => {
                self.walk_toward(target);
            }
            Effect::Animate(sequence) => self.animate(sequence),
            Effect::Speak(line) => self.speak(line),
            Effect::SetToken(token) => self.set_token(token),
            Effect::RequestSave { kind, event } => self.request_save(kind, event),
            Effect::BeginCutscene(cutscene) => self.begin_cutscene(cutscene),
            Effect::SetHidden(hidden) => self.set_hidden(hidden),
            Effect::Vanish => self.vanish(),
        }
        Ok(())
    }
}
