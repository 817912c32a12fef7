//! Dispatcher, call/return primitives and the tick loop.

use crate::actor::{Actor, ActorStatus, Position};
use crate::config::{EngineConfig, InterruptPolicy};
use crate::context::Ctx;
use crate::error::{ScriptError, ScriptResult};
use crate::frame::{CallArgs, Frame};
use crate::journal::{Journal, Phase};
use crate::registry::HandlerRegistry;
use crate::stage::Stage;
use crate::world::{Cutscene, Letter, World};
use couchette_core::{Action, ActorId, ContinuationTag, HandlerId, Message, Signal, SimTick};
use serde::Serialize;
use tracing::{debug, info, trace, warn};

/// What became of one delivered message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Delivery {
    /// The recipient's active routine ran to completion.
    Delivered,
    /// No live recipient; nothing happened.
    Dropped,
    /// An auto-message subscription absorbed it.
    Absorbed,
    /// A script fault was caught and the offending actor reset to idle.
    Recovered,
}

/// Counters for one pass of the tick loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TickReport {
    /// Tick that ran.
    pub tick: SimTick,
    /// A blocking cut-scene held TICK delivery back.
    pub halted: bool,
    /// Messages whose routine ran.
    pub delivered: usize,
    /// Messages without a live recipient.
    pub dropped: usize,
    /// Letters absorbed by subscriptions.
    pub absorbed: usize,
    /// Faults recovered.
    pub recovered: usize,
}

impl TickReport {
    fn count(&mut self, delivery: Delivery) {
        match delivery {
            Delivery::Delivered => self.delivered += 1,
            Delivery::Dropped => self.dropped += 1,
            Delivery::Absorbed => self.absorbed += 1,
            Delivery::Recovered => self.recovered += 1,
        }
    }
}

/// Runs scripts against a [`World`].
///
/// The engine only owns the handler registry and its configuration; world
/// state and the stage are passed into every operation.
#[derive(Debug)]
pub struct Engine {
    registry: HandlerRegistry,
    config: EngineConfig,
}

impl Engine {
    /// Engine over a frozen registry.
    pub fn new(registry: HandlerRegistry, config: EngineConfig) -> Self {
        Self { registry, config }
    }

    /// Registered routines.
    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Create (or replace) `actor` at `position` with `birth` as its idle
    /// routine, then START it.
    pub fn spawn(
        &self,
        world: &mut World,
        stage: &mut dyn Stage,
        actor: ActorId,
        birth: HandlerId,
        position: Position,
    ) -> ScriptResult<Delivery> {
        self.ensure_registered(actor, birth)?;
        let mut body = Actor::new(actor, birth);
        body.position = position;
        if world.insert_actor(body).is_some() {
            warn!(%actor, "spawn replaced an existing actor");
        }
        info!(%actor, routine = self.routine_name(birth), "actor spawned");
        Ok(self.dispatch(world, stage, Message::to_self(actor, Action::Start)))
    }

    /// Deliver `msg` synchronously to the recipient's active routine.
    ///
    /// Faults raised by the routine are recovered here by resetting the
    /// offending actor to its idle level.
    pub fn dispatch(&self, world: &mut World, stage: &mut dyn Stage, msg: Message) -> Delivery {
        match self.deliver(world, stage, msg) {
            Ok(delivery) => delivery,
            Err(err) => {
                // Only reachable if a fault escapes every in-flight delivery.
                warn!(error = %err, "dispatch failed");
                Delivery::Dropped
            }
        }
    }

    pub(crate) fn deliver(
        &self,
        world: &mut World,
        stage: &mut dyn Stage,
        msg: Message,
    ) -> ScriptResult<Delivery> {
        let recipient = msg.recipient;
        let Some((handler, depth)) = world
            .live_actor(recipient)
            .map(|actor| (actor.active_handler(), actor.depth()))
        else {
            debug!(%recipient, action = msg.action.code(), "no live stack; message dropped");
            self.record(world, Phase::Dropped, &msg, None, 0);
            return Ok(Delivery::Dropped);
        };
        let Some(routine) = self.registry.lookup(handler) else {
            let err = ScriptError::UnknownHandler {
                actor: recipient,
                handler,
            };
            return self.settle(world, recipient, err);
        };

        trace!(%recipient, sender = %msg.sender, action = msg.action.code(), routine = routine.name(), depth, "deliver");
        self.record(world, Phase::Begin, &msg, Some(handler), depth);
        world.in_flight.push(recipient);
        let outcome = {
            let mut ctx = Ctx::new(self, world, stage, recipient);
            routine.handle(&mut ctx, &msg)
        };
        world.in_flight.pop();
        let depth = world.actor(recipient).map_or(0, Actor::depth);
        self.record(world, Phase::End, &msg, Some(handler), depth);

        match outcome {
            Ok(()) => Ok(Delivery::Delivered),
            Err(err) => self.settle(world, recipient, err),
        }
    }

    /// Decide where a fault is handled: it keeps unwinding while the faulty
    /// actor still has an outer delivery running, otherwise it is recovered.
    fn settle(&self, world: &mut World, recipient: ActorId, err: ScriptError) -> ScriptResult<Delivery> {
        if let ScriptError::UnknownRecipient { actor } = err {
            debug!(%actor, "script addressed an actor without a live stack");
            return Ok(Delivery::Dropped);
        }
        if !err.is_recoverable() {
            return Err(err);
        }
        let culprit = err.actor().unwrap_or(recipient);
        if world.in_flight.contains(&culprit) {
            return Err(err);
        }
        self.recover(world, culprit, &err);
        Ok(Delivery::Recovered)
    }

    fn recover(&self, world: &mut World, actor: ActorId, err: &ScriptError) {
        if let Some(body) = world.actors.get_mut(&actor) {
            let dropped = body.stack_mut().unwind_to_idle();
            let idle = self.routine_name(body.active_handler());
            warn!(%actor, error = %err, dropped, idle, "script fault; actor reset to its idle routine");
        }
    }

    /// Push a frame running `callee` and START it before returning.
    ///
    /// Fails without touching the stack when `callee` is unregistered, the
    /// actor is already at `MAX_DEPTH`, or `tag` is the value reserved for
    /// interrupt frames.
    pub fn call(
        &self,
        world: &mut World,
        stage: &mut dyn Stage,
        actor: ActorId,
        tag: ContinuationTag,
        callee: HandlerId,
        args: CallArgs,
    ) -> ScriptResult<()> {
        if tag.is_interrupt() {
            return Err(ScriptError::ReservedTag { actor, tag });
        }
        self.push_and_start(world, stage, actor, tag, callee, args)
    }

    fn push_and_start(
        &self,
        world: &mut World,
        stage: &mut dyn Stage,
        actor: ActorId,
        tag: ContinuationTag,
        callee: HandlerId,
        args: CallArgs,
    ) -> ScriptResult<()> {
        self.ensure_registered(actor, callee)?;
        let body = Self::live_mut(world, actor)?;
        let depth = body.depth();
        body.stack_mut()
            .push(Frame::new(callee, tag, args))
            .map_err(|_| ScriptError::StackOverflow { actor, depth })?;
        debug!(%actor, routine = self.routine_name(callee), tag = tag.0, depth = depth + 1, "call");
        self.deliver(world, stage, Message::to_self(actor, Action::Start))
            .map(drop)
    }

    /// Pop the active frame and RESUME the caller with the popped frame's tag.
    ///
    /// Every return resumes. A routine buried by an interrupt sees
    /// `Resume(ContinuationTag::INTERRUPT)` and carries on where it was.
    pub fn ret(&self, world: &mut World, stage: &mut dyn Stage, actor: ActorId) -> ScriptResult<()> {
        let body = Self::live_mut(world, actor)?;
        let frame = body
            .stack_mut()
            .pop()
            .ok_or(ScriptError::MissingContinuation { actor })?;
        let depth = body.depth();
        debug!(%actor, tag = frame.tag.0, depth, "return");
        self.deliver(
            world,
            stage,
            Message::to_self(actor, Action::Resume(frame.tag)),
        )
        .map(drop)
    }

    /// Replace the active routine at the same depth and START it. The
    /// continuation tag of the level is kept.
    pub fn transfer(
        &self,
        world: &mut World,
        stage: &mut dyn Stage,
        actor: ActorId,
        handler: HandlerId,
        args: CallArgs,
    ) -> ScriptResult<()> {
        self.ensure_registered(actor, handler)?;
        let body = Self::live_mut(world, actor)?;
        let tag = body.stack().top().tag;
        body.stack_mut().replace_top(Frame::new(handler, tag, args));
        debug!(%actor, routine = self.routine_name(handler), depth = body.depth(), "transfer");
        self.deliver(world, stage, Message::to_self(actor, Action::Start))
            .map(drop)
    }

    /// Push a priority interrupt on top of whatever `actor` is doing.
    ///
    /// Returns `false` when the configured policy refuses a nested interrupt
    /// or the target is already at `MAX_DEPTH`. A refused interrupt leaves the
    /// target untouched and the sender keeps running.
    pub fn interrupt(
        &self,
        world: &mut World,
        stage: &mut dyn Stage,
        actor: ActorId,
        handler: HandlerId,
        args: CallArgs,
    ) -> ScriptResult<bool> {
        let stack = Self::live_mut(world, actor)?.stack();
        if stack.is_full() {
            warn!(%actor, routine = self.routine_name(handler), "interrupt refused; stack is full");
            return Ok(false);
        }
        if stack.has_pending_interrupt() && self.config.interrupt_policy == InterruptPolicy::Refuse {
            debug!(%actor, routine = self.routine_name(handler), "interrupt refused; one is already running");
            return Ok(false);
        }
        self.push_and_start(world, stage, actor, ContinuationTag::INTERRUPT, handler, args)?;
        Ok(true)
    }

    /// Story-level reset: truncate `actor` to its idle level running
    /// `handler`, drop its token and START it. Revives vanished actors.
    pub fn force_jump(
        &self,
        world: &mut World,
        stage: &mut dyn Stage,
        actor: ActorId,
        handler: HandlerId,
    ) -> ScriptResult<()> {
        self.ensure_registered(actor, handler)?;
        let body = world
            .actors
            .get_mut(&actor)
            .ok_or(ScriptError::UnknownRecipient { actor })?;
        body.stack_mut().reset(Frame::idle(handler));
        body.token = None;
        body.status.remove(ActorStatus::VANISHED);
        info!(%actor, routine = self.routine_name(handler), "force jump");
        self.deliver(world, stage, Message::to_self(actor, Action::Start))
            .map(drop)
    }

    /// Queue a letter for the next tick. Returns whether the queue had room.
    pub fn send(&self, world: &mut World, letter: Letter) -> bool {
        if world.queue.len() >= self.config.max_queued_messages {
            warn!(
                sender = %letter.sender,
                recipient = %letter.recipient,
                signal = ?letter.signal,
                capacity = self.config.max_queued_messages,
                "message queue full; letter dropped"
            );
            return false;
        }
        world.queue.push_back(letter);
        true
    }

    /// Queue `signal` to every live actor except `sender`. Returns how many
    /// letters were queued.
    pub fn broadcast(&self, world: &mut World, sender: ActorId, signal: Signal, param: i32) -> usize {
        let recipients: Vec<ActorId> = world
            .actors()
            .filter(|actor| actor.is_live() && actor.id() != sender)
            .map(Actor::id)
            .collect();
        recipients
            .into_iter()
            .filter(|recipient| {
                self.send(
                    world,
                    Letter {
                        sender,
                        recipient: *recipient,
                        signal,
                        param,
                    },
                )
            })
            .count()
    }

    /// Start a blocking cut-scene owned by `owner`.
    pub fn begin_cutscene(&self, world: &mut World, stage: &mut dyn Stage, owner: ActorId, cutscene: u16) {
        if let Some(running) = world.cutscene {
            warn!(running = running.id, replaced_by = cutscene, "cut-scene started while another was running");
            if let Some(previous) = world.actors.get_mut(&running.owner) {
                previous.status.remove(ActorStatus::IN_CUTSCENE);
            }
        }
        if let Some(body) = world.actors.get_mut(&owner) {
            body.status.insert(ActorStatus::IN_CUTSCENE);
        }
        world.cutscene = Some(Cutscene { id: cutscene, owner });
        stage.begin_cutscene(cutscene);
        info!(%owner, cutscene, "cut-scene started");
    }

    /// Put `actor` in its terminal state. Its stack is frozen as is.
    pub fn vanish(&self, world: &mut World, actor: ActorId) {
        if let Some(body) = world.actors.get_mut(&actor) {
            body.status.insert(ActorStatus::VANISHED);
            info!(%actor, depth = body.depth(), "actor vanished");
        }
    }

    /// Run one tick: wait on any cut-scene, advance the clock, drain the
    /// letter queue, then TICK every live actor in ascending id order.
    pub fn tick(&self, world: &mut World, stage: &mut dyn Stage) -> TickReport {
        world.clock.tick = world.clock.tick.advance(1);
        let mut report = TickReport {
            tick: world.clock.tick,
            ..TickReport::default()
        };
        stage.on_tick(world.clock.tick);

        if let Some(cutscene) = world.cutscene {
            if !stage.cutscene_finished(cutscene.id) {
                report.halted = true;
                return report;
            }
            world.cutscene = None;
            if let Some(owner) = world.actors.get_mut(&cutscene.owner) {
                owner.status.remove(ActorStatus::IN_CUTSCENE);
            }
            info!(owner = %cutscene.owner, cutscene = cutscene.id, "cut-scene finished");
            let msg = Message::new(
                cutscene.owner,
                cutscene.owner,
                Signal::CutsceneFinished.into(),
                i32::from(cutscene.id),
            );
            report.count(self.dispatch(world, stage, msg));
        }

        world.clock.game_time = world.clock.game_time.saturating_add(self.config.time_speed);

        // Letters left undelivered when a cut-scene starts keep their place
        // ahead of anything sent during this drain.
        let mut letters = std::mem::take(&mut world.queue);
        while world.cutscene.is_none() {
            let Some(letter) = letters.pop_front() else {
                break;
            };
            if world.absorb(&letter) {
                self.record(world, Phase::Absorbed, &letter.message(), None, 0);
                report.count(Delivery::Absorbed);
                continue;
            }
            report.count(self.dispatch(world, stage, letter.message()));
        }
        if !letters.is_empty() {
            debug!(held = letters.len(), "cut-scene started; letters held for a later tick");
            letters.append(&mut world.queue);
            world.queue = letters;
        }

        for actor in world.actor_ids() {
            if world.cutscene.is_some() {
                report.halted = true;
                break;
            }
            if world.live_actor(actor).is_none() {
                continue;
            }
            report.count(self.dispatch(world, stage, Message::to_self(actor, Action::Tick)));
        }
        report
    }

    fn ensure_registered(&self, actor: ActorId, handler: HandlerId) -> ScriptResult<()> {
        if self.registry.contains(handler) {
            Ok(())
        } else {
            Err(ScriptError::UnknownHandler { actor, handler })
        }
    }

    fn live_mut(world: &mut World, actor: ActorId) -> ScriptResult<&mut Actor> {
        world
            .actors
            .get_mut(&actor)
            .filter(|body| body.is_live())
            .ok_or(ScriptError::UnknownRecipient { actor })
    }

    fn routine_name(&self, handler: HandlerId) -> &'static str {
        self.registry.name_of(handler).unwrap_or("<unregistered>")
    }

    fn record(&self, world: &mut World, phase: Phase, msg: &Message, handler: Option<HandlerId>, depth: u8) {
        let tick = world.clock.tick.0;
        let nesting = world.in_flight.len();
        let journal = match world.journal.as_mut() {
            Some(journal) => journal,
            None if self.config.record_journal => world.journal.insert(Journal::new()),
            None => return,
        };
        journal.record(tick, phase, msg, handler, depth, nesting);
    }
}
