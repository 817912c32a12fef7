//! Routines written as explicit state machines.
//!
//! A [`StateMachine`] keeps its state in the frame's parameter words and
//! describes what should happen as a list of [`Effect`]s. [`Machine`] adapts
//! one into a [`Routine`]: it loads the state, runs the pure transition,
//! stores the new state, then applies the effects in order.

use crate::actor::{Actor, Position};
use crate::context::Ctx;
use crate::error::ScriptResult;
use crate::frame::{CallArgs, Locals};
use crate::registry::Routine;
use crate::stage::Stage;
use crate::world::{StoryFlag, World};
use couchette_core::{scoped_rng, ActorId, ContinuationTag, HandlerId, Message, Signal, SimTick, Token};
use rand::Rng;

/// Something a transition asks the engine or the stage to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Call into `callee`; the resume will carry `tag`.
    Call {
        /// Continuation tag.
        tag: ContinuationTag,
        /// Routine to run.
        callee: HandlerId,
        /// Arguments.
        args: CallArgs,
    },
    /// Return to the caller.
    Return,
    /// Replace this routine at the same depth.
    Transfer {
        /// Routine taking over.
        handler: HandlerId,
        /// Its arguments.
        args: CallArgs,
    },
    /// Push a priority interrupt onto another actor.
    Interrupt {
        /// Interrupted actor.
        target: ActorId,
        /// Interrupt routine.
        handler: HandlerId,
        /// Its arguments.
        args: CallArgs,
    },
    /// Deliver a narrative signal synchronously.
    Signal {
        /// Recipient.
        to: ActorId,
        /// Signal.
        signal: Signal,
        /// Payload.
        param: i32,
    },
    /// Queue a narrative signal for the next tick.
    Send {
        /// Recipient.
        to: ActorId,
        /// Signal.
        signal: Signal,
        /// Payload.
        param: i32,
    },
    /// Queue a narrative signal to every other live actor.
    Broadcast {
        /// Signal.
        signal: Signal,
        /// Payload.
        param: i32,
    },
    /// Absorb queued `signal` letters into memory slot `slot`.
    Subscribe {
        /// Watched signal.
        signal: Signal,
        /// Memory slot raised on arrival.
        slot: u8,
    },
    /// Stop absorbing `signal`.
    Unsubscribe(Signal),
    /// Set a global story flag.
    SetStory(StoryFlag, i32),
    /// Set one of the actor's memory words.
    SetMemory(u8, i32),
    /// Teleport.
    MoveTo(Position),
    /// One walking step toward a target.
    WalkToward(Position),
    /// Start an animation sequence.
    Animate(u16),
    /// Start a dialog line.
    Speak(u16),
    /// Pick up or drop the carried token.
    SetToken(Option<Token>),
    /// Request a save checkpoint.
    RequestSave {
        /// Checkpoint kind.
        kind: u16,
        /// Story event.
        event: u16,
    },
    /// Start a blocking cut-scene.
    BeginCutscene(u16),
    /// Show or hide the actor.
    SetHidden(bool),
    /// Enter the terminal disappear state.
    Vanish,
}

impl Effect {
    /// `Call` with any argument shape.
    pub fn call(tag: impl Into<ContinuationTag>, callee: impl Into<HandlerId>, args: impl Into<CallArgs>) -> Self {
        Effect::Call {
            tag: tag.into(),
            callee: callee.into(),
            args: args.into(),
        }
    }

    /// `Transfer` with any argument shape.
    pub fn transfer(handler: impl Into<HandlerId>, args: impl Into<CallArgs>) -> Self {
        Effect::Transfer {
            handler: handler.into(),
            args: args.into(),
        }
    }

    /// `Interrupt` with any argument shape.
    pub fn interrupt(target: ActorId, handler: impl Into<HandlerId>, args: impl Into<CallArgs>) -> Self {
        Effect::Interrupt {
            target,
            handler: handler.into(),
            args: args.into(),
        }
    }

    /// Synchronous narrative signal with no payload.
    pub fn signal(to: ActorId, signal: Signal) -> Self {
        Effect::Signal { to, signal, param: 0 }
    }

    /// Queued narrative signal with no payload.
    pub fn send(to: ActorId, signal: Signal) -> Self {
        Effect::Send { to, signal, param: 0 }
    }
}

/// Result of one transition: the state to store and the effects to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step<S> {
    /// State written back into the frame before any effect runs.
    pub state: S,
    /// Effects, applied in order.
    pub effects: Vec<Effect>,
}

impl<S> Step<S> {
    /// Move to `state` with no effects.
    pub fn to(state: S) -> Self {
        Self {
            state,
            effects: Vec::new(),
        }
    }

    /// Append an effect.
    pub fn then(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Read-only view handed to a transition.
pub struct View<'a> {
    world: &'a World,
    actor: &'a Actor,
    stage: &'a dyn Stage,
}

impl<'a> View<'a> {
    pub(crate) fn new(world: &'a World, actor: &'a Actor, stage: &'a dyn Stage) -> Self {
        Self { world, actor, stage }
    }

    /// The actor being scripted.
    pub fn me(&self) -> &'a Actor {
        self.actor
    }

    /// In-game time.
    pub fn now(&self) -> i32 {
        self.world.game_time()
    }

    /// Current tick.
    pub fn tick(&self) -> SimTick {
        self.world.tick()
    }

    /// Story flag value.
    pub fn story(&self, flag: StoryFlag) -> i32 {
        self.world.story(flag)
    }

    /// Whether the actor stands exactly at `target`.
    pub fn is_at(&self, target: Position) -> bool {
        self.actor.position == target
    }

    /// Where another actor stands.
    pub fn position_of(&self, other: ActorId) -> Option<Position> {
        self.world.actor(other).map(|actor| actor.position)
    }

    /// Whether `other` is within `max` of this actor.
    pub fn near(&self, other: ActorId, max: u32) -> bool {
        self.position_of(other)
            .and_then(|there| self.stage.distance(self.actor.position, there))
            .is_some_and(|distance| distance <= max)
    }

    /// Whether this actor's animation has finished.
    pub fn animation_done(&self) -> bool {
        self.stage.animation_finished(self.actor.id())
    }

    /// Whether this actor's dialog line has finished.
    pub fn dialog_done(&self) -> bool {
        self.stage.dialog_finished(self.actor.id())
    }

    /// Deterministic draw in `0..bound` for this actor and tick.
    pub fn roll(&self, bound: u32) -> u32 {
        let mut rng = scoped_rng(self.world.seed(), self.actor.id(), self.world.tick());
        rng.gen_range(0..bound.max(1))
    }

    /// The world, for anything not covered above.
    pub fn world(&self) -> &'a World {
        self.world
    }
}

/// A routine expressed as a pure transition over persisted state.
pub trait StateMachine: Send + Sync + 'static {
    /// State kept in the frame's parameter words between ticks.
    type State: Locals;

    /// Stable routine name recorded in saves.
    const NAME: &'static str;

    /// Compute the next state and the effects to apply.
    fn transition(&self, state: Self::State, msg: &Message, view: &View<'_>) -> Step<Self::State>;
}

/// Adapter running a [`StateMachine`] as a [`Routine`].
pub struct Machine<M>(pub M);

impl<M: StateMachine> Routine for Machine<M> {
    fn name(&self) -> &'static str {
        M::NAME
    }

    fn handle(&self, ctx: &mut Ctx<'_>, msg: &Message) -> ScriptResult<()> {
        let state = M::State::load(ctx.params());
        let step = self.0.transition(state, msg, &ctx.view()?);
        step.state.store(ctx.params_mut());
        for effect in step.effects {
            ctx.apply(effect)?;
        }
        Ok(())
    }
}
