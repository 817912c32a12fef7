//! Building-block routines every character calls into.

use crate::Handler;
use couchette_scripting::{
    timer, Action, CallArgs, Ctx, Effect, Locals, Message, Params, Position, RegistryBuilder,
    RegistryError, Routine, ScriptResult, StateMachine, Step, View,
};

/// Dialog line spoken when the alarm goes off.
pub const ALARM_LINE: u16 = 900;

/// Arguments of [`Handler::Walk`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkTo(pub Position);

impl From<WalkTo> for CallArgs {
    fn from(WalkTo(target): WalkTo) -> Self {
        CallArgs::new([
            i32::from(target.car),
            i32::from(target.location),
            i32::from(target.offset),
        ])
    }
}

impl Locals for WalkTo {
    fn load(params: &Params) -> Self {
        let word = |slot: usize| u16::try_from(params[slot]).unwrap_or(0);
        WalkTo(Position::new(word(0), word(1), word(2)))
    }

    fn store(&self, params: &mut Params) {
        params[0] = i32::from(self.0.car);
        params[1] = i32::from(self.0.location);
        params[2] = i32::from(self.0.offset);
    }
}

/// Walks one stage step per TICK and returns on arrival.
struct Walk;

impl Routine for Walk {
    fn name(&self) -> &'static str {
        "walk"
    }

    fn handle(&self, ctx: &mut Ctx<'_>, msg: &Message) -> ScriptResult<()> {
        if !matches!(msg.action, Action::Start | Action::Tick) {
            return Ok(());
        }
        let WalkTo(target) = ctx.locals();
        if ctx.walk_toward(target) {
            ctx.ret()?;
        }
        Ok(())
    }
}

/// Arguments and state of [`Handler::Wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitFor {
    /// Game-time units to wait.
    pub delay: i32,
    deadline: i32,
}

impl WaitFor {
    /// Wait `delay` game-time units.
    pub fn new(delay: i32) -> Self {
        Self { delay, deadline: 0 }
    }
}

impl From<WaitFor> for CallArgs {
    fn from(wait: WaitFor) -> Self {
        CallArgs::new([wait.delay])
    }
}

impl Locals for WaitFor {
    fn load(params: &Params) -> Self {
        Self {
            delay: params[0],
            deadline: params[1],
        }
    }

    fn store(&self, params: &mut Params) {
        params[0] = self.delay;
        params[1] = self.deadline;
    }
}

struct Wait;

impl StateMachine for Wait {
    type State = WaitFor;
    const NAME: &'static str = "wait";

    fn transition(&self, mut state: WaitFor, msg: &Message, view: &View<'_>) -> Step<WaitFor> {
        if msg.action != Action::Tick {
            return Step::to(state);
        }
        if timer::poll_deadline(&mut state.deadline, view.now(), state.delay) {
            Step::to(state).then(Effect::Return)
        } else {
            Step::to(state)
        }
    }
}

/// Presentation cue (animation sequence or dialog line) plus whether it was
/// started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cue {
    /// Sequence or line id.
    pub id: u16,
    started: bool,
}

impl Cue {
    /// Cue `id`.
    pub fn new(id: u16) -> Self {
        Self { id, started: false }
    }
}

impl From<Cue> for CallArgs {
    fn from(cue: Cue) -> Self {
        CallArgs::new([i32::from(cue.id)])
    }
}

impl Locals for Cue {
    fn load(params: &Params) -> Self {
        Self {
            id: u16::try_from(params[0]).unwrap_or(0),
            started: params[1] != 0,
        }
    }

    fn store(&self, params: &mut Params) {
        params[0] = i32::from(self.id);
        params[1] = i32::from(self.started);
    }
}

/// Plays a cue on START and returns on the first TICK after it finished.
struct Play {
    name: &'static str,
    dialog: bool,
}

impl Routine for Play {
    fn name(&self) -> &'static str {
        self.name
    }

    fn handle(&self, ctx: &mut Ctx<'_>, msg: &Message) -> ScriptResult<()> {
        let mut cue: Cue = ctx.locals();
        match msg.action {
            Action::Start if !cue.started => {
                cue.started = true;
                ctx.store_locals(&cue);
                if self.dialog {
                    ctx.speak(cue.id);
                } else {
                    ctx.animate(cue.id);
                }
            }
            Action::Tick => {
                let view = ctx.view()?;
                let done = if self.dialog {
                    view.dialog_done()
                } else {
                    view.animation_done()
                };
                if done {
                    ctx.ret()?;
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Arguments of [`Handler::SaveGame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    /// Save kind.
    pub kind: u16,
    /// Story event.
    pub event: u16,
}

impl From<Checkpoint> for CallArgs {
    fn from(point: Checkpoint) -> Self {
        CallArgs::new([i32::from(point.kind), i32::from(point.event)])
    }
}

struct SaveGame;

impl Routine for SaveGame {
    fn name(&self) -> &'static str {
        "save_game"
    }

    fn handle(&self, ctx: &mut Ctx<'_>, msg: &Message) -> ScriptResult<()> {
        if msg.action == Action::Start {
            let kind = u16::try_from(ctx.params()[0]).unwrap_or(0);
            let event = u16::try_from(ctx.params()[1]).unwrap_or(0);
            ctx.request_save(kind, event);
            ctx.ret()?;
        }
        Ok(())
    }
}

struct Vanish;

impl Routine for Vanish {
    fn name(&self) -> &'static str {
        "vanish"
    }

    fn handle(&self, ctx: &mut Ctx<'_>, msg: &Message) -> ScriptResult<()> {
        if msg.action == Action::Start {
            ctx.set_hidden(true);
            ctx.vanish();
        }
        Ok(())
    }
}

struct Alarm;

impl StateMachine for Alarm {
    type State = Cue;
    const NAME: &'static str = "alarm";

    fn transition(&self, mut cue: Cue, msg: &Message, view: &View<'_>) -> Step<Cue> {
        match msg.action {
            Action::Start => {
                cue.started = true;
                Step::to(cue).then(Effect::Speak(ALARM_LINE))
            }
            Action::Tick if cue.started && view.dialog_done() => Step::to(cue).then(Effect::Return),
            _ => Step::to(cue),
        }
    }
}

struct Doze;

impl Routine for Doze {
    fn name(&self) -> &'static str {
        "doze"
    }

    fn handle(&self, _ctx: &mut Ctx<'_>, _msg: &Message) -> ScriptResult<()> {
        Ok(())
    }
}

pub(crate) fn register(builder: &mut RegistryBuilder) -> Result<(), RegistryError> {
    builder.register(Handler::Walk, Walk)?;
    builder.register_machine(Handler::Wait, Wait)?;
    builder.register(
        Handler::Animate,
        Play {
            name: "animate",
            dialog: false,
        },
    )?;
    builder.register(
        Handler::Speak,
        Play {
            name: "speak",
            dialog: true,
        },
    )?;
    builder.register(Handler::SaveGame, SaveGame)?;
    builder.register(Handler::Vanish, Vanish)?;
    builder.register_machine(Handler::Alarm, Alarm)?;
    builder.register(Handler::Doze, Doze)?;
    Ok(())
}
