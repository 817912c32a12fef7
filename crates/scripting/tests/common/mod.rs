//! Small routines shared by the engine integration tests.

#![allow(dead_code)]

use couchette_scripting::{
    timer, Action, ActorId, ContinuationTag, Ctx, EngineConfig, Effect, Engine, HandlerId,
    HandlerRegistry, HeadlessStage, Locals, Message, Params, Position, Routine, ScriptResult,
    Signal, StateMachine, Step, View, World,
};

pub const IDLE: HandlerId = HandlerId(1);
pub const NOOP: HandlerId = HandlerId(2);
pub const WALK: HandlerId = HandlerId(3);
pub const ERRAND: HandlerId = HandlerId(4);
pub const WAIT: HandlerId = HandlerId(5);
pub const DIVE: HandlerId = HandlerId(6);
pub const DOORMAN: HandlerId = HandlerId(7);
pub const ALARM: HandlerId = HandlerId(8);
pub const HOLD: HandlerId = HandlerId(9);
pub const RETURN_EARLY: HandlerId = HandlerId(10);
pub const CALLS_GHOST: HandlerId = HandlerId(11);
pub const GREETER: HandlerId = HandlerId(12);
pub const DIRECTOR: HandlerId = HandlerId(13);
pub const SIREN: HandlerId = HandlerId(14);
pub const GHOST: HandlerId = HandlerId(99);

/// Memory slot counting TICKs seen by `idle`.
pub const TICKS_SEEN: usize = 0;
/// Memory slot holding the last continuation tag `errand` resumed with.
pub const LAST_TAG: usize = 1;
/// Memory slot counting knocks handled by `doorman`.
pub const KNOCKS: usize = 2;
/// Memory slot counting alarms started on an actor.
pub const ALARMS: usize = 3;
/// Memory slot counting STARTs seen by `idle`.
pub const STARTS: usize = 4;
/// Memory slot counting greetings seen by `greeter`.
pub const GREETINGS: usize = 5;
/// Memory slot counting RESUMEs seen by `idle`.
pub const RESUMES: usize = 6;
/// Memory slot holding the last tag `idle` resumed with.
pub const RESUMED_TAG: usize = 7;
/// Memory slot where `siren` records whether its interrupt was accepted.
pub const SIREN_ANSWER: usize = 8;

struct Idle;

impl Routine for Idle {
    fn name(&self) -> &'static str {
        "idle"
    }

    fn handle(&self, ctx: &mut Ctx<'_>, msg: &Message) -> ScriptResult<()> {
        match msg.action {
            Action::Start => {
                let starts = ctx.memory(STARTS as u8);
                ctx.set_memory(STARTS as u8, starts + 1);
            }
            Action::Tick => {
                let seen = ctx.memory(TICKS_SEEN as u8);
                ctx.set_memory(TICKS_SEEN as u8, seen + 1);
            }
            Action::Signal(Signal::Knock) => {
                let knocks = ctx.memory(KNOCKS as u8);
                ctx.set_memory(KNOCKS as u8, knocks + 1);
            }
            Action::Resume(tag) => {
                let resumes = ctx.memory(RESUMES as u8);
                ctx.set_memory(RESUMES as u8, resumes + 1);
                ctx.set_memory(RESUMED_TAG as u8, tag.0);
            }
            _ => {}
        }
        Ok(())
    }
}

struct Noop;

impl Routine for Noop {
    fn name(&self) -> &'static str {
        "noop"
    }

    fn handle(&self, ctx: &mut Ctx<'_>, msg: &Message) -> ScriptResult<()> {
        if msg.action == Action::Start {
            ctx.ret()?;
        }
        Ok(())
    }
}

/// Walks along the current car to offset `params[0]`, then returns.
struct Walk;

impl Routine for Walk {
    fn name(&self) -> &'static str {
        "walk"
    }

    fn handle(&self, ctx: &mut Ctx<'_>, msg: &Message) -> ScriptResult<()> {
        if !matches!(msg.action, Action::Start | Action::Tick) {
            return Ok(());
        }
        let here = ctx.position();
        let target = Position::new(here.car, here.location, ctx.params()[0] as u16);
        if ctx.walk_toward(target) {
            ctx.ret()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrandState {
    Begin,
    Walking,
    Waiting,
}

impl Locals for ErrandState {
    fn load(params: &Params) -> Self {
        match params[7] {
            1 => ErrandState::Walking,
            2 => ErrandState::Waiting,
            _ => ErrandState::Begin,
        }
    }

    fn store(&self, params: &mut Params) {
        params[7] = match self {
            ErrandState::Begin => 0,
            ErrandState::Walking => 1,
            ErrandState::Waiting => 2,
        };
    }
}

/// Walk to 8200 (tag 2), then wait three ticks (tag 5), then return.
pub struct Errand;

impl StateMachine for Errand {
    type State = ErrandState;
    const NAME: &'static str = "errand";

    fn transition(&self, state: ErrandState, msg: &Message, _view: &View<'_>) -> Step<ErrandState> {
        match (state, msg.action) {
            (ErrandState::Begin, Action::Start) => {
                Step::to(ErrandState::Walking).then(Effect::call(2, WALK, [8200]))
            }
            (ErrandState::Walking, Action::Resume(ContinuationTag(2))) => Step::to(ErrandState::Waiting)
                .then(Effect::SetMemory(LAST_TAG as u8, 2))
                .then(Effect::call(5, WAIT, [3])),
            (ErrandState::Waiting, Action::Resume(ContinuationTag(5))) => Step::to(state)
                .then(Effect::SetMemory(LAST_TAG as u8, 5))
                .then(Effect::Return),
            _ => Step::to(state),
        }
    }
}

/// Returns after `params[0]` game-time units have passed.
struct Wait;

impl Routine for Wait {
    fn name(&self) -> &'static str {
        "wait"
    }

    fn handle(&self, ctx: &mut Ctx<'_>, msg: &Message) -> ScriptResult<()> {
        if msg.action != Action::Tick {
            return Ok(());
        }
        let now = ctx.now();
        let delay = ctx.params()[0];
        if timer::poll_deadline(&mut ctx.params_mut()[1], now, delay) {
            ctx.ret()?;
        }
        Ok(())
    }
}

/// Calls itself on START until the stack overflows.
struct Dive;

impl Routine for Dive {
    fn name(&self) -> &'static str {
        "dive"
    }

    fn handle(&self, ctx: &mut Ctx<'_>, msg: &Message) -> ScriptResult<()> {
        if msg.action == Action::Start {
            let level = ctx.me().map_or(0, |me| me.depth());
            ctx.call(i32::from(level), DIVE, [i32::from(level)])?;
        }
        Ok(())
    }
}

/// Answers a knock by synchronously opening the door to the knocker.
struct Doorman;

impl Routine for Doorman {
    fn name(&self) -> &'static str {
        "doorman"
    }

    fn handle(&self, ctx: &mut Ctx<'_>, msg: &Message) -> ScriptResult<()> {
        if msg.action == Action::Signal(Signal::Knock) {
            let knocks = ctx.memory(KNOCKS as u8);
            ctx.set_memory(KNOCKS as u8, knocks + 1);
            ctx.signal(msg.sender, Signal::OpenDoor, knocks + 1)?;
        }
        Ok(())
    }
}

/// Priority interrupt: counts itself and returns on the next TICK.
struct Alarm;

impl Routine for Alarm {
    fn name(&self) -> &'static str {
        "alarm"
    }

    fn handle(&self, ctx: &mut Ctx<'_>, msg: &Message) -> ScriptResult<()> {
        match msg.action {
            Action::Start => {
                let alarms = ctx.memory(ALARMS as u8);
                ctx.set_memory(ALARMS as u8, alarms + 1);
            }
            Action::Tick => ctx.ret()?,
            _ => {}
        }
        Ok(())
    }
}

/// Holds position forever, counting TICKs in `params[7]`.
struct Hold;

impl Routine for Hold {
    fn name(&self) -> &'static str {
        "hold"
    }

    fn handle(&self, ctx: &mut Ctx<'_>, msg: &Message) -> ScriptResult<()> {
        if msg.action == Action::Tick {
            ctx.params_mut()[7] += 1;
        }
        Ok(())
    }
}

/// Returns on START, which is a fault at the idle level.
struct ReturnEarly;

impl Routine for ReturnEarly {
    fn name(&self) -> &'static str {
        "return_early"
    }

    fn handle(&self, ctx: &mut Ctx<'_>, msg: &Message) -> ScriptResult<()> {
        if msg.action == Action::Start {
            ctx.ret()?;
        }
        Ok(())
    }
}

/// Calls an unregistered routine on START.
struct CallsGhost;

impl Routine for CallsGhost {
    fn name(&self) -> &'static str {
        "calls_ghost"
    }

    fn handle(&self, ctx: &mut Ctx<'_>, msg: &Message) -> ScriptResult<()> {
        if msg.action == Action::Start {
            ctx.call(1, GHOST, ())?;
        }
        Ok(())
    }
}

/// Counts `OpenDoor` answers.
struct Greeter;

impl Routine for Greeter {
    fn name(&self) -> &'static str {
        "greeter"
    }

    fn handle(&self, ctx: &mut Ctx<'_>, msg: &Message) -> ScriptResult<()> {
        if msg.action == Action::Signal(Signal::OpenDoor) {
            let seen = ctx.memory(GREETINGS as u8);
            ctx.set_memory(GREETINGS as u8, seen + 1);
        }
        Ok(())
    }
}

/// Starts cut-scene `param` when knocked.
struct Director;

impl Routine for Director {
    fn name(&self) -> &'static str {
        "director"
    }

    fn handle(&self, ctx: &mut Ctx<'_>, msg: &Message) -> ScriptResult<()> {
        if msg.action == Action::Signal(Signal::Knock) {
            ctx.begin_cutscene(msg.param as u16);
        }
        Ok(())
    }
}

/// When knocked, raises an alarm on actor `param` and records the answer:
/// 1 if accepted, -1 if refused.
struct Siren;

impl Routine for Siren {
    fn name(&self) -> &'static str {
        "siren"
    }

    fn handle(&self, ctx: &mut Ctx<'_>, msg: &Message) -> ScriptResult<()> {
        if msg.action == Action::Signal(Signal::Knock) {
            let accepted = ctx.interrupt(ActorId(msg.param as u16), ALARM, ())?;
            ctx.set_memory(SIREN_ANSWER as u8, if accepted { 1 } else { -1 });
        }
        Ok(())
    }
}

pub fn registry() -> HandlerRegistry {
    let mut builder = HandlerRegistry::builder();
    builder.register(IDLE, Idle).unwrap();
    builder.register(NOOP, Noop).unwrap();
    builder.register(WALK, Walk).unwrap();
    builder.register_machine(ERRAND, Errand).unwrap();
    builder.register(WAIT, Wait).unwrap();
    builder.register(DIVE, Dive).unwrap();
    builder.register(DOORMAN, Doorman).unwrap();
    builder.register(ALARM, Alarm).unwrap();
    builder.register(HOLD, Hold).unwrap();
    builder.register(RETURN_EARLY, ReturnEarly).unwrap();
    builder.register(CALLS_GHOST, CallsGhost).unwrap();
    builder.register(GREETER, Greeter).unwrap();
    builder.register(DIRECTOR, Director).unwrap();
    builder.register(SIREN, Siren).unwrap();
    builder.build()
}

pub fn engine() -> Engine {
    engine_with(EngineConfig::default())
}

pub fn engine_with(config: EngineConfig) -> Engine {
    Engine::new(registry(), config)
}

pub struct Scene {
    pub engine: Engine,
    pub world: World,
    pub stage: HeadlessStage,
}

impl Scene {
    pub fn new() -> Self {
        Self::with_engine(engine())
    }

    pub fn with_engine(engine: Engine) -> Self {
        let mut world = World::new(42);
        world.enable_journal();
        Self {
            engine,
            world,
            stage: HeadlessStage::new(2, 2, 3, 400),
        }
    }

    pub fn spawn(&mut self, actor: u16, birth: HandlerId) -> ActorId {
        let id = ActorId(actor);
        self.engine
            .spawn(&mut self.world, &mut self.stage, id, birth, Position::new(3, 0, 1000))
            .unwrap();
        id
    }

    pub fn tick(&mut self, times: usize) {
        for _ in 0..times {
            self.engine.tick(&mut self.world, &mut self.stage);
        }
    }

    pub fn call(&mut self, actor: ActorId, tag: i32, callee: HandlerId, args: [i32; 2]) -> ScriptResult<()> {
        self.engine.call(
            &mut self.world,
            &mut self.stage,
            actor,
            ContinuationTag(tag),
            callee,
            args.into(),
        )
    }

    pub fn memory(&self, actor: ActorId, slot: usize) -> i32 {
        self.world.actor(actor).unwrap().memory[slot]
    }

    pub fn depth(&self, actor: ActorId) -> u8 {
        self.world.actor(actor).unwrap().depth()
    }
}
