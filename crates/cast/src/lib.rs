#![warn(missing_docs)]
//! A small night-train cast: generic building-block routines plus four
//! characters with two chapters each.
//!
//! Handler ids are fixed by [`Handler`]; they are written into save files, so
//! existing discriminants must never be renumbered.

pub mod characters;
pub mod generic;

use couchette_scripting::{
    Cast, Engine, EngineConfig, HandlerId, HandlerRegistry, RegistryError, Role, ScriptResult,
    Stage, World,
};
use tracing::info;

/// Every routine this crate registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u16)]
pub enum Handler {
    /// Walk to a position, then return.
    Walk = 1,
    /// Wait for a game-time delay, then return.
    Wait = 2,
    /// Play an animation to its end, then return.
    Animate = 3,
    /// Speak a dialog line to its end, then return.
    Speak = 4,
    /// Request a save checkpoint, then return.
    SaveGame = 5,
    /// Terminal state.
    Vanish = 6,
    /// Priority interrupt: react to the alarm, then return.
    Alarm = 7,
    /// Idle level that does nothing.
    Doze = 8,

    /// Conductor, chapter 1: corridor rounds.
    ConductorRounds = 20,
    /// Conductor, chapter 2: night watch.
    ConductorNight = 21,
    /// Passenger, chapter 1: dinner errand.
    PassengerEvening = 30,
    /// Passenger, chapter 2: asleep.
    PassengerNight = 31,
    /// Waiter, chapter 1: serving the dining car.
    WaiterService = 40,
    /// Waiter, chapter 2: closing up.
    WaiterClosing = 41,
    /// Stowaway, chapter 1: hiding, then caught.
    StowawayHiding = 50,
}

impl Handler {
    /// Every handler, in id order.
    pub const ALL: [Handler; 15] = [
        Handler::Walk,
        Handler::Wait,
        Handler::Animate,
        Handler::Speak,
        Handler::SaveGame,
        Handler::Vanish,
        Handler::Alarm,
        Handler::Doze,
        Handler::ConductorRounds,
        Handler::ConductorNight,
        Handler::PassengerEvening,
        Handler::PassengerNight,
        Handler::WaiterService,
        Handler::WaiterClosing,
        Handler::StowawayHiding,
    ];

    /// Stable numeric id.
    pub const fn id(self) -> HandlerId {
        HandlerId(self as u16)
    }
}

impl From<Handler> for HandlerId {
    fn from(handler: Handler) -> Self {
        handler.id()
    }
}

/// Actor ids of the demo cast; also their tick order.
pub mod actors {
    use couchette_scripting::ActorId;

    /// Train conductor.
    pub const CONDUCTOR: ActorId = ActorId(1);
    /// Passenger in compartment 3.
    pub const PASSENGER: ActorId = ActorId(2);
    /// Dining-car waiter.
    pub const WAITER: ActorId = ActorId(3);
    /// Stowaway hiding in the baggage car.
    pub const STOWAWAY: ActorId = ActorId(4);
}

/// Story flags shared by the cast.
pub mod flags {
    use couchette_scripting::StoryFlag;

    /// Current chapter.
    pub const CHAPTER: StoryFlag = StoryFlag(1);
    /// Dinner has been served to the passenger.
    pub const DINNER_SERVED: StoryFlag = StoryFlag(2);
    /// The stowaway was caught.
    pub const STOWAWAY_CAUGHT: StoryFlag = StoryFlag(3);
    /// Tickets checked by the conductor.
    pub const TICKETS_CHECKED: StoryFlag = StoryFlag(4);
}

/// Well-known places on the train.
pub mod places {
    use couchette_scripting::Position;

    /// Corridor location id.
    pub const CORRIDOR: u16 = 0;
    /// Compartment location id.
    pub const COMPARTMENT: u16 = 1;
    /// Dining room location id.
    pub const DINING: u16 = 2;
    /// Baggage hold location id.
    pub const HOLD: u16 = 3;

    /// Conductor's seat at the head of car 3.
    pub const CONDUCTOR_SEAT: Position = Position::new(3, CORRIDOR, 500);
    /// Far end of car 3.
    pub const CAR3_END: Position = Position::new(3, CORRIDOR, 8500);
    /// Door of compartment 3.
    pub const COMPARTMENT3: Position = Position::new(3, COMPARTMENT, 5800);
    /// Passenger's table.
    pub const DINING_TABLE: Position = Position::new(5, DINING, 4000);
    /// Waiter's pantry.
    pub const PANTRY: Position = Position::new(5, DINING, 9000);
    /// Behind the trunks.
    pub const BAGGAGE: Position = Position::new(1, HOLD, 2000);
}

/// Register every routine of this crate.
pub fn build_registry() -> Result<HandlerRegistry, RegistryError> {
    let mut builder = HandlerRegistry::builder();
    generic::register(&mut builder)?;
    characters::register(&mut builder)?;
    Ok(builder.build())
}

/// Engine over [`build_registry`].
pub fn build_engine(config: EngineConfig) -> Result<Engine, RegistryError> {
    Ok(Engine::new(build_registry()?, config))
}

/// The demo cast with its birth places and chapter routines.
pub fn demo_cast() -> Cast {
    Cast::new()
        .with(
            actors::CONDUCTOR,
            Role::new(Handler::ConductorRounds, places::CONDUCTOR_SEAT)
                .in_chapter(1, Handler::ConductorRounds)
                .in_chapter(2, Handler::ConductorNight),
        )
        .with(
            actors::PASSENGER,
            Role::new(Handler::PassengerEvening, places::COMPARTMENT3)
                .in_chapter(1, Handler::PassengerEvening)
                .in_chapter(2, Handler::PassengerNight),
        )
        .with(
            actors::WAITER,
            Role::new(Handler::WaiterService, places::PANTRY)
                .in_chapter(1, Handler::WaiterService)
                .in_chapter(2, Handler::WaiterClosing),
        )
        .with(
            actors::STOWAWAY,
            Role::new(Handler::StowawayHiding, places::BAGGAGE).in_chapter(1, Handler::StowawayHiding),
        )
}

/// Chapter a world is in, as recorded in its story flags.
pub fn chapter_of(world: &World) -> u8 {
    u8::try_from(world.story(flags::CHAPTER)).unwrap_or(0)
}

/// Birth the demo cast into an empty world and open chapter 1.
pub fn start_scenario(engine: &Engine, world: &mut World, stage: &mut dyn Stage) -> ScriptResult<usize> {
    world.set_story(flags::CHAPTER, 1);
    let spawned = demo_cast().spawn_cast(engine, world, stage)?;
    info!(actors = spawned, seed = world.seed(), "scenario started");
    Ok(spawned)
}

/// Move the whole cast to `chapter`. Returns how many actors were reset.
pub fn begin_chapter(engine: &Engine, world: &mut World, stage: &mut dyn Stage, chapter: u8) -> ScriptResult<usize> {
    world.set_story(flags::CHAPTER, i32::from(chapter));
    demo_cast().begin_chapter(engine, world, stage, chapter)
}
