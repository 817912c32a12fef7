//! The conductor: corridor rounds by evening, a night watch after that.

use super::{PhaseWord, Progress};
use crate::generic::{Cue, WaitFor, WalkTo};
use crate::{actors, flags, places, Handler};
use couchette_scripting::{
    timer, Action, ContinuationTag, Effect, Message, Signal, StateMachine, Step, View,
};

/// Memory slot raised when a ticket request arrives.
pub const TICKET_SLOT: u8 = 0;
/// Game time spent at the seat between two rounds.
pub const ROUND_REST: i32 = 60;

const NIGHT_PATROL: i32 = 240;
const TICKET_LINE: u16 = 110;

const TAG_TO_END: i32 = 1;
const TAG_TO_SEAT: i32 = 2;
const TAG_REST: i32 = 3;
const TAG_TICKET: i32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RoundPhase {
    Starting,
    ToEnd,
    ToSeat,
    Resting,
    Punching,
}

impl PhaseWord for RoundPhase {
    fn from_word(word: i32) -> Self {
        match word {
            1 => RoundPhase::ToEnd,
            2 => RoundPhase::ToSeat,
            3 => RoundPhase::Resting,
            4 => RoundPhase::Punching,
            _ => RoundPhase::Starting,
        }
    }

    fn word(self) -> i32 {
        self as i32
    }
}

pub(crate) struct Rounds;

impl Rounds {
    fn walk_to_end() -> Step<Progress<RoundPhase>> {
        Step::to(Progress::at(RoundPhase::ToEnd)).then(Effect::call(
            TAG_TO_END,
            Handler::Walk,
            WalkTo(places::CAR3_END),
        ))
    }

    fn rest() -> Step<Progress<RoundPhase>> {
        Step::to(Progress::at(RoundPhase::Resting)).then(Effect::call(
            TAG_REST,
            Handler::Wait,
            WaitFor::new(ROUND_REST),
        ))
    }
}

impl StateMachine for Rounds {
    type State = Progress<RoundPhase>;
    const NAME: &'static str = "conductor_rounds";

    fn transition(&self, state: Self::State, msg: &Message, view: &View<'_>) -> Step<Self::State> {
        match msg.action {
            Action::Start => Self::walk_to_end().then(Effect::Subscribe {
                signal: Signal::TicketRequested,
                slot: TICKET_SLOT,
            }),
            Action::Resume(ContinuationTag(TAG_TO_END)) => Step::to(Progress::at(RoundPhase::ToSeat))
                .then(Effect::call(TAG_TO_SEAT, Handler::Walk, WalkTo(places::CONDUCTOR_SEAT))),
            Action::Resume(ContinuationTag(TAG_TO_SEAT)) => {
                if view.me().memory[usize::from(TICKET_SLOT)] == 0 {
                    return Self::rest();
                }
                let checked = view.story(flags::TICKETS_CHECKED) + 1;
                Step::to(Progress::at(RoundPhase::Punching))
                    .then(Effect::SetMemory(TICKET_SLOT, 0))
                    .then(Effect::SetStory(flags::TICKETS_CHECKED, checked))
                    .then(Effect::send(actors::PASSENGER, Signal::TicketPresented))
                    .then(Effect::call(TAG_TICKET, Handler::Speak, Cue::new(TICKET_LINE)))
            }
            Action::Resume(ContinuationTag(TAG_TICKET)) => Self::rest(),
            Action::Resume(ContinuationTag(TAG_REST)) => Self::walk_to_end(),
            _ => Step::to(state),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NightPhase {
    Watching,
    Patrolling,
    Returning,
}

impl PhaseWord for NightPhase {
    fn from_word(word: i32) -> Self {
        match word {
            1 => NightPhase::Patrolling,
            2 => NightPhase::Returning,
            _ => NightPhase::Watching,
        }
    }

    fn word(self) -> i32 {
        self as i32
    }
}

pub(crate) struct Night;

impl StateMachine for Night {
    type State = Progress<NightPhase>;
    const NAME: &'static str = "conductor_night";

    fn transition(&self, mut state: Self::State, msg: &Message, view: &View<'_>) -> Step<Self::State> {
        match (state.phase, msg.action) {
            (_, Action::Start) => Step::to(Progress::at(NightPhase::Watching))
                .then(Effect::Unsubscribe(Signal::TicketRequested))
                .then(Effect::MoveTo(places::CONDUCTOR_SEAT)),
            (NightPhase::Watching, Action::Tick) => {
                if !timer::poll_interval(&mut state.timer, view.now(), NIGHT_PATROL) {
                    return Step::to(state);
                }
                state.phase = NightPhase::Patrolling;
                Step::to(state).then(Effect::call(TAG_TO_END, Handler::Walk, WalkTo(places::CAR3_END)))
            }
            (NightPhase::Patrolling, Action::Resume(ContinuationTag(TAG_TO_END))) => {
                state.phase = NightPhase::Returning;
                Step::to(state).then(Effect::call(
                    TAG_TO_SEAT,
                    Handler::Walk,
                    WalkTo(places::CONDUCTOR_SEAT),
                ))
            }
            (NightPhase::Returning, Action::Resume(ContinuationTag(TAG_TO_SEAT))) => {
                state.phase = NightPhase::Watching;
                Step::to(state).then(Effect::Broadcast {
                    signal: Signal::AllClear,
                    param: 0,
                })
            }
            _ => Step::to(state),
        }
    }
}
